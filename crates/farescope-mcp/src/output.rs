//! CLI output rendering — table, JSON, and CSV views of a search result.

use farescope::ScrapingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

pub fn render(result: &ScrapingResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => render_table(result),
        OutputFormat::Json => {
            serde_json::to_string_pretty(result).unwrap_or_else(|e| e.to_string())
        }
        OutputFormat::Csv => render_csv(result),
    }
}

fn render_table(result: &ScrapingResult) -> String {
    if !result.success {
        return format!(
            "Search failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    if result.flights.is_empty() {
        return "No flights found for the given criteria.".to_string();
    }

    let header = [
        "Airline",
        "Departure",
        "Arrival",
        "Duration",
        "Stops",
        "Price",
    ];
    let mut rows: Vec<[String; 6]> = Vec::with_capacity(result.flights.len());
    for flight in &result.flights {
        let first = flight.segments.first();
        let last = flight.segments.last();
        rows.push([
            first.map_or("N/A".to_string(), |s| s.airline.clone()),
            first.map_or("N/A".to_string(), |s| s.departure_time.clone()),
            last.map_or("N/A".to_string(), |s| s.arrival_time.clone()),
            flight.total_duration.clone(),
            flight.stops.to_string(),
            flight.price.clone(),
        ]);
    }

    let mut widths = [0usize; 6];
    for (i, name) in header.iter().enumerate() {
        widths[i] = name.len();
    }
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String; 6]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{cell:<width$}", width = widths[i]))
            .collect();
        padded.join("  ")
    };

    let criteria = &result.search_criteria;
    let mut out = format!(
        "Flight Results: {} -> {}\n\n",
        criteria.origin, criteria.destination
    );
    let header_cells: [String; 6] = header.map(str::to_string);
    out.push_str(&format_row(&header_cells));
    out.push('\n');
    out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));
    out.push('\n');
    for row in &rows {
        out.push_str(&format_row(row));
        out.push('\n');
    }
    out.push_str(&format!(
        "\nFound {} flights in {:.2} seconds\n",
        result.total_results, result.execution_time
    ));
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn render_csv(result: &ScrapingResult) -> String {
    let mut out = String::from(
        "Airline,Departure Time,Arrival Time,Duration,Stops,Price,Currency,Departure Airport,Arrival Airport\n",
    );
    for flight in &result.flights {
        let first = flight.segments.first();
        let last = flight.segments.last();
        let fields = [
            first.map_or("N/A", |s| s.airline.as_str()).to_string(),
            first.map_or("N/A", |s| s.departure_time.as_str()).to_string(),
            last.map_or("N/A", |s| s.arrival_time.as_str()).to_string(),
            flight.total_duration.clone(),
            flight.stops.to_string(),
            flight.price.clone(),
            flight.currency.clone(),
            first
                .map_or("N/A", |s| s.departure_airport.as_str())
                .to_string(),
            last.map_or("N/A", |s| s.arrival_airport.as_str()).to_string(),
        ];
        let escaped: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&escaped.join(","));
        out.push('\n');
    }
    out
}
