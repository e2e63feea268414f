//! Farescope MCP Server — entry point.

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use farescope::airports::normalize_airport;
use farescope::{FlightScraper, ScraperConfig, SearchCriteria};

use farescope_mcp::output::{self, OutputFormat};
use farescope_mcp::protocol::ProtocolHandler;
use farescope_mcp::tools::ToolRegistry;
use farescope_mcp::transport::StdioTransport;

#[derive(Parser)]
#[command(
    name = "farescope-mcp",
    about = "MCP server and CLI for Farescope — live flight search over a headless browser",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server over stdio (default).
    Serve,

    /// Run one flight search from the command line.
    Search {
        /// Origin airport code or city name.
        origin: String,

        /// Destination airport code or city name.
        destination: String,

        /// Departure date (YYYY-MM-DD).
        departure_date: String,

        /// Return date for round-trip (YYYY-MM-DD).
        #[arg(short = 'r', long = "return")]
        return_date: Option<String>,

        /// Maximum number of results.
        #[arg(short, long, default_value_t = 10)]
        max_results: usize,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Write output to a file instead of stdout.
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Print server capabilities as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   farescope-mcp completions bash > ~/.local/share/bash-completion/completions/farescope-mcp
    ///   farescope-mcp completions zsh > ~/.zfunc/_farescope-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn resolve_airport(label: &str, input: &str) -> anyhow::Result<String> {
    normalize_airport(input)
        .ok_or_else(|| anyhow::anyhow!("unknown {label} airport or city: '{input}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let scraper = Arc::new(FlightScraper::new(ScraperConfig::from_env()));
            let handler = ProtocolHandler::new(scraper);
            let transport = StdioTransport::new(handler);
            transport.run().await?;
        }

        Commands::Search {
            origin,
            destination,
            departure_date,
            return_date,
            max_results,
            format,
            output,
        } => {
            let origin = resolve_airport("origin", &origin)?;
            let destination = resolve_airport("destination", &destination)?;
            let departure = departure_date.parse::<chrono::NaiveDate>()?;

            let mut criteria = match return_date {
                Some(ret) => SearchCriteria::round_trip(
                    &origin,
                    &destination,
                    departure,
                    ret.parse::<chrono::NaiveDate>()?,
                ),
                None => SearchCriteria::one_way(&origin, &destination, departure),
            };
            criteria.max_results = max_results;

            let scraper = FlightScraper::new(ScraperConfig::from_env());
            let result = scraper.search(criteria).await;

            let rendered = output::render(&result, format);
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Results saved to {path}");
                }
                None => print!("{rendered}"),
            }

            if !result.success {
                std::process::exit(1);
            }
        }

        Commands::Info => {
            let capabilities = farescope_mcp::types::InitializeResult::default_result();
            let tools = ToolRegistry::list_tools();
            let info = serde_json::json!({
                "server": capabilities.server_info,
                "protocol_version": capabilities.protocol_version,
                "capabilities": capabilities.capabilities,
                "tools": tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
                "tool_count": tools.len(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "farescope-mcp", &mut std::io::stdout());
        }
    }

    Ok(())
}
