//! Airport input normalization.
//!
//! Callers pass either an IATA code or a common city name; the lookup table
//! covers the routes this engine is actually pointed at, not the full IATA
//! registry.

/// City and shorthand aliases to IATA codes. Keys are lowercase.
const ALIASES: &[(&str, &str)] = &[
    ("new york", "JFK"),
    ("nyc", "JFK"),
    ("los angeles", "LAX"),
    ("la", "LAX"),
    ("san francisco", "SFO"),
    ("sf", "SFO"),
    ("chicago", "ORD"),
    ("miami", "MIA"),
    ("boston", "BOS"),
    ("seattle", "SEA"),
    ("denver", "DEN"),
    ("atlanta", "ATL"),
    ("dallas", "DFW"),
    ("houston", "IAH"),
    ("phoenix", "PHX"),
    ("philadelphia", "PHL"),
    ("detroit", "DTW"),
    ("minneapolis", "MSP"),
    ("orlando", "MCO"),
    ("las vegas", "LAS"),
    ("vegas", "LAS"),
    ("washington", "DCA"),
    ("dc", "DCA"),
    ("london", "LHR"),
    ("paris", "CDG"),
    ("tokyo", "NRT"),
    ("singapore", "SIN"),
    ("sydney", "SYD"),
    ("toronto", "YYZ"),
    ("vancouver", "YVR"),
    ("mexico city", "MEX"),
    ("cancun", "CUN"),
];

/// Resolve user input to an IATA code: a known alias maps to its code, any
/// other 3-letter token is uppercased as-is, anything else returns `None`
/// and is left for criteria validation to reject. Aliases win so "nyc"
/// resolves to JFK rather than passing through as a literal code.
pub fn normalize_airport(input: &str) -> Option<String> {
    let cleaned = input.trim().to_lowercase();
    if cleaned.is_empty() {
        return None;
    }
    if let Some((_, code)) = ALIASES.iter().find(|(alias, _)| *alias == cleaned) {
        return Some((*code).to_string());
    }
    if cleaned.len() == 3 && cleaned.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(cleaned.to_uppercase());
    }
    None
}

/// Aliases that resolve to `code`, for error messages and the airport info
/// tool.
pub fn aliases_for(code: &str) -> Vec<&'static str> {
    ALIASES
        .iter()
        .filter(|(_, c)| c.eq_ignore_ascii_case(code))
        .map(|(alias, _)| *alias)
        .collect()
}

/// Alias suggestions containing `partial`, for near-miss feedback.
pub fn suggestions(partial: &str) -> Vec<(&'static str, &'static str)> {
    let needle = partial.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    ALIASES
        .iter()
        .filter(|(alias, _)| alias.contains(needle.as_str()))
        .map(|&(alias, code)| (alias, code))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_pass_through_uppercased() {
        assert_eq!(normalize_airport("jfk"), Some("JFK".to_string()));
        assert_eq!(normalize_airport(" LAX "), Some("LAX".to_string()));
    }

    #[test]
    fn city_aliases_resolve() {
        assert_eq!(normalize_airport("New York"), Some("JFK".to_string()));
        assert_eq!(normalize_airport("las vegas"), Some("LAS".to_string()));
        assert_eq!(normalize_airport("sf"), Some("SFO".to_string()));
    }

    #[test]
    fn three_letter_aliases_beat_the_code_passthrough() {
        assert_eq!(normalize_airport("nyc"), Some("JFK".to_string()));
    }

    #[test]
    fn unknown_input_is_rejected() {
        assert_eq!(normalize_airport("gotham"), None);
        assert_eq!(normalize_airport(""), None);
        assert_eq!(normalize_airport("ab"), None);
    }

    #[test]
    fn suggestions_match_substrings() {
        let hits = suggestions("york");
        assert_eq!(hits, vec![("new york", "JFK")]);
        assert!(suggestions("zzz").is_empty());
    }

    #[test]
    fn aliases_reverse_lookup() {
        let mut hits = aliases_for("JFK");
        hits.sort();
        assert_eq!(hits, vec!["new york", "nyc"]);
    }
}
