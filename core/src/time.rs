use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

/// Parses a server timestamp into a local calendar date for display.
///
/// Accepts RFC 3339 (`2023-01-01T10:00:00.000Z`), naive date-times and plain
/// `YYYY-MM-DD` dates. Anything else yields `None`; the value is never used for logic.
pub fn parse_server_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Local).date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

pub fn format_server_date(input: Option<&str>) -> String {
    input
        .and_then(parse_server_date)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_naive_dates() {
        let expected = NaiveDate::from_ymd_opt(2023, 1, 2);
        assert_eq!(parse_server_date("2023-01-02"), expected);
        assert_eq!(parse_server_date("2023-01-02T08:30:00"), expected);
        assert_eq!(parse_server_date("2023-01-02 08:30:00.123"), expected);
    }

    #[test]
    fn test_parse_rfc3339_is_some() {
        // Local offset decides the calendar day, so only check that it parses.
        assert!(parse_server_date("2023-01-02T12:00:00.000Z").is_some());
    }

    #[test]
    fn test_unparseable_renders_dash() {
        assert_eq!(parse_server_date("yesterday"), None);
        assert_eq!(format_server_date(Some("")), "-");
        assert_eq!(format_server_date(None), "-");
        assert_eq!(format_server_date(Some("2023-01-01")), "2023-01-01");
    }
}
