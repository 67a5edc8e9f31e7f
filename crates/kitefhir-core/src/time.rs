use crate::error::{CoreError, Result};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Current UTC time.
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Format a timestamp as RFC 3339 (the wire format for `meta.lastUpdated`).
pub fn format_rfc3339(dt: OffsetDateTime) -> String {
    dt.format(&Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

/// Parse an RFC 3339 timestamp.
pub fn parse_rfc3339(s: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339)
        .map_err(|e| CoreError::invalid_date_time(format!("Failed to parse '{s}': {e}")))
}
