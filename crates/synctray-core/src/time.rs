use chrono::{DateTime, Datelike, Utc};

/// Parse a daemon timestamp (RFC 3339 with optional nanoseconds).
///
/// The daemon reports "never" as the zero time `0001-01-01T00:00:00Z`;
/// that and anything unparsable yield `None`.
pub(crate) fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(value).ok()?.with_timezone(&Utc);
    (parsed.year() > 1).then_some(parsed)
}
