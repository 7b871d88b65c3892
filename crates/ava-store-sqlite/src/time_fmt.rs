// crates/ava-store-sqlite/src/time_fmt.rs
// ============================================================================
// Module: Timestamp Formatting
// Description: RFC 3339 TEXT encoding for every timestamp column; sorts
//              lexicographically in UTC form, unlike a raw Unix epoch.
// ============================================================================

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::SqliteStoreError;

/// Formats `at` as RFC 3339 text in UTC.
#[must_use]
pub fn rfc3339(at: OffsetDateTime) -> String {
    at.to_offset(time::UtcOffset::UTC)
        .format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Parses an RFC 3339 string previously produced by [`rfc3339`].
pub fn parse_rfc3339(text: &str) -> Result<OffsetDateTime, SqliteStoreError> {
    OffsetDateTime::parse(text, &Rfc3339)
        .map_err(|err| SqliteStoreError::Invalid(format!("bad timestamp {text:?}: {err}")))
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use time::macros::datetime;

    use super::parse_rfc3339;
    use super::rfc3339;

    #[test]
    fn round_trips_through_format_and_parse() {
        let at = datetime!(2026-03-01 12:30:00 UTC);
        let text = rfc3339(at);
        let parsed = parse_rfc3339(&text).expect("parse");
        assert_eq!(parsed, at);
    }

    #[test]
    fn formatted_timestamps_sort_lexicographically() {
        let earlier = rfc3339(datetime!(2026-01-01 00:00:00 UTC));
        let later = rfc3339(datetime!(2026-06-01 00:00:00 UTC));
        assert!(earlier < later);
    }
}
