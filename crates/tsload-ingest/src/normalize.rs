//! Chronological ordering of a record sequence

use crate::error::{IngestError, Result};
use crate::source::Record;
use chrono::NaiveDateTime;

/// Wire format of timestamp fields, e.g. `2025-01-10T23:59:59.125000Z`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Field sorted on when none is configured
pub const DEFAULT_TIMESTAMP_FIELD: &str = "timestamp";

/// Parse a timestamp in [`TIMESTAMP_FORMAT`].
///
/// The fractional seconds are mandatory: `2025-01-01T00:00:00Z` is rejected.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    // %.f on its own also matches an absent fraction
    let (_, fraction) = value.strip_suffix('Z')?.rsplit_once('.')?;
    if fraction.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

/// Reorder `records` ascending by `field`, keeping file order among equal
/// timestamps.
///
/// Records are moved, not modified. Every record must carry a parsable
/// timestamp string; the first one that does not fails the whole sequence.
pub fn sort_by_timestamp(records: Vec<Record>, field: &str) -> Result<Vec<Record>> {
    let mut keyed = Vec::with_capacity(records.len());

    for (index, record) in records.into_iter().enumerate() {
        let raw = record.get(field);
        let ts = raw.and_then(|v| v.as_str()).and_then(parse_timestamp);
        match ts {
            Some(ts) => keyed.push((ts, record)),
            None => {
                return Err(IngestError::InvalidTimestamp {
                    index,
                    field: field.to_string(),
                    value: raw.map(|v| v.to_string()),
                })
            }
        }
    }

    // sort_by_key is stable
    keyed.sort_by_key(|(ts, _)| *ts);
    Ok(keyed.into_iter().map(|(_, record)| record).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(ts: &str, id: u32) -> Record {
        json!({ "timestamp": ts, "id": id }).as_object().unwrap().clone()
    }

    fn ids(records: &[Record]) -> Vec<u64> {
        records.iter().map(|r| r["id"].as_u64().unwrap()).collect()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-12-20T00:00:00.000000Z").is_some());
        assert!(parse_timestamp("2024-12-20T00:00:00.5Z").is_some());
        assert!(parse_timestamp("2024-12-20 00:00:00.000000").is_none());
        assert!(parse_timestamp("2024-12-20T00:00:00Z").is_none());
        assert!(parse_timestamp("2024-12-20T00:00:00.Z").is_none());
        assert!(parse_timestamp("2024-12-20T00:00:00.000000").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_sorts_ascending() {
        let records = vec![
            record("2025-01-03T00:00:00.000000Z", 3),
            record("2025-01-01T00:00:00.000000Z", 1),
            record("2025-01-02T00:00:00.000000Z", 2),
        ];
        let sorted = sort_by_timestamp(records, "timestamp").unwrap();
        assert_eq!(ids(&sorted), vec![1, 2, 3]);
    }

    #[test]
    fn test_ties_keep_file_order() {
        let records = vec![
            record("2025-01-02T00:00:00.000000Z", 10),
            record("2025-01-01T00:00:00.000000Z", 20),
            record("2025-01-02T00:00:00.000000Z", 30),
            record("2025-01-01T00:00:00.000000Z", 40),
        ];
        let sorted = sort_by_timestamp(records, "timestamp").unwrap();
        assert_eq!(ids(&sorted), vec![20, 40, 10, 30]);
    }

    #[test]
    fn test_fractional_seconds_order() {
        let records = vec![
            record("2025-01-01T00:00:00.900000Z", 2),
            record("2025-01-01T00:00:00.100000Z", 1),
        ];
        let sorted = sort_by_timestamp(records, "timestamp").unwrap();
        assert_eq!(ids(&sorted), vec![1, 2]);
    }

    #[test]
    fn test_short_fractions_are_scaled() {
        let records = vec![
            record("2025-01-01T00:00:00.5Z", 2),
            record("2025-01-01T00:00:00.10Z", 1),
        ];
        let sorted = sort_by_timestamp(records, "timestamp").unwrap();
        assert_eq!(ids(&sorted), vec![1, 2]);
    }

    #[test]
    fn test_missing_fraction_is_rejected() {
        let records = vec![
            record("2025-01-01T00:00:01.000000Z", 1),
            record("2025-01-01T00:00:00Z", 2),
        ];
        let err = sort_by_timestamp(records, "timestamp").unwrap_err();
        assert!(matches!(
            err,
            IngestError::InvalidTimestamp { index: 1, value: Some(_), .. }
        ));
    }

    #[test]
    fn test_idempotent_and_lossless() {
        let records = vec![
            record("2025-03-01T10:00:00.000000Z", 1),
            record("2025-02-01T10:00:00.000000Z", 2),
            record("2025-03-01T10:00:00.000000Z", 3),
            record("2025-01-01T10:00:00.000000Z", 4),
        ];
        let once = sort_by_timestamp(records.clone(), "timestamp").unwrap();
        let twice = sort_by_timestamp(once.clone(), "timestamp").unwrap();
        assert_eq!(once, twice);

        // Same records, only reordered, timestamps untouched.
        assert_eq!(once.len(), records.len());
        for r in &records {
            assert!(once.contains(r));
        }
    }

    #[test]
    fn test_missing_field_names_the_record() {
        let mut records = vec![record("2025-01-01T00:00:00.000000Z", 1)];
        records.push(json!({ "id": 2 }).as_object().unwrap().clone());

        let err = sort_by_timestamp(records, "timestamp").unwrap_err();
        match err {
            IngestError::InvalidTimestamp { index, field, value } => {
                assert_eq!(index, 1);
                assert_eq!(field, "timestamp");
                assert!(value.is_none());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unparsable_value_is_reported() {
        let records = vec![
            record("2025-01-01T00:00:00.000000Z", 1),
            record("2025-11-16 12:20:43.058968", 2),
        ];
        let err = sort_by_timestamp(records, "timestamp").unwrap_err();
        assert!(matches!(
            err,
            IngestError::InvalidTimestamp { index: 1, value: Some(_), .. }
        ));
    }

    #[test]
    fn test_custom_field() {
        let records = vec![
            json!({ "ts": "2025-01-02T00:00:00.0Z", "id": 2 }).as_object().unwrap().clone(),
            json!({ "ts": "2025-01-01T00:00:00.0Z", "id": 1 }).as_object().unwrap().clone(),
        ];
        let sorted = sort_by_timestamp(records, "ts").unwrap();
        assert_eq!(ids(&sorted), vec![1, 2]);
    }

    #[test]
    fn test_empty_sequence() {
        assert!(sort_by_timestamp(Vec::new(), "timestamp").unwrap().is_empty());
    }
}
