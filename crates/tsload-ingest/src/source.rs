//! Record source: line-delimited JSON files
//!
//! One JSON object per physical line. Surrounding whitespace and a single
//! trailing comma are stripped from each line, and blank lines are skipped,
//! so both strict NDJSON and "array body without brackets" fixtures load.
//! The whole file is materialized before anything is sent.

use crate::binding::DestinationBinding;
use crate::error::{IngestError, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One row to ingest
pub type Record = Map<String, Value>;

#[derive(Debug, Clone)]
enum SourceData {
    File,
    Inline(String),
}

/// A source of records together with where they are written
///
/// `path` identifies the source in run reports. File sources are read from
/// it; inline sources carry their contents and never touch the disk.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub path: PathBuf,
    pub binding: DestinationBinding,
    data: SourceData,
}

impl SourceDescriptor {
    pub fn file(path: impl Into<PathBuf>, binding: DestinationBinding) -> Self {
        Self {
            path: path.into(),
            binding,
            data: SourceData::File,
        }
    }

    /// File source bound by the `<db>.<table>.<ext>` naming convention
    pub fn from_path(path: impl Into<PathBuf>, database_override: Option<&str>) -> Option<Self> {
        let path = path.into();
        let binding = DestinationBinding::from_path(&path, database_override)?;
        Some(Self::file(path, binding))
    }

    /// In-memory source with the given line-delimited contents
    pub fn inline(
        name: impl Into<PathBuf>,
        binding: DestinationBinding,
        contents: impl Into<String>,
    ) -> Self {
        Self {
            path: name.into(),
            binding,
            data: SourceData::Inline(contents.into()),
        }
    }

    /// Materialize every record of this source, in order.
    pub async fn load(&self) -> Result<Vec<Record>> {
        match &self.data {
            SourceData::File => read_records(&self.path).await,
            SourceData::Inline(text) => parse_records(&self.path, text),
        }
    }
}

/// Read and parse every record in `path`, in file order.
pub async fn read_records(path: &Path) -> Result<Vec<Record>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| IngestError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;

    let records = parse_records(path, &text)?;
    debug!(file = %path.display(), records = records.len(), "Parsed source file");
    Ok(records)
}

/// Parse already-loaded file contents; `path` is only used for error context.
///
/// Stops at the first malformed line.
pub fn parse_records(path: &Path, text: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = clean_line(raw);
        if line.is_empty() {
            continue;
        }

        let malformed = |reason: String| IngestError::MalformedRecord {
            path: path.to_path_buf(),
            line: idx + 1,
            content: line.to_string(),
            reason,
        };

        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(record)) => records.push(record),
            Ok(other) => {
                return Err(malformed(format!(
                    "expected a JSON object, found {}",
                    json_kind(&other)
                )))
            }
            Err(e) => return Err(malformed(e.to_string())),
        }
    }

    Ok(records)
}

fn clean_line(raw: &str) -> &str {
    let line = raw.trim();
    line.strip_suffix(',').unwrap_or(line)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn parse(text: &str) -> Result<Vec<Record>> {
        parse_records(Path::new("db1.t1.json"), text)
    }

    #[test]
    fn test_parses_lines_in_order() {
        let records = parse("{\"a\":1}\n{\"a\":2}\n{\"a\":3}\n").unwrap();
        let values: Vec<i64> = records.iter().map(|r| r["a"].as_i64().unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn test_tolerates_blank_lines_and_trailing_commas() {
        let text = "\n  {\"a\":1},  \n\n\t{\"b\":2},\r\n   \n{\"c\":3}";
        let records = parse(text).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1]["b"], 2);
    }

    #[test]
    fn test_only_one_trailing_comma_is_stripped() {
        let err = parse("{\"a\":1},,").unwrap_err();
        assert!(matches!(err, IngestError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_malformed_line_is_reported_with_line_number() {
        let err = parse("{\"a\":1}\nnot-json\n{\"b\":2},\n").unwrap_err();
        match err {
            IngestError::MalformedRecord {
                path, line, content, ..
            } => {
                assert_eq!(path, PathBuf::from("db1.t1.json"));
                assert_eq!(line, 2);
                assert_eq!(content, "not-json");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_line_numbers_count_blank_lines() {
        let err = parse("\n\n{\"a\":1}\n\n[1,2]\n").unwrap_err();
        match err {
            IngestError::MalformedRecord { line, reason, .. } => {
                assert_eq!(line, 5);
                assert!(reason.contains("an array"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_input_yields_no_records() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("\n \n\t\n").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_records_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"timestamp\":\"2025-01-01T00:00:00.000000Z\",\"value\":1}},").unwrap();
        writeln!(file, "{{\"timestamp\":\"2025-01-01T00:00:01.000000Z\",\"value\":2}}").unwrap();

        let records = read_records(file.path()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["value"], 2);
    }

    #[tokio::test]
    async fn test_inline_descriptor_loads_without_disk() {
        let source = SourceDescriptor::inline(
            "fixtures/db1.users.json",
            DestinationBinding::new("db1", "users"),
            "{\"u\":\"a\"}\n{\"u\":\"b\"},\n",
        );
        let records = source.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(source.path, PathBuf::from("fixtures/db1.users.json"));
    }

    #[test]
    fn test_descriptor_from_path_uses_convention() {
        let source = SourceDescriptor::from_path("data/db1.orders.json", Some("prod")).unwrap();
        assert_eq!(source.binding, DestinationBinding::new("prod", "orders"));
        assert!(SourceDescriptor::from_path("data/orders.json", None).is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db1.missing.json");

        let err = read_records(&path).await.unwrap_err();
        match err {
            IngestError::SourceUnavailable { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }
}
