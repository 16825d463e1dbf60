//! Error types for the ingestion distributor
//!
//! Every failure a worker can hit is captured as an [`IngestError`] and kept
//! local to that worker's file. Messages carry enough context (path, line,
//! record index, endpoint) to be reported verbatim.

use crate::endpoint::Endpoint;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure of a single transport call
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request never produced a response (connect error, timeout, ...)
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The node answered with a non-success status
    #[error("node returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The transport refused the unit without contacting a node
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Ingestion error taxonomy
#[derive(Error, Debug)]
pub enum IngestError {
    /// Source file missing or unreadable
    #[error("cannot read source file '{}': {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A non-blank line is not a JSON object
    #[error("malformed record in '{}' at line {line}: {reason} (line: {content})", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        content: String,
        reason: String,
    },

    /// Sorting was requested but a record's timestamp is missing or unparsable
    #[error("record {index}: field '{field}' is not a valid timestamp ({})", value.as_deref().unwrap_or("missing"))]
    InvalidTimestamp {
        index: usize,
        field: String,
        value: Option<String>,
    },

    /// A unit could not be delivered
    #[error("delivery of unit {index} to {endpoint} failed: {source}")]
    DeliveryFailed {
        index: usize,
        endpoint: Endpoint,
        #[source]
        source: TransportError,
    },

    /// Records were delivered but the node refused to flush its buffers
    #[error("flush of {endpoint} failed: {source}")]
    FlushFailed {
        endpoint: Endpoint,
        #[source]
        source: TransportError,
    },

    /// Source directory could not be listed
    #[error("cannot list source directory '{}': {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Run parameters are unusable
    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The worker task ended without producing an outcome
    #[error("worker aborted: {0}")]
    WorkerAborted(String),
}

impl IngestError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short machine-friendly tag for logs and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::MalformedRecord { .. } => "malformed_record",
            Self::InvalidTimestamp { .. } => "invalid_timestamp",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::FlushFailed { .. } => "flush_failed",
            Self::Discovery { .. } => "discovery",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::WorkerAborted(_) => "worker_aborted",
        }
    }
}
