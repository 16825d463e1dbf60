//! Run configuration for the ingestion distributor
//!
//! An [`IngestConfig`] is assembled either through [`IngestConfig::builder`]
//! or from `TSLOAD_*` environment variables, and validated before a run
//! starts.

use crate::delivery::DeliveryMode;
use crate::endpoint::{parse_endpoint_list, Endpoint, EndpointPool};
use crate::error::{IngestError, Result};
use crate::normalize::DEFAULT_TIMESTAMP_FIELD;
use crate::transport::rest::DEFAULT_TIMEOUT_SECS;
use crate::worker::WorkerSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Directory scanned for source files when none is given.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Extension of eligible source files.
pub const DEFAULT_EXTENSION: &str = "json";

/// Everything a run needs besides the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Write targets; at least one is required
    pub endpoints: Vec<Endpoint>,

    /// Directory holding `<db>.<table>.<ext>` files
    pub data_dir: PathBuf,

    pub extension: String,

    /// Database used for every file instead of the name's first segment
    pub database: Option<String>,

    /// Send each file's records in timestamp order
    pub sort_timestamps: bool,

    pub timestamp_field: String,

    pub mode: DeliveryMode,

    /// Flush every endpoint a file touched once its records are delivered
    pub flush: bool,

    /// Upper bound on files processed at once; `None` runs all files together
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds; 0 disables it
    pub timeout_secs: u64,

    /// Seed for endpoint selection; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            extension: DEFAULT_EXTENSION.to_string(),
            database: None,
            sort_timestamps: false,
            timestamp_field: DEFAULT_TIMESTAMP_FIELD.to_string(),
            mode: DeliveryMode::PerRow,
            flush: false,
            concurrency: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            seed: None,
        }
    }
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Load configuration from environment variables
    ///
    /// - `TSLOAD_ENDPOINTS`: comma separated endpoint list
    /// - `TSLOAD_DATA_DIR`, `TSLOAD_EXTENSION`
    /// - `TSLOAD_DB_NAME`: database override
    /// - `TSLOAD_SORT_TIMESTAMPS`, `TSLOAD_BATCH`, `TSLOAD_FLUSH`: true/false
    /// - `TSLOAD_TIMESTAMP_FIELD`
    /// - `TSLOAD_CONCURRENCY`, `TSLOAD_TIMEOUT_SECS`, `TSLOAD_SEED`: integers
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(list) = std::env::var("TSLOAD_ENDPOINTS") {
            config.endpoints = parse_endpoint_list(&list)?;
        }
        if let Ok(dir) = std::env::var("TSLOAD_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(ext) = std::env::var("TSLOAD_EXTENSION") {
            config.extension = ext;
        }
        if let Ok(db) = std::env::var("TSLOAD_DB_NAME") {
            config.database = Some(db).filter(|db| !db.trim().is_empty());
        }
        if let Some(sort) = env_parse::<bool>("TSLOAD_SORT_TIMESTAMPS")? {
            config.sort_timestamps = sort;
        }
        if let Ok(field) = std::env::var("TSLOAD_TIMESTAMP_FIELD") {
            config.timestamp_field = field;
        }
        if let Some(batch) = env_parse::<bool>("TSLOAD_BATCH")? {
            config.mode = if batch {
                DeliveryMode::Batch
            } else {
                DeliveryMode::PerRow
            };
        }
        if let Some(flush) = env_parse::<bool>("TSLOAD_FLUSH")? {
            config.flush = flush;
        }
        if let Some(limit) = env_parse::<usize>("TSLOAD_CONCURRENCY")? {
            config.concurrency = Some(limit);
        }
        if let Some(secs) = env_parse::<u64>("TSLOAD_TIMEOUT_SECS")? {
            config.timeout_secs = secs;
        }
        if let Some(seed) = env_parse::<u64>("TSLOAD_SEED")? {
            config.seed = Some(seed);
        }

        Ok(config)
    }

    /// Reject configurations a run cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(IngestError::config("at least one write endpoint is required"));
        }
        if self.extension.trim().is_empty() {
            return Err(IngestError::config("source file extension must not be empty"));
        }
        if self.timestamp_field.trim().is_empty() {
            return Err(IngestError::config("timestamp field must not be empty"));
        }
        if self.concurrency == Some(0) {
            return Err(IngestError::config("concurrency must be at least 1"));
        }
        Ok(())
    }

    pub fn pool(&self) -> Result<EndpointPool> {
        EndpointPool::new(self.endpoints.iter().cloned())
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            mode: self.mode,
            sort_by: self
                .sort_timestamps
                .then(|| self.timestamp_field.clone()),
            flush: self.flush,
        }
    }
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| IngestError::config(format!("{}='{}': {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}

/// Builder for IngestConfig
#[derive(Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn endpoints(mut self, endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        self.config.endpoints = endpoints.into_iter().collect();
        self
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.config.endpoints.push(endpoint);
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.config.extension = extension.into();
        self
    }

    pub fn database(mut self, database: Option<String>) -> Self {
        self.config.database = database;
        self
    }

    pub fn sort_timestamps(mut self, sort: bool) -> Self {
        self.config.sort_timestamps = sort;
        self
    }

    pub fn timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.config.timestamp_field = field.into();
        self
    }

    pub fn mode(mut self, mode: DeliveryMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn flush(mut self, flush: bool) -> Self {
        self.config.flush = flush;
        self
    }

    pub fn concurrency(mut self, limit: Option<usize>) -> Self {
        self.config.concurrency = limit;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn build(self) -> IngestConfig {
        self.config
    }
}
