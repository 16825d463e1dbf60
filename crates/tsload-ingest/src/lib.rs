//! tsload ingestion library
//!
//! Pushes line-delimited JSON files into a pool of write endpoints of a
//! distributed time-series store, one concurrent worker per file.
//!
//! # Pipeline
//!
//! - **Discovery**: `<db>.<table>.json` files in a data directory
//! - **Normalization**: optional stable sort on a timestamp field
//! - **Delivery**: one unit per record or one batch per file, endpoints
//!   picked at random without hitting the same endpoint twice in a row
//! - **Flush**: optional flush of every endpoint a file touched
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tsload_ingest::{ingest, IngestConfig, RestTransport};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::builder()
//!         .endpoint("10.0.0.4:32149".parse()?)
//!         .endpoint("10.0.0.5:32149".parse()?)
//!         .data_dir("./data")
//!         .build();
//!
//!     let transport = Arc::new(RestTransport::new(config.timeout())?);
//!     let report = ingest(&config, transport).await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod binding;
pub mod config;
pub mod delivery;
pub mod endpoint;
pub mod error;
pub mod normalize;
pub mod scheduler;
pub mod source;
pub mod transport;
pub mod worker;

pub use binding::DestinationBinding;
pub use config::IngestConfig;
pub use delivery::{deliver, DeliveryMode, DeliveryReport};
pub use endpoint::{parse_endpoint_list, Endpoint, EndpointPool};
pub use error::{IngestError, Result, TransportError};
pub use scheduler::{discover_sources, ingest, RunReport, Scheduler};
pub use source::{Record, SourceDescriptor};
pub use transport::{MemoryTransport, RestTransport, Transport};
pub use worker::{run_worker, FileOutcome, FileSummary, WorkerSettings};
