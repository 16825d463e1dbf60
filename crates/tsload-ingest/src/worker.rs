//! Ingestion worker: one file, end to end
//!
//! Load -> (sort) -> deliver -> (flush). Whatever happens, the worker hands
//! back a [`FileOutcome`] instead of propagating an error, so the scheduler
//! can keep going with the other files.

use crate::binding::DestinationBinding;
use crate::delivery::{deliver, DeliveryMode};
use crate::endpoint::{Endpoint, EndpointPool};
use crate::error::{IngestError, Result};
use crate::normalize::sort_by_timestamp;
use crate::source::SourceDescriptor;
use crate::transport::Transport;
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

/// Per-file behaviour shared by every worker of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSettings {
    pub mode: DeliveryMode,
    /// Timestamp field to sort on, or `None` to keep file order
    pub sort_by: Option<String>,
    /// Flush touched endpoints after delivery
    pub flush: bool,
}

/// Result of a successful worker
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub binding: DestinationBinding,
    pub mode: DeliveryMode,
    pub records: usize,
    /// Target of each unit, in dispatch order
    pub unit_endpoints: Vec<Endpoint>,
    /// Endpoints flushed after delivery
    pub flushed: Vec<Endpoint>,
    pub elapsed: Duration,
}

impl FileSummary {
    pub fn units(&self) -> usize {
        self.unit_endpoints.len()
    }
}

/// Tagged outcome of one worker
pub type FileOutcome = Result<FileSummary>;

/// Run one source through the whole pipeline.
#[instrument(
    name = "worker",
    skip_all,
    fields(file = %source.path.display(), binding = %source.binding)
)]
pub async fn run_worker<T, R>(
    source: &SourceDescriptor,
    settings: &WorkerSettings,
    pool: &EndpointPool,
    transport: &T,
    mut rng: R,
) -> FileOutcome
where
    T: Transport + ?Sized,
    R: Rng,
{
    let started = Instant::now();
    let outcome = process(source, settings, pool, transport, &mut rng, started).await;

    match &outcome {
        Ok(summary) => info!(
            records = summary.records,
            units = summary.units(),
            mode = %summary.mode,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "File ingested"
        ),
        Err(e) => error!(error = %e, kind = e.kind(), "File failed"),
    }

    outcome
}

async fn process<T, R>(
    source: &SourceDescriptor,
    settings: &WorkerSettings,
    pool: &EndpointPool,
    transport: &T,
    rng: &mut R,
    started: Instant,
) -> FileOutcome
where
    T: Transport + ?Sized,
    R: Rng,
{
    let mut records = source.load().await?;

    if records.is_empty() {
        info!("No records, nothing to send");
    } else if let Some(field) = &settings.sort_by {
        records = sort_by_timestamp(records, field)?;
    }

    let report = deliver(
        &records,
        pool,
        &source.binding,
        settings.mode,
        transport,
        rng,
    )
    .await?;

    let mut flushed = Vec::new();
    if settings.flush {
        for endpoint in report.distinct_endpoints() {
            transport
                .flush(&endpoint)
                .await
                .map_err(|source| IngestError::FlushFailed {
                    endpoint: endpoint.clone(),
                    source,
                })?;
            flushed.push(endpoint);
        }
    }

    Ok(FileSummary {
        binding: source.binding.clone(),
        mode: settings.mode,
        records: report.records,
        unit_endpoints: report.unit_endpoints,
        flushed,
        elapsed: started.elapsed(),
    })
}
