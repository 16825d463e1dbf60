//! Ingestion scheduler
//!
//! Fan-out/fan-in over source files: one tokio task per file, all spawned up
//! front, all awaited before the run reports. A failing file never cancels
//! its siblings and nothing is retried. An optional semaphore caps how many
//! files are processed at the same time.

use crate::config::IngestConfig;
use crate::endpoint::EndpointPool;
use crate::error::{IngestError, Result};
use crate::source::SourceDescriptor;
use crate::transport::Transport;
use crate::worker::{run_worker, FileOutcome, FileSummary, WorkerSettings};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// List the eligible source files in `dir`, sorted by path.
///
/// A file is eligible when its name ends in `.<extension>` and follows the
/// `<db>.<table>.<ext>` convention. Anything else is skipped.
pub async fn discover_sources(
    dir: &Path,
    extension: &str,
    database_override: Option<&str>,
) -> Result<Vec<SourceDescriptor>> {
    let discovery = |source| IngestError::Discovery {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(discovery)?;

    let mut sources = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(discovery)? {
        let path = entry.path();

        // Follows symlinks, unlike DirEntry::file_type
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => continue,
        }
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        match SourceDescriptor::from_path(&path, database_override) {
            Some(source) => sources.push(source),
            None => debug!(file = %path.display(), "Skipping file outside naming convention"),
        }
    }

    sources.sort_by(|a, b| a.path.cmp(&b.path));
    info!(dir = %dir.display(), files = sources.len(), "Discovered source files");
    Ok(sources)
}

/// Runs one worker per source against a shared pool and transport
pub struct Scheduler<T: Transport + ?Sized> {
    pool: Arc<EndpointPool>,
    transport: Arc<T>,
    settings: Arc<WorkerSettings>,
    concurrency: Option<usize>,
    seed: Option<u64>,
}

impl<T: Transport + ?Sized + 'static> Scheduler<T> {
    pub fn new(pool: EndpointPool, transport: Arc<T>, settings: WorkerSettings) -> Self {
        Self {
            pool: Arc::new(pool),
            transport,
            settings: Arc::new(settings),
            concurrency: None,
            seed: None,
        }
    }

    /// Process at most `limit` files at once; `None` means no limit.
    pub fn with_concurrency(mut self, limit: Option<usize>) -> Self {
        self.concurrency = limit.map(|n| n.max(1));
        self
    }

    /// Make endpoint selection reproducible.
    ///
    /// The worker for the n-th source is seeded with `seed + n`.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Run every source to completion and collect the outcomes.
    ///
    /// A source whose path repeats an earlier one is skipped with a warning,
    /// since outcomes are keyed by path.
    pub async fn run(&self, sources: Vec<SourceDescriptor>) -> RunReport {
        let started = Instant::now();
        let semaphore = self.concurrency.map(|n| Arc::new(Semaphore::new(n)));

        let mut seen = std::collections::HashSet::new();
        let mut handles = Vec::with_capacity(sources.len());

        for (n, source) in sources.into_iter().enumerate() {
            if !seen.insert(source.path.clone()) {
                warn!(file = %source.path.display(), "Duplicate source path, skipping");
                continue;
            }

            let pool = Arc::clone(&self.pool);
            let transport = Arc::clone(&self.transport);
            let settings = Arc::clone(&self.settings);
            let semaphore = semaphore.clone();
            let rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(n as u64)),
                None => StdRng::from_entropy(),
            };
            let path = source.path.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => match semaphore.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(e) => return Err(IngestError::WorkerAborted(e.to_string())),
                    },
                    None => None,
                };
                run_worker(&source, &settings, &pool, &*transport, rng).await
            });
            handles.push((path, handle));
        }

        info!(
            files = handles.len(),
            endpoints = self.pool.len(),
            concurrency = ?self.concurrency,
            "Workers launched"
        );

        let (paths, handles): (Vec<PathBuf>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        let mut outcomes = BTreeMap::new();
        for (path, joined) in paths.into_iter().zip(joined) {
            let outcome = joined.unwrap_or_else(|e| {
                Err(IngestError::WorkerAborted(format!("worker task failed: {}", e)))
            });
            if let Entry::Vacant(slot) = outcomes.entry(path) {
                slot.insert(outcome);
            }
        }

        let report = RunReport {
            outcomes,
            elapsed: started.elapsed(),
        };
        info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            records = report.total_records(),
            units = report.total_units(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Run finished"
        );
        report
    }
}

/// Discover the files under `config.data_dir` and ingest all of them.
///
/// Only configuration and discovery problems are returned as `Err`; per-file
/// failures end up in the [`RunReport`].
pub async fn ingest(config: &IngestConfig, transport: Arc<dyn Transport>) -> Result<RunReport> {
    config.validate()?;
    let pool = config.pool()?;

    let sources = discover_sources(
        &config.data_dir,
        &config.extension,
        config.database.as_deref(),
    )
    .await?;
    if sources.is_empty() {
        warn!(dir = %config.data_dir.display(), "No source files found");
    }

    let scheduler = Scheduler::new(pool, transport, config.worker_settings())
        .with_concurrency(config.concurrency)
        .with_seed(config.seed);
    Ok(scheduler.run(sources).await)
}

/// Per-file outcomes of one run
#[derive(Debug)]
pub struct RunReport {
    outcomes: BTreeMap<PathBuf, FileOutcome>,
    elapsed: Duration,
}

impl RunReport {
    pub fn outcomes(&self) -> &BTreeMap<PathBuf, FileOutcome> {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> BTreeMap<PathBuf, FileOutcome> {
        self.outcomes
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&FileOutcome> {
        self.outcomes.get(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&PathBuf, &FileSummary)> {
        self.outcomes
            .iter()
            .filter_map(|(path, outcome)| outcome.as_ref().ok().map(|s| (path, s)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&PathBuf, &IngestError)> {
        self.outcomes
            .iter()
            .filter_map(|(path, outcome)| outcome.as_ref().err().map(|e| (path, e)))
    }

    /// True when no file failed
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn total_records(&self) -> usize {
        self.succeeded().map(|(_, s)| s.records).sum()
    }

    pub fn total_units(&self) -> usize {
        self.succeeded().map(|(_, s)| s.units()).sum()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, outcome) in &self.outcomes {
            match outcome {
                Ok(summary) => writeln!(
                    f,
                    "ok     {} -> {} ({} records, {} units, {})",
                    path.display(),
                    summary.binding,
                    summary.records,
                    summary.units(),
                    summary.mode
                )?,
                Err(e) => writeln!(f, "FAILED {}: {}", path.display(), e)?,
            }
        }
        write!(
            f,
            "{} file(s): {} succeeded, {} failed, {} records in {:.2}s",
            self.len(),
            self.succeeded().count(),
            self.failed().count(),
            self.total_records(),
            self.elapsed.as_secs_f64()
        )
    }
}
