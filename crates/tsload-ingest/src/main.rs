//! tsload - concurrent NDJSON ingestion into a time-series cluster

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};
use tsload_common::logging::{init_logging, LogConfig, LogLevel, LoggingGuard};
use tsload_ingest::{
    ingest, parse_endpoint_list, DeliveryMode, IngestConfig, MemoryTransport, RestTransport,
    Transport,
};

#[derive(Parser, Debug)]
#[command(name = "tsload")]
#[command(author, version, about = "Load NDJSON files into a time-series cluster")]
#[command(after_help = ENV_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Write endpoints, comma separated (host:port)
    #[arg(long, global = true)]
    endpoints: Option<String>,

    /// Per-request timeout in seconds, 0 disables it [default: 60]
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

const ENV_HELP: &str = "\
Every option falls back to an environment variable (a .env file is loaded first):
  TSLOAD_ENDPOINTS, TSLOAD_TIMEOUT_SECS, TSLOAD_DATA_DIR, TSLOAD_EXTENSION,
  TSLOAD_DB_NAME, TSLOAD_SORT_TIMESTAMPS, TSLOAD_TIMESTAMP_FIELD, TSLOAD_BATCH,
  TSLOAD_FLUSH, TSLOAD_CONCURRENCY, TSLOAD_SEED, TSLOAD_DRY_RUN
Logging is configured with TSLOAD_LOG_* variables.";

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest every `<db>.<table>.json` file of a directory
    Ingest(IngestArgs),

    /// Query the status of every endpoint
    Status,
}

/// Flags given on the command line win over the environment.
#[derive(Args, Debug)]
struct IngestArgs {
    /// Directory holding the source files [default: ./data]
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Extension of source files [default: json]
    #[arg(long)]
    extension: Option<String>,

    /// Database for every file, replacing the first name segment
    #[arg(long)]
    db_name: Option<String>,

    /// Send records in timestamp order
    #[arg(long)]
    sort_timestamps: bool,

    /// Field holding the record timestamp [default: timestamp]
    #[arg(long)]
    timestamp_field: Option<String>,

    /// Send each file as a single JSON array
    #[arg(long)]
    batch: bool,

    /// Flush touched endpoints after each file
    #[arg(long)]
    flush: bool,

    /// Maximum number of files processed at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Seed for endpoint selection
    #[arg(long)]
    seed: Option<u64>,

    /// Run the whole pipeline without sending anything
    #[arg(long, env = "TSLOAD_DRY_RUN")]
    dry_run: bool,
}

impl IngestArgs {
    fn apply(&self, config: &mut IngestConfig) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(extension) = &self.extension {
            config.extension = extension.clone();
        }
        if let Some(db) = self.db_name.as_ref().filter(|db| !db.trim().is_empty()) {
            config.database = Some(db.clone());
        }
        if let Some(field) = &self.timestamp_field {
            config.timestamp_field = field.clone();
        }
        if self.concurrency.is_some() {
            config.concurrency = self.concurrency;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.sort_timestamps |= self.sort_timestamps;
        config.flush |= self.flush;
        if self.batch {
            config.mode = DeliveryMode::Batch;
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .log_file_prefix("tsload")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            LoggingGuard::default()
        }
    };

    match execute(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Run the selected command; `Ok(false)` means it finished with failures.
async fn execute(cli: Cli) -> Result<bool> {
    let mut config = IngestConfig::from_env()?;
    if let Some(list) = cli.endpoints.as_deref() {
        config.endpoints = parse_endpoint_list(list)?;
    }
    if let Some(secs) = cli.timeout_secs {
        config.timeout_secs = secs;
    }

    match cli.command {
        Command::Ingest(args) => {
            args.apply(&mut config);
            config.validate()?;

            let memory = Arc::new(MemoryTransport::new());
            let transport: Arc<dyn Transport> = if args.dry_run {
                info!("Dry run, nothing will be sent");
                memory.clone()
            } else {
                Arc::new(RestTransport::new(config.timeout())?)
            };

            let report = ingest(&config, transport).await?;
            println!("{}", report);
            if args.dry_run {
                println!("dry run: {} unit(s) captured, nothing sent", memory.sent().len());
            }
            Ok(report.is_success())
        }

        Command::Status => {
            if config.endpoints.is_empty() {
                anyhow::bail!("at least one endpoint is required");
            }
            let transport = RestTransport::new(config.timeout())?;

            let mut healthy = true;
            for endpoint in &config.endpoints {
                match transport.status(endpoint).await {
                    Ok(status) => println!("{}: {}", endpoint, status),
                    Err(e) => {
                        warn!(endpoint = %endpoint, error = %e, "Status query failed");
                        println!("{}: unreachable ({})", endpoint, e);
                        healthy = false;
                    }
                }
            }
            Ok(healthy)
        }
    }
}
