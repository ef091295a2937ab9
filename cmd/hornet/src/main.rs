//! Hornet CLI - evolutionary fuzzer for OData services.
//!
//! Probes the service, builds queryables from `$metadata`, then runs the
//! evolutionary loop until interrupted. CSV reports over the stored
//! population are written on shutdown.
//!
//! Exit codes: 0 after a normal (interrupted) run, 1 on configuration
//! errors, 2 when the service is unreachable at the initial probe.

use anyhow::{Context, Result};
use clap::Parser;
use hornet_corpus::{report, CorpusStore};
use hornet_dispatch::{Credentials, Dispatcher, DispatcherConfig};
use hornet_entities::{build_queryables, Queryable, Restrictions};
use hornet_evolution::config::DEFAULT_CONFIG_PATH;
use hornet_evolution::{Fuzzer, FuzzerConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hornet")]
#[command(about = "Evolutionary fuzzer for OData services")]
#[command(version)]
struct Cli {
    /// OData service root URL
    service: String,

    /// Restrictions file narrowing the fuzzed surface
    #[arg(short, long)]
    restrictions: Option<PathBuf>,

    /// Dispatch batches concurrently through the worker pool
    #[arg(long = "async")]
    concurrent: bool,

    /// Fuzzer configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory the shutdown reports are written to
    #[arg(long, default_value = "reports")]
    report_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// The initial probe reached the service but got no usable answer.
#[derive(Debug, thiserror::Error)]
#[error("service probe failed: HTTP {status} from {url}")]
struct ProbeFailed {
    status: u16,
    url: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    let unreachable = error.downcast_ref::<ProbeFailed>().is_some()
        || error
            .downcast_ref::<hornet_dispatch::Error>()
            .is_some_and(|e| matches!(e, hornet_dispatch::Error::Transport { .. }));
    if unreachable {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    }
}

async fn run(cli: Cli) -> Result<()> {
    let fuzzer_config = FuzzerConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load fuzzer configuration {}", cli.config.display()))?;

    let credentials = Credentials::from_env()
        .context("basic-auth credentials are required (SAP_USERNAME / SAP_PASSWORD)")?;

    let mut dispatcher_config = DispatcherConfig::new(cli.service.clone());
    dispatcher_config.timeout = fuzzer_config.request_timeout();
    let dispatcher = Dispatcher::new(&dispatcher_config, credentials)
        .context("failed to set up the HTTP session")?;

    let restrictions = cli
        .restrictions
        .as_ref()
        .map(Restrictions::load)
        .transpose()
        .context("failed to load the restrictions file")?;

    let queryables = discover_queryables(&dispatcher, restrictions.as_ref(), &fuzzer_config).await?;
    info!(
        queryables = queryables.len(),
        concurrent = cli.concurrent,
        "starting fuzzing loop against {}",
        dispatcher.service()
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing the current batch");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut fuzzer = Fuzzer::new(dispatcher, queryables, fuzzer_config, cli.concurrent);
    let stats = fuzzer.run(shutdown_rx).await;

    write_reports(fuzzer.store(), &cli.report_dir)?;
    info!(
        tests = stats.tests,
        fails = stats.fails,
        "run finished"
    );
    Ok(())
}

/// Fetches `$metadata` (doubling as the initial probe) and builds the
/// queryable list.
async fn discover_queryables(
    dispatcher: &Dispatcher,
    restrictions: Option<&Restrictions>,
    config: &FuzzerConfig,
) -> Result<Vec<Queryable>> {
    let (status, body) = dispatcher
        .get_raw("$metadata")
        .await
        .context("service is unreachable")?;
    if status != 200 {
        return Err(ProbeFailed {
            status,
            url: format!("{}$metadata", dispatcher.service()),
        }
        .into());
    }

    let queryables = build_queryables(&body, restrictions, &config.generator)
        .context("failed to build queryables from $metadata")?;
    if queryables.is_empty() {
        warn!("restrictions left nothing to fuzz");
    }
    Ok(queryables)
}

fn write_reports(store: &CorpusStore, report_dir: &Path) -> Result<()> {
    if store.total_queries() == 0 {
        info!("empty corpus, skipping reports");
        return Ok(());
    }
    std::fs::create_dir_all(report_dir)
        .with_context(|| format!("failed to create {}", report_dir.display()))?;

    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let queries_path = report_dir.join(format!("queries-{stamp}.csv"));
    let filters_path = report_dir.join(format!("filters-{stamp}.csv"));

    let queries_file = std::fs::File::create(&queries_path)
        .with_context(|| format!("failed to create {}", queries_path.display()))?;
    report::write_query_report(store, queries_file).context("failed to write the query report")?;

    let filters_file = std::fs::File::create(&filters_path)
        .with_context(|| format!("failed to create {}", filters_path.display()))?;
    report::write_filter_report(store, filters_file)
        .context("failed to write the filter report")?;

    info!(
        "reports written to {} and {}",
        queries_path.display(),
        filters_path.display()
    );
    Ok(())
}
