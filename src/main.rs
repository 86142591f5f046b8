//! IP Geolocation Lookup CLI.

use anyhow::{Context, Result};
use clap::Parser;
use ip_geolocation_lookup::csv_io::{self, EXPORT_MIME_TYPE};
use ip_geolocation_lookup::shutdown::create_shutdown_token;
use ip_geolocation_lookup::{AddressRecord, BatchOrchestrator, BatchProgress, Config, RunOutcome};
use std::fs::File;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ip-geolocation-lookup")]
#[command(about = "Resolve IP addresses to countries and check them against DNS blacklists")]
#[command(version)]
struct Args {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Look up a single address
    #[arg(long, value_name = "ADDR", conflicts_with = "input")]
    ip: Option<String>,

    /// CSV file with an "origin" column of addresses
    #[arg(short, long, value_name = "CSV")]
    input: Option<PathBuf>,

    /// Where to write the results (defaults to export.file_name)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Load configuration
    let config = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            Config::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    // Handle --validate
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let mut orchestrator = BatchOrchestrator::from_config(&config)?;
    let cancel = create_shutdown_token();

    if let Some(input) = &args.input {
        info!(input = %input.display(), "Importing addresses");
        let file = File::open(input)
            .with_context(|| format!("Failed to open {}", input.display()))?;
        orchestrator.import_csv(file)?;
    } else if args.ip.is_none() {
        anyhow::bail!("Nothing to look up: pass --ip <ADDR> or --input <CSV>");
    }

    let reporter_done = CancellationToken::new();
    let reporter = spawn_progress_reporter(orchestrator.subscribe(), reporter_done.clone());

    let outcome = match &args.ip {
        Some(ip) => orchestrator.search(ip, &cancel).await,
        None => orchestrator.run(&cancel).await,
    };

    reporter_done.cancel();
    if let Err(e) = reporter.await {
        warn!(error = %e, "Progress reporter stopped abnormally");
    }

    match outcome {
        RunOutcome::Completed => {}
        RunOutcome::Cancelled => {
            warn!("Lookup cancelled, no results exported");
            orchestrator.reset();
            return Ok(());
        }
        RunOutcome::Skipped => {
            info!("Nothing to look up");
            return Ok(());
        }
    }

    print_summary(orchestrator.records());

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.export.file_name));

    csv_io::write_results(&output, orchestrator.records())
        .with_context(|| format!("Failed to write results to {}", output.display()))?;

    info!(
        output = %output.display(),
        records = orchestrator.records().len(),
        content_type = EXPORT_MIME_TYPE,
        "Results exported"
    );

    Ok(())
}

/// Log progress updates until `done` fires, then log any update still
/// unseen. Returns the last progress logged.
fn spawn_progress_reporter(
    mut rx: watch::Receiver<BatchProgress>,
    done: CancellationToken,
) -> JoinHandle<Option<BatchProgress>> {
    tokio::spawn(async move {
        let mut last = None;

        loop {
            tokio::select! {
                biased;
                _ = done.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return last;
                    }
                    log_progress(*rx.borrow_and_update(), &mut last);
                }
            }
        }

        if rx.has_changed().unwrap_or(false) {
            log_progress(*rx.borrow_and_update(), &mut last);
        }

        last
    })
}

fn log_progress(progress: BatchProgress, last: &mut Option<BatchProgress>) {
    if progress.total == 0 {
        return;
    }

    info!(
        percent = progress.percent,
        "Processing {}/{} IPs",
        progress.processed,
        progress.total
    );
    *last = Some(progress);
}

fn print_summary(records: &[AddressRecord]) {
    for record in records {
        println!(
            "{}\t{}\t{}",
            record.origin(),
            record.display_country(),
            record.blacklist_status().export_label()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reporter_logs_final_update_before_exiting() {
        let (tx, rx) = watch::channel(BatchProgress::default());
        let done = CancellationToken::new();
        let reporter = spawn_progress_reporter(rx, done.clone());

        let mut progress = BatchProgress::start(2);
        progress.advance();
        progress.advance();
        tx.send_replace(progress);
        done.cancel();

        let last = reporter.await.unwrap();
        assert_eq!(last, Some(progress));
        assert_eq!(last.map(|p| p.percent), Some(100));
    }

    #[tokio::test]
    async fn test_reporter_skips_empty_progress() {
        let (tx, rx) = watch::channel(BatchProgress::default());
        let done = CancellationToken::new();
        let reporter = spawn_progress_reporter(rx, done.clone());

        tx.send_replace(BatchProgress::default());
        done.cancel();

        assert_eq!(reporter.await.unwrap(), None);
    }
}
