//! Batch orchestration over the address record collection.

use crate::config::{Config, Settings};
use crate::csv_io::{self, CsvError};
use crate::record::{AddressRecord, BatchProgress};
use crate::resolver::{GeolocationResolver, Resolution};
use std::io;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every record was processed.
    Completed,
    /// The token fired; unfinished records are back to pending.
    Cancelled,
    /// There was nothing to process.
    Skipped,
}

/// Owns the record collection and drives lookups over it one record at a time.
pub struct BatchOrchestrator {
    resolver: GeolocationResolver,
    pacing_delay: Duration,
    completion_delay: Duration,
    records: Vec<AddressRecord>,
    progress: BatchProgress,
    progress_tx: watch::Sender<BatchProgress>,
}

impl BatchOrchestrator {
    /// Create an orchestrator around a resolver.
    pub fn new(resolver: GeolocationResolver, settings: &Settings) -> Self {
        let (progress_tx, _) = watch::channel(BatchProgress::default());

        Self {
            resolver,
            pacing_delay: settings.pacing_delay(),
            completion_delay: settings.completion_delay(),
            records: Vec::new(),
            progress: BatchProgress::default(),
            progress_tx,
        }
    }

    /// Create an orchestrator with the HTTP providers described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let resolver = GeolocationResolver::from_config(config)?;

        info!(
            geolocation = %config.geolocation.base_url,
            resolver = %config.reputation.resolver_url,
            zones = config.reputation.zones.len(),
            "Lookup providers initialized"
        );

        Ok(Self::new(resolver, &config.settings))
    }

    pub fn records(&self) -> &[AddressRecord] {
        &self.records
    }

    pub fn progress(&self) -> BatchProgress {
        self.progress
    }

    /// Watch progress updates of current and future runs.
    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.progress_tx.subscribe()
    }

    /// Replace the collection with pending records for `addresses`.
    pub fn load_addresses<I, S>(&mut self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.records = addresses.into_iter().map(AddressRecord::new).collect();
        self.set_progress(BatchProgress::default());
    }

    /// Load addresses from CSV. On error the current collection is kept.
    pub fn import_csv<R: io::Read>(&mut self, rdr: R) -> Result<usize, CsvError> {
        let addresses = csv_io::parse_addresses(rdr)?;
        let count = addresses.len();

        self.load_addresses(addresses);
        info!(addresses = count, "Addresses imported");

        Ok(count)
    }

    /// Drop all records and progress. In-flight runs are stopped through
    /// their cancellation token, not here.
    pub fn reset(&mut self) {
        self.records.clear();
        self.set_progress(BatchProgress::default());
    }

    /// Resolve every record in order, pausing between records.
    pub async fn run(&mut self, cancel: &CancellationToken) -> RunOutcome {
        let pacing = self.pacing_delay;
        self.process(pacing, cancel).await
    }

    /// Replace the collection with `address` and resolve it.
    pub async fn search(&mut self, address: &str, cancel: &CancellationToken) -> RunOutcome {
        if address.is_empty() {
            debug!("Empty address, nothing to search");
            return RunOutcome::Skipped;
        }

        self.load_addresses([address]);
        self.process(Duration::ZERO, cancel).await
    }

    /// Render the current collection as CSV.
    pub fn export_csv(&self) -> Result<String, CsvError> {
        csv_io::serialize_results(&self.records)
    }

    async fn process(&mut self, pacing: Duration, cancel: &CancellationToken) -> RunOutcome {
        let total = self.records.len();
        if total == 0 {
            debug!("No records to process");
            return RunOutcome::Skipped;
        }

        for record in &mut self.records {
            record.mark_loading();
        }
        self.set_progress(BatchProgress::start(total));

        info!(total = total, "Batch started");

        for index in 0..total {
            let origin = self.records[index].origin().to_string();

            let resolution = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                resolution = self.resolver.resolve(&origin) => Some(resolution),
            };

            let Some(resolution) = resolution else {
                self.abandon_from(index);
                return RunOutcome::Cancelled;
            };

            let record = &mut self.records[index];
            match resolution {
                Resolution::Located {
                    country,
                    blacklist_status,
                } => {
                    debug!(
                        ip = %origin,
                        country = %country,
                        blacklist = %blacklist_status,
                        "Address resolved"
                    );
                    record.mark_resolved(country, blacklist_status);
                }
                Resolution::Failed(failure) => {
                    debug!(ip = %origin, error = %failure, "Address failed");
                    record.mark_failed(failure.message().to_string());
                }
            }

            let mut progress = self.progress;
            progress.advance();
            self.set_progress(progress);

            if index + 1 < total && !pause(pacing, cancel).await {
                self.abandon_from(index + 1);
                return RunOutcome::Cancelled;
            }
        }

        if !pause(self.completion_delay, cancel).await {
            debug!("Completion wait cut short");
        }

        let failed = self
            .records
            .iter()
            .filter(|r| r.error_message().is_some())
            .count();
        info!(total = total, failed = failed, "Batch complete");

        RunOutcome::Completed
    }

    fn abandon_from(&mut self, index: usize) {
        for record in &mut self.records[index..] {
            record.mark_pending();
        }

        warn!(
            processed = self.progress.processed,
            total = self.progress.total,
            "Batch cancelled"
        );
    }

    fn set_progress(&mut self, progress: BatchProgress) {
        self.progress = progress;
        self.progress_tx.send_replace(progress);
    }
}

/// Wait for `delay` unless cancelled first. Returns false on cancellation.
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
