use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::FetchError;
use crate::config::Config;
use crate::engine::diff_snapshots;
use crate::notifier::DeliveryError;
use crate::types::{ChangeEvent, Snapshot};

/// Shortest allowed polling interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Exponent cap for the failure backoff, keeps the multiplier finite.
const MAX_BACKOFF_DOUBLINGS: u32 = 16;

/// Where snapshots come from.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<Snapshot, FetchError>;
}

/// Where change notifications go.
#[async_trait]
pub trait ChangeSink: Send + Sync {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), DeliveryError>;
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// First successful fetch; nothing to diff against yet.
    Baseline { teams: usize },
    /// Diffed against the previous snapshot.
    Diffed { changes: usize, delivered: usize },
    /// Fetch failed; previous snapshot kept.
    FetchFailed,
}

/// Drives fetch → diff → notify → sleep, holding the previous snapshot.
pub struct Poller {
    interval: Duration,
    max_backoff: Duration,
    previous: Option<Snapshot>,
    consecutive_failures: u32,
}

impl Poller {
    /// `interval` is raised to [`MIN_INTERVAL`] if shorter.
    pub fn new(interval: Duration, max_backoff: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            max_backoff,
            previous: None,
            consecutive_failures: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.refresh_interval, config.max_backoff)
    }

    /// Snapshot the next cycle will diff against.
    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Sleep before the next cycle.
    ///
    /// The configured interval after a success. After `n` consecutive fetch
    /// failures, `interval * 2^n` capped at the larger of `max_backoff` and
    /// `interval`, so a retry never comes sooner than one interval.
    pub fn next_delay(&self) -> Duration {
        if self.consecutive_failures == 0 {
            return self.interval;
        }
        let doublings = self.consecutive_failures.min(MAX_BACKOFF_DOUBLINGS);
        let cap = self.max_backoff.max(self.interval);
        self.interval.saturating_mul(1 << doublings).min(cap)
    }

    /// Run one cycle: fetch, diff against the previous snapshot, notify each
    /// qualifying team in turn, then keep the new snapshot.
    ///
    /// Fetch and delivery failures are logged and contained here.
    pub async fn poll_cycle(
        &mut self,
        source: &dyn SnapshotSource,
        sink: &dyn ChangeSink,
    ) -> CycleOutcome {
        let snapshot = match source.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                warn!(
                    "Error retrieving market data ({} consecutive): {}",
                    self.consecutive_failures,
                    e.messages().join("; ")
                );
                return CycleOutcome::FetchFailed;
            }
        };
        self.consecutive_failures = 0;

        let outcome = match &self.previous {
            None => {
                info!(
                    "Baseline snapshot with {} teams at {}",
                    snapshot.len(),
                    snapshot.fetched_at.format("%H:%M:%S")
                );
                CycleOutcome::Baseline {
                    teams: snapshot.len(),
                }
            }
            Some(previous) => {
                let changes = diff_snapshots(previous, &snapshot);
                let mut delivered = 0;
                for event in &changes {
                    match sink.notify(event).await {
                        Ok(()) => delivered += 1,
                        Err(e) => warn!("Error publishing change for {}: {e}", event.team),
                    }
                }
                if changes.is_empty() {
                    debug!("No line changes");
                } else {
                    info!(
                        "{} line change(s) over {}s, {delivered} published",
                        changes.len(),
                        snapshot.elapsed_since(previous).num_seconds()
                    );
                }
                CycleOutcome::Diffed {
                    changes: changes.len(),
                    delivered,
                }
            }
        };

        self.previous = Some(snapshot);
        outcome
    }

    /// Poll until `shutdown` turns `true` or its sender is dropped.
    ///
    /// The flag is checked before every cycle and raced against the sleep.
    pub async fn run(
        &mut self,
        source: &dyn SnapshotSource,
        sink: &dyn ChangeSink,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Polling every {}s", self.interval.as_secs());

        loop {
            if *shutdown.borrow() {
                info!("Shutdown signal received");
                return;
            }

            self.poll_cycle(source, sink).await;

            let sleep = tokio::time::sleep(self.next_delay());
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    result = shutdown.changed() => match result {
                        Ok(()) => {
                            if *shutdown.borrow() {
                                info!("Shutdown signal received");
                                return;
                            }
                        }
                        Err(_) => {
                            info!("Shutdown channel closed");
                            return;
                        }
                    },
                }
            }
        }
    }
}
