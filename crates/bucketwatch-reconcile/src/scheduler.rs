//! Watch scheduler — periodically runs every configured watch.
//!
//! Each tick reads a fresh copy of all watches and spawns one task per
//! watch. Runs for different watches proceed concurrently; a watch whose
//! previous run is still in flight is skipped by the [`RunGuard`](crate::RunGuard).

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use bucketwatch_state::StateStore;

use crate::error::{ReconcileError, ReconcileResult};
use crate::reconciler::{Reconciler, RunReport};

/// Drives reconciliation runs for the watches in the state store.
#[derive(Clone)]
pub struct WatchScheduler {
    state: StateStore,
    reconciler: Reconciler,
    interval: Duration,
}

impl WatchScheduler {
    pub fn new(state: StateStore, reconciler: Reconciler, interval: Duration) -> Self {
        Self {
            state,
            reconciler,
            interval,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Run one watch by id.
    pub async fn run_watch(&self, watch_id: &str) -> ReconcileResult<RunReport> {
        let watch = self.state.find_watch(watch_id)?;
        self.reconciler.run(&watch).await
    }

    /// Run every watch once, concurrently, and collect the reports of the
    /// runs that completed. Failed runs are logged and left out.
    pub async fn run_all(&self) -> ReconcileResult<Vec<RunReport>> {
        let watches = self.state.list_watches()?;
        debug!(watches = watches.len(), "running all watches");

        let mut tasks = JoinSet::new();
        for watch in watches {
            let reconciler = self.reconciler.clone();
            tasks.spawn(async move {
                let result = reconciler.run(&watch).await;
                (watch.id, result)
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(report))) => reports.push(report),
                Ok((watch_id, Err(ReconcileError::AlreadyRunning(_)))) => {
                    debug!(%watch_id, "previous run still in flight, skipping");
                }
                Ok((watch_id, Err(e))) => {
                    error!(%watch_id, error = %e, "watch run failed");
                }
                Err(e) => {
                    error!(error = %e, "watch run task panicked");
                }
            }
        }
        Ok(reports)
    }

    /// Run the periodic loop until shutdown signal. A signal that arrives
    /// mid-run cancels the in-flight runs; items already persisted stay.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "watch scheduler started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    tokio::select! {
                        result = self.run_all() => {
                            if let Err(e) = result {
                                warn!(error = %e, "failed to list watches for scheduled run");
                            }
                        }
                        _ = shutdown.changed() => {
                            info!("watch scheduler shutting down, cancelling in-flight runs");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("watch scheduler shutting down");
                    break;
                }
            }
        }
    }
}
