//! Per-watch run guard.
//!
//! At most one run per watch id is in flight. A second run for the same
//! watch fails fast instead of interleaving its persistence with the first.
//! Runs for different watches never contend.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use bucketwatch_core::WatchId;

/// Tracks which watches currently have a run in flight.
#[derive(Clone, Default)]
pub struct RunGuard {
    running: Arc<Mutex<HashSet<WatchId>>>,
}

/// Held for the duration of a run; releases the watch on drop.
pub struct RunPermit {
    running: Arc<Mutex<HashSet<WatchId>>>,
    watch_id: WatchId,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `watch_id`, or `None` if a run for it is already in flight.
    pub fn try_acquire(&self, watch_id: &str) -> Option<RunPermit> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(watch_id.to_string()) {
            return None;
        }
        Some(RunPermit {
            running: Arc::clone(&self.running),
            watch_id: watch_id.to_string(),
        })
    }

    pub fn is_running(&self, watch_id: &str) -> bool {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.contains(watch_id)
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.remove(&self.watch_id);
    }
}
