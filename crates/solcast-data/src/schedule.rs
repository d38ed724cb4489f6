//! Recurring background sync registration.
//!
//! In-process counterpart of a host job scheduler: jobs are named by tag,
//! re-registering a tag replaces the previous job, and each job drives
//! `fetch_weather` on its interval. Registration does not survive the
//! process; callers re-register on first use (the repository does this in
//! `initialize_data`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::network::{FetchError, WeatherNetworkDataSource};

/// Tag identifying the forecast sync job.
pub const SYNC_TAG: &str = "solcast-sync";

const SYNC_INTERVAL: Duration = Duration::from_secs(3 * 60 * 60);
const SYNC_FLEX: Duration = Duration::from_secs(60 * 60);

/// Parameters of one recurring sync registration.
#[derive(Debug, Clone)]
pub struct SyncSchedule {
    pub tag: String,

    /// Time between fetches.
    pub interval: Duration,

    /// Delivery tolerance: a fetch landing anywhere in
    /// `[interval, interval + flex]` after the previous one is on time.
    pub flex: Duration,

    /// Whether the fetch only makes sense with connectivity. There is no
    /// in-process connectivity signal, so an unreachable network shows up as
    /// a transport failure on the tick and the job waits for the next window.
    pub require_network: bool,
}

impl Default for SyncSchedule {
    fn default() -> Self {
        Self {
            tag: SYNC_TAG.to_string(),
            interval: SYNC_INTERVAL,
            flex: SYNC_FLEX,
            require_network: true,
        }
    }
}

/// Owns the set of running recurring jobs, keyed by tag.
#[derive(Default)]
pub struct SyncScheduler {
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recurring fetch job.
    ///
    /// Registering again under the same tag replaces the previous job, so
    /// there is never more than one job per tag.
    pub fn schedule_recurring(
        &self,
        schedule: SyncSchedule,
        source: Arc<WeatherNetworkDataSource>,
    ) {
        let mut jobs = self.jobs.lock();
        if let Some(previous) = jobs.remove(&schedule.tag) {
            previous.abort();
            tracing::debug!(tag = %schedule.tag, "replacing existing sync job");
        }

        let tag = schedule.tag.clone();
        let handle = tokio::spawn(run_schedule(schedule, source));
        jobs.insert(tag, handle);
        tracing::info!("sync job scheduled");
    }

    pub fn is_scheduled(&self, tag: &str) -> bool {
        self.jobs.lock().contains_key(tag)
    }

    pub fn active_tags(&self) -> Vec<String> {
        self.jobs.lock().keys().cloned().collect()
    }

    /// Cancel the job registered under `tag`; returns whether one existed.
    pub fn cancel(&self, tag: &str) -> bool {
        match self.jobs.lock().remove(tag) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        for handle in self.jobs.lock().values() {
            handle.abort();
        }
    }
}

async fn run_schedule(schedule: SyncSchedule, source: Arc<WeatherNetworkDataSource>) {
    let mut ticks = tokio::time::interval(schedule.interval);
    // A late tick slides the whole schedule instead of bursting to catch up.
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial catch-up fetch is the
    // repository's call, not the schedule's.
    ticks.tick().await;

    loop {
        ticks.tick().await;
        match source.fetch_weather().await {
            Ok(days) => tracing::info!(days, tag = %schedule.tag, "scheduled fetch complete"),
            Err(FetchError::Transport(e)) if schedule.require_network => {
                tracing::debug!(error = %e, tag = %schedule.tag, "network unavailable, waiting for next window");
            }
            Err(e) => tracing::warn!(error = %e, tag = %schedule.tag, "scheduled fetch failed"),
        }
    }
}
