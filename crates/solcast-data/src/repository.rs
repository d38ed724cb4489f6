//! Repository: the single coordination point between the network data source
//! and the persistent store.
//!
//! Owns the rule that binds fetched forecasts to storage, the staleness
//! decision, and the live queries display code reads from. Constructed once
//! by the application's composition root and shared via `Arc`; there are no
//! global singletons.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::watch;
use tokio::task::{self, JoinHandle};

use crate::network::{WeatherNetworkDataSource, NUM_FORECAST_DAYS};
use crate::schedule::{SyncSchedule, SyncScheduler};
use crate::store::{ForecastStore, StoreError};
use crate::types::{today_utc, ForecastRecord, ForecastSummary};

pub struct ForecastRepository {
    store: Arc<ForecastStore>,
    network: Arc<WeatherNetworkDataSource>,
    scheduler: SyncScheduler,
    schedule: SyncSchedule,
    initialized: AtomicBool,
    /// Bumped after every store mutation; live queries re-run on each bump.
    changed: watch::Sender<u64>,
    ingest: JoinHandle<Result<(), StoreError>>,
}

impl ForecastRepository {
    /// Build the repository and start its network-to-store subscription.
    ///
    /// The subscription exists before any fetch can be triggered, so no
    /// published forecast is ever dropped for lack of a subscriber.
    pub fn new(
        store: Arc<ForecastStore>,
        network: Arc<WeatherNetworkDataSource>,
        schedule: SyncSchedule,
    ) -> Arc<Self> {
        let (changed, _) = watch::channel(0u64);
        let ingest = spawn_ingest(Arc::clone(&store), network.subscribe(), changed.clone());

        Arc::new(Self {
            store,
            network,
            scheduler: SyncScheduler::new(),
            schedule,
            initialized: AtomicBool::new(false),
            changed,
            ingest,
        })
    }

    /// Register the recurring sync and trigger a catch-up fetch if the
    /// stored forecast is stale.
    ///
    /// Runs its body at most once per process; concurrent first callers race
    /// on an atomic flag and exactly one wins. The staleness check and any
    /// resulting fetch run off the calling task.
    pub fn initialize_data(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("initializing forecast data");

        self.scheduler
            .schedule_recurring(self.schedule.clone(), Arc::clone(&self.network));

        let store = Arc::clone(&self.store);
        let network = Arc::clone(&self.network);
        tokio::spawn(async move {
            let today = today_utc();
            match task::spawn_blocking(move || store.count_from(today)).await {
                Ok(Ok(count)) if count < NUM_FORECAST_DAYS => {
                    tracing::info!(stored = count, "stored forecast is stale, fetching");
                    network.request_fetch();
                }
                Ok(Ok(count)) => {
                    tracing::debug!(stored = count, "stored forecast is current");
                }
                Ok(Err(e)) => tracing::error!(error = %e, "staleness check failed"),
                Err(e) => tracing::error!(error = %e, "staleness check task failed"),
            }
        });
    }

    /// Live view over all stored records with date >= today, ordered by
    /// date.
    ///
    /// The receiver starts at an empty placeholder, then observes the current
    /// query result and every subsequent change to the store. Dropping every
    /// receiver retires the standing query.
    pub fn current_forecasts(&self) -> watch::Receiver<Vec<ForecastSummary>> {
        self.initialize_data();
        let today = today_utc();
        self.live_query(move |store| store.forecasts_from(today))
    }

    /// Live view of the single record for `date`, or `None` while absent.
    pub fn forecast_for_date(&self, date: NaiveDate) -> watch::Receiver<Option<ForecastRecord>> {
        self.initialize_data();
        self.live_query(move |store| store.forecast_on(date))
    }

    /// Delete all stored records with date strictly before today.
    ///
    /// Not called by any fetch path; this is the maintenance hook for a
    /// caller-owned cleanup trigger.
    pub async fn delete_old_data(&self) -> Result<u32, StoreError> {
        let store = Arc::clone(&self.store);
        let today = today_utc();
        let removed = task::spawn_blocking(move || store.delete_before(today)).await??;
        if removed > 0 {
            self.changed.send_modify(|v| *v += 1);
        }
        tracing::debug!(removed, "old forecast data deleted");
        Ok(removed)
    }

    /// Change notification for the stored forecast: the observed value
    /// increments after every store mutation. Lets callers observe that an
    /// ingest or cleanup has landed without polling the store.
    pub fn data_version(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    /// Scheduler owning this repository's recurring sync registration.
    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    /// False once the ingest subscription has terminated, which only happens
    /// on a storage failure. The host decides what to do with a dead ingest;
    /// the repository keeps serving whatever is already stored.
    pub fn ingest_running(&self) -> bool {
        !self.ingest.is_finished()
    }

    fn live_query<T, F>(&self, query: F) -> watch::Receiver<T>
    where
        T: Default + Clone + Send + Sync + 'static,
        F: Fn(&ForecastStore) -> Result<T, StoreError> + Send + Sync + 'static,
    {
        let (tx, rx) = watch::channel(T::default());
        let store = Arc::clone(&self.store);
        let mut changes = self.changed.subscribe();
        let query = Arc::new(query);

        tokio::spawn(async move {
            loop {
                let store = Arc::clone(&store);
                let query = Arc::clone(&query);
                match task::spawn_blocking(move || query(&store)).await {
                    Ok(Ok(value)) => {
                        if tx.send(value).is_err() {
                            // Every receiver is gone; retire the query.
                            return;
                        }
                    }
                    Ok(Err(e)) => tracing::error!(error = %e, "live query failed"),
                    Err(e) => tracing::error!(error = %e, "live query task failed"),
                }
                if changes.changed().await.is_err() {
                    return;
                }
            }
        });

        rx
    }
}

impl Drop for ForecastRepository {
    fn drop(&mut self) {
        self.ingest.abort();
    }
}

/// Consume published forecasts and write each batch to the store.
///
/// A storage failure ends the subscription with the error after logging it;
/// it is not swallowed. The join handle is the host's observation point.
fn spawn_ingest(
    store: Arc<ForecastStore>,
    mut updates: watch::Receiver<Option<Vec<ForecastRecord>>>,
    changed: watch::Sender<u64>,
) -> JoinHandle<Result<(), StoreError>> {
    tokio::spawn(async move {
        loop {
            if updates.changed().await.is_err() {
                // Network data source dropped; nothing more will arrive.
                return Ok(());
            }
            let Some(records) = updates.borrow_and_update().clone() else {
                continue;
            };

            let store = Arc::clone(&store);
            match task::spawn_blocking(move || store.bulk_replace(&records)).await {
                Ok(Ok(())) => {
                    tracing::debug!("new forecast values stored");
                    changed.send_modify(|v| *v += 1);
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "storing fetched forecasts failed");
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "storage task failed");
                    return Err(StoreError::Task(e));
                }
            }
        }
    })
}
