//! Forecast data layer for solcast.
//!
//! Owns the synchronization core: fetching forecast data over HTTP, parsing
//! it, persisting it in a local SQLite cache, and exposing live queries over
//! the cached records. Display code goes through [`ForecastRepository`] and
//! nothing else.

pub mod network;
pub mod parser;
pub mod repository;
pub mod schedule;
pub mod store;
pub mod types;

pub use network::{FetchError, ForecastEndpoint, WeatherNetworkDataSource, NUM_FORECAST_DAYS};
pub use parser::{ParseError, ParseOutcome};
pub use repository::ForecastRepository;
pub use schedule::{SyncSchedule, SyncScheduler, SYNC_TAG};
pub use store::{ForecastStore, StoreError};
pub use types::{today_utc, ForecastRecord, ForecastSummary, Units, WeatherResponse};
