//! SQLite-backed persistent store for forecast records.
//!
//! The only durable copy of forecast data. Rows are keyed by the record's
//! calendar date (stored as epoch milliseconds of UTC midnight), so writes
//! for the same date replace each other and date lookups are exact-match.

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;

use crate::types::{date_to_epoch_ms, epoch_ms_to_date, ForecastRecord, ForecastSummary};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// SQLite store for forecast records.
///
/// The connection sits behind a mutex so the store can be shared across
/// tasks and called from the blocking pool.
pub struct ForecastStore {
    conn: Mutex<Connection>,
}

impl ForecastStore {
    /// Open (or create) the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    #[cfg(test)]
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS forecast (
                date_ms INTEGER PRIMARY KEY,
                weather_id INTEGER NOT NULL,
                temp_max REAL NOT NULL,
                temp_min REAL NOT NULL,
                humidity INTEGER NOT NULL,
                pressure REAL NOT NULL,
                wind_speed REAL NOT NULL,
                wind_direction REAL NOT NULL,
                cached_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Insert records, replacing any existing record for the same date.
    ///
    /// Runs as a single transaction: either every record lands or none does.
    pub fn bulk_replace(&self, records: &[ForecastRecord]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO forecast
                (date_ms, weather_id, temp_max, temp_min, humidity, pressure, wind_speed, wind_direction, cached_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;
            let now = Utc::now().timestamp_millis();
            for record in records {
                stmt.execute(params![
                    date_to_epoch_ms(record.date),
                    record.weather_id,
                    record.temp_max,
                    record.temp_min,
                    record.humidity,
                    record.pressure,
                    record.wind_speed,
                    record.wind_direction,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// List summaries for all records with date >= `day`, ordered by date.
    pub fn forecasts_from(&self, day: NaiveDate) -> Result<Vec<ForecastSummary>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT date_ms, weather_id, temp_max, temp_min
             FROM forecast
             WHERE date_ms >= ?1
             ORDER BY date_ms ASC",
        )?;

        let rows = stmt.query_map(params![date_to_epoch_ms(day)], Self::row_to_summary)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Fetch the full record for one date, if present.
    pub fn forecast_on(&self, day: NaiveDate) -> Result<Option<ForecastRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT date_ms, weather_id, temp_max, temp_min, humidity, pressure, wind_speed, wind_direction
             FROM forecast
             WHERE date_ms = ?1",
        )?;

        let mut rows = stmt.query(params![date_to_epoch_ms(day)])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::row_to_record(row)?))
        } else {
            Ok(None)
        }
    }

    /// Count records with date >= `day`.
    pub fn count_from(&self, day: NaiveDate) -> Result<u32, StoreError> {
        let count: u32 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM forecast WHERE date_ms >= ?1",
            params![date_to_epoch_ms(day)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete all records with date strictly before `day`; returns how many
    /// were removed.
    pub fn delete_before(&self, day: NaiveDate) -> Result<u32, StoreError> {
        let removed = self.conn.lock().execute(
            "DELETE FROM forecast WHERE date_ms < ?1",
            params![date_to_epoch_ms(day)],
        )?;
        Ok(removed as u32)
    }

    fn row_to_summary(row: &rusqlite::Row) -> rusqlite::Result<ForecastSummary> {
        Ok(ForecastSummary {
            date: epoch_ms_to_date(row.get(0)?),
            weather_id: row.get(1)?,
            temp_max: row.get(2)?,
            temp_min: row.get(3)?,
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ForecastRecord> {
        Ok(ForecastRecord {
            date: epoch_ms_to_date(row.get(0)?),
            weather_id: row.get(1)?,
            temp_max: row.get(2)?,
            temp_min: row.get(3)?,
            humidity: row.get(4)?,
            pressure: row.get(5)?,
            wind_speed: row.get(6)?,
            wind_direction: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use chrono::Days;

    fn record(date: NaiveDate, weather_id: i32, max: f64) -> ForecastRecord {
        ForecastRecord {
            date,
            weather_id,
            temp_max: max,
            temp_min: max - 10.0,
            humidity: 60,
            pressure: 1012.0,
            wind_speed: 5.5,
            wind_direction: 90.0,
        }
    }

    fn day(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 6).unwrap() + Days::new(offset)
    }

    #[test]
    fn bulk_replace_and_read_back() {
        let store = ForecastStore::in_memory().unwrap();
        store
            .bulk_replace(&[record(day(0), 500, 20.0), record(day(1), 800, 24.0)])
            .unwrap();

        let found = store.forecast_on(day(1)).unwrap().unwrap();
        assert_eq!(found.weather_id, 800);
        assert_eq!(found.temp_max, 24.0);
    }

    #[test]
    fn missing_date_reads_as_none() {
        let store = ForecastStore::in_memory().unwrap();
        assert!(store.forecast_on(day(0)).unwrap().is_none());
    }

    #[test]
    fn replace_for_same_date_is_idempotent() {
        let store = ForecastStore::in_memory().unwrap();
        store.bulk_replace(&[record(day(0), 500, 20.0)]).unwrap();
        store.bulk_replace(&[record(day(0), 800, 31.0)]).unwrap();

        assert_eq!(store.count_from(day(0)).unwrap(), 1);
        let found = store.forecast_on(day(0)).unwrap().unwrap();
        assert_eq!(found.weather_id, 800);
        assert_eq!(found.temp_max, 31.0);
    }

    #[test]
    fn range_query_is_ordered_and_excludes_past() {
        let store = ForecastStore::in_memory().unwrap();
        // Inserted out of order on purpose.
        store
            .bulk_replace(&[
                record(day(2), 600, 2.0),
                record(day(0), 500, 20.0),
                record(day(1), 800, 24.0),
            ])
            .unwrap();

        let rows = store.forecasts_from(day(1)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, day(1));
        assert_eq!(rows[1].date, day(2));
    }

    #[test]
    fn count_from_counts_today_and_later() {
        let store = ForecastStore::in_memory().unwrap();
        let records: Vec<_> = (0..5).map(|i| record(day(i), 800, 20.0)).collect();
        store.bulk_replace(&records).unwrap();

        assert_eq!(store.count_from(day(0)).unwrap(), 5);
        assert_eq!(store.count_from(day(3)).unwrap(), 2);
        assert_eq!(store.count_from(day(5)).unwrap(), 0);
    }

    #[test]
    fn delete_before_removes_only_older_days() {
        let store = ForecastStore::in_memory().unwrap();
        let records: Vec<_> = (0..4).map(|i| record(day(i), 800, 20.0)).collect();
        store.bulk_replace(&records).unwrap();

        let removed = store.delete_before(day(2)).unwrap();
        assert_eq!(removed, 2);
        assert!(store.forecast_on(day(0)).unwrap().is_none());
        assert!(store.forecast_on(day(2)).unwrap().is_some());
        assert_eq!(store.count_from(day(0)).unwrap(), 2);
    }

    #[test]
    fn bulk_replace_of_empty_slice_is_a_no_op() {
        let store = ForecastStore::in_memory().unwrap();
        store.bulk_replace(&[]).unwrap();
        assert_eq!(store.count_from(day(0)).unwrap(), 0);
    }
}
