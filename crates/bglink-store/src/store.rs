//! Main store implementation.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use time::OffsetDateTime;
use tracing::{debug, info};

use bglink_types::{AlertSettings, Reading};

use crate::error::{Error, Result};
use crate::models::StoredReading;
use crate::queries::ReadingQuery;
use crate::schema;

/// SQLite-based store for glucose readings and alert settings.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

// Reading operations
impl Store {
    /// Append a reading. Returns the new row ID.
    pub fn insert_reading(&self, source: &str, reading: &Reading) -> Result<i64> {
        if !reading.glucose_value.is_finite() {
            return Err(Error::InvalidReading(format!(
                "glucose_value must be finite, got {}",
                reading.glucose_value
            )));
        }

        self.conn.execute(
            "INSERT INTO readings (source, timestamp, glucose_value, trend, active_insulin,
             pump_battery, sensor_duration, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                source,
                unix_millis(reading.timestamp),
                reading.glucose_value,
                reading.trend.as_str(),
                reading.active_insulin,
                reading.pump_battery,
                reading.sensor_duration,
                unix_millis(OffsetDateTime::now_utc()),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(
            "Stored {} reading {} ({} mg/dL)",
            source, id, reading.glucose_value
        );
        Ok(id)
    }

    /// Query readings with filters.
    pub fn query_readings(&self, query: &ReadingQuery) -> Result<Vec<StoredReading>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let readings = stmt
            .query_map(params_ref.as_slice(), |row| {
                let reading = Reading {
                    glucose_value: row.get(3)?,
                    timestamp: from_millis(2, row.get(2)?)?,
                    trend: row.get::<_, String>(4)?.parse().unwrap_or_default(),
                    active_insulin: row.get(5)?,
                    pump_battery: row.get(6)?,
                    sensor_duration: row.get(7)?,
                };
                Ok(StoredReading {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    reading,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// The newest reading, if any.
    pub fn latest_reading(&self) -> Result<Option<StoredReading>> {
        let mut readings = self.query_readings(&ReadingQuery::new().limit(1))?;
        Ok(readings.pop())
    }

    /// The newest `limit` readings, newest first.
    pub fn recent_readings(&self, limit: u32) -> Result<Vec<Reading>> {
        let readings = self.query_readings(&ReadingQuery::new().limit(limit))?;
        Ok(readings.into_iter().map(|stored| stored.reading).collect())
    }

    /// Count readings, optionally for one source.
    pub fn count_readings(&self, source: Option<&str>) -> Result<u64> {
        let count: i64 = match source {
            Some(source) => self.conn.query_row(
                "SELECT COUNT(*) FROM readings WHERE source = ?",
                [source],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?,
        };

        Ok(count as u64)
    }
}

// Settings operations
impl Store {
    /// The saved alert settings, if any have been saved.
    pub fn get_settings(&self) -> Result<Option<AlertSettings>> {
        let data: Option<String> = self
            .conn
            .query_row("SELECT data FROM settings WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        data.map(|json| serde_json::from_str(&json).map_err(Error::from))
            .transpose()
    }

    /// The saved alert settings, or the defaults.
    pub fn settings_or_default(&self) -> Result<AlertSettings> {
        Ok(self.get_settings()?.unwrap_or_default())
    }

    /// Replace the alert settings wholesale.
    pub fn save_settings(&self, settings: &AlertSettings) -> Result<()> {
        let data = serde_json::to_string(settings)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (id, data, updated_at) VALUES (1, ?1, ?2)",
            rusqlite::params![data, unix_millis(OffsetDateTime::now_utc())],
        )?;
        info!("Saved alert settings");
        Ok(())
    }
}

/// Epoch milliseconds of an instant.
pub(crate) fn unix_millis(dt: OffsetDateTime) -> i64 {
    (dt.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(column: usize, millis: i64) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Integer, Box::new(e)))
}
