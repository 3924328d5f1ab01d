//! Local data persistence for bglink glucose readings.
//!
//! SQLite-backed storage for normalized readings (append-only, read back
//! newest first) and the alert settings singleton.
//!
//! # Example
//!
//! ```
//! use bglink_store::{ReadingQuery, Store};
//! use bglink_types::{Reading, Trend};
//! use time::OffsetDateTime;
//!
//! let store = Store::open_in_memory()?;
//! store.insert_reading("manual", &Reading::new(112.0, OffsetDateTime::now_utc(), Trend::Flat))?;
//!
//! let readings = store.query_readings(&ReadingQuery::new().limit(10))?;
//! assert_eq!(readings.len(), 1);
//! # Ok::<(), bglink_store::Error>(())
//! ```

mod error;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use models::{ReadingSource, StoredReading};
pub use queries::ReadingQuery;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/bglink/data.db`
/// - macOS: `~/Library/Application Support/bglink/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\bglink\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("bglink")
        .join("data.db")
}
