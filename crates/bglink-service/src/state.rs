//! Application state shared across handlers.
//!
//! # Alert Channel
//!
//! Fired alerts are published on `alerts_tx`, a `tokio::sync::broadcast`
//! channel sized by `server.broadcast_buffer` (default: 100). Senders never
//! block; a subscriber that falls behind loses the oldest alerts. Sending with
//! no subscribers is not an error.
//!
//! # Per-process State
//!
//! The alert cooldowns, the pump clock and the recency filters live only in
//! memory and reset on restart. After a restart the first CareLink snapshot
//! is uploaded to Nightscout in full again; Nightscout deduplicates entries
//! on `date`.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock, broadcast};

use tracing::warn;

use bglink_core::{Alert, AlertMonitor, RecencyFilter, SgvEntry, Transformer};
use bglink_store::Store;
use bglink_types::Reading;

use crate::config::Config;
use crate::nightscout::NightscoutUploader;

/// Recency filter over canonical readings, keyed on reading time.
pub type ReadingFilter = RecencyFilter<Reading, fn(&Reading) -> i64>;
/// Recency filter over Nightscout entries, keyed on `date`.
pub type EntryFilter = RecencyFilter<SgvEntry, fn(&SgvEntry) -> i64>;

/// Shared application state.
pub struct AppState {
    /// The data store (wrapped in Mutex for thread-safe access).
    pub store: Mutex<Store>,
    /// Configuration (RwLock for runtime reads).
    pub config: RwLock<Config>,
    /// Broadcast channel for fired alerts.
    pub alerts_tx: broadcast::Sender<AlertEvent>,
    /// Alert cooldown tracking, one per process.
    pub monitor: Mutex<AlertMonitor>,
    /// Vendor normalization state.
    pub ingest: Mutex<IngestState>,
    /// Nightscout client, when a site is configured.
    pub nightscout: Option<NightscoutUploader>,
}

impl AppState {
    /// Create new application state.
    ///
    /// The broadcast channel buffer size is determined by `config.server.broadcast_buffer`.
    pub fn new(store: Store, config: Config) -> Arc<Self> {
        let buffer_size = config.server.broadcast_buffer.max(1);
        let (alerts_tx, _) = broadcast::channel(buffer_size);
        let nightscout = NightscoutUploader::from_config(&config.nightscout).unwrap_or_else(|e| {
            warn!("Nightscout upload disabled: {}", e);
            None
        });
        Arc::new(Self {
            store: Mutex::new(store),
            config: RwLock::new(config),
            alerts_tx,
            monitor: Mutex::new(AlertMonitor::new()),
            ingest: Mutex::new(IngestState::new()),
            nightscout,
        })
    }

    /// Publish a fired alert. Returns the number of subscribers reached.
    pub fn publish(&self, alert: Alert, reading: Option<Reading>) -> usize {
        let event = AlertEvent {
            alert,
            reading,
            fired_at: OffsetDateTime::now_utc(),
        };
        self.alerts_tx.send(event).unwrap_or(0)
    }
}

/// A fired alert, published for notification dispatchers.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub alert: Alert,
    /// The reading that triggered it. Absent for stale-data alerts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading: Option<Reading>,
    #[serde(with = "time::serde::rfc3339")]
    pub fired_at: OffsetDateTime,
}

/// Stateful pieces of the vendor ingest path.
#[derive(Debug)]
pub struct IngestState {
    /// CareLink normalizer; remembers the pump clock offset.
    pub transformer: Transformer,
    /// Drops CareLink readings already stored.
    pub carelink: ReadingFilter,
    /// Drops Dexcom readings already stored.
    pub dexcom: ReadingFilter,
    /// Drops CareLink entries already uploaded to Nightscout.
    pub nightscout: EntryFilter,
}

impl IngestState {
    pub fn new() -> Self {
        Self {
            transformer: Transformer::new(),
            carelink: RecencyFilter::new(reading_millis as fn(&Reading) -> i64),
            dexcom: RecencyFilter::new(reading_millis as fn(&Reading) -> i64),
            nightscout: RecencyFilter::new(entry_millis as fn(&SgvEntry) -> i64),
        }
    }
}

impl Default for IngestState {
    fn default() -> Self {
        Self::new()
    }
}

fn reading_millis(reading: &Reading) -> i64 {
    (reading.timestamp.unix_timestamp_nanos() / 1_000_000) as i64
}

fn entry_millis(entry: &SgvEntry) -> i64 {
    entry.date
}
