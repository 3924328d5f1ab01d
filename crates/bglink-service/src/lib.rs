//! HTTP ingest, storage and alerting service for glucose readings.
//!
//! This crate provides a service that:
//! - Accepts raw CareLink snapshots and Dexcom Share responses
//! - Normalizes them, skipping readings it has already stored
//! - Stores readings and alert settings in the local database
//! - Evaluates glucose alerts with per-type cooldowns
//! - Periodically checks for stale data
//! - Uploads new CareLink entries to a Nightscout site, when configured
//!
//! # REST API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/readings?limit=N` - Newest readings, the first annotated with alert state
//! - `POST /api/readings` - Record a manual reading
//! - `GET /api/settings` - Alert settings (defaults until saved)
//! - `POST /api/settings` - Replace alert settings
//! - `POST /api/ingest/carelink?sgv_limit=N` - CareLink snapshot to Nightscout records
//! - `POST /api/ingest/dexcom` - Dexcom Share glucose values
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/bglink/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//! broadcast_buffer = 100
//!
//! [storage]
//! path = "~/.local/share/bglink/data.db"
//!
//! [monitor]
//! stale_check_interval = 600
//!
//! [ingest]
//! sgv_limit = 288
//!
//! [nightscout]
//! url = "https://my-site.herokuapp.com"
//! api_secret = "correct horse battery staple"
//! ```

pub mod api;
pub mod config;
pub mod monitor;
pub mod nightscout;
pub mod state;

pub use config::{
    Config, ConfigError, IngestConfig, MonitorConfig, NightscoutConfig, ServerConfig,
    StorageConfig, ValidationError,
};
pub use monitor::{MonitorError, StaleMonitor};
pub use nightscout::{NightscoutUploader, UploadError};
pub use state::{AlertEvent, AppState, IngestState};
