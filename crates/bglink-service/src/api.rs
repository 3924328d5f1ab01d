//! REST API endpoints for the bglink-service.
//!
//! # Concurrency and Lock Acquisition
//!
//! Handlers never hold two locks from this list at once, except in the order
//! given:
//!
//! 1. `config` (RwLock, read only)
//! 2. `ingest` (Mutex): pump clock and recency filters
//! 3. `store` (Mutex): held only for the duration of the queries
//! 4. `monitor` (Mutex): alert cooldowns
//!
//! The ingest handlers hold `ingest` for the whole upload, including the
//! Nightscout post, so two snapshots are never filtered concurrently. A
//! recency filter only advances once its readings are stored (or its entries
//! uploaded), so a failure is retried with the next snapshot.
//!
//! ## Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]. Store errors
//! return HTTP 500, except rejected readings which return 400.
//!
//! # Example
//!
//! ```ignore
//! use bglink_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};

use bglink_core::{Alert, AlertKind, AlertStatus, CareLinkData, DexcomEgv, TransformResult, dexcom};
use bglink_store::{ReadingQuery, ReadingSource, StoredReading};
use bglink_types::{AlertSettings, Reading, Trend};

use crate::state::AppState;

/// Readings returned by `GET /api/readings` when no limit is given.
pub const DEFAULT_READINGS_LIMIT: u32 = 50;
/// Largest page `GET /api/readings` will return.
pub const MAX_READINGS_LIMIT: u32 = 1000;
/// Stored readings handed to the alert evaluator as history.
const ALERT_HISTORY_LIMIT: u32 = 50;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/readings", get(get_readings).post(add_reading))
        .route("/api/settings", get(get_settings).post(save_settings))
        .route("/api/ingest/carelink", post(ingest_carelink))
        .route("/api/ingest/dexcom", post(ingest_dexcom))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Query parameters for `GET /api/readings`.
#[derive(Debug, Default, Deserialize)]
pub struct ReadingsQuery {
    pub limit: Option<u32>,
}

impl ReadingsQuery {
    /// Requested page size; missing or zero means the default, and large
    /// values are capped.
    pub fn effective_limit(&self) -> u32 {
        match self.limit {
            None | Some(0) => DEFAULT_READINGS_LIMIT,
            Some(limit) => limit.min(MAX_READINGS_LIMIT),
        }
    }
}

/// A stored reading with its alert annotation.
///
/// Only the newest reading in a response carries the alert details.
#[derive(Debug, Serialize)]
pub struct ReadingResponse {
    #[serde(flatten)]
    pub reading: StoredReading,
    pub alert: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_type: Option<AlertKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_volume: Option<f64>,
}

impl ReadingResponse {
    fn latest(reading: StoredReading, status: AlertStatus, volume: f64) -> Self {
        Self {
            reading,
            alert: status.alert,
            alert_type: status.alert_type,
            alert_message: status.alert_message,
            alert_volume: status.alert.then_some(volume),
        }
    }

    fn plain(reading: StoredReading) -> Self {
        Self {
            reading,
            alert: false,
            alert_type: None,
            alert_message: None,
            alert_volume: None,
        }
    }
}

/// Newest readings first; the newest is annotated with the current alert state.
async fn get_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadingsQuery>,
) -> Result<Json<Vec<ReadingResponse>>, AppError> {
    let limit = params.effective_limit();

    let (readings, settings) = {
        let store = state.store.lock().await;
        let readings = store.query_readings(&ReadingQuery::new().limit(limit))?;
        (readings, store.settings_or_default()?)
    };

    let history: Vec<Reading> = readings.iter().map(StoredReading::to_reading).collect();
    let status = AlertStatus::for_latest(&history, &settings, OffsetDateTime::now_utc());
    let volume = settings.clamped_volume();

    let mut status = Some(status);
    let data = readings
        .into_iter()
        .map(|stored| match status.take() {
            Some(status) => ReadingResponse::latest(stored, status, volume),
            None => ReadingResponse::plain(stored),
        })
        .collect();

    Ok(Json(data))
}

/// Request body for `POST /api/readings`.
#[derive(Debug, Deserialize)]
pub struct NewReadingRequest {
    /// Glucose in mg/dL.
    pub glucose_value: f64,
    #[serde(default)]
    pub trend: Trend,
    pub active_insulin: Option<f64>,
    pub pump_battery: Option<f64>,
    pub sensor_duration: Option<f64>,
}

/// A newly stored reading and the alert it fired, if any.
#[derive(Debug, Serialize)]
pub struct StoredResponse {
    pub reading: StoredReading,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
}

/// Store a reading stamped with the current time.
async fn add_reading(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewReadingRequest>,
) -> Result<(StatusCode, Json<StoredResponse>), AppError> {
    if !request.glucose_value.is_finite() || request.glucose_value <= 0.0 {
        return Err(AppError::BadRequest(format!(
            "glucose_value must be a positive number, got {}",
            request.glucose_value
        )));
    }

    let reading = Reading::new(request.glucose_value, OffsetDateTime::now_utc(), request.trend)
        .with_active_insulin(request.active_insulin)
        .with_pump_battery(request.pump_battery)
        .with_sensor_duration(request.sensor_duration);

    let response = record_reading(&state, ReadingSource::Manual, reading).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_settings(State(state): State<Arc<AppState>>) -> Result<Json<AlertSettings>, AppError> {
    let store = state.store.lock().await;
    Ok(Json(store.settings_or_default()?))
}

/// Replace the alert settings wholesale.
async fn save_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<AlertSettings>,
) -> Result<Json<AlertSettings>, AppError> {
    settings
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let store = state.store.lock().await;
    store.save_settings(&settings)?;
    Ok(Json(settings))
}

/// Query parameters for `POST /api/ingest/carelink`.
#[derive(Debug, Default, Deserialize)]
pub struct IngestQuery {
    /// Overrides `ingest.sgv_limit` for this upload.
    pub sgv_limit: Option<usize>,
}

/// Normalize a CareLink snapshot, store its newest reading and upload the new
/// entries to Nightscout when a site is configured.
///
/// Responds with the Nightscout records, which are empty for stale snapshots.
/// A failed Nightscout upload is logged and does not fail the request.
async fn ingest_carelink(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IngestQuery>,
    Json(data): Json<CareLinkData>,
) -> Result<Json<TransformResult>, AppError> {
    if params.sgv_limit == Some(0) {
        return Err(AppError::BadRequest(
            "sgv_limit must be at least 1".to_string(),
        ));
    }
    let sgv_limit = match params.sgv_limit {
        Some(limit) => Some(limit),
        None => state.config.read().await.ingest.sgv_limit,
    };

    let mut ingest = state.ingest.lock().await;
    let result = ingest.transformer.transform(&data, sgv_limit);
    let latest = ingest.transformer.latest_reading(&data);

    let fresh = ingest.carelink.peek(latest);
    if fresh.is_empty() {
        debug!("No new CareLink reading to store");
    }
    for reading in &fresh {
        record_reading(&state, ReadingSource::CareLink, *reading).await?;
    }
    ingest.carelink.commit(&fresh);

    if let Some(uploader) = &state.nightscout
        && !result.is_empty()
    {
        let entries = ingest.nightscout.peek(result.entries.iter().cloned());
        match uploader.upload(&entries, &result.devicestatus).await {
            Ok(()) => ingest.nightscout.commit(&entries),
            Err(e) => warn!("Nightscout upload failed: {}", e),
        }
    }

    Ok(Json(result))
}

/// Outcome of a Dexcom upload.
#[derive(Debug, Serialize)]
pub struct DexcomIngestResponse {
    /// Whether a new reading was stored.
    pub stored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading: Option<StoredReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
}

/// Store the newest entry of a Dexcom Share response.
async fn ingest_dexcom(
    State(state): State<Arc<AppState>>,
    Json(entries): Json<Vec<DexcomEgv>>,
) -> Result<Json<DexcomIngestResponse>, AppError> {
    let latest = dexcom::latest_reading(&entries, OffsetDateTime::now_utc());
    let mut ingest = state.ingest.lock().await;
    let fresh = ingest.dexcom.peek(latest);

    let Some(&reading) = fresh.first() else {
        debug!("No new Dexcom reading to store");
        return Ok(Json(DexcomIngestResponse {
            stored: false,
            reading: None,
            alert: None,
        }));
    };

    let response = record_reading(&state, ReadingSource::Dexcom, reading).await?;
    ingest.dexcom.commit(&fresh);
    Ok(Json(DexcomIngestResponse {
        stored: true,
        reading: Some(response.reading),
        alert: response.alert,
    }))
}

/// Persist a reading, evaluate alerts with cooldown and publish any that fire.
async fn record_reading(
    state: &AppState,
    source: ReadingSource,
    reading: Reading,
) -> Result<StoredResponse, AppError> {
    let (id, history, settings) = {
        let store = state.store.lock().await;
        let id = store.insert_reading(source.as_str(), &reading)?;
        let history = store.recent_readings(ALERT_HISTORY_LIMIT)?;
        (id, history, store.settings_or_default()?)
    };

    let alert = {
        let mut monitor = state.monitor.lock().await;
        monitor.check_reading(&reading, &history, &settings, OffsetDateTime::now_utc())
    };
    if let Some(alert) = &alert {
        state.publish(alert.clone(), Some(reading));
    }

    Ok(StoredResponse {
        reading: StoredReading {
            id,
            source: source.to_string(),
            reading,
        },
        alert,
    })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Store(bglink_store::Error),
}

impl From<bglink_store::Error> for AppError {
    fn from(e: bglink_store::Error) -> Self {
        match e {
            bglink_store::Error::InvalidReading(msg) => AppError::BadRequest(msg),
            other => AppError::Store(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
