//! Background stale-data monitor.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use bglink_core::Alert;

use crate::state::AppState;

/// Periodically raises a stale-data alert when no fresh reading has arrived.
pub struct StaleMonitor {
    state: Arc<AppState>,
}

impl StaleMonitor {
    /// Create a new monitor.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Spawn the check loop. Returns immediately.
    pub async fn start(&self) {
        let seconds = self.state.config.read().await.monitor.stale_check_interval;
        info!("Starting stale-data monitor (interval: {}s)", seconds);

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            run(state, Duration::from_secs(seconds)).await;
        });
    }
}

async fn run(state: Arc<AppState>, period: Duration) {
    let mut interval_timer = interval(period);
    let mut consecutive_failures = 0u32;

    loop {
        interval_timer.tick().await;

        match check_once(&state, OffsetDateTime::now_utc()).await {
            Ok(Some(alert)) => {
                consecutive_failures = 0;
                state.publish(alert, None);
            }
            Ok(None) => {
                consecutive_failures = 0;
                debug!("Stale-data check passed");
            }
            Err(e) => {
                consecutive_failures += 1;
                if consecutive_failures <= 3 {
                    warn!("Stale-data check failed: {} (attempt {})", e, consecutive_failures);
                } else if consecutive_failures == 4 {
                    error!(
                        "Stale-data check failed {} times, will continue trying silently",
                        consecutive_failures
                    );
                }
            }
        }
    }
}

/// Run one stale-data check at `now`.
///
/// Returns the alert if one fired. No stored readings means nothing to check.
pub async fn check_once(state: &AppState, now: OffsetDateTime) -> Result<Option<Alert>, MonitorError> {
    let (latest, settings) = {
        let store = state.store.lock().await;
        let latest = store.latest_reading().map_err(MonitorError::Store)?;
        let settings = store.settings_or_default().map_err(MonitorError::Store)?;
        (latest, settings)
    };

    let latest = latest.map(|stored| stored.to_reading());
    let mut monitor = state.monitor.lock().await;
    Ok(monitor.check_stale(latest.as_ref(), &settings, now))
}

/// Monitor errors.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Failed to load from store: {0}")]
    Store(bglink_store::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use bglink_core::AlertKind;
    use bglink_store::Store;
    use bglink_types::{AlertSettings, Reading, Trend};

    use crate::config::Config;

    fn t0() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn state_with_reading_at(at: OffsetDateTime) -> Arc<AppState> {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_reading("carelink", &Reading::new(110.0, at, Trend::Flat))
            .unwrap();
        AppState::new(store, Config::default())
    }

    #[tokio::test]
    async fn test_empty_store_never_alerts() {
        let state = AppState::new(Store::open_in_memory().unwrap(), Config::default());
        assert!(check_once(&state, t0()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fresh_reading_does_not_alert() {
        let state = state_with_reading_at(t0());
        let now = t0() + time::Duration::minutes(19);
        assert!(check_once(&state, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_alert_respects_cooldown() {
        let state = state_with_reading_at(t0());

        let first = t0() + time::Duration::minutes(25);
        let alert = check_once(&state, first).await.unwrap().unwrap();
        assert_eq!(alert.kind, AlertKind::Stale);

        // Stale alerts cool down for 30 minutes.
        let during = first + time::Duration::minutes(29);
        assert!(check_once(&state, during).await.unwrap().is_none());

        let after = first + time::Duration::minutes(31);
        assert!(check_once(&state, after).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_disabled_stale_alert() {
        let state = state_with_reading_at(t0());
        {
            let store = state.store.lock().await;
            store
                .save_settings(&AlertSettings {
                    stale_data_enabled: false,
                    ..Default::default()
                })
                .unwrap();
        }

        let now = t0() + time::Duration::hours(2);
        assert!(check_once(&state, now).await.unwrap().is_none());
    }
}
