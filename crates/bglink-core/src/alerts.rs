//! Glucose alert evaluation.
//!
//! [`evaluate`] is a pure function of the latest reading, a newest-first
//! history window and the user's [`AlertSettings`]. [`AlertMonitor`] wraps it
//! with per-type cooldowns so a persisting condition is not re-announced on
//! every poll.
//!
//! Thresholds are compared in the user's display unit, so with mmol/L
//! settings the reading is converted (and rounded to one decimal) first.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use bglink_types::{AlertSettings, GlucoseUnit, Reading};

/// Look-back distance for the rapid rise/fall comparison.
pub const RAPID_CHANGE_WINDOW: Duration = Duration::minutes(15);
/// Age at which the latest reading counts as stale.
pub const STALE_AFTER: Duration = Duration::minutes(20);
/// Minimum interval between two firings of the same glucose alert.
pub const ALERT_COOLDOWN: Duration = Duration::minutes(5);
/// Minimum interval between two stale-data alerts.
pub const STALE_COOLDOWN: Duration = Duration::minutes(30);

/// Alert condition, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Low,
    High,
    RapidRise,
    RapidFall,
    Stale,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Low => "low",
            AlertKind::High => "high",
            AlertKind::RapidRise => "rapid_rise",
            AlertKind::RapidFall => "rapid_fall",
            AlertKind::Stale => "stale",
        }
    }

    /// Short notification title.
    pub fn title(&self) -> &'static str {
        match self {
            AlertKind::Low => "Low BG",
            AlertKind::High => "High BG",
            AlertKind::RapidRise => "Rapid Rise",
            AlertKind::RapidFall => "Rapid Fall",
            AlertKind::Stale => "Stale Data",
        }
    }

    pub fn cooldown(&self) -> Duration {
        match self {
            AlertKind::Stale => STALE_COOLDOWN,
            _ => ALERT_COOLDOWN,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spoken/notification text for an alert.
///
/// `display_value` is only used by the low and high templates.
pub fn message(kind: AlertKind, name: &str, display_value: Option<f64>) -> String {
    match (kind, display_value) {
        (AlertKind::Low | AlertKind::High, Some(value)) => format!(
            "Hey {}, your blood sugar is {}. Current reading is {}. Please check your glucose.",
            name, kind, value
        ),
        (AlertKind::RapidRise, _) => format!(
            "Hey {}, your blood sugar is rising quickly. Please check your glucose.",
            name
        ),
        (AlertKind::RapidFall, _) => format!(
            "Hey {}, your blood sugar is falling quickly. Please check your glucose.",
            name
        ),
        (AlertKind::Stale, _) => format!(
            "Hey {}, no new glucose reading. Please check your sensor.",
            name
        ),
        _ => format!("Hey {}, glucose alert. Please check your glucose.", name),
    }
}

/// Evaluate the alert condition for `latest`.
///
/// `history` is newest first and may include `latest` itself. Low, high and
/// rapid change are mutually exclusive and checked in that order; stale is
/// only reported when none of them fired.
///
/// With mmol/L the rapid-change difference of the two display values is
/// itself rounded to one decimal before it is compared, so 3.9 after 2.2
/// counts as a 1.7 rise even though the plain subtraction gives
/// 1.6999999999999997.
pub fn evaluate(
    latest: &Reading,
    history: &[Reading],
    settings: &AlertSettings,
    now: OffsetDateTime,
) -> Option<AlertKind> {
    glucose_alert(latest, history, settings)
        .or_else(|| is_stale(latest, settings, now).then_some(AlertKind::Stale))
}

/// Whether `latest` is old enough to raise a stale-data alert.
pub fn is_stale(latest: &Reading, settings: &AlertSettings, now: OffsetDateTime) -> bool {
    settings.stale_data_enabled && latest.age(now) >= STALE_AFTER
}

fn glucose_alert(
    latest: &Reading,
    history: &[Reading],
    settings: &AlertSettings,
) -> Option<AlertKind> {
    let unit = settings.bg_unit;
    let value = latest.display_value(unit)?;

    if settings.low_alert_enabled && value < settings.low() {
        return Some(AlertKind::Low);
    }
    if settings.high_alert_enabled && value > settings.high() {
        return Some(AlertKind::High);
    }

    if !settings.rapid_rise_enabled && !settings.rapid_fall_enabled {
        return None;
    }

    let cutoff = latest.timestamp - RAPID_CHANGE_WINDOW;
    let Some(reference) = history.iter().find(|r| r.timestamp <= cutoff) else {
        debug!("No reading old enough for rapid change check");
        return None;
    };
    let diff = change(value, reference.display_value(unit)?, unit);

    if settings.rapid_rise_enabled && diff >= settings.rapid_rise() {
        Some(AlertKind::RapidRise)
    } else if settings.rapid_fall_enabled && diff <= -settings.rapid_fall() {
        Some(AlertKind::RapidFall)
    } else {
        None
    }
}

/// Difference in display units. mmol/L values carry one decimal, so the
/// difference is rounded to that precision too.
fn change(current: f64, previous: f64, unit: GlucoseUnit) -> f64 {
    let diff = current - previous;
    match unit {
        GlucoseUnit::Mmol => (diff * 10.0).round() / 10.0,
        GlucoseUnit::Mgdl => diff,
    }
}

/// A fired alert, ready for a notification dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: &'static str,
    pub message: String,
    /// Reading in the user's display unit, when the alert concerns one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_value: Option<f64>,
}

impl Alert {
    pub fn new(kind: AlertKind, settings: &AlertSettings, display_value: Option<f64>) -> Self {
        Self {
            kind,
            title: kind.title(),
            message: message(kind, settings.display_name(), display_value),
            display_value,
        }
    }
}

/// Alert fields attached to the latest reading in API responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlertStatus {
    pub alert: bool,
    pub alert_type: Option<AlertKind>,
    pub alert_message: Option<String>,
}

impl AlertStatus {
    /// Status for the newest of `readings` (newest first), without cooldown.
    pub fn for_latest(readings: &[Reading], settings: &AlertSettings, now: OffsetDateTime) -> Self {
        let Some(latest) = readings.first() else {
            return Self::default();
        };

        match evaluate(latest, readings, settings, now) {
            Some(kind) => {
                let alert = Alert::new(kind, settings, latest.display_value(settings.bg_unit));
                Self {
                    alert: true,
                    alert_type: Some(kind),
                    alert_message: Some(alert.message),
                }
            }
            None => Self::default(),
        }
    }
}

/// Last firing time per alert kind.
#[derive(Debug, Default)]
pub struct Cooldowns {
    last_fired: HashMap<AlertKind, OffsetDateTime>,
}

impl Cooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `kind` is still cooling down at `now`.
    pub fn is_cooling_down(&self, kind: AlertKind, now: OffsetDateTime) -> bool {
        self.last_fired
            .get(&kind)
            .is_some_and(|last| *last + kind.cooldown() > now)
    }

    /// Record a firing at `now` unless `kind` is cooling down.
    ///
    /// Returns `true` if the alert may fire. A suppressed attempt does not
    /// extend the cooldown.
    pub fn try_fire(&mut self, kind: AlertKind, now: OffsetDateTime) -> bool {
        if self.is_cooling_down(kind, now) {
            return false;
        }
        self.last_fired.insert(kind, now);
        true
    }

    pub fn last_fired(&self, kind: AlertKind) -> Option<OffsetDateTime> {
        self.last_fired.get(&kind).copied()
    }
}

/// Alert evaluator with cooldown state.
///
/// One instance per process; settings changes do not reset it.
#[derive(Debug, Default)]
pub struct AlertMonitor {
    cooldowns: Cooldowns,
}

impl AlertMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cooldowns(&self) -> &Cooldowns {
        &self.cooldowns
    }

    /// Evaluate a newly stored reading.
    pub fn check_reading(
        &mut self,
        latest: &Reading,
        history: &[Reading],
        settings: &AlertSettings,
        now: OffsetDateTime,
    ) -> Option<Alert> {
        let kind = evaluate(latest, history, settings, now)?;
        self.fire(kind, settings, latest.display_value(settings.bg_unit), now)
    }

    /// Periodic stale-data check against the newest stored reading.
    pub fn check_stale(
        &mut self,
        latest: Option<&Reading>,
        settings: &AlertSettings,
        now: OffsetDateTime,
    ) -> Option<Alert> {
        let latest = latest?;
        if !is_stale(latest, settings, now) {
            return None;
        }
        self.fire(AlertKind::Stale, settings, None, now)
    }

    fn fire(
        &mut self,
        kind: AlertKind,
        settings: &AlertSettings,
        display_value: Option<f64>,
        now: OffsetDateTime,
    ) -> Option<Alert> {
        if !self.cooldowns.try_fire(kind, now) {
            debug!("Suppressing {} alert during cooldown", kind);
            return None;
        }
        let alert = Alert::new(kind, settings, display_value);
        info!("Alert fired: {} ({})", alert.title, alert.message);
        Some(alert)
    }
}
