//! User alert preferences.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::types::GlucoseUnit;
use crate::units;

/// Default low threshold in mmol/L.
pub const DEFAULT_LOW_MMOL: f64 = 3.9;
/// Default high threshold in mmol/L.
pub const DEFAULT_HIGH_MMOL: f64 = 10.0;
/// Default rapid rise/fall threshold in mmol/L per 15 minutes.
pub const DEFAULT_RAPID_MMOL: f64 = 1.7;

/// Per-install alert settings.
///
/// Thresholds are expressed in `bg_unit`. A missing threshold falls back to
/// the unit-appropriate default, so switching units without re-entering
/// thresholds still yields sensible limits. The record is saved wholesale.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AlertSettings {
    /// Display and threshold unit.
    pub bg_unit: GlucoseUnit,
    #[cfg_attr(feature = "serde", serde(default))]
    pub low_threshold: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub high_threshold: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub rapid_rise_threshold: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub rapid_fall_threshold: Option<f64>,
    pub low_alert_enabled: bool,
    pub high_alert_enabled: bool,
    pub rapid_rise_enabled: bool,
    pub rapid_fall_enabled: bool,
    pub stale_data_enabled: bool,
    /// Name used in alert messages.
    pub user_name: String,
    pub audio_alerts_enabled: bool,
    /// Playback volume, 0.0 to 1.0.
    pub alert_volume: f64,
    pub alert_email: String,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            bg_unit: GlucoseUnit::Mmol,
            low_threshold: Some(DEFAULT_LOW_MMOL),
            high_threshold: Some(DEFAULT_HIGH_MMOL),
            rapid_rise_threshold: Some(DEFAULT_RAPID_MMOL),
            rapid_fall_threshold: Some(DEFAULT_RAPID_MMOL),
            low_alert_enabled: true,
            high_alert_enabled: true,
            rapid_rise_enabled: true,
            rapid_fall_enabled: true,
            stale_data_enabled: true,
            user_name: String::new(),
            audio_alerts_enabled: false,
            alert_volume: 1.0,
            alert_email: String::new(),
        }
    }
}

impl AlertSettings {
    fn default_for_unit(&self, mmol: f64) -> f64 {
        match self.bg_unit {
            GlucoseUnit::Mmol => mmol,
            GlucoseUnit::Mgdl => units::to_mgdl(mmol).unwrap_or(mmol),
        }
    }

    /// Low threshold in `bg_unit`.
    pub fn low(&self) -> f64 {
        self.low_threshold
            .unwrap_or_else(|| self.default_for_unit(DEFAULT_LOW_MMOL))
    }

    /// High threshold in `bg_unit`.
    pub fn high(&self) -> f64 {
        self.high_threshold
            .unwrap_or_else(|| self.default_for_unit(DEFAULT_HIGH_MMOL))
    }

    /// Minimum 15-minute rise that counts as rapid, in `bg_unit`.
    pub fn rapid_rise(&self) -> f64 {
        self.rapid_rise_threshold
            .unwrap_or_else(|| self.default_for_unit(DEFAULT_RAPID_MMOL))
    }

    /// Minimum 15-minute fall that counts as rapid, in `bg_unit`.
    pub fn rapid_fall(&self) -> f64 {
        self.rapid_fall_threshold
            .unwrap_or_else(|| self.default_for_unit(DEFAULT_RAPID_MMOL))
    }

    /// Name for alert messages; blank names become `"User"`.
    pub fn display_name(&self) -> &str {
        match self.user_name.trim() {
            "" => "User",
            name => name,
        }
    }

    /// Volume clamped to `0.0..=1.0`. Non-finite values play at full volume.
    pub fn clamped_volume(&self) -> f64 {
        if self.alert_volume.is_finite() {
            self.alert_volume.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }

    /// Check thresholds and volume for values that would make alerts misfire.
    pub fn validate(&self) -> Result<(), ParseError> {
        let mut problems = Vec::new();

        let thresholds = [
            ("low_threshold", self.low_threshold),
            ("high_threshold", self.high_threshold),
            ("rapid_rise_threshold", self.rapid_rise_threshold),
            ("rapid_fall_threshold", self.rapid_fall_threshold),
        ];
        for (field, value) in thresholds {
            if let Some(v) = value
                && (!v.is_finite() || v <= 0.0)
            {
                problems.push(format!("{} must be a positive number, got {}", field, v));
            }
        }

        if problems.is_empty() && self.low() >= self.high() {
            problems.push(format!(
                "low_threshold {} must be below high_threshold {}",
                self.low(),
                self.high()
            ));
        }

        if !self.alert_volume.is_finite() || !(0.0..=1.0).contains(&self.alert_volume) {
            problems.push(format!(
                "alert_volume must be between 0 and 1, got {}",
                self.alert_volume
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ParseError::InvalidData(problems.join("; ")))
        }
    }
}
