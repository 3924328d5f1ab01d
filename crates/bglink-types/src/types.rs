//! Core types for glucose readings.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::ParseError;
use crate::units;

/// Direction of glucose change reported alongside a reading.
///
/// Every vendor adapter converges on this set. Serialized in upper snake case
/// (`"UP_DOUBLE"`), which is also what [`FromStr`] accepts.
///
/// ```
/// use bglink_types::Trend;
///
/// assert_eq!("UP_DOUBLE".parse::<Trend>(), Ok(Trend::UpDouble));
/// assert_eq!(Trend::default(), Trend::Flat);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Trend {
    /// No trend could be computed.
    None,
    /// Rising.
    Up,
    /// Rising quickly.
    UpDouble,
    /// Falling.
    Down,
    /// Falling quickly.
    DownDouble,
    /// Steady.
    #[default]
    Flat,
}

impl Trend {
    /// The wire name of this trend.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::None => "NONE",
            Trend::Up => "UP",
            Trend::UpDouble => "UP_DOUBLE",
            Trend::Down => "DOWN",
            Trend::DownDouble => "DOWN_DOUBLE",
            Trend::Flat => "FLAT",
        }
    }
}

impl FromStr for Trend {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Trend::None),
            "UP" => Ok(Trend::Up),
            "UP_DOUBLE" => Ok(Trend::UpDouble),
            "DOWN" => Ok(Trend::Down),
            "DOWN_DOUBLE" => Ok(Trend::DownDouble),
            "FLAT" => Ok(Trend::Flat),
            other => Err(ParseError::UnknownTrend(other.to_string())),
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit the user sees glucose values and thresholds in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum GlucoseUnit {
    /// mmol/L, one decimal place.
    #[default]
    Mmol,
    /// mg/dL.
    Mgdl,
}

impl GlucoseUnit {
    /// Convert an internal mg/dL value into this unit for display and
    /// threshold comparison.
    ///
    /// Returns `None` if the value is not finite.
    #[must_use]
    pub fn display_value(&self, mgdl: f64) -> Option<f64> {
        match self {
            GlucoseUnit::Mmol => units::to_mmol(mgdl),
            GlucoseUnit::Mgdl => mgdl.is_finite().then_some(mgdl),
        }
    }

    /// Human-readable unit label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            GlucoseUnit::Mmol => "mmol/L",
            GlucoseUnit::Mgdl => "mg/dL",
        }
    }
}

impl FromStr for GlucoseUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mmol" => Ok(GlucoseUnit::Mmol),
            "mgdl" => Ok(GlucoseUnit::Mgdl),
            _ => Err(ParseError::UnknownUnit(s.to_string())),
        }
    }
}

impl fmt::Display for GlucoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A normalized glucose reading.
///
/// This is the only shape the alert evaluator and the store understand; all
/// vendor adapters produce it. `glucose_value` is always mg/dL.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Sensor glucose in mg/dL.
    pub glucose_value: f64,
    /// When the sensor took the reading.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Direction of change.
    #[cfg_attr(feature = "serde", serde(default))]
    pub trend: Trend,
    /// Insulin on board in units, when the pump reports it.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub active_insulin: Option<f64>,
    /// Pump battery percentage (0-100).
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub pump_battery: Option<f64>,
    /// Hours the current sensor has been running.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub sensor_duration: Option<f64>,
}

impl Reading {
    /// Create a reading with no pump or sensor metadata.
    pub fn new(glucose_value: f64, timestamp: OffsetDateTime, trend: Trend) -> Self {
        Self {
            glucose_value,
            timestamp,
            trend,
            active_insulin: None,
            pump_battery: None,
            sensor_duration: None,
        }
    }

    /// Set insulin on board.
    pub fn with_active_insulin(mut self, units: Option<f64>) -> Self {
        self.active_insulin = units;
        self
    }

    /// Set pump battery percentage.
    pub fn with_pump_battery(mut self, percent: Option<f64>) -> Self {
        self.pump_battery = percent;
        self
    }

    /// Set sensor age in hours.
    pub fn with_sensor_duration(mut self, hours: Option<f64>) -> Self {
        self.sensor_duration = hours;
        self
    }

    /// Time elapsed between the reading and `now`.
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        now - self.timestamp
    }

    /// Glucose value in the given display unit.
    pub fn display_value(&self, unit: GlucoseUnit) -> Option<f64> {
        unit.display_value(self.glucose_value)
    }
}
