//! CareLink snapshot payload.
//!
//! Only the fields the normalizer reads are modelled. Every field is optional
//! and extracted through [`crate::lenient`], so a snapshot with a wrong-typed
//! field still deserializes with that field absent.

use serde::Deserialize;

use crate::lenient;

/// One CareLink "connect" snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CareLinkData {
    /// Rolling 24-hour window of sensor glucose records, oldest first.
    #[serde(deserialize_with = "lenient::list")]
    pub sgs: Vec<CareLinkSg>,
    #[serde(rename = "lastSG", deserialize_with = "lenient::object")]
    pub last_sg: Option<CareLinkSg>,
    #[serde(rename = "lastSGTrend", deserialize_with = "lenient::string")]
    pub last_sg_trend: Option<String>,
    /// Server clock at response time, epoch ms.
    #[serde(deserialize_with = "lenient::epoch_millis")]
    pub current_server_time: Option<i64>,
    /// Server time of the last upload from the device, epoch ms.
    #[serde(deserialize_with = "lenient::epoch_millis")]
    pub last_medical_device_data_update_server_time: Option<i64>,
    /// Pump wall-clock time, no timezone.
    #[serde(deserialize_with = "lenient::string")]
    pub s_medical_device_time: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub medical_device_family: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub medical_device_battery_level_percent: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub conduit_battery_level: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub reservoir_amount: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub reservoir_remaining_units: Option<f64>,
    #[serde(deserialize_with = "lenient::object")]
    pub active_insulin: Option<ActiveInsulin>,
    #[serde(deserialize_with = "lenient::string")]
    pub sensor_state: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub calib_status: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub sensor_duration_hours: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub time_to_next_calib_hours: Option<f64>,
    #[serde(deserialize_with = "lenient::boolean")]
    pub conduit_in_range: Option<bool>,
    #[serde(deserialize_with = "lenient::boolean")]
    pub conduit_medical_device_in_range: Option<bool>,
    #[serde(deserialize_with = "lenient::boolean")]
    pub conduit_sensor_in_range: Option<bool>,
}

impl CareLinkData {
    /// Device family of a sensor-only (no pump) system.
    pub const GUARDIAN: &'static str = "GUARDIAN";

    /// Nightscout device name, `connect-<family>`.
    pub fn device_name(&self) -> String {
        let family = self.medical_device_family.as_deref().unwrap_or("unknown");
        format!("connect-{}", family.to_lowercase())
    }

    /// Whether this snapshot comes from a Guardian sensor-only system.
    pub fn is_guardian(&self) -> bool {
        self.medical_device_family.as_deref() == Some(Self::GUARDIAN)
    }

    /// Minutes between the last device upload and the server clock.
    ///
    /// `None` when either server timestamp is missing or the gap does not
    /// fit in an `i64`.
    pub fn recency_minutes(&self) -> Option<f64> {
        let current = self.current_server_time?;
        let last_update = self.last_medical_device_data_update_server_time?;
        let gap = current.checked_sub(last_update)?;
        Some(gap as f64 / 60_000.0)
    }

    /// Active insulin amount, excluding the `-1` "unknown" sentinel and any
    /// other negative value.
    pub fn active_insulin_amount(&self) -> Option<f64> {
        self.active_insulin
            .as_ref()
            .and_then(|insulin| insulin.amount)
            .filter(|amount| *amount >= 0.0)
    }

    /// Reservoir level, preferring the remaining-units field.
    pub fn reservoir(&self) -> Option<f64> {
        self.reservoir_remaining_units.or(self.reservoir_amount)
    }
}

/// A sensor glucose record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CareLinkSg {
    /// Glucose in mg/dL; 0 marks a gap.
    #[serde(deserialize_with = "lenient::number")]
    pub sg: Option<f64>,
    /// Pump-local time of the record.
    #[serde(deserialize_with = "lenient::string")]
    pub datetime: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub version: Option<f64>,
    #[serde(deserialize_with = "lenient::boolean")]
    pub time_change: Option<bool>,
    #[serde(deserialize_with = "lenient::string")]
    pub trend_arrow: Option<String>,
}

impl CareLinkSg {
    /// Nonzero glucose value, if any.
    pub fn glucose(&self) -> Option<f64> {
        self.sg.filter(|sg| *sg != 0.0)
    }

    /// Whether this record is a real sensor glucose value.
    pub fn is_sensor_glucose(&self) -> bool {
        self.kind.as_deref() == Some("SG") && self.glucose().is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActiveInsulin {
    #[serde(deserialize_with = "lenient::number")]
    pub amount: Option<f64>,
    #[serde(deserialize_with = "lenient::string")]
    pub datetime: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient::number")]
    pub version: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserializes_camel_case_fields() {
        let data: CareLinkData = serde_json::from_value(json!({
            "lastSGTrend": "UP",
            "currentServerTime": 1445091119507i64,
            "lastMedicalDeviceDataUpdateServerTime": 1445091101422i64,
            "sMedicalDeviceTime": "Oct 17, 2015 09:09:14",
            "medicalDeviceFamily": "PARADIGM",
            "conduitInRange": true,
            "lastSG": {"sg": 120, "datetime": "Oct 17, 2015 09:05:00", "kind": "SG"},
        }))
        .unwrap();

        assert_eq!(data.last_sg_trend.as_deref(), Some("UP"));
        assert_eq!(data.current_server_time, Some(1445091119507));
        assert_eq!(data.conduit_in_range, Some(true));
        assert_eq!(data.last_sg.as_ref().unwrap().glucose(), Some(120.0));
        assert_eq!(data.device_name(), "connect-paradigm");
        assert!(!data.is_guardian());
    }

    #[test]
    fn test_malformed_fields_become_absent() {
        let data: CareLinkData = serde_json::from_value(json!({
            "sgs": [{"sg": 100, "kind": "SG", "datetime": "Oct 17, 2015 09:05:00"}, 42, null],
            "lastSG": "nope",
            "currentServerTime": "soon",
            "medicalDeviceBatteryLevelPercent": {"value": 3},
            "activeInsulin": [1, 2],
        }))
        .unwrap();

        assert_eq!(data.sgs.len(), 1);
        assert!(data.last_sg.is_none());
        assert_eq!(data.current_server_time, None);
        assert_eq!(data.medical_device_battery_level_percent, None);
        assert_eq!(data.active_insulin_amount(), None);
        assert_eq!(data.recency_minutes(), None);
    }

    #[test]
    fn test_active_insulin_sentinel() {
        let mut data = CareLinkData {
            active_insulin: Some(ActiveInsulin {
                amount: Some(-1.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(data.active_insulin_amount(), None);

        data.active_insulin = Some(ActiveInsulin {
            amount: Some(0.0),
            ..Default::default()
        });
        assert_eq!(data.active_insulin_amount(), Some(0.0));
    }

    #[test]
    fn test_reservoir_preference() {
        let mut data = CareLinkData {
            reservoir_amount: Some(52.0),
            ..Default::default()
        };
        assert_eq!(data.reservoir(), Some(52.0));
        data.reservoir_remaining_units = Some(48.5);
        assert_eq!(data.reservoir(), Some(48.5));
    }

    #[test]
    fn test_sensor_glucose_detection() {
        let sg = |kind: &str, value: f64| CareLinkSg {
            sg: Some(value),
            kind: Some(kind.to_string()),
            ..Default::default()
        };
        assert!(sg("SG", 95.0).is_sensor_glucose());
        assert!(!sg("SG", 0.0).is_sensor_glucose());
        assert!(!sg("BG", 95.0).is_sensor_glucose());
    }
}
