//! Nightscout upload shapes.
//!
//! Field names follow the Nightscout REST API (`entries` and `devicestatus`
//! collections), hence the mixed casing.

use serde::Serialize;
use time::macros::format_description;
use time::OffsetDateTime;

/// A Nightscout sensor glucose value entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SgvEntry {
    /// Always `"sgv"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub sgv: f64,
    /// True UTC instant, epoch ms.
    pub date: i64,
    pub date_string: String,
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<u8>,
}

impl SgvEntry {
    pub fn new(sgv: f64, date: i64, device: impl Into<String>) -> Self {
        Self {
            kind: "sgv",
            sgv,
            date,
            date_string: iso_string(date),
            device: device.into(),
            direction: None,
            trend: None,
        }
    }
}

/// A Nightscout device status record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub created_at: String,
    pub device: String,
    pub uploader: Uploader,
    /// Absent for sensor-only systems.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump: Option<PumpStatus>,
    pub connect: ConnectStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Uploader {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpStatus {
    pub battery: PumpBattery,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservoir: Option<f64>,
    pub iob: InsulinOnBoard,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpBattery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsulinOnBoard {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bolusiob: Option<f64>,
}

/// CareLink connection and sensor state, passed through as reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calib_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_duration_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_next_calib_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conduit_in_range: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conduit_medical_device_in_range: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conduit_sensor_in_range: Option<bool>,
    /// Guardian systems only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_device_battery_level_percent: Option<f64>,
    /// Guardian systems only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_device_family: Option<String>,
}

/// Output of one CareLink transform.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransformResult {
    pub devicestatus: Vec<DeviceStatus>,
    pub entries: Vec<SgvEntry>,
}

impl TransformResult {
    pub fn is_empty(&self) -> bool {
        self.devicestatus.is_empty() && self.entries.is_empty()
    }
}

/// ISO-8601 UTC with milliseconds, e.g. `2015-10-17T14:11:41.422Z`.
///
/// Out-of-range instants format as the current time.
pub fn iso_string(millis: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(format_iso)
        .unwrap_or_else(|| format_iso(OffsetDateTime::now_utc()).unwrap_or_default())
}

/// Like [`iso_string`], but a missing or zero timestamp means "now".
pub fn iso_string_or_now(millis: Option<i64>) -> String {
    match millis {
        Some(ms) if ms != 0 => iso_string(ms),
        _ => format_iso(OffsetDateTime::now_utc()).unwrap_or_default(),
    }
}

fn format_iso(dt: OffsetDateTime) -> Option<String> {
    dt.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    ))
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_string_has_millis() {
        assert_eq!(iso_string(1445091101422), "2015-10-17T14:11:41.422Z");
        assert_eq!(iso_string(0), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_iso_string_or_now() {
        assert_eq!(
            iso_string_or_now(Some(1445091101422)),
            "2015-10-17T14:11:41.422Z"
        );
        let now = iso_string_or_now(None);
        assert!(now.ends_with('Z'));
        assert_ne!(now, "1970-01-01T00:00:00.000Z");
        assert_ne!(iso_string_or_now(Some(0)), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_sgv_entry_serialization() {
        let mut entry = SgvEntry::new(108.0, 1445357340000, "connect-paradigm");
        entry.direction = Some("DoubleUp");
        entry.trend = Some(1);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "sgv");
        assert_eq!(json["sgv"], 108.0);
        assert_eq!(json["date"], 1445357340000i64);
        assert_eq!(json["dateString"], "2015-10-20T16:09:00.000Z");
        assert_eq!(json["direction"], "DoubleUp");
        assert_eq!(json["trend"], 1);
    }

    #[test]
    fn test_absent_trend_is_omitted() {
        let entry = SgvEntry::new(95.0, 0, "connect-foo");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("direction").is_none());
        assert!(json.get("trend").is_none());
    }

    #[test]
    fn test_connect_status_camel_case() {
        let connect = ConnectStatus {
            sensor_duration_hours: Some(91.0),
            conduit_sensor_in_range: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_value(&connect).unwrap();
        assert_eq!(json["sensorDurationHours"], 91.0);
        assert_eq!(json["conduitSensorInRange"], true);
        assert!(json.get("medicalDeviceFamily").is_none());
    }
}
