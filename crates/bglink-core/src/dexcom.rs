//! Dexcom Share estimated glucose values.
//!
//! Accepts both the `dexcom-share-api` client shape
//! (`{"mgdl": 120, "trend": "flat", "timestamp": 1700000000000}`) and the raw
//! Share web service shape (`{"Value": 120, "Trend": "Flat", "WT": "Date(1700000000000)"}`).

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use time::OffsetDateTime;

use bglink_types::{Reading, Trend};

use crate::lenient;
use crate::offset::parse_pump_time;
use crate::trend::dexcom_to_trend;

/// Share numeric trend codes, indexed by code.
const TREND_CODES: [&str; 10] = [
    "None",
    "DoubleUp",
    "SingleUp",
    "FortyFiveUp",
    "Flat",
    "FortyFiveDown",
    "SingleDown",
    "DoubleDown",
    "NotComputable",
    "RateOutOfRange",
];

/// One estimated glucose value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DexcomEgv {
    /// Glucose in mg/dL.
    #[serde(alias = "Value", deserialize_with = "lenient::number")]
    pub mgdl: Option<f64>,
    #[serde(alias = "Trend", deserialize_with = "trend_name")]
    pub trend: Option<String>,
    /// Epoch ms.
    #[serde(alias = "WT", deserialize_with = "share_time")]
    pub timestamp: Option<i64>,
}

impl DexcomEgv {
    /// Normalize into a canonical reading.
    ///
    /// A missing timestamp is read as `now`. Returns `None` without a
    /// positive glucose value.
    pub fn to_reading(&self, now: OffsetDateTime) -> Option<Reading> {
        let mgdl = self.mgdl.filter(|v| *v > 0.0)?;
        let trend = self
            .trend
            .as_deref()
            .map(dexcom_to_trend)
            .unwrap_or(Trend::Flat);
        let timestamp = match self.timestamp {
            Some(ms) => OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()?,
            None => now,
        };
        Some(Reading::new(mgdl, timestamp, trend))
    }
}

/// Normalize the newest entry of a Share response (entries are newest first).
pub fn latest_reading(entries: &[DexcomEgv], now: OffsetDateTime) -> Option<Reading> {
    entries.first()?.to_reading(now)
}

/// Epoch ms from a number, an ISO-8601 string, or a Share `Date(ms[+-zone])` string.
pub fn parse_share_time(value: &Value) -> Option<i64> {
    if let Some(ms) = lenient::as_number(value) {
        return Some(ms.round() as i64);
    }
    let s = value.as_str()?.trim();

    if let Some(inner) = s.strip_prefix("Date(").and_then(|rest| rest.strip_suffix(')')) {
        // The zone suffix is informational; the millis are already UTC.
        let end = inner
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '+' || *c == '-')
            .map_or(inner.len(), |(i, _)| i);
        return inner[..end].parse().ok();
    }

    parse_pump_time(s)
}

fn trend_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => n
            .as_u64()
            .and_then(|code| TREND_CODES.get(code as usize))
            .map(|name| name.to_string()),
        _ => None,
    })
}

fn share_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(parse_share_time(&Value::deserialize(deserializer)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn egv(value: Value) -> DexcomEgv {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_client_shape() {
        let entry = egv(json!({"mgdl": 154, "trend": "FortyFiveDown", "timestamp": 1_700_000_000_000i64}));
        let reading = entry.to_reading(OffsetDateTime::UNIX_EPOCH).unwrap();

        assert_eq!(reading.glucose_value, 154.0);
        assert_eq!(reading.trend, Trend::Down);
        assert_eq!(reading.timestamp.unix_timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_raw_share_shape() {
        let entry = egv(json!({
            "WT": "Date(1700000000000)",
            "ST": "Date(1700000000000)",
            "DT": "Date(1700000000000-0500)",
            "Value": 88,
            "Trend": "DoubleDown",
        }));
        assert_eq!(entry.mgdl, Some(88.0));
        assert_eq!(entry.timestamp, Some(1_700_000_000_000));

        let reading = entry.to_reading(OffsetDateTime::UNIX_EPOCH).unwrap();
        assert_eq!(reading.trend, Trend::DownDouble);
    }

    #[test]
    fn test_numeric_trend_codes() {
        assert_eq!(egv(json!({"Trend": 1})).trend.as_deref(), Some("DoubleUp"));
        assert_eq!(egv(json!({"Trend": 4})).trend.as_deref(), Some("Flat"));
        assert_eq!(egv(json!({"Trend": 42})).trend, None);
    }

    #[test]
    fn test_share_time_forms() {
        assert_eq!(
            parse_share_time(&json!("Date(1445091119507-0500)")),
            Some(1_445_091_119_507)
        );
        assert_eq!(
            parse_share_time(&json!("Date(1445091119507+0100)")),
            Some(1_445_091_119_507)
        );
        assert_eq!(
            parse_share_time(&json!("2015-10-17T14:11:59.507Z")),
            Some(1_445_091_119_507)
        );
        assert_eq!(parse_share_time(&json!(1445091119507i64)), Some(1_445_091_119_507));
        assert_eq!(parse_share_time(&json!("Date(soon)")), None);
        assert_eq!(parse_share_time(&json!(null)), None);
    }

    #[test]
    fn test_missing_timestamp_and_trend() {
        let now = OffsetDateTime::UNIX_EPOCH + time::Duration::days(1);
        let reading = egv(json!({"mgdl": 120})).to_reading(now).unwrap();
        assert_eq!(reading.timestamp, now);
        assert_eq!(reading.trend, Trend::Flat);
    }

    #[test]
    fn test_missing_value_yields_nothing() {
        let now = OffsetDateTime::UNIX_EPOCH;
        assert!(egv(json!({"trend": "flat"})).to_reading(now).is_none());
        assert!(egv(json!({"mgdl": "high"})).to_reading(now).is_none());
        assert!(egv(json!({"mgdl": 0})).to_reading(now).is_none());
    }

    #[test]
    fn test_latest_uses_first_entry() {
        let entries = vec![
            egv(json!({"mgdl": 130, "timestamp": 2_000})),
            egv(json!({"mgdl": 125, "timestamp": 1_000})),
        ];
        let reading = latest_reading(&entries, OffsetDateTime::UNIX_EPOCH).unwrap();
        assert_eq!(reading.glucose_value, 130.0);
        assert!(latest_reading(&[], OffsetDateTime::UNIX_EPOCH).is_none());
    }
}
