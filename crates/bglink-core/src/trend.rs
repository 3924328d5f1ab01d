//! Vendor trend lookup tables.
//!
//! CareLink and Dexcom each name trend arrows differently. These tables map
//! them onto the canonical [`Trend`] and onto the Nightscout `trend` /
//! `direction` pair.

use serde::Serialize;

use bglink_types::Trend;

/// Nightscout trend code and direction name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NightscoutTrend {
    pub trend: u8,
    pub direction: &'static str,
}

const fn ns(trend: u8, direction: &'static str) -> NightscoutTrend {
    NightscoutTrend { trend, direction }
}

/// Nightscout trend for a CareLink `lastSGTrend` value.
///
/// Returns `None` for names outside the table; no trend is attached then.
pub fn carelink_to_nightscout(name: &str) -> Option<NightscoutTrend> {
    match name {
        "NONE" => Some(ns(0, "NONE")),
        "UP_TRIPLE" => Some(ns(1, "TripleUp")),
        "UP_DOUBLE" => Some(ns(1, "DoubleUp")),
        "UP" => Some(ns(2, "SingleUp")),
        "DOWN" => Some(ns(6, "SingleDown")),
        "DOWN_DOUBLE" => Some(ns(7, "DoubleDown")),
        "DOWN_TRIPLE" => Some(ns(7, "TripleDown")),
        _ => None,
    }
}

/// Canonical trend for a CareLink trend arrow. Unknown names read as flat.
pub fn carelink_to_trend(name: &str) -> Trend {
    match name {
        "UP" => Trend::Up,
        "DOWN" => Trend::Down,
        "UP_UP" | "UP_DOUBLE" | "UP_TRIPLE" => Trend::UpDouble,
        "DOWN_DOWN" | "DOWN_DOUBLE" | "DOWN_TRIPLE" => Trend::DownDouble,
        _ => Trend::Flat,
    }
}

/// Canonical trend for a Dexcom Share trend name (case-insensitive).
///
/// Share reports five-level arrows; 45-degree arrows collapse onto single
/// arrows and "not computable" reads as flat.
pub fn dexcom_to_trend(name: &str) -> Trend {
    match name.to_ascii_lowercase().as_str() {
        "doubleup" => Trend::UpDouble,
        "singleup" | "fortyfiveup" => Trend::Up,
        "fortyfivedown" | "singledown" => Trend::Down,
        "doubledown" => Trend::DownDouble,
        _ => Trend::Flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carelink_nightscout_table() {
        assert_eq!(
            carelink_to_nightscout("UP_DOUBLE"),
            Some(NightscoutTrend {
                trend: 1,
                direction: "DoubleUp"
            })
        );
        assert_eq!(carelink_to_nightscout("DOWN").unwrap().trend, 6);
        assert_eq!(
            carelink_to_nightscout("DOWN_TRIPLE").unwrap().direction,
            "TripleDown"
        );
        assert_eq!(carelink_to_nightscout("NONE").unwrap().trend, 0);
        assert_eq!(carelink_to_nightscout("FLAT"), None);
        assert_eq!(carelink_to_nightscout("up"), None);
    }

    #[test]
    fn test_carelink_canonical_table() {
        assert_eq!(carelink_to_trend("NONE"), Trend::Flat);
        assert_eq!(carelink_to_trend("UP_UP"), Trend::UpDouble);
        assert_eq!(carelink_to_trend("DOWN_TRIPLE"), Trend::DownDouble);
        assert_eq!(carelink_to_trend("DOWN"), Trend::Down);
        assert_eq!(carelink_to_trend("???"), Trend::Flat);
    }

    #[test]
    fn test_dexcom_table() {
        assert_eq!(dexcom_to_trend("DoubleUp"), Trend::UpDouble);
        assert_eq!(dexcom_to_trend("FortyFiveUp"), Trend::Up);
        assert_eq!(dexcom_to_trend("singleDown"), Trend::Down);
        assert_eq!(dexcom_to_trend("DoubleDown"), Trend::DownDouble);
        assert_eq!(dexcom_to_trend("NotComputable"), Trend::Flat);
        assert_eq!(dexcom_to_trend("Flat"), Trend::Flat);
    }
}
