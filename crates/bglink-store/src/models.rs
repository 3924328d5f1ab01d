//! Data models for stored data.

use serde::{Deserialize, Serialize};

use bglink_types::Reading;

/// A reading stored in the database.
///
/// Serializes as the flat reading fields plus `id` and `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    /// Database row ID.
    pub id: i64,
    /// Where the reading came from (`carelink`, `dexcom`, `manual`).
    pub source: String,
    #[serde(flatten)]
    pub reading: Reading,
}

impl StoredReading {
    /// The canonical reading.
    pub fn to_reading(&self) -> Reading {
        self.reading
    }
}

/// Reading source recorded alongside each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingSource {
    CareLink,
    Dexcom,
    Manual,
}

impl ReadingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingSource::CareLink => "carelink",
            ReadingSource::Dexcom => "dexcom",
            ReadingSource::Manual => "manual",
        }
    }
}

impl std::fmt::Display for ReadingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bglink_types::Trend;
    use time::OffsetDateTime;

    #[test]
    fn test_stored_reading_serializes_flat() {
        let stored = StoredReading {
            id: 7,
            source: ReadingSource::Dexcom.to_string(),
            reading: Reading::new(123.0, OffsetDateTime::UNIX_EPOCH, Trend::Up),
        };
        let json = serde_json::to_value(&stored).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["source"], "dexcom");
        assert_eq!(json["glucose_value"], 123.0);
        assert_eq!(json["trend"], "UP");
        assert!(json.get("reading").is_none());
    }

    #[test]
    fn test_source_names() {
        assert_eq!(ReadingSource::CareLink.as_str(), "carelink");
        assert_eq!(
            serde_json::to_string(&ReadingSource::Manual).unwrap(),
            "\"manual\""
        );
    }
}
