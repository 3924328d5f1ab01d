//! Glucose reading normalization and alert evaluation.
//!
//! This crate turns vendor CGM payloads into canonical [`Reading`]s and
//! Nightscout records, and decides when a reading warrants an alert. It does
//! no I/O; callers fetch vendor data and persist results.
//!
//! # Features
//!
//! - **CareLink normalization**: staleness gate, pump clock correction,
//!   Nightscout `sgv` entries and `devicestatus` ([`Transformer`])
//! - **Dexcom Share normalization**: both client and raw Share EGV shapes
//! - **Recency filtering**: surface only records newer than the last poll
//! - **Alerts**: low, high, rapid rise/fall and stale data, with cooldowns
//!
//! # Example
//!
//! ```
//! use bglink_core::{CareLinkData, Transformer};
//!
//! let snapshot: CareLinkData = serde_json::from_str(r#"{
//!     "currentServerTime": 1445091119507,
//!     "lastMedicalDeviceDataUpdateServerTime": 1445091101422,
//!     "sMedicalDeviceTime": "Oct 17, 2015 09:09:14",
//!     "medicalDeviceFamily": "PARADIGM",
//!     "lastSGTrend": "UP",
//!     "sgs": [{"sg": 120, "datetime": "Oct 17, 2015 09:05:00", "kind": "SG"}]
//! }"#).unwrap();
//!
//! let mut transformer = Transformer::new();
//! let result = transformer.transform(&snapshot, None);
//!
//! assert_eq!(result.entries.len(), 1);
//! assert_eq!(result.entries[0].direction, Some("SingleUp"));
//! assert_eq!(result.devicestatus[0].device, "connect-paradigm");
//! ```

pub mod alerts;
pub mod carelink;
pub mod dexcom;
pub mod filter;
pub mod lenient;
pub mod nightscout;
pub mod offset;
pub mod transform;
pub mod trend;

pub use alerts::{Alert, AlertKind, AlertMonitor, AlertStatus, Cooldowns};
pub use carelink::{ActiveInsulin, CareLinkData, CareLinkSg};
pub use dexcom::DexcomEgv;
pub use filter::RecencyFilter;
pub use nightscout::{DeviceStatus, SgvEntry, TransformResult};
pub use offset::{PumpClock, PumpOffset};
pub use transform::Transformer;

// Re-export from bglink-types
pub use bglink_types::{AlertSettings, GlucoseUnit, ParseError, Reading, Trend};
