//! Canonical types for bglink glucose monitoring.
//!
//! Every vendor adapter in `bglink-core` converges on the types defined here,
//! and the store and service only ever see these shapes.
//!
//! # Features
//!
//! - [`Reading`]: one normalized sensor glucose value (always mg/dL)
//! - [`Trend`]: canonical direction-of-change set
//! - [`GlucoseUnit`] and the [`units`] conversions for display
//! - [`AlertSettings`]: the per-install alert preferences
//!
//! # Example
//!
//! ```
//! use bglink_types::{GlucoseUnit, Reading, Trend};
//! use time::OffsetDateTime;
//!
//! let reading = Reading::new(126.0, OffsetDateTime::UNIX_EPOCH, Trend::Up);
//! assert_eq!(reading.display_value(GlucoseUnit::Mmol), Some(7.0));
//! ```

pub mod error;
pub mod settings;
pub mod types;
pub mod units;

pub use error::{ParseError, ParseResult};
pub use settings::AlertSettings;
pub use types::{GlucoseUnit, Reading, Trend};
