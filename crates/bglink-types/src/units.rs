//! Blood glucose unit conversion.
//!
//! Glucose is always stored and compared in mg/dL. mmol/L is derived for
//! display (one decimal place), and the inverse conversion exists only for
//! turning user-entered thresholds back into mg/dL.
//!
//! ```
//! use bglink_types::units::{to_mgdl, to_mmol};
//!
//! assert_eq!(to_mmol(100.0), Some(5.5));
//! assert_eq!(to_mgdl(5.6), Some(101.0));
//! assert_eq!(to_mmol(f64::NAN), None);
//! ```

/// mg/dL per mmol/L for glucose (molar mass 180.16 g/mol).
pub const MGDL_PER_MMOL: f64 = 18.0182;

/// Convert mg/dL to mmol/L, rounded to one decimal place.
///
/// Returns `None` for non-finite input.
#[must_use]
pub fn to_mmol(mgdl: f64) -> Option<f64> {
    if !mgdl.is_finite() {
        return None;
    }
    Some((mgdl / MGDL_PER_MMOL * 10.0).round() / 10.0)
}

/// Convert mmol/L to whole mg/dL.
///
/// Returns `None` for non-finite input.
#[must_use]
pub fn to_mgdl(mmol: f64) -> Option<f64> {
    if !mmol.is_finite() {
        return None;
    }
    Some((mmol * MGDL_PER_MMOL).round())
}
