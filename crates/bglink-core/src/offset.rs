//! Pump clock offset inference.
//!
//! Medtronic pumps report wall-clock time with no timezone, while the CareLink
//! server reports true UTC. Reading the pump time as if it were UTC and
//! subtracting the server time gives the pump's timezone offset, rounded to
//! whole hours because pumps are set to local time at hour granularity.
//!
//! ```
//! use bglink_core::offset::{parse_pump_time, PumpOffset};
//!
//! let pump = parse_pump_time("Oct 17, 2015 09:09:14").unwrap();
//! let server = pump + 7 * 3_600_000;
//! let offset = PumpOffset::guess(pump, server);
//!
//! assert_eq!(offset.to_string(), "-0700");
//! assert_eq!(offset.to_utc_millis(pump), server);
//! ```

use core::fmt;

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{info, warn};

/// Milliseconds in one hour.
pub const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Parse a pump or entry timestamp into epoch milliseconds.
///
/// Accepted forms:
/// - `"Oct 17, 2015 09:09:14"` (CareLink pump clock, read as UTC)
/// - `"2015-10-17T09:09:14"` with optional fraction (read as UTC)
/// - RFC 3339 with an explicit offset (exact instant)
pub fn parse_pump_time(s: &str) -> Option<i64> {
    let s = s.trim();

    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(unix_millis(dt));
    }

    let formats: [&[time::format_description::BorrowedFormatItem<'static>]; 3] = [
        format_description!(
            "[month repr:short] [day padding:none], [year] [hour]:[minute]:[second]"
        ),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    ];

    formats
        .iter()
        .find_map(|format| PrimitiveDateTime::parse(s, format).ok())
        .map(|dt| unix_millis(dt.assume_utc()))
}

/// Epoch milliseconds of an instant.
pub fn unix_millis(dt: OffsetDateTime) -> i64 {
    (dt.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Whole-hour offset between the pump clock and UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PumpOffset {
    hours: i64,
}

impl PumpOffset {
    /// No offset; pump time is treated as UTC.
    pub const ZERO: PumpOffset = PumpOffset { hours: 0 };

    /// Offset of `hours` from UTC.
    pub const fn from_hours(hours: i64) -> Self {
        Self { hours }
    }

    /// Infer the offset from the pump clock read as UTC and the server's UTC time.
    ///
    /// Rounds half-hours up, toward positive offsets.
    pub fn guess(pump_time_as_utc_ms: i64, server_time_ms: i64) -> Self {
        let diff = i128::from(pump_time_as_utc_ms) - i128::from(server_time_ms);
        let hours = diff as f64 / MILLIS_PER_HOUR as f64;
        Self {
            hours: (hours + 0.5).floor() as i64,
        }
    }

    pub fn hours(&self) -> i64 {
        self.hours
    }

    pub fn millis(&self) -> i64 {
        self.hours.saturating_mul(MILLIS_PER_HOUR)
    }

    /// Convert a pump-local time (parsed as if UTC) into a true UTC instant.
    pub fn to_utc_millis(&self, pump_local_ms: i64) -> i64 {
        pump_local_ms.saturating_sub(self.millis())
    }
}

impl fmt::Display for PumpOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.hours >= 0 { '+' } else { '-' };
        write!(f, "{}{:02}00", sign, self.hours.abs())
    }
}

/// Tracks the last offset guess so the log only records changes.
#[derive(Debug, Default)]
pub struct PumpClock {
    last_guess: Option<PumpOffset>,
}

impl PumpClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent guess, if any.
    pub fn last_guess(&self) -> Option<PumpOffset> {
        self.last_guess
    }

    /// Infer the offset for a snapshot.
    ///
    /// A missing or unparseable pump time yields [`PumpOffset::ZERO`].
    pub fn guess(&mut self, pump_time: Option<&str>, server_time_ms: i64) -> PumpOffset {
        let Some(pump_ms) = pump_time.and_then(parse_pump_time) else {
            warn!(
                "Cannot read pump clock {:?}; treating pump time as UTC",
                pump_time
            );
            return PumpOffset::ZERO;
        };

        let offset = PumpOffset::guess(pump_ms, server_time_ms);
        if self.last_guess != Some(offset) {
            info!(
                "Guessed pump timezone {} (pump time: {:?}; server time: {})",
                offset,
                pump_time.unwrap_or_default(),
                server_time_ms
            );
        }
        self.last_guess = Some(offset);
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUMP_TIME: &str = "Oct 17, 2015 09:09:14";
    const PUMP_TIME_MS: i64 = 1_445_072_954_000;

    #[test]
    fn test_parse_carelink_format() {
        assert_eq!(parse_pump_time(PUMP_TIME), Some(PUMP_TIME_MS));
        assert_eq!(
            parse_pump_time("Oct 20, 2015 11:09:00"),
            Some(1_445_339_340_000)
        );
    }

    #[test]
    fn test_parse_single_digit_day() {
        let nine = parse_pump_time("Oct 9, 2015 09:09:14").unwrap();
        assert_eq!(PUMP_TIME_MS - nine, 8 * 24 * MILLIS_PER_HOUR);
    }

    #[test]
    fn test_parse_iso_forms() {
        assert_eq!(parse_pump_time("2015-10-17T09:09:14"), Some(PUMP_TIME_MS));
        assert_eq!(
            parse_pump_time("2015-10-17T09:09:14.250"),
            Some(PUMP_TIME_MS + 250)
        );
        assert_eq!(
            parse_pump_time("2015-10-17T02:09:14-07:00"),
            Some(PUMP_TIME_MS)
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_pump_time(""), None);
        assert_eq!(parse_pump_time("yesterday"), None);
    }

    #[test]
    fn test_guess_negative_offset() {
        let server = PUMP_TIME_MS + 7 * MILLIS_PER_HOUR;
        let offset = PumpOffset::guess(PUMP_TIME_MS, server);
        assert_eq!(offset.hours(), -7);
        assert_eq!(offset.to_string(), "-0700");
        assert_eq!(offset.millis(), -7 * MILLIS_PER_HOUR);
    }

    #[test]
    fn test_guess_rounds_to_nearest_hour() {
        // Fixture server time is 5h02m ahead of the pump clock.
        let offset = PumpOffset::guess(PUMP_TIME_MS, 1_445_091_119_507);
        assert_eq!(offset.to_string(), "-0500");

        let offset = PumpOffset::guess(PUMP_TIME_MS, PUMP_TIME_MS - 90 * 60 * 1000);
        assert_eq!(offset.to_string(), "+0200");
    }

    #[test]
    fn test_extreme_clocks_saturate() {
        let offset = PumpOffset::guess(i64::MAX, i64::MIN);
        assert!(offset.hours() > 0);
        assert_eq!(offset.millis(), i64::MAX);
        assert_eq!(offset.to_utc_millis(i64::MIN), i64::MIN);

        let offset = PumpOffset::guess(i64::MIN, i64::MAX);
        assert_eq!(offset.millis(), i64::MIN);
        assert_eq!(offset.to_utc_millis(0), i64::MAX);
    }

    #[test]
    fn test_display_formats() {
        assert_eq!(PumpOffset::ZERO.to_string(), "+0000");
        assert_eq!(PumpOffset::from_hours(13).to_string(), "+1300");
        assert_eq!(PumpOffset::from_hours(-11).to_string(), "-1100");
    }

    #[test]
    fn test_pump_clock_is_stable() {
        let mut clock = PumpClock::new();
        let server = PUMP_TIME_MS + 7 * MILLIS_PER_HOUR;

        let first = clock.guess(Some(PUMP_TIME), server);
        let second = clock.guess(Some(PUMP_TIME), server);
        assert_eq!(first, second);
        assert_eq!(clock.last_guess(), Some(PumpOffset::from_hours(-7)));
    }

    #[test]
    fn test_pump_clock_unreadable_time() {
        let mut clock = PumpClock::new();
        assert_eq!(clock.guess(None, 0), PumpOffset::ZERO);
        assert_eq!(clock.guess(Some("not a time"), 0), PumpOffset::ZERO);
        assert_eq!(clock.last_guess(), None);
    }
}
