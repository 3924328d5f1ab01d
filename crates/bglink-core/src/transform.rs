//! CareLink snapshot normalization.
//!
//! [`Transformer`] turns one [`CareLinkData`] snapshot into Nightscout
//! `entries` and `devicestatus` records, or into a single canonical
//! [`Reading`]. Both paths share the staleness gate and the pump clock
//! correction.

use time::OffsetDateTime;
use tracing::{debug, warn};

use bglink_types::{Reading, Trend};

use crate::carelink::{CareLinkData, CareLinkSg};
use crate::nightscout::{
    iso_string, iso_string_or_now, ConnectStatus, DeviceStatus, InsulinOnBoard, PumpBattery,
    PumpStatus, SgvEntry, TransformResult, Uploader,
};
use crate::offset::{parse_pump_time, PumpClock, PumpOffset};
use crate::trend::{carelink_to_nightscout, carelink_to_trend};

/// Snapshots whose last device upload is older than this are discarded.
pub const STALE_DATA_THRESHOLD_MINUTES: f64 = 20.0;

/// Stateful CareLink normalizer.
///
/// Holds the [`PumpClock`] so repeated polls only log offset changes.
#[derive(Debug, Default)]
pub struct Transformer {
    clock: PumpClock,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pump_clock(&self) -> &PumpClock {
        &self.clock
    }

    /// Convert a snapshot into Nightscout records.
    ///
    /// `sgv_limit` keeps only the newest `n` entries; `None` keeps all.
    /// A stale snapshot yields an empty result.
    pub fn transform(&mut self, data: &CareLinkData, sgv_limit: Option<usize>) -> TransformResult {
        let Some(server_time) = fresh_server_time(data) else {
            return TransformResult::default();
        };

        let offset = self
            .clock
            .guess(data.s_medical_device_time.as_deref(), server_time);
        let device = data.device_name();

        let mut entries = sgv_entries(data, offset, &device);
        if let Some(limit) = sgv_limit {
            let excess = entries.len().saturating_sub(limit);
            entries.drain(..excess);
        }

        debug!(
            "Transformed CareLink snapshot: {} entries for {}",
            entries.len(),
            device
        );

        TransformResult {
            devicestatus: vec![device_status(data, offset, device)],
            entries,
        }
    }

    /// Extract the most recent glucose value as a canonical reading.
    ///
    /// Prefers `lastSG`, falling back to the newest valid `sgs` record.
    /// Returns `None` for stale snapshots or when no valid value exists.
    pub fn latest_reading(&mut self, data: &CareLinkData) -> Option<Reading> {
        let server_time = fresh_server_time(data)?;
        let offset = self
            .clock
            .guess(data.s_medical_device_time.as_deref(), server_time);

        let (sg, millis) = data
            .last_sg
            .as_ref()
            .and_then(|sg| corrected_value(sg, offset))
            .or_else(|| {
                data.sgs
                    .iter()
                    .filter(|sg| sg.is_sensor_glucose())
                    .filter_map(|sg| corrected_value(sg, offset))
                    .max_by_key(|(_, millis)| *millis)
            })?;

        let timestamp =
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()?;

        let trend = data
            .last_sg
            .as_ref()
            .and_then(|sg| sg.trend_arrow.as_deref())
            .or(data.last_sg_trend.as_deref())
            .map(carelink_to_trend)
            .unwrap_or(Trend::Flat);

        Some(
            Reading::new(sg, timestamp, trend)
                .with_active_insulin(data.active_insulin_amount())
                .with_pump_battery(data.medical_device_battery_level_percent)
                .with_sensor_duration(data.sensor_duration_hours),
        )
    }
}

/// The snapshot's server time, or `None` if the snapshot is stale.
fn fresh_server_time(data: &CareLinkData) -> Option<i64> {
    let Some(recency) = data.recency_minutes() else {
        warn!("CareLink snapshot has no usable server timestamps; discarding");
        return None;
    };

    if recency > STALE_DATA_THRESHOLD_MINUTES {
        warn!("Stale CareLink data: {:.2} minutes old", recency);
        return None;
    }

    data.current_server_time
}

fn corrected_value(sg: &CareLinkSg, offset: PumpOffset) -> Option<(f64, i64)> {
    let value = sg.glucose()?;
    let local = parse_pump_time(sg.datetime.as_deref()?)?;
    Some((value, offset.to_utc_millis(local)))
}

fn sgv_entries(data: &CareLinkData, offset: PumpOffset, device: &str) -> Vec<SgvEntry> {
    let mut entries: Vec<SgvEntry> = data
        .sgs
        .iter()
        .filter(|sg| sg.is_sensor_glucose())
        .filter_map(|sg| {
            let Some((value, date)) = corrected_value(sg, offset) else {
                debug!("Skipping SG record with unreadable time {:?}", sg.datetime);
                return None;
            };
            Some(SgvEntry::new(value, date, device))
        })
        .collect();

    // A trailing gap means the arrow no longer describes the last kept value.
    let ends_in_gap = data.sgs.last().is_some_and(|sg| sg.sg == Some(0.0));
    if !ends_in_gap
        && let Some(newest) = entries.last_mut()
        && let Some(trend) = data.last_sg_trend.as_deref().and_then(carelink_to_nightscout)
    {
        newest.trend = Some(trend.trend);
        newest.direction = Some(trend.direction);
    }

    entries
}

fn device_status(data: &CareLinkData, offset: PumpOffset, device: String) -> DeviceStatus {
    let created_at = iso_string_or_now(data.last_medical_device_data_update_server_time);

    let mut connect = ConnectStatus {
        sensor_state: data.sensor_state.clone(),
        calib_status: data.calib_status.clone(),
        sensor_duration_hours: data.sensor_duration_hours,
        time_to_next_calib_hours: data.time_to_next_calib_hours,
        conduit_in_range: data.conduit_in_range,
        conduit_medical_device_in_range: data.conduit_medical_device_in_range,
        conduit_sensor_in_range: data.conduit_sensor_in_range,
        ..Default::default()
    };

    if data.is_guardian() {
        connect.medical_device_battery_level_percent = data.medical_device_battery_level_percent;
        connect.medical_device_family = data.medical_device_family.clone();

        return DeviceStatus {
            created_at,
            device,
            uploader: Uploader {
                battery: data.medical_device_battery_level_percent,
            },
            pump: None,
            connect,
        };
    }

    let clock = data
        .s_medical_device_time
        .as_deref()
        .and_then(parse_pump_time)
        .map(|local| iso_string(offset.to_utc_millis(local)));

    DeviceStatus {
        created_at: created_at.clone(),
        device,
        uploader: Uploader {
            battery: data.conduit_battery_level,
        },
        pump: Some(PumpStatus {
            battery: PumpBattery {
                percent: data.medical_device_battery_level_percent,
            },
            reservoir: data.reservoir(),
            iob: InsulinOnBoard {
                timestamp: created_at,
                bolusiob: data.active_insulin_amount(),
            },
            clock,
        }),
        connect,
    }
}
