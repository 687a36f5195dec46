//! Integer timestamps counted from a fixed epoch.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use once_cell::sync::Lazy;

use crate::error::{Error, Result};

/// GameCube timer ticks per second: the 162 MHz bus clock divided by four.
pub const OS_TICKS_PER_SECOND: u64 = 162_000_000 / 4;

static EPOCH_2000: Lazy<NaiveDateTime> = Lazy::new(|| {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
});

static EPOCH_1980: Lazy<NaiveDateTime> = Lazy::new(|| {
    NaiveDate::from_ymd_opt(1980, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
});

pub fn epoch_2000() -> NaiveDateTime {
    *EPOCH_2000
}

pub fn from_seconds_since_2000(seconds: u32) -> NaiveDateTime {
    *EPOCH_2000 + TimeDelta::seconds(seconds as i64)
}

pub fn to_seconds_since_2000(date: &NaiveDateTime) -> Result<u32> {
    let seconds = (*date - *EPOCH_2000).num_seconds();
    u32::try_from(seconds).map_err(|_| Error::UnsupportedField {
        field: "timestamp before 2000 or past 2136",
        value: seconds as u64,
    })
}

/// Whole seconds only; sub-second ticks are dropped.
pub fn from_os_ticks(ticks: u64) -> NaiveDateTime {
    from_seconds_since_2000((ticks / OS_TICKS_PER_SECOND).min(u32::MAX as u64) as u32)
}

pub fn to_os_ticks(date: &NaiveDateTime) -> Result<u64> {
    Ok(to_seconds_since_2000(date)? as u64 * OS_TICKS_PER_SECOND)
}

/// Saturn backup RAM dates.
pub fn from_minutes_since_1980(minutes: u32) -> NaiveDateTime {
    *EPOCH_1980 + TimeDelta::minutes(minutes as i64)
}

/// Seconds are dropped.
pub fn to_minutes_since_1980(date: &NaiveDateTime) -> Result<u32> {
    let minutes = (*date - *EPOCH_1980).num_minutes();
    u32::try_from(minutes).map_err(|_| Error::UnsupportedField {
        field: "timestamp before 1980",
        value: minutes as u64,
    })
}
