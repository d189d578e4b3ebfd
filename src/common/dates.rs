//! Date, time and timestamp decoding.
//!
//! The format stores calendar dates as a u16 count of days since
//! 1983-12-31, times of day as a u16 count of tenths of a minute since
//! midnight, and combined timestamps as a u16 time-of-day in 6-second units
//! followed by the u16 day count. 65535 is the NA sentinel throughout.
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::common::binary::{read_u16_le, read_u32_le};

/// Day zero of the date encoding.
pub fn epoch_date() -> NaiveDate {
    // Always valid, const construction is not available on this chrono API.
    NaiveDate::from_ymd_opt(1983, 12, 31).unwrap_or_default()
}

/// Midnight on the epoch date.
pub fn epoch() -> NaiveDateTime {
    epoch_date().and_time(NaiveTime::MIN)
}

/// Decode a u16 day count into a calendar date. 65535 decodes as NA.
pub fn date(data: &[u8], offset: usize) -> Option<NaiveDate> {
    let days = read_u16_le(data, offset).ok()?;
    if days == 65535 {
        return None;
    }
    epoch_date().checked_add_days(chrono::Days::new(u64::from(days)))
}

/// Decode a u16 tenths-of-a-minute value into a time of day.
///
/// The stored value is truncated to whole minutes, matching the precision
/// the format actually uses for calendar hours.
pub fn time(data: &[u8], offset: usize) -> Option<NaiveTime> {
    let tenths = read_u16_le(data, offset).ok()?;
    let seconds = (u32::from(tenths) / 10) * 60;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds % 86_400, 0)
}

/// Decode a four byte timestamp: u16 time-of-day in 6-second units followed
/// by a u16 day count.
///
/// Day values of 65535 or <= 1 decode as NA. A time value of 65535 is
/// treated as midnight. Day counts below 100 whose time component does not
/// land on a whole minute are artefacts of other data sharing the field and
/// also decode as NA.
pub fn timestamp(data: &[u8], offset: usize) -> Option<NaiveDateTime> {
    let days = read_u16_le(data, offset + 2).ok()?;
    if days == 65535 || days <= 1 {
        return None;
    }

    let mut ticks = read_u16_le(data, offset).ok()?;
    if ticks == 65535 {
        ticks = 0;
    }

    let result = epoch()
        .checked_add_days(chrono::Days::new(u64::from(days)))?
        .checked_add_signed(chrono::Duration::seconds(i64::from(ticks) * 6))?;

    if days < 100 && result.second() != 0 {
        return None;
    }
    Some(result)
}

/// Decode a u32 count of tenths of a minute since the epoch into a
/// timestamp.
pub fn timestamp_from_tenths(data: &[u8], offset: usize) -> Option<NaiveDateTime> {
    let tenths = read_u32_le(data, offset).ok()?;
    epoch().checked_add_signed(chrono::Duration::seconds(i64::from(tenths) * 6))
}

/// Decode a u16 duration stored in tenths of a minute into whole minutes.
pub fn duration_minutes(data: &[u8], offset: usize) -> Option<f64> {
    let tenths = read_u16_le(data, offset).ok()?;
    Some(f64::from(tenths) / 10.0)
}
