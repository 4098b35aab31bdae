//! Tick arithmetic for the date/time wire shapes.
//!
//! A tick is 100 nanoseconds. Date-times count ticks from
//! 0001-01-01T00:00:00, time spans are signed tick counts.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, TimeZone};

use crate::{CodecError, Result};

pub const TICKS_PER_SECOND: i64 = 10_000_000;
pub const NANOS_PER_TICK: i64 = 100;

/// Seconds between 0001-01-01 and the Unix epoch.
const EPOCH_OFFSET_SECONDS: i64 = 62_135_596_800;

/// Ticks of 0001-01-01T00:00:00.
pub const MIN_DATE_TICKS: i64 = 0;
/// Ticks of 9999-12-31T23:59:59.9999999.
pub const MAX_DATE_TICKS: i64 = 3_155_378_975_999_999_999;

pub fn naive_to_ticks(value: &NaiveDateTime) -> Result<i64> {
    let utc = value.and_utc();
    let seconds = utc.timestamp() + EPOCH_OFFSET_SECONDS;
    let ticks = seconds
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(utc.timestamp_subsec_nanos() as i64 / NANOS_PER_TICK))
        .filter(|t| (MIN_DATE_TICKS..=MAX_DATE_TICKS).contains(t))
        .ok_or_else(|| CodecError::Overflow {
            value: value.to_string(),
            to: "DateTime",
        })?;
    Ok(ticks)
}

pub fn ticks_to_naive(ticks: i64) -> Result<NaiveDateTime> {
    if !(MIN_DATE_TICKS..=MAX_DATE_TICKS).contains(&ticks) {
        return Err(CodecError::Overflow {
            value: ticks.to_string(),
            to: "DateTime",
        });
    }
    let seconds = ticks.div_euclid(TICKS_PER_SECOND) - EPOCH_OFFSET_SECONDS;
    let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK) as u32;
    DateTime::from_timestamp(seconds, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| CodecError::Overflow {
            value: ticks.to_string(),
            to: "DateTime",
        })
}

pub fn duration_to_ticks(value: &TimeDelta) -> Result<i64> {
    let seconds = value.num_seconds();
    let subsec = value.subsec_nanos() as i64 / NANOS_PER_TICK;
    seconds
        .checked_mul(TICKS_PER_SECOND)
        .and_then(|t| t.checked_add(subsec))
        .ok_or_else(|| CodecError::Overflow {
            value: value.to_string(),
            to: "TimeSpan",
        })
}

pub fn ticks_to_duration(ticks: i64) -> TimeDelta {
    TimeDelta::seconds(ticks / TICKS_PER_SECOND)
        + TimeDelta::nanoseconds((ticks % TICKS_PER_SECOND) * NANOS_PER_TICK)
}

/// Local clock ticks of a date-time-with-offset.
pub fn offset_to_ticks(value: &DateTime<FixedOffset>) -> Result<(i64, i64)> {
    let clock = naive_to_ticks(&value.naive_local())?;
    let offset = value.offset().local_minus_utc() as i64 * TICKS_PER_SECOND;
    Ok((clock, offset))
}

/// Rebuilds a date-time-with-offset. Any offset `FixedOffset` accepts
/// (whole seconds, under a day either way) is valid.
pub fn ticks_to_offset(clock: i64, offset: i64) -> Result<DateTime<FixedOffset>> {
    let invalid = || CodecError::Decode(format!("Invalid UTC offset of {} ticks", offset));
    if offset % TICKS_PER_SECOND != 0 {
        return Err(invalid());
    }
    let zone = i32::try_from(offset / TICKS_PER_SECOND)
        .ok()
        .and_then(FixedOffset::east_opt)
        .ok_or_else(invalid)?;
    let naive = ticks_to_naive(clock)?;
    zone.from_local_datetime(&naive)
        .single()
        .ok_or_else(|| CodecError::Overflow {
            value: naive.to_string(),
            to: "DateTimeOffset",
        })
}

/// Formats a time span as `[-][d.]hh:mm:ss[.fffffff]`.
pub fn format_duration(value: &TimeDelta) -> String {
    let ticks = duration_to_ticks(value).unwrap_or(if value < &TimeDelta::zero() {
        i64::MIN
    } else {
        i64::MAX
    });
    let sign = if ticks < 0 { "-" } else { "" };
    let ticks = ticks.unsigned_abs();
    let per_second = TICKS_PER_SECOND as u64;
    let fraction = ticks % per_second;
    let total_seconds = ticks / per_second;
    let (days, rest) = (total_seconds / 86_400, total_seconds % 86_400);
    let mut out = String::from(sign);
    if days > 0 {
        out.push_str(&format!("{}.", days));
    }
    out.push_str(&format!(
        "{:02}:{:02}:{:02}",
        rest / 3600,
        (rest % 3600) / 60,
        rest % 60
    ));
    if fraction > 0 {
        out.push_str(&format!(".{:07}", fraction));
    }
    out
}

/// Parses the output of [`format_duration`], or a bare tick count.
pub fn parse_duration(text: &str) -> Result<TimeDelta> {
    let parse_error = || CodecError::Parse {
        text: text.to_string(),
        to: "TimeSpan",
    };
    let trimmed = text.trim();
    if let Ok(ticks) = trimmed.parse::<i64>() {
        return Ok(ticks_to_duration(ticks));
    }
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (clock, fraction) = match body.split_once('.') {
        // a dot before the first colon separates days, not the fraction
        Some((head, tail)) if !head.contains(':') => match tail.split_once('.') {
            Some((clock, fraction)) => (format!("{}.{}", head, clock), Some(fraction)),
            None => (format!("{}.{}", head, tail), None),
        },
        Some((clock, fraction)) => (clock.to_string(), Some(fraction)),
        None => (body.to_string(), None),
    };
    let (days, clock) = match clock.split_once('.') {
        Some((days, clock)) => (days.parse::<i64>().map_err(|_| parse_error())?, clock),
        None => (0, clock.as_str()),
    };
    let parts: Vec<&str> = clock.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return Err(parse_error());
    };
    let number = |s: &str| s.parse::<i64>().map_err(|_| parse_error());
    let fraction = match fraction {
        Some(f) if f.is_empty() || f.len() > 7 => return Err(parse_error()),
        Some(f) => number(format!("{:0<7}", f).as_str())?,
        None => 0,
    };
    // i64 components cannot overflow i128 here
    let total_seconds = ((days as i128 * 24 + number(*hours)? as i128) * 60
        + number(*minutes)? as i128)
        * 60
        + number(*seconds)? as i128;
    let ticks = total_seconds * TICKS_PER_SECOND as i128 + fraction as i128;
    let ticks = i64::try_from(if negative { -ticks } else { ticks }).map_err(|_| {
        CodecError::Overflow {
            value: text.to_string(),
            to: "TimeSpan",
        }
    })?;
    Ok(ticks_to_duration(ticks))
}
