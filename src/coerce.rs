//! Conversion of decoded values into the kind a codec declares.
//!
//! Decoding reads a payload in the shape its tag names, then coerces it into
//! the declared kind. Integer narrowing is checked; floating-point and
//! decimal values are rounded half-to-even before narrowing.

use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::core::ScalarKind;
use crate::time::{duration_to_ticks, parse_duration, ticks_to_duration};
use crate::value::{CiString, DateTimeKind, DateTimeValue, Value};
use crate::{CodecError, Result};

/// Converts `value` into `kind`.
///
/// `Null` passes through unchanged and the range sentinels become the
/// kind's minimum and maximum.
///
/// # Errors
/// - `Coercion` when no conversion exists between the two kinds.
/// - `Overflow` when the value does not fit the target.
/// - `Parse` when text does not parse as the target.
pub fn coerce(value: Value, kind: ScalarKind) -> Result<Value> {
    match value {
        Value::Null => return Ok(Value::Null),
        Value::Min => return kind.min_value(),
        Value::Max => return kind.max_value(),
        _ if value.kind() == Some(kind) => return Ok(value),
        Value::Object(_) | Value::Array(_) => return Err(mismatch(&value, kind)),
        _ => {}
    }
    Ok(match kind {
        ScalarKind::Boolean => Value::Bool(to_bool(&value)?),
        ScalarKind::Byte => Value::Byte(narrow(to_integer(&value, kind)?, kind)?),
        ScalarKind::SByte => Value::SByte(narrow(to_integer(&value, kind)?, kind)?),
        ScalarKind::Int16 => Value::Int16(narrow(to_integer(&value, kind)?, kind)?),
        ScalarKind::UInt16 => Value::UInt16(narrow(to_integer(&value, kind)?, kind)?),
        ScalarKind::Int32 => Value::Int32(narrow(to_integer(&value, kind)?, kind)?),
        ScalarKind::UInt32 => Value::UInt32(narrow(to_integer(&value, kind)?, kind)?),
        ScalarKind::Int64 => Value::Int64(narrow(to_integer(&value, kind)?, kind)?),
        ScalarKind::UInt64 => Value::UInt64(narrow(to_integer(&value, kind)?, kind)?),
        ScalarKind::Single => {
            let wide = to_f64(&value, kind)?;
            let single = wide as f32;
            if wide.is_finite() && single.is_infinite() {
                return Err(overflow(&value, kind));
            }
            Value::Single(single)
        }
        ScalarKind::Double => Value::Double(to_f64(&value, kind)?),
        ScalarKind::Decimal => Value::Decimal(to_decimal(&value, kind)?),
        ScalarKind::DateTime => Value::DateTime(to_date_time(&value)?),
        ScalarKind::DateTimeOffset => Value::DateTimeOffset(to_offset(&value)?),
        ScalarKind::TimeSpan => Value::TimeSpan(to_time_span(&value)?),
        ScalarKind::Char => Value::Char(to_char(&value)?),
        ScalarKind::String => Value::String(to_text(value, kind)?),
        ScalarKind::CaseInsensitiveString => {
            Value::CaseInsensitive(CiString::from(to_text(value, kind)?))
        }
        ScalarKind::Enum => Value::Enum(to_enum_name(&value)?),
        ScalarKind::ByteArray => Value::Bytes(to_bytes(value)?),
        ScalarKind::Guid => Value::Guid(to_guid(&value)?),
    })
}

fn mismatch(value: &Value, kind: ScalarKind) -> CodecError {
    CodecError::Coercion {
        from: value.type_name(),
        to: kind.name(),
    }
}

fn overflow(value: &Value, kind: ScalarKind) -> CodecError {
    CodecError::Overflow {
        value: value.to_string(),
        to: kind.name(),
    }
}

fn parse_error(text: &str, kind: ScalarKind) -> CodecError {
    CodecError::Parse {
        text: text.to_string(),
        to: kind.name(),
    }
}

fn narrow<T: TryFrom<i128>>(value: i128, kind: ScalarKind) -> Result<T> {
    T::try_from(value).map_err(|_| CodecError::Overflow {
        value: value.to_string(),
        to: kind.name(),
    })
}

fn round_decimal(value: Decimal, kind: ScalarKind) -> Result<i128> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i128()
        .ok_or_else(|| CodecError::Overflow {
            value: value.to_string(),
            to: kind.name(),
        })
}

fn round_float(value: f64, kind: ScalarKind) -> Result<i128> {
    // i128::MAX as f64 rounds up to 2^127, which is out of range
    const LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;
    let rounded = value.round_ties_even();
    if !rounded.is_finite() || rounded >= LIMIT || rounded < -LIMIT {
        return Err(CodecError::Overflow {
            value: value.to_string(),
            to: kind.name(),
        });
    }
    Ok(rounded as i128)
}

fn to_integer(value: &Value, kind: ScalarKind) -> Result<i128> {
    Ok(match value {
        Value::Bool(v) => *v as i128,
        Value::Byte(v) => *v as i128,
        Value::SByte(v) => *v as i128,
        Value::Int16(v) => *v as i128,
        Value::UInt16(v) => *v as i128,
        Value::Int32(v) => *v as i128,
        Value::UInt32(v) => *v as i128,
        Value::Int64(v) => *v as i128,
        Value::UInt64(v) => *v as i128,
        Value::Char(v) => *v as u32 as i128,
        Value::Single(v) => round_float(*v as f64, kind)?,
        Value::Double(v) => round_float(*v, kind)?,
        Value::Decimal(v) => round_decimal(*v, kind)?,
        Value::TimeSpan(v) => duration_to_ticks(v)? as i128,
        Value::DateTime(v) => v.ticks()? as i128,
        Value::String(_) | Value::CaseInsensitive(_) | Value::Enum(_) => {
            let text = value.as_str().unwrap_or_default().trim();
            match text.parse::<i128>() {
                Ok(v) => v,
                Err(_) => round_decimal(parse_decimal(text, kind)?, kind)?,
            }
        }
        _ => return Err(mismatch(value, kind)),
    })
}

fn parse_decimal(text: &str, kind: ScalarKind) -> Result<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| parse_error(text, kind))
}

fn to_f64(value: &Value, kind: ScalarKind) -> Result<f64> {
    Ok(match value {
        Value::Bool(v) => *v as u8 as f64,
        Value::Single(v) => *v as f64,
        Value::Double(v) => *v,
        Value::Decimal(v) => v.to_f64().ok_or_else(|| overflow(value, kind))?,
        Value::String(_) | Value::CaseInsensitive(_) => {
            let text = value.as_str().unwrap_or_default().trim();
            text.parse::<f64>().map_err(|_| parse_error(text, kind))?
        }
        other => to_integer(other, kind)? as f64,
    })
}

fn to_decimal(value: &Value, kind: ScalarKind) -> Result<Decimal> {
    let converted = match value {
        Value::Bool(v) => Some(if *v { Decimal::ONE } else { Decimal::ZERO }),
        Value::Byte(v) => Some(Decimal::from(*v)),
        Value::SByte(v) => Some(Decimal::from(*v)),
        Value::Int16(v) => Some(Decimal::from(*v)),
        Value::UInt16(v) => Some(Decimal::from(*v)),
        Value::Int32(v) => Some(Decimal::from(*v)),
        Value::UInt32(v) => Some(Decimal::from(*v)),
        Value::Int64(v) => Some(Decimal::from(*v)),
        Value::UInt64(v) => Some(Decimal::from(*v)),
        Value::Single(v) => Decimal::from_f32(*v),
        Value::Double(v) => Decimal::from_f64(*v),
        Value::String(_) | Value::CaseInsensitive(_) => {
            return parse_decimal(value.as_str().unwrap_or_default().trim(), kind)
        }
        Value::Char(_) => Decimal::from_i128(to_integer(value, kind)?),
        _ => return Err(mismatch(value, kind)),
    };
    converted.ok_or_else(|| overflow(value, kind))
}

fn to_bool(value: &Value) -> Result<bool> {
    let kind = ScalarKind::Boolean;
    match value {
        Value::Bool(v) => Ok(*v),
        Value::String(_) | Value::CaseInsensitive(_) => {
            let text = value.as_str().unwrap_or_default().trim();
            if text.eq_ignore_ascii_case("true") {
                Ok(true)
            } else if text.eq_ignore_ascii_case("false") {
                Ok(false)
            } else {
                parse_decimal(text, kind).map(|d| !d.is_zero())
            }
        }
        Value::Single(v) => Ok(*v != 0.0),
        Value::Double(v) => Ok(*v != 0.0),
        Value::Decimal(v) => Ok(!v.is_zero()),
        other => to_integer(other, kind).map(|v| v != 0),
    }
}

fn to_char(value: &Value) -> Result<char> {
    let kind = ScalarKind::Char;
    match value {
        Value::Char(v) => Ok(*v),
        Value::String(_) | Value::CaseInsensitive(_) => {
            let text = value.as_str().unwrap_or_default();
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(parse_error(text, kind)),
            }
        }
        Value::Single(_) | Value::Double(_) | Value::Decimal(_) | Value::Bool(_) => {
            Err(mismatch(value, kind))
        }
        other => {
            let code: u32 = narrow(to_integer(other, kind)?, kind)?;
            char::from_u32(code).ok_or_else(|| overflow(value, kind))
        }
    }
}

fn to_text(value: Value, kind: ScalarKind) -> Result<String> {
    match value {
        Value::String(v) | Value::Enum(v) => Ok(v),
        Value::CaseInsensitive(v) => Ok(v.into_string()),
        Value::Bytes(v) => String::from_utf8(v.to_vec()).map_err(|_| CodecError::Coercion {
            from: "ByteArray",
            to: kind.name(),
        }),
        other => Ok(other.to_string()),
    }
}

fn to_enum_name(value: &Value) -> Result<String> {
    match value {
        Value::Enum(v) | Value::String(v) => Ok(v.clone()),
        Value::CaseInsensitive(v) => Ok(v.as_str().to_string()),
        Value::Bool(_) | Value::Single(_) | Value::Double(_) | Value::Decimal(_) => {
            Err(mismatch(value, ScalarKind::Enum))
        }
        other => to_integer(other, ScalarKind::Enum).map(|v| v.to_string()),
    }
}

fn parse_date_time(text: &str) -> Result<DateTimeValue> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(DateTimeValue::from_utc(&parsed.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(DateTimeValue::unspecified(naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|date| DateTimeValue::unspecified(date.and_time(NaiveTime::default())))
        .map_err(|_| parse_error(text, ScalarKind::DateTime))
}

fn to_date_time(value: &Value) -> Result<DateTimeValue> {
    match value {
        Value::DateTime(v) => Ok(*v),
        Value::DateTimeOffset(v) => Ok(DateTimeValue::from_utc(&v.with_timezone(&Utc))),
        Value::String(_) | Value::CaseInsensitive(_) => {
            parse_date_time(value.as_str().unwrap_or_default())
        }
        Value::Int64(_) | Value::UInt64(_) | Value::Int32(_) | Value::UInt32(_) => {
            let ticks = narrow(to_integer(value, ScalarKind::DateTime)?, ScalarKind::DateTime)?;
            DateTimeValue::from_ticks(ticks, DateTimeKind::Unspecified)
        }
        _ => Err(mismatch(value, ScalarKind::DateTime)),
    }
}

fn to_offset(value: &Value) -> Result<DateTime<FixedOffset>> {
    if let Value::String(_) | Value::CaseInsensitive(_) = value {
        let text = value.as_str().unwrap_or_default().trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
            return Ok(parsed);
        }
    }
    let date_time = match value {
        Value::DateTimeOffset(v) => return Ok(*v),
        other => to_date_time(other).map_err(|e| match e {
            CodecError::Coercion { from, .. } => CodecError::Coercion {
                from,
                to: ScalarKind::DateTimeOffset.name(),
            },
            e => e,
        })?,
    };
    match date_time.kind {
        DateTimeKind::Local => Local
            .from_local_datetime(&date_time.naive)
            .earliest()
            .map(|local| local.fixed_offset())
            .ok_or_else(|| overflow(value, ScalarKind::DateTimeOffset)),
        DateTimeKind::Utc | DateTimeKind::Unspecified => {
            Ok(date_time.naive.and_utc().fixed_offset())
        }
    }
}

fn to_time_span(value: &Value) -> Result<chrono::TimeDelta> {
    let kind = ScalarKind::TimeSpan;
    match value {
        Value::TimeSpan(v) => Ok(*v),
        Value::String(_) | Value::CaseInsensitive(_) => {
            parse_duration(value.as_str().unwrap_or_default())
        }
        Value::Single(_) | Value::Double(_) | Value::Decimal(_) | Value::Bool(_) => {
            Err(mismatch(value, kind))
        }
        other => Ok(ticks_to_duration(narrow(to_integer(other, kind)?, kind)?)),
    }
}

fn to_guid(value: &Value) -> Result<Uuid> {
    let kind = ScalarKind::Guid;
    match value {
        Value::Guid(v) => Ok(*v),
        Value::Bytes(v) => Uuid::from_slice(v).map_err(|_| overflow(value, kind)),
        Value::String(_) | Value::CaseInsensitive(_) => {
            let text = value.as_str().unwrap_or_default().trim();
            Uuid::parse_str(text).map_err(|_| parse_error(text, kind))
        }
        _ => Err(mismatch(value, kind)),
    }
}

fn to_bytes(value: Value) -> Result<Bytes> {
    match value {
        Value::Bytes(v) => Ok(v),
        Value::Guid(v) => Ok(Bytes::copy_from_slice(v.as_bytes())),
        Value::String(v) => Ok(Bytes::from(v.into_bytes())),
        Value::CaseInsensitive(v) => Ok(Bytes::from(v.into_string().into_bytes())),
        other => Err(mismatch(&other, ScalarKind::ByteArray)),
    }
}
