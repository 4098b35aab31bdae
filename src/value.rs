//! The dynamic value tree every codec reads and writes.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core::ScalarKind;
use crate::object::{DynamicObject, Object, Record};
use crate::time::{
    format_duration, naive_to_ticks, ticks_to_naive, MAX_DATE_TICKS, MIN_DATE_TICKS,
};
use crate::{CodecError, Result};

/// A decoded wire value.
///
/// `Min` and `Max` are range sentinels: they order below and above every
/// other value and exist so range filters can express open bounds.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Min,
    Max,
    Bool(bool),
    Byte(u8),
    SByte(i8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    DateTime(DateTimeValue),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeSpan(TimeDelta),
    Char(char),
    String(String),
    CaseInsensitive(CiString),
    /// An enum value stored by variant name.
    Enum(String),
    Bytes(Bytes),
    Guid(Uuid),
    Object(Object),
    Array(Vec<Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    /// Wraps a host record.
    pub fn record<T: Record>(record: T) -> Self {
        Value::Object(Object::Typed(Box::new(record)))
    }

    /// The scalar kind this value carries natively, if any.
    pub fn kind(&self) -> Option<ScalarKind> {
        Some(match self {
            Value::Bool(_) => ScalarKind::Boolean,
            Value::Byte(_) => ScalarKind::Byte,
            Value::SByte(_) => ScalarKind::SByte,
            Value::Int16(_) => ScalarKind::Int16,
            Value::UInt16(_) => ScalarKind::UInt16,
            Value::Int32(_) => ScalarKind::Int32,
            Value::UInt32(_) => ScalarKind::UInt32,
            Value::Int64(_) => ScalarKind::Int64,
            Value::UInt64(_) => ScalarKind::UInt64,
            Value::Single(_) => ScalarKind::Single,
            Value::Double(_) => ScalarKind::Double,
            Value::Decimal(_) => ScalarKind::Decimal,
            Value::DateTime(_) => ScalarKind::DateTime,
            Value::DateTimeOffset(_) => ScalarKind::DateTimeOffset,
            Value::TimeSpan(_) => ScalarKind::TimeSpan,
            Value::Char(_) => ScalarKind::Char,
            Value::String(_) => ScalarKind::String,
            Value::CaseInsensitive(_) => ScalarKind::CaseInsensitiveString,
            Value::Enum(_) => ScalarKind::Enum,
            Value::Bytes(_) => ScalarKind::ByteArray,
            Value::Guid(_) => ScalarKind::Guid,
            Value::Null | Value::Min | Value::Max | Value::Object(_) | Value::Array(_) => {
                return None
            }
        })
    }

    /// Short name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Min => "Min",
            Value::Max => "Max",
            Value::Object(_) => "Object",
            Value::Array(_) => "Array",
            other => other.kind().map_or("Unknown", ScalarKind::name),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Value::Min | Value::Max)
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            Value::CaseInsensitive(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Converts an object value into the host record `T`.
    ///
    /// # Errors
    /// Returns `NullNotAllowed` for `Null` and `Coercion` for non-objects.
    pub fn into_record<T: Record>(self) -> Result<T> {
        match self {
            Value::Object(object) => object.into_record(),
            Value::Null => Err(CodecError::NullNotAllowed {
                declared: T::TYPE_NAME,
            }),
            other => Err(CodecError::Coercion {
                from: other.type_name(),
                to: T::TYPE_NAME,
            }),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident,)*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Bool,
    u8 => Byte,
    i8 => SByte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Single,
    f64 => Double,
    Decimal => Decimal,
    DateTimeValue => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    TimeDelta => TimeSpan,
    char => Char,
    String => String,
    CiString => CaseInsensitive,
    Bytes => Bytes,
    Uuid => Guid,
    Object => Object,
    Vec<Value> => Array,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<DynamicObject> for Value {
    fn from(value: DynamicObject) -> Self {
        Value::Object(Object::Dynamic(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Min, Value::Min) | (Value::Max, Value::Max) => {
                Some(Ordering::Equal)
            }
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Min, _) => Some(Ordering::Less),
            (_, Value::Min) => Some(Ordering::Greater),
            (Value::Max, _) => Some(Ordering::Greater),
            (_, Value::Max) => Some(Ordering::Less),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Byte(a), Value::Byte(b)) => a.partial_cmp(b),
            (Value::SByte(a), Value::SByte(b)) => a.partial_cmp(b),
            (Value::Int16(a), Value::Int16(b)) => a.partial_cmp(b),
            (Value::UInt16(a), Value::UInt16(b)) => a.partial_cmp(b),
            (Value::Int32(a), Value::Int32(b)) => a.partial_cmp(b),
            (Value::UInt32(a), Value::UInt32(b)) => a.partial_cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.partial_cmp(b),
            (Value::UInt64(a), Value::UInt64(b)) => a.partial_cmp(b),
            (Value::Single(a), Value::Single(b)) => a.partial_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Decimal(a), Value::Decimal(b)) => a.partial_cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
            (Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => a.partial_cmp(b),
            (Value::TimeSpan(a), Value::TimeSpan(b)) => a.partial_cmp(b),
            (Value::Char(a), Value::Char(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) | (Value::Enum(a), Value::Enum(b)) => {
                a.partial_cmp(b)
            }
            (Value::CaseInsensitive(a), Value::CaseInsensitive(b)) => a.partial_cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.partial_cmp(b),
            (Value::Guid(a), Value::Guid(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Min => f.write_str("MIN"),
            Value::Max => f.write_str("MAX"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::SByte(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Single(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::DateTimeOffset(v) => f.write_str(&v.to_rfc3339()),
            Value::TimeSpan(v) => f.write_str(&format_duration(v)),
            Value::Char(v) => write!(f, "{}", v),
            Value::String(v) | Value::Enum(v) => f.write_str(v),
            Value::CaseInsensitive(v) => f.write_str(v),
            Value::Bytes(v) => {
                f.write_str("0x")?;
                for byte in v.iter() {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Guid(v) => write!(f, "{}", v),
            Value::Object(v) => write!(f, "{}{{..}}", v.type_name()),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A string that compares, orders and hashes ignoring case.
#[derive(Debug, Clone, Default)]
pub struct CiString(String);

impl CiString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars().flat_map(char::to_lowercase)
    }
}

impl PartialEq for CiString {
    fn eq(&self, other: &Self) -> bool {
        self.folded().eq(other.folded())
    }
}

impl Eq for CiString {}

impl PartialOrd for CiString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CiString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded().cmp(other.folded())
    }
}

impl Hash for CiString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.folded() {
            c.hash(state);
        }
    }
}

impl Deref for CiString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CiString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CiString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CiString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// How the clock time of a [`DateTimeValue`] is to be read. Written as 2 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DateTimeKind {
    #[default]
    Unspecified = 0,
    Utc = 1,
    Local = 2,
}

impl DateTimeKind {
    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(DateTimeKind::Unspecified),
            1 => Ok(DateTimeKind::Utc),
            2 => Ok(DateTimeKind::Local),
            other => Err(CodecError::Decode(format!("Invalid date-time kind: {}", other))),
        }
    }
}

/// A clock time plus the kind discriminator that travels with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTimeValue {
    pub naive: NaiveDateTime,
    pub kind: DateTimeKind,
}

impl DateTimeValue {
    pub fn new(naive: NaiveDateTime, kind: DateTimeKind) -> Self {
        Self { naive, kind }
    }

    pub fn unspecified(naive: NaiveDateTime) -> Self {
        Self::new(naive, DateTimeKind::Unspecified)
    }

    pub fn from_utc(value: &DateTime<Utc>) -> Self {
        Self::new(value.naive_utc(), DateTimeKind::Utc)
    }

    pub fn from_local(value: &DateTime<Local>) -> Self {
        Self::new(value.naive_local(), DateTimeKind::Local)
    }

    pub fn ticks(&self) -> Result<i64> {
        naive_to_ticks(&self.naive)
    }

    pub fn from_ticks(ticks: i64, kind: DateTimeKind) -> Result<Self> {
        Ok(Self::new(ticks_to_naive(ticks)?, kind))
    }

    pub fn min() -> Result<Self> {
        Self::from_ticks(MIN_DATE_TICKS, DateTimeKind::Unspecified)
    }

    pub fn max() -> Result<Self> {
        Self::from_ticks(MAX_DATE_TICKS, DateTimeKind::Unspecified)
    }
}

impl fmt::Display for DateTimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DateTimeKind::Utc => write!(f, "{}", self.naive.format("%Y-%m-%dT%H:%M:%S%.fZ")),
            _ => write!(f, "{}", self.naive.format("%Y-%m-%dT%H:%M:%S%.f")),
        }
    }
}
