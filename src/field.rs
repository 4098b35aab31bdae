//! Mapping between host field types and wire values.

use std::any::TypeId;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeDelta, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::coerce::coerce;
use crate::core::{IntegerEncoding, ScalarCodec, ScalarKind};
use crate::object::{CompiledCodec, Record};
use crate::value::{CiString, DateTimeKind, DateTimeValue, Value};
use crate::{CodecError, Result};

/// The declared wire shape of one record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Scalar(ScalarCodec),
    /// A nested host record.
    Record { ty: RecordType, nullable: bool },
    Array {
        element: Box<FieldType>,
        nullable: bool,
    },
    /// Any wire value; objects are decoded by peeking their type name.
    Dynamic,
}

impl FieldType {
    pub fn nullable(self) -> Self {
        match self {
            FieldType::Scalar(codec) => FieldType::Scalar(codec.into_nullable()),
            FieldType::Record { ty, .. } => FieldType::Record { ty, nullable: true },
            FieldType::Array { element, .. } => FieldType::Array {
                element,
                nullable: true,
            },
            FieldType::Dynamic => FieldType::Dynamic,
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            FieldType::Scalar(codec) => codec.is_nullable(),
            FieldType::Record { nullable, .. } | FieldType::Array { nullable, .. } => *nullable,
            FieldType::Dynamic => true,
        }
    }

    pub fn declared_type(&self) -> &'static str {
        match self {
            FieldType::Scalar(codec) => codec.declared_type(),
            FieldType::Record { ty, .. } => ty.name,
            FieldType::Array { .. } => "Array",
            FieldType::Dynamic => "Dynamic",
        }
    }

    /// Applies `integers` to every scalar codec in this type.
    pub fn with_integer_encoding(self, integers: IntegerEncoding) -> Self {
        match self {
            FieldType::Scalar(codec) => FieldType::Scalar(codec.with_integer_encoding(integers)),
            FieldType::Array { element, nullable } => FieldType::Array {
                element: Box::new(element.with_integer_encoding(integers)),
                nullable,
            },
            other => other,
        }
    }

    /// Record types reachable from this field, for eager registration.
    pub(crate) fn record_type(&self) -> Option<RecordType> {
        match self {
            FieldType::Record { ty, .. } => Some(*ty),
            FieldType::Array { element, .. } => element.record_type(),
            FieldType::Scalar(_) | FieldType::Dynamic => None,
        }
    }
}

/// Identity of a host record type plus a constructor for its compiled codec.
#[derive(Debug, Clone, Copy)]
pub struct RecordType {
    pub type_id: TypeId,
    pub name: &'static str,
    pub collection: Option<&'static str>,
    build: fn(IntegerEncoding) -> CompiledCodec,
}

impl RecordType {
    pub fn of<T: Record>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: T::TYPE_NAME,
            collection: T::COLLECTION,
            build: CompiledCodec::of::<T>,
        }
    }

    pub fn build(&self, integers: IntegerEncoding) -> CompiledCodec {
        (self.build)(integers)
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// A host type that can be stored in a record field.
///
/// Implemented for the primitive types, `Option<T>` (the nullable flavor),
/// `Vec<T>` (arrays), [`Value`] (dynamic fields), and every type deriving
/// `Record` or `WireEnum`.
pub trait FieldValue: Sized {
    fn field_type() -> FieldType;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

fn unexpected(value: Value, expected: &'static str) -> CodecError {
    match value {
        Value::Null => CodecError::NullNotAllowed { declared: expected },
        other => CodecError::TypeMismatch {
            expected,
            actual: other.type_name().to_string(),
        },
    }
}

macro_rules! impl_scalar_field {
    ($($ty:ty => $kind:ident / $variant:ident,)*) => {
        $(
            impl FieldValue for $ty {
                fn field_type() -> FieldType {
                    FieldType::Scalar(ScalarCodec::new(ScalarKind::$kind, false))
                }

                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }

                fn from_value(value: Value) -> Result<Self> {
                    match coerce(value, ScalarKind::$kind)? {
                        Value::$variant(v) => Ok(v),
                        other => Err(unexpected(other, ScalarKind::$kind.name())),
                    }
                }
            }
        )*
    };
}

impl_scalar_field! {
    bool => Boolean / Bool,
    u8 => Byte / Byte,
    i8 => SByte / SByte,
    i16 => Int16 / Int16,
    u16 => UInt16 / UInt16,
    i32 => Int32 / Int32,
    u32 => UInt32 / UInt32,
    i64 => Int64 / Int64,
    u64 => UInt64 / UInt64,
    f32 => Single / Single,
    f64 => Double / Double,
    Decimal => Decimal / Decimal,
    char => Char / Char,
    String => String / String,
    CiString => CaseInsensitiveString / CaseInsensitive,
    Bytes => ByteArray / Bytes,
    Uuid => Guid / Guid,
    DateTimeValue => DateTime / DateTime,
    DateTime<FixedOffset> => DateTimeOffset / DateTimeOffset,
    TimeDelta => TimeSpan / TimeSpan,
}

fn date_time_field() -> FieldType {
    FieldType::Scalar(ScalarCodec::new(ScalarKind::DateTime, false))
}

fn read_date_time(value: Value) -> Result<DateTimeValue> {
    DateTimeValue::from_value(value)
}

impl FieldValue for NaiveDateTime {
    fn field_type() -> FieldType {
        date_time_field()
    }

    fn to_value(&self) -> Value {
        Value::DateTime(DateTimeValue::unspecified(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        read_date_time(value).map(|v| v.naive)
    }
}

impl FieldValue for DateTime<Utc> {
    fn field_type() -> FieldType {
        date_time_field()
    }

    fn to_value(&self) -> Value {
        Value::DateTime(DateTimeValue::from_utc(self))
    }

    fn from_value(value: Value) -> Result<Self> {
        let value = read_date_time(value)?;
        match value.kind {
            DateTimeKind::Local => Local
                .from_local_datetime(&value.naive)
                .earliest()
                .map(|local| local.with_timezone(&Utc))
                .ok_or_else(|| CodecError::Overflow {
                    value: value.to_string(),
                    to: "DateTime",
                }),
            DateTimeKind::Utc | DateTimeKind::Unspecified => Ok(value.naive.and_utc()),
        }
    }
}

impl FieldValue for DateTime<Local> {
    fn field_type() -> FieldType {
        date_time_field()
    }

    fn to_value(&self) -> Value {
        Value::DateTime(DateTimeValue::from_local(self))
    }

    fn from_value(value: Value) -> Result<Self> {
        let value = read_date_time(value)?;
        match value.kind {
            DateTimeKind::Local => Local
                .from_local_datetime(&value.naive)
                .earliest()
                .ok_or_else(|| CodecError::Overflow {
                    value: value.to_string(),
                    to: "DateTime",
                }),
            DateTimeKind::Utc | DateTimeKind::Unspecified => {
                Ok(value.naive.and_utc().with_timezone(&Local))
            }
        }
    }
}

impl FieldValue for Value {
    fn field_type() -> FieldType {
        FieldType::Dynamic
    }

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn field_type() -> FieldType {
        T::field_type().nullable()
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, T::to_value)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::Array {
            element: Box::new(T::field_type()),
            nullable: false,
        }
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(unexpected(other, "Array")),
        }
    }
}
