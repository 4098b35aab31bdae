use rust_decimal::Decimal;
use uuid::Uuid;

use crate::coerce::coerce;
use crate::time::{
    duration_to_ticks, offset_to_ticks, ticks_to_duration, ticks_to_offset, MAX_DATE_TICKS,
    MIN_DATE_TICKS,
};
use crate::value::{CiString, DateTimeKind, DateTimeValue, Value};
use crate::wire::{Reader, Writer};
use crate::{CodecError, Result};

/// Width of every wire tag, in bits.
pub const TAG_BITS: u8 = 6;

/// Version of the tag table below. Codes are never reassigned; new tags
/// take codes from the reserved range 32..=63 and bump this number.
pub const WIRE_VERSION: u8 = 1;

/// Nesting limit for [`skip_value`] on data nobody has validated.
const MAX_SKIP_DEPTH: usize = 256;

macro_rules! tag_table {
    ($($(#[$meta:meta])* $name:ident = $code:literal,)*) => {
        /// Type tags used in the typewire binary format.
        ///
        /// These tags are written as the first 6 bits of each encoded value to
        /// identify the shape of the payload that follows.
        ///
        /// - `Null`, `Min` and `Max` are sentinels and carry no payload.
        /// - Tags are stable and part of the wire format.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Tag {
            $($(#[$meta])* $name = $code,)*
        }

        impl Tag {
            /// Every tag in the table, in code order.
            pub const ALL: &'static [Tag] = &[$(Tag::$name,)*];

            pub const fn from_code(code: u8) -> Option<Tag> {
                match code {
                    $($code => Some(Tag::$name),)*
                    _ => None,
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $(Tag::$name => stringify!($name),)*
                }
            }
        }
    };
}

tag_table! {
    /// Absent value
    Null = 0,
    /// Lower range sentinel
    Min = 1,
    /// Upper range sentinel
    Max = 2,
    Boolean = 3,
    Byte = 4,
    SByte = 5,
    Int16 = 6,
    UInt16 = 7,
    Int32 = 8,
    UInt32 = 9,
    Int64 = 10,
    UInt64 = 11,
    /// Zigzag variable-length
    VarInt16 = 12,
    VarUInt16 = 13,
    VarInt32 = 14,
    VarUInt32 = 15,
    VarInt64 = 16,
    VarUInt64 = 17,
    Decimal = 18,
    Double = 19,
    Single = 20,
    /// 2-bit kind + ticks
    DateTime = 21,
    /// Clock ticks + offset ticks
    DateTimeOffset = 22,
    TimeSpan = 23,
    Char = 24,
    String = 25,
    CaseInsensitiveString = 26,
    /// Enum value written by variant name
    EnumString = 27,
    ByteArray = 28,
    Guid = 29,
    Object = 30,
    /// Only valid as an object field
    Array = 31,
}

impl Tag {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn is_sentinel(self) -> bool {
        matches!(self, Tag::Null | Tag::Min | Tag::Max)
    }

    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Tag::Byte
                | Tag::SByte
                | Tag::Int16
                | Tag::UInt16
                | Tag::Int32
                | Tag::UInt32
                | Tag::Int64
                | Tag::UInt64
                | Tag::VarInt16
                | Tag::VarUInt16
                | Tag::VarInt32
                | Tag::VarUInt32
                | Tag::VarInt64
                | Tag::VarUInt64
        )
    }

    pub const fn is_variable_length(self) -> bool {
        matches!(
            self,
            Tag::VarInt16
                | Tag::VarUInt16
                | Tag::VarInt32
                | Tag::VarUInt32
                | Tag::VarInt64
                | Tag::VarUInt64
        )
    }

    pub const fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, Tag::Decimal | Tag::Double | Tag::Single)
    }

    pub const fn is_text(self) -> bool {
        matches!(self, Tag::String | Tag::CaseInsensitiveString)
    }

    /// True for every tag whose payload a scalar codec can read.
    pub const fn is_scalar(self) -> bool {
        !self.is_sentinel() && !matches!(self, Tag::Object | Tag::Array)
    }
}

impl TryFrom<u8> for Tag {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self> {
        Tag::from_code(code).ok_or(CodecError::UnknownTag(code))
    }
}

/// Selects fixed-width or variable-length tags for integers of 16 bits and up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IntegerEncoding {
    #[default]
    Variable,
    Fixed,
}

/// The closed set of primitive kinds a scalar codec can be declared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Boolean,
    Byte,
    SByte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    DateTime,
    DateTimeOffset,
    TimeSpan,
    Char,
    String,
    CaseInsensitiveString,
    Enum,
    ByteArray,
    Guid,
}

impl ScalarKind {
    pub const fn name(self) -> &'static str {
        match self {
            ScalarKind::Boolean => "Boolean",
            ScalarKind::Byte => "Byte",
            ScalarKind::SByte => "SByte",
            ScalarKind::Int16 => "Int16",
            ScalarKind::UInt16 => "UInt16",
            ScalarKind::Int32 => "Int32",
            ScalarKind::UInt32 => "UInt32",
            ScalarKind::Int64 => "Int64",
            ScalarKind::UInt64 => "UInt64",
            ScalarKind::Single => "Single",
            ScalarKind::Double => "Double",
            ScalarKind::Decimal => "Decimal",
            ScalarKind::DateTime => "DateTime",
            ScalarKind::DateTimeOffset => "DateTimeOffset",
            ScalarKind::TimeSpan => "TimeSpan",
            ScalarKind::Char => "Char",
            ScalarKind::String => "String",
            ScalarKind::CaseInsensitiveString => "CaseInsensitiveString",
            ScalarKind::Enum => "Enum",
            ScalarKind::ByteArray => "ByteArray",
            ScalarKind::Guid => "Guid",
        }
    }

    /// The single tag a codec of this kind writes.
    pub const fn canonical_tag(self, integers: IntegerEncoding) -> Tag {
        let fixed = matches!(integers, IntegerEncoding::Fixed);
        match self {
            ScalarKind::Boolean => Tag::Boolean,
            ScalarKind::Byte => Tag::Byte,
            ScalarKind::SByte => Tag::SByte,
            ScalarKind::Int16 if fixed => Tag::Int16,
            ScalarKind::Int16 => Tag::VarInt16,
            ScalarKind::UInt16 if fixed => Tag::UInt16,
            ScalarKind::UInt16 => Tag::VarUInt16,
            ScalarKind::Int32 if fixed => Tag::Int32,
            ScalarKind::Int32 => Tag::VarInt32,
            ScalarKind::UInt32 if fixed => Tag::UInt32,
            ScalarKind::UInt32 => Tag::VarUInt32,
            ScalarKind::Int64 if fixed => Tag::Int64,
            ScalarKind::Int64 => Tag::VarInt64,
            ScalarKind::UInt64 if fixed => Tag::UInt64,
            ScalarKind::UInt64 => Tag::VarUInt64,
            ScalarKind::Single => Tag::Single,
            ScalarKind::Double => Tag::Double,
            ScalarKind::Decimal => Tag::Decimal,
            ScalarKind::DateTime => Tag::DateTime,
            ScalarKind::DateTimeOffset => Tag::DateTimeOffset,
            ScalarKind::TimeSpan => Tag::TimeSpan,
            ScalarKind::Char => Tag::Char,
            ScalarKind::String => Tag::String,
            ScalarKind::CaseInsensitiveString => Tag::CaseInsensitiveString,
            ScalarKind::Enum => Tag::EnumString,
            ScalarKind::ByteArray => Tag::ByteArray,
            ScalarKind::Guid => Tag::Guid,
        }
    }

    /// The kind whose natural payload `tag` carries.
    pub const fn of_tag(tag: Tag) -> Option<ScalarKind> {
        Some(match tag {
            Tag::Boolean => ScalarKind::Boolean,
            Tag::Byte => ScalarKind::Byte,
            Tag::SByte => ScalarKind::SByte,
            Tag::Int16 | Tag::VarInt16 => ScalarKind::Int16,
            Tag::UInt16 | Tag::VarUInt16 => ScalarKind::UInt16,
            Tag::Int32 | Tag::VarInt32 => ScalarKind::Int32,
            Tag::UInt32 | Tag::VarUInt32 => ScalarKind::UInt32,
            Tag::Int64 | Tag::VarInt64 => ScalarKind::Int64,
            Tag::UInt64 | Tag::VarUInt64 => ScalarKind::UInt64,
            Tag::Decimal => ScalarKind::Decimal,
            Tag::Double => ScalarKind::Double,
            Tag::Single => ScalarKind::Single,
            Tag::DateTime => ScalarKind::DateTime,
            Tag::DateTimeOffset => ScalarKind::DateTimeOffset,
            Tag::TimeSpan => ScalarKind::TimeSpan,
            Tag::Char => ScalarKind::Char,
            Tag::String => ScalarKind::String,
            Tag::CaseInsensitiveString => ScalarKind::CaseInsensitiveString,
            Tag::EnumString => ScalarKind::Enum,
            Tag::ByteArray => ScalarKind::ByteArray,
            Tag::Guid => ScalarKind::Guid,
            Tag::Null | Tag::Min | Tag::Max | Tag::Object | Tag::Array => return None,
        })
    }

    /// Whether a codec of this kind decodes a payload written under `tag`.
    ///
    /// This is the schema-evolution matrix: a field whose declared type has
    /// changed must still read what older writers stored.
    pub const fn accepts(self, tag: Tag) -> bool {
        let numeric = tag.is_numeric() || tag.is_text() || matches!(tag, Tag::Boolean);
        match self {
            ScalarKind::Boolean
            | ScalarKind::Single
            | ScalarKind::Double
            | ScalarKind::Decimal => numeric,
            ScalarKind::Byte
            | ScalarKind::SByte
            | ScalarKind::Int16
            | ScalarKind::UInt16
            | ScalarKind::Int32
            | ScalarKind::UInt32
            | ScalarKind::Int64
            | ScalarKind::UInt64 => numeric || matches!(tag, Tag::Char),
            ScalarKind::String | ScalarKind::CaseInsensitiveString => tag.is_scalar(),
            ScalarKind::Enum => {
                tag.is_integer() || tag.is_text() || matches!(tag, Tag::EnumString)
            }
            ScalarKind::Char => tag.is_integer() || tag.is_text() || matches!(tag, Tag::Char),
            ScalarKind::DateTime => {
                tag.is_text()
                    || matches!(
                        tag,
                        Tag::DateTime | Tag::DateTimeOffset | Tag::Int64 | Tag::VarInt64
                    )
            }
            ScalarKind::DateTimeOffset => {
                tag.is_text() || matches!(tag, Tag::DateTimeOffset | Tag::DateTime)
            }
            ScalarKind::TimeSpan => {
                tag.is_text()
                    || matches!(
                        tag,
                        Tag::TimeSpan | Tag::Int32 | Tag::VarInt32 | Tag::Int64 | Tag::VarInt64
                    )
            }
            ScalarKind::Guid => tag.is_text() || matches!(tag, Tag::Guid | Tag::ByteArray),
            ScalarKind::ByteArray => tag.is_text() || matches!(tag, Tag::ByteArray | Tag::Guid),
        }
    }

    /// The value a MIN sentinel decodes to. Kinds without a natural order keep
    /// the sentinel itself.
    pub fn min_value(self) -> Result<Value> {
        Ok(match self {
            ScalarKind::Boolean => Value::Bool(false),
            ScalarKind::Byte => Value::Byte(u8::MIN),
            ScalarKind::SByte => Value::SByte(i8::MIN),
            ScalarKind::Int16 => Value::Int16(i16::MIN),
            ScalarKind::UInt16 => Value::UInt16(u16::MIN),
            ScalarKind::Int32 => Value::Int32(i32::MIN),
            ScalarKind::UInt32 => Value::UInt32(u32::MIN),
            ScalarKind::Int64 => Value::Int64(i64::MIN),
            ScalarKind::UInt64 => Value::UInt64(u64::MIN),
            ScalarKind::Single => Value::Single(f32::MIN),
            ScalarKind::Double => Value::Double(f64::MIN),
            ScalarKind::Decimal => Value::Decimal(Decimal::MIN),
            ScalarKind::DateTime => Value::DateTime(DateTimeValue::min()?),
            ScalarKind::DateTimeOffset => {
                Value::DateTimeOffset(ticks_to_offset(MIN_DATE_TICKS, 0)?)
            }
            ScalarKind::TimeSpan => Value::TimeSpan(ticks_to_duration(i64::MIN)),
            ScalarKind::Char => Value::Char('\0'),
            ScalarKind::String => Value::String(String::new()),
            ScalarKind::CaseInsensitiveString => Value::CaseInsensitive(CiString::default()),
            ScalarKind::ByteArray => Value::Bytes(bytes::Bytes::new()),
            ScalarKind::Guid => Value::Guid(Uuid::nil()),
            ScalarKind::Enum => Value::Min,
        })
    }

    /// The value a MAX sentinel decodes to.
    pub fn max_value(self) -> Result<Value> {
        Ok(match self {
            ScalarKind::Boolean => Value::Bool(true),
            ScalarKind::Byte => Value::Byte(u8::MAX),
            ScalarKind::SByte => Value::SByte(i8::MAX),
            ScalarKind::Int16 => Value::Int16(i16::MAX),
            ScalarKind::UInt16 => Value::UInt16(u16::MAX),
            ScalarKind::Int32 => Value::Int32(i32::MAX),
            ScalarKind::UInt32 => Value::UInt32(u32::MAX),
            ScalarKind::Int64 => Value::Int64(i64::MAX),
            ScalarKind::UInt64 => Value::UInt64(u64::MAX),
            ScalarKind::Single => Value::Single(f32::MAX),
            ScalarKind::Double => Value::Double(f64::MAX),
            ScalarKind::Decimal => Value::Decimal(Decimal::MAX),
            ScalarKind::DateTime => Value::DateTime(DateTimeValue::max()?),
            ScalarKind::DateTimeOffset => {
                Value::DateTimeOffset(ticks_to_offset(MAX_DATE_TICKS, 0)?)
            }
            ScalarKind::TimeSpan => Value::TimeSpan(ticks_to_duration(i64::MAX)),
            ScalarKind::Char => Value::Char(char::MAX),
            ScalarKind::Guid => Value::Guid(Uuid::from_bytes([0xFF; 16])),
            ScalarKind::String
            | ScalarKind::CaseInsensitiveString
            | ScalarKind::ByteArray
            | ScalarKind::Enum => Value::Max,
        })
    }
}

/// Codec for one primitive kind, in its value or nullable flavor.
///
/// Scalar codecs are plain `Copy` descriptors: they hold no per-call state
/// and can be shared freely between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScalarCodec {
    kind: ScalarKind,
    nullable: bool,
    integers: IntegerEncoding,
}

impl ScalarCodec {
    pub const fn new(kind: ScalarKind, nullable: bool) -> Self {
        Self {
            kind,
            nullable,
            integers: IntegerEncoding::Variable,
        }
    }

    pub const fn with_integer_encoding(mut self, integers: IntegerEncoding) -> Self {
        self.integers = integers;
        self
    }

    pub const fn into_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub const fn declared_type(&self) -> &'static str {
        self.kind.name()
    }

    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub const fn canonical_tag(&self) -> Tag {
        self.kind.canonical_tag(self.integers)
    }

    /// Writes `value` under this codec's canonical tag.
    ///
    /// Values of another kind are coerced into the declared kind first.
    /// `embedded` does not change the scalar layout.
    ///
    /// # Errors
    /// `NullNotAllowed` / `SentinelNotAllowed` for a non-nullable codec given
    /// `Null` / `Min` / `Max`, or any coercion error.
    pub fn serialize(
        &self,
        writer: &mut Writer,
        write_tag: bool,
        _embedded: bool,
        value: &Value,
    ) -> Result<()> {
        match value {
            Value::Null => return self.serialize_null(writer, write_tag),
            Value::Min | Value::Max => {
                if !self.nullable {
                    return Err(CodecError::SentinelNotAllowed {
                        declared: self.declared_type(),
                    });
                }
                if !write_tag {
                    return Err(CodecError::Encode(format!(
                        "A range sentinel for {} must be written with its tag",
                        self.declared_type()
                    )));
                }
                writer.write_tag(if matches!(value, Value::Min) {
                    Tag::Min
                } else {
                    Tag::Max
                });
                return Ok(());
            }
            _ => {}
        }
        let coerced;
        let value = if value.kind() == Some(self.kind) {
            value
        } else {
            coerced = coerce(value.clone(), self.kind)?;
            &coerced
        };
        let tag = self.canonical_tag();
        if write_tag {
            writer.write_tag(tag);
        }
        write_payload(writer, tag, value)
    }

    fn serialize_null(&self, writer: &mut Writer, write_tag: bool) -> Result<()> {
        if !self.nullable {
            return Err(CodecError::NullNotAllowed {
                declared: self.declared_type(),
            });
        }
        if write_tag {
            writer.write_tag(Tag::Null);
            return Ok(());
        }
        match self.kind {
            ScalarKind::String | ScalarKind::CaseInsensitiveString | ScalarKind::Enum => {
                writer.write_string(None)
            }
            ScalarKind::ByteArray => writer.write_byte_array(None),
            _ => {
                return Err(CodecError::Encode(format!(
                    "An untagged null {} cannot be represented",
                    self.declared_type()
                )))
            }
        }
        Ok(())
    }

    /// Reads one value, reading the tag first when `tag` is `None`.
    ///
    /// # Errors
    /// - `UnsupportedTag` for a tag outside [`ScalarKind::accepts`], or a
    ///   sentinel given to a non-nullable codec.
    /// - `NullNotAllowed` when a non-nullable codec meets a null.
    /// - Any coercion or buffer error.
    pub fn deserialize(
        &self,
        reader: &mut Reader,
        tag: Option<Tag>,
        _embedded: bool,
    ) -> Result<Value> {
        let tag = match tag {
            Some(tag) => tag,
            None => reader.read_tag()?,
        };
        match tag {
            Tag::Null if self.nullable => Ok(Value::Null),
            Tag::Null => Err(CodecError::NullNotAllowed {
                declared: self.declared_type(),
            }),
            Tag::Min if self.nullable => self.kind.min_value(),
            Tag::Max if self.nullable => self.kind.max_value(),
            _ if self.kind.accepts(tag) => match coerce(read_payload(reader, tag)?, self.kind)? {
                Value::Null if !self.nullable => Err(CodecError::NullNotAllowed {
                    declared: self.declared_type(),
                }),
                value => Ok(value),
            },
            _ => Err(CodecError::UnsupportedTag {
                tag,
                declared: self.declared_type(),
            }),
        }
    }
}

/// Writes the payload of a scalar `value` for `tag`.
///
/// `tag` only decides between fixed-width and variable-length integers; the
/// value must already be of the kind the tag stands for.
pub fn write_payload(writer: &mut Writer, tag: Tag, value: &Value) -> Result<()> {
    let varint = tag.is_variable_length();
    match value {
        Value::Bool(v) => writer.write_bit(*v),
        Value::Byte(v) => writer.write_u8(*v),
        Value::SByte(v) => writer.write_i8(*v),
        Value::Int16(v) if varint => writer.write_variable_length_int(*v as i64),
        Value::Int16(v) => writer.write_i16(*v),
        Value::UInt16(v) if varint => writer.write_variable_length_uint(*v as u64),
        Value::UInt16(v) => writer.write_u16(*v),
        Value::Int32(v) if varint => writer.write_variable_length_int(*v as i64),
        Value::Int32(v) => writer.write_i32(*v),
        Value::UInt32(v) if varint => writer.write_variable_length_uint(*v as u64),
        Value::UInt32(v) => writer.write_u32(*v),
        Value::Int64(v) if varint => writer.write_variable_length_int(*v),
        Value::Int64(v) => writer.write_i64(*v),
        Value::UInt64(v) if varint => writer.write_variable_length_uint(*v),
        Value::UInt64(v) => writer.write_u64(*v),
        Value::Single(v) => writer.write_f32(*v),
        Value::Double(v) => writer.write_f64(*v),
        Value::Decimal(v) => writer.write_decimal(v),
        Value::DateTime(v) => {
            writer.write_bits(v.kind.bits() as u64, 2);
            writer.write_i64(v.ticks()?);
        }
        Value::DateTimeOffset(v) => {
            let (clock, offset) = offset_to_ticks(v)?;
            writer.write_i64(clock);
            writer.write_i64(offset);
        }
        Value::TimeSpan(v) => writer.write_i64(duration_to_ticks(v)?),
        Value::Char(v) => writer.write_char(*v),
        Value::String(v) | Value::Enum(v) => writer.write_string(Some(v)),
        Value::CaseInsensitive(v) => writer.write_string(Some(v.as_str())),
        Value::Bytes(v) => writer.write_byte_array(Some(v)),
        Value::Guid(v) => writer.write_guid(v),
        Value::Null | Value::Min | Value::Max | Value::Object(_) | Value::Array(_) => {
            return Err(CodecError::Encode(format!(
                "{} has no scalar payload",
                value.type_name()
            )))
        }
    }
    Ok(())
}

fn narrow<T: TryFrom<i64>>(value: i64, to: &'static str) -> Result<T> {
    T::try_from(value).map_err(|_| CodecError::Overflow {
        value: value.to_string(),
        to,
    })
}

fn narrow_unsigned<T: TryFrom<u64>>(value: u64, to: &'static str) -> Result<T> {
    T::try_from(value).map_err(|_| CodecError::Overflow {
        value: value.to_string(),
        to,
    })
}

/// Reads the natural value of a scalar `tag` without any coercion.
///
/// # Errors
/// Returns `UnsupportedTag` for sentinel, object and array tags.
pub fn read_payload(reader: &mut Reader, tag: Tag) -> Result<Value> {
    Ok(match tag {
        Tag::Boolean => Value::Bool(reader.read_bit()?),
        Tag::Byte => Value::Byte(reader.read_u8()?),
        Tag::SByte => Value::SByte(reader.read_i8()?),
        Tag::Int16 => Value::Int16(reader.read_i16()?),
        Tag::UInt16 => Value::UInt16(reader.read_u16()?),
        Tag::Int32 => Value::Int32(reader.read_i32()?),
        Tag::UInt32 => Value::UInt32(reader.read_u32()?),
        Tag::Int64 => Value::Int64(reader.read_i64()?),
        Tag::UInt64 => Value::UInt64(reader.read_u64()?),
        Tag::VarInt16 => Value::Int16(narrow(reader.read_variable_length_int()?, "Int16")?),
        Tag::VarUInt16 => Value::UInt16(narrow_unsigned(
            reader.read_variable_length_uint()?,
            "UInt16",
        )?),
        Tag::VarInt32 => Value::Int32(narrow(reader.read_variable_length_int()?, "Int32")?),
        Tag::VarUInt32 => Value::UInt32(narrow_unsigned(
            reader.read_variable_length_uint()?,
            "UInt32",
        )?),
        Tag::VarInt64 => Value::Int64(reader.read_variable_length_int()?),
        Tag::VarUInt64 => Value::UInt64(reader.read_variable_length_uint()?),
        Tag::Decimal => Value::Decimal(reader.read_decimal()?),
        Tag::Double => Value::Double(reader.read_f64()?),
        Tag::Single => Value::Single(reader.read_f32()?),
        Tag::DateTime => {
            let kind = DateTimeKind::from_bits(reader.read_bits(2)? as u8)?;
            Value::DateTime(DateTimeValue::from_ticks(reader.read_i64()?, kind)?)
        }
        Tag::DateTimeOffset => {
            let clock = reader.read_i64()?;
            let offset = reader.read_i64()?;
            Value::DateTimeOffset(ticks_to_offset(clock, offset)?)
        }
        Tag::TimeSpan => Value::TimeSpan(ticks_to_duration(reader.read_i64()?)),
        Tag::Char => Value::Char(reader.read_char()?),
        Tag::String => reader.read_string()?.map_or(Value::Null, Value::String),
        Tag::CaseInsensitiveString => reader
            .read_string()?
            .map_or(Value::Null, |s| Value::CaseInsensitive(CiString::from(s))),
        Tag::EnumString => reader.read_string()?.map_or(Value::Null, Value::Enum),
        Tag::ByteArray => reader.read_byte_array()?.map_or(Value::Null, Value::Bytes),
        Tag::Guid => Value::Guid(reader.read_guid()?),
        Tag::Null | Tag::Min | Tag::Max | Tag::Object | Tag::Array => {
            return Err(CodecError::UnsupportedTag {
                tag,
                declared: "scalar",
            })
        }
    })
}

/// Skips a value of any type in the typewire binary format.
///
/// This is used for forward/backward compatibility when a record carries a
/// field the reading codec does not declare.
///
/// # Errors
/// Returns an error if the value cannot be skipped (e.g., insufficient data).
pub fn skip_value(reader: &mut Reader) -> Result<()> {
    skip_nested(reader, 0)
}

fn skip_nested(reader: &mut Reader, depth: usize) -> Result<()> {
    if depth > MAX_SKIP_DEPTH {
        return Err(CodecError::DepthExceeded(MAX_SKIP_DEPTH));
    }
    let tag = reader.read_tag()?;
    match tag {
        Tag::Null | Tag::Min | Tag::Max => Ok(()),
        Tag::Boolean => reader.read_bit().map(|_| ()),
        Tag::Byte | Tag::SByte => reader.skip_bytes(1),
        Tag::Int16 | Tag::UInt16 => reader.skip_bytes(2),
        Tag::Int32 | Tag::UInt32 | Tag::Single | Tag::Char => reader.skip_bytes(4),
        Tag::Int64 | Tag::UInt64 | Tag::Double | Tag::TimeSpan => reader.skip_bytes(8),
        Tag::VarInt16
        | Tag::VarUInt16
        | Tag::VarInt32
        | Tag::VarUInt32
        | Tag::VarInt64
        | Tag::VarUInt64 => reader.skip_variable_length_integer(),
        Tag::Decimal | Tag::Guid | Tag::DateTimeOffset => reader.skip_bytes(16),
        Tag::DateTime => {
            reader.read_bits(2)?;
            reader.skip_bytes(8)
        }
        Tag::String | Tag::CaseInsensitiveString | Tag::EnumString | Tag::ByteArray => {
            reader.skip_byte_array()
        }
        Tag::Object => {
            reader.skip_variable_length_integer()?; // type name
            reader.skip_variable_length_integer()?; // collection
            let count = reader.read_variable_length_uint()?;
            for _ in 0..count {
                reader.skip_variable_length_integer()?; // field name
                skip_nested(reader, depth + 1)?;
            }
            Ok(())
        }
        Tag::Array => {
            let count = reader.read_variable_length_uint()?;
            for _ in 0..count {
                skip_nested(reader, depth + 1)?;
            }
            Ok(())
        }
    }
}
