//! # typewire
//!
//! A compact, bit-packed, type-tagged binary object codec with schema-drift
//! tolerant decoding, for use underneath an embedded object store.
//!
//! - Every value is a 6-bit wire tag followed by its payload; booleans take
//!   one bit and tags share bytes with them.
//! - Integers of 16 bits and wider use variable-length tags by default.
//! - Scalar codecs decode any tag a sibling type could have written and
//!   coerce it into the declared type, so field types may change between
//!   the writer and the reader.
//! - Type, collection and field names are written as small codes issued by
//!   a shared [`NameRegistry`].
//! - Records without a registered host type decode into [`DynamicObject`]s.
//!
//! ## Attribute Macros
//!
//! `#[derive(Record)]` implements [`Record`] and [`FieldValue`] for a struct
//! with named fields. `#[derive(WireEnum)]` implements [`FieldValue`] for a
//! fieldless enum, stored by variant name.
//!
//! - `#[typewire(name = "Name")]`: Type name written to the wire (defaults to the struct name).
//! - `#[typewire(collection = "name")]`: Collection the record belongs to;
//!   omitted, it inherits the enclosing collection.
//! - `#[typewire(rename = "name")]`: Field or variant name written to the wire.
//! - `#[typewire(skip)]`: The field is neither written nor read and keeps its default.
//!
//! ## Example
//! ```rust
//! use typewire::{Record, SerializerContext};
//!
//! #[derive(Record, Debug, Clone, Default, PartialEq)]
//! #[typewire(collection = "people")]
//! struct Person {
//!     name: String,
//!     age: Option<u16>,
//! }
//!
//! let ctx = SerializerContext::default();
//! let person = Person { name: "Ada".into(), age: Some(36) };
//! let bytes = ctx.serialize(&person).unwrap();
//! assert_eq!(ctx.deserialize::<Person>(bytes).unwrap(), person);
//! ```

extern crate self as typewire;

pub mod coerce;
pub mod context;
pub mod core;
pub mod field;
pub mod object;
pub mod pair;
pub mod registry;
pub mod time;
pub mod value;
pub mod wire;

pub use crate::context::{SerializerContext, SerializerOptions};
pub use crate::core::{IntegerEncoding, ScalarCodec, ScalarKind, Tag, TAG_BITS, WIRE_VERSION};
pub use crate::field::{FieldType, FieldValue, RecordType};
pub use crate::object::{
    AnyRecord, CodecState, CompiledCodec, DynamicObject, FieldAccessor, GenericCodec, Object,
    ObjectCodec, Record,
};
pub use crate::pair::{KeyValue, KeyValueCodec};
pub use crate::registry::{MemoryNameStore, NameEntry, NameRegistry, NameStore};
pub use crate::value::{CiString, DateTimeKind, DateTimeValue, Value};
pub use crate::wire::{Mark, Primitive, Reader, Writer};
pub use typewire_derive::{Record, WireEnum};

/// Errors that can occur during encoding or decoding operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),
    /// The bytes could not be decoded (corrupt or inconsistent data).
    #[error("Decode error: {0}")]
    Decode(String),
    /// The buffer did not contain enough data to complete the operation.
    #[error("Insufficient data in buffer")]
    InsufficientData,
    /// A 6-bit code outside the tag table.
    #[error("Unknown wire tag: {0}")]
    UnknownTag(u8),
    /// A codec met a tag it cannot decode into its declared type.
    #[error("Tag {tag:?} cannot be decoded as {declared}")]
    UnsupportedTag { tag: Tag, declared: &'static str },
    #[error("Null is not allowed for non-nullable {declared}")]
    NullNotAllowed { declared: &'static str },
    #[error("Range sentinels are not allowed for non-nullable {declared}")]
    SentinelNotAllowed { declared: &'static str },
    #[error("Cannot convert {from} to {to}")]
    Coercion {
        from: &'static str,
        to: &'static str,
    },
    #[error("Value {value} does not fit in {to}")]
    Overflow { value: String, to: &'static str },
    #[error("Cannot parse {text:?} as {to}")]
    Parse { text: String, to: &'static str },
    /// Arrays are only valid as object fields.
    #[error("Arrays cannot be written or read as a top-level value")]
    ArrayAtTopLevel,
    /// A name code this process has not seen; see `NameRegistry::resolve`.
    #[error("Unknown name code: {0}")]
    UnknownNameCode(u32),
    #[error("Name code {code} conflicts with {scope}/{name}")]
    NameConflict {
        code: u32,
        scope: String,
        name: String,
    },
    #[error("Unknown variant {name:?} for enum {enum_name}")]
    UnknownVariant {
        enum_name: &'static str,
        name: String,
    },
    #[error("Expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },
    #[error("Nesting deeper than {0} levels")]
    DepthExceeded(usize),
    /// The name store failed.
    #[error("Name store error: {0}")]
    Store(String),
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, CodecError>;
