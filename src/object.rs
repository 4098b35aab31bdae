//! Object records: host record types, dynamic objects and their codecs.
//!
//! An object record on the wire is
//! `[Object tag][type-name code][collection-name code][field count]`
//! followed by that many field entries `[field-name code][tagged value]`.
//! The compiled and generic codecs write identical bytes and differ only in
//! what they decode into.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::SerializerContext;
use crate::core::{read_payload, skip_value, IntegerEncoding, ScalarCodec, Tag};
use crate::field::{FieldType, RecordType};
use crate::value::Value;
use crate::wire::{Mark, Reader, Writer};
use crate::{CodecError, Result};

/// A host type with a compiled object codec.
///
/// Normally implemented with `#[derive(Record)]`.
pub trait Record: Default + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Type name written (as a name code) in every record of this type.
    const TYPE_NAME: &'static str;
    /// Collection the record belongs to; `None` inherits the enclosing one.
    const COLLECTION: Option<&'static str> = None;

    fn fields() -> Vec<FieldAccessor<Self>>;
}

/// Name, declared type, getter and setter of one record field.
pub struct FieldAccessor<T> {
    pub name: &'static str,
    pub field_type: FieldType,
    pub get: fn(&T) -> Value,
    pub set: fn(&mut T, Value) -> Result<()>,
}

impl<T> fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .finish()
    }
}

/// Object-safe view of a [`Record`].
pub trait AnyRecord: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;
    fn collection(&self) -> Option<&'static str>;
    fn record_type(&self) -> RecordType;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn clone_record(&self) -> Box<dyn AnyRecord>;
    fn eq_record(&self, other: &dyn AnyRecord) -> bool;
    /// Current field values, in declaration order.
    fn field_values(&self) -> Vec<(&'static str, Value)>;
    fn get_field(&self, name: &str) -> Option<Value>;
}

impl<T: Record> AnyRecord for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn collection(&self) -> Option<&'static str> {
        T::COLLECTION
    }

    fn record_type(&self) -> RecordType {
        RecordType::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_record(&self) -> Box<dyn AnyRecord> {
        Box::new(self.clone())
    }

    fn eq_record(&self, other: &dyn AnyRecord) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn field_values(&self) -> Vec<(&'static str, Value)> {
        T::fields()
            .into_iter()
            .map(|field| (field.name, (field.get)(self)))
            .collect()
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        T::fields()
            .into_iter()
            .find(|field| field.name == name)
            .map(|field| (field.get)(self))
    }
}

/// An object decoded without a host type: a type name plus a name→value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicObject {
    pub type_name: String,
    pub collection: Option<String>,
    pub fields: IndexMap<String, Value>,
}

impl DynamicObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A decoded or to-be-encoded object: either a host record or a dynamic one.
#[derive(Debug)]
pub enum Object {
    Typed(Box<dyn AnyRecord>),
    Dynamic(DynamicObject),
}

impl Object {
    pub fn typed<T: Record>(record: T) -> Self {
        Object::Typed(Box::new(record))
    }

    pub fn type_name(&self) -> &str {
        match self {
            Object::Typed(record) => record.type_name(),
            Object::Dynamic(object) => &object.type_name,
        }
    }

    pub fn collection(&self) -> Option<&str> {
        match self {
            Object::Typed(record) => record.collection(),
            Object::Dynamic(object) => object.collection.as_deref(),
        }
    }

    pub fn is_typed(&self) -> bool {
        matches!(self, Object::Typed(_))
    }

    pub fn downcast_ref<T: Record>(&self) -> Option<&T> {
        match self {
            Object::Typed(record) => record.as_any().downcast_ref(),
            Object::Dynamic(_) => None,
        }
    }

    /// Value of the field `name`, if the object has one.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self {
            Object::Typed(record) => record.get_field(name),
            Object::Dynamic(object) => object.get(name).cloned(),
        }
    }

    pub fn to_dynamic(&self) -> DynamicObject {
        match self {
            Object::Typed(record) => DynamicObject {
                type_name: record.type_name().to_string(),
                collection: record.collection().map(str::to_string),
                fields: record
                    .field_values()
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect(),
            },
            Object::Dynamic(object) => object.clone(),
        }
    }

    /// Converts into the host record `T`.
    ///
    /// A dynamic object is converted field by field; fields `T` does not
    /// declare are dropped and fields it declares but the object lacks keep
    /// their default.
    ///
    /// # Errors
    /// `TypeMismatch` when the object is of another type, or any field
    /// conversion error.
    pub fn into_record<T: Record>(self) -> Result<T> {
        match self {
            Object::Typed(record) => {
                let actual = record.type_name();
                record
                    .into_any()
                    .downcast::<T>()
                    .map(|record| *record)
                    .map_err(|_| CodecError::TypeMismatch {
                        expected: T::TYPE_NAME,
                        actual: actual.to_string(),
                    })
            }
            Object::Dynamic(mut object) => {
                if object.type_name != T::TYPE_NAME {
                    return Err(CodecError::TypeMismatch {
                        expected: T::TYPE_NAME,
                        actual: object.type_name,
                    });
                }
                let mut record = T::default();
                for field in T::fields() {
                    if let Some(value) = object.fields.swap_remove(field.name) {
                        (field.set)(&mut record, value)?;
                    }
                }
                Ok(record)
            }
        }
    }
}

impl Clone for Object {
    fn clone(&self) -> Self {
        match self {
            Object::Typed(record) => Object::Typed(record.clone_record()),
            Object::Dynamic(object) => Object::Dynamic(object.clone()),
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Typed(a), Object::Typed(b)) => a.eq_record(b.as_ref()),
            (Object::Dynamic(a), Object::Dynamic(b)) => a == b,
            _ => {
                let (a, b) = (self.to_dynamic(), other.to_dynamic());
                a.type_name == b.type_name && a.fields == b.fields
            }
        }
    }
}

impl<T: Record> From<T> for Object {
    fn from(record: T) -> Self {
        Object::typed(record)
    }
}

/// Per-call codec state: the context, the enclosing collection and depth.
pub struct CodecState<'a> {
    pub(crate) ctx: &'a SerializerContext,
    pub(crate) collection: Arc<str>,
    depth: usize,
}

impl<'a> CodecState<'a> {
    pub fn new(ctx: &'a SerializerContext) -> Self {
        Self {
            ctx,
            collection: ctx.options().default_collection.clone(),
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    fn nested(&self, collection: Arc<str>) -> Result<CodecState<'a>> {
        let max = self.ctx.options().max_depth;
        if self.depth >= max {
            return Err(CodecError::DepthExceeded(max));
        }
        Ok(CodecState {
            ctx: self.ctx,
            collection,
            depth: self.depth + 1,
        })
    }

    fn integers(&self) -> IntegerEncoding {
        self.ctx.options().integer_encoding
    }
}

/// Writes the tag, type-name code and collection-name code of a record and
/// returns the collection its fields belong to.
fn write_header(
    writer: &mut Writer,
    write_tag: bool,
    embedded: bool,
    type_name: &str,
    collection: Option<&str>,
    state: &CodecState<'_>,
) -> Arc<str> {
    let names = state.ctx.names();
    let collection: Arc<str> = match collection {
        Some(collection) => Arc::from(collection),
        None => state.collection.clone(),
    };
    if write_tag {
        writer.write_tag(Tag::Object);
    }
    writer.write_variable_length_uint(names.code_for(&collection, type_name) as u64);
    if embedded && collection == state.collection {
        writer.write_variable_length_uint(0);
    } else {
        writer.write_variable_length_uint(names.code_for("", &collection) as u64);
    }
    collection
}

fn read_code(reader: &mut Reader) -> Result<u32> {
    let code = reader.read_variable_length_uint()?;
    u32::try_from(code).map_err(|_| CodecError::Decode(format!("Name code {} out of range", code)))
}

fn read_field_code(reader: &mut Reader) -> Result<u32> {
    match read_code(reader)? {
        0 => Err(CodecError::Decode("Field entry without a name".into())),
        code => Ok(code),
    }
}

/// Number of field entries following a record header.
fn read_field_count(reader: &mut Reader) -> Result<u64> {
    let count = reader.read_variable_length_uint()?;
    // every entry starts with at least one code byte
    if count > reader.remaining() as u64 {
        return Err(CodecError::InsufficientData);
    }
    Ok(count)
}

/// Type and collection of a record, read from its header.
#[derive(Debug, Clone)]
pub(crate) struct ObjectHeader {
    pub type_name: Arc<str>,
    pub collection: Arc<str>,
}

pub(crate) fn read_header(
    reader: &mut Reader,
    tag: Option<Tag>,
    state: &CodecState<'_>,
) -> Result<ObjectHeader> {
    let tag = match tag {
        Some(tag) => tag,
        None => reader.read_tag()?,
    };
    if tag != Tag::Object {
        return Err(CodecError::UnsupportedTag {
            tag,
            declared: "Object",
        });
    }
    let type_code = read_code(reader)?;
    let collection_code = read_code(reader)?;
    if type_code == 0 {
        return Err(CodecError::Decode("Object record without a type name".into()));
    }
    let names = state.ctx.names();
    let collection = match collection_code {
        0 => state.collection.clone(),
        code => names.name_for(code)?.name,
    };
    let type_name = names.name_for(type_code)?.name;
    Ok(ObjectHeader {
        type_name,
        collection,
    })
}

/// Reads a record header after its tag, picks the codec for the stored type
/// and rewinds to `mark` so the codec can run its full decode.
pub(crate) fn peek_codec(
    reader: &mut Reader,
    mark: Mark,
    state: &CodecState<'_>,
) -> Result<Arc<ObjectCodec>> {
    let header = read_header(reader, Some(Tag::Object), state)?;
    let codec = state.ctx.codec_for_type_name(&header.type_name);
    reader.reset(mark);
    Ok(codec)
}

type Getter = Box<dyn Fn(&dyn AnyRecord) -> Result<Value> + Send + Sync>;
type Setter = Box<dyn Fn(&mut dyn AnyRecord, Value) -> Result<()> + Send + Sync>;

struct CompiledField {
    name: &'static str,
    field_type: FieldType,
    get: Getter,
    set: Setter,
}

fn construct<T: Record>() -> Box<dyn AnyRecord> {
    Box::new(T::default())
}

/// Codec for one host record type, with its field accessors resolved once.
pub struct CompiledCodec {
    record: RecordType,
    fields: Vec<CompiledField>,
    index: HashMap<&'static str, usize>,
    construct: fn() -> Box<dyn AnyRecord>,
}

impl fmt::Debug for CompiledCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledCodec")
            .field("type_name", &self.record.name)
            .field(
                "fields",
                &self.fields.iter().map(|field| field.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl CompiledCodec {
    pub fn of<T: Record>(integers: IntegerEncoding) -> Self {
        let fields: Vec<CompiledField> = T::fields()
            .into_iter()
            .map(|accessor| {
                let (get, set) = (accessor.get, accessor.set);
                CompiledField {
                    name: accessor.name,
                    field_type: accessor.field_type.with_integer_encoding(integers),
                    get: Box::new(move |record: &dyn AnyRecord| {
                        record.as_any().downcast_ref::<T>().map(get).ok_or_else(|| {
                            CodecError::TypeMismatch {
                                expected: T::TYPE_NAME,
                                actual: record.type_name().to_string(),
                            }
                        })
                    }),
                    set: Box::new(move |record: &mut dyn AnyRecord, value| {
                        match record.as_any_mut().downcast_mut::<T>() {
                            Some(record) => set(record, value),
                            None => Err(CodecError::TypeMismatch {
                                expected: T::TYPE_NAME,
                                actual: "another record".to_string(),
                            }),
                        }
                    }),
                }
            })
            .collect();
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, field)| (field.name, i))
            .collect();
        tracing::debug!(type_name = T::TYPE_NAME, fields = fields.len(), "compiled record codec");
        Self {
            record: RecordType::of::<T>(),
            fields,
            index,
            construct: construct::<T>,
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.record
    }

    /// Declared types of nested records, for eager registration.
    pub(crate) fn nested_record_types(&self) -> impl Iterator<Item = RecordType> + '_ {
        self.fields.iter().filter_map(|field| field.field_type.record_type())
    }

    fn serialize(
        &self,
        writer: &mut Writer,
        write_tag: bool,
        embedded: bool,
        object: &Object,
        state: &mut CodecState<'_>,
    ) -> Result<()> {
        let record = match object {
            Object::Typed(record) if record.as_any().type_id() == self.record.type_id => record,
            other => return GenericCodec.serialize(writer, write_tag, embedded, other, state),
        };
        let collection = write_header(
            writer,
            write_tag,
            embedded,
            self.record.name,
            self.record.collection,
            state,
        );
        let mut nested = state.nested(collection)?;
        writer.write_variable_length_uint(self.fields.len() as u64);
        for field in &self.fields {
            let value = (field.get)(record.as_ref())?;
            let code = nested.ctx.names().code_for(&nested.collection, field.name);
            writer.write_variable_length_uint(code as u64);
            encode_field(writer, &field.field_type, &value, &mut nested)?;
        }
        Ok(())
    }

    fn deserialize(
        &self,
        reader: &mut Reader,
        tag: Option<Tag>,
        state: &mut CodecState<'_>,
    ) -> Result<Object> {
        let header = read_header(reader, tag, state)?;
        if &*header.type_name != self.record.name {
            // a record of another host type is never read as this one
            if state.ctx.is_registered(&header.type_name) {
                return Err(CodecError::TypeMismatch {
                    expected: self.record.name,
                    actual: header.type_name.to_string(),
                });
            }
            tracing::debug!(
                stored = &*header.type_name,
                declared = self.record.name,
                "decoding record into a differently named type"
            );
        }
        let mut record = (self.construct)();
        let mut nested = state.nested(header.collection)?;
        for _ in 0..read_field_count(reader)? {
            let entry = state.ctx.names().name_for(read_field_code(reader)?)?;
            match self.index.get(&*entry.name) {
                Some(&i) => {
                    let field = &self.fields[i];
                    let value = decode_field(reader, &field.field_type, &mut nested)?;
                    (field.set)(record.as_mut(), value)?;
                }
                None => {
                    tracing::trace!(
                        type_name = self.record.name,
                        field = &*entry.name,
                        "skipping undeclared field"
                    );
                    skip_value(reader)?;
                }
            }
        }
        Ok(Object::Typed(record))
    }

    fn try_get_field_value(&self, name: &str, object: &Object) -> Option<Value> {
        match object {
            Object::Typed(record) if record.as_any().type_id() == self.record.type_id => {
                let field = &self.fields[*self.index.get(name)?];
                (field.get)(record.as_ref()).ok()
            }
            other => other.get(name),
        }
    }
}

/// Codec for objects without a compiled codec; decodes into [`DynamicObject`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericCodec;

impl GenericCodec {
    fn serialize(
        &self,
        writer: &mut Writer,
        write_tag: bool,
        embedded: bool,
        object: &Object,
        state: &mut CodecState<'_>,
    ) -> Result<()> {
        let collection = write_header(
            writer,
            write_tag,
            embedded,
            object.type_name(),
            object.collection(),
            state,
        );
        let mut nested = state.nested(collection)?;
        match object {
            Object::Typed(record) => {
                let fields = record.field_values();
                writer.write_variable_length_uint(fields.len() as u64);
                for (name, value) in &fields {
                    write_entry(writer, name, value, &mut nested)?;
                }
            }
            Object::Dynamic(object) => {
                writer.write_variable_length_uint(object.fields.len() as u64);
                for (name, value) in &object.fields {
                    write_entry(writer, name, value, &mut nested)?;
                }
            }
        }
        Ok(())
    }

    fn deserialize(
        &self,
        reader: &mut Reader,
        tag: Option<Tag>,
        state: &mut CodecState<'_>,
    ) -> Result<Object> {
        let header = read_header(reader, tag, state)?;
        let mut object = DynamicObject::new(&*header.type_name);
        if header.collection != state.collection {
            object.collection = Some(header.collection.to_string());
        }
        let mut nested = state.nested(header.collection)?;
        for _ in 0..read_field_count(reader)? {
            let entry = state.ctx.names().name_for(read_field_code(reader)?)?;
            let value = decode_value(reader, &mut nested)?;
            object.fields.insert(entry.name.to_string(), value);
        }
        Ok(Object::Dynamic(object))
    }
}

fn write_entry(
    writer: &mut Writer,
    name: &str,
    value: &Value,
    state: &mut CodecState<'_>,
) -> Result<()> {
    let code = state.ctx.names().code_for(&state.collection, name);
    writer.write_variable_length_uint(code as u64);
    encode_value(writer, value, state)
}

/// The two interchangeable object codecs.
#[derive(Debug)]
pub enum ObjectCodec {
    Compiled(CompiledCodec),
    Generic(GenericCodec),
}

impl ObjectCodec {
    pub fn is_compiled(&self) -> bool {
        matches!(self, ObjectCodec::Compiled(_))
    }

    /// Writes `object` as a record.
    ///
    /// An `embedded` record whose collection equals the enclosing one writes
    /// collection code 0.
    pub fn serialize(
        &self,
        writer: &mut Writer,
        write_tag: bool,
        embedded: bool,
        object: &Object,
        state: &mut CodecState<'_>,
    ) -> Result<()> {
        match self {
            ObjectCodec::Compiled(codec) => {
                codec.serialize(writer, write_tag, embedded, object, state)
            }
            ObjectCodec::Generic(codec) => {
                codec.serialize(writer, write_tag, embedded, object, state)
            }
        }
    }

    /// Reads one record, reading the tag first when `tag` is `None`.
    ///
    /// `embedded` makes no difference when reading; a zero collection code
    /// always inherits the enclosing collection.
    pub fn deserialize(
        &self,
        reader: &mut Reader,
        tag: Option<Tag>,
        _embedded: bool,
        state: &mut CodecState<'_>,
    ) -> Result<Object> {
        match self {
            ObjectCodec::Compiled(codec) => codec.deserialize(reader, tag, state),
            ObjectCodec::Generic(codec) => codec.deserialize(reader, tag, state),
        }
    }

    pub fn try_get_field_value(&self, name: &str, object: &Object) -> Option<Value> {
        match self {
            ObjectCodec::Compiled(codec) => codec.try_get_field_value(name, object),
            ObjectCodec::Generic(_) => object.get(name),
        }
    }
}

fn null_or(writer: &mut Writer, nullable: bool, declared: &'static str) -> Result<()> {
    if !nullable {
        return Err(CodecError::NullNotAllowed { declared });
    }
    writer.write_tag(Tag::Null);
    Ok(())
}

fn mismatch(field_type: &FieldType, value: &Value) -> CodecError {
    CodecError::TypeMismatch {
        expected: field_type.declared_type(),
        actual: value.type_name().to_string(),
    }
}

/// Writes one field value according to its declared type.
pub(crate) fn encode_field(
    writer: &mut Writer,
    field_type: &FieldType,
    value: &Value,
    state: &mut CodecState<'_>,
) -> Result<()> {
    match field_type {
        FieldType::Scalar(codec) => codec.serialize(writer, true, true, value),
        FieldType::Record { ty, nullable } => match value {
            Value::Null => null_or(writer, *nullable, ty.name),
            Value::Object(object) => {
                let codec = state.ctx.codec_for_object(object);
                codec.serialize(writer, true, true, object, state)
            }
            other => Err(mismatch(field_type, other)),
        },
        FieldType::Array { element, nullable } => match value {
            Value::Null => null_or(writer, *nullable, "Array"),
            Value::Array(items) => {
                writer.write_tag(Tag::Array);
                writer.write_variable_length_uint(items.len() as u64);
                let mut nested = state.nested(state.collection.clone())?;
                for item in items {
                    encode_field(writer, element, item, &mut nested)?;
                }
                Ok(())
            }
            other => Err(mismatch(field_type, other)),
        },
        FieldType::Dynamic => encode_value(writer, value, state),
    }
}

/// Writes any value under the tag of its own kind.
pub(crate) fn encode_value(
    writer: &mut Writer,
    value: &Value,
    state: &mut CodecState<'_>,
) -> Result<()> {
    match value {
        Value::Null => writer.write_tag(Tag::Null),
        Value::Min => writer.write_tag(Tag::Min),
        Value::Max => writer.write_tag(Tag::Max),
        Value::Object(object) => {
            let codec = state.ctx.codec_for_object(object);
            return codec.serialize(writer, true, true, object, state);
        }
        Value::Array(items) => {
            writer.write_tag(Tag::Array);
            writer.write_variable_length_uint(items.len() as u64);
            let mut nested = state.nested(state.collection.clone())?;
            for item in items {
                encode_value(writer, item, &mut nested)?;
            }
        }
        scalar => {
            let kind = scalar.kind().ok_or_else(|| {
                CodecError::Encode(format!("{} has no scalar kind", scalar.type_name()))
            })?;
            return ScalarCodec::new(kind, true)
                .with_integer_encoding(state.integers())
                .serialize(writer, true, true, scalar);
        }
    }
    Ok(())
}

fn read_count(reader: &mut Reader) -> Result<usize> {
    let count = reader.read_variable_length_uint()?;
    usize::try_from(count)
        .map_err(|_| CodecError::Decode(format!("Array length {} too large", count)))
}

/// Reads one field value according to its declared type.
pub(crate) fn decode_field(
    reader: &mut Reader,
    field_type: &FieldType,
    state: &mut CodecState<'_>,
) -> Result<Value> {
    match field_type {
        FieldType::Scalar(codec) => codec.deserialize(reader, None, true),
        FieldType::Record { ty, nullable } => match reader.read_tag()? {
            Tag::Null if *nullable => Ok(Value::Null),
            Tag::Null => Err(CodecError::NullNotAllowed { declared: ty.name }),
            Tag::Object => {
                let codec = state.ctx.codec_for_record_type(ty);
                codec
                    .deserialize(reader, Some(Tag::Object), true, state)
                    .map(Value::Object)
            }
            tag => Err(CodecError::UnsupportedTag {
                tag,
                declared: ty.name,
            }),
        },
        FieldType::Array { element, nullable } => match reader.read_tag()? {
            Tag::Null if *nullable => Ok(Value::Null),
            Tag::Null => Err(CodecError::NullNotAllowed { declared: "Array" }),
            Tag::Array => {
                let count = read_count(reader)?;
                let mut nested = state.nested(state.collection.clone())?;
                let mut items = Vec::with_capacity(count.min(reader.remaining()));
                for _ in 0..count {
                    items.push(decode_field(reader, element, &mut nested)?);
                }
                Ok(Value::Array(items))
            }
            tag => Err(CodecError::UnsupportedTag {
                tag,
                declared: "Array",
            }),
        },
        FieldType::Dynamic => decode_value(reader, state),
    }
}

/// Reads any value in the shape its tag names.
///
/// Objects are decoded by the codec of their stored type: the header is
/// peeked, the reader rewound, then the selected codec decodes the record.
pub(crate) fn decode_value(reader: &mut Reader, state: &mut CodecState<'_>) -> Result<Value> {
    let mark = reader.mark();
    let tag = reader.read_tag()?;
    Ok(match tag {
        Tag::Null => Value::Null,
        Tag::Min => Value::Min,
        Tag::Max => Value::Max,
        Tag::Object => {
            let codec = peek_codec(reader, mark, state)?;
            Value::Object(codec.deserialize(reader, None, true, state)?)
        }
        Tag::Array => {
            let count = read_count(reader)?;
            let mut nested = state.nested(state.collection.clone())?;
            let mut items = Vec::with_capacity(count.min(reader.remaining()));
            for _ in 0..count {
                items.push(decode_value(reader, &mut nested)?);
            }
            Value::Array(items)
        }
        tag => read_payload(reader, tag)?,
    })
}

/// Reads a top-level or key-value object: peek the header, rewind, decode.
pub(crate) fn decode_object(reader: &mut Reader, state: &mut CodecState<'_>) -> Result<Object> {
    let mark = reader.mark();
    match reader.read_tag()? {
        Tag::Object => {
            let codec = peek_codec(reader, mark, state)?;
            codec.deserialize(reader, None, false, state)
        }
        Tag::Array => Err(CodecError::ArrayAtTopLevel),
        tag => Err(CodecError::UnsupportedTag {
            tag,
            declared: "Object",
        }),
    }
}
