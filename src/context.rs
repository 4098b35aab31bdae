//! The serializer context: options, name registry and codec cache.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::core::{IntegerEncoding, ScalarCodec, ScalarKind, Tag};
use crate::field::RecordType;
use crate::object::{
    decode_object, decode_value, encode_value, CodecState, GenericCodec, Object, ObjectCodec,
    Record,
};
use crate::pair::{KeyValue, KeyValueCodec};
use crate::registry::NameRegistry;
use crate::value::Value;
use crate::wire::{Reader, Writer};
use crate::{CodecError, Result};

/// Options fixed for the lifetime of a [`SerializerContext`].
#[derive(Debug, Clone)]
pub struct SerializerOptions {
    /// Tags used for integers of 16 bits and up.
    pub integer_encoding: IntegerEncoding,
    /// Collection of records that do not name one.
    pub default_collection: Arc<str>,
    /// Maximum nesting of objects and arrays.
    pub max_depth: usize,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            integer_encoding: IntegerEncoding::Variable,
            default_collection: Arc::from("default"),
            max_depth: 64,
        }
    }
}

impl SerializerOptions {
    pub fn with_integer_encoding(mut self, integer_encoding: IntegerEncoding) -> Self {
        self.integer_encoding = integer_encoding;
        self
    }

    pub fn with_default_collection(mut self, collection: &str) -> Self {
        self.default_collection = Arc::from(collection);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Hands out object codecs and owns the name registry they share.
///
/// Codecs are created on first use and cached for the life of the context.
/// The context is `Send + Sync`; share it by reference or `Arc`.
#[derive(Debug)]
pub struct SerializerContext {
    options: SerializerOptions,
    names: Arc<NameRegistry>,
    by_type: RwLock<HashMap<TypeId, Arc<ObjectCodec>>>,
    by_name: RwLock<HashMap<String, Arc<ObjectCodec>>>,
    generic: Arc<ObjectCodec>,
}

impl Default for SerializerContext {
    fn default() -> Self {
        Self::new(SerializerOptions::default())
    }
}

impl SerializerContext {
    pub fn new(options: SerializerOptions) -> Self {
        Self::with_names(options, Arc::new(NameRegistry::new()))
    }

    /// A context sharing an existing name registry.
    pub fn with_names(options: SerializerOptions, names: Arc<NameRegistry>) -> Self {
        Self {
            options,
            names,
            by_type: RwLock::new(HashMap::new()),
            by_name: RwLock::new(HashMap::new()),
            generic: Arc::new(ObjectCodec::Generic(GenericCodec)),
        }
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    pub fn names(&self) -> &NameRegistry {
        &self.names
    }

    pub fn name_registry(&self) -> Arc<NameRegistry> {
        self.names.clone()
    }

    /// Registers `T` and every record type reachable from its fields.
    pub fn register<T: Record>(&self) -> Arc<ObjectCodec> {
        self.codec_for::<T>()
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.by_name.read().contains_key(type_name)
    }

    pub fn codec_for<T: Record>(&self) -> Arc<ObjectCodec> {
        self.codec_for_record_type(&RecordType::of::<T>())
    }

    /// The compiled codec of `ty`, building and caching it on first use.
    pub fn codec_for_record_type(&self, ty: &RecordType) -> Arc<ObjectCodec> {
        if let Some(codec) = self.by_type.read().get(&ty.type_id) {
            return codec.clone();
        }
        let compiled = ty.build(self.options.integer_encoding);
        let nested: Vec<RecordType> = compiled.nested_record_types().collect();
        let codec = {
            let mut by_type = self.by_type.write();
            if let Some(codec) = by_type.get(&ty.type_id) {
                return codec.clone();
            }
            let codec = Arc::new(ObjectCodec::Compiled(compiled));
            by_type.insert(ty.type_id, codec.clone());
            self.by_name.write().insert(ty.name.to_string(), codec.clone());
            codec
        };
        for ty in &nested {
            self.codec_for_record_type(ty);
        }
        codec
    }

    /// The codec that writes `object`: compiled for host records, generic
    /// for dynamic objects.
    pub fn codec_for_object(&self, object: &Object) -> Arc<ObjectCodec> {
        match object {
            Object::Typed(record) => self.codec_for_record_type(&record.record_type()),
            Object::Dynamic(_) => self.generic.clone(),
        }
    }

    /// The codec for a stored type name: compiled if a host type with that
    /// name is registered, the shared generic codec otherwise.
    pub fn codec_for_type_name(&self, type_name: &str) -> Arc<ObjectCodec> {
        if let Some(codec) = self.by_name.read().get(type_name) {
            return codec.clone();
        }
        tracing::debug!(type_name, "no compiled codec registered, decoding generically");
        self.generic.clone()
    }

    pub fn serialize<T: Record>(&self, record: &T) -> Result<Bytes> {
        self.serialize_object(&Object::typed(record.clone()))
    }

    /// Decodes a record into `T`.
    ///
    /// A record stored under another name decodes into `T` unless that name
    /// belongs to a registered host type, which is a `TypeMismatch`.
    pub fn deserialize<T: Record>(&self, bytes: Bytes) -> Result<T> {
        let mut reader = Reader::new(bytes);
        let mut state = CodecState::new(self);
        self.codec_for::<T>()
            .deserialize(&mut reader, None, false, &mut state)?
            .into_record()
    }

    pub fn serialize_object(&self, object: &Object) -> Result<Bytes> {
        let mut writer = Writer::new();
        let mut state = CodecState::new(self);
        self.codec_for_object(object)
            .serialize(&mut writer, true, false, object, &mut state)?;
        Ok(writer.finish())
    }

    /// Decodes a record with the codec of its stored type.
    pub fn deserialize_object(&self, bytes: Bytes) -> Result<Object> {
        let mut reader = Reader::new(bytes);
        let mut state = CodecState::new(self);
        decode_object(&mut reader, &mut state)
    }

    /// Like [`SerializerContext::deserialize_object`], but resolves name
    /// codes this process has not seen through the registry's store and
    /// restarts the decode after each one.
    pub async fn deserialize_object_resolving(&self, bytes: Bytes) -> Result<Object> {
        loop {
            match self.deserialize_object(bytes.clone()) {
                Err(CodecError::UnknownNameCode(code)) => {
                    self.names.resolve(code).await?;
                }
                result => return result,
            }
        }
    }

    /// Writes a free-standing value.
    ///
    /// # Errors
    /// `ArrayAtTopLevel` for arrays.
    pub fn serialize_value(&self, value: &Value) -> Result<Bytes> {
        let mut writer = Writer::new();
        let mut state = CodecState::new(self);
        match value {
            Value::Array(_) => return Err(CodecError::ArrayAtTopLevel),
            Value::Object(object) => {
                self.codec_for_object(object)
                    .serialize(&mut writer, true, false, object, &mut state)?;
            }
            other => encode_value(&mut writer, other, &mut state)?,
        }
        Ok(writer.finish())
    }

    pub fn deserialize_value(&self, bytes: Bytes) -> Result<Value> {
        let mut reader = Reader::new(bytes);
        let mut state = CodecState::new(self);
        let mark = reader.mark();
        if reader.read_tag()? == Tag::Array {
            return Err(CodecError::ArrayAtTopLevel);
        }
        reader.reset(mark);
        decode_value(&mut reader, &mut state)
    }

    pub fn serialize_pair(&self, pair: Option<&KeyValue>) -> Result<Bytes> {
        let mut writer = Writer::new();
        let mut state = CodecState::new(self);
        KeyValueCodec.serialize(&mut writer, pair, &mut state)?;
        Ok(writer.finish())
    }

    pub fn deserialize_pair(&self, bytes: Bytes) -> Result<Option<KeyValue>> {
        let mut reader = Reader::new(bytes);
        let mut state = CodecState::new(self);
        KeyValueCodec.deserialize(&mut reader, &mut state)
    }

    /// Reads one field of `object` without encoding it.
    pub fn try_get_field_value(&self, name: &str, object: &Object) -> Option<Value> {
        self.codec_for_object(object).try_get_field_value(name, object)
    }

    /// Encodes an open range bound for `kind` through its nullable codec.
    ///
    /// # Errors
    /// `Encode` unless `bound` is [`Value::Min`] or [`Value::Max`].
    pub fn range_bound(&self, kind: ScalarKind, bound: &Value) -> Result<Bytes> {
        if !bound.is_sentinel() {
            return Err(CodecError::Encode(format!(
                "A range bound must be MIN or MAX, not {}",
                bound.type_name()
            )));
        }
        let mut writer = Writer::new();
        ScalarCodec::new(kind, true)
            .with_integer_encoding(self.options.integer_encoding)
            .serialize(&mut writer, true, false, bound)?;
        Ok(writer.finish())
    }
}
