//! Key-value pairs: a string key and a polymorphic value.
//!
//! Layout: `[presence bit]`, then for a present pair `[key string]` and the
//! tagged value. A missing pair is the single bit 0.

use crate::core::Tag;
use crate::object::{decode_value, encode_value, peek_codec, CodecState};
use crate::value::Value;
use crate::wire::{Reader, Writer};
use crate::{CodecError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValueCodec;

impl KeyValueCodec {
    /// Writes `pair`, or a single 0 bit for `None`.
    ///
    /// # Errors
    /// `ArrayAtTopLevel` when the value is an array.
    pub fn serialize(
        &self,
        writer: &mut Writer,
        pair: Option<&KeyValue>,
        state: &mut CodecState<'_>,
    ) -> Result<()> {
        let Some(pair) = pair else {
            writer.write_bit(false);
            return Ok(());
        };
        if let Value::Array(_) = pair.value {
            return Err(CodecError::ArrayAtTopLevel);
        }
        writer.write_bit(true);
        writer.write_string(Some(&pair.key));
        encode_value(writer, &pair.value, state)
    }

    /// Reads a pair written by [`KeyValueCodec::serialize`].
    ///
    /// An object value is decoded by the codec of its stored type, found by
    /// reading the record header and rewinding to the tag.
    pub fn deserialize(
        &self,
        reader: &mut Reader,
        state: &mut CodecState<'_>,
    ) -> Result<Option<KeyValue>> {
        if !reader.read_bit()? {
            return Ok(None);
        }
        let key = reader
            .read_string()?
            .ok_or_else(|| CodecError::Decode("Key-value pair without a key".into()))?;
        let mark = reader.mark();
        let value = match reader.read_tag()? {
            Tag::Array => return Err(CodecError::ArrayAtTopLevel),
            Tag::Object => {
                let codec = peek_codec(reader, mark, state)?;
                Value::Object(codec.deserialize(reader, None, true, state)?)
            }
            _ => {
                reader.reset(mark);
                decode_value(reader, state)?
            }
        };
        Ok(Some(KeyValue { key, value }))
    }
}
