//! Bit and byte cursors over the typewire buffer.
//!
//! Single bits (booleans, tags, date-time kinds) are packed LSB-first into a
//! pending byte. Every byte-aligned write flushes that byte first, and every
//! byte-aligned read discards whatever is left of the current bit byte, so
//! the writer and the reader stay in lock-step without extra framing.

use bytes::{BufMut, Bytes, BytesMut};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core::{Tag, TAG_BITS};
use crate::{CodecError, Result};

/// Longest encoding of a 64-bit variable-length integer.
const MAX_VARINT_LEN: usize = 10;

/// Highest scale a `rust_decimal::Decimal` can carry.
const MAX_DECIMAL_SCALE: u32 = 28;

/// Accumulates bits and bytes for one serialize call.
///
/// A writer is owned by exactly one logical write operation. Reuse it for a
/// following call on the same thread with [`Writer::restart`].
#[derive(Debug, Default)]
pub struct Writer {
    buf: BytesMut,
    pending: u8,
    pending_bits: u8,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            pending: 0,
            pending_bits: 0,
        }
    }

    /// Writes any [`Primitive`] value.
    #[inline]
    pub fn write<T: Primitive>(&mut self, value: T) {
        value.write_to(self);
    }

    /// ORs one bit into the pending byte, emitting it once eight bits are held.
    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.pending |= 1 << self.pending_bits;
        }
        self.pending_bits += 1;
        if self.pending_bits == 8 {
            self.buf.put_u8(self.pending);
            self.pending = 0;
            self.pending_bits = 0;
        }
    }

    /// Writes the low `count` bits of `value`, least significant first.
    pub fn write_bits(&mut self, value: u64, count: u8) {
        debug_assert!(count <= 64);
        for i in 0..count {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    /// Emits a partially filled bit byte, zero-padded.
    pub fn flush_bits(&mut self) {
        if self.pending_bits > 0 {
            self.buf.put_u8(self.pending);
            self.pending = 0;
            self.pending_bits = 0;
        }
    }

    pub fn write_tag(&mut self, tag: Tag) {
        self.write_bits(tag.code() as u64, TAG_BITS);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.flush_bits();
        self.buf.put_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.flush_bits();
        self.buf.put_i8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.flush_bits();
        self.buf.put_u16_le(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.flush_bits();
        self.buf.put_i16_le(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.flush_bits();
        self.buf.put_u32_le(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.flush_bits();
        self.buf.put_i32_le(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.flush_bits();
        self.buf.put_u64_le(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.flush_bits();
        self.buf.put_i64_le(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.flush_bits();
        self.buf.put_f32_le(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.flush_bits();
        self.buf.put_f64_le(value);
    }

    /// Writes a `char` as its 4-byte Unicode scalar value.
    pub fn write_char(&mut self, value: char) {
        self.write_u32(value as u32);
    }

    /// Writes a decimal as four little-endian 32-bit groups: lo, mid, hi, flags.
    pub fn write_decimal(&mut self, value: &Decimal) {
        // rust_decimal serializes as flags, lo, mid, hi
        let bytes = value.serialize();
        self.write_raw(&bytes[4..16]);
        self.write_raw(&bytes[0..4]);
    }

    pub fn write_guid(&mut self, value: &Uuid) {
        self.write_raw(value.as_bytes());
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.flush_bits();
        self.buf.put_slice(bytes);
    }

    /// Little-endian base-128 encoding with the high bit as continuation flag.
    pub fn write_variable_length_uint(&mut self, mut value: u64) {
        self.flush_bits();
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.put_u8(byte);
                return;
            }
            self.buf.put_u8(byte | 0x80);
        }
    }

    /// Zigzag-maps `value` so small magnitudes of either sign stay short.
    pub fn write_variable_length_int(&mut self, value: i64) {
        self.write_variable_length_uint(((value << 1) ^ (value >> 63)) as u64);
    }

    /// Writes `len + 1` followed by the UTF-8 bytes; a null string is a lone `0`.
    pub fn write_string(&mut self, value: Option<&str>) {
        self.write_byte_array(value.map(str::as_bytes));
    }

    pub fn write_byte_array(&mut self, value: Option<&[u8]>) {
        match value {
            None => self.write_variable_length_uint(0),
            Some(bytes) => {
                self.write_variable_length_uint(bytes.len() as u64 + 1);
                self.write_raw(bytes);
            }
        }
    }

    /// Clears the buffer so the writer can serve the next sequential call.
    pub fn restart(&mut self) {
        self.buf.clear();
        self.pending = 0;
        self.pending_bits = 0;
    }

    /// Returns exactly the bytes written so far, padding a pending bit byte.
    pub fn get_serialization(&self) -> Bytes {
        if self.pending_bits == 0 {
            return Bytes::copy_from_slice(&self.buf);
        }
        let mut out = BytesMut::with_capacity(self.buf.len() + 1);
        out.extend_from_slice(&self.buf);
        out.put_u8(self.pending);
        out.freeze()
    }

    /// Consumes the writer and hands its buffer over without copying.
    pub fn finish(mut self) -> Bytes {
        self.flush_bits();
        self.buf.freeze()
    }

    pub fn len(&self) -> usize {
        self.buf.len() + usize::from(self.pending_bits > 0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bits_written(&self) -> usize {
        self.buf.len() * 8 + self.pending_bits as usize
    }
}

/// A saved reader position, see [`Reader::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pos: usize,
    current: u8,
    bits_left: u8,
}

/// Cursor over one serialized buffer.
///
/// The reader is seekable: [`Reader::mark`] and [`Reader::reset`] make the
/// peek-then-rewind decoding of polymorphic objects a cheap operation.
#[derive(Debug, Clone)]
pub struct Reader {
    buf: Bytes,
    pos: usize,
    current: u8,
    bits_left: u8,
}

impl Reader {
    pub fn new(buf: Bytes) -> Self {
        Self {
            buf,
            pos: 0,
            current: 0,
            bits_left: 0,
        }
    }

    /// Reads any [`Primitive`] value.
    #[inline]
    pub fn read<T: Primitive>(&mut self) -> Result<T> {
        T::read_from(self)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        if self.bits_left == 0 {
            let byte = *self.buf.get(self.pos).ok_or(CodecError::InsufficientData)?;
            self.pos += 1;
            self.current = byte;
            self.bits_left = 8;
        }
        let bit = self.current & 1 == 1;
        self.current >>= 1;
        self.bits_left -= 1;
        Ok(bit)
    }

    pub fn read_bits(&mut self, count: u8) -> Result<u64> {
        debug_assert!(count <= 64);
        let mut value = 0u64;
        for i in 0..count {
            if self.read_bit()? {
                value |= 1 << i;
            }
        }
        Ok(value)
    }

    /// Reads a 6-bit tag code.
    ///
    /// # Errors
    /// Returns `UnknownTag` if the code is not part of the tag table.
    pub fn read_tag(&mut self) -> Result<Tag> {
        let code = self.read_bits(TAG_BITS)? as u8;
        Tag::from_code(code).ok_or(CodecError::UnknownTag(code))
    }

    /// Drops the unread remainder of the current bit byte.
    fn align(&mut self) {
        self.current = 0;
        self.bits_left = 0;
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        self.align();
        if self.remaining() < len {
            return Err(CodecError::InsufficientData);
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..start + len])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take_array::<1>()?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    pub fn read_char(&mut self) -> Result<char> {
        let scalar = self.read_u32()?;
        char::from_u32(scalar)
            .ok_or_else(|| CodecError::Decode(format!("Invalid char scalar value: {:#x}", scalar)))
    }

    pub fn read_decimal(&mut self) -> Result<Decimal> {
        let groups: [u8; 16] = self.take_array()?;
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&groups[12..16]);
        bytes[4..16].copy_from_slice(&groups[0..12]);
        let flags = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let scale = (flags >> 16) & 0xFF;
        if scale > MAX_DECIMAL_SCALE {
            return Err(CodecError::Decode(format!(
                "Decimal scale {} exceeds {}",
                scale, MAX_DECIMAL_SCALE
            )));
        }
        Ok(Decimal::deserialize(bytes))
    }

    pub fn read_guid(&mut self) -> Result<Uuid> {
        Ok(Uuid::from_bytes(self.take_array()?))
    }

    /// Returns the next `len` bytes as a zero-copy slice of the buffer.
    pub fn read_raw(&mut self, len: usize) -> Result<Bytes> {
        self.align();
        if self.remaining() < len {
            return Err(CodecError::InsufficientData);
        }
        let start = self.pos;
        self.pos += len;
        Ok(self.buf.slice(start..start + len))
    }

    pub fn read_variable_length_uint(&mut self) -> Result<u64> {
        self.align();
        let mut value = 0u64;
        let mut shift = 0u32;
        for _ in 0..MAX_VARINT_LEN {
            let byte = *self.buf.get(self.pos).ok_or(CodecError::InsufficientData)?;
            self.pos += 1;
            let payload = (byte & 0x7F) as u64;
            if shift == 63 && payload > 1 {
                return Err(CodecError::Decode(
                    "Variable-length integer overflows 64 bits".to_string(),
                ));
            }
            value |= payload << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
        Err(CodecError::Decode(format!(
            "Variable-length integer longer than {} bytes",
            MAX_VARINT_LEN
        )))
    }

    pub fn read_variable_length_int(&mut self) -> Result<i64> {
        let raw = self.read_variable_length_uint()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    /// Steps over a variable-length integer without materializing it.
    pub fn skip_variable_length_integer(&mut self) -> Result<()> {
        self.align();
        for _ in 0..MAX_VARINT_LEN {
            let byte = *self.buf.get(self.pos).ok_or(CodecError::InsufficientData)?;
            self.pos += 1;
            if byte & 0x80 == 0 {
                return Ok(());
            }
        }
        Err(CodecError::Decode(format!(
            "Variable-length integer longer than {} bytes",
            MAX_VARINT_LEN
        )))
    }

    /// Reads a `len + 1` length prefix; `None` stands for the null marker.
    fn read_length_prefix(&mut self) -> Result<Option<usize>> {
        match self.read_variable_length_uint()? {
            0 => Ok(None),
            n => usize::try_from(n - 1)
                .map(Some)
                .map_err(|_| CodecError::Decode(format!("Length prefix {} too large", n))),
        }
    }

    pub fn read_string(&mut self) -> Result<Option<String>> {
        let Some(len) = self.read_length_prefix()? else {
            return Ok(None);
        };
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(|s| Some(s.to_owned()))
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    pub fn read_byte_array(&mut self) -> Result<Option<Bytes>> {
        match self.read_length_prefix()? {
            None => Ok(None),
            Some(len) => self.read_raw(len).map(Some),
        }
    }

    /// Skips a length-prefixed string or byte array.
    pub fn skip_byte_array(&mut self) -> Result<()> {
        if let Some(len) = self.read_length_prefix()? {
            self.take(len)?;
        }
        Ok(())
    }

    pub fn skip_bytes(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            current: self.current,
            bits_left: self.bits_left,
        }
    }

    pub fn reset(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.current = mark.current;
        self.bits_left = mark.bits_left;
    }

    pub fn byte_position(&self) -> usize {
        self.pos
    }

    /// Whole bytes not yet touched by the cursor.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

/// A value with a fixed, untagged wire shape.
pub trait Primitive: Sized {
    fn write_to(self, writer: &mut Writer);
    fn read_from(reader: &mut Reader) -> Result<Self>;
}

macro_rules! impl_primitive {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl Primitive for $ty {
                #[inline]
                fn write_to(self, writer: &mut Writer) {
                    writer.$write(self)
                }

                #[inline]
                fn read_from(reader: &mut Reader) -> Result<Self> {
                    reader.$read()
                }
            }
        )*
    };
}

impl_primitive! {
    bool => write_bit, read_bit;
    u8 => write_u8, read_u8;
    i8 => write_i8, read_i8;
    u16 => write_u16, read_u16;
    i16 => write_i16, read_i16;
    u32 => write_u32, read_u32;
    i32 => write_i32, read_i32;
    u64 => write_u64, read_u64;
    i64 => write_i64, read_i64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
    char => write_char, read_char;
}

impl Primitive for Decimal {
    fn write_to(self, writer: &mut Writer) {
        writer.write_decimal(&self)
    }

    fn read_from(reader: &mut Reader) -> Result<Self> {
        reader.read_decimal()
    }
}

impl Primitive for Uuid {
    fn write_to(self, writer: &mut Writer) {
        writer.write_guid(&self)
    }

    fn read_from(reader: &mut Reader) -> Result<Self> {
        reader.read_guid()
    }
}
