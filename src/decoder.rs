// ABOUTME: MessagePack binary decoder: cursor, format classifier, scalar reads.
// ABOUTME: All multi-byte wire values are big-endian regardless of host order.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

use crate::error::{Error, Result};
use crate::types::{format, limits};

/// Validate and convert bytes to a UTF-8 string.
/// Uses simdutf8 for SIMD-accelerated validation when the feature is enabled.
#[cfg(feature = "simd-utf8")]
#[inline]
fn validate_utf8(bytes: &[u8]) -> Result<&str> {
    simdutf8::basic::from_utf8(bytes)
        .map_err(|_| Error::corrupted("invalid UTF-8 sequence in string"))
}

#[cfg(not(feature = "simd-utf8"))]
#[inline]
fn validate_utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(Error::from)
}

/// Configuration options for the decoder.
///
/// Created once at the entry point and cloned unchanged into every nested
/// decode pass. The scalar decode paths never read it.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Allow unconsumed bytes after the decoded message (default: false)
    pub allow_trailing_bytes: bool,
    /// Maximum container nesting depth
    pub max_depth: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            allow_trailing_bytes: false,
            max_depth: limits::MAX_DEPTH,
        }
    }
}

/// The type and content of one decoded value.
///
/// `Array` and `Map` mean the header has been consumed; the declared number
/// of elements (or key/value pairs) follows on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue<'a> {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    F32(f32),
    F64(f64),
    Str(&'a str),
    Bin(&'a [u8]),
    Array(usize),
    Map(usize),
}

/// An integer type that a wire integer can be narrowed into exactly.
///
/// Conversions return `None` when the decoded value does not fit the target
/// width or signedness; the decoder turns that into a type mismatch rather
/// than truncating.
pub trait WireInt: Sized + Copy {
    /// Type name used in mismatch diagnostics.
    const NAME: &'static str;
    /// Exact conversion from an unsigned wire value.
    fn from_u64(value: u64) -> Option<Self>;
    /// Exact conversion from a signed wire value.
    fn from_i64(value: i64) -> Option<Self>;
}

macro_rules! impl_wire_int {
    ($($ty:ty),* $(,)?) => {$(
        impl WireInt for $ty {
            const NAME: &'static str = stringify!($ty);

            #[inline]
            fn from_u64(value: u64) -> Option<Self> {
                Self::try_from(value).ok()
            }

            #[inline]
            fn from_i64(value: i64) -> Option<Self> {
                Self::try_from(value).ok()
            }
        }
    )*};
}

impl_wire_int!(u8, u16, u32, u64, i8, i16, i32, i64);

/// A MessagePack decoder that reads from a byte slice.
///
/// Owns a read position into the borrowed buffer; every read checks bounds
/// before touching the data and fails without materializing a partial value.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    config: DecoderConfig,
}

impl<'a> Decoder<'a> {
    /// Create a new decoder for the given data.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_config(data, DecoderConfig::default())
    }

    /// Create a new decoder with custom configuration.
    #[must_use]
    pub fn with_config(data: &'a [u8], config: DecoderConfig) -> Self {
        Self {
            data,
            pos: 0,
            config,
        }
    }

    /// Get the current position in the input.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the remaining bytes.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Check if we've reached the end of input.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get the decoder configuration.
    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Create a child decoder viewing the remaining bytes.
    ///
    /// The child starts at position zero over the parent's unread suffix and
    /// carries the same configuration. After the child has decoded, the
    /// parent must catch up with [`Decoder::resync`].
    #[must_use]
    pub fn nested(&self) -> Decoder<'a> {
        Decoder {
            data: self.remaining(),
            pos: 0,
            config: self.config.clone(),
        }
    }

    /// Advance this decoder past everything a child pass consumed.
    ///
    /// A child that consumed nothing leaves the position unchanged; that is
    /// a valid handoff, not an error.
    pub fn resync(&mut self, child: &Decoder<'a>) {
        self.pos += child.pos;
    }

    /// Finish decoding and check for unconsumed input.
    pub fn finish(&self) -> Result<()> {
        if !self.config.allow_trailing_bytes && self.pos < self.data.len() {
            return Err(Error::TrailingBytes);
        }
        Ok(())
    }

    // =========================================================================
    // Cursor primitives
    // =========================================================================

    /// Peek at the byte under the cursor without consuming it.
    #[inline]
    pub(crate) fn peek_byte(&self) -> Result<u8> {
        if self.pos >= self.data.len() {
            return Err(Error::UnexpectedEndOfData);
        }
        Ok(self.data[self.pos])
    }

    /// Read a single byte, advancing the cursor.
    #[inline]
    fn read_byte(&mut self) -> Result<u8> {
        if self.pos >= self.data.len() {
            return Err(Error::UnexpectedEndOfData);
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Read exactly n bytes, advancing the cursor.
    #[inline]
    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.data.len() - self.pos {
            return Err(Error::UnexpectedEndOfData);
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    #[inline]
    fn read_u8(&mut self) -> Result<u8> {
        self.read_byte()
    }

    #[inline]
    fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    #[inline]
    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    #[inline]
    fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }

    #[inline]
    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_byte()? as i8)
    }

    #[inline]
    fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    #[inline]
    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    #[inline]
    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    // =========================================================================
    // Typed scalar decoders
    // =========================================================================

    /// Presence test for nil at the cursor.
    ///
    /// Never consumes and never fails; a mismatch (or an empty buffer) is
    /// simply `false`. The typed decoders re-read their own format byte from
    /// the unchanged position.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.peek_byte() == Ok(format::NIL)
    }

    /// Consume a nil value.
    pub fn decode_nil(&mut self) -> Result<()> {
        let byte = self.read_byte()?;
        if byte == format::NIL {
            Ok(())
        } else {
            Err(Error::mismatch("nil", byte))
        }
    }

    /// Decode a boolean.
    pub fn decode_bool(&mut self) -> Result<bool> {
        let byte = self.read_byte()?;
        match byte {
            format::FALSE => Ok(false),
            format::TRUE => Ok(true),
            _ => Err(Error::mismatch("bool", byte)),
        }
    }

    /// Decode an integer of any wire width into `T`, narrowing exactly.
    ///
    /// Accepts both fixint ranges and all uint/int formats. A wire value
    /// that does not fit `T` fails with a type mismatch naming `T`.
    pub fn decode_int<T: WireInt>(&mut self) -> Result<T> {
        let byte = self.read_byte()?;
        let value = match byte {
            b if format::is_positive_fixint(b) => T::from_u64(u64::from(b)),
            b if format::is_negative_fixint(b) => {
                T::from_i64(i64::from(format::negative_fixint_value(b)))
            }
            format::UINT8 => T::from_u64(u64::from(self.read_u8()?)),
            format::UINT16 => T::from_u64(u64::from(self.read_u16()?)),
            format::UINT32 => T::from_u64(u64::from(self.read_u32()?)),
            format::UINT64 => T::from_u64(self.read_u64()?),
            format::INT8 => T::from_i64(i64::from(self.read_i8()?)),
            format::INT16 => T::from_i64(i64::from(self.read_i16()?)),
            format::INT32 => T::from_i64(i64::from(self.read_i32()?)),
            format::INT64 => T::from_i64(self.read_i64()?),
            _ => None,
        };
        value.ok_or_else(|| Error::mismatch(T::NAME, byte))
    }

    /// Decode a 64-bit float. A 32-bit wire value widens exactly.
    pub fn decode_f64(&mut self) -> Result<f64> {
        let byte = self.read_byte()?;
        match byte {
            format::FLOAT32 => Ok(f64::from(f32::from_bits(self.read_u32()?))),
            format::FLOAT64 => Ok(f64::from_bits(self.read_u64()?)),
            _ => Err(Error::mismatch("f64", byte)),
        }
    }

    /// Decode a 32-bit float.
    ///
    /// A 64-bit wire value is accepted only when narrowing is bit-exact on
    /// round-trip; anything lossy is a type mismatch, never truncation.
    pub fn decode_f32(&mut self) -> Result<f32> {
        let byte = self.read_byte()?;
        match byte {
            format::FLOAT32 => Ok(f32::from_bits(self.read_u32()?)),
            format::FLOAT64 => {
                let bits = self.read_u64()?;
                let narrowed = f64::from_bits(bits) as f32;
                if f64::from(narrowed).to_bits() == bits {
                    Ok(narrowed)
                } else {
                    Err(Error::mismatch("f32", byte))
                }
            }
            _ => Err(Error::mismatch("f32", byte)),
        }
    }

    /// Decode a string of any length encoding, validating UTF-8.
    pub fn decode_str(&mut self) -> Result<&'a str> {
        let byte = self.read_byte()?;
        let len = match byte {
            b if format::is_fixstr(b) => format::fixstr_len(b),
            format::STR8 => self.read_u8()? as usize,
            format::STR16 => self.read_u16()? as usize,
            format::STR32 => self.read_u32()? as usize,
            _ => return Err(Error::mismatch("string", byte)),
        };
        self.read_str_body(len)
    }

    /// Decode a binary blob of any length encoding.
    pub fn decode_bin(&mut self) -> Result<&'a [u8]> {
        let byte = self.read_byte()?;
        let len = match byte {
            format::BIN8 => self.read_u8()? as usize,
            format::BIN16 => self.read_u16()? as usize,
            format::BIN32 => self.read_u32()? as usize,
            _ => return Err(Error::mismatch("bytes", byte)),
        };
        self.read_bytes(len)
    }

    /// Decode an array header, returning the element count.
    pub fn decode_array_len(&mut self) -> Result<usize> {
        let byte = self.read_byte()?;
        match byte {
            b if format::is_fixarray(b) => Ok(format::fixarray_len(b)),
            format::ARRAY16 => Ok(self.read_u16()? as usize),
            format::ARRAY32 => Ok(self.read_u32()? as usize),
            _ => Err(Error::mismatch("array", byte)),
        }
    }

    /// Decode a map header, returning the key/value pair count.
    pub fn decode_map_len(&mut self) -> Result<usize> {
        let byte = self.read_byte()?;
        match byte {
            b if format::is_fixmap(b) => Ok(format::fixmap_len(b)),
            format::MAP16 => Ok(self.read_u16()? as usize),
            format::MAP32 => Ok(self.read_u32()? as usize),
            _ => Err(Error::mismatch("map", byte)),
        }
    }

    /// Decode the next value dynamically, classifying its format byte.
    pub fn decode_value(&mut self) -> Result<DecodedValue<'a>> {
        let byte = self.read_byte()?;

        if format::is_positive_fixint(byte) {
            return Ok(DecodedValue::UInt(u64::from(byte)));
        }
        if format::is_negative_fixint(byte) {
            return Ok(DecodedValue::Int(i64::from(format::negative_fixint_value(
                byte,
            ))));
        }
        if format::is_fixstr(byte) {
            let len = format::fixstr_len(byte);
            return Ok(DecodedValue::Str(self.read_str_body(len)?));
        }
        if format::is_fixarray(byte) {
            return Ok(DecodedValue::Array(format::fixarray_len(byte)));
        }
        if format::is_fixmap(byte) {
            return Ok(DecodedValue::Map(format::fixmap_len(byte)));
        }

        match byte {
            format::NIL => Ok(DecodedValue::Nil),
            format::FALSE => Ok(DecodedValue::Bool(false)),
            format::TRUE => Ok(DecodedValue::Bool(true)),
            format::BIN8 => {
                let len = self.read_u8()? as usize;
                Ok(DecodedValue::Bin(self.read_bytes(len)?))
            }
            format::BIN16 => {
                let len = self.read_u16()? as usize;
                Ok(DecodedValue::Bin(self.read_bytes(len)?))
            }
            format::BIN32 => {
                let len = self.read_u32()? as usize;
                Ok(DecodedValue::Bin(self.read_bytes(len)?))
            }
            format::FLOAT32 => Ok(DecodedValue::F32(f32::from_bits(self.read_u32()?))),
            format::FLOAT64 => Ok(DecodedValue::F64(f64::from_bits(self.read_u64()?))),
            format::UINT8 => Ok(DecodedValue::UInt(u64::from(self.read_u8()?))),
            format::UINT16 => Ok(DecodedValue::UInt(u64::from(self.read_u16()?))),
            format::UINT32 => Ok(DecodedValue::UInt(u64::from(self.read_u32()?))),
            format::UINT64 => Ok(DecodedValue::UInt(self.read_u64()?)),
            format::INT8 => Ok(DecodedValue::Int(i64::from(self.read_i8()?))),
            format::INT16 => Ok(DecodedValue::Int(i64::from(self.read_i16()?))),
            format::INT32 => Ok(DecodedValue::Int(i64::from(self.read_i32()?))),
            format::INT64 => Ok(DecodedValue::Int(self.read_i64()?)),
            format::STR8 => {
                let len = self.read_u8()? as usize;
                Ok(DecodedValue::Str(self.read_str_body(len)?))
            }
            format::STR16 => {
                let len = self.read_u16()? as usize;
                Ok(DecodedValue::Str(self.read_str_body(len)?))
            }
            format::STR32 => {
                let len = self.read_u32()? as usize;
                Ok(DecodedValue::Str(self.read_str_body(len)?))
            }
            format::ARRAY16 => Ok(DecodedValue::Array(self.read_u16()? as usize)),
            format::ARRAY32 => Ok(DecodedValue::Array(self.read_u32()? as usize)),
            format::MAP16 => Ok(DecodedValue::Map(self.read_u16()? as usize)),
            format::MAP32 => Ok(DecodedValue::Map(self.read_u32()? as usize)),
            format::NEVER_USED => Err(Error::InvalidFormat(byte)),
            b if format::is_ext(b) => Err(Error::UnsupportedExtension(b)),
            _ => Err(Error::InvalidFormat(byte)),
        }
    }

    /// Read string content after the length header.
    fn read_str_body(&mut self, len: usize) -> Result<&'a str> {
        let bytes = self.read_bytes(len)?;
        validate_utf8(bytes)
    }
}
