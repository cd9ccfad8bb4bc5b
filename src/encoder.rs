// ABOUTME: MessagePack binary encoder with minimal-width format selection.
// ABOUTME: Tracks declared container counts so finish() can verify completeness.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::error::{Error, Result};
use crate::types::format;
use std::io::Write;

/// A MessagePack encoder that writes to a writer.
///
/// Array and map headers declare element counts up front; the encoder keeps
/// a stack of outstanding counts so that [`Encoder::finish`] can reject a
/// message whose containers received fewer elements than declared.
pub struct Encoder<W: Write> {
    writer: W,
    /// Remaining value slots per open container, innermost last.
    /// Map containers count keys and values as separate slots.
    containers: Vec<usize>,
}

impl<W: Write> Encoder<W> {
    /// Create a new encoder that writes to the given writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            containers: Vec::new(),
        }
    }

    /// Consume the encoder and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Finish encoding, verifying every declared container was filled.
    pub fn finish(self) -> Result<W> {
        if !self.containers.is_empty() {
            return Err(Error::IncompleteContainer);
        }
        Ok(self.writer)
    }

    /// Account for one complete value. A container that just received its
    /// last element closes and counts as one value in its own parent.
    fn note_value(&mut self) {
        while let Some(remaining) = self.containers.last_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                self.containers.pop();
                continue;
            }
            break;
        }
    }

    /// Open a container expecting `slots` values. An empty container is
    /// already complete and counts immediately.
    fn begin_container(&mut self, slots: usize) {
        if slots == 0 {
            self.note_value();
        } else {
            self.containers.push(slots);
        }
    }

    #[inline]
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.writer.write_all(&[byte])?;
        Ok(())
    }

    #[inline]
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    /// Encode a nil value.
    pub fn write_nil(&mut self) -> Result<()> {
        self.write_byte(format::NIL)?;
        self.note_value();
        Ok(())
    }

    /// Encode a boolean value.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_byte(if value { format::TRUE } else { format::FALSE })?;
        self.note_value();
        Ok(())
    }

    /// Encode an unsigned integer using the smallest format that holds it.
    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        if value <= u64::from(format::POS_FIXINT_MAX) {
            self.write_byte(value as u8)?;
        } else if value <= u64::from(u8::MAX) {
            self.write_byte(format::UINT8)?;
            self.write_byte(value as u8)?;
        } else if value <= u64::from(u16::MAX) {
            self.write_byte(format::UINT16)?;
            self.write_bytes(&(value as u16).to_be_bytes())?;
        } else if value <= u64::from(u32::MAX) {
            self.write_byte(format::UINT32)?;
            self.write_bytes(&(value as u32).to_be_bytes())?;
        } else {
            self.write_byte(format::UINT64)?;
            self.write_bytes(&value.to_be_bytes())?;
        }
        self.note_value();
        Ok(())
    }

    /// Encode a signed integer using the smallest format that holds it.
    /// Non-negative values take the unsigned family.
    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        if value >= 0 {
            return self.write_u64(value as u64);
        }
        if value >= -32 {
            self.write_byte(value as u8)?;
        } else if value >= i64::from(i8::MIN) {
            self.write_byte(format::INT8)?;
            self.write_byte(value as i8 as u8)?;
        } else if value >= i64::from(i16::MIN) {
            self.write_byte(format::INT16)?;
            self.write_bytes(&(value as i16).to_be_bytes())?;
        } else if value >= i64::from(i32::MIN) {
            self.write_byte(format::INT32)?;
            self.write_bytes(&(value as i32).to_be_bytes())?;
        } else {
            self.write_byte(format::INT64)?;
            self.write_bytes(&value.to_be_bytes())?;
        }
        self.note_value();
        Ok(())
    }

    /// Encode a 32-bit float.
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_byte(format::FLOAT32)?;
        self.write_bytes(&value.to_bits().to_be_bytes())?;
        self.note_value();
        Ok(())
    }

    /// Encode a 64-bit float, narrowing to the 4-byte format when the value
    /// survives the round-trip bit-for-bit.
    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        let narrowed = value as f32;
        if f64::from(narrowed).to_bits() == value.to_bits() {
            return self.write_f32(narrowed);
        }
        self.write_byte(format::FLOAT64)?;
        self.write_bytes(&value.to_bits().to_be_bytes())?;
        self.note_value();
        Ok(())
    }

    /// Encode a string with the smallest length header.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        let len = bytes.len();

        if len <= 31 {
            self.write_byte(format::FIXSTR_MIN | len as u8)?;
        } else if len <= u8::MAX as usize {
            self.write_byte(format::STR8)?;
            self.write_byte(len as u8)?;
        } else if len <= u16::MAX as usize {
            self.write_byte(format::STR16)?;
            self.write_bytes(&(len as u16).to_be_bytes())?;
        } else if len <= u32::MAX as usize {
            self.write_byte(format::STR32)?;
            self.write_bytes(&(len as u32).to_be_bytes())?;
        } else {
            return Err(Error::ValueOutOfRange);
        }
        self.write_bytes(bytes)?;
        self.note_value();
        Ok(())
    }

    /// Encode a binary blob with the smallest length header.
    pub fn write_bin(&mut self, value: &[u8]) -> Result<()> {
        let len = value.len();

        if len <= u8::MAX as usize {
            self.write_byte(format::BIN8)?;
            self.write_byte(len as u8)?;
        } else if len <= u16::MAX as usize {
            self.write_byte(format::BIN16)?;
            self.write_bytes(&(len as u16).to_be_bytes())?;
        } else if len <= u32::MAX as usize {
            self.write_byte(format::BIN32)?;
            self.write_bytes(&(len as u32).to_be_bytes())?;
        } else {
            return Err(Error::ValueOutOfRange);
        }
        self.write_bytes(value)?;
        self.note_value();
        Ok(())
    }

    /// Begin an array of `len` elements.
    pub fn write_array_len(&mut self, len: usize) -> Result<()> {
        if len <= 15 {
            self.write_byte(format::FIXARRAY_MIN | len as u8)?;
        } else if len <= u16::MAX as usize {
            self.write_byte(format::ARRAY16)?;
            self.write_bytes(&(len as u16).to_be_bytes())?;
        } else if len <= u32::MAX as usize {
            self.write_byte(format::ARRAY32)?;
            self.write_bytes(&(len as u32).to_be_bytes())?;
        } else {
            return Err(Error::ValueOutOfRange);
        }
        self.begin_container(len);
        Ok(())
    }

    /// Begin a map of `len` key/value pairs.
    pub fn write_map_len(&mut self, len: usize) -> Result<()> {
        if len <= 15 {
            self.write_byte(format::FIXMAP_MIN | len as u8)?;
        } else if len <= u16::MAX as usize {
            self.write_byte(format::MAP16)?;
            self.write_bytes(&(len as u16).to_be_bytes())?;
        } else if len <= u32::MAX as usize {
            self.write_byte(format::MAP32)?;
            self.write_bytes(&(len as u32).to_be_bytes())?;
        } else {
            return Err(Error::ValueOutOfRange);
        }
        let slots = len.checked_mul(2).ok_or(Error::ValueOutOfRange)?;
        self.begin_container(slots);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(f: impl FnOnce(&mut Encoder<&mut Vec<u8>>) -> Result<()>) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        f(&mut enc).unwrap();
        enc.finish().unwrap();
        buf
    }

    #[test]
    fn test_encode_minimal_unsigned() {
        assert_eq!(encode(|e| e.write_u64(0)), vec![0x00]);
        assert_eq!(encode(|e| e.write_u64(127)), vec![0x7f]);
        assert_eq!(encode(|e| e.write_u64(128)), vec![0xcc, 0x80]);
        assert_eq!(encode(|e| e.write_u64(255)), vec![0xcc, 0xff]);
        assert_eq!(encode(|e| e.write_u64(256)), vec![0xcd, 0x01, 0x00]);
        assert_eq!(encode(|e| e.write_u64(65535)), vec![0xcd, 0xff, 0xff]);
        assert_eq!(
            encode(|e| e.write_u64(65536)),
            vec![0xce, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(
            encode(|e| e.write_u64(u64::from(u32::MAX) + 1)),
            vec![0xcf, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_encode_minimal_signed() {
        assert_eq!(encode(|e| e.write_i64(-1)), vec![0xff]);
        assert_eq!(encode(|e| e.write_i64(-32)), vec![0xe0]);
        assert_eq!(encode(|e| e.write_i64(-33)), vec![0xd0, 0xdf]);
        assert_eq!(encode(|e| e.write_i64(-128)), vec![0xd0, 0x80]);
        assert_eq!(encode(|e| e.write_i64(-129)), vec![0xd1, 0xff, 0x7f]);
        assert_eq!(
            encode(|e| e.write_i64(-32769)),
            vec![0xd2, 0xff, 0xff, 0x7f, 0xff]
        );
        // Non-negative values go through the unsigned family
        assert_eq!(encode(|e| e.write_i64(42)), vec![0x2a]);
        assert_eq!(encode(|e| e.write_i64(300)), vec![0xcd, 0x01, 0x2c]);
    }

    #[test]
    fn test_encode_nil_bool() {
        assert_eq!(encode(|e| e.write_nil()), vec![0xc0]);
        assert_eq!(encode(|e| e.write_bool(false)), vec![0xc2]);
        assert_eq!(encode(|e| e.write_bool(true)), vec![0xc3]);
    }

    #[test]
    fn test_encode_strings() {
        assert_eq!(encode(|e| e.write_str("")), vec![0xa0]);
        assert_eq!(encode(|e| e.write_str("a")), vec![0xa1, b'a']);

        // 31 bytes still fits a fixstr, 32 needs str8
        let s31 = "x".repeat(31);
        let out = encode(|e| e.write_str(&s31));
        assert_eq!(out[0], 0xbf);
        assert_eq!(out.len(), 32);

        let s32 = "x".repeat(32);
        let out = encode(|e| e.write_str(&s32));
        assert_eq!(&out[..2], &[0xd9, 0x20]);

        let s256 = "x".repeat(256);
        let out = encode(|e| e.write_str(&s256));
        assert_eq!(&out[..3], &[0xda, 0x01, 0x00]);
    }

    #[test]
    fn test_encode_bin() {
        assert_eq!(encode(|e| e.write_bin(&[1, 2, 3])), vec![0xc4, 3, 1, 2, 3]);

        let blob = vec![0u8; 256];
        let out = encode(|e| e.write_bin(&blob));
        assert_eq!(&out[..3], &[0xc5, 0x01, 0x00]);
    }

    #[test]
    fn test_encode_floats() {
        assert_eq!(
            encode(|e| e.write_f32(1.0)),
            vec![0xca, 0x3f, 0x80, 0x00, 0x00]
        );

        // Exactly representable: f64 narrows to the 4-byte format
        assert_eq!(
            encode(|e| e.write_f64(1.5)),
            vec![0xca, 0x3f, 0xc0, 0x00, 0x00]
        );

        // Not representable: stays 8 bytes
        let out = encode(|e| e.write_f64(1.1));
        assert_eq!(out[0], 0xcb);
        assert_eq!(out.len(), 9);
        assert_eq!(&out[1..], &1.1f64.to_bits().to_be_bytes());
    }

    #[test]
    fn test_encode_containers() {
        assert_eq!(encode(|e| e.write_array_len(0)), vec![0x90]);
        assert_eq!(encode(|e| e.write_map_len(0)), vec![0x80]);

        let out = encode(|e| {
            e.write_array_len(2)?;
            e.write_u64(1)?;
            e.write_u64(2)
        });
        assert_eq!(out, vec![0x92, 0x01, 0x02]);

        let out = encode(|e| {
            e.write_map_len(1)?;
            e.write_str("a")?;
            e.write_u64(1)
        });
        assert_eq!(out, vec![0x81, 0xa1, b'a', 0x01]);

        // 16 elements need the 2-byte count header
        let out = encode(|e| {
            e.write_array_len(16)?;
            for _ in 0..16 {
                e.write_nil()?;
            }
            Ok(())
        });
        assert_eq!(&out[..3], &[0xdc, 0x00, 0x10]);
    }

    #[test]
    fn test_incomplete_container_rejected() {
        let mut buf = Vec::new();
        let mut enc = Encoder::new(&mut buf);
        enc.write_array_len(2).unwrap();
        enc.write_u64(1).unwrap();
        assert!(matches!(enc.finish(), Err(Error::IncompleteContainer)));
    }

    #[test]
    fn test_nested_container_completion() {
        // [[1], 2] closes the inner array and still expects the 2
        let out = encode(|e| {
            e.write_array_len(2)?;
            e.write_array_len(1)?;
            e.write_u64(1)?;
            e.write_u64(2)
        });
        assert_eq!(out, vec![0x92, 0x91, 0x01, 0x02]);

        // An empty inner container counts as a value of its parent
        let out = encode(|e| {
            e.write_array_len(1)?;
            e.write_map_len(0)
        });
        assert_eq!(out, vec![0x91, 0x80]);
    }
}
