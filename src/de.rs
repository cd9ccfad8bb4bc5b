// ABOUTME: Serde Deserializer implementation for MessagePack decoding.
// ABOUTME: Tracks the coding path of nested values for error diagnostics.

use crate::decoder::{DecodedValue, Decoder, DecoderConfig};
use crate::error::{Error, Path, Result};
use crate::types::format;
use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

/// A serde Deserializer that reads MessagePack.
pub struct Deserializer<'de> {
    decoder: Decoder<'de>,
    path: Path,
    depth: usize,
}

impl<'de> Deserializer<'de> {
    /// Create a new Deserializer from a byte slice.
    #[must_use]
    pub fn from_slice(data: &'de [u8]) -> Self {
        Self {
            decoder: Decoder::new(data),
            path: Path::root(),
            depth: 0,
        }
    }

    /// Create a new Deserializer with custom configuration.
    #[must_use]
    pub fn from_slice_with_config(data: &'de [u8], config: DecoderConfig) -> Self {
        Self {
            decoder: Decoder::with_config(data, config),
            path: Path::root(),
            depth: 0,
        }
    }

    /// Get the underlying decoder (consumes self).
    #[must_use]
    pub fn into_decoder(self) -> Decoder<'de> {
        self.decoder
    }

    fn begin_nested(&mut self) -> Result<()> {
        if self.depth >= self.decoder.config().max_depth {
            return Err(Error::MaxDepthExceeded);
        }
        self.depth += 1;
        Ok(())
    }

    fn end_nested(&mut self) {
        self.depth -= 1;
    }
}

/// Deserialize a value from a MessagePack byte slice.
///
/// # Errors
///
/// Returns an error if the data is malformed or truncated, doesn't match the
/// expected type `T`, or leaves trailing bytes after the value.
pub fn from_slice<'de, T: Deserialize<'de>>(data: &'de [u8]) -> Result<T> {
    let mut de = Deserializer::from_slice(data);
    let value = T::deserialize(&mut de)?;
    de.decoder.finish()?;
    Ok(value)
}

/// Deserialize a value from a MessagePack byte slice with custom configuration.
///
/// # Errors
///
/// As [`from_slice`]; trailing bytes are tolerated when
/// `allow_trailing_bytes` is set.
pub fn from_slice_with_config<'de, T: Deserialize<'de>>(
    data: &'de [u8],
    config: DecoderConfig,
) -> Result<T> {
    let mut de = Deserializer::from_slice_with_config(data, config);
    let value = T::deserialize(&mut de)?;
    de.decoder.finish()?;
    Ok(value)
}

impl<'de> de::Deserializer<'de> for &mut Deserializer<'de> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let decoded = self
            .decoder
            .decode_value()
            .map_err(|e| e.at(&self.path))?;
        match decoded {
            DecodedValue::Nil => visitor.visit_unit(),
            DecodedValue::Bool(b) => visitor.visit_bool(b),
            DecodedValue::Int(n) => visitor.visit_i64(n),
            DecodedValue::UInt(n) => visitor.visit_u64(n),
            DecodedValue::F32(f) => visitor.visit_f32(f),
            DecodedValue::F64(f) => visitor.visit_f64(f),
            DecodedValue::Str(s) => visitor.visit_borrowed_str(s),
            DecodedValue::Bin(b) => visitor.visit_borrowed_bytes(b),
            DecodedValue::Array(len) => {
                self.begin_nested()?;
                let value = visitor.visit_seq(SeqDeserializer::new(self, len))?;
                self.end_nested();
                Ok(value)
            }
            DecodedValue::Map(len) => {
                self.begin_nested()?;
                let value = visitor.visit_map(MapDeserializer::new(self, len))?;
                self.end_nested();
                Ok(value)
            }
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.decoder.decode_bool().map_err(|e| e.at(&self.path))?;
        visitor.visit_bool(v)
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.decoder.decode_int::<i8>().map_err(|e| e.at(&self.path))?;
        visitor.visit_i8(v)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.decoder.decode_int::<i16>().map_err(|e| e.at(&self.path))?;
        visitor.visit_i16(v)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.decoder.decode_int::<i32>().map_err(|e| e.at(&self.path))?;
        visitor.visit_i32(v)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.decoder.decode_int::<i64>().map_err(|e| e.at(&self.path))?;
        visitor.visit_i64(v)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.decoder.decode_int::<u8>().map_err(|e| e.at(&self.path))?;
        visitor.visit_u8(v)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.decoder.decode_int::<u16>().map_err(|e| e.at(&self.path))?;
        visitor.visit_u16(v)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.decoder.decode_int::<u32>().map_err(|e| e.at(&self.path))?;
        visitor.visit_u32(v)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.decoder.decode_int::<u64>().map_err(|e| e.at(&self.path))?;
        visitor.visit_u64(v)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.decoder.decode_f32().map_err(|e| e.at(&self.path))?;
        visitor.visit_f32(v)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let v = self.decoder.decode_f64().map_err(|e| e.at(&self.path))?;
        visitor.visit_f64(v)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let s = self.decoder.decode_str().map_err(|e| e.at(&self.path))?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(Error::corrupted("expected single character").at(&self.path)),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let s = self.decoder.decode_str().map_err(|e| e.at(&self.path))?;
        visitor.visit_borrowed_str(s)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let b = self.decoder.decode_bin().map_err(|e| e.at(&self.path))?;
        visitor.visit_borrowed_bytes(b)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        // Presence test only; the typed decode re-reads from the same position
        if self.decoder.is_nil() {
            self.decoder.decode_nil().map_err(|e| e.at(&self.path))?;
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.decoder.decode_nil().map_err(|e| e.at(&self.path))?;
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let len = self
            .decoder
            .decode_array_len()
            .map_err(|e| e.at(&self.path))?;
        self.begin_nested()?;
        let value = visitor.visit_seq(SeqDeserializer::new(self, len))?;
        self.end_nested();
        Ok(value)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        let count = self
            .decoder
            .decode_array_len()
            .map_err(|e| e.at(&self.path))?;
        if count != len {
            return Err(Error::corrupted(format!(
                "expected an array of {len} elements, found {count}"
            ))
            .at(&self.path));
        }
        self.begin_nested()?;
        let value = visitor.visit_seq(SeqDeserializer::new(self, count))?;
        self.end_nested();
        Ok(value)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value> {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let len = self
            .decoder
            .decode_map_len()
            .map_err(|e| e.at(&self.path))?;
        self.begin_nested()?;
        let value = visitor.visit_map(MapDeserializer::new(self, len))?;
        self.end_nested();
        Ok(value)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        // Structs are maps keyed by field name, but the compact array
        // encoding (fields in declaration order) is accepted as well.
        let byte = self.decoder.peek_byte().map_err(|e| e.at(&self.path))?;
        if format::is_fixarray(byte) || byte == format::ARRAY16 || byte == format::ARRAY32 {
            self.deserialize_tuple(fields.len(), visitor)
        } else {
            self.deserialize_map(visitor)
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        let byte = self.decoder.peek_byte().map_err(|e| e.at(&self.path))?;
        if format::is_str(byte) {
            // Unit variant: just a string
            visitor.visit_enum(UnitVariantDeserializer::new(self))
        } else if format::is_fixmap(byte) || byte == format::MAP16 || byte == format::MAP32 {
            // Other variants: single-entry map of variant name to content
            let len = self
                .decoder
                .decode_map_len()
                .map_err(|e| e.at(&self.path))?;
            if len != 1 {
                return Err(Error::corrupted(format!(
                    "expected a single-entry map for an enum variant, found {len} entries"
                ))
                .at(&self.path));
            }
            visitor.visit_enum(EnumDeserializer::new(self))
        } else {
            Err(Error::mismatch("enum", byte).at(&self.path))
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let s = self.decoder.decode_str().map_err(|e| e.at(&self.path))?;
        visitor.visit_borrowed_str(s)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_any(visitor)
    }
}

struct SeqDeserializer<'a, 'de> {
    de: &'a mut Deserializer<'de>,
    remaining: usize,
    index: usize,
}

impl<'a, 'de> SeqDeserializer<'a, 'de> {
    fn new(de: &'a mut Deserializer<'de>, len: usize) -> Self {
        SeqDeserializer {
            de,
            remaining: len,
            index: 0,
        }
    }
}

impl<'de> SeqAccess<'de> for SeqDeserializer<'_, 'de> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.de.path.push_index(self.index);
        self.index += 1;
        let value = seed.deserialize(&mut *self.de);
        self.de.path.pop();
        value.map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

struct MapDeserializer<'a, 'de> {
    de: &'a mut Deserializer<'de>,
    remaining: usize,
    entry: usize,
}

impl<'a, 'de> MapDeserializer<'a, 'de> {
    fn new(de: &'a mut Deserializer<'de>, len: usize) -> Self {
        MapDeserializer {
            de,
            remaining: len,
            entry: 0,
        }
    }
}

impl<'de> MapAccess<'de> for MapDeserializer<'_, 'de> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        let entry = self.entry;
        self.entry += 1;

        // String keys are decoded eagerly so the key text reaches the
        // error path; other key types go through the full deserializer.
        let byte = self.de.decoder.peek_byte().map_err(|e| e.at(&self.de.path))?;
        if format::is_str(byte) {
            let key = self
                .de
                .decoder
                .decode_str()
                .map_err(|e| e.at(&self.de.path))?;
            self.de.path.push_key(key);
            seed.deserialize(BorrowedStrDeserializer::new(key)).map(Some)
        } else {
            self.de.path.push_index(entry);
            seed.deserialize(&mut *self.de).map(Some)
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let value = seed.deserialize(&mut *self.de);
        self.de.path.pop();
        value
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

struct UnitVariantDeserializer<'a, 'de> {
    de: &'a mut Deserializer<'de>,
}

impl<'a, 'de> UnitVariantDeserializer<'a, 'de> {
    fn new(de: &'a mut Deserializer<'de>) -> Self {
        UnitVariantDeserializer { de }
    }
}

impl<'de> de::EnumAccess<'de> for UnitVariantDeserializer<'_, 'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let variant = seed.deserialize(&mut *self.de)?;
        Ok((variant, self))
    }
}

impl<'de> de::VariantAccess<'de> for UnitVariantDeserializer<'_, 'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, _seed: T) -> Result<T::Value> {
        Err(Error::Custom("expected unit variant".into()))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, _visitor: V) -> Result<V::Value> {
        Err(Error::Custom("expected unit variant".into()))
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value> {
        Err(Error::Custom("expected unit variant".into()))
    }
}

struct EnumDeserializer<'a, 'de> {
    de: &'a mut Deserializer<'de>,
}

impl<'a, 'de> EnumDeserializer<'a, 'de> {
    fn new(de: &'a mut Deserializer<'de>) -> Self {
        EnumDeserializer { de }
    }
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer<'_, 'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let variant = seed.deserialize(&mut *self.de)?;
        Ok((variant, self))
    }
}

impl<'de> de::VariantAccess<'de> for EnumDeserializer<'_, 'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Err(Error::Custom(
            "expected newtype, tuple, or struct variant".into(),
        ))
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(&mut *self.de)
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_tuple(&mut *self.de, len, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value> {
        de::Deserializer::deserialize_struct(&mut *self.de, "", fields, visitor)
    }
}
