// ABOUTME: MessagePack encoder/decoder for Rust.
// ABOUTME: Provides serde integration and a dynamic Value API for encoding/decoding.

//! # MessagePack for serde
//!
//! A MessagePack encoder and decoder for Rust with serde support.
//!
//! MessagePack is a compact, self-describing binary format: every value
//! starts with a format byte that identifies its type and, for small
//! integers and short strings, encodes part of the value itself.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_msgpack::{to_vec, from_slice};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, Debug, PartialEq)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! let person = Person {
//!     name: "Alice".to_string(),
//!     age: 30,
//! };
//!
//! // Serialize to MessagePack
//! let bytes = to_vec(&person).unwrap();
//!
//! // Deserialize from MessagePack
//! let decoded: Person = from_slice(&bytes).unwrap();
//! assert_eq!(person, decoded);
//! ```
//!
//! ## Working with Dynamic Values
//!
//! ```rust
//! use serde_msgpack::{Value, msgpack};
//!
//! // Create values with the macro
//! let value = msgpack!({
//!     "name": "test",
//!     "values": [1, 2, 3],
//!     "active": true
//! });
//!
//! // Access fields
//! assert_eq!(value.get_key("name").and_then(|v| v.as_str()), Some("test"));
//! ```
//!
//! ## Conformance notes
//!
//! - Decoding validates UTF-8 in strings; invalid content is an error, never
//!   a lossy replacement.
//! - Integers narrow exactly into the requested width; a wire value that
//!   does not fit fails instead of truncating.
//! - The extension family (`0xc7`-`0xc9`, `0xd4`-`0xd8`) is not supported
//!   and is rejected on decode.

pub mod de;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod ser;
pub mod types;
pub mod value;

#[cfg(test)]
mod value_tests;

// Re-export commonly used items at the crate root
pub use de::{from_slice, from_slice_with_config, Deserializer};
pub use decoder::{DecodedValue, Decoder, DecoderConfig, WireInt};
pub use encoder::Encoder;
pub use error::{Error, Path, Result, Segment};
pub use ser::Serializer;
pub use types::{format, limits};
pub use value::Value;

// The msgpack! macro is automatically exported at crate root via #[macro_export]

use serde::{Deserialize, Serialize};
use std::io::Write;

/// Serialize a value to a MessagePack byte vector.
///
/// # Example
///
/// ```rust
/// use serde_msgpack::to_vec;
///
/// let bytes = to_vec(&42i32).unwrap();
/// assert_eq!(bytes, vec![0x2a]); // positive fixint 42
/// ```
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    to_writer(&mut buf, value)?;
    Ok(buf)
}

/// Serialize a value to a writer.
///
/// # Example
///
/// ```rust
/// use serde_msgpack::to_writer;
///
/// let mut buf = Vec::new();
/// to_writer(&mut buf, &"hello").unwrap();
/// ```
pub fn to_writer<W: Write, T: Serialize>(writer: W, value: &T) -> Result<()> {
    let mut encoder = Encoder::new(writer);
    {
        let mut serializer = Serializer::new(&mut encoder);
        value.serialize(&mut serializer)?;
    }
    encoder.finish()?;
    Ok(())
}

/// Decode a MessagePack message into a `Value`.
///
/// # Example
///
/// ```rust
/// use serde_msgpack::{decode_value, Value};
///
/// let bytes = vec![0x93, 0x01, 0x02, 0x03]; // [1, 2, 3]
/// let value = decode_value(&bytes).unwrap();
/// assert!(value.is_array());
/// ```
pub fn decode_value(data: &[u8]) -> Result<Value> {
    decode_value_with_config(data, DecoderConfig::default())
}

/// Decode a MessagePack message into a `Value` with custom configuration.
pub fn decode_value_with_config(data: &[u8], config: DecoderConfig) -> Result<Value> {
    let mut decoder = Decoder::with_config(data, config);
    let value = read_value(&mut decoder, 0)?;
    decoder.finish()?;
    Ok(value)
}

/// Decode one value at the decoder's cursor, descending into containers.
///
/// Container children are decoded through a fresh pass over the remaining
/// bytes; afterwards the parent cursor is re-synchronized to sit just past
/// everything the child pass consumed, so sibling values keep decoding from
/// the right place.
fn read_value(decoder: &mut Decoder<'_>, depth: usize) -> Result<Value> {
    match decoder.decode_value()? {
        DecodedValue::Nil => Ok(Value::Nil),
        DecodedValue::Bool(b) => Ok(Value::Bool(b)),
        DecodedValue::Int(n) => Ok(Value::Int(n)),
        DecodedValue::UInt(n) => Ok(Value::from(n)),
        DecodedValue::F32(f) => Ok(Value::Float(f64::from(f))),
        DecodedValue::F64(f) => Ok(Value::Float(f)),
        DecodedValue::Str(s) => Ok(Value::String(s.to_owned())),
        DecodedValue::Bin(b) => Ok(Value::Binary(b.to_vec())),
        DecodedValue::Array(len) => {
            if depth >= decoder.config().max_depth {
                return Err(Error::MaxDepthExceeded);
            }
            let mut child = decoder.nested();
            // Every element takes at least one byte; cap preallocation there
            let mut items = Vec::with_capacity(len.min(child.remaining().len()));
            for _ in 0..len {
                items.push(read_value(&mut child, depth + 1)?);
            }
            decoder.resync(&child);
            Ok(Value::Array(items))
        }
        DecodedValue::Map(len) => {
            if depth >= decoder.config().max_depth {
                return Err(Error::MaxDepthExceeded);
            }
            let mut child = decoder.nested();
            let mut entries = Vec::with_capacity(len.min(child.remaining().len()));
            for _ in 0..len {
                let key = read_value(&mut child, depth + 1)?;
                let value = read_value(&mut child, depth + 1)?;
                entries.push((key, value));
            }
            decoder.resync(&child);
            Ok(Value::Map(entries))
        }
    }
}

/// Encode a `Value` to MessagePack bytes.
///
/// # Example
///
/// ```rust
/// use serde_msgpack::{encode_value, Value};
///
/// let value = Value::Int(42);
/// let bytes = encode_value(&value).unwrap();
/// assert_eq!(bytes, vec![0x2a]);
/// ```
pub fn encode_value(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to_writer(&mut buf, value)?;
    Ok(buf)
}

/// Encode a `Value` to a writer.
pub fn encode_value_to_writer<W: Write>(writer: W, value: &Value) -> Result<()> {
    let mut encoder = Encoder::new(writer);
    write_value(&mut encoder, value)?;
    encoder.finish()?;
    Ok(())
}

fn write_value<W: Write>(encoder: &mut Encoder<W>, value: &Value) -> Result<()> {
    match value {
        Value::Nil => encoder.write_nil(),
        Value::Bool(b) => encoder.write_bool(*b),
        Value::Int(n) => encoder.write_i64(*n),
        Value::UInt(n) => encoder.write_u64(*n),
        Value::Float(f) => encoder.write_f64(*f),
        Value::String(s) => encoder.write_str(s),
        Value::Binary(b) => encoder.write_bin(b),
        Value::Array(items) => {
            encoder.write_array_len(items.len())?;
            for item in items {
                write_value(encoder, item)?;
            }
            Ok(())
        }
        Value::Map(entries) => {
            encoder.write_map_len(entries.len())?;
            for (key, val) in entries {
                write_value(encoder, key)?;
                write_value(encoder, val)?;
            }
            Ok(())
        }
    }
}

// Implement Serialize for Value
impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::UInt(n) => serializer.serialize_u64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Binary(b) => serializer.serialize_bytes(b),
            Value::Array(items) => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, val) in entries {
                    map.serialize_entry(key, val)?;
                }
                map.end()
            }
        }
    }
}

// Implement Deserialize for Value
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> serde::de::Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "any valid MessagePack value")
            }

            fn visit_bool<E>(self, v: bool) -> std::result::Result<Value, E> {
                Ok(Value::Bool(v))
            }

            fn visit_i64<E>(self, v: i64) -> std::result::Result<Value, E> {
                Ok(Value::Int(v))
            }

            fn visit_u64<E>(self, v: u64) -> std::result::Result<Value, E> {
                Ok(Value::from(v))
            }

            fn visit_f64<E>(self, v: f64) -> std::result::Result<Value, E> {
                Ok(Value::Float(v))
            }

            fn visit_str<E>(self, v: &str) -> std::result::Result<Value, E> {
                Ok(Value::String(v.to_owned()))
            }

            fn visit_string<E>(self, v: String) -> std::result::Result<Value, E> {
                Ok(Value::String(v))
            }

            fn visit_bytes<E>(self, v: &[u8]) -> std::result::Result<Value, E> {
                Ok(Value::Binary(v.to_vec()))
            }

            fn visit_byte_buf<E>(self, v: Vec<u8>) -> std::result::Result<Value, E> {
                Ok(Value::Binary(v))
            }

            fn visit_unit<E>(self) -> std::result::Result<Value, E> {
                Ok(Value::Nil)
            }

            fn visit_none<E>(self) -> std::result::Result<Value, E> {
                Ok(Value::Nil)
            }

            fn visit_some<D: serde::Deserializer<'de>>(
                self,
                deserializer: D,
            ) -> std::result::Result<Value, D::Error> {
                Deserialize::deserialize(deserializer)
            }

            fn visit_seq<A: serde::de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Value, A::Error> {
                let mut items = Vec::new();
                while let Some(elem) = seq.next_element()? {
                    items.push(elem);
                }
                Ok(Value::Array(items))
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Value, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(Value::Map(entries))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}
