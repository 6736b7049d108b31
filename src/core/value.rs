// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Tagged-list value type.
//!
//! A [`Value`] is the in-memory form of one element of the tagged-list wire
//! format: a primitive, a string, a blob or a (possibly nested) list. A whole
//! message is always a [`Value::List`].

use serde::{Deserialize, Serialize};

use crate::tagged::{
    self, TAG_BLOB, TAG_FLOAT32, TAG_FLOAT64, TAG_INT16, TAG_INT32, TAG_INT64, TAG_INT8,
    TAG_LIST, TAG_STRING, TAG_VOCAB32,
};

/// One value of the tagged-list format.
///
/// Unsigned and boolean fields share the tag of the signed type of the same
/// width, so they decode as the signed variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),

    /// Four-character code packed little-endian into an i32
    Vocab(i32),

    Float32(f32),
    Float64(f64),

    /// Length-prefixed text, kept as the bytes that were sent
    String(#[serde(with = "text_bytes")] Vec<u8>),

    /// Raw bytes (image payloads, serialized sub-messages)
    Blob(Vec<u8>),

    List(Vec<Value>),
}

impl Value {
    /// Build a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into().into_bytes())
    }

    /// Build a vocab value from its text (at most four characters are kept).
    pub fn vocab(code: &str) -> Self {
        Value::Vocab(tagged::encode_vocab(code))
    }

    /// Build a list of int32 values.
    pub fn int32_list(items: &[i32]) -> Self {
        Value::List(items.iter().copied().map(Value::Int32).collect())
    }

    /// Build a list of float64 values.
    pub fn float64_list(items: &[f64]) -> Self {
        Value::List(items.iter().copied().map(Value::Float64).collect())
    }

    /// Tag word of this value when written as an element of a list.
    ///
    /// Lists carry `LIST` plus the shared primitive tag of their elements when
    /// they are specialized (see [`Value::specialization`]).
    pub fn code(&self) -> i32 {
        match self {
            Value::Int8(_) => TAG_INT8,
            Value::Int16(_) => TAG_INT16,
            Value::Int32(_) => TAG_INT32,
            Value::Int64(_) => TAG_INT64,
            Value::Vocab(_) => TAG_VOCAB32,
            Value::Float32(_) => TAG_FLOAT32,
            Value::Float64(_) => TAG_FLOAT64,
            Value::String(_) => TAG_STRING,
            Value::Blob(_) => TAG_BLOB,
            Value::List(items) => TAG_LIST | Self::specialization(items),
        }
    }

    /// Shared primitive tag of a list's elements, or 0.
    ///
    /// A list is specialized only when it is non-empty and every element has
    /// the same non-list tag. Specialized lists omit per-element tags.
    pub fn specialization(items: &[Value]) -> i32 {
        let Some(first) = items.first() else {
            return 0;
        };
        let code = first.code();
        if code & tagged::GROUP_MASK != 0 {
            return 0;
        }
        if items.iter().all(|v| v.code() == code) {
            code
        } else {
            0
        }
    }

    /// Check if this value is a list.
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Borrow the elements of a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Integer view of integer and vocab values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(i64::from(*v)),
            Value::Int16(v) => Some(i64::from(*v)),
            Value::Int32(v) | Value::Vocab(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Floating-point view of numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Borrow the text of a string value that holds valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_string_bytes()
            .and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Borrow the raw bytes of a string value.
    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Number of elements for lists, 0 otherwise.
    pub fn len(&self) -> usize {
        self.as_list().map_or(0, <[Value]>::len)
    }

    /// Check if this is an empty list (non-lists count as empty).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a list element by index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.as_list().and_then(|items| items.get(index))
    }
}

/// Strings serialize as text when they are valid UTF-8 and as a byte array
/// otherwise.
mod text_bytes {
    use std::fmt;

    use serde::de::{self, SeqAccess, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(bytes) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => serializer.serialize_bytes(bytes),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        deserializer.deserialize_any(BytesVisitor)
    }

    struct BytesVisitor;

    impl<'de> Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string or a byte array")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.as_bytes().to_vec())
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
            while let Some(b) = seq.next_element::<u8>()? {
                out.push(b);
            }
            Ok(out)
        }
    }
}
