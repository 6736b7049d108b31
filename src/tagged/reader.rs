// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Tagged-list parser.
//!
//! Pulls bytes from any `std::io::Read` using `read_exact`, so sources that
//! return short reads (sockets, the transcoding stream reader) are handled
//! transparently.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::core::{Result, TwiddleError, Value};
use crate::tagged::{
    describe_code, TAG_BLOB, TAG_FLOAT32, TAG_FLOAT64, TAG_INT16, TAG_INT32, TAG_INT64,
    TAG_INT8, TAG_LIST, TAG_STRING, TAG_VOCAB32, UNIT_MASK,
};

/// Deepest list nesting accepted from the wire.
const MAX_NESTING: usize = 128;

/// Parser from a byte stream to [`Value`]s.
pub struct TaggedReader<R> {
    inner: R,
}

impl<R: Read> TaggedReader<R> {
    /// Wrap a byte source.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Recover the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read one top-level message.
    pub fn read_value(&mut self) -> Result<Value> {
        let code = self.read_i32("top-level tag")?;
        if code & TAG_LIST == 0 {
            return Err(TwiddleError::parse(
                "tagged stream",
                format!("top-level tag is '{}', not a list", describe_code(code)),
            ));
        }
        self.read_body(code & UNIT_MASK, 0)
    }

    fn read_body(&mut self, specialization: i32, depth: usize) -> Result<Value> {
        if depth > MAX_NESTING {
            return Err(TwiddleError::parse("tagged stream", "lists nested too deeply"));
        }
        let count = self.read_len("list count")?;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let code = if specialization != 0 {
                specialization
            } else {
                self.read_i32("element tag")?
            };
            items.push(self.read_element(code, depth)?);
        }
        Ok(Value::List(items))
    }

    fn read_element(&mut self, code: i32, depth: usize) -> Result<Value> {
        let value = match code {
            TAG_INT8 => Value::Int8(self.inner.read_i8().map_err(io_err("int8"))?),
            TAG_INT16 => Value::Int16(
                self.inner
                    .read_i16::<LittleEndian>()
                    .map_err(io_err("int16"))?,
            ),
            TAG_INT32 => Value::Int32(self.read_i32("int32")?),
            TAG_VOCAB32 => Value::Vocab(self.read_i32("vocab")?),
            TAG_INT64 => Value::Int64(
                self.inner
                    .read_i64::<LittleEndian>()
                    .map_err(io_err("int64"))?,
            ),
            TAG_FLOAT32 => Value::Float32(
                self.inner
                    .read_f32::<LittleEndian>()
                    .map_err(io_err("float32"))?,
            ),
            TAG_FLOAT64 => Value::Float64(
                self.inner
                    .read_f64::<LittleEndian>()
                    .map_err(io_err("float64"))?,
            ),
            TAG_STRING => Value::String(self.read_sized("string")?),
            TAG_BLOB => Value::Blob(self.read_sized("blob")?),
            code if code & TAG_LIST != 0 && code & !(TAG_LIST | UNIT_MASK) == 0 => {
                self.read_body(code & UNIT_MASK, depth + 1)?
            }
            other => {
                return Err(TwiddleError::parse(
                    "tagged stream",
                    format!("unrecognized tag {other} ({})", describe_code(other)),
                ))
            }
        };
        Ok(value)
    }

    fn read_i32(&mut self, context: &'static str) -> Result<i32> {
        self.inner
            .read_i32::<LittleEndian>()
            .map_err(io_err(context))
    }

    fn read_len(&mut self, context: &'static str) -> Result<usize> {
        let len = self.read_i32(context)?;
        usize::try_from(len)
            .map_err(|_| TwiddleError::parse("tagged stream", format!("negative {context} {len}")))
    }

    fn read_sized(&mut self, context: &'static str) -> Result<Vec<u8>> {
        let len = self.read_len(context)?;
        let mut bytes = Vec::with_capacity(len.min(64 * 1024));
        (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut bytes)
            .map_err(io_err(context))?;
        if bytes.len() < len {
            return Err(TwiddleError::stream_exhausted(context, len - bytes.len()));
        }
        Ok(bytes)
    }
}

fn io_err(context: &'static str) -> impl Fn(std::io::Error) -> TwiddleError {
    move |e| TwiddleError::from_io(e, context)
}

/// Parse one message from contiguous bytes.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    TaggedReader::new(bytes).read_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagged::encode;

    fn bytes_of(words: &[i32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_mixed_list() {
        let data = bytes_of(&[TAG_LIST, 2, TAG_INT32, 7, TAG_LIST | TAG_INT32, 3, 1, 2, 3]);
        let value = decode(&data).expect("decode");
        assert_eq!(
            value,
            Value::List(vec![Value::Int32(7), Value::int32_list(&[1, 2, 3])])
        );
    }

    #[test]
    fn test_decode_nested_and_strings() {
        let value = Value::List(vec![
            Value::string("frame"),
            Value::List(vec![Value::Float64(0.5), Value::Blob(vec![1, 2])]),
            Value::vocab("rgb"),
            Value::Int8(-1),
            Value::Int16(300),
            Value::Int64(1 << 40),
            Value::Float32(2.5),
        ]);
        let bytes = encode(&value).expect("encode");
        assert_eq!(decode(&bytes).expect("decode"), value);
    }

    #[test]
    fn test_truncated_string_is_exhausted() {
        let mut data = bytes_of(&[TAG_LIST | TAG_STRING, 1, 10]);
        data.extend_from_slice(b"abc");
        let err = decode(&data).expect_err("truncated");
        assert_eq!(err, TwiddleError::stream_exhausted("string", 7));
    }

    #[test]
    fn test_truncated_count_is_exhausted() {
        let data = bytes_of(&[TAG_LIST]);
        let err = decode(&data).expect_err("truncated");
        assert!(matches!(err, TwiddleError::StreamExhausted { .. }));
    }

    #[test]
    fn test_top_level_must_be_list() {
        let data = bytes_of(&[TAG_INT32, 5]);
        assert!(matches!(
            decode(&data),
            Err(TwiddleError::Parse { .. })
        ));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let data = bytes_of(&[TAG_LIST, 1, 3, 0]);
        assert!(matches!(decode(&data), Err(TwiddleError::Parse { .. })));
    }
}
