// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Tagged-list serializer.
//!
//! Values are serialized into a [`BlockBuffer`]: an ordered list of byte
//! blocks, the first `header_len` of which are framing that belongs to the
//! transport rather than to the message. Block boundaries carry no meaning;
//! consumers must treat the payload blocks as one contiguous stream.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::core::{Result, TwiddleError, Value};
use crate::tagged::TAG_LIST;

/// Default payload block size.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Serialized message split into blocks, with leading header blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockBuffer {
    blocks: Vec<Vec<u8>>,
    header_len: usize,
}

impl BlockBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a buffer from existing blocks, the first `header_len` being headers.
    pub fn from_blocks(blocks: Vec<Vec<u8>>, header_len: usize) -> Self {
        let header_len = header_len.min(blocks.len());
        Self { blocks, header_len }
    }

    /// Number of leading header blocks.
    #[inline]
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Total number of blocks, headers included.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes of one block.
    #[inline]
    pub fn block(&self, index: usize) -> &[u8] {
        &self.blocks[index]
    }

    /// Payload blocks (headers excluded).
    pub fn payload_blocks(&self) -> impl Iterator<Item = &[u8]> {
        self.blocks[self.header_len..].iter().map(Vec::as_slice)
    }

    /// Payload size in bytes.
    pub fn payload_len(&self) -> usize {
        self.payload_blocks().map(<[u8]>::len).sum()
    }

    /// Concatenated payload bytes.
    pub fn payload(&self) -> Vec<u8> {
        self.payload_blocks().flatten().copied().collect()
    }
}

/// Serializer from [`Value`] to the tagged-list format.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use wirerep::tagged::TaggedWriter;
/// use wirerep::Value;
///
/// let mut writer = TaggedWriter::with_block_size(8);
/// writer.write(&Value::int32_list(&[1, 2, 3]))?;
/// let blocks = writer.finish();
/// assert_eq!(blocks.payload_len(), 20);
/// assert_eq!(blocks.block_count(), 3);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TaggedWriter {
    headers: Vec<Vec<u8>>,
    buffer: Vec<u8>,
    block_size: usize,
}

impl Default for TaggedWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TaggedWriter {
    /// Create a writer with the default block size.
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// Create a writer that splits its payload into blocks of `block_size` bytes.
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            headers: Vec::new(),
            buffer: Vec::new(),
            block_size: block_size.max(1),
        }
    }

    /// Add a framing block that precedes the payload.
    pub fn header(&mut self, bytes: &[u8]) -> &mut Self {
        self.headers.push(bytes.to_vec());
        self
    }

    /// Serialize one top-level message. The value must be a list.
    pub fn write(&mut self, value: &Value) -> Result<()> {
        let Value::List(items) = value else {
            return Err(TwiddleError::parse(
                "tagged value",
                "top-level value must be a list",
            ));
        };
        self.buffer
            .write_i32::<LittleEndian>(TAG_LIST | Value::specialization(items))?;
        self.write_body(items)
    }

    /// Split the payload into blocks and return them after the headers.
    pub fn finish(self) -> BlockBuffer {
        let header_len = self.headers.len();
        let mut blocks = self.headers;
        blocks.extend(self.buffer.chunks(self.block_size).map(<[u8]>::to_vec));
        BlockBuffer::from_blocks(blocks, header_len)
    }

    fn write_body(&mut self, items: &[Value]) -> Result<()> {
        let specialization = Value::specialization(items);
        self.write_len(items.len())?;
        for item in items {
            if specialization == 0 {
                self.buffer.write_i32::<LittleEndian>(item.code())?;
            }
            self.write_raw(item)?;
        }
        Ok(())
    }

    fn write_raw(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Int8(v) => self.buffer.write_i8(*v)?,
            Value::Int16(v) => self.buffer.write_i16::<LittleEndian>(*v)?,
            Value::Int32(v) | Value::Vocab(v) => self.buffer.write_i32::<LittleEndian>(*v)?,
            Value::Int64(v) => self.buffer.write_i64::<LittleEndian>(*v)?,
            Value::Float32(v) => self.buffer.write_f32::<LittleEndian>(*v)?,
            Value::Float64(v) => self.buffer.write_f64::<LittleEndian>(*v)?,
            Value::String(s) => {
                self.write_len(s.len())?;
                self.buffer.extend_from_slice(s);
            }
            Value::Blob(b) => {
                self.write_len(b.len())?;
                self.buffer.extend_from_slice(b);
            }
            Value::List(items) => self.write_body(items)?,
        }
        Ok(())
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = i32::try_from(len)
            .map_err(|_| TwiddleError::parse("tagged value", format!("length {len} too large")))?;
        self.buffer.write_i32::<LittleEndian>(len)?;
        Ok(())
    }
}

/// Serialize one message into contiguous bytes.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut writer = TaggedWriter::new();
    writer.write(value)?;
    Ok(writer.finish().payload())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagged::{TAG_FLOAT64, TAG_INT32, TAG_STRING};

    fn words(bytes: &[u8]) -> Vec<i32> {
        bytes
            .chunks(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn test_mixed_list_layout() {
        let value = Value::List(vec![Value::Int32(7), Value::int32_list(&[1, 2, 3])]);
        let bytes = encode(&value).expect("encode");
        assert_eq!(
            words(&bytes),
            vec![TAG_LIST, 2, TAG_INT32, 7, TAG_LIST | TAG_INT32, 3, 1, 2, 3]
        );
    }

    #[test]
    fn test_specialized_top_level() {
        let bytes = encode(&Value::float64_list(&[1.5])).expect("encode");
        assert_eq!(&words(&bytes[..8]), &[TAG_LIST | TAG_FLOAT64, 1]);
        assert_eq!(f64::from_le_bytes(bytes[8..16].try_into().expect("8 bytes")), 1.5);
    }

    #[test]
    fn test_string_has_no_terminator() {
        let bytes = encode(&Value::List(vec![Value::string("abc")])).expect("encode");
        assert_eq!(&words(&bytes[..12]), &[TAG_LIST | TAG_STRING, 1, 3]);
        assert_eq!(&bytes[12..], b"abc");
    }

    #[test]
    fn test_top_level_must_be_list() {
        let err = encode(&Value::Int32(1)).expect_err("not a list");
        assert!(matches!(err, TwiddleError::Parse { .. }));
    }

    #[test]
    fn test_headers_precede_payload() {
        let mut writer = TaggedWriter::with_block_size(4);
        writer.header(b"HDR!");
        writer.write(&Value::List(vec![])).expect("write");
        let blocks = writer.finish();
        assert_eq!(blocks.header_len(), 1);
        assert_eq!(blocks.block(0), b"HDR!");
        assert_eq!(words(&blocks.payload()), vec![TAG_LIST, 0]);
    }
}
