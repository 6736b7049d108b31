// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Tagged-list ("Bottle") wire format.
//!
//! Every value is introduced by a 4-byte little-endian tag word. Lists write
//! `LIST` (optionally OR-ed with the shared primitive tag of their elements)
//! followed by a 4-byte count. Strings and blobs are a 4-byte length followed
//! by raw bytes.
//!
//! - [`writer`] - serialize a [`Value`](crate::Value) into a [`BlockBuffer`]
//! - [`reader`] - parse a value from any `std::io::Read`
//! - [`text`] - human-readable text form used by grammar literals and the CLI

pub mod reader;
pub mod text;
pub mod writer;

pub use reader::{decode, TaggedReader};
pub use text::parse_text;
pub use writer::{encode, BlockBuffer, TaggedWriter};

pub const TAG_INT8: i32 = 32;
pub const TAG_INT16: i32 = 64;
pub const TAG_INT32: i32 = 1;
pub const TAG_INT64: i32 = 1 + 16;
pub const TAG_VOCAB32: i32 = 1 + 8;
pub const TAG_FLOAT32: i32 = 128;
pub const TAG_FLOAT64: i32 = 2 + 8;
pub const TAG_STRING: i32 = 4;
pub const TAG_BLOB: i32 = 4 + 8;
pub const TAG_LIST: i32 = 256;
pub const TAG_DICT: i32 = 512;

/// Bits that select a primitive kind.
pub const UNIT_MASK: i32 = TAG_INT8
    | TAG_INT16
    | TAG_INT32
    | TAG_INT64
    | TAG_FLOAT32
    | TAG_FLOAT64
    | TAG_VOCAB32
    | TAG_STRING
    | TAG_BLOB;

/// Bits that mark a container.
pub const GROUP_MASK: i32 = TAG_LIST | TAG_DICT;

fn primitive_name(unit: i32) -> Option<&'static str> {
    Some(match unit {
        TAG_INT8 => "int8",
        TAG_INT16 => "int16",
        TAG_INT32 => "int32",
        TAG_INT64 => "int64",
        TAG_FLOAT32 => "float32",
        TAG_FLOAT64 => "float64",
        TAG_VOCAB32 => "vocab",
        TAG_STRING => "string",
        TAG_BLOB => "blob",
        _ => return None,
    })
}

/// Human-readable name of a tag word, for diagnostics.
///
/// ```
/// use wirerep::tagged::{describe_code, TAG_INT32, TAG_LIST};
///
/// assert_eq!(describe_code(TAG_INT32), "int32");
/// assert_eq!(describe_code(TAG_LIST | TAG_INT32), "list of int32");
/// assert_eq!(describe_code(TAG_LIST), "list");
/// ```
pub fn describe_code(code: i32) -> String {
    let unit = code & UNIT_MASK;
    if code & !(UNIT_MASK | GROUP_MASK) != 0 {
        return "unsupported".to_string();
    }
    if code & TAG_DICT != 0 {
        return "dict".to_string();
    }
    if code & TAG_LIST != 0 {
        return match (unit, primitive_name(unit)) {
            (0, _) => "list".to_string(),
            (_, Some(name)) => format!("list of {name}"),
            (_, None) => "unsupported".to_string(),
        };
    }
    primitive_name(unit).unwrap_or("unsupported").to_string()
}

/// Pack up to four characters into a vocab code.
pub fn encode_vocab(text: &str) -> i32 {
    text.bytes()
        .take(4)
        .enumerate()
        .fold(0i32, |acc, (i, b)| acc | (i32::from(b) << (8 * i)))
}

/// Unpack a vocab code into its characters.
pub fn decode_vocab(code: i32) -> String {
    code.to_le_bytes()
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}
