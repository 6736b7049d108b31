// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Text form of tagged-list values using Pest.
//!
//! The format is whitespace (or comma) separated:
//! - integers (`7`, `-3`) become int32, or int64 when they do not fit
//! - floats (`1.5`, `2e3`) become float64
//! - `"quoted"` text and bare words become strings; `\xNN` escapes a byte
//!   that is not part of valid UTF-8
//! - `[rgb]` becomes a vocab, `{0a0b}` a blob
//! - `( ... )` is a nested list
//!
//! [`parse_text`] returns all top-level items as one list, matching how a
//! message is always a list. `Display` on [`Value`] produces text this parser
//! reads back.

use std::fmt;
use std::str::FromStr;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::core::{Result, TwiddleError, Value};
use crate::tagged::{decode_vocab, encode_vocab};

/// Pest parser for tagged-list text.
#[derive(Parser)]
#[grammar = "tagged/text.pest"] // Path relative to src/ directory
pub struct TextParser;

/// Parse text into a list of values.
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use wirerep::tagged::parse_text;
/// use wirerep::Value;
///
/// let value = parse_text("7 (1 2 3)")?;
/// assert_eq!(value, Value::List(vec![Value::Int32(7), Value::int32_list(&[1, 2, 3])]));
/// # Ok(())
/// # }
/// ```
pub fn parse_text(text: &str) -> Result<Value> {
    let mut pairs = TextParser::parse(Rule::document, text)
        .map_err(|e| TwiddleError::parse("value text", format!("{e}")))?;
    let document = pairs
        .next()
        .ok_or_else(|| TwiddleError::parse("value text", "empty parse"))?;
    let items = document
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(convert)
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::List(items))
}

fn convert(pair: Pair<Rule>) -> Result<Value> {
    let text = pair.as_str();
    match pair.as_rule() {
        Rule::list => Ok(Value::List(
            pair.into_inner().map(convert).collect::<Result<Vec<_>>>()?,
        )),
        Rule::integer => {
            let v: i64 = text
                .parse()
                .map_err(|e| TwiddleError::parse("value text", format!("'{text}': {e}")))?;
            Ok(i32::try_from(v).map_or(Value::Int64(v), Value::Int32))
        }
        Rule::float => text
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|e| TwiddleError::parse("value text", format!("'{text}': {e}"))),
        Rule::vocab => {
            let inner = inner_text(pair);
            if inner.len() > 4 {
                return Err(TwiddleError::parse(
                    "value text",
                    format!("vocab '[{inner}]' longer than four characters"),
                ));
            }
            Ok(Value::Vocab(encode_vocab(inner)))
        }
        Rule::blob => {
            let inner = inner_text(pair);
            hex::decode(inner)
                .map(Value::Blob)
                .map_err(|e| TwiddleError::parse("value text", format!("blob {{{inner}}}: {e}")))
        }
        Rule::string => unescape(inner_text(pair)).map(Value::String),
        Rule::word => Ok(Value::string(text)),
        other => Err(TwiddleError::parse(
            "value text",
            format!("unexpected {other:?} '{text}'"),
        )),
    }
}

fn inner_text(pair: Pair<Rule>) -> &str {
    pair.into_inner().next().map_or("", |p| p.as_str())
}

fn unescape(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.chars();
    let mut utf8 = [0u8; 4];
    while let Some(c) = chars.next() {
        let c = if c == '\\' {
            match chars.next() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some('x') => {
                    let digits: String = chars.by_ref().take(2).collect();
                    let byte = hex::decode(&digits).ok().and_then(|b| b.first().copied());
                    let Some(byte) = byte else {
                        return Err(TwiddleError::parse(
                            "value text",
                            format!("bad escape '\\x{digits}'"),
                        ));
                    };
                    out.push(byte);
                    continue;
                }
                Some(other) => other,
                None => '\\',
            }
        } else {
            c
        };
        out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }
    Ok(out)
}

fn write_escaped(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("\"")?;
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\t' => f.write_str("\\t")?,
                '\r' => f.write_str("\\r")?,
                c => write!(f, "{c}")?,
            }
        }
        for b in chunk.invalid() {
            write!(f, "\\x{b:02x}")?;
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Vocab(v) => write!(f, "[{}]", decode_vocab(*v)),
            // Debug keeps a '.' or exponent, so the text reads back as a float
            Value::Float32(v) => write!(f, "{v:?}"),
            Value::Float64(v) => write!(f, "{v:?}"),
            Value::String(s) => write_escaped(f, s),
            Value::Blob(b) => write!(f, "{{{}}}", hex::encode(b)),
            Value::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl FromStr for Value {
    type Err = TwiddleError;

    fn from_str(s: &str) -> Result<Self> {
        parse_text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        let value = parse_text("7 -3 1.5 2e3 hello \"two words\"").expect("parse");
        assert_eq!(
            value,
            Value::List(vec![
                Value::Int32(7),
                Value::Int32(-3),
                Value::Float64(1.5),
                Value::Float64(2000.0),
                Value::string("hello"),
                Value::string("two words"),
            ])
        );
    }

    #[test]
    fn test_parse_vocab_blob_and_nesting() {
        let value = parse_text("[mat] {0aff} (1, (2 3))").expect("parse");
        assert_eq!(
            value,
            Value::List(vec![
                Value::vocab("mat"),
                Value::Blob(vec![0x0a, 0xff]),
                Value::List(vec![Value::Int32(1), Value::int32_list(&[2, 3])]),
            ])
        );
    }

    #[test]
    fn test_large_integer_is_int64() {
        let value = parse_text("5000000000").expect("parse");
        assert_eq!(value.get(0), Some(&Value::Int64(5_000_000_000)));
    }

    #[test]
    fn test_word_with_digits_is_string() {
        let value = parse_text("32FC1 rgb8").expect("parse");
        assert_eq!(value.get(0).and_then(Value::as_str), Some("32FC1"));
        assert_eq!(value.get(1).and_then(Value::as_str), Some("rgb8"));
    }

    #[test]
    fn test_long_vocab_rejected() {
        assert!(parse_text("[toolong]").is_err());
    }

    #[test]
    fn test_unbalanced_list_rejected() {
        assert!(parse_text("(1 2").is_err());
    }

    #[test]
    fn test_invalid_utf8_string_reads_back() {
        let value = Value::List(vec![Value::String(vec![b'a', 0xff, 0xfe, b'"'])]);
        let text = value.to_string();
        assert_eq!(text, "(\"a\\xff\\xfe\\\"\")");
        let back: Value = text.parse().expect("parse");
        assert_eq!(back, Value::List(vec![value]));
        assert!(parse_text("\"\\xzz\"").is_err());
    }

    #[test]
    fn test_display_reads_back() {
        let value = Value::List(vec![
            Value::Int32(7),
            Value::Float64(1.0),
            Value::string("say \"hi\"\n"),
            Value::vocab("rgb"),
            Value::Blob(vec![1, 2, 255]),
            Value::int32_list(&[1, 2]),
        ]);
        let text = value.to_string();
        assert_eq!(text, "(7 1.0 \"say \\\"hi\\\"\\n\" [rgb] {0102ff} (1 2))");
        let back: Value = text.parse().expect("parse");
        assert_eq!(back, Value::List(vec![value]));
    }
}
