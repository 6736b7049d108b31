// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Transcoding between tagged-list bytes and external layouts.
//!
//! - [`TwiddleReader`] decodes external bytes into a tagged-list stream
//! - [`TwiddleWriter`] encodes a buffered tagged-list message into external bytes
//! - [`PropertyBag`] carries saved and computed values within one message
//! - [`WireTwiddler`] bundles a compiled layout with both directions

pub mod props;
pub mod reader;
pub mod writer;

pub use props::{PropValue, PropertyBag};
pub use reader::TwiddleReader;
pub use writer::{Segment, TwiddleWriter};

use std::io::{Read, Write};
use std::sync::Arc;

use crate::core::{Result, TwiddleError, Value};
use crate::layout::Layout;
use crate::tagged::TaggedWriter;

/// Filler for the high bytes of a padded integer whose low bytes are
/// `kept`: the sign of the top kept byte for signed fields, zero otherwise.
pub(crate) fn pad_byte(kept: &[u8], signed: bool) -> u8 {
    match kept.last() {
        Some(&top) if signed && top & 0x80 != 0 => 0xff,
        _ => 0,
    }
}

/// A compiled layout ready to transcode messages in both directions.
///
/// The layout is shared; each call builds its own reader or writer, so one
/// `WireTwiddler` can serve any number of connections.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use wirerep::{Value, WireTwiddler};
///
/// let twiddler = WireTwiddler::from_grammar("list 2 int32 * vector int32 3 *")?;
/// let value = Value::List(vec![Value::Int32(7), Value::int32_list(&[1, 2, 3])]);
/// let wire = twiddler.write(&value)?;
/// assert_eq!(wire.len(), 16);
/// assert_eq!(twiddler.read(&wire)?, value);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WireTwiddler {
    layout: Arc<Layout>,
}

impl WireTwiddler {
    pub fn new(layout: Arc<Layout>) -> Self {
        Self { layout }
    }

    /// Compile the first section of `grammar`.
    pub fn from_grammar(grammar: &str) -> Result<Self> {
        Ok(Self::new(Arc::new(Layout::compile(grammar)?)))
    }

    pub fn layout(&self) -> &Arc<Layout> {
        &self.layout
    }

    /// A streaming decoder over `inner`.
    pub fn reader<R: Read>(&self, inner: R) -> TwiddleReader<'_, R> {
        TwiddleReader::new(&self.layout, inner)
    }

    /// Decode one message held entirely in `bytes`.
    ///
    /// Every byte must belong to the message.
    pub fn read(&self, bytes: &[u8]) -> Result<Value> {
        let mut reader = self.reader(bytes);
        let value = reader.read_value()?;
        let rest = reader.get_ref().len();
        if rest != 0 {
            return Err(TwiddleError::parse(
                "external message",
                format!("{rest} bytes after the last field"),
            ));
        }
        Ok(value)
    }

    /// Decode one message from a stream, leaving later bytes unread.
    pub fn read_from<R: Read>(&self, inner: R) -> Result<Value> {
        self.reader(inner).read_value()
    }

    /// Encode `value` into its external form.
    pub fn write(&self, value: &Value) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(value, &mut out)?;
        Ok(out)
    }

    /// Encode `value` and flush it to `out`.
    ///
    /// Nothing is written when the value does not match the layout.
    pub fn write_to<W: Write + ?Sized>(&self, value: &Value, out: &mut W) -> Result<()> {
        let mut tagged = TaggedWriter::new();
        tagged.write(value)?;
        let blocks = tagged.finish();

        let mut writer = TwiddleWriter::new(&self.layout, &blocks);
        if !writer.update() {
            return Err(writer.error().cloned().unwrap_or_else(|| {
                TwiddleError::parse("tagged message", "does not match the layout")
            }));
        }
        writer
            .write_to(out)
            .map_err(|e| TwiddleError::from_io(e, "external sink"))
    }
}
