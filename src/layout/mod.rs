// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Compiled wire layouts.
//!
//! A layout grammar such as `list 2 int32 * vector int32 3 *` is compiled
//! once into a [`Layout`]: an ordered list of [`Gap`]s plus a template buffer
//! holding the tag words the tagged-list format needs around the external
//! payload. Each gap owns a slice of the template and describes the external
//! data that follows it.
//!
//! Layouts are immutable after compilation and are shared by reference (or
//! behind an `Arc`) between any number of transcoding sessions.

mod compiler;
mod describe;

use std::fmt;
use std::ops::Range;

use serde::Serialize;

use crate::core::Result;
use crate::tagged::{
    TAG_BLOB, TAG_FLOAT32, TAG_FLOAT64, TAG_INT16, TAG_INT32, TAG_INT64, TAG_INT8, TAG_STRING,
    TAG_VOCAB32,
};

pub use describe::template_grammar;

/// Primitive kind of a layout field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Vocab,
    String,
    Blob,
}

impl Flavor {
    /// Resolve a grammar type keyword. Unsigned and boolean spellings map to
    /// the signed kind of the same width.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "int8" | "uint8" | "bool" => Flavor::Int8,
            "int16" | "uint16" => Flavor::Int16,
            "int32" | "uint32" => Flavor::Int32,
            "int64" | "uint64" => Flavor::Int64,
            "float32" => Flavor::Float32,
            "float64" => Flavor::Float64,
            "vocab" => Flavor::Vocab,
            "string" => Flavor::String,
            "blob" => Flavor::Blob,
            _ => return None,
        })
    }

    /// Map a primitive tag word back to its kind.
    pub fn from_tag(tag: i32) -> Option<Self> {
        Some(match tag {
            TAG_INT8 => Flavor::Int8,
            TAG_INT16 => Flavor::Int16,
            TAG_INT32 => Flavor::Int32,
            TAG_INT64 => Flavor::Int64,
            TAG_FLOAT32 => Flavor::Float32,
            TAG_FLOAT64 => Flavor::Float64,
            TAG_VOCAB32 => Flavor::Vocab,
            TAG_STRING => Flavor::String,
            TAG_BLOB => Flavor::Blob,
            _ => return None,
        })
    }

    /// Tag word of this kind in the tagged-list format.
    pub fn tag(self) -> i32 {
        match self {
            Flavor::Int8 => TAG_INT8,
            Flavor::Int16 => TAG_INT16,
            Flavor::Int32 => TAG_INT32,
            Flavor::Int64 => TAG_INT64,
            Flavor::Float32 => TAG_FLOAT32,
            Flavor::Float64 => TAG_FLOAT64,
            Flavor::Vocab => TAG_VOCAB32,
            Flavor::String => TAG_STRING,
            Flavor::Blob => TAG_BLOB,
        }
    }

    /// Size of one element in the tagged-list format.
    pub fn unit(self) -> UnitSize {
        match self {
            Flavor::Int8 => UnitSize::Fixed(1),
            Flavor::Int16 => UnitSize::Fixed(2),
            Flavor::Int32 | Flavor::Float32 | Flavor::Vocab => UnitSize::Fixed(4),
            Flavor::Int64 | Flavor::Float64 => UnitSize::Fixed(8),
            Flavor::String | Flavor::Blob => UnitSize::Variable,
        }
    }

    /// Canonical grammar keyword.
    pub fn name(self) -> &'static str {
        match self {
            Flavor::Int8 => "int8",
            Flavor::Int16 => "int16",
            Flavor::Int32 => "int32",
            Flavor::Int64 => "int64",
            Flavor::Float32 => "float32",
            Flavor::Float64 => "float64",
            Flavor::Vocab => "vocab",
            Flavor::String => "string",
            Flavor::Blob => "blob",
        }
    }

    /// Whether a type keyword names an unsigned integer.
    pub fn is_unsigned_keyword(keyword: &str) -> bool {
        matches!(keyword, "uint8" | "uint16" | "uint32" | "uint64" | "bool")
    }

    /// Whether values of this kind are two's complement integers.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Flavor::Int8 | Flavor::Int16 | Flavor::Int32 | Flavor::Int64 | Flavor::Vocab
        )
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named derivation run by a `compute` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    /// Image geometry from saved `width`, `height`, `step`, `is_bigendian`
    /// and `encoding` properties
    ImageParams,
}

impl Derivation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "image_params" => Some(Derivation::ImageParams),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Derivation::ImageParams => "image_params",
        }
    }
}

/// Number of elements in a gap's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Count {
    /// Known when the layout is compiled
    Fixed(usize),
    /// Read from a 4-byte length prefix on the wire
    FromWire,
}

/// Size of one payload element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSize {
    /// Fixed number of bytes (zero for gaps without payload)
    Fixed(usize),
    /// Each element carries its own 4-byte length prefix
    Variable,
}

/// How one element changes between the tagged and the external form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Conversion {
    /// Same bytes on both sides
    Identity,
    /// Tagged float64 carried as a 4-byte float externally
    NarrowFloat64,
    /// Integer carried in `wire` bytes externally, sign-extended for signed
    /// keywords and zero-filled for `uint*` and `bool`
    Pad {
        /// External element size
        wire: usize,
        signed: bool,
    },
}

/// One contiguous piece of a compiled layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gap {
    pub(crate) template: Range<usize>,
    pub(crate) count: Count,
    pub(crate) unit: UnitSize,
    pub(crate) flavor: Option<Flavor>,
    pub(crate) conversion: Conversion,
    pub(crate) ignore_external: bool,
    pub(crate) save_external: bool,
    pub(crate) load_external: bool,
    pub(crate) computed: bool,
    pub(crate) derivation: Option<Derivation>,
    pub(crate) origin: String,
    pub(crate) bound_name: Option<String>,
    pub(crate) literal: Option<i64>,
}

impl Gap {
    /// A gap that only carries template bytes.
    pub(crate) fn header(template: Range<usize>) -> Self {
        Self {
            template,
            count: Count::Fixed(0),
            unit: UnitSize::Fixed(0),
            flavor: None,
            conversion: Conversion::Identity,
            ignore_external: false,
            save_external: false,
            load_external: false,
            computed: false,
            derivation: None,
            origin: String::new(),
            bound_name: None,
            literal: None,
        }
    }

    /// Byte range of this gap's tag words in the layout template.
    #[inline]
    pub fn template_range(&self) -> Range<usize> {
        self.template.clone()
    }

    #[inline]
    pub fn count(&self) -> Count {
        self.count
    }

    /// Element size in the tagged-list format.
    #[inline]
    pub fn unit(&self) -> UnitSize {
        self.unit
    }

    /// Element size on the external wire.
    pub fn wire_unit(&self) -> UnitSize {
        match (self.unit, self.conversion) {
            (UnitSize::Fixed(_), Conversion::NarrowFloat64) => UnitSize::Fixed(4),
            (UnitSize::Fixed(_), Conversion::Pad { wire, .. }) => UnitSize::Fixed(wire),
            (unit, _) => unit,
        }
    }

    #[inline]
    pub fn flavor(&self) -> Option<Flavor> {
        self.flavor
    }

    #[inline]
    pub fn conversion(&self) -> Conversion {
        self.conversion
    }

    /// The field exists only on the external wire (`skip`, `>save`, `compute`).
    #[inline]
    pub fn ignores_external(&self) -> bool {
        self.ignore_external
    }

    #[inline]
    pub fn saves_external(&self) -> bool {
        self.save_external
    }

    #[inline]
    pub fn loads_external(&self) -> bool {
        self.load_external
    }

    #[inline]
    pub fn is_computed(&self) -> bool {
        self.computed
    }

    /// Derivation of a `compute` gap.
    #[inline]
    pub fn derivation(&self) -> Option<Derivation> {
        self.derivation
    }

    /// Grammar text that produced this gap.
    #[inline]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Property name of a save, load or compute directive.
    pub fn bound_name(&self) -> Option<&str> {
        self.bound_name.as_deref()
    }

    /// Inline value of a `<=literal` load.
    #[inline]
    pub fn literal(&self) -> Option<i64> {
        self.literal
    }

    /// Whether the gap describes external data (as opposed to template
    /// bytes or a derivation only).
    pub fn has_payload(&self) -> bool {
        !self.computed && self.unit != UnitSize::Fixed(0)
    }
}

/// A compiled layout grammar.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use wirerep::layout::{Count, Layout};
///
/// let layout = Layout::compile("list 2 int32 * vector int32 *")?;
/// assert_eq!(layout.gaps().len(), 2);
/// assert_eq!(layout.gaps()[1].count(), Count::FromWire);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    gaps: Vec<Gap>,
    #[serde(skip)]
    template: Vec<u8>,
    grammar: String,
}

impl Layout {
    /// Compile the first section of a grammar (up to any `---`).
    pub fn compile(grammar: &str) -> Result<Self> {
        let mut sections = compiler::compile(grammar)?;
        Ok(sections.swap_remove(0))
    }

    /// Compile every `---` separated section of a grammar.
    ///
    /// Request/reply pairs are written as `request --- reply`.
    pub fn compile_sections(grammar: &str) -> Result<Vec<Self>> {
        compiler::compile(grammar)
    }

    pub(crate) fn from_parts(gaps: Vec<Gap>, template: Vec<u8>, grammar: String) -> Self {
        Self {
            gaps,
            template,
            grammar,
        }
    }

    #[inline]
    pub fn gaps(&self) -> &[Gap] {
        &self.gaps
    }

    /// The full template buffer of tag words.
    #[inline]
    pub fn template(&self) -> &[u8] {
        &self.template
    }

    /// Template bytes owned by one gap.
    #[inline]
    pub fn gap_template(&self, gap: &Gap) -> &[u8] {
        &self.template[gap.template.clone()]
    }

    /// Grammar text of this section.
    #[inline]
    pub fn grammar(&self) -> &str {
        &self.grammar
    }
}
