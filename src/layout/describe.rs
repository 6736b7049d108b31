// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Human-readable views of layouts, and grammar derivation from sample values.

use std::fmt;

use crate::core::Value;
use crate::layout::{Count, Flavor, Gap, Layout, UnitSize};

impl Gap {
    /// What this gap expects on the external wire.
    fn wire_summary(&self) -> Option<String> {
        if !self.has_payload() {
            return None;
        }
        let summary = match (self.count, self.wire_unit()) {
            (Count::FromWire, UnitSize::Variable) => "[4-byte length] [<length> instances of 4-byte-length bytes followed by specified number of bytes]".to_string(),
            (Count::FromWire, UnitSize::Fixed(unit)) => {
                format!("[4-byte length] [<length>*{unit} bytes]")
            }
            (Count::Fixed(1), UnitSize::Variable) => "[4-byte length] [<length> bytes]".to_string(),
            (Count::Fixed(n), UnitSize::Variable) => {
                format!("[{n} instances of 4-byte-length bytes followed by specified number of bytes]")
            }
            (Count::Fixed(1), UnitSize::Fixed(unit)) => format!("[{unit} bytes]"),
            (Count::Fixed(n), UnitSize::Fixed(unit)) => format!("[{n}*{unit} bytes]"),
        };
        Some(summary)
    }
}

impl Layout {
    /// One-line description of every gap and the external bytes it expects.
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use wirerep::layout::Layout;
    ///
    /// let layout = Layout::compile("list 2 int32 * vector float64 *")?;
    /// assert_eq!(
    ///     layout.describe(),
    ///     "int32 * [4 bytes] vector float64 * [4-byte length] [<length>*8 bytes]"
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub fn describe(&self) -> String {
        self.gaps()
            .iter()
            .filter_map(|gap| {
                let summary = gap.wire_summary();
                match (gap.origin().is_empty(), summary) {
                    (true, None) => None,
                    (true, Some(s)) => Some(s),
                    (false, None) => Some(gap.origin().to_string()),
                    (false, Some(s)) => Some(format!("{} {s}", gap.origin())),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, gap) in self.gaps().iter().enumerate() {
            writeln!(f, "Block #{i} ({})", gap.origin())?;
            let range = gap.template_range();
            if !range.is_empty() {
                writeln!(f, "  Template bytes {}..{}", range.start, range.end)?;
            }
            if gap.is_computed() {
                writeln!(f, "  Computes {}", gap.bound_name().unwrap_or_default())?;
            } else if gap.ignores_external() {
                writeln!(f, "  External data will be ignored")?;
                if let Some(name) = gap.bound_name() {
                    writeln!(f, "  Saved as '{name}'")?;
                }
            } else if gap.loads_external() {
                writeln!(f, "  Loaded from '{}'", gap.bound_name().unwrap_or_default())?;
            } else if let Some(summary) = gap.wire_summary() {
                writeln!(f, "  Expect {summary}")?;
            }
        }
        Ok(())
    }
}

/// Derive a grammar that describes `value` as the tagged-list serializer
/// writes it.
///
/// Homogeneous lists of primitives become fixed-length vectors, anything
/// else a `list` with one field per item.
///
/// ```
/// use wirerep::layout::template_grammar;
/// use wirerep::Value;
///
/// let value = Value::List(vec![Value::Int32(7), Value::int32_list(&[1, 2, 3])]);
/// assert_eq!(template_grammar(&value), "list 2 int32 * vector int32 3 *");
/// ```
pub fn template_grammar(value: &Value) -> String {
    let mut out = Vec::new();
    push_template(value, &mut out);
    out.join(" ")
}

fn push_template(value: &Value, out: &mut Vec<String>) {
    let Value::List(items) = value else {
        out.push(scalar_keyword(value).to_string());
        out.push("*".to_string());
        return;
    };
    let shared = Flavor::from_tag(Value::specialization(items));
    match shared {
        Some(flavor) => {
            out.push(format!("vector {flavor} {}", items.len()));
            out.push("*".to_string());
        }
        None => {
            out.push(format!("list {}", items.len()));
            for item in items {
                push_template(item, out);
            }
        }
    }
}

fn scalar_keyword(value: &Value) -> &'static str {
    Flavor::from_tag(value.code()).map_or("blob", Flavor::name)
}
