// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Per-message property bag and `compute` derivations.
//!
//! `>name` fields store what they read here, `compute` directives derive new
//! entries from them, and `<name` fields inject entries back into the tagged
//! stream. A bag lives for one message.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::core::{Result, TwiddleError};
use crate::layout::Derivation;
use crate::tagged::encode_vocab;

/// A stored property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    /// Scalar integer (sign-extended from the wire width)
    Int(i64),
    /// Raw bytes of a string, blob or vector field
    Bytes(Vec<u8>),
}

/// String-keyed store of properties for one transcoding session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    entries: HashMap<String, PropValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a property, replacing any previous value.
    pub fn put(&mut self, name: impl Into<String>, value: PropValue) {
        self.entries.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries.get(name)
    }

    /// Integer value of a property, if it holds one.
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.entries.get(name)? {
            PropValue::Int(v) => Some(*v),
            PropValue::Bytes(_) => None,
        }
    }

    /// Text value of a property, if it holds bytes.
    pub fn get_text(&self, name: &str) -> Option<String> {
        match self.entries.get(name)? {
            PropValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            PropValue::Int(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Run a derivation, storing its results in the bag.
    pub fn compute(&mut self, derivation: Derivation) -> Result<()> {
        match derivation {
            Derivation::ImageParams => self.image_params(),
        }
    }

    fn require_int(&self, name: &str) -> Result<i64> {
        self.get_int(name)
            .ok_or_else(|| TwiddleError::missing_property(name, "image_params"))
    }

    /// Image geometry from `width`, `height`, `step`, `is_bigendian` and
    /// `encoding`. Stores `depth` (bytes per pixel), `img_size`, `quantum`
    /// (row alignment) and `translated_encoding` (pixel format vocab).
    fn image_params(&mut self) -> Result<()> {
        let width = self.require_int("width")?;
        let height = self.require_int("height")?;
        let step = self.require_int("step")?;
        let big_endian = self.get_int("is_bigendian").unwrap_or(0) == 1;
        let encoding = self
            .get_text("encoding")
            .ok_or_else(|| TwiddleError::missing_property("encoding", "image_params"))?;
        if big_endian {
            return Err(TwiddleError::unsupported_encoding(
                encoding,
                "big-endian images are not supported",
            ));
        }

        let (bpp, translated) = pixel_format(&encoding)?;
        let geometry = |v: Option<i64>| {
            v.ok_or_else(|| {
                TwiddleError::parse(
                    "image_params",
                    format!("image geometry overflows (width {width}, height {height}, step {step})"),
                )
            })
        };
        let quantum = row_quantum(geometry(width.checked_mul(bpp))?, step);
        let img_size = geometry(step.checked_mul(height))?;
        debug!(
            context = "image_params",
            encoding = %encoding,
            bpp,
            quantum,
            img_size,
            "derived image geometry"
        );

        self.put("depth", PropValue::Int(bpp));
        self.put("img_size", PropValue::Int(img_size));
        self.put("quantum", PropValue::Int(quantum));
        self.put(
            "translated_encoding",
            PropValue::Int(i64::from(encode_vocab(translated))),
        );
        Ok(())
    }
}

/// Bytes per pixel and pixel-format vocab for an image encoding name.
fn pixel_format(encoding: &str) -> Result<(i64, &'static str)> {
    Ok(match encoding {
        "bgr8" => (3, "bgr"),
        "rgb8" => (3, "rgb"),
        "32FC1" => (4, "dec"),
        "16UC1" | "mono16" => (2, "mo16"),
        "mono8" => (1, "mono"),
        "bayer_grbg8" => (1, "grbg"),
        other if other.starts_with("bayer") => {
            warn!(
                context = "image_params",
                encoding = other,
                "automatic debayering not supported, keeping raw format"
            );
            (1, "mono")
        }
        other => {
            return Err(TwiddleError::unsupported_encoding(
                other,
                "no pixel format for this encoding",
            ))
        }
    })
}

/// Smallest power-of-two alignment (2..=512) that pads a row of `row` bytes
/// to `step`; 1 for unpadded rows, `step` when no alignment fits.
fn row_quantum(row: i64, step: i64) -> i64 {
    if step == row {
        return 1;
    }
    let mut quantum = 1;
    while quantum <= 256 {
        quantum *= 2;
        let rounded = row
            .checked_add(quantum - 1)
            .map(|r| r / quantum * quantum);
        if rounded == Some(step) {
            return quantum;
        }
    }
    step
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_bag(width: i64, height: i64, step: i64, encoding: &str) -> PropertyBag {
        let mut bag = PropertyBag::new();
        bag.put("width", PropValue::Int(width));
        bag.put("height", PropValue::Int(height));
        bag.put("step", PropValue::Int(step));
        bag.put("is_bigendian", PropValue::Int(0));
        bag.put("encoding", PropValue::Bytes(encoding.as_bytes().to_vec()));
        bag
    }

    #[test]
    fn test_rgb8_padded_rows() {
        let mut bag = image_bag(5, 2, 16, "rgb8");
        bag.compute(Derivation::ImageParams).expect("compute");
        assert_eq!(bag.get_int("depth"), Some(3));
        assert_eq!(bag.get_int("quantum"), Some(2));
        assert_eq!(bag.get_int("img_size"), Some(32));
        assert_eq!(
            bag.get_int("translated_encoding"),
            Some(i64::from(encode_vocab("rgb")))
        );
    }

    #[test]
    fn test_overflowing_geometry_rejected() {
        let mut bag = image_bag(i64::MAX / 2, 2, 16, "rgb8");
        let err = bag.compute(Derivation::ImageParams).expect_err("row overflows");
        assert!(matches!(err, TwiddleError::Parse { .. }), "{err}");

        let mut bag = image_bag(4, i64::MAX, 16, "mono8");
        assert!(bag.compute(Derivation::ImageParams).is_err());
        assert_eq!(row_quantum(i64::MAX, 16), 16);
    }

    #[test]
    fn test_mono16() {
        let mut bag = image_bag(3, 4, 8, "mono16");
        bag.compute(Derivation::ImageParams).expect("compute");
        assert_eq!(bag.get_int("depth"), Some(2));
        assert_eq!(bag.get_int("quantum"), Some(4));
        assert_eq!(bag.get_int("img_size"), Some(32));
        assert_eq!(
            bag.get_int("translated_encoding"),
            Some(i64::from(encode_vocab("mo16")))
        );
    }

    #[test]
    fn test_float_depth_unpadded() {
        let mut bag = image_bag(2, 3, 8, "32FC1");
        bag.compute(Derivation::ImageParams).expect("compute");
        assert_eq!(bag.get_int("depth"), Some(4));
        assert_eq!(bag.get_int("quantum"), Some(1));
        assert_eq!(bag.get_int("img_size"), Some(24));
    }

    #[test]
    fn test_unaligned_step_falls_back_to_step() {
        assert_eq!(row_quantum(10, 13), 13);
        assert_eq!(row_quantum(10, 32), 32);
        assert_eq!(row_quantum(12, 16), 8);
    }

    #[test]
    fn test_bayer_fallback() {
        let mut bag = image_bag(4, 4, 4, "bayer_rggb8");
        bag.compute(Derivation::ImageParams).expect("compute");
        assert_eq!(
            bag.get_int("translated_encoding"),
            Some(i64::from(encode_vocab("mono")))
        );
        let mut bag = image_bag(4, 4, 4, "bayer_grbg8");
        bag.compute(Derivation::ImageParams).expect("compute");
        assert_eq!(
            bag.get_int("translated_encoding"),
            Some(i64::from(encode_vocab("grbg")))
        );
    }

    #[test]
    fn test_unknown_and_big_endian_rejected() {
        let mut bag = image_bag(4, 4, 12, "yuv422");
        assert!(matches!(
            bag.compute(Derivation::ImageParams),
            Err(TwiddleError::UnsupportedEncoding { .. })
        ));
        let mut bag = image_bag(4, 4, 12, "rgb8");
        bag.put("is_bigendian", PropValue::Int(1));
        assert!(matches!(
            bag.compute(Derivation::ImageParams),
            Err(TwiddleError::UnsupportedEncoding { .. })
        ));
    }

    #[test]
    fn test_missing_property() {
        let mut bag = PropertyBag::new();
        bag.put("width", PropValue::Int(1));
        let err = bag.compute(Derivation::ImageParams).expect_err("missing");
        assert_eq!(err, TwiddleError::missing_property("height", "image_params"));
    }
}
