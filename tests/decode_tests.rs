// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Decode-path tests: chunking independence, directives and stream errors.

mod common;

use std::io::Read;

use common::{read_bytewise, ChunkedReader, Wire};
use wirerep::tagged::{decode, encode_vocab, TaggedReader};
use wirerep::{Layout, PropValue, TwiddleError, TwiddleReader, Value, WireTwiddler};

const IMAGE_GRAMMAR: &str = ">height int32 * >width int32 * >encoding string * \
     >is_bigendian int8 * >step int32 * compute image_params \
     list 5 <translated_encoding vocab * <depth int32 * <img_size int32 * <quantum int32 * blob *";

fn image_wire(width: i32, height: i32, step: i32, encoding: &str) -> Vec<u8> {
    let pixels: Vec<u8> = (0..step * height).map(|i| i as u8).collect();
    Wire::new()
        .i32(height)
        .i32(width)
        .text(encoding)
        .i8(0)
        .i32(step)
        .i32(pixels.len() as i32)
        .raw(&pixels)
        .build()
}

// ============================================================================
// Chunking
// ============================================================================

#[test]
fn test_chunk_size_does_not_change_output() {
    let layout = Layout::compile(
        "list 5 string * float64:4 * vector int16 * int8:4 * vector string *",
    )
    .expect("compile");
    let wire = Wire::new()
        .text("camera")
        .f32(2.5)
        .i32(3)
        .i16(1)
        .i16(-2)
        .i16(3)
        .raw(&(-7i32).to_le_bytes())
        .i32(2)
        .text("x")
        .text("yz")
        .build();

    let mut whole = Vec::new();
    TwiddleReader::new(&layout, &wire[..])
        .read_to_end(&mut whole)
        .expect("whole");

    for chunk in 1..=7 {
        let reader = TwiddleReader::new(&layout, ChunkedReader::new(&wire, chunk));
        let bytes = read_bytewise(reader).expect("bytewise");
        assert_eq!(bytes, whole, "chunk size {chunk}");
    }

    let value = decode(&whole).expect("tagged");
    assert_eq!(
        value,
        Value::List(vec![
            Value::string("camera"),
            Value::Float64(2.5),
            Value::List(vec![Value::Int16(1), Value::Int16(-2), Value::Int16(3)]),
            Value::Int8(-7),
            Value::List(vec![Value::string("x"), Value::string("yz")]),
        ])
    );
}

#[test]
fn test_reader_feeds_tagged_parser() {
    let layout = Layout::compile("list 2 int64 * blob *").expect("compile");
    let wire = Wire::new().i64(-1).text("\u{1}\u{2}").build();
    let reader = TwiddleReader::new(&layout, ChunkedReader::new(&wire, 1));
    let mut parser = TaggedReader::new(reader);
    let value = parser.read_value().expect("parse");
    assert_eq!(
        value,
        Value::List(vec![Value::Int64(-1), Value::Blob(vec![1, 2])])
    );
    assert!(parser.get_ref().is_ok());
}

#[test]
fn test_back_to_back_messages() {
    let twiddler = WireTwiddler::from_grammar("list 2 int32 * string *").expect("compile");
    let wire = Wire::new()
        .i32(1)
        .text("a")
        .i32(2)
        .text("bb")
        .build();
    let mut source = ChunkedReader::new(&wire, 2);
    let first = twiddler.read_from(&mut source).expect("first");
    let second = twiddler.read_from(&mut source).expect("second");
    assert_eq!(first, Value::List(vec![Value::Int32(1), Value::string("a")]));
    assert_eq!(second, Value::List(vec![Value::Int32(2), Value::string("bb")]));
    assert_eq!(source.remaining(), 0);
}

// ============================================================================
// Directives
// ============================================================================

#[test]
fn test_skipped_fields_are_invisible() {
    let twiddler = WireTwiddler::from_grammar(
        "skip int32 * list 2 skip string * int32 * skip vector float64 * string * skip list 2 int8 * int8 *",
    )
    .expect("compile");
    let wire = Wire::new()
        .i32(99)
        .text("ignored")
        .i32(5)
        .i32(2)
        .f64(1.0)
        .f64(2.0)
        .text("kept")
        .i8(1)
        .i8(2)
        .build();
    assert_eq!(
        twiddler.read(&wire).expect("decode"),
        Value::List(vec![Value::Int32(5), Value::string("kept")])
    );

    // Nothing is emitted for them on encode either
    let out = twiddler
        .write(&Value::List(vec![Value::Int32(5), Value::string("kept")]))
        .expect("encode");
    assert_eq!(out, Wire::new().i32(5).text("kept").build());
}

#[test]
fn test_image_params_rgb8() {
    let twiddler = WireTwiddler::from_grammar(IMAGE_GRAMMAR).expect("compile");
    let wire = image_wire(5, 2, 16, "rgb8");
    let mut reader = twiddler.reader(ChunkedReader::new(&wire, 5));
    let value = reader.read_value().expect("decode");

    let items = value.as_list().expect("list");
    assert_eq!(items.len(), 5);
    assert_eq!(items[0], Value::Vocab(encode_vocab("rgb")));
    assert_eq!(items[1], Value::Int32(3));
    assert_eq!(items[2], Value::Int32(32));
    assert_eq!(items[3], Value::Int32(2));
    assert!(matches!(&items[4], Value::Blob(b) if b.len() == 32));

    let props = reader.properties();
    assert_eq!(props.get_int("width"), Some(5));
    assert_eq!(props.get_text("encoding").as_deref(), Some("rgb8"));
    assert_eq!(props.get_int("is_bigendian"), Some(0));
}

#[test]
fn test_image_params_mono16_and_float() {
    let twiddler = WireTwiddler::from_grammar(IMAGE_GRAMMAR).expect("compile");

    let value = twiddler.read(&image_wire(3, 4, 8, "mono16")).expect("mono16");
    assert_eq!(value.get(0), Some(&Value::Vocab(encode_vocab("mo16"))));
    assert_eq!(value.get(1), Some(&Value::Int32(2)));
    assert_eq!(value.get(2), Some(&Value::Int32(32)));
    assert_eq!(value.get(3), Some(&Value::Int32(4)));

    let value = twiddler.read(&image_wire(2, 3, 8, "32FC1")).expect("32FC1");
    assert_eq!(value.get(0), Some(&Value::Vocab(encode_vocab("dec"))));
    assert_eq!(value.get(1), Some(&Value::Int32(4)));
    assert_eq!(value.get(2), Some(&Value::Int32(24)));
    assert_eq!(value.get(3), Some(&Value::Int32(1)));
}

#[test]
fn test_image_params_unknown_encoding() {
    let twiddler = WireTwiddler::from_grammar(IMAGE_GRAMMAR).expect("compile");
    let err = twiddler
        .read(&image_wire(2, 2, 6, "yuv422"))
        .expect_err("unsupported");
    assert!(
        matches!(err, TwiddleError::UnsupportedEncoding { ref encoding, .. } if encoding == "yuv422"),
        "{err}"
    );
}

#[test]
fn test_literal_and_seeded_loads() {
    let twiddler =
        WireTwiddler::from_grammar("list 3 <=[mat] vocab * <=-2 int16 * <seq int64 *").expect("compile");

    let mut reader = twiddler.reader(&[0u8; 0][..]);
    reader.properties_mut().put("seq", PropValue::Int(41));
    let value = reader.read_value().expect("decode");
    assert_eq!(
        value,
        Value::List(vec![
            Value::vocab("mat"),
            Value::Int16(-2),
            Value::Int64(41),
        ])
    );

    let err = twiddler.read(&[]).expect_err("unseeded");
    assert!(matches!(err, TwiddleError::MissingProperty { ref name, .. } if name == "seq"));
}

#[test]
fn test_saved_small_integers_sign_extend() {
    let twiddler = WireTwiddler::from_grammar(">a int8 * >b int16:4 * list 2 <a int32 * <b int64 *")
        .expect("compile");
    let wire = Wire::new().i8(-3).i32(-300).build();
    assert_eq!(
        twiddler.read(&wire).expect("decode"),
        Value::List(vec![Value::Int32(-3), Value::Int64(-300)])
    );
}

// ============================================================================
// Stream Errors
// ============================================================================

#[test]
fn test_truncated_length_prefix() {
    let twiddler = WireTwiddler::from_grammar("list 2 int32 * string *").expect("compile");
    let wire = Wire::new().i32(1).i16(5).build();
    let err = twiddler.read(&wire).expect_err("truncated");
    assert_eq!(err, TwiddleError::stream_exhausted("string *", 2));
}

#[test]
fn test_truncated_payload_never_zero_filled() {
    let twiddler = WireTwiddler::from_grammar("list 1 vector int32 *").expect("compile");
    let wire = Wire::new().i32(3).i32(1).i32(2).build();
    let err = twiddler.read(&wire).expect_err("truncated");
    assert!(matches!(err, TwiddleError::StreamExhausted { .. }), "{err}");

    let mut reader = twiddler.reader(&wire[..]);
    let mut sink = Vec::new();
    assert!(reader.read_to_end(&mut sink).is_err());
    assert!(!reader.is_ok());
    // The error sticks
    assert!(reader.read(&mut [0u8; 4]).is_err());
}

#[test]
fn test_padded_value_out_of_range() {
    let twiddler = WireTwiddler::from_grammar("list 2 int16:4 * int32 *").expect("compile");
    let err = twiddler
        .read(&Wire::new().i32(70000).i32(1).build())
        .expect_err("too wide for int16");
    assert!(matches!(err, TwiddleError::Parse { .. }), "{err}");
    assert_eq!(
        twiddler.read(&Wire::new().i32(-300).i32(1).build()).expect("fits"),
        Value::List(vec![Value::Int16(-300), Value::Int32(1)])
    );

    // Unsigned fields only accept zero high bytes
    let unsigned = WireTwiddler::from_grammar("list 2 uint16:4 * int32 *").expect("compile");
    assert!(unsigned.read(&Wire::new().i32(-1).i32(1).build()).is_err());
    assert_eq!(
        unsigned.read(&Wire::new().i32(65535).i32(1).build()).expect("fits"),
        Value::List(vec![Value::Int16(-1), Value::Int32(1)])
    );
}

#[test]
fn test_negative_length_rejected() {
    let twiddler = WireTwiddler::from_grammar("list 1 blob *").expect("compile");
    let err = twiddler.read(&Wire::new().i32(-4).build()).expect_err("negative");
    assert!(matches!(err, TwiddleError::Parse { .. }), "{err}");
}
