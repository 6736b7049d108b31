// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Round-trip tests: encode with the write transcoder, decode with the
//! stream reader, through the same compiled layout.

mod common;

use common::{words, ChunkedReader, Wire};
use wirerep::tagged::{encode, TaggedWriter};
use wirerep::twiddle::TwiddleWriter;
use wirerep::{template_grammar, Layout, Value, WireTwiddler};

fn round_trip(grammar: &str, value: &Value) -> Vec<u8> {
    let twiddler = WireTwiddler::from_grammar(grammar).expect("compile");
    let wire = twiddler.write(value).expect("encode");
    let back = twiddler.read(&wire).expect("decode");
    assert_eq!(&back, value, "grammar: {grammar}");
    wire
}

// ============================================================================
// Exact Bytes
// ============================================================================

#[test]
fn test_example_message_bytes() {
    let layout = Layout::compile("list 2 int32 * vector int32 3 *").expect("compile");
    let value = Value::List(vec![Value::Int32(7), Value::int32_list(&[1, 2, 3])]);

    // The template plus payload is exactly the tagged serialization
    let tagged = encode(&value).expect("serialize");
    assert_eq!(
        tagged,
        words(&[256, 2, 1, 7, 256 | 1, 3, 1, 2, 3])
    );

    let mut serializer = TaggedWriter::new();
    serializer.write(&value).expect("serialize");
    let blocks = serializer.finish();
    let mut writer = TwiddleWriter::new(&layout, &blocks);
    assert!(writer.update());
    assert_eq!(writer.to_vec(), words(&[7, 1, 2, 3]));

    let twiddler = WireTwiddler::new(layout.into());
    let wire = words(&[7, 1, 2, 3]);
    let mut reader = twiddler.reader(&wire[..]);
    let mut stream = Vec::new();
    std::io::Read::read_to_end(&mut reader, &mut stream).expect("stream");
    assert_eq!(stream, tagged);
}

// ============================================================================
// Shapes
// ============================================================================

#[test]
fn test_scalars() {
    let value = Value::List(vec![
        Value::Int8(-3),
        Value::Int16(1000),
        Value::Int32(-70000),
        Value::Int64(1 << 40),
        Value::Float32(1.5),
        Value::Float64(-0.125),
        Value::vocab("mono"),
    ]);
    let wire = round_trip(
        "list 7 int8 * int16 * int32 * int64 * float32 * float64 * vocab *",
        &value,
    );
    assert_eq!(wire.len(), 1 + 2 + 4 + 8 + 4 + 8 + 4);
}

#[test]
fn test_strings_and_blobs() {
    let value = Value::List(vec![
        Value::string("base_link"),
        Value::string(""),
        Value::Blob(vec![0, 1, 2, 254, 255]),
    ]);
    let wire = round_trip("list 3 string * string * blob *", &value);
    assert_eq!(wire.len(), 4 + 9 + 4 + 4 + 5);
}

#[test]
fn test_non_utf8_string_bytes_preserved() {
    let twiddler = WireTwiddler::from_grammar("list 2 int32 * string *").expect("compile");
    let wire = Wire::new().i32(5).i32(2).raw(&[0xff, 0xfe]).build();
    let value = twiddler.read(&wire).expect("decode");
    assert_eq!(
        value,
        Value::List(vec![Value::Int32(5), Value::String(vec![0xff, 0xfe])])
    );
    assert_eq!(twiddler.write(&value).expect("encode"), wire);
}

#[test]
fn test_variable_and_fixed_vectors() {
    let value = Value::List(vec![
        Value::float64_list(&[0.5, 1.5, 2.5]),
        Value::int32_list(&[9, 8]),
        Value::List(vec![Value::string("a"), Value::string("bc")]),
    ]);
    let wire = round_trip(
        "list 3 vector float64 * vector int32 2 * vector string *",
        &value,
    );
    assert_eq!(wire.len(), (4 + 24) + 8 + (4 + 4 + 1 + 4 + 2));
}

#[test]
fn test_nested_lists() {
    let value = Value::List(vec![
        Value::string("pose"),
        Value::List(vec![
            Value::float64_list(&[1.0, 2.0, 3.0]),
            Value::float64_list(&[0.0, 0.0, 0.0, 1.0]),
        ]),
    ]);
    let wire = round_trip(
        "list 2 string * list 2 vector float64 3 * vector float64 4 *",
        &value,
    );
    assert_eq!(wire.len(), 4 + 4 + 7 * 8);
}

#[test]
fn test_item_vector_of_structs() {
    // One point whose three float64 items carry no tags of their own
    let grammar = "item_vector float64 3 item * item * item *";
    let value = Value::List(vec![Value::float64_list(&[1.0, 2.0, 3.0])]);
    let layout = Layout::compile(grammar).expect("compile");
    assert_eq!(layout.gaps().len(), 3);
    let twiddler = WireTwiddler::from_grammar(&format!("list 1 {grammar}")).expect("compile");
    let wire = twiddler.write(&value).expect("encode");
    assert_eq!(wire.len(), 24);
    assert_eq!(twiddler.read(&wire).expect("decode"), value);
}

#[test]
fn test_auto_wrapped_fields() {
    let value = Value::List(vec![Value::string("frame"), Value::Int64(42)]);
    let wire = round_trip("string * int64 *", &value);
    assert_eq!(wire.len(), 4 + 5 + 8);
}

#[test]
fn test_template_grammar_round_trips() {
    let value = Value::List(vec![
        Value::Int32(3),
        Value::string("label"),
        Value::float64_list(&[0.25, 0.75]),
        Value::List(vec![Value::Int32(1), Value::string("x")]),
    ]);
    let grammar = template_grammar(&value);
    round_trip(&grammar, &value);
}

// ============================================================================
// Conversions
// ============================================================================

#[test]
fn test_narrowed_floats_keep_float32_precision() {
    let twiddler = WireTwiddler::from_grammar("list 2 float64:4 * vector float64 *").expect("compile");
    let value = Value::List(vec![
        Value::Float64(0.1),
        Value::float64_list(&[1.0]),
    ]);
    let wire = twiddler.write(&value).expect("encode");
    assert_eq!(wire.len(), 4 + 4 + 8);
    let back = twiddler.read(&wire).expect("decode");
    assert_eq!(back.get(0), Some(&Value::Float64(f64::from(0.1f32))));
    assert_eq!(back.get(1), value.get(1));
}

#[test]
fn test_padded_integers() {
    let value = Value::List(vec![Value::Int16(-5), Value::Int32(123_456)]);
    let twiddler = WireTwiddler::from_grammar("list 2 int16:4 * int32:8 *").expect("compile");
    let wire = twiddler.write(&value).expect("encode");
    assert_eq!(wire.len(), 12);
    assert_eq!(&wire[..4], &(-5i32).to_le_bytes());
    assert_eq!(&wire[4..], &123_456i64.to_le_bytes());
    assert_eq!(twiddler.read(&wire).expect("decode"), value);
}

#[test]
fn test_unsigned_padding_zero_fills() {
    let value = Value::List(vec![Value::Int16(40000u16 as i16), Value::Int32(1)]);
    let twiddler = WireTwiddler::from_grammar("list 2 uint16:4 * int32 *").expect("compile");
    let wire = twiddler.write(&value).expect("encode");
    assert_eq!(wire, Wire::new().i32(40000).i32(1).build());
    assert_eq!(twiddler.read(&wire).expect("decode"), value);

    let bytes = WireTwiddler::from_grammar("list 1 vector uint8:2 *").expect("compile");
    let value = Value::List(vec![Value::List(vec![Value::Int8(-1), Value::Int8(3)])]);
    let wire = bytes.write(&value).expect("encode");
    assert_eq!(wire, [2, 0, 0, 0, 0xff, 0x00, 0x03, 0x00]);
    assert_eq!(bytes.read(&wire).expect("decode"), value);
}

// ============================================================================
// Shared Layouts
// ============================================================================

#[test]
fn test_layout_shared_across_threads() {
    let twiddler = WireTwiddler::from_grammar("list 2 int32 * string *").expect("compile");
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let twiddler = twiddler.clone();
            std::thread::spawn(move || {
                let value = Value::List(vec![Value::Int32(i), Value::string(format!("t{i}"))]);
                let wire = twiddler.write(&value).expect("encode");
                let back = twiddler
                    .read_from(ChunkedReader::new(&wire, 3))
                    .expect("decode");
                assert_eq!(back, value);
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }
}
