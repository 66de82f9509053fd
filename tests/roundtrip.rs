//! Round-trip laws over the full kind set, plus decode coercion boundaries.

use bson::{
    doc, from_slice_to, to_vec, Binary, Bson, DateTime, Document, ErrorKind, JavaScript, ObjectId,
    Regex, Symbol, Timestamp, M,
};
use bson::spec::BinarySubtype;
use pretty_assertions::assert_eq;

fn every_kind_document() -> Document {
    doc! {
        "double": -12.3,
        "string": "foo",
        "document": { "x": 1, "y": "nested" },
        "array": ["foobar", -7, Bson::Null, Timestamp(1278), false],
        "binary": Binary { subtype: BinarySubtype::Generic, bytes: vec![3, 222, 11] },
        "user binary": Binary { subtype: BinarySubtype::UserDefined(0x80), bytes: vec![1, 2] },
        "undefined": Bson::Undefined,
        "objectid": ObjectId::from_hex("4d88e15b60f486e428412dc9").unwrap(),
        "bool": true,
        "datetime": DateTime::from_millis(4444333221000),
        "null": Bson::Null,
        "regex": Regex { pattern: "ab+".to_string(), options: "im".to_string() },
        "code": JavaScript { code: "function() {}".to_string(), scope: None },
        "symbol": Symbol("movie".to_string()),
        "code with scope": JavaScript {
            code: "function(x) { return x + y; }".to_string(),
            scope: Some(doc! { "y": -17 }),
        },
        "i32": 12,
        "timestamp": Timestamp(1223334444),
        "i64": -126_i64,
        "min": Bson::MinKey,
        "max": Bson::MaxKey,
    }
}

#[test]
fn every_kind_re_encodes_byte_for_byte() {
    let original = every_kind_document();
    let bytes = to_vec(&original).unwrap();
    let decoded: Document = from_slice_to(&bytes).unwrap();
    assert_eq!(decoded, original);
    assert_eq!(to_vec(&decoded).unwrap(), bytes);
}

#[test]
fn document_length_and_terminator_invariants() {
    let bytes = to_vec(&every_kind_document()).unwrap();
    let declared = i32::from_le_bytes(bytes[..4].try_into().unwrap());
    assert_eq!(declared as usize, bytes.len());
    assert_eq!(*bytes.last().unwrap(), 0);
}

#[test]
fn unordered_map_round_trips_modulo_order() {
    let original: M = every_kind_document().into_map();
    let decoded: M = from_slice_to(&to_vec(&original).unwrap()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn code_with_scope_decodes_to_the_embedded_mapping() {
    let bytes = to_vec(&doc! {
        "f": JavaScript {
            code: "function(x) { return x + y; }".to_string(),
            scope: Some(doc! { "y": -17, "z": "s" }),
        },
    })
    .unwrap();
    let decoded: Document = from_slice_to(&bytes).unwrap();
    match decoded.get("f") {
        Some(Bson::JavaScript(js)) => {
            let scope = js.scope.as_ref().expect("scope must survive decoding");
            let mut expected = M::new();
            expected.insert("y".to_string(), Bson::Int32(-17));
            expected.insert("z".to_string(), Bson::String("s".to_string()));
            assert_eq!(scope.to_map(), expected);
        }
        other => panic!("unexpected value: {:?}", other),
    }
}

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct Coerce {
    n: i32,
    m: i64,
    f: f64,
    b: bool,
    s: String,
    data: Binary,
    t: Timestamp,
}

#[test]
fn numeric_coercions_through_a_record() {
    let bytes = to_vec(&doc! {
        "n": 3.0,                    // integral double -> i32
        "m": Timestamp(17),          // timestamp -> i64
        "f": 4,                      // int -> double
        "b": 1_i64,                  // int -> bool
        "s": Symbol("via symbol".to_string()),
        "data": "raw text",          // string -> byte sequence
        "t": 99_i64,                 // int -> timestamp
    })
    .unwrap();
    let decoded: Coerce = from_slice_to(&bytes).unwrap();
    assert_eq!(
        decoded,
        Coerce {
            n: 3,
            m: 17,
            f: 4.0,
            b: true,
            s: "via symbol".to_string(),
            data: Binary {
                subtype: BinarySubtype::Generic,
                bytes: b"raw text".to_vec()
            },
            t: Timestamp(99),
        }
    );
}

#[test]
fn lossy_coercions_leave_slots_untouched() {
    let bytes = to_vec(&doc! {
        "n": 1_i64 << 40,            // does not fit an i32
        "f": "not a number",
        "m": 3.7,                    // fractional double
    })
    .unwrap();
    let decoded: Coerce = from_slice_to(&bytes).unwrap();
    assert_eq!(decoded, Coerce::default());
}

#[test]
fn binary_decodes_into_string_when_utf8() {
    #[derive(bson::Bson, Debug, Default, PartialEq)]
    struct Text {
        s: String,
    }
    let bytes = to_vec(&doc! {
        "s": Binary { subtype: BinarySubtype::Generic, bytes: b"from binary".to_vec() },
    })
    .unwrap();
    let decoded: Text = from_slice_to(&bytes).unwrap();
    assert_eq!(decoded.s, "from binary");
}

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct Wide {
    #[bson("u")]
    u: u64,
}

#[test]
fn unsigned_values_beyond_i64_overflow() {
    let err = to_vec(&Wide { u: u64::MAX }).unwrap_err();
    assert!(matches!(
        err.kind.as_ref(),
        ErrorKind::IntegerOverflow { value: u64::MAX }
    ));

    let ok = to_vec(&Wide { u: 7 }).unwrap();
    let doc: Document = from_slice_to(&ok).unwrap();
    assert_eq!(doc.get("u"), Some(&Bson::Int64(7)));
}

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct Stamped {
    at: chrono::DateTime<chrono::Utc>,
}

#[test]
fn time_values_truncate_to_milliseconds() {
    let precise = chrono::DateTime::parse_from_rfc3339("2014-11-28T12:00:09.123456Z")
        .unwrap()
        .with_timezone(&chrono::Utc);
    let decoded: Stamped = from_slice_to(&to_vec(&Stamped { at: precise }).unwrap()).unwrap();
    assert_eq!(decoded.at, DateTime::from_chrono(precise).to_chrono());
    assert_eq!(decoded.at.timestamp_subsec_millis(), 123);
}

#[test]
fn fixed_length_sequences_decode_element_wise() {
    #[derive(bson::Bson, Debug, Default, PartialEq)]
    struct Triple {
        v: [i32; 3],
    }
    let bytes = to_vec(&doc! { "v": [1, 2, 3, 4] }).unwrap();
    let decoded: Triple = from_slice_to(&bytes).unwrap();
    assert_eq!(decoded.v, [1, 2, 3]);

    let rt: Triple = from_slice_to(&to_vec(&decoded).unwrap()).unwrap();
    assert_eq!(rt, decoded);
}
