//! Record-level encode/decode behavior: tags, flags, inlining, and user hooks.

use bson::{
    doc, from_slice, from_slice_to, to_vec, Bson, Document, Error, ErrorKind, Getter, Raw,
    RawBsonRef, Setter,
};
use pretty_assertions::assert_eq;

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct Flags {
    a: bool,
    #[bson("myb")]
    b: i32,
    #[bson("myc,omitempty")]
    c: String,
    #[bson(",minsize")]
    e: i64,
}

#[test]
fn tags_rename_omit_and_narrow() {
    let value = Flags {
        a: true,
        b: 3,
        c: String::new(),
        e: 5,
    };
    let bytes = to_vec(&value).unwrap();
    let doc: Document = from_slice_to(&bytes).unwrap();

    let keys: Vec<_> = doc.keys().collect();
    assert_eq!(keys, vec!["a", "myb", "e"]);
    assert_eq!(doc.get("myb"), Some(&Bson::Int32(3)));
    // minsize narrowed the i64 into an int32 element.
    assert_eq!(doc.get("e"), Some(&Bson::Int32(5)));
}

#[test]
fn minsize_keeps_wide_values_wide() {
    let value = Flags {
        e: 1_i64 << 40,
        ..Flags::default()
    };
    let doc: Document = from_slice_to(&to_vec(&value).unwrap()).unwrap();
    assert_eq!(doc.get("e"), Some(&Bson::Int64(1 << 40)));
}

#[test]
fn round_trip_restores_omitted_fields_to_zero() {
    let value = Flags {
        a: true,
        b: -7,
        c: String::new(),
        e: 1 << 40,
    };
    let decoded: Flags = from_slice_to(&to_vec(&value).unwrap()).unwrap();
    assert_eq!(decoded, value);
}

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct OmitAll {
    #[bson(",omitempty")]
    s: String,
    #[bson(",omitempty")]
    n: i32,
    #[bson(",omitempty")]
    f: f64,
    #[bson(",omitempty")]
    seq: Vec<i32>,
    #[bson(",omitempty")]
    map: std::collections::HashMap<String, i32>,
    #[bson(",omitempty")]
    opt: Option<i32>,
}

#[test]
fn omitempty_elides_every_empty_kind() {
    let bytes = to_vec(&OmitAll::default()).unwrap();
    // An empty document: length prefix plus terminator.
    assert_eq!(bytes, vec![5, 0, 0, 0, 0]);
    assert_eq!(from_slice_to::<OmitAll>(&bytes).unwrap(), OmitAll::default());
}

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct Inner {
    x: i32,
    y: String,
}

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct Outer {
    #[bson(",inline")]
    inner: Inner,
    z: i32,
}

#[test]
fn inline_promotes_fields_into_the_outer_document() {
    let value = Outer {
        inner: Inner {
            x: 4,
            y: "deep".to_string(),
        },
        z: 9,
    };
    let bytes = to_vec(&value).unwrap();
    let doc: Document = from_slice_to(&bytes).unwrap();
    let keys: Vec<_> = doc.keys().collect();
    assert_eq!(keys, vec!["x", "y", "z"]);

    let decoded: Outer = from_slice_to(&bytes).unwrap();
    assert_eq!(decoded, value);
}

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct NestedRecordOmitEmpty {
    #[bson("inner,omitempty")]
    inner: Inner,
}

#[test]
fn omitempty_never_elides_a_record() {
    let doc: Document = from_slice_to(&to_vec(&NestedRecordOmitEmpty::default()).unwrap()).unwrap();
    assert!(doc.contains_key("inner"));
}

#[derive(bson::Bson, Debug, Default)]
struct InlineCollision {
    #[bson(",inline")]
    inner: Inner,
    x: i32,
}

#[test]
fn inline_key_collision_is_a_schema_error() {
    let err = to_vec(&InlineCollision::default()).unwrap_err();
    assert!(matches!(
        err.kind.as_ref(),
        ErrorKind::DuplicateKey { key, .. } if key == "x"
    ));
}

#[derive(bson::Bson, Debug, Default)]
struct InlineScalar {
    #[bson(",inline")]
    s: i32,
}

#[test]
fn inline_on_a_non_record_is_a_schema_error() {
    let err = to_vec(&InlineScalar::default()).unwrap_err();
    assert!(matches!(
        err.kind.as_ref(),
        ErrorKind::InlineNonRecord { field: "s", .. }
    ));
}

#[derive(bson::Bson, Debug, Default)]
struct BadFlag {
    #[bson("k,frobnicate")]
    k: i32,
}

#[test]
fn unknown_flag_is_a_schema_error() {
    let err = to_vec(&BadFlag::default()).unwrap_err();
    assert!(matches!(
        err.kind.as_ref(),
        ErrorKind::UnknownFlag { flag, .. } if flag == "frobnicate"
    ));
}

#[derive(bson::Bson, Debug, Default)]
struct LegacyTagged {
    #[bson("name/cs")]
    name: i64,
}

#[test]
fn legacy_tag_is_rejected_with_a_migration_hint() {
    let err = to_vec(&LegacyTagged::default()).unwrap_err();
    match err.kind.as_ref() {
        ErrorKind::LegacyTag {
            tag, replacement, ..
        } => {
            assert_eq!(tag, "name/cs");
            assert_eq!(replacement, "name,omitempty,minsize");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn schema_plans_are_memoized_and_equal() {
    let first = bson::schema::plan::<Flags>().unwrap();
    let second = bson::schema::plan::<Flags>().unwrap();
    assert_eq!(first, second);
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[test]
fn unknown_document_keys_are_skipped() {
    let bytes = to_vec(&doc! { "x": 1, "extra": { "deep": [1, 2] }, "y": "kept" }).unwrap();
    let decoded: Inner = from_slice_to(&bytes).unwrap();
    assert_eq!(
        decoded,
        Inner {
            x: 1,
            y: "kept".to_string()
        }
    );
}

#[test]
fn decode_zeroes_mapped_fields_first() {
    let mut value = Inner {
        x: 9,
        y: "old".to_string(),
    };
    let bytes = to_vec(&doc! { "y": "new" }).unwrap();
    from_slice(&bytes, &mut value).unwrap();
    assert_eq!(value.x, 0);
    assert_eq!(value.y, "new");
}

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct WithSkip {
    a: i32,
    // The excluded field's type does not need to be a BSON field type.
    #[bson("-")]
    scratch: std::time::Duration,
}

#[test]
fn excluded_fields_are_invisible() {
    let value = WithSkip {
        a: 1,
        scratch: std::time::Duration::from_secs(3),
    };
    let bytes = to_vec(&value).unwrap();
    let doc: Document = from_slice_to(&bytes).unwrap();
    assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a"]);

    let mut target = WithSkip {
        a: 0,
        scratch: std::time::Duration::from_secs(7),
    };
    from_slice(&bytes, &mut target).unwrap();
    assert_eq!(target.a, 1);
    assert_eq!(target.scratch, std::time::Duration::from_secs(7));
}

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct Tree {
    name: String,
    child: Option<Box<Tree>>,
}

#[test]
fn optional_indirection_allocates_lazily() {
    let tree = Tree {
        name: "root".to_string(),
        child: Some(Box::new(Tree {
            name: "leaf".to_string(),
            child: None,
        })),
    };
    let bytes = to_vec(&tree).unwrap();
    let decoded: Tree = from_slice_to(&bytes).unwrap();
    assert_eq!(decoded, tree);

    let flat = to_vec(&doc! { "name": "solo", "child": Bson::Null }).unwrap();
    let decoded: Tree = from_slice_to(&flat).unwrap();
    assert_eq!(decoded.child, None);
}

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct Fleet {
    ships: Vec<Inner>,
}

#[test]
fn sequences_of_records_round_trip() {
    let fleet = Fleet {
        ships: vec![
            Inner {
                x: 1,
                y: "a".to_string(),
            },
            Inner {
                x: 2,
                y: "b".to_string(),
            },
        ],
    };
    let decoded: Fleet = from_slice_to(&to_vec(&fleet).unwrap()).unwrap();
    assert_eq!(decoded, fleet);
}

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct RawCapture {
    #[bson("v")]
    v: Raw,
}

#[test]
fn raw_captures_and_defers_decoding() {
    let bytes = to_vec(&doc! { "v": 42 }).unwrap();
    let captured: RawCapture = from_slice_to(&bytes).unwrap();
    assert_eq!(captured.v.kind, bson::spec::ElementType::Int32);
    assert_eq!(captured.v.decode_to::<i32>().unwrap(), 42);
    assert_eq!(captured.v.decode_to::<i64>().unwrap(), 42);

    // A mismatch on a bare Raw surfaces instead of being skipped.
    let err = captured.v.decode_to::<String>().unwrap_err();
    assert!(err.is_type_mismatch());

    // Re-encoding a Raw emits the captured payload verbatim.
    let reencoded = to_vec(&captured).unwrap();
    assert_eq!(reencoded, bytes);
}

/// A hook type: accepts numeric elements, refuses strings with a mismatch (drop),
/// and aborts on a poison value.
#[derive(Debug, Default, PartialEq)]
struct Thermometer {
    celsius: f64,
}

impl Getter for Thermometer {
    fn get_bson(&self) -> Result<Bson, Error> {
        Ok(Bson::Double(self.celsius))
    }
}

impl Setter for Thermometer {
    fn set_bson(&mut self, raw: RawBsonRef<'_>) -> Result<(), Error> {
        match raw.to_bson()? {
            Bson::Double(f) if f == -1000.0 => Err(Error::custom("impossible temperature")),
            Bson::Double(f) => {
                self.celsius = f;
                Ok(())
            }
            Bson::Int32(i) => {
                self.celsius = f64::from(i);
                Ok(())
            }
            _ => Err(Error::type_mismatch(raw.kind, "Thermometer")),
        }
    }
}

bson::impl_bson_hooks!(Thermometer);

#[derive(bson::Bson, Debug, Default, PartialEq)]
struct Reading {
    t: Thermometer,
}

#[test]
fn getter_output_is_marshaled_in_place() {
    let reading = Reading {
        t: Thermometer { celsius: 21.5 },
    };
    let doc: Document = from_slice_to(&to_vec(&reading).unwrap()).unwrap();
    assert_eq!(doc.get("t"), Some(&Bson::Double(21.5)));
}

#[test]
fn setter_mismatch_drops_the_element_and_keeps_state() {
    let mut reading = Reading {
        t: Thermometer { celsius: 3.25 },
    };
    let bytes = to_vec(&doc! { "t": "not a number" }).unwrap();
    from_slice(&bytes, &mut reading).unwrap();
    // Setter fields are not zeroed before decoding, and the mismatch left the
    // previous value in place.
    assert_eq!(reading.t.celsius, 3.25);
}

#[test]
fn setter_abort_fails_the_whole_decode() {
    let bytes = to_vec(&doc! { "t": -1000.0 }).unwrap();
    let err = from_slice_to::<Reading>(&bytes).unwrap_err();
    assert!(matches!(err.kind.as_ref(), ErrorKind::Custom { .. }));
}

#[test]
fn setter_mismatch_inside_a_sequence_drops_the_element() {
    let bytes = to_vec(&doc! { "temps": [1.0, "bad", 2.5] }).unwrap();

    #[derive(bson::Bson, Debug, Default, PartialEq)]
    struct Log {
        temps: Vec<Thermometer>,
    }

    let log: Log = from_slice_to(&bytes).unwrap();
    assert_eq!(
        log.temps,
        vec![
            Thermometer { celsius: 1.0 },
            Thermometer { celsius: 2.5 },
        ]
    );
}

#[test]
fn hook_root_must_produce_a_document() {
    let err = to_vec(&Thermometer { celsius: 1.0 }).unwrap_err();
    assert!(matches!(
        err.kind.as_ref(),
        ErrorKind::UnsupportedRoot { .. }
    ));
}
