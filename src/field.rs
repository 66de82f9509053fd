//! The per-slot encoding and decoding layer.
//!
//! [`Field`] is implemented by every type that can live in a document field slot:
//! primitives, strings, the BSON scalar types, collections, optionals, and (via the
//! derive macro) records. The encoder and decoder drive all slot access through
//! `dyn Field`, which is what lets one schema plan serve any record shape.

use std::collections::{BTreeMap, HashMap};

use crate::{
    bson::{Binary, Bson, JavaScript, MaxKey, MinKey, Regex, Symbol, Timestamp, Undefined},
    datetime::DateTime,
    document::Document,
    encode::Encoder,
    error::{Error, ErrorKind, Result},
    oid::ObjectId,
    raw::{Raw, RawBsonRef},
    schema::{Fields, FieldType},
    spec::{BinarySubtype, ElementType},
};

/// A value that can be stored in one document field slot.
///
/// Implementations are provided for the standard primitive, collection, and BSON
/// scalar types, and generated for records by `#[derive(Bson)]`. User types with
/// custom wire behavior implement [`Getter`]/[`Setter`] and register with
/// [`impl_bson_hooks!`](crate::impl_bson_hooks).
pub trait Field {
    /// Writes this value as one document element under `key`.
    ///
    /// `min_size` is true when the enclosing record field carries the `minsize` flag.
    fn encode_element(&self, key: &str, enc: &mut Encoder, min_size: bool) -> Result<()>;

    /// Assigns this slot from one raw document element.
    ///
    /// Returning a [`TypeMismatch`](crate::ErrorKind::TypeMismatch) error causes the
    /// element to be dropped when the slot sits inside a record or collection; any
    /// other error aborts the whole decode.
    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()>;

    /// Whether the `omitempty` flag elides this value.
    fn is_empty(&self) -> bool {
        false
    }

    /// Resets the slot to its zero value. Called for every mapped field of a record
    /// before the record is decoded; hook types keep their state by making this a
    /// no-op.
    fn clear(&mut self);

    /// A record view of this slot, used to descend inline field paths.
    fn as_fields(&self) -> Option<&dyn Fields> {
        None
    }

    /// A mutable record view of this slot.
    fn as_fields_mut(&mut self) -> Option<&mut dyn Fields> {
        None
    }
}

/// The hook invoked by the encoder on types registered with
/// [`impl_bson_hooks!`](crate::impl_bson_hooks): the produced value is marshaled in
/// place of the original.
pub trait Getter {
    /// Produces the value to marshal in place of `self`.
    fn get_bson(&self) -> Result<Bson>;
}

/// The hook invoked by the decoder on types registered with
/// [`impl_bson_hooks!`](crate::impl_bson_hooks): the raw element is handed over and
/// the implementation controls its own update.
pub trait Setter {
    /// Applies the raw element stored under this value's key.
    ///
    /// Return [`Error::type_mismatch`] to drop the element when the value sits inside
    /// a record or collection; any other error aborts the decode.
    fn set_bson(&mut self, raw: RawBsonRef<'_>) -> Result<()>;
}

/// Implements [`Field`], [`Encode`](crate::Encode), and [`Decode`](crate::Decode) for
/// a type in terms of its [`Getter`] and [`Setter`] implementations.
///
/// The generated `Field` impl never resets the value before a decode, so hook types
/// can carry state across calls. Using a hook type as an encode root requires its
/// getter to produce a document, otherwise encoding fails with `UnsupportedRoot`.
#[macro_export]
macro_rules! impl_bson_hooks {
    ($ty:ty) => {
        impl $crate::Field for $ty {
            fn encode_element(
                &self,
                key: &str,
                enc: &mut $crate::Encoder,
                _min_size: bool,
            ) -> $crate::error::Result<()> {
                let value = $crate::Getter::get_bson(self)?;
                enc.append(key, &value)
            }

            fn decode_element(&mut self, raw: $crate::RawBsonRef<'_>) -> $crate::error::Result<()> {
                $crate::Setter::set_bson(self, raw)
            }

            fn clear(&mut self) {}
        }

        impl $crate::schema::FieldType for $ty {}

        impl $crate::Encode for $ty {
            fn encode(&self, enc: &mut $crate::Encoder) -> $crate::error::Result<()> {
                match $crate::Getter::get_bson(self)? {
                    $crate::Bson::Document(doc) => $crate::Encode::encode(&doc, enc),
                    _ => Err($crate::Error::unsupported_root(::std::any::type_name::<
                        $ty,
                    >())),
                }
            }
        }

        impl $crate::Decode for $ty {
            fn decode(&mut self, bytes: &[u8]) -> $crate::error::Result<()> {
                $crate::Setter::set_bson(
                    self,
                    $crate::RawBsonRef {
                        kind: $crate::spec::ElementType::EmbeddedDocument,
                        bytes,
                    },
                )
            }
        }
    };
}

fn int_from_raw(raw: &RawBsonRef<'_>, target: &'static str) -> Result<i64> {
    match raw.to_bson()? {
        Bson::Int32(i) => Ok(i64::from(i)),
        Bson::Int64(i) => Ok(i),
        Bson::Timestamp(t) => Ok(t.0),
        Bson::Double(f) if f == f as i64 as f64 => Ok(f as i64),
        Bson::Boolean(b) => Ok(i64::from(b)),
        _ => Err(Error::type_mismatch(raw.kind, target)),
    }
}

macro_rules! integer_field {
    (@impl $t:ty, ($($encode:tt)*)) => {
        impl Field for $t {
            $($encode)*

            fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
                let n = int_from_raw(&raw, stringify!($t))?;
                *self = <$t>::try_from(n)
                    .map_err(|_| Error::type_mismatch(raw.kind, stringify!($t)))?;
                Ok(())
            }

            fn is_empty(&self) -> bool {
                *self == 0
            }

            fn clear(&mut self) {
                *self = 0;
            }
        }

        impl FieldType for $t {}
    };
    // Types that always fit a 32-bit element.
    (small: $($t:ty),+) => {$(
        integer_field!(@impl $t, (
            fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
                enc.append_i32(key, *self as i32)
            }
        ));
    )+};
    // Types emitted as 64-bit elements unless `minsize` narrows them.
    (wide: $($t:ty),+) => {$(
        integer_field!(@impl $t, (
            fn encode_element(&self, key: &str, enc: &mut Encoder, min_size: bool) -> Result<()> {
                let value = i64::try_from(*self).map_err(|_| {
                    Error::from(ErrorKind::IntegerOverflow {
                        value: *self as u64,
                    })
                })?;
                enc.append_i64(key, value, min_size)
            }
        ));
    )+};
}

integer_field!(small: i8, i16, i32, u16);
integer_field!(wide: i64, isize, u32, u64, usize);

macro_rules! float_field {
    ($($t:ty),+) => {$(
        impl Field for $t {
            fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
                enc.append_f64(key, f64::from(*self))
            }

            fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
                let f = match raw.to_bson()? {
                    Bson::Double(f) => f,
                    Bson::Int32(i) => f64::from(i),
                    Bson::Int64(i) => i as f64,
                    Bson::Timestamp(t) => t.0 as f64,
                    Bson::Boolean(b) => f64::from(u8::from(b)),
                    _ => return Err(Error::type_mismatch(raw.kind, stringify!($t))),
                };
                *self = f as $t;
                Ok(())
            }

            fn is_empty(&self) -> bool {
                *self == 0.0
            }

            fn clear(&mut self) {
                *self = 0.0;
            }
        }

        impl FieldType for $t {}
    )+};
}

float_field!(f32, f64);

impl Field for bool {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append_bool(key, *self)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = match raw.to_bson()? {
            Bson::Boolean(b) => b,
            Bson::Int32(i) => i != 0,
            Bson::Int64(i) => i != 0,
            Bson::Timestamp(t) => t.0 != 0,
            Bson::Double(f) => f != 0.0,
            _ => return Err(Error::type_mismatch(raw.kind, "bool")),
        };
        Ok(())
    }

    fn is_empty(&self) -> bool {
        !*self
    }

    fn clear(&mut self) {
        *self = false;
    }
}

impl FieldType for bool {}

impl Field for String {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append_str(key, self)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = match raw.to_bson()? {
            Bson::String(s) => s,
            Bson::Symbol(Symbol(s)) => s,
            Bson::Binary(b) => String::from_utf8(b.bytes)
                .map_err(|_| Error::type_mismatch(raw.kind, "String"))?,
            _ => return Err(Error::type_mismatch(raw.kind, "String")),
        };
        Ok(())
    }

    fn is_empty(&self) -> bool {
        str::is_empty(self)
    }

    fn clear(&mut self) {
        String::clear(self);
    }
}

impl FieldType for String {}

impl Field for Symbol {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append_symbol(key, &self.0)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = match raw.to_bson()? {
            Bson::Symbol(s) => s,
            Bson::String(s) => Symbol(s),
            _ => return Err(Error::type_mismatch(raw.kind, "Symbol")),
        };
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

impl FieldType for Symbol {}

impl Field for Binary {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append_binary(key, self)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = match raw.to_bson()? {
            Bson::Binary(b) => b,
            Bson::String(s) | Bson::Symbol(Symbol(s)) => Binary {
                subtype: BinarySubtype::Generic,
                bytes: s.into_bytes(),
            },
            _ => return Err(Error::type_mismatch(raw.kind, "Binary")),
        };
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn clear(&mut self) {
        *self = Binary::default();
    }
}

impl FieldType for Binary {}

impl Field for ObjectId {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append_object_id(key, *self)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = match raw.to_bson()? {
            Bson::ObjectId(id) => id,
            _ => return Err(Error::type_mismatch(raw.kind, "ObjectId")),
        };
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.bytes() == [0u8; 12]
    }

    fn clear(&mut self) {
        *self = ObjectId::default();
    }
}

impl FieldType for ObjectId {}

impl Field for DateTime {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append_datetime(key, *self)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = match raw.to_bson()? {
            Bson::DateTime(dt) => dt,
            _ => return Err(Error::type_mismatch(raw.kind, "DateTime")),
        };
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.timestamp_millis() == 0
    }

    fn clear(&mut self) {
        *self = DateTime::from_millis(0);
    }
}

impl FieldType for DateTime {}

impl Field for chrono::DateTime<chrono::Utc> {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append_datetime(key, DateTime::from_chrono(*self))
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = match raw.to_bson()? {
            Bson::DateTime(dt) => dt.to_chrono(),
            _ => return Err(Error::type_mismatch(raw.kind, "chrono::DateTime<Utc>")),
        };
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.timestamp_millis() == 0
    }

    fn clear(&mut self) {
        *self = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
    }
}

impl FieldType for chrono::DateTime<chrono::Utc> {}

impl Field for Timestamp {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append_timestamp(key, *self)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = match raw.to_bson()? {
            Bson::Timestamp(t) => t,
            Bson::Int64(i) => Timestamp(i),
            Bson::Int32(i) => Timestamp(i64::from(i)),
            _ => return Err(Error::type_mismatch(raw.kind, "Timestamp")),
        };
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.0 == 0
    }

    fn clear(&mut self) {
        *self = Timestamp(0);
    }
}

impl FieldType for Timestamp {}

impl Field for Regex {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append_regex(key, self)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = match raw.to_bson()? {
            Bson::RegularExpression(re) => re,
            _ => return Err(Error::type_mismatch(raw.kind, "Regex")),
        };
        Ok(())
    }

    fn clear(&mut self) {
        *self = Regex::default();
    }
}

impl FieldType for Regex {}

impl Field for JavaScript {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append_javascript(key, self)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = match raw.to_bson()? {
            Bson::JavaScript(js) => js,
            _ => return Err(Error::type_mismatch(raw.kind, "JavaScript")),
        };
        Ok(())
    }

    fn clear(&mut self) {
        *self = JavaScript::default();
    }
}

impl FieldType for JavaScript {}

macro_rules! sentinel_field {
    ($($t:ty => $kind:path),+ $(,)?) => {$(
        impl Field for $t {
            fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
                enc.append_empty(key, $kind)
            }

            fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
                if raw.kind == $kind {
                    Ok(())
                } else {
                    Err(Error::type_mismatch(raw.kind, stringify!($t)))
                }
            }

            fn clear(&mut self) {}
        }

        impl FieldType for $t {}
    )+};
}

sentinel_field! {
    MinKey => ElementType::MinKey,
    MaxKey => ElementType::MaxKey,
    Undefined => ElementType::Undefined,
}

impl Field for Bson {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append(key, self)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = raw.to_bson()?;
        Ok(())
    }

    fn is_empty(&self) -> bool {
        matches!(self, Bson::Null)
    }

    fn clear(&mut self) {
        *self = Bson::Null;
    }
}

impl FieldType for Bson {}

impl Field for Document {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append_document(key, self)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = match raw.to_bson()? {
            Bson::Document(doc) => doc,
            _ => return Err(Error::type_mismatch(raw.kind, "Document")),
        };
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }

    fn clear(&mut self) {
        self.clear();
    }
}

impl FieldType for Document {}

impl Field for Raw {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.append_raw(key, self.kind, &self.bytes)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        *self = raw.to_raw();
        Ok(())
    }

    fn clear(&mut self) {
        *self = Raw::default();
    }
}

impl FieldType for Raw {}

impl<T: Field + Default> Field for Vec<T> {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.write_element_header(ElementType::Array, key)?;
        enc.write_document(|e| {
            for (index, item) in self.iter().enumerate() {
                item.encode_element(&index.to_string(), e, false)?;
            }
            Ok(())
        })
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        if raw.kind != ElementType::Array {
            return Err(Error::type_mismatch(raw.kind, "sequence"));
        }
        self.clear();
        crate::decode::for_each_element(raw.bytes, |_key, elem| {
            let mut item = T::default();
            match item.decode_element(elem) {
                Ok(()) => {
                    self.push(item);
                    Ok(())
                }
                Err(e) if e.is_type_mismatch() => Ok(()),
                Err(e) => Err(e),
            }
        })
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }

    fn clear(&mut self) {
        self.clear();
    }
}

impl<T: Field + Default> FieldType for Vec<T> {}

impl<T: Field + Default, const N: usize> Field for [T; N] {
    fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
        enc.write_element_header(ElementType::Array, key)?;
        enc.write_document(|e| {
            for (index, item) in self.iter().enumerate() {
                item.encode_element(&index.to_string(), e, false)?;
            }
            Ok(())
        })
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        if raw.kind != ElementType::Array {
            return Err(Error::type_mismatch(raw.kind, "array"));
        }
        for item in self.iter_mut() {
            item.clear();
        }
        let mut index = 0;
        crate::decode::for_each_element(raw.bytes, |_key, elem| {
            if index >= N {
                return Ok(());
            }
            match self[index].decode_element(elem) {
                Ok(()) => {
                    index += 1;
                    Ok(())
                }
                Err(e) if e.is_type_mismatch() => Ok(()),
                Err(e) => Err(e),
            }
        })
    }

    fn is_empty(&self) -> bool {
        N == 0
    }

    fn clear(&mut self) {
        for item in self.iter_mut() {
            item.clear();
        }
    }
}

impl<T: Field + Default, const N: usize> FieldType for [T; N] {}

impl<T: Field + Default> Field for Option<T> {
    fn encode_element(&self, key: &str, enc: &mut Encoder, min_size: bool) -> Result<()> {
        match self {
            Some(value) => value.encode_element(key, enc, min_size),
            None => enc.append_empty(key, ElementType::Null),
        }
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        match raw.kind {
            ElementType::Null | ElementType::Undefined => {
                *self = None;
                Ok(())
            }
            _ => {
                let mut value = T::default();
                value.decode_element(raw)?;
                *self = Some(value);
                Ok(())
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.is_none()
    }

    fn clear(&mut self) {
        *self = None;
    }
}

impl<T: Field + Default> FieldType for Option<T> {}

impl<T: Field + ?Sized> Field for Box<T> {
    fn encode_element(&self, key: &str, enc: &mut Encoder, min_size: bool) -> Result<()> {
        (**self).encode_element(key, enc, min_size)
    }

    fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
        (**self).decode_element(raw)
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn clear(&mut self) {
        (**self).clear();
    }

    fn as_fields(&self) -> Option<&dyn Fields> {
        (**self).as_fields()
    }

    fn as_fields_mut(&mut self) -> Option<&mut dyn Fields> {
        (**self).as_fields_mut()
    }
}

impl<T: FieldType> FieldType for Box<T> {
    const RECORD_META: Option<&'static crate::schema::RecordMeta> = T::RECORD_META;
}

macro_rules! map_field {
    ($($map:ident),+) => {$(
        impl<T: Field + Default> Field for $map<String, T> {
            fn encode_element(&self, key: &str, enc: &mut Encoder, _min_size: bool) -> Result<()> {
                enc.write_element_header(ElementType::EmbeddedDocument, key)?;
                enc.write_document(|e| {
                    for (k, v) in self.iter() {
                        v.encode_element(k, e, false)?;
                    }
                    Ok(())
                })
            }

            fn decode_element(&mut self, raw: RawBsonRef<'_>) -> Result<()> {
                if raw.kind != ElementType::EmbeddedDocument {
                    return Err(Error::type_mismatch(raw.kind, "mapping"));
                }
                self.clear();
                crate::decode::for_each_element(raw.bytes, |key, elem| {
                    let mut value = T::default();
                    match value.decode_element(elem) {
                        Ok(()) => {
                            self.insert(key.to_string(), value);
                            Ok(())
                        }
                        Err(e) if e.is_type_mismatch() => Ok(()),
                        Err(e) => Err(e),
                    }
                })
            }

            fn is_empty(&self) -> bool {
                self.is_empty()
            }

            fn clear(&mut self) {
                self.clear();
            }
        }

        impl<T: Field + Default> FieldType for $map<String, T> {}
    )+};
}

map_field!(HashMap, BTreeMap);

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: ElementType, bytes: &[u8]) -> RawBsonRef<'_> {
        RawBsonRef { kind, bytes }
    }

    #[test]
    fn int_narrowing_skips_out_of_range_values() {
        let payload = (1_i64 << 40).to_le_bytes();
        let mut slot = 7_i32;
        let err = slot
            .decode_element(raw(ElementType::Int64, &payload))
            .unwrap_err();
        assert!(err.is_type_mismatch());
        assert_eq!(slot, 7);
    }

    #[test]
    fn integral_double_coerces_into_int() {
        let payload = 3.0_f64.to_le_bytes();
        let mut slot = 0_i64;
        slot.decode_element(raw(ElementType::Double, &payload))
            .unwrap();
        assert_eq!(slot, 3);
    }

    #[test]
    fn fractional_double_does_not_coerce_into_int() {
        let payload = 3.7_f64.to_le_bytes();
        let mut slot = 0_i64;
        let err = slot
            .decode_element(raw(ElementType::Double, &payload))
            .unwrap_err();
        assert!(err.is_type_mismatch());
        assert_eq!(slot, 0);
    }

    #[test]
    fn numbers_coerce_into_bool() {
        let mut flag = false;
        flag.decode_element(raw(ElementType::Int32, &5_i32.to_le_bytes()))
            .unwrap();
        assert!(flag);
        flag.decode_element(raw(ElementType::Int32, &0_i32.to_le_bytes()))
            .unwrap();
        assert!(!flag);
    }

    #[test]
    fn bool_coerces_into_int() {
        let mut n = 0_i32;
        n.decode_element(raw(ElementType::Boolean, &[1])).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn option_resets_on_null() {
        let mut slot = Some(3_i32);
        slot.decode_element(raw(ElementType::Null, &[])).unwrap();
        assert_eq!(slot, None);
    }
}
