//! BSON serialization: the wire-format writer.

use std::collections::{BTreeMap, HashMap};

use crate::{
    bson::{Binary, Bson, JavaScript, Regex, Timestamp},
    datetime::DateTime,
    document::Document,
    error::{Error, ErrorKind, Result},
    field::Field,
    oid::ObjectId,
    schema::{self, Fields},
    spec::ElementType,
};

/// Encodes `value` as a BSON document and returns the bytes.
///
/// The value's root must be document-shaped: an ordered [`Document`], a string-keyed
/// map, a `#[derive(Bson)]` record, a [`Bson`] document value, or a hook type whose
/// getter produces a document.
pub fn to_vec<T: Encode + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut enc = Encoder::new();
    value.encode(&mut enc)?;
    Ok(enc.into_bytes())
}

/// A value that can be encoded as a complete BSON document.
pub trait Encode {
    /// Writes `self` as a document into `enc`.
    fn encode(&self, enc: &mut Encoder) -> Result<()>;
}

/// An in-progress BSON byte buffer.
///
/// All nested documents are written in place in the same buffer; each document
/// reserves 4 bytes for its length and backpatches the final count.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the encoder and returns the bytes written so far.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Appends `value` as one element under `key`.
    pub fn append(&mut self, key: &str, value: &Bson) -> Result<()> {
        match value {
            Bson::Double(f) => self.append_f64(key, *f),
            Bson::String(s) => self.append_str(key, s),
            Bson::Document(doc) => self.append_document(key, doc),
            Bson::Array(arr) => {
                self.write_element_header(ElementType::Array, key)?;
                self.write_document(|enc| {
                    for (index, item) in arr.iter().enumerate() {
                        enc.append(&index.to_string(), item)?;
                    }
                    Ok(())
                })
            }
            Bson::Binary(bin) => self.append_binary(key, bin),
            Bson::Undefined => self.append_empty(key, ElementType::Undefined),
            Bson::ObjectId(id) => self.append_object_id(key, *id),
            Bson::Boolean(b) => self.append_bool(key, *b),
            Bson::DateTime(dt) => self.append_datetime(key, *dt),
            Bson::Null => self.append_empty(key, ElementType::Null),
            Bson::RegularExpression(re) => self.append_regex(key, re),
            Bson::JavaScript(js) => self.append_javascript(key, js),
            Bson::Symbol(sym) => self.append_symbol(key, &sym.0),
            Bson::Int32(i) => self.append_i32(key, *i),
            Bson::Timestamp(t) => self.append_timestamp(key, *t),
            Bson::Int64(i) => self.append_i64(key, *i, false),
            Bson::MinKey => self.append_empty(key, ElementType::MinKey),
            Bson::MaxKey => self.append_empty(key, ElementType::MaxKey),
        }
    }

    /// Appends an element under `key` with an already-serialized payload.
    pub fn append_raw(&mut self, key: &str, kind: ElementType, payload: &[u8]) -> Result<()> {
        self.write_element_header(kind, key)?;
        self.buf.extend_from_slice(payload);
        Ok(())
    }

    /// Appends a nested record element under `key`. Used by derived [`Field`] impls.
    #[doc(hidden)]
    pub fn append_record(&mut self, key: &str, record: &dyn Fields) -> Result<()> {
        self.write_element_header(ElementType::EmbeddedDocument, key)?;
        self.encode_record(record)
    }

    /// Writes `record` as a complete document. Used by derived [`Encode`] impls.
    #[doc(hidden)]
    pub fn encode_record(&mut self, record: &dyn Fields) -> Result<()> {
        let schema = schema::plan_meta(record.meta())?;
        self.write_document(|enc| {
            for plan in schema.fields() {
                let slot = resolve(record, &plan.path)?;
                if plan.omit_empty && slot.is_empty() {
                    continue;
                }
                slot.encode_element(&plan.key, enc, plan.min_size)?;
            }
            Ok(())
        })
    }

    pub(crate) fn append_f64(&mut self, key: &str, value: f64) -> Result<()> {
        self.write_element_header(ElementType::Double, key)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub(crate) fn append_str(&mut self, key: &str, value: &str) -> Result<()> {
        self.write_element_header(ElementType::String, key)?;
        self.write_string(value)
    }

    pub(crate) fn append_symbol(&mut self, key: &str, value: &str) -> Result<()> {
        self.write_element_header(ElementType::Symbol, key)?;
        self.write_string(value)
    }

    pub(crate) fn append_document(&mut self, key: &str, doc: &Document) -> Result<()> {
        self.write_element_header(ElementType::EmbeddedDocument, key)?;
        doc.encode(self)
    }

    pub(crate) fn append_binary(&mut self, key: &str, bin: &Binary) -> Result<()> {
        self.write_element_header(ElementType::Binary, key)?;
        let len = self.int32_len(bin.bytes.len())?;
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.push(bin.subtype.into());
        self.buf.extend_from_slice(&bin.bytes);
        Ok(())
    }

    pub(crate) fn append_object_id(&mut self, key: &str, id: ObjectId) -> Result<()> {
        self.write_element_header(ElementType::ObjectId, key)?;
        self.buf.extend_from_slice(&id.bytes());
        Ok(())
    }

    pub(crate) fn append_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.write_element_header(ElementType::Boolean, key)?;
        self.buf.push(u8::from(value));
        Ok(())
    }

    pub(crate) fn append_datetime(&mut self, key: &str, value: DateTime) -> Result<()> {
        self.write_element_header(ElementType::DateTime, key)?;
        self.buf
            .extend_from_slice(&value.timestamp_millis().to_le_bytes());
        Ok(())
    }

    pub(crate) fn append_regex(&mut self, key: &str, re: &Regex) -> Result<()> {
        self.write_element_header(ElementType::RegularExpression, key)?;
        self.write_cstring(&re.pattern)?;
        self.write_cstring(&re.options)
    }

    pub(crate) fn append_javascript(&mut self, key: &str, js: &JavaScript) -> Result<()> {
        match &js.scope {
            None => {
                self.write_element_header(ElementType::JavaScriptCode, key)?;
                self.write_string(&js.code)
            }
            Some(scope) => {
                self.write_element_header(ElementType::JavaScriptCodeWithScope, key)?;
                self.write_length_prefixed(|enc| {
                    enc.write_string(&js.code)?;
                    scope.encode(enc)
                })
            }
        }
    }

    pub(crate) fn append_i32(&mut self, key: &str, value: i32) -> Result<()> {
        self.write_element_header(ElementType::Int32, key)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub(crate) fn append_i64(&mut self, key: &str, value: i64, min_size: bool) -> Result<()> {
        if min_size {
            if let Ok(narrow) = i32::try_from(value) {
                return self.append_i32(key, narrow);
            }
        }
        self.write_element_header(ElementType::Int64, key)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub(crate) fn append_timestamp(&mut self, key: &str, value: Timestamp) -> Result<()> {
        self.write_element_header(ElementType::Timestamp, key)?;
        self.buf.extend_from_slice(&value.0.to_le_bytes());
        Ok(())
    }

    /// Appends an element whose kind carries no payload.
    pub(crate) fn append_empty(&mut self, key: &str, kind: ElementType) -> Result<()> {
        self.write_element_header(kind, key)
    }

    pub(crate) fn write_element_header(&mut self, kind: ElementType, key: &str) -> Result<()> {
        self.buf.push(kind as u8);
        self.write_cstring(key)
    }

    /// Writes a document: 4-byte length, the body produced by `body`, and the NUL
    /// terminator. The length is backpatched once the body size is known.
    pub(crate) fn write_document<F>(&mut self, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.write_length_prefixed(|enc| {
            body(enc)?;
            enc.buf.push(0);
            Ok(())
        })
    }

    /// Writes a 4-byte length reservation, the output of `body`, then backpatches the
    /// total length (including the prefix itself).
    pub(crate) fn write_length_prefixed<F>(&mut self, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let start = self.buf.len();
        self.buf.extend_from_slice(&[0u8; 4]);
        body(self)?;
        let total = self.int32_len(self.buf.len() - start)?;
        self.buf[start..start + 4].copy_from_slice(&total.to_le_bytes());
        Ok(())
    }

    pub(crate) fn write_cstring(&mut self, value: &str) -> Result<()> {
        if value.as_bytes().contains(&0) {
            return Err(ErrorKind::InvalidCString {
                value: value.to_string(),
            }
            .into());
        }
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    /// Writes a string payload: int32 byte count including the NUL, the bytes, NUL.
    /// Interior NULs are permitted here, unlike in cstrings.
    pub(crate) fn write_string(&mut self, value: &str) -> Result<()> {
        let len = self.int32_len(value.len() + 1)?;
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        Ok(())
    }

    fn int32_len(&self, len: usize) -> Result<i32> {
        i32::try_from(len).map_err(|_| Error::malformed("value exceeds the maximum document size"))
    }
}

fn resolve<'a>(record: &'a dyn Fields, path: &[usize]) -> Result<&'a dyn Field> {
    match path {
        [] => Err(Error::malformed("empty field path")),
        [leaf] => Ok(record.field(*leaf)),
        [head, rest @ ..] => {
            let inner = record
                .field(*head)
                .as_fields()
                .ok_or_else(|| Error::malformed("inline path does not traverse a record"))?;
            resolve(inner, rest)
        }
    }
}

pub(crate) fn resolve_mut<'a>(
    record: &'a mut dyn Fields,
    path: &[usize],
) -> Result<&'a mut dyn Field> {
    match path {
        [] => Err(Error::malformed("empty field path")),
        [leaf] => Ok(record.field_mut(*leaf)),
        [head, rest @ ..] => {
            let inner = record
                .field_mut(*head)
                .as_fields_mut()
                .ok_or_else(|| Error::malformed("inline path does not traverse a record"))?;
            resolve_mut(inner, rest)
        }
    }
}

impl Encode for Document {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.write_document(|e| {
            for (key, value) in self {
                e.append(key, value)?;
            }
            Ok(())
        })
    }
}

impl<T: Field> Encode for HashMap<String, T> {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.write_document(|e| {
            for (key, value) in self {
                value.encode_element(key, e, false)?;
            }
            Ok(())
        })
    }
}

impl<T: Field> Encode for BTreeMap<String, T> {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        enc.write_document(|e| {
            for (key, value) in self {
                value.encode_element(key, e, false)?;
            }
            Ok(())
        })
    }
}

impl Encode for Bson {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        match self {
            Bson::Document(doc) => doc.encode(enc),
            _ => Err(Error::unsupported_root("a non-document Bson value")),
        }
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, enc: &mut Encoder) -> Result<()> {
        (**self).encode(enc)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::to_vec;
    use crate::{doc, error::ErrorKind, Bson};

    #[test]
    fn hello_world_bytes() {
        let bytes = to_vec(&doc! { "hello": "world" }).unwrap();
        assert_eq!(
            bytes,
            b"\x16\x00\x00\x00\x02hello\x00\x06\x00\x00\x00world\x00\x00"
        );
        assert_eq!(bytes.len(), 22);
    }

    #[test]
    fn length_prefix_and_terminator() {
        let bytes = to_vec(&doc! { "a": 1, "b": [true, Bson::Null] }).unwrap();
        let declared = i32::from_le_bytes(bytes[..4].try_into().unwrap());
        assert_eq!(declared as usize, bytes.len());
        assert_eq!(*bytes.last().unwrap(), 0u8);
    }

    #[test]
    fn ordered_document_preserves_insertion_order() {
        let bytes = to_vec(&doc! { "b": 1, "a": 2 }).unwrap();
        let b_pos = bytes.windows(2).position(|w| w == b"b\x00").unwrap();
        let a_pos = bytes.windows(2).position(|w| w == b"a\x00").unwrap();
        assert!(b_pos < a_pos);
    }

    #[test]
    fn non_document_root_is_rejected() {
        let err = to_vec(&Bson::Int32(4)).unwrap_err();
        assert!(matches!(
            err.kind.as_ref(),
            ErrorKind::UnsupportedRoot { .. }
        ));
    }

    #[test]
    fn interior_nul_in_key_is_rejected() {
        let err = to_vec(&doc! { "bad\0key": 1 }).unwrap_err();
        assert!(matches!(err.kind.as_ref(), ErrorKind::InvalidCString { .. }));
    }
}
