//! BSON deserialization: the wire-format reader.

use std::collections::{BTreeMap, HashMap};

use crate::{
    bson::{Binary, Bson, JavaScript, Regex, Symbol, Timestamp},
    datetime::DateTime,
    document::Document,
    error::{Error, ErrorKind, Result},
    field::Field,
    oid::ObjectId,
    raw::RawBsonRef,
    schema,
    spec::ElementType,
};

/// Decodes a BSON document from `bytes` into `target`.
///
/// The target must be a mutable handle to something document-shaped: an ordered
/// [`Document`], a string-keyed map, a `#[derive(Bson)]` record, a `Box` of one of
/// those, or a hook type. Bytes past the document's declared length are ignored.
pub fn from_slice<T: Decode + ?Sized>(bytes: &[u8], target: &mut T) -> Result<()> {
    target.decode(bytes)
}

/// Decodes a BSON document from `bytes` into a fresh `T`.
pub fn from_slice_to<T: Decode + Default>(bytes: &[u8]) -> Result<T> {
    let mut value = T::default();
    value.decode(bytes)?;
    Ok(value)
}

/// A value that can be populated from a complete BSON document.
pub trait Decode {
    /// Decodes a document from `bytes` into `self`.
    fn decode(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Decodes a document into a record target through its schema plan. Used by derived
/// [`Decode`] impls.
///
/// Every mapped field is reset to its zero value first (hook types keep their state),
/// elements with unknown keys are skipped without being parsed, and per-element type
/// mismatches are dropped.
#[doc(hidden)]
pub fn decode_record(bytes: &[u8], record: &mut dyn schema::Fields) -> Result<()> {
    let schema = schema::plan_meta(record.meta())?;
    for index in 0..record.meta().fields.len() {
        record.field_mut(index).clear();
    }

    let mut dec = Decoder::new(bytes);
    dec.read_document(|key, raw| {
        let Some(plan) = schema.field_by_key(key) else {
            return Ok(());
        };
        let slot = crate::encode::resolve_mut(record, &plan.path)?;
        match slot.decode_element(raw) {
            Ok(()) => Ok(()),
            Err(e) if e.is_type_mismatch() => Ok(()),
            Err(e) => Err(e),
        }
    })
}

/// Parses one element payload into its native [`Bson`] value.
pub(crate) fn parse_element(kind: ElementType, bytes: &[u8]) -> Result<Bson> {
    let mut dec = Decoder::new(bytes);
    let value = dec.read_value(kind)?;
    if dec.pos != bytes.len() {
        return Err(Error::malformed("element payload has trailing bytes"));
    }
    Ok(value)
}

/// Walks the elements of a document payload, handing each to `visit`.
pub(crate) fn for_each_element<'a, F>(bytes: &'a [u8], visit: F) -> Result<()>
where
    F: FnMut(&'a str, RawBsonRef<'a>) -> Result<()>,
{
    Decoder::new(bytes).read_document(visit)
}

/// A cursor over a BSON byte buffer.
struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Error::truncated(context))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self, context: &'static str) -> Result<u8> {
        Ok(self.read_bytes(1, context)?[0])
    }

    fn read_i32(&mut self, context: &'static str) -> Result<i32> {
        let bytes = self.read_bytes(4, context)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i64(&mut self, context: &'static str) -> Result<i64> {
        let b = self.read_bytes(8, context)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_f64(&mut self, context: &'static str) -> Result<f64> {
        let b = self.read_bytes(8, context)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_cstring(&mut self) -> Result<&'a str> {
        let remainder = &self.bytes[self.pos..];
        let nul = remainder
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::truncated("cstring"))?;
        let s = std::str::from_utf8(&remainder[..nul])
            .map_err(|_| Error::malformed("invalid UTF-8 in cstring"))?;
        self.pos += nul + 1;
        Ok(s)
    }

    fn skip_cstring(&mut self) -> Result<()> {
        let remainder = &self.bytes[self.pos..];
        let nul = remainder
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::truncated("cstring"))?;
        self.pos += nul + 1;
        Ok(())
    }

    fn read_string(&mut self) -> Result<&'a str> {
        let len = self.read_i32("string length")?;
        if len < 1 {
            return Err(Error::malformed("string length must be positive"));
        }
        let bytes = self.read_bytes(len as usize, "string payload")?;
        match bytes.split_last() {
            Some((0, body)) => {
                std::str::from_utf8(body).map_err(|_| Error::malformed("invalid UTF-8 in string"))
            }
            _ => Err(Error::malformed("string missing its NUL terminator")),
        }
    }

    /// Reads a document: 4-byte total length, elements until the NUL terminator.
    ///
    /// The declared length bounds every read inside the document, so a corrupt
    /// nested payload cannot escape into surrounding bytes.
    fn read_document<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(&'a str, RawBsonRef<'a>) -> Result<()>,
    {
        let start = self.pos;
        let total = self.read_i32("document length")?;
        if total < 5 {
            return Err(Error::malformed("document length too small"));
        }
        let end = start
            .checked_add(total as usize)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Error::truncated("document body"))?;
        if self.bytes[end - 1] != 0 {
            return Err(ErrorKind::BadTerminator.into());
        }

        let mut body = Decoder {
            bytes: &self.bytes[..end],
            pos: self.pos,
        };
        loop {
            let kind_byte = body.read_u8("element kind")?;
            if kind_byte == 0 {
                break;
            }
            let kind = ElementType::from_u8(kind_byte)
                .ok_or(ErrorKind::InvalidKind { kind: kind_byte })?;
            let key = body.read_cstring()?;
            let payload_start = body.pos;
            body.skip_value(kind)?;
            let raw = RawBsonRef {
                kind,
                bytes: &body.bytes[payload_start..body.pos],
            };
            visit(key, raw)?;
        }
        if body.pos != end {
            return Err(ErrorKind::BadTerminator.into());
        }
        self.pos = end;
        Ok(())
    }

    /// Advances past one element payload of the given kind without parsing it.
    fn skip_value(&mut self, kind: ElementType) -> Result<()> {
        match kind {
            ElementType::Double
            | ElementType::DateTime
            | ElementType::Timestamp
            | ElementType::Int64 => {
                self.read_bytes(8, "numeric payload")?;
            }
            ElementType::Int32 => {
                self.read_bytes(4, "int32 payload")?;
            }
            ElementType::Boolean => {
                self.read_bytes(1, "boolean payload")?;
            }
            ElementType::ObjectId => {
                self.read_bytes(12, "ObjectId payload")?;
            }
            ElementType::Null
            | ElementType::Undefined
            | ElementType::MinKey
            | ElementType::MaxKey => {}
            ElementType::String | ElementType::JavaScriptCode | ElementType::Symbol => {
                let len = self.read_i32("string length")?;
                if len < 1 {
                    return Err(Error::malformed("string length must be positive"));
                }
                self.read_bytes(len as usize, "string payload")?;
            }
            ElementType::EmbeddedDocument | ElementType::Array => {
                let len = self.read_i32("document length")?;
                if len < 5 {
                    return Err(Error::malformed("document length too small"));
                }
                self.read_bytes(len as usize - 4, "document body")?;
            }
            ElementType::Binary => {
                let len = self.read_i32("binary length")?;
                if len < 0 {
                    return Err(Error::malformed("binary length must not be negative"));
                }
                self.read_bytes(1 + len as usize, "binary payload")?;
            }
            ElementType::RegularExpression => {
                self.skip_cstring()?;
                self.skip_cstring()?;
            }
            ElementType::JavaScriptCodeWithScope => {
                let len = self.read_i32("code with scope length")?;
                if len < 14 {
                    return Err(Error::malformed("code with scope length too small"));
                }
                self.read_bytes(len as usize - 4, "code with scope payload")?;
            }
        }
        Ok(())
    }

    /// Parses one element payload into its native value.
    fn read_value(&mut self, kind: ElementType) -> Result<Bson> {
        Ok(match kind {
            ElementType::Double => Bson::Double(self.read_f64("double payload")?),
            ElementType::String => Bson::String(self.read_string()?.to_string()),
            ElementType::EmbeddedDocument => {
                let mut doc = Document::new();
                self.read_document(|key, raw| {
                    doc.push(key.to_string(), raw.to_bson()?);
                    Ok(())
                })?;
                Bson::Document(doc)
            }
            ElementType::Array => {
                let mut array = Vec::new();
                self.read_document(|_key, raw| {
                    array.push(raw.to_bson()?);
                    Ok(())
                })?;
                Bson::Array(array)
            }
            ElementType::Binary => {
                let len = self.read_i32("binary length")?;
                if len < 0 {
                    return Err(Error::malformed("binary length must not be negative"));
                }
                let subtype = self.read_u8("binary subtype")?;
                let bytes = self.read_bytes(len as usize, "binary payload")?;
                Bson::Binary(Binary {
                    subtype: subtype.into(),
                    bytes: bytes.to_vec(),
                })
            }
            ElementType::Undefined => Bson::Undefined,
            ElementType::ObjectId => {
                let bytes = self.read_bytes(12, "ObjectId payload")?;
                Bson::ObjectId(ObjectId::from_slice(bytes)?)
            }
            ElementType::Boolean => Bson::Boolean(self.read_u8("boolean payload")? != 0),
            ElementType::DateTime => {
                Bson::DateTime(DateTime::from_millis(self.read_i64("datetime payload")?))
            }
            ElementType::Null => Bson::Null,
            ElementType::RegularExpression => {
                let pattern = self.read_cstring()?.to_string();
                let options = self.read_cstring()?.to_string();
                Bson::RegularExpression(Regex { pattern, options })
            }
            ElementType::JavaScriptCode => Bson::JavaScript(JavaScript {
                code: self.read_string()?.to_string(),
                scope: None,
            }),
            ElementType::Symbol => Bson::Symbol(Symbol(self.read_string()?.to_string())),
            ElementType::JavaScriptCodeWithScope => {
                let start = self.pos;
                let total = self.read_i32("code with scope length")?;
                let code = self.read_string()?.to_string();
                let mut scope = Document::new();
                self.read_document(|key, raw| {
                    scope.push(key.to_string(), raw.to_bson()?);
                    Ok(())
                })?;
                if total < 0 || self.pos - start != total as usize {
                    return Err(Error::malformed(
                        "code with scope length disagrees with its parts",
                    ));
                }
                Bson::JavaScript(JavaScript {
                    code,
                    scope: Some(scope),
                })
            }
            ElementType::Int32 => Bson::Int32(self.read_i32("int32 payload")?),
            ElementType::Timestamp => Bson::Timestamp(Timestamp(self.read_i64("timestamp payload")?)),
            ElementType::Int64 => Bson::Int64(self.read_i64("int64 payload")?),
            ElementType::MaxKey => Bson::MaxKey,
            ElementType::MinKey => Bson::MinKey,
        })
    }
}

impl Decode for Document {
    fn decode(&mut self, bytes: &[u8]) -> Result<()> {
        self.clear();
        for_each_element(bytes, |key, raw| {
            self.push(key.to_string(), raw.to_bson()?);
            Ok(())
        })
    }
}

impl<T: Field + Default> Decode for HashMap<String, T> {
    fn decode(&mut self, bytes: &[u8]) -> Result<()> {
        self.decode_element(RawBsonRef {
            kind: ElementType::EmbeddedDocument,
            bytes,
        })
    }
}

impl<T: Field + Default> Decode for BTreeMap<String, T> {
    fn decode(&mut self, bytes: &[u8]) -> Result<()> {
        self.decode_element(RawBsonRef {
            kind: ElementType::EmbeddedDocument,
            bytes,
        })
    }
}

impl<T: Decode + ?Sized> Decode for Box<T> {
    fn decode(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).decode(bytes)
    }
}
