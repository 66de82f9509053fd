//! Unparsed BSON elements for deferred decoding.

use crate::{
    bson::Bson,
    error::Result,
    field::Field,
    spec::ElementType,
};

/// One document element's kind and unparsed payload, owned.
///
/// `Raw` can be used as a record field to capture an element verbatim and decode it
/// later with [`Raw::decode_to`], or re-encode it untouched.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Raw {
    /// The element kind the payload was stored with.
    pub kind: ElementType,
    /// The unparsed payload bytes.
    pub bytes: Vec<u8>,
}

impl Raw {
    /// A borrowed view of this element.
    pub fn as_raw_ref(&self) -> RawBsonRef<'_> {
        RawBsonRef {
            kind: self.kind,
            bytes: &self.bytes,
        }
    }

    /// Parses the payload into its native [`Bson`] value.
    pub fn to_bson(&self) -> Result<Bson> {
        self.as_raw_ref().to_bson()
    }

    /// Decodes the payload into a fresh value of type `T`.
    ///
    /// Unlike decoding an element inside a record or collection, a kind/target
    /// mismatch here surfaces as a `TypeMismatch` error instead of being skipped.
    pub fn decode_to<T: Field + Default>(&self) -> Result<T> {
        let mut value = T::default();
        value.decode_element(self.as_raw_ref())?;
        Ok(value)
    }
}

impl Default for Raw {
    fn default() -> Self {
        Self {
            kind: ElementType::Null,
            bytes: Vec::new(),
        }
    }
}

/// One document element's kind and unparsed payload, borrowed from the input buffer.
///
/// This is what [`Setter`](crate::Setter) implementations receive.
#[derive(Clone, Copy, Debug)]
pub struct RawBsonRef<'a> {
    /// The element kind the payload was stored with.
    pub kind: ElementType,
    /// The unparsed payload bytes.
    pub bytes: &'a [u8],
}

impl<'a> RawBsonRef<'a> {
    /// Copies this element into an owned [`Raw`].
    pub fn to_raw(&self) -> Raw {
        Raw {
            kind: self.kind,
            bytes: self.bytes.to_vec(),
        }
    }

    /// Parses the payload into its native [`Bson`] value.
    pub fn to_bson(&self) -> Result<Bson> {
        crate::decode::parse_element(self.kind, self.bytes)
    }
}
