//! BSON definition

use crate::{
    datetime::DateTime,
    document::Document,
    oid::ObjectId,
    spec::{BinarySubtype, ElementType},
};

/// Possible BSON value types.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Bson {
    /// 64-bit binary floating point
    Double(f64),
    /// String
    String(String),
    /// Embedded document
    Document(Document),
    /// Array
    Array(Vec<Bson>),
    /// Binary data
    Binary(Binary),
    /// Undefined value (deprecated)
    Undefined,
    /// [ObjectId](http://dochub.mongodb.org/core/objectids)
    ObjectId(ObjectId),
    /// Boolean value
    Boolean(bool),
    /// UTC datetime
    DateTime(DateTime),
    /// Null value
    #[default]
    Null,
    /// Regular expression
    RegularExpression(Regex),
    /// JavaScript code, with or without a scope
    JavaScript(JavaScript),
    /// Symbol (deprecated)
    Symbol(Symbol),
    /// 32-bit signed integer
    Int32(i32),
    /// Timestamp
    Timestamp(Timestamp),
    /// 64-bit signed integer
    Int64(i64),
    /// The smallest BSON value
    MinKey,
    /// The largest BSON value
    MaxKey,
}

impl Bson {
    /// The [`ElementType`] this value is emitted with.
    pub fn element_type(&self) -> ElementType {
        match self {
            Bson::Double(..) => ElementType::Double,
            Bson::String(..) => ElementType::String,
            Bson::Document(..) => ElementType::EmbeddedDocument,
            Bson::Array(..) => ElementType::Array,
            Bson::Binary(..) => ElementType::Binary,
            Bson::Undefined => ElementType::Undefined,
            Bson::ObjectId(..) => ElementType::ObjectId,
            Bson::Boolean(..) => ElementType::Boolean,
            Bson::DateTime(..) => ElementType::DateTime,
            Bson::Null => ElementType::Null,
            Bson::RegularExpression(..) => ElementType::RegularExpression,
            Bson::JavaScript(JavaScript { scope: None, .. }) => ElementType::JavaScriptCode,
            Bson::JavaScript(JavaScript { scope: Some(_), .. }) => {
                ElementType::JavaScriptCodeWithScope
            }
            Bson::Symbol(..) => ElementType::Symbol,
            Bson::Int32(..) => ElementType::Int32,
            Bson::Timestamp(..) => ElementType::Timestamp,
            Bson::Int64(..) => ElementType::Int64,
            Bson::MinKey => ElementType::MinKey,
            Bson::MaxKey => ElementType::MaxKey,
        }
    }

    /// Coerces this value into an `i64` if it is numeric and the conversion is lossless.
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Bson::Int32(i) => Some(i64::from(i)),
            Bson::Int64(i) => Some(i),
            Bson::Timestamp(t) => Some(t.0),
            Bson::Double(f) if f == f as i64 as f64 => Some(f as i64),
            _ => None,
        }
    }

    /// Returns the wrapped document if this value is one.
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Bson::Document(doc) => Some(doc),
            _ => None,
        }
    }
}

/// Binary data of a particular subtype.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Binary {
    /// The subtype tag emitted before the payload.
    pub subtype: BinarySubtype,
    /// The payload bytes, written verbatim.
    pub bytes: Vec<u8>,
}

impl Binary {
    /// Wraps `bytes` with the generic subtype.
    pub fn generic(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype: BinarySubtype::Generic,
            bytes: bytes.into(),
        }
    }
}

/// A regular expression: a pattern and a string of option letters.
///
/// Neither part is validated; both travel as cstrings and therefore must not
/// contain NUL bytes.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Regex {
    /// The regex pattern.
    pub pattern: String,
    /// The regex option letters.
    pub options: String,
}

/// JavaScript code, optionally carrying a scope document.
///
/// Code without a scope is emitted as kind 0x0D; code with a scope as 0x0F.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JavaScript {
    /// The code itself.
    pub code: String,
    /// Variable bindings the code closes over.
    pub scope: Option<Document>,
}

/// Symbol (deprecated). Carried like a string but tagged with its own kind.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Symbol(pub String);

/// An opaque MongoDB internal timestamp, stored as its 8-byte wire integer.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// The seconds-since-epoch half of the timestamp.
    pub fn time(self) -> u32 {
        ((self.0 as u64) >> 32) as u32
    }

    /// The ordinal half of the timestamp.
    pub fn increment(self) -> u32 {
        (self.0 as u64 & 0xFFFF_FFFF) as u32
    }
}

/// The value smaller than all other BSON values.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MinKey;

/// The value larger than all other BSON values.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MaxKey;

/// The deprecated "undefined" value.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Undefined;

impl From<f32> for Bson {
    fn from(v: f32) -> Self {
        Bson::Double(f64::from(v))
    }
}

impl From<f64> for Bson {
    fn from(v: f64) -> Self {
        Bson::Double(v)
    }
}

impl From<&str> for Bson {
    fn from(v: &str) -> Self {
        Bson::String(v.to_string())
    }
}

impl From<String> for Bson {
    fn from(v: String) -> Self {
        Bson::String(v)
    }
}

impl From<bool> for Bson {
    fn from(v: bool) -> Self {
        Bson::Boolean(v)
    }
}

impl From<i8> for Bson {
    fn from(v: i8) -> Self {
        Bson::Int32(i32::from(v))
    }
}

impl From<i16> for Bson {
    fn from(v: i16) -> Self {
        Bson::Int32(i32::from(v))
    }
}

impl From<i32> for Bson {
    fn from(v: i32) -> Self {
        Bson::Int32(v)
    }
}

impl From<i64> for Bson {
    fn from(v: i64) -> Self {
        Bson::Int64(v)
    }
}

impl From<u16> for Bson {
    fn from(v: u16) -> Self {
        Bson::Int32(i32::from(v))
    }
}

impl From<u32> for Bson {
    fn from(v: u32) -> Self {
        match i32::try_from(v) {
            Ok(i) => Bson::Int32(i),
            Err(_) => Bson::Int64(i64::from(v)),
        }
    }
}

impl From<Document> for Bson {
    fn from(v: Document) -> Self {
        Bson::Document(v)
    }
}

impl<T: Into<Bson>> From<Vec<T>> for Bson {
    fn from(v: Vec<T>) -> Self {
        Bson::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<Binary> for Bson {
    fn from(v: Binary) -> Self {
        Bson::Binary(v)
    }
}

impl From<ObjectId> for Bson {
    fn from(v: ObjectId) -> Self {
        Bson::ObjectId(v)
    }
}

impl From<DateTime> for Bson {
    fn from(v: DateTime) -> Self {
        Bson::DateTime(v)
    }
}

impl<Tz: chrono::TimeZone> From<chrono::DateTime<Tz>> for Bson {
    fn from(v: chrono::DateTime<Tz>) -> Self {
        Bson::DateTime(DateTime::from_chrono(v))
    }
}

impl From<Regex> for Bson {
    fn from(v: Regex) -> Self {
        Bson::RegularExpression(v)
    }
}

impl From<JavaScript> for Bson {
    fn from(v: JavaScript) -> Self {
        Bson::JavaScript(v)
    }
}

impl From<Symbol> for Bson {
    fn from(v: Symbol) -> Self {
        Bson::Symbol(v)
    }
}

impl From<Timestamp> for Bson {
    fn from(v: Timestamp) -> Self {
        Bson::Timestamp(v)
    }
}

impl From<MinKey> for Bson {
    fn from(_: MinKey) -> Self {
        Bson::MinKey
    }
}

impl From<MaxKey> for Bson {
    fn from(_: MaxKey) -> Self {
        Bson::MaxKey
    }
}

impl From<Undefined> for Bson {
    fn from(_: Undefined) -> Self {
        Bson::Undefined
    }
}

impl<T: Into<Bson>> From<Option<T>> for Bson {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(value) => value.into(),
            None => Bson::Null,
        }
    }
}
