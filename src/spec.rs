//! Constants derived from the [BSON specification](http://bsonspec.org/spec.html).

/// All available BSON element types.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
#[repr(u8)]
pub enum ElementType {
    /// 64-bit binary floating point
    Double = 0x01,
    /// UTF-8 string
    String = 0x02,
    /// Embedded document
    EmbeddedDocument = 0x03,
    /// Array
    Array = 0x04,
    /// Binary data
    Binary = 0x05,
    /// Deprecated. Undefined (value)
    Undefined = 0x06,
    /// [ObjectId](https://www.mongodb.com/docs/manual/reference/method/ObjectId/)
    ObjectId = 0x07,
    /// Boolean value
    Boolean = 0x08,
    /// UTC datetime
    DateTime = 0x09,
    /// Null value
    Null = 0x0A,
    /// Regular expression
    RegularExpression = 0x0B,
    /// JavaScript code
    JavaScriptCode = 0x0D,
    /// Deprecated. Symbol
    Symbol = 0x0E,
    /// JavaScript code with scope
    JavaScriptCodeWithScope = 0x0F,
    /// 32-bit integer
    Int32 = 0x10,
    /// Timestamp
    Timestamp = 0x11,
    /// 64-bit integer
    Int64 = 0x12,
    /// Max key
    MaxKey = 0x7F,
    /// Min key
    MinKey = 0xFF,
}

impl ElementType {
    /// Attempt to convert from a `u8`.
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0x01 => ElementType::Double,
            0x02 => ElementType::String,
            0x03 => ElementType::EmbeddedDocument,
            0x04 => ElementType::Array,
            0x05 => ElementType::Binary,
            0x06 => ElementType::Undefined,
            0x07 => ElementType::ObjectId,
            0x08 => ElementType::Boolean,
            0x09 => ElementType::DateTime,
            0x0A => ElementType::Null,
            0x0B => ElementType::RegularExpression,
            0x0D => ElementType::JavaScriptCode,
            0x0E => ElementType::Symbol,
            0x0F => ElementType::JavaScriptCodeWithScope,
            0x10 => ElementType::Int32,
            0x11 => ElementType::Timestamp,
            0x12 => ElementType::Int64,
            0x7F => ElementType::MaxKey,
            0xFF => ElementType::MinKey,
            _ => return None,
        })
    }
}

/// The available binary subtypes, plus a user-defined slot.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum BinarySubtype {
    /// Generic binary subtype
    Generic,
    /// Function
    Function,
    /// Binary (old)
    BinaryOld,
    /// UUID (old)
    UuidOld,
    /// UUID
    Uuid,
    /// MD5
    Md5,
    /// Encrypted BSON value
    Encrypted,
    /// Compressed BSON column
    Column,
    /// Sensitive
    Sensitive,
    /// Reserved
    Reserved(u8),
    /// User defined
    UserDefined(u8),
}

impl From<BinarySubtype> for u8 {
    fn from(t: BinarySubtype) -> u8 {
        match t {
            BinarySubtype::Generic => 0x00,
            BinarySubtype::Function => 0x01,
            BinarySubtype::BinaryOld => 0x02,
            BinarySubtype::UuidOld => 0x03,
            BinarySubtype::Uuid => 0x04,
            BinarySubtype::Md5 => 0x05,
            BinarySubtype::Encrypted => 0x06,
            BinarySubtype::Column => 0x07,
            BinarySubtype::Sensitive => 0x08,
            BinarySubtype::Reserved(x) => x,
            BinarySubtype::UserDefined(x) => x,
        }
    }
}

impl From<u8> for BinarySubtype {
    fn from(t: u8) -> BinarySubtype {
        match t {
            0x00 => BinarySubtype::Generic,
            0x01 => BinarySubtype::Function,
            0x02 => BinarySubtype::BinaryOld,
            0x03 => BinarySubtype::UuidOld,
            0x04 => BinarySubtype::Uuid,
            0x05 => BinarySubtype::Md5,
            0x06 => BinarySubtype::Encrypted,
            0x07 => BinarySubtype::Column,
            0x08 => BinarySubtype::Sensitive,
            0x09..=0x7F => BinarySubtype::Reserved(t),
            _ => BinarySubtype::UserDefined(t),
        }
    }
}

impl Default for BinarySubtype {
    fn default() -> Self {
        BinarySubtype::Generic
    }
}
