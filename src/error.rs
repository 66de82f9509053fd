//! Contains the `Error` and `Result` types that `bson` uses.

use thiserror::Error;

use crate::spec::ElementType;

/// The result type for all methods that can return an error in the `bson` crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur in the `bson` crate. The inner
/// [`ErrorKind`] is boxed to keep the type cheap to move through `Result`s.
#[derive(Clone, Debug, Error)]
#[error("{kind}")]
#[non_exhaustive]
pub struct Error {
    /// The type of error that occurred.
    pub kind: Box<ErrorKind>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
        }
    }

    /// Creates a `TypeMismatch` error for an element of the given kind that cannot be stored
    /// in the given target type.
    ///
    /// User [`Setter`](crate::Setter) implementations return this to request that the element
    /// be dropped rather than aborting the whole decode.
    pub fn type_mismatch(kind: ElementType, target: &'static str) -> Self {
        ErrorKind::TypeMismatch { kind, target }.into()
    }

    /// Creates an error wrapping an arbitrary message, for use by [`Getter`](crate::Getter)
    /// and [`Setter`](crate::Setter) implementations that need to abort a call.
    pub fn custom(message: impl Into<String>) -> Self {
        ErrorKind::Custom {
            message: message.into(),
        }
        .into()
    }

    /// Creates an `UnsupportedRoot` error for a top-level value that does not encode as a
    /// document.
    pub fn unsupported_root(type_name: &'static str) -> Self {
        ErrorKind::UnsupportedRoot { type_name }.into()
    }

    pub(crate) fn truncated(context: &'static str) -> Self {
        ErrorKind::Truncated { context }.into()
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ErrorKind::Malformed {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn invalid_hex(message: impl Into<String>) -> Self {
        ErrorKind::InvalidHex {
            message: message.into(),
        }
        .into()
    }

    /// Whether this error signals an element/target mismatch.
    ///
    /// Mismatches are consumed-and-skipped when they occur for a single element inside a
    /// record or collection; any other error aborts the call.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::TypeMismatch { .. })
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// The types of errors that can occur.
#[allow(missing_docs)]
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The top-level value handed to the encoder does not encode as a document.
    #[error("the top-level value must encode as a document; {type_name} does not")]
    UnsupportedRoot { type_name: &'static str },

    /// The input ended before the structure being read was complete.
    #[error("input ended unexpectedly while reading {context}")]
    Truncated { context: &'static str },

    /// The byte before a document's declared end is not the NUL terminator.
    #[error("document does not end with a NUL terminator")]
    BadTerminator,

    /// An element carried a kind tag outside the supported set.
    #[error("unrecognized element kind 0x{kind:02x}")]
    InvalidKind { kind: u8 },

    /// An element cannot be stored in the requested target type.
    #[error("cannot store a {kind:?} element in a value of type {target}")]
    TypeMismatch {
        kind: ElementType,
        target: &'static str,
    },

    /// Two fields of a record (possibly via inlining) map to the same document key.
    #[error("duplicate document key \"{key}\" in record {record}")]
    DuplicateKey { record: &'static str, key: String },

    /// A bson field tag carried a flag outside the supported set.
    #[error("unsupported flag \"{flag}\" in tag of {record}.{field}")]
    UnknownFlag {
        record: &'static str,
        field: &'static str,
        flag: String,
    },

    /// An `inline` flag was applied to a field whose type is not a record.
    #[error("inline flag on {record}.{field}, whose type is not a record")]
    InlineNonRecord {
        record: &'static str,
        field: &'static str,
    },

    /// Inlined records form a cycle.
    #[error("inline flags form a cycle through record {record}")]
    InlineCycle { record: &'static str },

    /// A field tag uses the retired slash-separated option syntax.
    #[error(
        "legacy tag \"{tag}\" on {record}.{field} is no longer supported; use \"{replacement}\" \
         instead"
    )]
    LegacyTag {
        record: &'static str,
        field: &'static str,
        tag: String,
        replacement: String,
    },

    /// An integer value does not fit in any BSON integer element.
    #[error("integer {value} does not fit in a BSON integer element")]
    IntegerOverflow { value: u64 },

    /// A document key or other cstring contains an interior NUL byte.
    #[error("cstring {value:?} contains an interior NUL byte")]
    InvalidCString { value: String },

    /// An ObjectId hex string is not 24 hexadecimal characters.
    #[error("invalid ObjectId hex string: {message}")]
    InvalidHex { message: String },

    /// A byte sequence is not a valid ObjectId.
    #[error("invalid ObjectId: {message}")]
    InvalidObjectId { message: String },

    /// The input parsed but its internal structure is inconsistent.
    #[error("malformed element: {message}")]
    Malformed { message: String },

    /// An error raised by a user `Getter` or `Setter` implementation.
    #[error("{message}")]
    Custom { message: String },
}
