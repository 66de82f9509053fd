#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(
    feature = "cargo-clippy",
    allow(
        clippy::unreadable_literal,
        clippy::cognitive_complexity,
        clippy::float_cmp,
        clippy::match_like_matches_macro
    )
)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod bson;
mod datetime;
mod decode;
mod document;
mod encode;
pub mod error;
mod field;
mod macros;
pub mod oid;
mod raw;
pub mod schema;
pub mod spec;

pub use crate::{
    bson::{Binary, Bson, JavaScript, MaxKey, MinKey, Regex, Symbol, Timestamp, Undefined},
    datetime::DateTime,
    decode::{from_slice, from_slice_to, Decode},
    document::{Document, M},
    encode::{to_vec, Encode, Encoder},
    error::{Error, ErrorKind},
    field::{Field, Getter, Setter},
    oid::ObjectId,
    raw::{Raw, RawBsonRef},
};

#[doc(hidden)]
pub use crate::decode::decode_record;

/// Derives the record traits ([`schema::Record`], [`schema::Fields`], [`Field`],
/// [`Encode`], and [`Decode`]) for a struct with named fields.
pub use bson_internal_macros::Bson;
