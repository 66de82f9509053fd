//! Record metadata and the process-wide schema cache.
//!
//! `#[derive(Bson)]` emits a [`RecordMeta`] describing each record's fields along
//! with their raw `#[bson("...")]` tag strings. The tag grammar is parsed here, at
//! the first encode or decode of each record type, and the resulting field plan is
//! memoized for the life of the process.

use std::{
    any::TypeId,
    collections::HashMap,
    sync::{Arc, LazyLock, RwLock},
};

use crate::{
    error::{ErrorKind, Result},
    field::Field,
};

/// Compile-time description of one record type, emitted by `#[derive(Bson)]`.
#[derive(Debug)]
pub struct RecordMeta {
    /// The record type's name, used in schema error messages.
    pub name: &'static str,
    /// Accessor for the record type's [`TypeId`], the schema cache key.
    pub type_id: fn() -> TypeId,
    /// The record's fields, in declaration order.
    pub fields: &'static [FieldDecl],
}

/// Compile-time description of one record field.
#[derive(Debug)]
pub struct FieldDecl {
    /// The Rust field name.
    pub name: &'static str,
    /// The raw `#[bson("...")]` tag string, if the field carries one.
    pub tag: Option<&'static str>,
    /// The field type's own metadata when it is (or wraps) a record; `None` otherwise.
    pub record: Option<&'static RecordMeta>,
}

/// A type with derive-emitted record metadata.
pub trait Record: 'static {
    /// The metadata emitted by `#[derive(Bson)]`.
    const META: &'static RecordMeta;
}

/// Dynamic access to a record's metadata and field slots.
///
/// Implemented by `#[derive(Bson)]`; the encoder and decoder use it to walk field
/// plans without knowing the record's concrete type.
pub trait Fields {
    /// The metadata for this record's type.
    fn meta(&self) -> &'static RecordMeta;
    /// The field slot at `index` within [`RecordMeta::fields`].
    fn field(&self, index: usize) -> &dyn Field;
    /// The mutable field slot at `index` within [`RecordMeta::fields`].
    fn field_mut(&mut self, index: usize) -> &mut dyn Field;
}

/// Compile-time link from a field type to record metadata.
///
/// Every [`Field`] implementation carries this; only records (and containers that
/// forward to one, like `Box`) override the default of `None`. The derive macro
/// reads it to wire [`FieldDecl::record`].
pub trait FieldType: Field {
    /// Metadata for the record this field type represents, if any.
    const RECORD_META: Option<&'static RecordMeta> = None;
}

/// One entry of a computed schema: a document key and the location it maps to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldPlan {
    /// The document key this field is stored under.
    pub key: String,
    /// Field indices from the planned record down to the leaf slot. The path has
    /// more than one element only for fields spliced in by `inline`.
    pub path: Vec<usize>,
    /// Whether the field is skipped when its value is empty.
    pub omit_empty: bool,
    /// Whether a 64-bit value is narrowed to a 32-bit element when it fits.
    pub min_size: bool,
}

/// The computed field plan for one record type.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct Schema {
    fields: Vec<FieldPlan>,
    by_key: HashMap<String, usize>,
}

impl Schema {
    /// The planned fields in encode order.
    pub fn fields(&self) -> &[FieldPlan] {
        &self.fields
    }

    /// Looks up the plan entry for a document key.
    pub fn field_by_key(&self, key: &str) -> Option<&FieldPlan> {
        self.by_key.get(key).map(|&index| &self.fields[index])
    }
}

static SCHEMAS: LazyLock<RwLock<HashMap<TypeId, Arc<Schema>>>> =
    LazyLock::new(Default::default);

/// Returns the memoized schema for the record type `T`, computing it on first use.
///
/// Schema definition errors (`UnknownFlag`, `DuplicateKey`, `InlineNonRecord`,
/// `InlineCycle`, `LegacyTag`) surface here, on the first plan attempt for the type.
pub fn plan<T: Record>() -> Result<Arc<Schema>> {
    plan_meta(T::META)
}

pub(crate) fn plan_meta(meta: &'static RecordMeta) -> Result<Arc<Schema>> {
    let id = (meta.type_id)();
    {
        let table = SCHEMAS.read().unwrap_or_else(|e| e.into_inner());
        if let Some(schema) = table.get(&id) {
            return Ok(schema.clone());
        }
    }

    // Computed outside the lock; concurrent misses may race, the first publish wins.
    let schema = build_schema(meta)?;
    #[cfg(feature = "tracing-unstable")]
    tracing::debug!(
        record = meta.name,
        fields = schema.fields().len(),
        "computed bson schema"
    );

    let mut table = SCHEMAS.write().unwrap_or_else(|e| e.into_inner());
    Ok(table.entry(id).or_insert_with(|| Arc::new(schema)).clone())
}

fn build_schema(meta: &'static RecordMeta) -> Result<Schema> {
    let mut schema = Schema::default();
    let mut stack = vec![(meta.type_id)()];
    flatten(meta, meta, &mut Vec::new(), &mut stack, &mut schema)?;
    Ok(schema)
}

fn flatten(
    root: &'static RecordMeta,
    meta: &'static RecordMeta,
    prefix: &mut Vec<usize>,
    stack: &mut Vec<TypeId>,
    schema: &mut Schema,
) -> Result<()> {
    for (index, decl) in meta.fields.iter().enumerate() {
        let Some(tag) = parse_tag(meta, decl)? else {
            continue;
        };

        if tag.inline {
            let inner = decl.record.ok_or(ErrorKind::InlineNonRecord {
                record: meta.name,
                field: decl.name,
            })?;
            let inner_id = (inner.type_id)();
            if stack.contains(&inner_id) {
                return Err(ErrorKind::InlineCycle {
                    record: inner.name,
                }
                .into());
            }
            stack.push(inner_id);
            prefix.push(index);
            flatten(root, inner, prefix, stack, schema)?;
            prefix.pop();
            stack.pop();
            continue;
        }

        let key = match tag.key {
            Some(key) => key,
            None => decl.name.to_lowercase(),
        };
        let mut path = prefix.clone();
        path.push(index);
        if schema
            .by_key
            .insert(key.clone(), schema.fields.len())
            .is_some()
        {
            return Err(ErrorKind::DuplicateKey {
                record: root.name,
                key,
            }
            .into());
        }
        schema.fields.push(FieldPlan {
            key,
            path,
            omit_empty: tag.omit_empty,
            min_size: tag.min_size,
        });
    }
    Ok(())
}

#[derive(Debug, Default)]
struct TagSpec {
    key: Option<String>,
    omit_empty: bool,
    min_size: bool,
    inline: bool,
}

/// Parses one field's tag. Returns `None` for fields excluded with `"-"`.
fn parse_tag(meta: &'static RecordMeta, decl: &FieldDecl) -> Result<Option<TagSpec>> {
    let raw = decl.tag.unwrap_or("");
    if raw == "-" {
        return Ok(None);
    }

    if let Some((key, letters)) = raw.split_once('/') {
        let mut replacement = key.to_string();
        for letter in letters.chars() {
            match letter {
                'c' => replacement.push_str(",omitempty"),
                's' => replacement.push_str(",minsize"),
                _ => {}
            }
        }
        return Err(ErrorKind::LegacyTag {
            record: meta.name,
            field: decl.name,
            tag: raw.to_string(),
            replacement,
        }
        .into());
    }

    let mut parts = raw.split(',');
    let key = parts.next().unwrap_or("");
    let mut spec = TagSpec {
        key: (!key.is_empty()).then(|| key.to_string()),
        ..TagSpec::default()
    };
    for flag in parts {
        match flag {
            "omitempty" => spec.omit_empty = true,
            "minsize" => spec.min_size = true,
            "inline" => spec.inline = true,
            other => {
                return Err(ErrorKind::UnknownFlag {
                    record: meta.name,
                    field: decl.name,
                    flag: other.to_string(),
                }
                .into())
            }
        }
    }
    Ok(Some(spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    static EMPTY_META: RecordMeta = RecordMeta {
        name: "Test",
        type_id: TypeId::of::<()>,
        fields: &[],
    };

    fn decl(tag: Option<&'static str>) -> FieldDecl {
        FieldDecl {
            name: "value",
            tag,
            record: None,
        }
    }

    fn parse(tag: Option<&'static str>) -> Result<Option<TagSpec>> {
        parse_tag(&EMPTY_META, &decl(tag))
    }

    #[test]
    fn untagged_field_uses_no_key() {
        let spec = parse(None).unwrap().unwrap();
        assert_eq!(spec.key, None);
        assert!(!spec.omit_empty && !spec.min_size && !spec.inline);
    }

    #[test]
    fn dash_excludes() {
        assert!(parse(Some("-")).unwrap().is_none());
    }

    #[test]
    fn key_and_flags() {
        let spec = parse(Some("myc,omitempty,minsize")).unwrap().unwrap();
        assert_eq!(spec.key.as_deref(), Some("myc"));
        assert!(spec.omit_empty);
        assert!(spec.min_size);
    }

    #[test]
    fn bare_flags_leave_default_key() {
        let spec = parse(Some(",minsize")).unwrap().unwrap();
        assert_eq!(spec.key, None);
        assert!(spec.min_size);
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let err = parse(Some("key,omitEmpty")).unwrap_err();
        assert!(matches!(
            err.kind.as_ref(),
            ErrorKind::UnknownFlag { flag, .. } if flag == "omitEmpty"
        ));
    }

    #[test]
    fn legacy_tag_suggests_replacement() {
        let err = parse(Some("name/cs")).unwrap_err();
        match err.kind.as_ref() {
            ErrorKind::LegacyTag { replacement, .. } => {
                assert_eq!(replacement, "name,omitempty,minsize");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn legacy_tag_with_unknown_letter_still_rejects() {
        assert!(matches!(
            parse(Some("name/x")).unwrap_err().kind.as_ref(),
            ErrorKind::LegacyTag { .. }
        ));
    }
}
