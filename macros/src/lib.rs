//! Internal derive macros for the `bson` crate.

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Error, Fields, LitStr};

/// Derives the record traits that let a struct encode to and decode from BSON
/// documents.
///
/// Fields may carry a `#[bson("key,flag,...")]` attribute; the tag string itself is
/// parsed by the `bson` crate at the first encode or decode of the type, so tag
/// errors surface there rather than at compile time. The only tag handled here is
/// the exact string `"-"`, which removes the field from the record's metadata
/// entirely (its type then does not need to be a BSON field type).
#[proc_macro_derive(Bson, attributes(bson))]
pub fn derive_bson(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let name_str = name.to_string();

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "#[derive(Bson)] does not support generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::new_spanned(
                    name,
                    "#[derive(Bson)] requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new_spanned(
                name,
                "#[derive(Bson)] can only be applied to structs",
            ))
        }
    };

    let mut decls = Vec::new();
    let mut idents = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let tag = bson_tag(&field.attrs)?;
        if tag.as_deref() == Some("-") {
            continue;
        }
        let ty = &field.ty;
        let field_name = ident.to_string();
        let tag_tokens = match &tag {
            Some(tag) => quote!(::std::option::Option::Some(#tag)),
            None => quote!(::std::option::Option::None),
        };
        decls.push(quote! {
            ::bson::schema::FieldDecl {
                name: #field_name,
                tag: #tag_tokens,
                record: <#ty as ::bson::schema::FieldType>::RECORD_META,
            }
        });
        idents.push(ident);
    }

    let indices: Vec<usize> = (0..idents.len()).collect();

    Ok(quote! {
        #[automatically_derived]
        impl ::bson::schema::Record for #name {
            const META: &'static ::bson::schema::RecordMeta = &::bson::schema::RecordMeta {
                name: #name_str,
                type_id: ::std::any::TypeId::of::<#name>,
                fields: &[#(#decls),*],
            };
        }

        #[automatically_derived]
        impl ::bson::schema::Fields for #name {
            fn meta(&self) -> &'static ::bson::schema::RecordMeta {
                <Self as ::bson::schema::Record>::META
            }

            fn field(&self, index: usize) -> &dyn ::bson::Field {
                match index {
                    #(#indices => &self.#idents,)*
                    _ => unreachable!("bson record field index out of range"),
                }
            }

            fn field_mut(&mut self, index: usize) -> &mut dyn ::bson::Field {
                match index {
                    #(#indices => &mut self.#idents,)*
                    _ => unreachable!("bson record field index out of range"),
                }
            }
        }

        #[automatically_derived]
        impl ::bson::Field for #name {
            fn encode_element(
                &self,
                key: &str,
                enc: &mut ::bson::Encoder,
                _min_size: bool,
            ) -> ::bson::error::Result<()> {
                enc.append_record(key, self)
            }

            fn decode_element(&mut self, raw: ::bson::RawBsonRef<'_>) -> ::bson::error::Result<()> {
                if raw.kind == ::bson::spec::ElementType::EmbeddedDocument {
                    ::bson::decode_record(raw.bytes, self)
                } else {
                    ::std::result::Result::Err(::bson::Error::type_mismatch(raw.kind, #name_str))
                }
            }

            fn clear(&mut self) {
                #(::bson::Field::clear(&mut self.#idents);)*
            }

            fn as_fields(&self) -> ::std::option::Option<&dyn ::bson::schema::Fields> {
                ::std::option::Option::Some(self)
            }

            fn as_fields_mut(&mut self) -> ::std::option::Option<&mut dyn ::bson::schema::Fields> {
                ::std::option::Option::Some(self)
            }
        }

        #[automatically_derived]
        impl ::bson::schema::FieldType for #name {
            const RECORD_META: ::std::option::Option<&'static ::bson::schema::RecordMeta> =
                ::std::option::Option::Some(<Self as ::bson::schema::Record>::META);
        }

        #[automatically_derived]
        impl ::bson::Encode for #name {
            fn encode(&self, enc: &mut ::bson::Encoder) -> ::bson::error::Result<()> {
                enc.encode_record(self)
            }
        }

        #[automatically_derived]
        impl ::bson::Decode for #name {
            fn decode(&mut self, bytes: &[u8]) -> ::bson::error::Result<()> {
                ::bson::decode_record(bytes, self)
            }
        }
    })
}

fn bson_tag(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    let mut tag = None;
    for attr in attrs {
        if !attr.path().is_ident("bson") {
            continue;
        }
        if tag.is_some() {
            return Err(Error::new_spanned(attr, "duplicate #[bson] attribute"));
        }
        let lit: LitStr = attr.parse_args()?;
        tag = Some(lit.value());
    }
    Ok(tag)
}
