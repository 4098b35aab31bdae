extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use std::collections::HashSet;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, Lit};

/// Type-level attributes parsed from `#[typewire(...)]` on the struct or enum
///
/// * `name` - Type name written to the wire
/// * `collection` - Collection the record belongs to
#[derive(Debug, Clone, Default)]
struct TypeAttributes {
    name: Option<String>,
    collection: Option<String>,
}

/// Field and variant attributes parsed from `#[typewire(...)]`
///
/// * `rename` - Name written to the wire instead of the Rust identifier
/// * `skip` - The field is not part of the record
#[derive(Debug, Clone, Default)]
struct FieldAttributes {
    rename: Option<String>,
    skip: bool,
}

/// Parses `key = "value"` and bare `key` items of every `#[typewire(...)]`
/// attribute in `attrs`, calling `apply` for each one.
fn parse_typewire_attrs(
    attrs: &[Attribute],
    mut apply: impl FnMut(&syn::Ident, Option<syn::LitStr>) -> syn::Result<()>,
) -> syn::Result<()> {
    for attr in attrs {
        if !attr.path().is_ident("typewire") {
            continue;
        }
        attr.parse_args_with(|input: syn::parse::ParseStream| {
            while !input.is_empty() {
                let ident = input.parse::<syn::Ident>()?;
                let value = if input.peek(syn::Token![=]) {
                    input.parse::<syn::Token![=]>()?;
                    Some(input.parse::<syn::LitStr>()?)
                } else {
                    None
                };
                apply(&ident, value)?;

                // Consume comma if present, otherwise end
                if input.peek(syn::Token![,]) {
                    input.parse::<syn::Token![,]>()?;
                }
            }
            Ok(())
        })?;
    }
    Ok(())
}

fn require_value(ident: &syn::Ident, value: Option<syn::LitStr>) -> syn::Result<String> {
    match value {
        Some(lit) if !lit.value().is_empty() => Ok(lit.value()),
        Some(lit) => Err(syn::Error::new(lit.span(), "Name must not be empty")),
        None => Err(syn::Error::new(
            ident.span(),
            format!("`{}` expects a string value", ident),
        )),
    }
}

fn get_type_attributes(attrs: &[Attribute]) -> syn::Result<TypeAttributes> {
    let mut parsed = TypeAttributes::default();
    parse_typewire_attrs(attrs, |ident, value| {
        if ident == "name" {
            parsed.name = Some(require_value(ident, value)?);
        } else if ident == "collection" {
            parsed.collection = Some(require_value(ident, value)?);
        } else {
            return Err(syn::Error::new(
                ident.span(),
                format!("Unknown attribute: {}", ident),
            ));
        }
        Ok(())
    })?;
    Ok(parsed)
}

fn get_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldAttributes> {
    let mut parsed = FieldAttributes::default();
    parse_typewire_attrs(attrs, |ident, value| {
        if ident == "rename" {
            parsed.rename = Some(require_value(ident, value)?);
        } else if ident == "skip" {
            parsed.skip = true;
        } else {
            return Err(syn::Error::new(
                ident.span(),
                format!("Unknown attribute: {}", ident),
            ));
        }
        Ok(())
    })?;
    Ok(parsed)
}

/// Derive macro implementing `Record` and `FieldValue` for a struct
///
/// Every named field becomes a record field whose wire name is the field
/// name, or the `rename` value. Field types must implement `FieldValue`.
///
/// # Supported Attributes
///
/// * `#[typewire(name = "Name")]` - Type name written to the wire
/// * `#[typewire(collection = "name")]` - Collection of the record
/// * `#[typewire(rename = "name")]` - Wire name of a field
/// * `#[typewire(skip)]` - Leave a field out of the record
///
/// # Examples
///
/// ```rust,ignore
/// #[derive(Record, Debug, Clone, Default, PartialEq)]
/// #[typewire(collection = "people")]
/// struct Person {
///     #[typewire(rename = "full_name")]
///     name: String,
///     age: Option<u16>,
/// }
/// ```
#[proc_macro_derive(Record, attributes(typewire))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_record(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_record(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let type_attrs = get_type_attributes(&input.attrs)?;
    let type_name = type_attrs.name.unwrap_or_else(|| name.to_string());
    let collection = match type_attrs.collection {
        Some(collection) => quote! { ::core::option::Option::Some(#collection) },
        None => quote! { ::core::option::Option::None },
    };

    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Record can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Record can only be derived for structs",
            ))
        }
    };

    let mut accessors = Vec::new();
    let mut used_names = HashSet::new();
    for f in fields {
        let attrs = get_field_attributes(&f.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = f.ident.as_ref() else {
            continue;
        };
        let ty = &f.ty;
        let wire_name = attrs.rename.unwrap_or_else(|| ident.to_string());
        if !used_names.insert(wire_name.clone()) {
            return Err(syn::Error::new_spanned(
                ident,
                format!(
                    "Field name '{}' is duplicated for struct '{}'. \
                     Use #[typewire(rename = ...)] to pick another.",
                    wire_name, name
                ),
            ));
        }
        accessors.push(quote! {
            typewire::FieldAccessor {
                name: #wire_name,
                field_type: <#ty as typewire::FieldValue>::field_type(),
                get: |record: &Self| typewire::FieldValue::to_value(&record.#ident),
                set: |record: &mut Self, value: typewire::Value| {
                    record.#ident = <#ty as typewire::FieldValue>::from_value(value)?;
                    ::core::result::Result::Ok(())
                },
            }
        });
    }

    Ok(quote! {
        impl #impl_generics typewire::Record for #name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;
            const COLLECTION: ::core::option::Option<&'static str> = #collection;

            fn fields() -> ::std::vec::Vec<typewire::FieldAccessor<Self>> {
                ::std::vec![#(#accessors),*]
            }
        }

        impl #impl_generics typewire::FieldValue for #name #ty_generics #where_clause {
            fn field_type() -> typewire::FieldType {
                typewire::FieldType::Record {
                    ty: typewire::RecordType::of::<Self>(),
                    nullable: false,
                }
            }

            fn to_value(&self) -> typewire::Value {
                typewire::Value::record(::core::clone::Clone::clone(self))
            }

            fn from_value(value: typewire::Value) -> typewire::Result<Self> {
                value.into_record::<Self>()
            }
        }
    })
}

/// Derive macro implementing `FieldValue` for a fieldless enum
///
/// Values are written as `EnumString` with the variant name (or its
/// `rename` value). Reading also accepts the variant's discriminant, so a
/// field that used to hold an integer keeps decoding.
#[proc_macro_derive(WireEnum, attributes(typewire))]
pub fn derive_wire_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_wire_enum(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_wire_enum(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let type_attrs = get_type_attributes(&input.attrs)?;
    let enum_name = type_attrs.name.unwrap_or_else(|| name.to_string());

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "WireEnum can only be derived for enums",
        ));
    };

    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            name,
            "WireEnum needs at least one variant",
        ));
    }

    let mut to_arms = Vec::new();
    let mut from_arms = Vec::new();
    let mut used_names = HashSet::new();
    let mut discriminant: i128 = 0;
    for v in &data.variants {
        if !matches!(v.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                &v.ident,
                "WireEnum variants cannot carry fields",
            ));
        }
        if let Some((_, expr)) = &v.discriminant {
            discriminant = match expr {
                Expr::Lit(syn::ExprLit {
                    lit: Lit::Int(lit), ..
                }) => lit.base10_parse::<i128>()?,
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "WireEnum discriminants must be integer literals",
                    ))
                }
            };
        }
        let ident = &v.ident;
        let attrs = get_field_attributes(&v.attrs)?;
        if attrs.skip {
            return Err(syn::Error::new_spanned(ident, "Variants cannot be skipped"));
        }
        let wire_name = attrs.rename.unwrap_or_else(|| ident.to_string());
        if !used_names.insert(wire_name.clone()) {
            return Err(syn::Error::new_spanned(
                ident,
                format!(
                    "Variant name '{}' is duplicated for enum '{}'.",
                    wire_name, name
                ),
            ));
        }
        let index = discriminant.to_string();
        to_arms.push(quote! { #name::#ident => #wire_name });
        from_arms.push(quote! {
            #wire_name | #index => ::core::result::Result::Ok(#name::#ident)
        });
        discriminant += 1;
    }

    Ok(quote! {
        impl #impl_generics typewire::FieldValue for #name #ty_generics #where_clause {
            fn field_type() -> typewire::FieldType {
                typewire::FieldType::Scalar(typewire::ScalarCodec::new(
                    typewire::ScalarKind::Enum,
                    false,
                ))
            }

            fn to_value(&self) -> typewire::Value {
                let name: &'static str = match self {
                    #(#to_arms,)*
                };
                typewire::Value::Enum(::std::string::String::from(name))
            }

            fn from_value(value: typewire::Value) -> typewire::Result<Self> {
                match typewire::coerce::coerce(value, typewire::ScalarKind::Enum)? {
                    typewire::Value::Enum(name) => match name.as_str() {
                        #(#from_arms,)*
                        _ => ::core::result::Result::Err(typewire::CodecError::UnknownVariant {
                            enum_name: #enum_name,
                            name,
                        }),
                    },
                    typewire::Value::Null => ::core::result::Result::Err(
                        typewire::CodecError::NullNotAllowed { declared: #enum_name },
                    ),
                    other => ::core::result::Result::Err(typewire::CodecError::TypeMismatch {
                        expected: #enum_name,
                        actual: ::std::string::ToString::to_string(other.type_name()),
                    }),
                }
            }
        }
    })
}
