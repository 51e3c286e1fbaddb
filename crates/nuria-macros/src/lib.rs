//! Procedural macros for the Nuria reflection system.
//!
//! This crate provides `#[derive(MetaType)]`, which implements
//! `nuria_core::meta::MetaType` for a struct with named fields by building a
//! `RuntimeMetaObject` describing it.
//!
//! # Attributes
//!
//! ## Struct level
//!
//! ```ignore
//! #[derive(MetaType, Default, Clone)]
//! #[meta(name = "Circle", base = "Shape", annotate(key = "table", value = "circles"))]
//! struct Circle {
//!     radius: f64,
//! }
//! ```
//!
//! - `name = "..."`: the class name (defaults to the struct name)
//! - `base = "..."`: a base class; may be repeated
//! - `annotate(key = "...", value = ...)`: a class annotation
//! - `no_constructor`: don't generate the `Default` constructor
//!
//! ## Field level
//!
//! ```ignore
//! #[derive(MetaType, Default, Clone)]
//! struct Node {
//!     #[meta(rename = "id")]
//!     identifier: u64,
//!
//!     #[meta(read_only)]
//!     created: String,
//!
//!     #[meta(skip)]
//!     cache: Vec<u8>,
//!
//!     #[meta(object)]
//!     style: Style,
//!
//!     #[meta(object, pointer)]
//!     next: Option<Box<Node>>,
//! }
//! ```
//!
//! - `skip`: leave the field out
//! - `read_only`: no setter
//! - `rename = "..."`: the reflected field name
//! - `object`: the field is another `MetaType`, exchanged as an object
//! - `pointer` (with `object`): an `Option<Box<T>>` exposed as `T*`
//! - `annotate(key = "...", value = ...)`: a field annotation
//!
//! Every other field must implement `nuria_core::variant::VariantValue`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Field, Fields, GenericArgument, Ident, Lit, LitStr, PathArguments, Type,
    parse_macro_input,
};

/// Derive `nuria_core::meta::MetaType`.
///
/// The generated meta object has one read-write field per struct field,
/// a constructor named after the class calling `Default::default()`, and is
/// finalized.
///
/// # Example
///
/// ```ignore
/// use nuria_core::meta::{MetaType, global_meta_registry};
/// use nuria_macros::MetaType;
///
/// #[derive(MetaType, Default, Clone)]
/// struct Simple {
///     digit: i32,
///     string: String,
/// }
///
/// Simple::register_meta(global_meta_registry())?;
/// ```
#[proc_macro_derive(MetaType, attributes(meta))]
pub fn derive_meta_type(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_derive_meta_type(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// A `key = value` annotation.
struct Annotation {
    key: LitStr,
    value: Lit,
}

/// Parsed struct-level `#[meta(...)]` attributes.
#[derive(Default)]
struct TypeAttrs {
    name: Option<LitStr>,
    bases: Vec<LitStr>,
    annotations: Vec<Annotation>,
    no_constructor: bool,
}

/// How a field travels through a `Variant`.
enum FieldKind {
    /// Via `VariantValue`.
    Value,
    /// A nested `MetaType` stored by value.
    Object,
    /// A nested `MetaType` in an `Option<Box<T>>`; holds `T`.
    Pointer(Type),
}

/// Parsed field information.
struct FieldInfo {
    ident: Ident,
    ty: Type,
    name: String,
    read_only: bool,
    kind: FieldKind,
    annotations: Vec<Annotation>,
}

fn impl_derive_meta_type(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "MetaType derive does not support generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "MetaType derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(input, "MetaType derive only supports structs"));
        }
    };

    let type_attrs = parse_type_attrs(&input.attrs)?;
    let class_name = match &type_attrs.name {
        Some(name) => name.value(),
        None => struct_name.to_string(),
    };

    let mut infos = Vec::new();
    for field in fields {
        if let Some(info) = parse_field(field)? {
            infos.push(info);
        }
    }

    let bases = &type_attrs.bases;
    let class_annotations = type_attrs.annotations.iter().map(|Annotation { key, value }| {
        quote! { meta.add_annotation(#key, #value); }
    });

    let constructor = if type_attrs.no_constructor {
        quote! {}
    } else {
        quote! {
            meta.add_method(
                nuria_core::meta::MethodDescriptor::new(
                    #class_name,
                    nuria_core::meta::MethodKind::Constructor,
                    |_, _| {
                        nuria_core::variant::Variant::Object(nuria_core::variant::ObjectValue::new(
                            #class_name,
                            <#struct_name as ::core::default::Default>::default(),
                        ))
                    },
                )
                .returns(#class_name),
            );
        }
    };

    let field_descriptors = infos.iter().map(|info| generate_field(struct_name, info));

    Ok(quote! {
        impl nuria_core::meta::MetaType for #struct_name {
            const CLASS_NAME: &'static str = #class_name;

            fn meta_object() -> nuria_core::meta::RuntimeMetaObject {
                let mut meta = nuria_core::meta::RuntimeMetaObject::for_type::<#struct_name>(#class_name);
                #( meta.add_base_class(#bases); )*
                #( #class_annotations )*
                #constructor
                #( meta.add_field(#field_descriptors); )*
                meta.finalize();
                meta
            }
        }
    })
}

/// Parse struct-level `#[meta(...)]` attributes.
fn parse_type_attrs(attrs: &[Attribute]) -> syn::Result<TypeAttrs> {
    let mut result = TypeAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("meta") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                result.name = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("base") {
                result.bases.push(meta.value()?.parse()?);
            } else if meta.path.is_ident("annotate") {
                result.annotations.push(parse_annotation(&meta)?);
            } else if meta.path.is_ident("no_constructor") {
                result.no_constructor = true;
            } else {
                return Err(meta.error("unknown meta attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

/// Parse `annotate(key = "...", value = ...)`.
fn parse_annotation(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<Annotation> {
    let mut key = None;
    let mut value = None;
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("key") {
            key = Some(inner.value()?.parse::<LitStr>()?);
        } else if inner.path.is_ident("value") {
            value = Some(inner.value()?.parse::<Lit>()?);
        } else {
            return Err(inner.error("expected `key` or `value`"));
        }
        Ok(())
    })?;

    match (key, value) {
        (Some(key), Some(value)) => Ok(Annotation { key, value }),
        _ => Err(meta.error("annotate needs both `key` and `value`")),
    }
}

/// Parse a field and its `#[meta(...)]` attributes. Returns `None` for
/// skipped fields.
fn parse_field(field: &Field) -> syn::Result<Option<FieldInfo>> {
    let Some(ident) = field.ident.clone() else {
        return Ok(None);
    };

    let mut skip = false;
    let mut read_only = false;
    let mut object = false;
    let mut pointer = false;
    let mut rename = None;
    let mut annotations = Vec::new();

    for attr in &field.attrs {
        if !attr.path().is_ident("meta") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
            } else if meta.path.is_ident("read_only") {
                read_only = true;
            } else if meta.path.is_ident("object") {
                object = true;
            } else if meta.path.is_ident("pointer") {
                pointer = true;
            } else if meta.path.is_ident("rename") {
                rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("annotate") {
                annotations.push(parse_annotation(&meta)?);
            } else {
                return Err(meta.error("unknown meta attribute"));
            }
            Ok(())
        })?;
    }

    if skip {
        return Ok(None);
    }

    let kind = match (object, pointer) {
        (false, false) => FieldKind::Value,
        (true, false) => FieldKind::Object,
        (true, true) => match option_box_inner(&field.ty) {
            Some(inner) => FieldKind::Pointer(inner),
            None => {
                return Err(syn::Error::new_spanned(
                    &field.ty,
                    "`pointer` fields must have type `Option<Box<T>>`",
                ));
            }
        },
        (false, true) => {
            return Err(syn::Error::new_spanned(&ident, "`pointer` requires `object`"));
        }
    };

    // Raw identifiers keep their `r#` prefix in `to_string`.
    let name = rename.unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string());

    Ok(Some(FieldInfo {
        ident,
        ty: field.ty.clone(),
        name,
        read_only,
        kind,
        annotations,
    }))
}

/// The single generic argument of a path type named `wrapper`.
fn generic_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// Extract `T` from `Option<Box<T>>`.
fn option_box_inner(ty: &Type) -> Option<Type> {
    let boxed = generic_argument(ty, "Option")?;
    generic_argument(boxed, "Box").cloned()
}

/// Generate the `FieldDescriptor` expression of a field.
fn generate_field(struct_name: &Ident, info: &FieldInfo) -> TokenStream2 {
    let ident = &info.ident;
    let ty = &info.ty;
    let name = &info.name;

    let (type_name, getter, setter) = match &info.kind {
        FieldKind::Value => (
            quote! { <#ty as nuria_core::variant::VariantValue>::TYPE_NAME },
            quote! {
                nuria_core::variant::VariantValue::into_variant(::core::clone::Clone::clone(&this.#ident))
            },
            quote! {
                match <#ty as nuria_core::variant::VariantValue>::from_variant(&value) {
                    Some(value) => {
                        this.#ident = value;
                        true
                    }
                    None => false,
                }
            },
        ),
        FieldKind::Object => (
            quote! { <#ty as nuria_core::meta::MetaType>::CLASS_NAME },
            quote! {
                nuria_core::variant::Variant::Object(nuria_core::variant::ObjectValue::new(
                    <#ty as nuria_core::meta::MetaType>::CLASS_NAME,
                    ::core::clone::Clone::clone(&this.#ident),
                ))
            },
            quote! {
                match value.as_object().and_then(|object| object.take_as::<#ty>()) {
                    Some(value) => {
                        this.#ident = value;
                        true
                    }
                    None => false,
                }
            },
        ),
        FieldKind::Pointer(inner) => (
            quote! { ::std::format!("{}*", <#inner as nuria_core::meta::MetaType>::CLASS_NAME) },
            quote! {
                match &this.#ident {
                    Some(value) => nuria_core::variant::Variant::Object(nuria_core::variant::ObjectValue::new(
                        <#inner as nuria_core::meta::MetaType>::CLASS_NAME,
                        ::core::clone::Clone::clone(&**value),
                    )),
                    None => nuria_core::variant::Variant::Invalid,
                }
            },
            quote! {
                match value {
                    nuria_core::variant::Variant::Invalid => {
                        this.#ident = None;
                        true
                    }
                    nuria_core::variant::Variant::Object(object) => match object.take_as::<#inner>() {
                        Some(value) => {
                            this.#ident = Some(::std::boxed::Box::new(value));
                            true
                        }
                        None => false,
                    },
                    _ => false,
                }
            },
        ),
    };

    let annotations = info.annotations.iter().map(|Annotation { key, value }| {
        quote! { .annotate(#key, #value) }
    });

    let setter = if info.read_only {
        quote! {}
    } else {
        quote! {
            .with_setter(|object: &mut dyn ::std::any::Any, value: nuria_core::variant::Variant| {
                match object.downcast_mut::<#struct_name>() {
                    Some(this) => #setter,
                    None => false,
                }
            })
        }
    };

    quote! {
        nuria_core::meta::FieldDescriptor::new(
            #name,
            #type_name,
            |object: &dyn ::std::any::Any| match object.downcast_ref::<#struct_name>() {
                Some(this) => #getter,
                None => nuria_core::variant::Variant::Invalid,
            },
        )
        #setter
        #( #annotations )*
    }
}
