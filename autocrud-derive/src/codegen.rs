use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, Ident, Type};

use crate::attributes::{
    FieldAttrs, RelationAttrs, RelationKind, StructAttrs, apply_rename_all, parse_field_attrs,
    parse_struct_attrs,
};
use crate::field_analysis::{option_inner, relation_target, scalar_kind, type_ident};

/// Where `Identify::identity` reads its value from.
enum IdentitySource<'a> {
    Field {
        name: String,
        ident: &'a Ident,
        ty: &'a Type,
    },
    Embedded {
        ident: &'a Ident,
        ty: &'a Type,
    },
}

pub fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            ident,
            "Model can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new_spanned(
            ident,
            "Model can only be derived for structs with named fields",
        ));
    };

    let struct_attrs = parse_struct_attrs(&input.attrs)?;
    let type_name = struct_attrs
        .name
        .clone()
        .unwrap_or_else(|| ident.to_string());
    let table = struct_attrs
        .table
        .clone()
        .unwrap_or_else(|| format!("{}s", ident.to_string().to_snake_case()));

    let mut pushes = Vec::new();
    let mut explicit = None;
    let mut named_id = None;
    let mut embedded = None;

    for field in &named.named {
        let Some(field_ident) = field.ident.as_ref() else {
            continue;
        };
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let ty = &field.ty;

        if attrs.embed {
            pushes.push(quote! {
                fields.extend(<#ty as ::autocrud::Fields>::fields());
            });
            if embedded.is_none() {
                embedded = Some(IdentitySource::Embedded {
                    ident: field_ident,
                    ty,
                });
            }
            continue;
        }

        let raw = field_ident.unraw().to_string();
        let name = canonical_name(&attrs, &struct_attrs, &raw);
        let column = attrs.column.clone().unwrap_or_else(|| raw.to_snake_case());

        if let Some(relation) = &attrs.relation {
            pushes.push(relation_field(ident, ty, &name, &column, &raw, relation)?);
            continue;
        }

        let (inner, nullable) = option_inner(ty).map_or((ty, false), |inner| (inner, true));
        let kind = format_ident!("{}", scalar_kind(inner));
        let mut def = quote! {
            ::autocrud::FieldDef::new(#name, #column, ::autocrud::FieldKind::#kind)
        };
        if nullable {
            def = quote! { #def.nullable() };
        }
        if let Some(role) = attrs.role {
            let role = format_ident!("{}", role);
            def = quote! { #def.role(::autocrud::FieldRole::#role) };
        }
        pushes.push(quote! { fields.push(#def); });

        let source = || IdentitySource::Field {
            name: name.clone(),
            ident: field_ident,
            ty,
        };
        if attrs.identity {
            if explicit.is_some() {
                return Err(syn::Error::new_spanned(
                    field_ident,
                    "only one field can be marked `#[model(identity)]`",
                ));
            }
            explicit = Some(source());
        } else if raw == "id" {
            named_id = Some(source());
        }
    }

    let Some(identity) = explicit.or(embedded).or(named_id) else {
        return Err(syn::Error::new_spanned(
            ident,
            "Model needs an identity: an `id` field, a `#[model(identity)]` field \
             or an embedded model",
        ));
    };
    let identify_body = match identity {
        IdentitySource::Field { name, ident, ty } => quote! {
            type Id = #ty;

            fn identity(&self) -> (&'static str, Self::Id) {
                (#name, ::std::clone::Clone::clone(&self.#ident))
            }
        },
        IdentitySource::Embedded { ident, ty } => quote! {
            type Id = <#ty as ::autocrud::Identify>::Id;

            fn identity(&self) -> (&'static str, Self::Id) {
                ::autocrud::Identify::identity(&self.#ident)
            }
        },
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::autocrud::Identify for #ident #ty_generics #where_clause {
            #identify_body
        }

        impl #impl_generics ::autocrud::Fields for #ident #ty_generics #where_clause {
            fn fields() -> ::std::vec::Vec<::autocrud::FieldDef> {
                let mut fields = ::std::vec::Vec::new();
                #(#pushes)*
                fields
            }
        }

        impl #impl_generics ::autocrud::Model for #ident #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;
            const TABLE: &'static str = #table;
        }
    })
}

/// `#[model(name)]`, then `#[serde(rename)]`, then the container's
/// `rename_all`, then the identifier itself.
fn canonical_name(attrs: &FieldAttrs, struct_attrs: &StructAttrs, raw: &str) -> String {
    attrs
        .name
        .clone()
        .or_else(|| attrs.serde_rename.clone())
        .unwrap_or_else(|| {
            struct_attrs
                .rename_all
                .as_deref()
                .map_or_else(|| raw.to_string(), |rule| apply_rename_all(rule, raw))
        })
}

fn relation_field(
    owner: &Ident,
    ty: &Type,
    name: &str,
    column: &str,
    raw: &str,
    relation: &RelationAttrs,
) -> syn::Result<TokenStream> {
    let target = relation_target(ty);
    let Some(target_name) = type_ident(target) else {
        return Err(syn::Error::new_spanned(
            ty,
            "cannot determine the related model type",
        ));
    };
    let owner_snake = owner.to_string().to_snake_case();
    let join_table = relation
        .join_table
        .clone()
        .unwrap_or_else(|| format!("{owner_snake}_{}", raw.to_snake_case()));
    let parent_key = relation
        .parent_key
        .clone()
        .unwrap_or_else(|| format!("{owner_snake}_id"));
    let child_key = relation
        .child_key
        .clone()
        .unwrap_or_else(|| format!("{}_id", target_name.to_snake_case()));
    let cardinality = match relation.kind {
        RelationKind::Many => quote! { ::autocrud::Cardinality::Many },
        RelationKind::One => quote! { ::autocrud::Cardinality::One },
    };

    Ok(quote! {
        fields.push(::autocrud::FieldDef::new(
            #name,
            #column,
            ::autocrud::FieldKind::Relation(::autocrud::Relation {
                target: ::autocrud::ModelSchema::of::<#target>,
                join_table: #join_table,
                parent_key: #parent_key,
                child_key: #child_key,
                cardinality: #cardinality,
            }),
        ));
    })
}
