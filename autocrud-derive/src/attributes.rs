use heck::{
    ToKebabCase, ToLowerCamelCase, ToShoutyKebabCase, ToShoutySnakeCase, ToSnakeCase,
    ToUpperCamelCase,
};
use syn::meta::ParseNestedMeta;
use syn::{Attribute, LitStr, Token};

/// `#[model(...)]` on the struct, plus the serde settings that change keys.
#[derive(Default)]
pub struct StructAttrs {
    pub table: Option<String>,
    pub name: Option<String>,
    pub rename_all: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Many,
    One,
}

pub struct RelationAttrs {
    pub kind: RelationKind,
    pub join_table: Option<String>,
    pub parent_key: Option<String>,
    pub child_key: Option<String>,
}

/// `#[model(...)]` on a field, plus `#[serde(rename/flatten/skip)]`.
#[derive(Default)]
pub struct FieldAttrs {
    pub identity: bool,
    pub embed: bool,
    pub skip: bool,
    pub column: Option<String>,
    pub name: Option<String>,
    pub serde_rename: Option<String>,
    /// `FieldRole` variant name, e.g. `CreatedAt`.
    pub role: Option<&'static str>,
    pub relation: Option<RelationAttrs>,
}

pub fn parse_struct_attrs(attrs: &[Attribute]) -> syn::Result<StructAttrs> {
    let mut parsed = StructAttrs::default();
    for attr in attrs {
        if attr.path().is_ident("model") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    parsed.table = Some(string_value(&meta)?);
                } else if meta.path.is_ident("name") {
                    parsed.name = Some(string_value(&meta)?);
                } else {
                    return Err(meta.error("expected `table` or `name`"));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") && meta.input.peek(Token![=]) {
                    parsed.rename_all = Some(string_value(&meta)?);
                    Ok(())
                } else {
                    skip(&meta)
                }
            })?;
        }
    }
    Ok(parsed)
}

pub fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();
    for attr in attrs {
        if attr.path().is_ident("model") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("identity") {
                    parsed.identity = true;
                } else if meta.path.is_ident("embed") {
                    parsed.embed = true;
                } else if meta.path.is_ident("skip") {
                    parsed.skip = true;
                } else if meta.path.is_ident("created_at") {
                    parsed.role = Some("CreatedAt");
                } else if meta.path.is_ident("updated_at") {
                    parsed.role = Some("UpdatedAt");
                } else if meta.path.is_ident("deleted_at") {
                    parsed.role = Some("DeletedAt");
                } else if meta.path.is_ident("column") {
                    parsed.column = Some(string_value(&meta)?);
                } else if meta.path.is_ident("name") {
                    parsed.name = Some(string_value(&meta)?);
                } else if meta.path.is_ident("many") {
                    parsed.relation = Some(relation(&meta, RelationKind::Many)?);
                } else if meta.path.is_ident("one") {
                    parsed.relation = Some(relation(&meta, RelationKind::One)?);
                } else {
                    return Err(meta.error(
                        "expected one of `identity`, `embed`, `skip`, `column`, `name`, `many`, `one`, \
                         `created_at`, `updated_at`, `deleted_at`",
                    ));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                    parsed.serde_rename = Some(string_value(&meta)?);
                    Ok(())
                } else if meta.path.is_ident("flatten") {
                    parsed.embed = true;
                    Ok(())
                } else if meta.path.is_ident("skip") {
                    parsed.skip = true;
                    Ok(())
                } else {
                    skip(&meta)
                }
            })?;
        }
    }
    Ok(parsed)
}

fn relation(meta: &ParseNestedMeta, kind: RelationKind) -> syn::Result<RelationAttrs> {
    let mut attrs = RelationAttrs {
        kind,
        join_table: None,
        parent_key: None,
        child_key: None,
    };
    if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| {
            if inner.path.is_ident("join_table") {
                attrs.join_table = Some(string_value(&inner)?);
            } else if inner.path.is_ident("parent_key") {
                attrs.parent_key = Some(string_value(&inner)?);
            } else if inner.path.is_ident("child_key") {
                attrs.child_key = Some(string_value(&inner)?);
            } else {
                return Err(inner.error("expected `join_table`, `parent_key` or `child_key`"));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

fn string_value(meta: &ParseNestedMeta) -> syn::Result<String> {
    Ok(meta.value()?.parse::<LitStr>()?.value())
}

/// Consumes an attribute item this macro does not care about.
fn skip(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<syn::Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip(&inner))?;
    }
    Ok(())
}

/// Applies a serde `rename_all` rule to a field identifier.
pub fn apply_rename_all(rule: &str, ident: &str) -> String {
    match rule {
        "lowercase" => ident.to_lowercase(),
        "UPPERCASE" => ident.to_uppercase(),
        "PascalCase" => ident.to_upper_camel_case(),
        "camelCase" => ident.to_lower_camel_case(),
        "snake_case" => ident.to_snake_case(),
        "SCREAMING_SNAKE_CASE" => ident.to_shouty_snake_case(),
        "kebab-case" => ident.to_kebab_case(),
        "SCREAMING-KEBAB-CASE" => ident.to_shouty_kebab_case(),
        _ => ident.to_string(),
    }
}
