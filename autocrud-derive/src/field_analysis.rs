use syn::{GenericArgument, PathArguments, Type};

/// Storage kind of a scalar field, named after `autocrud::FieldKind`.
pub fn scalar_kind(ty: &Type) -> &'static str {
    let Some(ident) = last_segment(ty).map(|s| s.ident.to_string()) else {
        return "Json";
    };
    match ident.as_str() {
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" | "isize" | "usize" => {
            "Integer"
        }
        "f32" | "f64" | "Decimal" => "Float",
        "bool" => "Boolean",
        "String" | "str" | "char" => "Text",
        "DateTime" | "NaiveDateTime" => "Timestamp",
        "Uuid" => "Uuid",
        _ => "Json",
    }
}

/// `Option<T>` gives `T`.
pub fn option_inner(ty: &Type) -> Option<&Type> {
    generic_inner(ty, "Option")
}

/// The model type behind a relation field: `Vec<T>`, `Option<T>`, `Box<T>`
/// and combinations of them are unwrapped.
pub fn relation_target(ty: &Type) -> &Type {
    ["Vec", "Option", "Box"]
        .iter()
        .find_map(|wrapper| generic_inner(ty, wrapper))
        .map_or(ty, relation_target)
}

fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let segment = last_segment(ty)?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    })
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) => path.path.segments.last(),
        Type::Reference(reference) => last_segment(&reference.elem),
        _ => None,
    }
}

/// Name of the type itself, e.g. `Todo` for `crate::models::Todo`.
pub fn type_ident(ty: &Type) -> Option<String> {
    last_segment(ty).map(|s| s.ident.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_scalar_kinds() {
        assert_eq!(scalar_kind(&parse_quote!(i64)), "Integer");
        assert_eq!(scalar_kind(&parse_quote!(String)), "Text");
        assert_eq!(scalar_kind(&parse_quote!(chrono::DateTime<chrono::Utc>)), "Timestamp");
        assert_eq!(scalar_kind(&parse_quote!(uuid::Uuid)), "Uuid");
        assert_eq!(scalar_kind(&parse_quote!(serde_json::Value)), "Json");
    }

    #[test]
    fn test_relation_target_unwraps_containers() {
        let ty: Type = parse_quote!(Vec<Box<Todo>>);
        assert_eq!(type_ident(relation_target(&ty)).as_deref(), Some("Todo"));
        let ty: Type = parse_quote!(Option<Owner>);
        assert_eq!(type_ident(relation_target(&ty)).as_deref(), Some("Owner"));
    }

    #[test]
    fn test_option_inner() {
        let ty: Type = parse_quote!(Option<i32>);
        assert!(option_inner(&ty).is_some());
        assert!(option_inner(&parse_quote!(i32)).is_none());
    }
}
