use std::collections::HashMap;

/// Maps loosely spelled field names (`created_at`, `Created-At`, `createdat`)
/// onto a model's canonical field names.
///
/// Matching is case-insensitive and ignores spaces, `-`, `_` and `/`. When two
/// fields normalize to the same key, the one declared first wins.
#[derive(Debug, Clone, Default)]
pub struct FieldResolver {
    names: HashMap<String, &'static str>,
}

impl FieldResolver {
    pub fn new(canonical: impl IntoIterator<Item = &'static str>) -> Self {
        let mut names = HashMap::new();
        for name in canonical {
            names.entry(normalize(name)).or_insert(name);
        }
        Self { names }
    }

    /// Returns the canonical name for `name`, or the normalized input when no
    /// field matches.
    #[must_use]
    pub fn resolve(&self, name: &str) -> String {
        let key = normalize(name);
        match self.names.get(&key) {
            Some(canonical) => (*canonical).to_string(),
            None => key,
        }
    }
}

/// Lower-cases `name` and strips spaces, `-`, `_` and `/`.
#[must_use]
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_' | '/'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> FieldResolver {
        FieldResolver::new(["ID", "CreatedAt", "title", "Todos"])
    }

    #[test]
    fn test_normalize_strips_separators() {
        assert_eq!(normalize("Created_At"), "createdat");
        assert_eq!(normalize("created-at"), "createdat");
        assert_eq!(normalize("created at/"), "createdat");
    }

    #[test]
    fn test_resolve_is_separator_and_case_insensitive() {
        let r = resolver();
        for spelling in ["created_at", "CREATED-AT", "createdAt", "Created At"] {
            assert_eq!(r.resolve(spelling), "CreatedAt", "spelling {spelling}");
        }
        assert_eq!(r.resolve("todos"), "Todos");
        assert_eq!(r.resolve("id"), "ID");
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let r = resolver();
        for name in ["created_at", "Title", "unknown_Field"] {
            let once = r.resolve(name);
            assert_eq!(r.resolve(&once), once);
        }
    }

    #[test]
    fn test_unknown_name_falls_back_to_normalized_input() {
        let r = resolver();
        assert_eq!(r.resolve("Not_A-Field"), "notafield");
    }

    #[test]
    fn test_first_declared_wins_on_collision() {
        let r = FieldResolver::new(["created_at", "CreatedAt"]);
        assert_eq!(r.resolve("createdat"), "created_at");
    }
}
