//! Go identifier helpers.

use std::collections::BTreeSet;

/// Identifiers that can never name a local or parameter.
const RESERVED: &[&str] = &[
    // keywords
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
    // predeclared names the generated code relies on
    "err",
    "error",
    "nil",
    "true",
    "false",
    "string",
    "bool",
    "int",
    "any",
];

/// Lower-cases the first character.
#[must_use]
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Upper-cases the first character.
#[must_use]
pub fn title(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Returns true if `name` is a Go keyword or a predeclared name the
/// generated code uses.
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// Allocates identifiers within one Go scope.
#[derive(Debug, Clone, Default)]
pub struct Names {
    taken: BTreeSet<String>,
}

impl Names {
    /// Creates a scope with the given names already taken.
    #[must_use]
    pub fn with_taken<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            taken: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `name` cannot be declared in this scope.
    #[must_use]
    pub fn is_taken(&self, name: &str) -> bool {
        is_reserved(name) || self.taken.contains(name)
    }

    /// Marks a name as taken.
    pub fn take(&mut self, name: impl Into<String>) {
        self.taken.insert(name.into());
    }

    /// Claims a name derived from `base`.
    ///
    /// Candidates are tried in order: `base`, then `prefix` followed by
    /// `base`, then `base` with a counter.
    pub fn claim(&mut self, base: &str, prefix: &str) -> String {
        let prefixed = format!("{}{}", lower_first(prefix), title(base));
        let name = if !self.is_taken(base) {
            base.to_string()
        } else if !prefix.is_empty() && !self.is_taken(&prefixed) {
            prefixed
        } else {
            (2..)
                .map(|n| format!("{base}{n}"))
                .find(|candidate| !self.is_taken(candidate))
                .unwrap_or_else(|| format!("{base}_"))
        };
        self.taken.insert(name.clone());
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_helpers() {
        assert_eq!(lower_first("UserRepo"), "userRepo");
        assert_eq!(lower_first("DB"), "dB");
        assert_eq!(lower_first(""), "");
        assert_eq!(title("dsn"), "Dsn");
    }

    #[test]
    fn test_claim_disambiguates() {
        let mut names = Names::with_taken(["db"]);
        assert_eq!(names.claim("db", "store"), "storeDb");
        assert_eq!(names.claim("db", "store"), "db2");
        assert_eq!(names.claim("db", ""), "db3");
        assert_eq!(names.claim("repo", "store"), "repo");
    }

    #[test]
    fn test_claim_avoids_keywords() {
        let mut names = Names::default();
        assert_eq!(names.claim("type", "app"), "appType");
        assert_eq!(names.claim("err", ""), "err2");
    }
}
