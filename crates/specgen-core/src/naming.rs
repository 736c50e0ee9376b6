//! Source-cased identifiers and their case conversions.
//!
//! Every identifier in a specification keeps the exact spelling it was
//! declared with (`Name::source`). Generated identifiers, file names and
//! module segments are all derived from that spelling through the pure
//! functions in this module, so the same source string always yields the
//! same output no matter where it is converted.
//!
//! Words are split on `_`, `-`, `.`, whitespace and case boundaries. An
//! uppercase run followed by a lowercase letter ends one word early so
//! acronyms stay intact (`HTTPServer` -> `http`, `server`). Digits stick
//! to the word they follow (`int32Value` -> `int32`, `value`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// An identifier exactly as declared in the specification.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name {
    source: String,
}

impl Name {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// The declared spelling, used verbatim for wire keys and tags.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn pascal_case(&self) -> String {
        to_pascal_case(&self.source)
    }

    pub fn camel_case(&self) -> String {
        to_camel_case(&self.source)
    }

    pub fn snake_case(&self) -> String {
        to_snake_case(&self.source)
    }

    pub fn flat_case(&self) -> String {
        to_flat_case(&self.source)
    }

    pub fn upper_case(&self) -> String {
        to_upper_case(&self.source)
    }

    pub fn kebab_case(&self) -> String {
        to_kebab_case(&self.source)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl From<&str> for Name {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for Name {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

/// Split an identifier into lowercase words.
///
/// # Examples
/// ```
/// use specgen_core::naming::words;
/// assert_eq!(words("createPet"), vec!["create", "pet"]);
/// assert_eq!(words("HTTPServer"), vec!["http", "server"]);
/// assert_eq!(words("not_found"), vec!["not", "found"]);
/// assert_eq!(words("int32Value"), vec!["int32", "value"]);
/// ```
pub fn words(source: &str) -> Vec<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut result = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary {
                result.push(std::mem::take(&mut current));
            }
        }

        current.extend(c.to_lowercase());
    }

    if !current.is_empty() {
        result.push(current);
    }
    result
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// # Examples
/// ```
/// use specgen_core::naming::to_pascal_case;
/// assert_eq!(to_pascal_case("bad_request"), "BadRequest");
/// assert_eq!(to_pascal_case("createPet"), "CreatePet");
/// ```
pub fn to_pascal_case(source: &str) -> String {
    words(source).iter().map(|w| capitalize(w)).collect()
}

/// # Examples
/// ```
/// use specgen_core::naming::to_camel_case;
/// assert_eq!(to_camel_case("bad_request"), "badRequest");
/// assert_eq!(to_camel_case("Person"), "person");
/// ```
pub fn to_camel_case(source: &str) -> String {
    let mut result = String::new();
    for (i, word) in words(source).iter().enumerate() {
        if i == 0 {
            result.push_str(word);
        } else {
            result.push_str(&capitalize(word));
        }
    }
    result
}

pub fn to_snake_case(source: &str) -> String {
    words(source).join("_")
}

pub fn to_flat_case(source: &str) -> String {
    words(source).concat()
}

pub fn to_upper_case(source: &str) -> String {
    to_snake_case(source).to_uppercase()
}

pub fn to_kebab_case(source: &str) -> String {
    words(source).join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_words() {
        assert!(words("").is_empty());
        assert_eq!(words("pet"), vec!["pet"]);
        assert_eq!(words("petStore"), vec!["pet", "store"]);
        assert_eq!(words("PetStore"), vec!["pet", "store"]);
        assert_eq!(words("pet_store"), vec!["pet", "store"]);
        assert_eq!(words("pet-store"), vec!["pet", "store"]);
        assert_eq!(words("UUIDValue"), vec!["uuid", "value"]);
        assert_eq!(words("v2"), vec!["v2"]);
        assert_eq!(words("field2Name"), vec!["field2", "name"]);
        assert_eq!(words("__odd__"), vec!["odd"]);
    }

    #[test]
    fn test_conversions() {
        let name = Name::new("internal_server_error");
        assert_eq!(name.pascal_case(), "InternalServerError");
        assert_eq!(name.camel_case(), "internalServerError");
        assert_eq!(name.snake_case(), "internal_server_error");
        assert_eq!(name.flat_case(), "internalservererror");
        assert_eq!(name.upper_case(), "INTERNAL_SERVER_ERROR");
        assert_eq!(name.kebab_case(), "internal-server-error");
        assert_eq!(name.source(), "internal_server_error");
    }

    #[test]
    fn test_version_names() {
        assert_eq!(Name::new("v2").flat_case(), "v2");
        assert_eq!(Name::new("V2").flat_case(), "v2");
        assert_eq!(Name::new("v2beta1").pascal_case(), "V2beta1");
    }

    #[test]
    fn test_name_serializes_as_plain_string() {
        let name = Name::new("createPet");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"createPet\"");
        let back: Name = serde_json::from_str("\"createPet\"").unwrap();
        assert_eq!(back, name);
    }

    proptest! {
        #[test]
        fn conversions_are_pure(source in "[a-zA-Z][a-zA-Z0-9_-]{0,24}") {
            let a = Name::new(source.clone());
            let b = Name::new(source);
            prop_assert_eq!(a.pascal_case(), b.pascal_case());
            prop_assert_eq!(a.camel_case(), b.camel_case());
            prop_assert_eq!(a.snake_case(), b.snake_case());
            prop_assert_eq!(a.flat_case(), b.flat_case());
        }

        #[test]
        fn snake_case_is_idempotent(source in "[a-zA-Z][a-zA-Z0-9_]{0,24}") {
            let once = to_snake_case(&source);
            prop_assert_eq!(to_snake_case(&once), once.clone());
            prop_assert!(!once.contains("__"));
        }

        #[test]
        fn pascal_has_no_separators(source in "[a-z][a-z0-9_-]{0,24}") {
            let pascal = to_pascal_case(&source);
            prop_assert!(!pascal.contains('_'));
            prop_assert!(!pascal.contains('-'));
        }
    }
}
