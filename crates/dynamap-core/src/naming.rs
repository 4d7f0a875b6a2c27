//! Attribute and enum-value naming policies, and type-name resolution for
//! polymorphic discriminators.

use std::str::FromStr;

use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};

use crate::codec::TypeInfo;

/// How a Rust member or variant name is transformed into a stored name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamingPolicy {
    /// Keep the name as declared.
    #[default]
    Identity,
    /// `lowerCamelCase`.
    CamelCase,
    /// `UpperCamelCase`.
    PascalCase,
    /// `snake_case`.
    SnakeCase,
    /// `kebab-case` (hyphenated).
    KebabCase,
}

impl NamingPolicy {
    /// Applies the policy to `name`.
    #[must_use]
    pub fn apply(self, name: &str) -> String {
        match self {
            Self::Identity => name.to_owned(),
            Self::CamelCase => name.to_lower_camel_case(),
            Self::PascalCase => name.to_upper_camel_case(),
            Self::SnakeCase => name.to_snake_case(),
            Self::KebabCase => name.to_kebab_case(),
        }
    }
}

impl FromStr for NamingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "identity" | "none" => Ok(Self::Identity),
            "camel" | "camelcase" => Ok(Self::CamelCase),
            "pascal" | "pascalcase" => Ok(Self::PascalCase),
            "snake" | "snakecase" => Ok(Self::SnakeCase),
            "kebab" | "kebabcase" | "hyphen" => Ok(Self::KebabCase),
            other => Err(format!("unknown naming policy '{other}'")),
        }
    }
}

/// Maps a concrete type to the name written into the type discriminator.
///
/// Returning `None` suppresses the discriminator for that type. The same
/// resolver is consulted on decode to match a stored name back to a type.
pub trait TypeNameResolver: Send + Sync + std::fmt::Debug {
    /// Discriminator value for `info`, if any.
    fn type_name(&self, info: &TypeInfo) -> Option<String>;
}

/// Uses the last path segment of the Rust type name, without generics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortTypeNameResolver;

impl TypeNameResolver for ShortTypeNameResolver {
    fn type_name(&self, info: &TypeInfo) -> Option<String> {
        Some(short_type_name(info.name).to_owned())
    }
}

/// `alloc::vec::Vec<my::Thing>` -> `Vec`, `my::Thing` -> `Thing`.
#[must_use]
pub fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_apply_each_policy() {
        assert_eq!(NamingPolicy::Identity.apply("first_name"), "first_name");
        assert_eq!(NamingPolicy::CamelCase.apply("first_name"), "firstName");
        assert_eq!(NamingPolicy::PascalCase.apply("first_name"), "FirstName");
        assert_eq!(NamingPolicy::SnakeCase.apply("FirstName"), "first_name");
        assert_eq!(NamingPolicy::KebabCase.apply("first_name"), "first-name");
    }

    #[test]
    fn test_should_parse_policy_aliases() {
        assert_eq!("hyphen".parse::<NamingPolicy>(), Ok(NamingPolicy::KebabCase));
        assert_eq!("camelCase".parse::<NamingPolicy>(), Ok(NamingPolicy::CamelCase));
        assert_eq!("snake_case".parse::<NamingPolicy>(), Ok(NamingPolicy::SnakeCase));
        assert!("shouting".parse::<NamingPolicy>().is_err());
    }

    #[test]
    fn test_should_shorten_type_names() {
        assert_eq!(short_type_name("my_app::model::Circle"), "Circle");
        assert_eq!(short_type_name("alloc::vec::Vec<my_app::Circle>"), "Vec");
        assert_eq!(short_type_name("Circle"), "Circle");
    }
}
