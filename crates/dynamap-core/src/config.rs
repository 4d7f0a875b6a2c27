//! Codec configuration.
//!
//! [`CodecOptions`] holds the plain, serialisable policy knobs and can be
//! loaded from environment variables. [`MapperConfig`] wraps the options
//! together with the hooks that cannot be serialised: the default-value
//! override, the type-name resolver and user converters.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::codec::{TypeConverter, TypeInfo, ValueKind};
use crate::naming::{NamingPolicy, ShortTypeNameResolver, TypeNameResolver};

/// How enum values are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumEncoding {
    /// Variant name (after the enum naming policy), stored as `S`.
    #[default]
    Name,
    /// Discriminant, stored as `N`.
    Number,
}

impl FromStr for EnumEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" | "string" => Ok(Self::Name),
            "number" | "numeric" => Ok(Self::Number),
            other => Err(format!("unknown enum encoding '{other}'")),
        }
    }
}

/// Codec policy options.
///
/// # Examples
///
/// ```
/// use dynamap_core::config::CodecOptions;
///
/// let options = CodecOptions::builder().serialize_null_values(true).build();
/// assert!(options.serialize_null_values);
/// assert_eq!(options.type_discriminator, "$type");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct CodecOptions {
    /// Persist members even when they equal their type's default.
    #[builder(default = false)]
    pub serialize_default_values: bool,

    /// Persist explicit `NULL` rather than omitting the attribute.
    #[builder(default = false)]
    pub serialize_null_values: bool,

    /// Transform applied to member names that were not explicitly renamed.
    #[builder(default)]
    pub attribute_naming: NamingPolicy,

    /// Transform applied to enum variant names.
    #[builder(default)]
    pub enum_naming: NamingPolicy,

    /// Whether enums are stored by name or by discriminant.
    #[builder(default)]
    pub enum_encoding: EnumEncoding,

    /// Attribute holding the concrete type name of polymorphic values.
    #[builder(default = String::from("$type"))]
    pub type_discriminator: String,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            serialize_default_values: false,
            serialize_null_values: false,
            attribute_naming: NamingPolicy::Identity,
            enum_naming: NamingPolicy::Identity,
            enum_encoding: EnumEncoding::Name,
            type_discriminator: String::from("$type"),
        }
    }
}

impl CodecOptions {
    /// Load options from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DYNAMAP_SERIALIZE_DEFAULT_VALUES` | `false` |
    /// | `DYNAMAP_SERIALIZE_NULL_VALUES` | `false` |
    /// | `DYNAMAP_ATTRIBUTE_NAMING` | `identity` |
    /// | `DYNAMAP_ENUM_NAMING` | `identity` |
    /// | `DYNAMAP_ENUM_ENCODING` | `name` |
    /// | `DYNAMAP_TYPE_DISCRIMINATOR` | `$type` |
    ///
    /// Unparseable values are ignored and the default is kept.
    #[must_use]
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(v) = std::env::var("DYNAMAP_SERIALIZE_DEFAULT_VALUES") {
            options.serialize_default_values = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("DYNAMAP_SERIALIZE_NULL_VALUES") {
            options.serialize_null_values = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("DYNAMAP_ATTRIBUTE_NAMING") {
            if let Ok(policy) = v.parse() {
                options.attribute_naming = policy;
            }
        }
        if let Ok(v) = std::env::var("DYNAMAP_ENUM_NAMING") {
            if let Ok(policy) = v.parse() {
                options.enum_naming = policy;
            }
        }
        if let Ok(v) = std::env::var("DYNAMAP_ENUM_ENCODING") {
            if let Ok(encoding) = v.parse() {
                options.enum_encoding = encoding;
            }
        }
        if let Ok(v) = std::env::var("DYNAMAP_TYPE_DISCRIMINATOR") {
            if !v.is_empty() {
                options.type_discriminator = v;
            }
        }

        options
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Type-driven override for default-value persistence.
pub type DefaultValuesFor = Arc<dyn Fn(&TypeInfo) -> bool + Send + Sync>;

/// Options plus the non-serialisable codec hooks.
#[derive(Clone)]
pub struct MapperConfig {
    /// Policy options.
    pub options: CodecOptions,
    /// Overrides whether a type's default value is persisted. When unset,
    /// enums are always persisted and everything else follows
    /// [`CodecOptions::serialize_default_values`].
    pub default_values_for: Option<DefaultValuesFor>,
    /// Resolves type discriminator names.
    pub type_name_resolver: Arc<dyn TypeNameResolver>,
    /// User converters, consulted before the built-in ones, first match wins.
    pub converters: Vec<Arc<dyn TypeConverter>>,
}

impl fmt::Debug for MapperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperConfig")
            .field("options", &self.options)
            .field("default_values_for", &self.default_values_for.is_some())
            .field("type_name_resolver", &self.type_name_resolver)
            .field("converters", &self.converters.len())
            .finish()
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self::new(CodecOptions::default())
    }
}

impl MapperConfig {
    /// Config with `options` and default hooks.
    #[must_use]
    pub fn new(options: CodecOptions) -> Self {
        Self {
            options,
            default_values_for: None,
            type_name_resolver: Arc::new(ShortTypeNameResolver),
            converters: Vec::new(),
        }
    }

    /// Replaces the default-value override.
    #[must_use]
    pub fn with_default_values_for(
        mut self,
        hook: impl Fn(&TypeInfo) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.default_values_for = Some(Arc::new(hook));
        self
    }

    /// Replaces the type-name resolver.
    #[must_use]
    pub fn with_type_name_resolver(mut self, resolver: impl TypeNameResolver + 'static) -> Self {
        self.type_name_resolver = Arc::new(resolver);
        self
    }

    /// Appends a user converter.
    #[must_use]
    pub fn with_converter(mut self, converter: impl TypeConverter + 'static) -> Self {
        self.converters.push(Arc::new(converter));
        self
    }

    /// Whether a member of type `info` holding its default value is persisted.
    #[must_use]
    pub fn should_serialize_default(&self, info: &TypeInfo) -> bool {
        if self.options.serialize_default_values {
            return true;
        }
        match &self.default_values_for {
            Some(hook) => hook(info),
            None => info.kind == ValueKind::Enum,
        }
    }
}
