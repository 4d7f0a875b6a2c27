//! The value codec.
//!
//! Writing goes through an [`AttributeWriter`]: a stack-based tree builder
//! that owns null/empty compaction and set inference. Reading dispatches on
//! the populated [`AttributeValue`] variant. Leaf types are routed through the
//! [`ConverterRegistry`]; containers, enums and documents implement
//! [`Encode`]/[`Decode`] directly.

pub mod builtin;
pub mod convert;
pub mod enums;
pub mod impls;
pub mod temporal;
pub mod writer;

use std::any::TypeId;
use std::sync::Arc;

use dynamap_model::AttributeValue;
use dynamap_model::types::ScalarAttributeType;

use crate::config::{CodecOptions, EnumEncoding, MapperConfig};
use crate::document::SchemaInfo;
use crate::error::MapperResult;

pub use convert::{ConverterRegistry, TypeConverter};
pub use enums::EnumType;
pub use temporal::TextScalar;
pub use writer::{AttributeWriter, WriteFlags};

/// Coarse shape of a Rust type as seen by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Unit-like null.
    Null,
    /// `BOOL`.
    Bool,
    /// `S`.
    String,
    /// `N`.
    Number,
    /// `B`.
    Binary,
    /// Fieldless enum, stored as `S` or `N` depending on configuration.
    Enum,
    /// `L`.
    List,
    /// `SS`/`NS`/`BS`.
    Set,
    /// `M` keyed by arbitrary strings.
    Map,
    /// `M` with declared members.
    Document,
    /// Shape only known at runtime.
    Dynamic,
}

impl ValueKind {
    /// Scalar key type for this kind, if it can be a key attribute.
    #[must_use]
    pub fn scalar_type(self, enum_encoding: EnumEncoding) -> Option<ScalarAttributeType> {
        match self {
            Self::String => Some(ScalarAttributeType::S),
            Self::Number => Some(ScalarAttributeType::N),
            Self::Binary => Some(ScalarAttributeType::B),
            Self::Enum => Some(match enum_encoding {
                EnumEncoding::Name => ScalarAttributeType::S,
                EnumEncoding::Number => ScalarAttributeType::N,
            }),
            _ => None,
        }
    }
}

/// Static facts about an encodable Rust type.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    /// Type identity.
    pub id: TypeId,
    /// Full Rust type name.
    pub name: &'static str,
    /// Store shape.
    pub kind: ValueKind,
    /// `(name, discriminant)` pairs when the type is an enum.
    pub enum_variants: Option<&'static [(&'static str, i64)]>,
    schema: fn() -> Option<Arc<SchemaInfo>>,
}

impl TypeInfo {
    /// Facts for `T`.
    #[must_use]
    pub fn of<T: Encode + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: T::kind(),
            enum_variants: T::enum_variants(),
            schema: T::schema_info,
        }
    }

    /// Same facts with a different kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    /// Member metadata when the type (or its element type) is a document.
    #[must_use]
    pub fn schema(&self) -> Option<Arc<SchemaInfo>> {
        (self.schema)()
    }
}

/// Shared state for one mapper: configuration and the converter chain.
#[derive(Debug, Clone)]
pub struct CodecContext {
    config: Arc<MapperConfig>,
    registry: Arc<ConverterRegistry>,
}

impl Default for CodecContext {
    fn default() -> Self {
        Self::new(MapperConfig::default())
    }
}

impl CodecContext {
    /// Builds the converter chain: user converters first, then built-ins.
    #[must_use]
    pub fn new(config: MapperConfig) -> Self {
        let registry = ConverterRegistry::with_builtins();
        for converter in config.converters.iter().rev() {
            registry.register(Arc::clone(converter));
        }
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
        }
    }

    /// Mapper configuration.
    #[must_use]
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Policy options.
    #[must_use]
    pub fn options(&self) -> &CodecOptions {
        &self.config.options
    }

    /// Converter chain.
    #[must_use]
    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// Writer flags derived from the configured persistence policy.
    #[must_use]
    pub fn write_flags(&self) -> WriteFlags {
        WriteFlags {
            persist_null_values: self.config.options.serialize_null_values,
            persist_empty_objects: self.config.options.serialize_default_values,
        }
    }
}

/// A Rust type that can be written into an [`AttributeWriter`].
pub trait Encode {
    /// Writes `self` into the writer's current slot.
    fn encode(&self, writer: &mut AttributeWriter<'_>) -> MapperResult<()>;

    /// Store shape of the type.
    fn kind() -> ValueKind
    where
        Self: Sized;

    /// Whether this value is absent (for example `None`).
    fn is_null(&self) -> bool {
        false
    }

    /// Whether this value equals its type's default.
    fn is_default(&self) -> bool {
        false
    }

    /// Variant table for enum types.
    fn enum_variants() -> Option<&'static [(&'static str, i64)]>
    where
        Self: Sized,
    {
        None
    }

    /// Member metadata for document types and containers of documents.
    fn schema_info() -> Option<Arc<SchemaInfo>>
    where
        Self: Sized,
    {
        None
    }
}

/// A Rust type that can be rebuilt from an [`AttributeValue`].
pub trait Decode: Sized {
    /// Decodes `value`.
    fn decode(value: &AttributeValue, ctx: &CodecContext) -> MapperResult<Self>;
}

/// Encodes `value` with explicit persistence flags.
///
/// Returns `None` when the value compacts to nothing.
pub fn encode_with<T: Encode + ?Sized>(
    value: &T,
    ctx: &CodecContext,
    flags: WriteFlags,
) -> MapperResult<Option<AttributeValue>> {
    let mut writer = AttributeWriter::new(ctx, flags);
    value.encode(&mut writer)?;
    writer.finish()
}

/// Encodes `value` with the configured persistence flags.
pub fn encode<T: Encode + ?Sized>(
    value: &T,
    ctx: &CodecContext,
) -> MapperResult<Option<AttributeValue>> {
    encode_with(value, ctx, ctx.write_flags())
}

/// Decodes `value` into `T`.
pub fn decode<T: Decode>(value: &AttributeValue, ctx: &CodecContext) -> MapperResult<T> {
    T::decode(value, ctx)
}
