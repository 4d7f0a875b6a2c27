//! Converter chain for leaf types.
//!
//! A [`TypeConverter`] claims a set of Rust types and implements whichever
//! read capabilities apply to them; the rest default to a type mismatch.
//! The [`ConverterRegistry`] is an ordered list where the first converter
//! that handles a type wins, with the answer memoised per `TypeId`.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use dynamap_model::AttributeValue;
use parking_lot::RwLock;
use tracing::trace;

use super::builtin::{BinaryConverter, ParsableConverter, PrimitiveConverter};
use super::{AttributeWriter, CodecContext};
use crate::error::{MapperError, MapperResult};

/// The Rust type a read is producing.
#[derive(Debug, Clone, Copy)]
pub struct Target {
    /// Type identity.
    pub id: TypeId,
    /// Type name, for errors.
    pub name: &'static str,
}

impl Target {
    /// Target for `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The mismatch error for reading `actual` (a wire tag) into this target.
    #[must_use]
    pub fn mismatch(&self, actual: &str) -> MapperError {
        MapperError::TypeMismatch {
            expected: self.name.to_owned(),
            actual: actual.to_owned(),
        }
    }
}

/// Converts between a family of Rust types and attribute values.
#[allow(unused_variables)]
pub trait TypeConverter: Send + Sync + fmt::Debug {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this converter handles `type_id`.
    fn handles(&self, type_id: TypeId) -> bool;

    /// Writes `value` (one of the handled types) into the writer.
    fn write(&self, value: &dyn Any, writer: &mut AttributeWriter<'_>) -> MapperResult<()>;

    /// Reads from `NULL`.
    fn from_null(&self, target: &Target) -> MapperResult<Box<dyn Any>> {
        Err(target.mismatch("NULL"))
    }

    /// Reads from `BOOL`.
    fn from_bool(&self, value: bool, target: &Target) -> MapperResult<Box<dyn Any>> {
        Err(target.mismatch("BOOL"))
    }

    /// Reads from `S`.
    fn from_string(&self, value: &str, target: &Target) -> MapperResult<Box<dyn Any>> {
        Err(target.mismatch("S"))
    }

    /// Reads from `N`.
    fn from_number(&self, text: &str, target: &Target) -> MapperResult<Box<dyn Any>> {
        Err(target.mismatch("N"))
    }

    /// Reads from `B`.
    fn from_binary(&self, value: &Bytes, target: &Target) -> MapperResult<Box<dyn Any>> {
        Err(target.mismatch("B"))
    }

    /// Reads from `SS`.
    fn from_string_set(&self, values: &[String], target: &Target) -> MapperResult<Box<dyn Any>> {
        Err(target.mismatch("SS"))
    }

    /// Reads from `NS`.
    fn from_number_set(&self, values: &[String], target: &Target) -> MapperResult<Box<dyn Any>> {
        Err(target.mismatch("NS"))
    }

    /// Reads from `BS`.
    fn from_binary_set(&self, values: &[Bytes], target: &Target) -> MapperResult<Box<dyn Any>> {
        Err(target.mismatch("BS"))
    }

    /// Reads from `L`.
    fn from_list(
        &self,
        values: &[AttributeValue],
        ctx: &CodecContext,
        target: &Target,
    ) -> MapperResult<Box<dyn Any>> {
        Err(target.mismatch("L"))
    }

    /// Reads from `M`.
    fn from_map(
        &self,
        values: &BTreeMap<String, AttributeValue>,
        ctx: &CodecContext,
        target: &Target,
    ) -> MapperResult<Box<dyn Any>> {
        Err(target.mismatch("M"))
    }
}

/// Ordered converter chain with a per-type lookup cache.
pub struct ConverterRegistry {
    converters: RwLock<Vec<Arc<dyn TypeConverter>>>,
    lookup: DashMap<TypeId, Option<Arc<dyn TypeConverter>>>,
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&'static str> = self.converters.read().iter().map(|c| c.name()).collect();
        f.debug_struct("ConverterRegistry")
            .field("converters", &names)
            .field("cached", &self.lookup.len())
            .finish()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ConverterRegistry {
    /// An empty chain.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            converters: RwLock::new(Vec::new()),
            lookup: DashMap::new(),
        }
    }

    /// The built-in chain: primitives, binary, then parsable text scalars.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        {
            let mut converters = registry.converters.write();
            converters.push(Arc::new(PrimitiveConverter));
            converters.push(Arc::new(BinaryConverter));
            converters.push(Arc::new(ParsableConverter::standard()));
        }
        registry
    }

    /// Puts `converter` at the front of the chain.
    pub fn register(&self, converter: Arc<dyn TypeConverter>) {
        self.converters.write().insert(0, converter);
        self.lookup.clear();
    }

    /// First converter that handles `type_id`.
    #[must_use]
    pub fn find(&self, type_id: TypeId) -> Option<Arc<dyn TypeConverter>> {
        if let Some(cached) = self.lookup.get(&type_id) {
            return cached.value().clone();
        }
        let found = self
            .converters
            .read()
            .iter()
            .find(|c| c.handles(type_id))
            .cloned();
        trace!(?type_id, converter = found.as_ref().map(|c| c.name()), "converter lookup miss");
        self.lookup.entry(type_id).or_insert(found).value().clone()
    }

    /// Writes `value` with the converter that handles `T`.
    pub fn write<T: Any>(&self, value: &T, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        let target = Target::of::<T>();
        let converter = self.find(target.id).ok_or_else(|| {
            MapperError::unsupported_type(target.name, "no converter handles this type")
        })?;
        converter.write(value, writer)
    }

    /// Reads a `T` by dispatching on the populated variant of `value`.
    pub fn read<T: Any>(&self, value: &AttributeValue, ctx: &CodecContext) -> MapperResult<T> {
        let target = Target::of::<T>();
        let converter = self.find(target.id).ok_or_else(|| {
            MapperError::unsupported_type(target.name, "no converter handles this type")
        })?;
        let boxed = match value {
            AttributeValue::Null(_) => converter.from_null(&target),
            AttributeValue::Bool(b) => converter.from_bool(*b, &target),
            AttributeValue::S(s) => converter.from_string(s, &target),
            AttributeValue::N(n) => converter.from_number(n, &target),
            AttributeValue::B(b) => converter.from_binary(b, &target),
            AttributeValue::Ss(v) => converter.from_string_set(v, &target),
            AttributeValue::Ns(v) => converter.from_number_set(v, &target),
            AttributeValue::Bs(v) => converter.from_binary_set(v, &target),
            AttributeValue::L(v) => converter.from_list(v, ctx, &target),
            AttributeValue::M(m) => converter.from_map(m, ctx, &target),
        }?;
        boxed.downcast::<T>().map(|b| *b).map_err(|_| {
            MapperError::unsupported_type(
                target.name,
                format!("converter {} produced a different type", converter.name()),
            )
        })
    }
}
