//! `Encode`/`Decode` for containers, smart pointers and raw attribute values.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use dynamap_model::AttributeValue;

use super::{AttributeWriter, CodecContext, Decode, Encode, ValueKind};
use crate::document::SchemaInfo;
use crate::error::{MapperError, MapperResult, PathSegment};

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        match self {
            Some(v) => v.encode(writer),
            None => writer.write_null(),
        }
    }

    fn kind() -> ValueKind {
        T::kind()
    }

    fn is_null(&self) -> bool {
        self.as_ref().is_none_or(Encode::is_null)
    }

    fn is_default(&self) -> bool {
        self.is_none()
    }

    fn enum_variants() -> Option<&'static [(&'static str, i64)]> {
        T::enum_variants()
    }

    fn schema_info() -> Option<Arc<SchemaInfo>> {
        T::schema_info()
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(value: &AttributeValue, ctx: &CodecContext) -> MapperResult<Self> {
        if matches!(value, AttributeValue::Null(_)) {
            return Ok(None);
        }
        T::decode(value, ctx).map(Some)
    }
}

macro_rules! delegate_pointer {
    ($ptr:ident) => {
        impl<T: Encode> Encode for $ptr<T> {
            fn encode(&self, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
                (**self).encode(writer)
            }

            fn kind() -> ValueKind {
                T::kind()
            }

            fn is_null(&self) -> bool {
                (**self).is_null()
            }

            fn is_default(&self) -> bool {
                (**self).is_default()
            }

            fn enum_variants() -> Option<&'static [(&'static str, i64)]> {
                T::enum_variants()
            }

            fn schema_info() -> Option<Arc<SchemaInfo>> {
                T::schema_info()
            }
        }

        impl<T: Decode> Decode for $ptr<T> {
            fn decode(value: &AttributeValue, ctx: &CodecContext) -> MapperResult<Self> {
                T::decode(value, ctx).map($ptr::new)
            }
        }
    };
}

delegate_pointer!(Box);
delegate_pointer!(Arc);

fn encode_array<'v, T: Encode + 'v>(
    items: impl Iterator<Item = &'v T>,
    as_set: bool,
    writer: &mut AttributeWriter<'_>,
) -> MapperResult<()> {
    writer.begin_array(as_set)?;
    for (i, item) in items.enumerate() {
        item.encode(writer).map_err(|e| e.at(PathSegment::Index(i)))?;
    }
    writer.end_array()
}

/// Elements of a list or any set variant, as individual values.
pub(crate) fn sequence_elements(value: &AttributeValue) -> Option<Vec<AttributeValue>> {
    match value {
        AttributeValue::L(items) => Some(items.clone()),
        AttributeValue::Ss(items) => Some(items.iter().cloned().map(AttributeValue::S).collect()),
        AttributeValue::Ns(items) => Some(items.iter().cloned().map(AttributeValue::N).collect()),
        AttributeValue::Bs(items) => Some(items.iter().cloned().map(AttributeValue::B).collect()),
        _ => None,
    }
}

fn decode_sequence<T: Decode, C: FromIterator<T> + Default>(
    value: &AttributeValue,
    ctx: &CodecContext,
    expected: &str,
) -> MapperResult<C> {
    if matches!(value, AttributeValue::Null(_)) {
        return Ok(C::default());
    }
    let Some(items) = sequence_elements(value) else {
        return Err(MapperError::type_mismatch(expected, value));
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| T::decode(item, ctx).map_err(|e| e.at(PathSegment::Index(i))))
        .collect()
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        encode_array(self.iter(), false, writer)
    }

    fn kind() -> ValueKind {
        ValueKind::List
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }

    fn schema_info() -> Option<Arc<SchemaInfo>> {
        T::schema_info()
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(value: &AttributeValue, ctx: &CodecContext) -> MapperResult<Self> {
        decode_sequence(value, ctx, "list")
    }
}

impl<T: Encode, S> Encode for HashSet<T, S> {
    fn encode(&self, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        encode_array(self.iter(), true, writer)
    }

    fn kind() -> ValueKind {
        ValueKind::Set
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Decode + Eq + Hash, S: BuildHasher + Default> Decode for HashSet<T, S> {
    fn decode(value: &AttributeValue, ctx: &CodecContext) -> MapperResult<Self> {
        decode_sequence(value, ctx, "set")
    }
}

impl<T: Encode> Encode for BTreeSet<T> {
    fn encode(&self, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        encode_array(self.iter(), true, writer)
    }

    fn kind() -> ValueKind {
        ValueKind::Set
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Decode + Ord> Decode for BTreeSet<T> {
    fn decode(value: &AttributeValue, ctx: &CodecContext) -> MapperResult<Self> {
        decode_sequence(value, ctx, "set")
    }
}

fn encode_map<'v, V: Encode + 'v>(
    entries: impl Iterator<Item = (&'v String, &'v V)>,
    writer: &mut AttributeWriter<'_>,
) -> MapperResult<()> {
    writer.begin_object()?;
    for (key, value) in entries {
        writer.property(key)?;
        value
            .encode(writer)
            .map_err(|e| e.at(PathSegment::Field(key.clone())))?;
    }
    writer.end_object()
}

fn decode_map<V: Decode, C: FromIterator<(String, V)> + Default>(
    value: &AttributeValue,
    ctx: &CodecContext,
) -> MapperResult<C> {
    match value {
        AttributeValue::Null(_) => Ok(C::default()),
        AttributeValue::M(entries) => entries
            .iter()
            .map(|(k, v)| {
                V::decode(v, ctx)
                    .map(|decoded| (k.clone(), decoded))
                    .map_err(|e| e.at(PathSegment::Field(k.clone())))
            })
            .collect(),
        other => Err(MapperError::type_mismatch("map", other)),
    }
}

impl<V: Encode, S> Encode for HashMap<String, V, S> {
    fn encode(&self, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        encode_map(self.iter(), writer)
    }

    fn kind() -> ValueKind {
        ValueKind::Map
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }
}

impl<V: Decode, S: BuildHasher + Default> Decode for HashMap<String, V, S> {
    fn decode(value: &AttributeValue, ctx: &CodecContext) -> MapperResult<Self> {
        decode_map(value, ctx)
    }
}

impl<V: Encode> Encode for BTreeMap<String, V> {
    fn encode(&self, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        encode_map(self.iter(), writer)
    }

    fn kind() -> ValueKind {
        ValueKind::Map
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }
}

impl<V: Decode> Decode for BTreeMap<String, V> {
    fn decode(value: &AttributeValue, ctx: &CodecContext) -> MapperResult<Self> {
        decode_map(value, ctx)
    }
}

impl Encode for AttributeValue {
    fn encode(&self, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        writer.write_raw(self.clone())
    }

    fn kind() -> ValueKind {
        ValueKind::Dynamic
    }

    fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }
}

impl Decode for AttributeValue {
    fn decode(value: &AttributeValue, _ctx: &CodecContext) -> MapperResult<Self> {
        Ok(value.clone())
    }
}
