//! Dynamic values.
//!
//! [`Value`] is what expression constants are built from and what an item
//! decodes to when no static shape is known (`M` becomes [`Value::Map`]).

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use dynamap_model::AttributeValue;
use uuid::Uuid;

use crate::codec::enums::{EnumType, variant_name, write_enum};
use crate::codec::{AttributeWriter, CodecContext, Decode, Encode, TextScalar, ValueKind};
use crate::error::{MapperResult, PathSegment};

/// An enum value detached from its Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue {
    /// Rust type name of the enum.
    pub type_name: &'static str,
    /// Variant table of the enum.
    pub variants: &'static [(&'static str, i64)],
    /// Discriminant.
    pub discriminant: i64,
}

impl EnumValue {
    /// Captures `value`.
    #[must_use]
    pub fn of<E: EnumType>(value: E) -> Self {
        Self {
            type_name: std::any::type_name::<E>(),
            variants: E::VARIANTS,
            discriminant: value.discriminant(),
        }
    }

    /// Declared variant name, if the discriminant is known.
    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        variant_name(self.variants, self.discriminant)
    }
}

/// A value whose shape is only known at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer that fits in `i64`.
    Int(i64),
    /// Finite float.
    Float(f64),
    /// Decimal text outside the `i64` range.
    Number(String),
    /// String.
    String(String),
    /// Binary.
    Binary(Bytes),
    /// Ordered list.
    List(Vec<Value>),
    /// Set; stored as `SS`/`NS`/`BS`.
    Set(Vec<Value>),
    /// String-keyed map.
    Map(BTreeMap<String, Value>),
    /// Enum value.
    Enum(EnumValue),
    /// Prebuilt attribute value.
    Attribute(AttributeValue),
}

impl Value {
    /// Short name of the variant, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Enum(_) => "enum",
            Self::Attribute(_) => "attribute",
        }
    }

    /// Boolean payload.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Attribute(AttributeValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Whether this is [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Attribute(AttributeValue::Null(_)))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Self::List(items) | Self::Set(items) => {
                let open = if matches!(self, Self::Set(_)) { '{' } else { '[' };
                let close = if open == '{' { '}' } else { ']' };
                write!(f, "{open}")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "{close}")
            }
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                write!(f, "}}")
            }
            Self::Enum(e) => match e.name() {
                Some(name) => write!(f, "{name}"),
                None => write!(f, "{}", e.discriminant),
            },
            Self::Attribute(av) => write!(f, "{av}"),
        }
    }
}

impl Encode for Value {
    fn encode(&self, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        match self {
            Self::Null => writer.write_null(),
            Self::Bool(b) => writer.write_bool(*b),
            Self::Int(i) => writer.write_i64(*i),
            Self::Float(x) => writer.write_f64(*x),
            Self::Number(n) => writer.write_number_text(n.clone()),
            Self::String(s) => writer.write_string(s),
            Self::Binary(b) => writer.write_binary(b),
            Self::List(items) | Self::Set(items) => {
                writer.begin_array(matches!(self, Self::Set(_)))?;
                for (i, item) in items.iter().enumerate() {
                    item.encode(writer).map_err(|e| e.at(PathSegment::Index(i)))?;
                }
                writer.end_array()
            }
            Self::Map(entries) => {
                writer.begin_object()?;
                for (key, value) in entries {
                    writer.property(key)?;
                    value
                        .encode(writer)
                        .map_err(|e| e.at(PathSegment::Field(key.clone())))?;
                }
                writer.end_object()
            }
            Self::Enum(e) => write_enum(e.variants, e.discriminant, writer),
            Self::Attribute(av) => writer.write_raw(av.clone()),
        }
    }

    fn kind() -> ValueKind {
        ValueKind::Dynamic
    }

    fn is_null(&self) -> bool {
        Value::is_null(self)
    }
}

fn number_value(text: &str) -> Value {
    text.trim()
        .parse::<i64>()
        .map_or_else(|_| Value::Number(text.to_owned()), Value::Int)
}

impl Decode for Value {
    fn decode(value: &AttributeValue, ctx: &CodecContext) -> MapperResult<Self> {
        Ok(match value {
            AttributeValue::Null(_) => Self::Null,
            AttributeValue::Bool(b) => Self::Bool(*b),
            AttributeValue::S(s) => Self::String(s.clone()),
            AttributeValue::N(n) => number_value(n),
            AttributeValue::B(b) => Self::Binary(b.clone()),
            AttributeValue::Ss(items) => Self::Set(items.iter().cloned().map(Self::String).collect()),
            AttributeValue::Ns(items) => Self::Set(items.iter().map(|n| number_value(n)).collect()),
            AttributeValue::Bs(items) => Self::Set(items.iter().cloned().map(Self::Binary).collect()),
            AttributeValue::L(items) => Self::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| Self::decode(item, ctx).map_err(|e| e.at(PathSegment::Index(i))))
                    .collect::<MapperResult<_>>()?,
            ),
            AttributeValue::M(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| {
                        Self::decode(v, ctx)
                            .map(|decoded| (k.clone(), decoded))
                            .map_err(|e| e.at(PathSegment::Field(k.clone())))
                    })
                    .collect::<MapperResult<_>>()?,
            ),
        })
    }
}

macro_rules! value_from_narrow {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )+
    };
}

value_from_narrow!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! value_from_wide {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    i64::try_from(value).map_or_else(|_| Self::Number(value.to_string()), Self::Int)
                }
            }
        )+
    };
}

value_from_wide!(u64, u128, i128, usize, isize);

macro_rules! value_from_text_scalar {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::String(value.format_text())
                }
            }
        )+
    };
}

value_from_text_scalar!(
    DateTime<Utc>,
    DateTime<FixedOffset>,
    NaiveDate,
    NaiveDateTime,
    NaiveTime,
    TimeDelta,
    std::time::Duration,
    Uuid
);

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Self::String(value.to_string())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Self::Binary(value)
    }
}

impl From<AttributeValue> for Value {
    fn from(value: AttributeValue) -> Self {
        Self::Attribute(value)
    }
}

impl From<EnumValue> for Value {
    fn from(value: EnumValue) -> Self {
        Self::Enum(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, S> From<HashSet<T, S>> for Value {
    fn from(value: HashSet<T, S>) -> Self {
        Self::Set(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeSet<T>> for Value {
    fn from(value: BTreeSet<T>) -> Self {
        Self::Set(value.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(value: BTreeMap<String, V>) -> Self {
        Self::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}
