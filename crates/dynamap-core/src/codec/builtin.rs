//! Built-in converters for primitives, binary and text-formatted scalars.

use std::any::{Any, TypeId};
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use uuid::Uuid;

use super::convert::{Target, TypeConverter};
use super::temporal::TextScalar;
use super::AttributeWriter;
use crate::error::{MapperError, MapperResult};

/// Implements [`Encode`](crate::codec::Encode) and
/// [`Decode`](crate::codec::Decode) for a leaf type by routing it through the
/// converter registry. The type must be `PartialEq + Default`, and some
/// registered converter must handle it.
#[macro_export]
macro_rules! scalar_codec {
    ($ty:ty, $kind:ident) => {
        impl $crate::codec::Encode for $ty {
            fn encode(
                &self,
                writer: &mut $crate::codec::AttributeWriter<'_>,
            ) -> $crate::MapperResult<()> {
                writer.write_scalar(self)
            }

            fn kind() -> $crate::codec::ValueKind {
                $crate::codec::ValueKind::$kind
            }

            fn is_default(&self) -> bool {
                *self == <$ty as ::core::default::Default>::default()
            }
        }

        impl $crate::codec::Decode for $ty {
            fn decode(
                value: &$crate::AttributeValue,
                ctx: &$crate::codec::CodecContext,
            ) -> $crate::MapperResult<Self> {
                ctx.registry().read::<$ty>(value, ctx)
            }
        }
    };
}

scalar_codec!(bool, Bool);
scalar_codec!(i8, Number);
scalar_codec!(i16, Number);
scalar_codec!(i32, Number);
scalar_codec!(i64, Number);
scalar_codec!(i128, Number);
scalar_codec!(isize, Number);
scalar_codec!(u8, Number);
scalar_codec!(u16, Number);
scalar_codec!(u32, Number);
scalar_codec!(u64, Number);
scalar_codec!(u128, Number);
scalar_codec!(usize, Number);
scalar_codec!(f32, Number);
scalar_codec!(f64, Number);
scalar_codec!(char, String);
scalar_codec!(String, String);
scalar_codec!(Bytes, Binary);
scalar_codec!(DateTime<Utc>, String);
scalar_codec!(DateTime<FixedOffset>, String);
scalar_codec!(NaiveDate, String);
scalar_codec!(NaiveDateTime, String);
scalar_codec!(NaiveTime, String);
scalar_codec!(TimeDelta, String);
scalar_codec!(std::time::Duration, String);
scalar_codec!(Uuid, String);

macro_rules! for_each_integer {
    ($mac:ident) => {
        $mac!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize)
    };
}

/// Booleans, integers, floats, `char` and `String`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveConverter;

impl PrimitiveConverter {
    fn is_integer(id: TypeId) -> bool {
        macro_rules! check {
            ($($t:ty),*) => { false $(|| id == TypeId::of::<$t>())* };
        }
        for_each_integer!(check)
    }

    fn is_float(id: TypeId) -> bool {
        id == TypeId::of::<f32>() || id == TypeId::of::<f64>()
    }
}

impl TypeConverter for PrimitiveConverter {
    fn name(&self) -> &'static str {
        "primitive"
    }

    fn handles(&self, type_id: TypeId) -> bool {
        Self::is_integer(type_id)
            || Self::is_float(type_id)
            || type_id == TypeId::of::<bool>()
            || type_id == TypeId::of::<char>()
            || type_id == TypeId::of::<String>()
    }

    fn write(&self, value: &dyn Any, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        macro_rules! write_integers {
            ($($t:ty),*) => {
                $(
                    if let Some(v) = value.downcast_ref::<$t>() {
                        return writer.write_number_text(v.to_string());
                    }
                )*
            };
        }
        if let Some(v) = value.downcast_ref::<bool>() {
            return writer.write_bool(*v);
        }
        for_each_integer!(write_integers);
        if let Some(v) = value.downcast_ref::<f32>() {
            return write_float(writer, v.is_finite(), v.to_string());
        }
        if let Some(v) = value.downcast_ref::<f64>() {
            return write_float(writer, v.is_finite(), v.to_string());
        }
        if let Some(v) = value.downcast_ref::<char>() {
            return writer.write_string(v.encode_utf8(&mut [0; 4]));
        }
        if let Some(v) = value.downcast_ref::<String>() {
            return writer.write_string(v);
        }
        Err(MapperError::unsupported_type(
            "<unknown>",
            "primitive converter cannot write this value",
        ))
    }

    fn from_null(&self, target: &Target) -> MapperResult<Box<dyn Any>> {
        macro_rules! default_of {
            ($($t:ty),*) => {
                $(
                    if target.id == TypeId::of::<$t>() {
                        return Ok(Box::new(<$t>::default()));
                    }
                )*
            };
        }
        for_each_integer!(default_of);
        default_of!(bool, f32, f64, char, String);
        Err(target.mismatch("NULL"))
    }

    fn from_bool(&self, value: bool, target: &Target) -> MapperResult<Box<dyn Any>> {
        if target.id == TypeId::of::<bool>() {
            return Ok(Box::new(value));
        }
        Err(target.mismatch("BOOL"))
    }

    fn from_string(&self, value: &str, target: &Target) -> MapperResult<Box<dyn Any>> {
        if target.id == TypeId::of::<String>() {
            return Ok(Box::new(value.to_owned()));
        }
        if target.id == TypeId::of::<char>() {
            let mut chars = value.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Box::new(c)),
                _ => Err(MapperError::TypeMismatch {
                    expected: "char".to_owned(),
                    actual: format!("S of length {}", value.chars().count()),
                }),
            };
        }
        Err(target.mismatch("S"))
    }

    fn from_number(&self, text: &str, target: &Target) -> MapperResult<Box<dyn Any>> {
        macro_rules! parse_integers {
            ($($t:ty),*) => {
                $(
                    if target.id == TypeId::of::<$t>() {
                        return Ok(Box::new(parse_integer::<$t>(text, target)?));
                    }
                )*
            };
        }
        for_each_integer!(parse_integers);
        if target.id == TypeId::of::<f64>() {
            return Ok(Box::new(parse_float::<f64>(text, target)?));
        }
        if target.id == TypeId::of::<f32>() {
            return Ok(Box::new(parse_float::<f32>(text, target)?));
        }
        if target.id == TypeId::of::<String>() {
            return Ok(Box::new(text.to_owned()));
        }
        Err(MapperError::unsupported_type(
            target.name,
            "not a supported numeric target",
        ))
    }
}

fn write_float(writer: &mut AttributeWriter<'_>, finite: bool, text: String) -> MapperResult<()> {
    if !finite {
        return Err(MapperError::InvalidNumber {
            text,
            target: "N".to_owned(),
        });
    }
    writer.write_number_text(text)
}

/// Parses integer text, accepting integral decimal or exponent forms
/// (`"1.0"`, `"1e3"`) when they fit the target.
fn parse_integer<T>(text: &str, target: &Target) -> MapperResult<T>
where
    T: FromStr + TryFrom<i128>,
{
    if let Ok(v) = text.trim().parse::<T>() {
        return Ok(v);
    }
    let invalid = || MapperError::InvalidNumber {
        text: text.to_owned(),
        target: target.name.to_owned(),
    };
    let float: f64 = text.trim().parse().map_err(|_| invalid())?;
    if !float.is_finite() || float.fract() != 0.0 {
        return Err(invalid());
    }
    #[allow(clippy::cast_possible_truncation)]
    let wide = float as i128;
    T::try_from(wide).map_err(|_| invalid())
}

fn parse_float<T>(text: &str, target: &Target) -> MapperResult<T>
where
    T: FromStr,
{
    text.trim().parse::<T>().map_err(|_| MapperError::InvalidNumber {
        text: text.to_owned(),
        target: target.name.to_owned(),
    })
}

/// `bytes::Bytes`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryConverter;

impl TypeConverter for BinaryConverter {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn handles(&self, type_id: TypeId) -> bool {
        type_id == TypeId::of::<Bytes>()
    }

    fn write(&self, value: &dyn Any, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        match value.downcast_ref::<Bytes>() {
            Some(b) => writer.write_binary(b),
            None => Err(MapperError::unsupported_type(
                "<unknown>",
                "binary converter cannot write this value",
            )),
        }
    }

    fn from_null(&self, _target: &Target) -> MapperResult<Box<dyn Any>> {
        Ok(Box::new(Bytes::new()))
    }

    fn from_binary(&self, value: &Bytes, _target: &Target) -> MapperResult<Box<dyn Any>> {
        Ok(Box::new(value.clone()))
    }

    fn from_string(&self, value: &str, target: &Target) -> MapperResult<Box<dyn Any>> {
        base64::engine::general_purpose::STANDARD
            .decode(value)
            .map(|decoded| Box::new(Bytes::from(decoded)) as Box<dyn Any>)
            .map_err(|_| target.mismatch("S"))
    }
}

#[derive(Clone, Copy)]
struct ParsableEntry {
    id: TypeId,
    name: &'static str,
    parse: fn(&str) -> MapperResult<Box<dyn Any>>,
    format: fn(&dyn Any) -> Option<String>,
    default: fn() -> Box<dyn Any>,
}

fn parse_boxed<T: TextScalar + Any>(text: &str) -> MapperResult<Box<dyn Any>> {
    Ok(Box::new(T::parse_text(text)?))
}

fn format_any<T: TextScalar + Any>(value: &dyn Any) -> Option<String> {
    value.downcast_ref::<T>().map(TextScalar::format_text)
}

fn default_boxed<T: Default + Any>() -> Box<dyn Any> {
    Box::new(T::default())
}

/// Scalars stored as text through a [`TextScalar`] profile: dates, times,
/// durations and identifiers.
#[derive(Clone, Default)]
pub struct ParsableConverter {
    entries: Vec<ParsableEntry>,
}

impl fmt::Debug for ParsableConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.name))
            .finish()
    }
}

impl ParsableConverter {
    /// A converter with no types.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The chrono, `std::time::Duration` and `Uuid` set.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with::<DateTime<Utc>>()
            .with::<DateTime<FixedOffset>>()
            .with::<NaiveDate>()
            .with::<NaiveDateTime>()
            .with::<NaiveTime>()
            .with::<TimeDelta>()
            .with::<std::time::Duration>()
            .with::<Uuid>()
    }

    /// Adds `T` to the handled types.
    #[must_use]
    pub fn with<T: TextScalar + Default + Any>(mut self) -> Self {
        self.entries.push(ParsableEntry {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            parse: parse_boxed::<T>,
            format: format_any::<T>,
            default: default_boxed::<T>,
        });
        self
    }

    fn entry(&self, id: TypeId) -> Option<&ParsableEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}

impl TypeConverter for ParsableConverter {
    fn name(&self) -> &'static str {
        "parsable"
    }

    fn handles(&self, type_id: TypeId) -> bool {
        self.entry(type_id).is_some()
    }

    fn write(&self, value: &dyn Any, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        let text = self
            .entry(value.type_id())
            .and_then(|e| (e.format)(value))
            .ok_or_else(|| {
                MapperError::unsupported_type("<unknown>", "parsable converter cannot write this value")
            })?;
        writer.write_string(&text)
    }

    fn from_null(&self, target: &Target) -> MapperResult<Box<dyn Any>> {
        match self.entry(target.id) {
            Some(e) => Ok((e.default)()),
            None => Err(target.mismatch("NULL")),
        }
    }

    fn from_string(&self, value: &str, target: &Target) -> MapperResult<Box<dyn Any>> {
        match self.entry(target.id) {
            Some(e) => (e.parse)(value),
            None => Err(target.mismatch("S")),
        }
    }
}
