//! Fieldless enums.
//!
//! Enums are stored either by variant name (after the configured enum naming
//! policy) or by discriminant. Decoding accepts both forms regardless of the
//! configured encoding.

use dynamap_model::AttributeValue;

use super::{AttributeWriter, CodecContext};
use crate::config::EnumEncoding;
use crate::error::{MapperError, MapperResult};

/// A fieldless enum with a static variant table.
pub trait EnumType: Copy + Sized + 'static {
    /// `(variant name, discriminant)` in declaration order.
    const VARIANTS: &'static [(&'static str, i64)];

    /// Discriminant of `self`.
    fn discriminant(&self) -> i64;

    /// Variant with discriminant `value`.
    fn from_discriminant(value: i64) -> Option<Self>;

    /// Declared name of `self`.
    fn variant_name(&self) -> Option<&'static str> {
        variant_name(Self::VARIANTS, self.discriminant())
    }
}

/// Looks up the declared name of discriminant `value`.
#[must_use]
pub fn variant_name(variants: &[(&'static str, i64)], value: i64) -> Option<&'static str> {
    variants.iter().find(|(_, d)| *d == value).map(|(n, _)| *n)
}

/// Writes an enum value given its variant table.
pub fn write_enum(
    variants: &[(&'static str, i64)],
    discriminant: i64,
    writer: &mut AttributeWriter<'_>,
) -> MapperResult<()> {
    let options = writer.context().options();
    match (options.enum_encoding, variant_name(variants, discriminant)) {
        (EnumEncoding::Name, Some(name)) => {
            let stored = options.enum_naming.apply(name);
            writer.write_string(&stored)
        }
        _ => writer.write_i64(discriminant),
    }
}

/// Reads a discriminant from either a stored name or a stored number.
pub fn read_enum(
    variants: &[(&'static str, i64)],
    type_name: &str,
    value: &AttributeValue,
    ctx: &CodecContext,
) -> MapperResult<i64> {
    match value {
        AttributeValue::S(s) => {
            let naming = ctx.options().enum_naming;
            variants
                .iter()
                .find(|(name, _)| name == s || naming.apply(name) == *s)
                .or_else(|| variants.iter().find(|(name, _)| name.eq_ignore_ascii_case(s)))
                .map(|(_, d)| *d)
                .ok_or_else(|| MapperError::TypeMismatch {
                    expected: type_name.to_owned(),
                    actual: format!("S '{s}'"),
                })
        }
        AttributeValue::N(n) => {
            let d = n.trim().parse::<i64>().map_err(|_| MapperError::InvalidNumber {
                text: n.clone(),
                target: type_name.to_owned(),
            })?;
            if variant_name(variants, d).is_none() {
                return Err(MapperError::TypeMismatch {
                    expected: type_name.to_owned(),
                    actual: format!("N '{n}'"),
                });
            }
            Ok(d)
        }
        other => Err(MapperError::type_mismatch(type_name, other)),
    }
}

/// Encodes an [`EnumType`].
pub fn encode_enum<E: EnumType>(value: &E, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
    write_enum(E::VARIANTS, value.discriminant(), writer)
}

/// Decodes an [`EnumType`].
pub fn decode_enum<E: EnumType>(value: &AttributeValue, ctx: &CodecContext) -> MapperResult<E> {
    let type_name = std::any::type_name::<E>();
    let d = read_enum(E::VARIANTS, type_name, value, ctx)?;
    E::from_discriminant(d).ok_or_else(|| MapperError::type_mismatch(type_name, value))
}

/// Implements [`EnumType`], [`Encode`](crate::codec::Encode),
/// [`Decode`](crate::codec::Decode) and `From<E> for Value` for a fieldless
/// `Copy` enum.
///
/// ```
/// use dynamap_core::enum_codec;
///
/// #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// enum Status {
///     #[default]
///     Pending,
///     Active = 2,
/// }
///
/// enum_codec!(Status { Pending, Active });
/// ```
#[macro_export]
macro_rules! enum_codec {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::codec::EnumType for $ty {
            const VARIANTS: &'static [(&'static str, i64)] =
                &[$((stringify!($variant), $ty::$variant as i64)),+];

            fn discriminant(&self) -> i64 {
                *self as i64
            }

            fn from_discriminant(value: i64) -> Option<Self> {
                $(
                    if value == $ty::$variant as i64 {
                        return Some($ty::$variant);
                    }
                )+
                None
            }
        }

        impl $crate::codec::Encode for $ty {
            fn encode(
                &self,
                writer: &mut $crate::codec::AttributeWriter<'_>,
            ) -> $crate::MapperResult<()> {
                $crate::codec::enums::encode_enum(self, writer)
            }

            fn kind() -> $crate::codec::ValueKind {
                $crate::codec::ValueKind::Enum
            }

            fn is_default(&self) -> bool {
                $crate::codec::EnumType::discriminant(self) == 0
            }

            fn enum_variants() -> Option<&'static [(&'static str, i64)]> {
                Some(<$ty as $crate::codec::EnumType>::VARIANTS)
            }
        }

        impl $crate::codec::Decode for $ty {
            fn decode(
                value: &$crate::AttributeValue,
                ctx: &$crate::codec::CodecContext,
            ) -> $crate::MapperResult<Self> {
                $crate::codec::enums::decode_enum(value, ctx)
            }
        }

        impl From<$ty> for $crate::Value {
            fn from(value: $ty) -> Self {
                $crate::Value::Enum($crate::value::EnumValue::of(value))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode, CodecContext};
    use crate::config::{CodecOptions, MapperConfig};
    use crate::naming::NamingPolicy;

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    enum Status {
        #[default]
        Pending,
        InReview = 1,
        Active = 2,
    }

    crate::enum_codec!(Status { Pending, InReview, Active });

    #[test]
    fn test_should_encode_enum_by_name() {
        let ctx = CodecContext::default();
        assert_eq!(
            encode(&Status::Active, &ctx).unwrap(),
            Some(AttributeValue::S("Active".to_owned()))
        );
    }

    #[test]
    fn test_should_apply_enum_naming_policy() {
        let options = CodecOptions::builder().enum_naming(NamingPolicy::SnakeCase).build();
        let ctx = CodecContext::new(MapperConfig::new(options));
        let av = encode(&Status::InReview, &ctx).unwrap().unwrap();
        assert_eq!(av, AttributeValue::S("in_review".to_owned()));
        assert_eq!(decode::<Status>(&av, &ctx).unwrap(), Status::InReview);
    }

    #[test]
    fn test_should_encode_enum_by_number() {
        let options = CodecOptions::builder().enum_encoding(EnumEncoding::Number).build();
        let ctx = CodecContext::new(MapperConfig::new(options));
        let av = encode(&Status::Active, &ctx).unwrap().unwrap();
        assert_eq!(av, AttributeValue::N("2".to_owned()));
        assert_eq!(decode::<Status>(&av, &ctx).unwrap(), Status::Active);
    }

    #[test]
    fn test_should_decode_either_form() {
        let ctx = CodecContext::default();
        assert_eq!(
            decode::<Status>(&AttributeValue::N("1".to_owned()), &ctx).unwrap(),
            Status::InReview
        );
        assert_eq!(
            decode::<Status>(&AttributeValue::S("active".to_owned()), &ctx).unwrap(),
            Status::Active
        );
        assert!(decode::<Status>(&AttributeValue::N("9".to_owned()), &ctx).is_err());
    }

    #[test]
    fn test_should_report_default_variant() {
        use crate::codec::Encode;
        assert!(Status::Pending.is_default());
        assert!(!Status::Active.is_default());
    }
}
