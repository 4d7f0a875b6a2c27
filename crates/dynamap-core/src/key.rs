//! Typed primary keys.
//!
//! A [`PrimaryKey`] holds the partition value and optional sort value of one
//! document type. It orders the way the store orders keys and round-trips
//! through a compact text form: `escape(partition)[|escape(sort)]`, where
//! escaping percent-encodes `%`, `|` and control bytes and binary components
//! are base64 first.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use dynamap_model::types::ScalarAttributeType;
use dynamap_model::{AttributeValue, Item};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::codec::enums::read_enum;
use crate::codec::{CodecContext, ValueKind, WriteFlags, encode_with};
use crate::document::{Document, MemberInfo, encode_member};
use crate::error::{MapperError, MapperResult};
use crate::table::TableDescriptor;
use crate::value::{EnumValue, Value};

const KEY_TEXT: &AsciiSet = &CONTROLS.add(b'%').add(b'|');

/// One key component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    /// String key.
    S(String),
    /// Number key, as decimal text.
    N(String),
    /// Binary key.
    B(Bytes),
}

impl KeyValue {
    /// Scalar type of this component.
    #[must_use]
    pub fn scalar_type(&self) -> ScalarAttributeType {
        match self {
            Self::S(_) => ScalarAttributeType::S,
            Self::N(_) => ScalarAttributeType::N,
            Self::B(_) => ScalarAttributeType::B,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::S(_) => 0,
            Self::N(_) => 1,
            Self::B(_) => 2,
        }
    }

    /// Parses a number string to `f64` for comparison purposes.
    fn parse_number(s: &str) -> f64 {
        s.trim().parse::<f64>().unwrap_or(f64::NAN)
    }

    fn to_text(&self) -> String {
        match self {
            Self::S(s) | Self::N(s) => s.clone(),
            Self::B(b) => BASE64.encode(b),
        }
    }

    fn from_text(text: &str, key_type: ScalarAttributeType) -> Result<Self, String> {
        match key_type {
            ScalarAttributeType::S => Ok(Self::S(text.to_owned())),
            ScalarAttributeType::N => {
                if text.trim().parse::<f64>().is_ok_and(f64::is_finite) {
                    Ok(Self::N(text.trim().to_owned()))
                } else {
                    Err(format!("'{text}' is not a number"))
                }
            }
            ScalarAttributeType::B => BASE64
                .decode(text)
                .map(|raw| Self::B(Bytes::from(raw)))
                .map_err(|e| format!("invalid base64: {e}")),
        }
    }
}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::S(a), Self::S(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::N(a), Self::N(b)) => {
                let (x, y) = (Self::parse_number(a), Self::parse_number(b));
                x.partial_cmp(&y)
                    .filter(|o| o.is_ne())
                    .unwrap_or_else(|| a.cmp(b))
            }
            (Self::B(a), Self::B(b)) => a.as_ref().cmp(b.as_ref()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<KeyValue> for AttributeValue {
    fn from(value: KeyValue) -> Self {
        match value {
            KeyValue::S(s) => Self::S(s),
            KeyValue::N(n) => Self::N(n),
            KeyValue::B(b) => Self::B(b),
        }
    }
}

impl TryFrom<AttributeValue> for KeyValue {
    type Error = MapperError;

    fn try_from(value: AttributeValue) -> Result<Self, Self::Error> {
        match value {
            AttributeValue::S(s) => Ok(Self::S(s)),
            AttributeValue::N(n) => Ok(Self::N(n)),
            AttributeValue::B(b) => Ok(Self::B(b)),
            other => Err(MapperError::type_mismatch("key value", &other)),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Partition and optional sort value of a `T`.
pub struct PrimaryKey<T> {
    partition: KeyValue,
    sort: Option<KeyValue>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for PrimaryKey<T> {
    fn clone(&self) -> Self {
        Self {
            partition: self.partition.clone(),
            sort: self.sort.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for PrimaryKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryKey")
            .field("partition", &self.partition)
            .field("sort", &self.sort)
            .finish()
    }
}

impl<T> PartialEq for PrimaryKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.partition == other.partition && self.sort == other.sort
    }
}

impl<T> Eq for PrimaryKey<T> {}

impl<T> Hash for PrimaryKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.partition.hash(state);
        self.sort.hash(state);
    }
}

impl<T> PartialOrd for PrimaryKey<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for PrimaryKey<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.partition
            .cmp(&other.partition)
            .then_with(|| self.sort.cmp(&other.sort))
    }
}

impl<T> fmt::Display for PrimaryKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", utf8_percent_encode(&self.partition.to_text(), KEY_TEXT))?;
        if let Some(sort) = &self.sort {
            write!(f, "|{}", utf8_percent_encode(&sort.to_text(), KEY_TEXT))?;
        }
        Ok(())
    }
}

fn declared_type(member: &MemberInfo, ctx: &CodecContext) -> MapperResult<ScalarAttributeType> {
    member
        .attribute
        .value_type
        .kind
        .scalar_type(ctx.options().enum_encoding)
        .ok_or_else(|| MapperError::unsupported_type(member.attribute.value_type.name, "not a key type"))
}

fn enum_constant(member: &MemberInfo, value: Value, ctx: &CodecContext) -> MapperResult<Value> {
    let info = &member.attribute.value_type;
    let Some(variants) = info.enum_variants.filter(|_| info.kind == ValueKind::Enum) else {
        return Ok(value);
    };
    let discriminant = match &value {
        Value::Int(d) => *d,
        Value::String(s) => read_enum(variants, info.name, &AttributeValue::S(s.clone()), ctx)?,
        _ => return Ok(value),
    };
    Ok(Value::Enum(EnumValue {
        type_name: info.name,
        variants,
        discriminant,
    }))
}

fn cast_component(member: &MemberInfo, value: Value, ctx: &CodecContext) -> MapperResult<KeyValue> {
    let attribute = member.attribute.resolved_name(ctx.options());
    let key_type = declared_type(member, ctx)?;
    let value = enum_constant(member, value, ctx)?;
    let encoded = encode_with(&value, ctx, WriteFlags::persist_all())?
        .filter(|av| !av.is_null())
        .ok_or_else(|| MapperError::MissingRequiredAttribute {
            attribute: attribute.clone(),
        })?;
    let cast = match (key_type, encoded) {
        (ScalarAttributeType::S, AttributeValue::S(s) | AttributeValue::N(s)) => KeyValue::S(s),
        (ScalarAttributeType::N, AttributeValue::N(n)) => KeyValue::N(n),
        (ScalarAttributeType::N, AttributeValue::S(s)) => {
            KeyValue::from_text(&s, ScalarAttributeType::N).map_err(|_| MapperError::InvalidNumber {
                text: s,
                target: member.attribute.value_type.name.to_owned(),
            })?
        }
        (ScalarAttributeType::B, AttributeValue::B(b)) => KeyValue::B(b),
        (ScalarAttributeType::B, AttributeValue::S(s)) => KeyValue::from_text(&s, ScalarAttributeType::B)
            .map_err(|reason| MapperError::TypeMismatch {
                expected: "binary key".to_owned(),
                actual: reason,
            })?,
        (expected, other) => {
            return Err(MapperError::type_mismatch(expected.as_str(), &other));
        }
    };
    Ok(cast)
}

impl<T: Document> PrimaryKey<T> {
    /// Key of an existing document.
    pub fn from_document(doc: &T, ctx: &CodecContext) -> MapperResult<Self> {
        let descriptor = TableDescriptor::resolve::<T>()?;
        let read = |index: usize| -> MapperResult<KeyValue> {
            let member = &descriptor.schema().members[index];
            let value = encode_member(doc, index, ctx)?.ok_or_else(|| {
                MapperError::MissingRequiredAttribute {
                    attribute: member.attribute.resolved_name(ctx.options()),
                }
            })?;
            KeyValue::try_from(value)
        };
        let partition = read(descriptor.partition_key_index())?;
        let sort = descriptor.sort_key_index().map(read).transpose()?;
        Ok(Self {
            partition,
            sort,
            _marker: PhantomData,
        })
    }

    /// Key from raw components, cast to the declared key types.
    pub fn from_parts(
        ctx: &CodecContext,
        partition: impl Into<Value>,
        sort: Option<Value>,
    ) -> MapperResult<Self> {
        let descriptor = TableDescriptor::resolve::<T>()?;
        let partition = cast_component(descriptor.partition_key(), partition.into(), ctx)?;
        let sort = match (descriptor.sort_key(), sort) {
            (Some(member), Some(value)) => Some(cast_component(member, value, ctx)?),
            (Some(member), None) => {
                return Err(MapperError::MissingRequiredAttribute {
                    attribute: member.attribute.resolved_name(ctx.options()),
                });
            }
            (None, Some(_)) => {
                return Err(MapperError::InvalidMetadata {
                    type_name: descriptor.schema().type_name.to_owned(),
                    message: "sort value given but no sort key declared".to_owned(),
                });
            }
            (None, None) => None,
        };
        Ok(Self {
            partition,
            sort,
            _marker: PhantomData,
        })
    }

    /// Parses the text form produced by [`PrimaryKey::to_key_string`].
    pub fn parse(text: &str, ctx: &CodecContext) -> MapperResult<Self> {
        let descriptor = TableDescriptor::resolve::<T>()?;
        let malformed = |reason: String| MapperError::MalformedKeyText {
            text: text.to_owned(),
            reason,
        };
        let parts: Vec<&str> = text.split('|').collect();
        let expected = if descriptor.sort_key().is_some() { 2 } else { 1 };
        if parts.len() != expected {
            return Err(malformed(format!(
                "expected {expected} component(s), found {}",
                parts.len()
            )));
        }
        let component = |raw: &str, member: &MemberInfo| -> MapperResult<KeyValue> {
            if raw.is_empty() {
                return Err(malformed(format!("empty component for '{}'", member.name())));
            }
            let decoded = percent_decode_str(raw)
                .decode_utf8()
                .map_err(|e| malformed(e.to_string()))?;
            let key_type = declared_type(member, ctx)?;
            KeyValue::from_text(&decoded, key_type).map_err(malformed)
        };
        let partition = component(parts[0], descriptor.partition_key())?;
        let sort = match descriptor.sort_key() {
            Some(member) => Some(component(parts[1], member)?),
            None => None,
        };
        Ok(Self {
            partition,
            sort,
            _marker: PhantomData,
        })
    }

    /// Key attributes as an item, named per the configured policy.
    pub fn to_item(&self, ctx: &CodecContext) -> MapperResult<Item> {
        let descriptor = TableDescriptor::resolve::<T>()?;
        let mut item = Item::new();
        item.insert(
            descriptor.partition_key().attribute.resolved_name(ctx.options()),
            self.partition.clone().into(),
        );
        if let (Some(member), Some(sort)) = (descriptor.sort_key(), &self.sort) {
            item.insert(
                member.attribute.resolved_name(ctx.options()),
                sort.clone().into(),
            );
        }
        Ok(item)
    }
}

impl<T> PrimaryKey<T> {
    /// Partition component.
    #[must_use]
    pub fn partition(&self) -> &KeyValue {
        &self.partition
    }

    /// Sort component.
    #[must_use]
    pub fn sort(&self) -> Option<&KeyValue> {
        self.sort.as_ref()
    }

    /// Text form; see the module docs.
    #[must_use]
    pub fn to_key_string(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EnumType;
    use crate::config::{CodecOptions, EnumEncoding, MapperConfig};
    use crate::document::SchemaBuilder;

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    enum Tier {
        #[default]
        Free,
        Pro = 2,
    }

    crate::enum_codec!(Tier { Free, Pro });

    #[derive(Debug, Default)]
    struct Event {
        stream: String,
        seq: u64,
        payload: String,
    }

    impl Document for Event {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .member("stream", |e| &e.stream, |e| &mut e.stream)
                .partition_key();
            schema.member("seq", |e| &e.seq, |e| &mut e.seq).sort_key();
            schema.member("payload", |e| &e.payload, |e| &mut e.payload);
        }
    }

    #[derive(Debug, Default)]
    struct Blob {
        digest: Bytes,
    }

    impl Document for Blob {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .member("digest", |b| &b.digest, |b| &mut b.digest)
                .partition_key();
        }
    }

    #[derive(Debug, Default)]
    struct Account {
        tier: Tier,
        id: String,
    }

    impl Document for Account {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("tier", |a| &a.tier, |a| &mut a.tier).partition_key();
            schema.member("id", |a| &a.id, |a| &mut a.id).sort_key();
        }
    }

    #[test]
    fn test_should_read_key_from_document() {
        let ctx = CodecContext::default();
        let event = Event {
            stream: "orders|eu".to_owned(),
            seq: 42,
            payload: "x".to_owned(),
        };
        let key = PrimaryKey::from_document(&event, &ctx).unwrap();
        assert_eq!(key.partition(), &KeyValue::S("orders|eu".to_owned()));
        assert_eq!(key.sort(), Some(&KeyValue::N("42".to_owned())));
        assert_eq!(key.to_key_string(), "orders%7Ceu|42");

        let item = key.to_item(&ctx).unwrap();
        assert_eq!(item.len(), 2);
        assert_eq!(item.get("seq"), Some(&AttributeValue::N("42".to_owned())));
    }

    #[test]
    fn test_should_roundtrip_key_text() {
        let ctx = CodecContext::default();
        let key = PrimaryKey::<Event>::from_parts(&ctx, "100%\n", Some(Value::Int(7))).unwrap();
        let text = key.to_key_string();
        assert_eq!(text, "100%25%0A|7");
        assert_eq!(PrimaryKey::<Event>::parse(&text, &ctx).unwrap(), key);

        let blob = PrimaryKey::<Blob>::from_parts(&ctx, Bytes::from_static(&[0xff, 0x00]), None).unwrap();
        let text = blob.to_key_string();
        assert_eq!(PrimaryKey::<Blob>::parse(&text, &ctx).unwrap(), blob);
    }

    #[test]
    fn test_should_reject_malformed_key_text() {
        let ctx = CodecContext::default();
        for bad in ["only-partition", "a|b|c", "a|not-a-number", "a|%FF"] {
            assert!(
                matches!(
                    PrimaryKey::<Event>::parse(bad, &ctx).unwrap_err(),
                    MapperError::MalformedKeyText { .. }
                ),
                "{bad}"
            );
        }
        assert!(PrimaryKey::<Blob>::parse("!!!", &ctx).is_err());
    }

    #[test]
    fn test_should_reject_empty_key_components() {
        let ctx = CodecContext::default();
        for bad in ["|7", "a|", "|"] {
            let err = PrimaryKey::<Event>::parse(bad, &ctx).unwrap_err();
            assert!(
                matches!(&err, MapperError::MalformedKeyText { reason, .. } if reason.contains("empty")),
                "{bad}: {err}"
            );
        }
        assert!(matches!(
            PrimaryKey::<Blob>::parse("", &ctx).unwrap_err(),
            MapperError::MalformedKeyText { .. }
        ));
    }

    #[test]
    fn test_should_cast_parts_to_declared_types() {
        let ctx = CodecContext::default();
        let key = PrimaryKey::<Event>::from_parts(&ctx, 12, Some(Value::from("0005"))).unwrap();
        assert_eq!(key.partition(), &KeyValue::S("12".to_owned()));
        assert_eq!(key.sort(), Some(&KeyValue::N("0005".to_owned())));

        assert!(matches!(
            PrimaryKey::<Event>::from_parts(&ctx, "s", Some(Value::from("abc"))).unwrap_err(),
            MapperError::InvalidNumber { .. }
        ));
        assert!(matches!(
            PrimaryKey::<Event>::from_parts(&ctx, "s", None).unwrap_err(),
            MapperError::MissingRequiredAttribute { .. }
        ));
        assert!(matches!(
            PrimaryKey::<Blob>::from_parts(&ctx, Bytes::from_static(b"a"), Some(Value::Int(1)))
                .unwrap_err(),
            MapperError::InvalidMetadata { .. }
        ));
        assert!(PrimaryKey::<Event>::from_parts(&ctx, "", Some(Value::Int(1))).is_err());
    }

    #[test]
    fn test_should_cast_enum_keys_by_encoding() {
        let ctx = CodecContext::default();
        let by_number = PrimaryKey::<Account>::from_parts(&ctx, 2, Some(Value::from("a"))).unwrap();
        let by_value = PrimaryKey::<Account>::from_parts(&ctx, Tier::Pro, Some(Value::from("a"))).unwrap();
        assert_eq!(by_number, by_value);
        assert_eq!(by_number.partition(), &KeyValue::S("Pro".to_owned()));
        assert_eq!(Tier::Pro.discriminant(), 2);

        let options = CodecOptions::builder().enum_encoding(EnumEncoding::Number).build();
        let ctx = CodecContext::new(MapperConfig::new(options));
        let key = PrimaryKey::<Account>::from_parts(&ctx, "pro", Some(Value::from("a"))).unwrap();
        assert_eq!(key.partition(), &KeyValue::N("2".to_owned()));
    }

    #[test]
    fn test_should_order_like_the_store() {
        let mut values = vec![
            KeyValue::N("10".to_owned()),
            KeyValue::N("9.5".to_owned()),
            KeyValue::S("b".to_owned()),
            KeyValue::S("a".to_owned()),
            KeyValue::N("-1".to_owned()),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                KeyValue::S("a".to_owned()),
                KeyValue::S("b".to_owned()),
                KeyValue::N("-1".to_owned()),
                KeyValue::N("9.5".to_owned()),
                KeyValue::N("10".to_owned()),
            ]
        );
        let ctx = CodecContext::default();
        let a = PrimaryKey::<Event>::from_parts(&ctx, "s", Some(Value::Int(2))).unwrap();
        let b = PrimaryKey::<Event>::from_parts(&ctx, "s", Some(Value::Int(10))).unwrap();
        assert!(a < b);
    }
}
