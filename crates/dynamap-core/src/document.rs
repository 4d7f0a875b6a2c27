//! Declared item shapes.
//!
//! A [`Document`] describes its members once through a [`SchemaBuilder`]:
//! getter/setter function pointers plus key roles, renames, persistence
//! overrides and interceptors. The resulting [`Schema`] is built on first use
//! and published into a process-wide cache; every later lookup returns the
//! same `Arc`.
//!
//! ```
//! use dynamap_core::document::{Document, SchemaBuilder};
//! use dynamap_core::document_codec;
//!
//! #[derive(Debug, Default)]
//! struct User {
//!     id: String,
//!     email: String,
//! }
//!
//! impl Document for User {
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema.member("id", |u| &u.id, |u| &mut u.id).partition_key();
//!         schema
//!             .member("email", |u| &u.email, |u| &mut u.email)
//!             .rename("Email");
//!     }
//! }
//!
//! document_codec!(User);
//! ```

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use dynamap_model::AttributeValue;
use tracing::debug;

use crate::codec::{AttributeWriter, CodecContext, Decode, Encode, TypeInfo, WriteFlags};
use crate::config::CodecOptions;
use crate::error::{MapperError, MapperResult, PathSegment};

/// Transforms a stored value on its way in or out.
pub type Interceptor = Arc<dyn Fn(AttributeValue) -> MapperResult<AttributeValue> + Send + Sync>;

/// A struct persisted as an `M` with declared members.
pub trait Document: Default + Send + Sync + 'static {
    /// Declares the members of `Self`.
    fn describe(schema: &mut SchemaBuilder<Self>);
}

/// Which key an index role belongs to. Ordered primary, local, global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKind {
    /// The table's own key.
    Primary,
    /// Local secondary index.
    Local,
    /// Global secondary index.
    Global,
}

/// Partition or sort half of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    /// Hash key.
    Partition,
    /// Range key.
    Sort,
}

/// One key role declared on a member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRole {
    /// Index kind.
    pub kind: IndexKind,
    /// Key half.
    pub part: KeyPart,
    /// 1-based index ordinal; 0 for the primary key.
    pub ordinal: u8,
    /// Explicit index name.
    pub index_name: Option<String>,
}

/// Per-member persistence metadata.
pub struct AttributeInfo {
    /// Rust member name.
    pub member: &'static str,
    /// Stored name when renamed, otherwise the member name.
    pub attribute_name: String,
    /// Whether the stored name was set explicitly.
    pub renamed: bool,
    /// Part of the primary key.
    pub is_key: bool,
    /// Null persistence override.
    pub persist_null: Option<bool>,
    /// Default-value persistence override.
    pub persist_default: Option<bool>,
    /// Applied in order after encoding.
    pub on_serialize: Vec<Interceptor>,
    /// Applied in order before decoding.
    pub on_deserialize: Vec<Interceptor>,
    /// Facts about the member type.
    pub value_type: TypeInfo,
}

impl fmt::Debug for AttributeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeInfo")
            .field("member", &self.member)
            .field("attribute_name", &self.attribute_name)
            .field("renamed", &self.renamed)
            .field("is_key", &self.is_key)
            .field("persist_null", &self.persist_null)
            .field("persist_default", &self.persist_default)
            .field("on_serialize", &self.on_serialize.len())
            .field("on_deserialize", &self.on_deserialize.len())
            .field("value_type", &self.value_type.name)
            .finish()
    }
}

impl AttributeInfo {
    /// Stored name under `options`: the explicit name, or the member name
    /// transformed by the attribute naming policy.
    #[must_use]
    pub fn resolved_name(&self, options: &CodecOptions) -> String {
        if self.renamed {
            self.attribute_name.clone()
        } else {
            options.attribute_naming.apply(self.member)
        }
    }
}

/// A member with its key roles.
#[derive(Debug)]
pub struct MemberInfo {
    /// Persistence metadata.
    pub attribute: Arc<AttributeInfo>,
    /// Declared key roles.
    pub roles: Vec<KeyRole>,
    /// Optimistic-locking version member.
    pub version: bool,
}

impl MemberInfo {
    /// Rust member name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.attribute.member
    }
}

/// Type-erased member table of one document type.
#[derive(Debug)]
pub struct SchemaInfo {
    /// Rust type name.
    pub type_name: &'static str,
    /// Type identity.
    pub type_id: TypeId,
    /// Members in declaration order.
    pub members: Vec<MemberInfo>,
}

impl SchemaInfo {
    /// Member declared as `name`.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<(usize, &MemberInfo)> {
        self.members.iter().enumerate().find(|(_, m)| m.name() == name)
    }

    /// Member declared as `name`, or stored as `name` under `options`.
    #[must_use]
    pub fn lookup(&self, name: &str, options: &CodecOptions) -> Option<(usize, &MemberInfo)> {
        self.member(name).or_else(|| {
            self.members
                .iter()
                .enumerate()
                .find(|(_, m)| m.attribute.resolved_name(options) == name)
        })
    }
}

trait MemberAccess<T>: Send + Sync {
    fn encode(&self, doc: &T, writer: &mut AttributeWriter<'_>) -> MapperResult<()>;
    fn is_null(&self, doc: &T) -> bool;
    fn is_default(&self, doc: &T) -> bool;
    fn decode_into(&self, doc: &mut T, value: &AttributeValue, ctx: &CodecContext) -> MapperResult<()>;
}

struct FieldAccess<T, F> {
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
}

impl<T, F> MemberAccess<T> for FieldAccess<T, F>
where
    T: Send + Sync,
    F: Encode + Decode,
{
    fn encode(&self, doc: &T, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
        (self.get)(doc).encode(writer)
    }

    fn is_null(&self, doc: &T) -> bool {
        (self.get)(doc).is_null()
    }

    fn is_default(&self, doc: &T) -> bool {
        (self.get)(doc).is_default()
    }

    fn decode_into(&self, doc: &mut T, value: &AttributeValue, ctx: &CodecContext) -> MapperResult<()> {
        *(self.get_mut)(doc) = F::decode(value, ctx)?;
        Ok(())
    }
}

/// Compiled member table of `T`: metadata plus accessors.
pub struct Schema<T> {
    info: Arc<SchemaInfo>,
    accessors: Vec<Arc<dyn MemberAccess<T>>>,
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema").field("info", &self.info).finish()
    }
}

impl<T> Schema<T> {
    /// Type-erased metadata.
    #[must_use]
    pub fn info(&self) -> Arc<SchemaInfo> {
        Arc::clone(&self.info)
    }
}

struct PendingMember<T> {
    name: &'static str,
    attribute_name: Option<String>,
    roles: Vec<KeyRole>,
    version: bool,
    persist_null: Option<bool>,
    persist_default: Option<bool>,
    on_serialize: Vec<Interceptor>,
    on_deserialize: Vec<Interceptor>,
    value_type: TypeInfo,
    access: Arc<dyn MemberAccess<T>>,
}

/// Collects member declarations for a [`Document`].
pub struct SchemaBuilder<T> {
    members: Vec<PendingMember<T>>,
    errors: Vec<String>,
}

impl<T: Document> SchemaBuilder<T> {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Declares a member by name and accessor pair.
    pub fn member<F>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> MemberBuilder<'_, T>
    where
        F: Encode + Decode + 'static,
    {
        self.members.push(PendingMember {
            name,
            attribute_name: None,
            roles: Vec::new(),
            version: false,
            persist_null: None,
            persist_default: None,
            on_serialize: Vec::new(),
            on_deserialize: Vec::new(),
            value_type: TypeInfo::of::<F>(),
            access: Arc::new(FieldAccess { get, get_mut }),
        });
        let index = self.members.len() - 1;
        MemberBuilder {
            builder: self,
            index,
        }
    }

    fn build(self) -> MapperResult<Schema<T>> {
        let type_name = std::any::type_name::<T>();
        let mut errors = self.errors;
        let mut seen = HashSet::new();
        for member in &self.members {
            if !seen.insert(member.name) {
                errors.push(format!("member '{}' declared twice", member.name));
            }
        }
        if !errors.is_empty() {
            return Err(MapperError::InvalidMetadata {
                type_name: type_name.to_owned(),
                message: errors.join("; "),
            });
        }
        let (members, accessors) = self
            .members
            .into_iter()
            .map(|m| {
                let is_key = m.roles.iter().any(|r| r.kind == IndexKind::Primary);
                let info = MemberInfo {
                    attribute: Arc::new(AttributeInfo {
                        member: m.name,
                        renamed: m.attribute_name.is_some(),
                        attribute_name: m.attribute_name.unwrap_or_else(|| m.name.to_owned()),
                        is_key,
                        persist_null: m.persist_null,
                        persist_default: m.persist_default,
                        on_serialize: m.on_serialize,
                        on_deserialize: m.on_deserialize,
                        value_type: m.value_type,
                    }),
                    roles: m.roles,
                    version: m.version,
                };
                (info, m.access)
            })
            .unzip();
        Ok(Schema {
            info: Arc::new(SchemaInfo {
                type_name,
                type_id: TypeId::of::<T>(),
                members,
            }),
            accessors,
        })
    }
}

/// Modifiers for the member just declared.
pub struct MemberBuilder<'b, T> {
    builder: &'b mut SchemaBuilder<T>,
    index: usize,
}

#[allow(clippy::return_self_not_must_use)]
impl<T> MemberBuilder<'_, T> {
    fn pending(&mut self) -> &mut PendingMember<T> {
        &mut self.builder.members[self.index]
    }

    fn role(mut self, kind: IndexKind, part: KeyPart, ordinal: u8) -> Self {
        self.pending().roles.push(KeyRole {
            kind,
            part,
            ordinal,
            index_name: None,
        });
        self
    }

    /// Stores the member under `name`, bypassing the naming policy.
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.pending().attribute_name = Some(name.into());
        self
    }

    /// Table partition key.
    pub fn partition_key(self) -> Self {
        self.role(IndexKind::Primary, KeyPart::Partition, 0)
    }

    /// Table sort key.
    pub fn sort_key(self) -> Self {
        self.role(IndexKind::Primary, KeyPart::Sort, 0)
    }

    /// Optimistic-locking version.
    pub fn version(mut self) -> Self {
        self.pending().version = true;
        self
    }

    /// Sort key of local index `ordinal` (1-based).
    pub fn local_index(self, ordinal: u8) -> Self {
        self.role(IndexKind::Local, KeyPart::Sort, ordinal)
    }

    /// Partition key of global index `ordinal` (1-based).
    pub fn global_partition_key(self, ordinal: u8) -> Self {
        self.role(IndexKind::Global, KeyPart::Partition, ordinal)
    }

    /// Sort key of global index `ordinal` (1-based).
    pub fn global_sort_key(self, ordinal: u8) -> Self {
        self.role(IndexKind::Global, KeyPart::Sort, ordinal)
    }

    /// Names the secondary index of the most recent index role.
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let position = self
            .pending()
            .roles
            .iter()
            .rposition(|r| r.kind != IndexKind::Primary);
        match position {
            Some(i) => self.pending().roles[i].index_name = Some(name),
            None => {
                let member = self.pending().name;
                self.builder.errors.push(format!(
                    "index name '{name}' on '{member}' has no secondary index role"
                ));
            }
        }
        self
    }

    /// Always (`true`) or never (`false`) persist this member when null.
    pub fn persist_null(mut self, persist: bool) -> Self {
        self.pending().persist_null = Some(persist);
        self
    }

    /// Always (`true`) or never (`false`) persist this member at its default.
    pub fn persist_default(mut self, persist: bool) -> Self {
        self.pending().persist_default = Some(persist);
        self
    }

    /// Appends a hook run on the encoded value.
    pub fn on_serialize(
        mut self,
        hook: impl Fn(AttributeValue) -> MapperResult<AttributeValue> + Send + Sync + 'static,
    ) -> Self {
        self.pending().on_serialize.push(Arc::new(hook));
        self
    }

    /// Appends a hook run on the stored value before decoding.
    pub fn on_deserialize(
        mut self,
        hook: impl Fn(AttributeValue) -> MapperResult<AttributeValue> + Send + Sync + 'static,
    ) -> Self {
        self.pending().on_deserialize.push(Arc::new(hook));
        self
    }
}

static SCHEMAS: LazyLock<DashMap<TypeId, Arc<dyn Any + Send + Sync>>> = LazyLock::new(DashMap::new);

/// The published schema of `T`, built on first use.
///
/// Concurrent first calls may each build a candidate; exactly one is
/// published and every caller receives it.
pub fn schema_of<T: Document>() -> MapperResult<Arc<Schema<T>>> {
    let id = TypeId::of::<T>();
    let cached = SCHEMAS.get(&id).map(|entry| Arc::clone(entry.value()));
    let erased = match cached {
        Some(erased) => erased,
        None => {
            let mut builder = SchemaBuilder::new();
            T::describe(&mut builder);
            let candidate: Arc<dyn Any + Send + Sync> = Arc::new(builder.build()?);
            let published = Arc::clone(SCHEMAS.entry(id).or_insert(candidate).value());
            debug!(
                type_name = std::any::type_name::<T>(),
                "published document schema"
            );
            published
        }
    };
    erased.downcast::<Schema<T>>().map_err(|_| MapperError::InvalidMetadata {
        type_name: std::any::type_name::<T>().to_owned(),
        message: "cached schema has a different type".to_owned(),
    })
}

/// Metadata of member `member` of `T`.
pub fn attribute_info<T: Document>(member: &str) -> MapperResult<Arc<AttributeInfo>> {
    let schema = schema_of::<T>()?;
    schema
        .info
        .member(member)
        .map(|(_, m)| Arc::clone(&m.attribute))
        .ok_or_else(|| MapperError::UnknownMember {
            type_name: schema.info.type_name.to_owned(),
            member: member.to_owned(),
        })
}

fn run_hooks(hooks: &[Interceptor], mut value: AttributeValue) -> MapperResult<AttributeValue> {
    for hook in hooks {
        value = hook(value)?;
    }
    Ok(value)
}

fn write_member<T>(
    doc: &T,
    info: &AttributeInfo,
    access: &dyn MemberAccess<T>,
    name: &str,
    writer: &mut AttributeWriter<'_>,
) -> MapperResult<()> {
    let ctx = writer.context();
    let options = ctx.options();
    if access.is_null(doc) {
        let keep = info.is_key || info.persist_null.unwrap_or(options.serialize_null_values);
        if !keep {
            return Ok(());
        }
    } else if access.is_default(doc) {
        let keep = info.is_key
            || info
                .persist_default
                .unwrap_or_else(|| ctx.config().should_serialize_default(&info.value_type));
        if !keep {
            return Ok(());
        }
    }
    let pinned = info.persist_null == Some(true) || info.persist_default == Some(true);
    writer.property_with(name, pinned)?;
    if info.on_serialize.is_empty() {
        return access.encode(doc, writer);
    }
    let mut nested = AttributeWriter::nested(ctx);
    access.encode(doc, &mut nested)?;
    let encoded = nested.finish()?.unwrap_or_else(AttributeValue::null);
    writer.write_raw(run_hooks(&info.on_serialize, encoded)?)
}

fn encode_fields<T: Document>(
    doc: &T,
    discriminator: Option<(&str, String)>,
    writer: &mut AttributeWriter<'_>,
) -> MapperResult<()> {
    let schema = schema_of::<T>()?;
    let options = writer.context().options();
    writer.begin_object()?;
    if let Some((attribute, type_name)) = discriminator {
        writer.property_with(attribute, true)?;
        writer.write_string(&type_name)?;
    }
    for (member, access) in schema.info.members.iter().zip(&schema.accessors) {
        let name = member.attribute.resolved_name(options);
        write_member(doc, &member.attribute, access.as_ref(), &name, writer)
            .map_err(|e| e.at(PathSegment::Field(name.clone())))?;
    }
    writer.end_object()
}

/// Writes `doc` as an `M`.
pub fn encode_document<T: Document>(doc: &T, writer: &mut AttributeWriter<'_>) -> MapperResult<()> {
    encode_fields(doc, None, writer)
}

/// Writes `doc` as an `M` carrying the type discriminator, when the
/// configured resolver names the type.
pub fn encode_variant<T: Document + Encode>(
    doc: &T,
    writer: &mut AttributeWriter<'_>,
) -> MapperResult<()> {
    let ctx = writer.context();
    let discriminator = ctx
        .config()
        .type_name_resolver
        .type_name(&TypeInfo::of::<T>())
        .map(|name| (ctx.options().type_discriminator.as_str(), name));
    encode_fields(doc, discriminator, writer)
}

/// Encodes member `index` of `doc` on its own, interceptors included.
pub fn encode_member<T: Document>(
    doc: &T,
    index: usize,
    ctx: &CodecContext,
) -> MapperResult<Option<AttributeValue>> {
    let schema = schema_of::<T>()?;
    let (Some(member), Some(access)) = (schema.info.members.get(index), schema.accessors.get(index))
    else {
        return Err(MapperError::InvalidMetadata {
            type_name: schema.info.type_name.to_owned(),
            message: format!("no member at position {index}"),
        });
    };
    let mut writer = AttributeWriter::new(ctx, WriteFlags::default());
    access.encode(doc, &mut writer)?;
    match writer.finish()? {
        Some(value) => run_hooks(&member.attribute.on_serialize, value).map(Some),
        None => Ok(None),
    }
}

/// Decodes the members of `T` from an `M` payload.
pub fn decode_fields<T: Document>(
    entries: &BTreeMap<String, AttributeValue>,
    ctx: &CodecContext,
) -> MapperResult<T> {
    let schema = schema_of::<T>()?;
    let mut doc = T::default();
    for (member, access) in schema.info.members.iter().zip(&schema.accessors) {
        let info = &member.attribute;
        let name = info.resolved_name(ctx.options());
        let Some(stored) = entries.get(&name) else {
            if info.is_key {
                return Err(MapperError::MissingRequiredAttribute { attribute: name });
            }
            continue;
        };
        let outcome = if info.on_deserialize.is_empty() {
            access.decode_into(&mut doc, stored, ctx)
        } else {
            run_hooks(&info.on_deserialize, stored.clone())
                .and_then(|value| access.decode_into(&mut doc, &value, ctx))
        };
        outcome.map_err(|e| e.at(PathSegment::Field(name)))?;
    }
    Ok(doc)
}

/// Decodes `T` from an `M`; `NULL` yields `T::default()`.
pub fn decode_document<T: Document>(value: &AttributeValue, ctx: &CodecContext) -> MapperResult<T> {
    match value {
        AttributeValue::Null(_) => Ok(T::default()),
        AttributeValue::M(entries) => decode_fields(entries, ctx),
        other => Err(MapperError::type_mismatch(std::any::type_name::<T>(), other)),
    }
}

/// The discriminator stored in `entries`.
pub fn read_discriminator<'v>(
    entries: &'v BTreeMap<String, AttributeValue>,
    ctx: &CodecContext,
) -> MapperResult<&'v str> {
    let attribute = &ctx.options().type_discriminator;
    match entries.get(attribute) {
        Some(AttributeValue::S(name)) => Ok(name),
        Some(other) => Err(MapperError::type_mismatch("type discriminator", other)
            .at(PathSegment::Field(attribute.clone()))),
        None => Err(MapperError::MissingRequiredAttribute {
            attribute: attribute.clone(),
        }),
    }
}

/// Whether `name` is the discriminator the resolver assigns to `T`.
#[must_use]
pub fn variant_matches<T: Encode + 'static>(name: &str, ctx: &CodecContext) -> bool {
    ctx.config()
        .type_name_resolver
        .type_name(&TypeInfo::of::<T>())
        .is_some_and(|resolved| resolved == name)
}

/// Implements [`Encode`] and [`Decode`] for [`Document`] types.
#[macro_export]
macro_rules! document_codec {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::codec::Encode for $ty {
                fn encode(
                    &self,
                    writer: &mut $crate::codec::AttributeWriter<'_>,
                ) -> $crate::MapperResult<()> {
                    $crate::document::encode_document(self, writer)
                }

                fn kind() -> $crate::codec::ValueKind {
                    $crate::codec::ValueKind::Document
                }

                fn schema_info() -> Option<::std::sync::Arc<$crate::document::SchemaInfo>> {
                    $crate::document::schema_of::<$ty>().ok().map(|schema| schema.info())
                }
            }

            impl $crate::codec::Decode for $ty {
                fn decode(
                    value: &$crate::AttributeValue,
                    ctx: &$crate::codec::CodecContext,
                ) -> $crate::MapperResult<Self> {
                    $crate::document::decode_document(value, ctx)
                }
            }
        )+
    };
}

/// Implements [`Encode`] and [`Decode`] for an enum whose variants each wrap
/// one document type, using the type discriminator to pick the variant.
///
/// Every wrapped type needs its own [`document_codec!`].
#[macro_export]
macro_rules! polymorphic_codec {
    ($ty:ident { $($variant:ident($inner:ty)),+ $(,)? }) => {
        impl $crate::codec::Encode for $ty {
            fn encode(
                &self,
                writer: &mut $crate::codec::AttributeWriter<'_>,
            ) -> $crate::MapperResult<()> {
                match self {
                    $($ty::$variant(inner) => $crate::document::encode_variant(inner, writer),)+
                }
            }

            fn kind() -> $crate::codec::ValueKind {
                $crate::codec::ValueKind::Document
            }
        }

        impl $crate::codec::Decode for $ty {
            fn decode(
                value: &$crate::AttributeValue,
                ctx: &$crate::codec::CodecContext,
            ) -> $crate::MapperResult<Self> {
                let $crate::AttributeValue::M(entries) = value else {
                    return Err($crate::MapperError::type_mismatch(stringify!($ty), value));
                };
                let name = $crate::document::read_discriminator(entries, ctx)?;
                $(
                    if $crate::document::variant_matches::<$inner>(name, ctx) {
                        return $crate::document::decode_fields::<$inner>(entries, ctx)
                            .map($ty::$variant);
                    }
                )+
                Err($crate::MapperError::TypeMismatch {
                    expected: stringify!($ty).to_owned(),
                    actual: format!("discriminator '{name}'"),
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::codec::{decode, encode};
    use crate::config::MapperConfig;
    use crate::naming::NamingPolicy;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Address {
        street: String,
        lines: Vec<String>,
    }

    impl Document for Address {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("street", |a| &a.street, |a| &mut a.street);
            schema.member("lines", |a| &a.lines, |a| &mut a.lines);
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Customer {
        id: String,
        display_name: String,
        age: u32,
        notes: Option<String>,
        avatar: Bytes,
        address: Option<Address>,
    }

    impl Document for Customer {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("id", |c| &c.id, |c| &mut c.id).partition_key();
            schema.member("display_name", |c| &c.display_name, |c| &mut c.display_name);
            schema.member("age", |c| &c.age, |c| &mut c.age);
            schema.member("notes", |c| &c.notes, |c| &mut c.notes);
            schema.member("avatar", |c| &c.avatar, |c| &mut c.avatar).rename("Pic");
            schema.member("address", |c| &c.address, |c| &mut c.address);
        }
    }

    crate::document_codec!(Address, Customer);

    fn customer() -> Customer {
        Customer {
            id: "c-1".to_owned(),
            display_name: "Ada".to_owned(),
            age: 36,
            notes: None,
            avatar: Bytes::from_static(b"\x89PNG"),
            address: Some(Address {
                street: "1 Loop".to_owned(),
                lines: vec!["a".to_owned(), "b".to_owned()],
            }),
        }
    }

    #[test]
    fn test_should_roundtrip_document() {
        let ctx = CodecContext::default();
        let av = encode(&customer(), &ctx).unwrap().unwrap();
        let map = av.as_m().unwrap();
        assert!(map.contains_key("Pic"));
        assert!(!map.contains_key("notes"));
        assert_eq!(decode::<Customer>(&av, &ctx).unwrap(), customer());
    }

    #[test]
    fn test_should_apply_attribute_naming_policy() {
        let options = CodecOptions::builder().attribute_naming(NamingPolicy::PascalCase).build();
        let ctx = CodecContext::new(MapperConfig::new(options));
        let av = encode(&customer(), &ctx).unwrap().unwrap();
        let keys: Vec<&String> = av.as_m().unwrap().keys().collect();
        assert_eq!(keys, vec!["Address", "Age", "DisplayName", "Id", "Pic"]);
        assert_eq!(decode::<Customer>(&av, &ctx).unwrap(), customer());
    }

    #[test]
    fn test_should_skip_defaults_unless_configured() {
        let ctx = CodecContext::default();
        let sparse = Customer {
            id: "c-2".to_owned(),
            ..Customer::default()
        };
        let av = encode(&sparse, &ctx).unwrap().unwrap();
        assert_eq!(av.as_m().unwrap().keys().collect::<Vec<_>>(), vec!["id"]);

        let options = CodecOptions::builder()
            .serialize_default_values(true)
            .serialize_null_values(true)
            .build();
        let ctx = CodecContext::new(MapperConfig::new(options));
        let av = encode(&sparse, &ctx).unwrap().unwrap();
        let map = av.as_m().unwrap();
        assert_eq!(map.get("age"), Some(&AttributeValue::N("0".to_owned())));
        assert_eq!(map.get("notes"), Some(&AttributeValue::null()));
    }

    #[test]
    fn test_should_report_missing_key() {
        let ctx = CodecContext::default();
        let av = AttributeValue::M(
            [("age".to_owned(), AttributeValue::N("1".to_owned()))]
                .into_iter()
                .collect(),
        );
        let err = decode::<Customer>(&av, &ctx).unwrap_err();
        assert!(matches!(
            err,
            MapperError::MissingRequiredAttribute { ref attribute } if attribute == "id"
        ));
    }

    #[test]
    fn test_should_report_nested_decode_path() {
        let ctx = CodecContext::default();
        let mut av = encode(&customer(), &ctx).unwrap().unwrap();
        if let AttributeValue::M(map) = &mut av {
            map.insert(
                "address".to_owned(),
                AttributeValue::M(
                    [(
                        "lines".to_owned(),
                        AttributeValue::L(vec!["ok".into(), AttributeValue::Bool(true)]),
                    )]
                    .into_iter()
                    .collect(),
                ),
            );
        }
        let err = decode::<Customer>(&av, &ctx).unwrap_err();
        assert_eq!(err.path(), "$.address.lines[1]");
    }

    #[derive(Debug, Default, PartialEq)]
    struct Audited {
        id: String,
        secret: String,
        comment: Option<String>,
    }

    impl Document for Audited {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("id", |a| &a.id, |a| &mut a.id).partition_key();
            schema
                .member("secret", |a| &a.secret, |a| &mut a.secret)
                .on_serialize(|v| match v {
                    AttributeValue::S(s) => Ok(AttributeValue::S(s.chars().rev().collect())),
                    other => Ok(other),
                })
                .on_deserialize(|v| match v {
                    AttributeValue::S(s) => Ok(AttributeValue::S(s.chars().rev().collect())),
                    other => Ok(other),
                });
            schema
                .member("comment", |a| &a.comment, |a| &mut a.comment)
                .persist_null(true);
        }
    }

    crate::document_codec!(Audited);

    #[test]
    fn test_should_run_interceptors_and_member_overrides() {
        let ctx = CodecContext::default();
        let doc = Audited {
            id: "1".to_owned(),
            secret: "abc".to_owned(),
            comment: None,
        };
        let av = encode(&doc, &ctx).unwrap().unwrap();
        let map = av.as_m().unwrap();
        assert_eq!(map.get("secret"), Some(&AttributeValue::S("cba".to_owned())));
        assert_eq!(map.get("comment"), Some(&AttributeValue::null()));
        assert_eq!(decode::<Audited>(&av, &ctx).unwrap(), doc);
    }

    #[derive(Debug, Default)]
    struct Broken {
        a: i32,
    }

    impl Document for Broken {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("a", |b| &b.a, |b| &mut b.a).index_name("nope");
            schema.member("a", |b| &b.a, |b| &mut b.a);
        }
    }

    #[test]
    fn test_should_reject_invalid_declarations() {
        let err = schema_of::<Broken>().unwrap_err();
        let MapperError::InvalidMetadata { message, .. } = err else {
            panic!("expected invalid metadata");
        };
        assert!(message.contains("no secondary index role"));
        assert!(message.contains("declared twice"));
    }

    #[test]
    fn test_should_publish_one_schema_per_type() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| schema_of::<Customer>().unwrap().info()))
            .collect();
        let infos: Vec<Arc<SchemaInfo>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(infos.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        let info = attribute_info::<Customer>("avatar").unwrap();
        assert_eq!(info.attribute_name, "Pic");
        assert!(attribute_info::<Customer>("missing").is_err());
    }
}
