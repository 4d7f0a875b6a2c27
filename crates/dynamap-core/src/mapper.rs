//! The mapper facade.
//!
//! A [`Mapper`] bundles one configuration with its converter chain and exposes
//! the codec, table metadata and expression compiler over it. Cloning a mapper
//! is cheap and clones share converters.

use std::sync::Arc;

use dynamap_model::types::{TableDefinition, TableUpdate};
use dynamap_model::{AttributeValue, Item};
use tracing::debug;

use crate::codec::{CodecContext, Decode, Encode, TypeConverter, decode, encode};
use crate::config::{CodecOptions, MapperConfig};
use crate::document::Document;
use crate::error::{MapperError, MapperResult};
use crate::expression::{CompiledExpression, Expr, ExpressionContext};
use crate::key::PrimaryKey;
use crate::table::TableDescriptor;

/// Entry point for encoding, decoding and compiling expressions.
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    codec: CodecContext,
}

impl Mapper {
    /// Mapper over `config`.
    #[must_use]
    pub fn new(config: MapperConfig) -> Self {
        Self {
            codec: CodecContext::new(config),
        }
    }

    /// Mapper configured from `DYNAMAP_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let options = CodecOptions::from_env();
        debug!(?options, "mapper configured from environment");
        Self::new(MapperConfig::new(options))
    }

    /// Codec state shared by every operation of this mapper.
    #[must_use]
    pub fn codec(&self) -> &CodecContext {
        &self.codec
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &MapperConfig {
        self.codec.config()
    }

    /// Puts `converter` ahead of every converter registered so far.
    pub fn register_converter(&self, converter: impl TypeConverter + 'static) {
        self.codec.registry().register(Arc::new(converter));
    }

    // -----------------------------------------------------------------------
    // Codec
    // -----------------------------------------------------------------------

    /// Encodes `value`; `None` when it compacts to nothing.
    pub fn to_attribute_value<T: Encode + ?Sized>(
        &self,
        value: &T,
    ) -> MapperResult<Option<AttributeValue>> {
        encode(value, &self.codec)
    }

    /// Encodes `value` as a whole item. The value must encode to a map.
    pub fn to_item<T: Encode + ?Sized>(&self, value: &T) -> MapperResult<Item> {
        match encode(value, &self.codec)? {
            Some(AttributeValue::M(item)) => Ok(item),
            Some(other) => Err(MapperError::type_mismatch("item map", &other)),
            None => Ok(Item::new()),
        }
    }

    /// Decodes `value` into `T`.
    pub fn from_attribute_value<T: Decode>(&self, value: &AttributeValue) -> MapperResult<T> {
        decode(value, &self.codec)
    }

    /// Decodes a whole item into `T`.
    pub fn from_item<T: Decode>(&self, item: &Item) -> MapperResult<T> {
        decode(&AttributeValue::M(item.clone()), &self.codec)
    }

    // -----------------------------------------------------------------------
    // Table metadata
    // -----------------------------------------------------------------------

    /// Key and index layout of `T`.
    pub fn descriptor<T: Document>(&self) -> MapperResult<Arc<TableDescriptor>> {
        TableDescriptor::resolve::<T>()
    }

    /// Primary key of `doc`.
    pub fn primary_key<T: Document>(&self, doc: &T) -> MapperResult<PrimaryKey<T>> {
        PrimaryKey::from_document(doc, &self.codec)
    }

    /// Parses the text form of a primary key of `T`.
    pub fn parse_key<T: Document>(&self, text: &str) -> MapperResult<PrimaryKey<T>> {
        PrimaryKey::parse(text, &self.codec)
    }

    /// Create-table descriptor for `T` stored in `table_name`.
    pub fn table_definition<T: Document>(&self, table_name: &str) -> MapperResult<TableDefinition> {
        self.descriptor::<T>()?
            .to_table_definition(table_name, self.codec.config())
    }

    /// Global index changes that bring `existing` in line with `T`.
    pub fn table_update<T: Document>(&self, existing: &TableDefinition) -> MapperResult<TableUpdate> {
        self.descriptor::<T>()?
            .to_table_update(existing, self.codec.config())
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// Fresh alias tables for expressions over `T`, for requests that carry
    /// several expressions.
    pub fn expression_context<T: Document>(&self) -> MapperResult<ExpressionContext> {
        ExpressionContext::for_document::<T>(self.codec.clone())
    }

    /// Fresh alias tables for expressions whose member names are used as
    /// written.
    #[must_use]
    pub fn untyped_expression_context(&self) -> ExpressionContext {
        ExpressionContext::new(self.codec.clone())
    }

    /// Compiles a condition or filter over `T`.
    pub fn compile_condition<T: Document>(&self, expr: &Expr) -> MapperResult<CompiledExpression> {
        let mut ctx = self.expression_context::<T>()?;
        let text = ctx.condition(expr)?;
        Ok(ctx.finish(text, None))
    }

    /// Compiles an update over `T`.
    pub fn compile_update<T: Document>(&self, expr: &Expr) -> MapperResult<CompiledExpression> {
        let mut ctx = self.expression_context::<T>()?;
        let text = ctx.update(expr)?;
        Ok(ctx.finish(text, None))
    }

    /// Compiles a key condition over `T`, selecting the index it addresses.
    pub fn compile_key_condition<T: Document>(
        &self,
        expr: &Expr,
    ) -> MapperResult<CompiledExpression> {
        let mut ctx = self.expression_context::<T>()?;
        let (text, index_name) = ctx.key_condition(expr)?;
        Ok(ctx.finish(text, index_name))
    }

    /// Compiles a projection over `T`.
    pub fn compile_projection<T: Document>(
        &self,
        paths: &[Expr],
    ) -> MapperResult<CompiledExpression> {
        let mut ctx = self.expression_context::<T>()?;
        let text = ctx.projection(paths)?;
        Ok(ctx.finish(text, None))
    }
}

#[cfg(test)]
mod tests {
    use dynamap_model::types::{GlobalSecondaryIndexUpdate, ScalarAttributeType};

    use super::*;
    use crate::document::SchemaBuilder;
    use crate::expression::{attr, remove, set};
    use crate::naming::NamingPolicy;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Thread {
        forum: String,
        subject: String,
        views: i64,
        owner: String,
    }

    impl Document for Thread {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("forum", |t| &t.forum, |t| &mut t.forum).partition_key();
            schema.member("subject", |t| &t.subject, |t| &mut t.subject).sort_key();
            schema.member("views", |t| &t.views, |t| &mut t.views);
            schema
                .member("owner", |t| &t.owner, |t| &mut t.owner)
                .global_partition_key(1)
                .index_name("by-owner");
        }
    }

    crate::document_codec!(Thread);

    fn thread() -> Thread {
        Thread {
            forum: "rust".to_owned(),
            subject: "lifetimes".to_owned(),
            views: 3,
            owner: "ferris".to_owned(),
        }
    }

    #[test]
    fn test_should_round_trip_items() {
        let mapper = Mapper::default();
        let item = mapper.to_item(&thread()).unwrap();
        assert_eq!(item.get("views"), Some(&AttributeValue::N("3".to_owned())));
        assert_eq!(mapper.from_item::<Thread>(&item).unwrap(), thread());
        assert!(mapper.to_item(&5_i32).is_err());
    }

    #[test]
    fn test_should_apply_attribute_naming() {
        let options = CodecOptions::builder()
            .attribute_naming(NamingPolicy::PascalCase)
            .build();
        let mapper = Mapper::new(MapperConfig::new(options));
        let item = mapper.to_item(&thread()).unwrap();
        assert!(item.contains_key("Forum"));
        let compiled = mapper.compile_condition::<Thread>(&attr("views").gt(1)).unwrap();
        assert_eq!(compiled.expression, "#p0 > :v0");
        assert_eq!(compiled.attribute_names.get("#p0").map(String::as_str), Some("Views"));
    }

    #[test]
    fn test_should_expose_keys_and_tables() {
        let mapper = Mapper::default();
        let key = mapper.primary_key(&thread()).unwrap();
        assert_eq!(key.to_key_string(), "rust|lifetimes");
        assert_eq!(mapper.parse_key::<Thread>("rust|lifetimes").unwrap(), key);

        let definition = mapper.table_definition::<Thread>("threads").unwrap();
        assert_eq!(definition.table_name, "threads");
        assert_eq!(definition.global_secondary_indexes.len(), 1);
        assert_eq!(definition.global_secondary_indexes[0].index_name, "by-owner");
        assert!(
            definition
                .attribute_definitions
                .iter()
                .all(|d| d.attribute_type == ScalarAttributeType::S)
        );

        let mut existing = definition.clone();
        existing.global_secondary_indexes.clear();
        let update = mapper.table_update::<Thread>(&existing).unwrap();
        assert!(matches!(
            update.global_secondary_index_updates.as_slice(),
            [GlobalSecondaryIndexUpdate::Create(gsi)] if gsi.index_name == "by-owner"
        ));
        assert!(mapper.table_update::<Thread>(&definition).unwrap().is_empty());
    }

    #[test]
    fn test_should_compile_each_expression_kind() {
        let mapper = Mapper::default();
        let update = mapper
            .compile_update::<Thread>(&(set(attr("views"), attr("views") + 1) & remove(attr("owner"))))
            .unwrap();
        assert_eq!(update.expression, "SET #p0 = #p0 + :v0 REMOVE #p1");
        assert_eq!(update.attribute_names.get("#p1").map(String::as_str), Some("owner"));

        let key = mapper
            .compile_key_condition::<Thread>(&attr("owner").eq("ferris"))
            .unwrap();
        assert_eq!(key.expression, "#p0 = :v0");
        assert_eq!(key.index_name.as_deref(), Some("by-owner"));

        let projection = mapper
            .compile_projection::<Thread>(&[attr("forum"), attr("subject")])
            .unwrap();
        assert_eq!(projection.expression, "forum, subject");
        assert!(projection.attribute_values.is_empty());

        assert!(matches!(
            mapper.compile_condition::<Thread>(&attr("missing").eq(1)).unwrap_err(),
            MapperError::UnknownMember { .. }
        ));
    }

    #[test]
    fn test_should_share_alias_tables_within_one_context() {
        let mapper = Mapper::default();
        let mut ctx = mapper.expression_context::<Thread>().unwrap();
        let condition = ctx.condition(&attr("views").ge(10)).unwrap();
        let projection = ctx.projection(&[attr("views")]).unwrap();
        assert_eq!(condition, "#p0 >= :v0");
        assert_eq!(projection, "#p0");
        assert_eq!(ctx.attribute_names().len(), 1);
    }
}
