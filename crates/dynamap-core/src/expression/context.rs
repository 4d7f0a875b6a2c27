//! Per-compilation alias tables.
//!
//! One [`ExpressionContext`] can compile several expressions of one request
//! (condition, filter, key condition, projection) so they share a single
//! name table and a single value table.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dynamap_model::AttributeValue;
use tracing::debug;

use super::ast::{Expr, RawExpression};
use super::compiler::ExpressionCompiler;
use crate::codec::{CodecContext, WriteFlags, encode_with};
use crate::document::{Document, SchemaInfo, schema_of};
use crate::error::{MapperError, MapperResult};

/// Compiled expression text with the aliases it (and any expression compiled
/// before it in the same context) uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledExpression {
    /// Expression text.
    pub expression: String,
    /// Index selected by a key condition; `None` for the base table.
    pub index_name: Option<String>,
    /// `#alias` to attribute name.
    pub attribute_names: BTreeMap<String, String>,
    /// `:alias` to value.
    pub attribute_values: BTreeMap<String, AttributeValue>,
}

/// Alias tables plus the codec and item metadata used to fill them.
#[derive(Debug)]
pub struct ExpressionContext {
    codec: CodecContext,
    schema: Option<Arc<SchemaInfo>>,
    names: BTreeMap<String, String>,
    name_aliases: HashMap<String, String>,
    values: BTreeMap<String, AttributeValue>,
    value_aliases: HashMap<AttributeValue, String>,
    next_name: usize,
    next_value: usize,
}

impl ExpressionContext {
    /// Context for untyped expressions: member names are used as written.
    #[must_use]
    pub fn new(codec: CodecContext) -> Self {
        Self {
            codec,
            schema: None,
            names: BTreeMap::new(),
            name_aliases: HashMap::new(),
            values: BTreeMap::new(),
            value_aliases: HashMap::new(),
            next_name: 0,
            next_value: 0,
        }
    }

    /// Context for expressions over `T`: members are resolved against its
    /// declared metadata.
    pub fn for_document<T: Document>(codec: CodecContext) -> MapperResult<Self> {
        let schema = schema_of::<T>()?.info();
        Ok(Self::for_schema(codec, schema))
    }

    /// Context over already-built metadata.
    #[must_use]
    pub fn for_schema(codec: CodecContext, schema: Arc<SchemaInfo>) -> Self {
        Self {
            schema: Some(schema),
            ..Self::new(codec)
        }
    }

    /// Codec used for constants.
    #[must_use]
    pub fn codec(&self) -> &CodecContext {
        &self.codec
    }

    /// Item metadata, when typed.
    #[must_use]
    pub fn schema(&self) -> Option<&Arc<SchemaInfo>> {
        self.schema.as_ref()
    }

    /// `#alias` to attribute name, so far.
    #[must_use]
    pub fn attribute_names(&self) -> &BTreeMap<String, String> {
        &self.names
    }

    /// `:alias` to value, so far.
    #[must_use]
    pub fn attribute_values(&self) -> &BTreeMap<String, AttributeValue> {
        &self.values
    }

    /// Alias for attribute `name`, reused for repeated names.
    pub fn name_alias(&mut self, name: &str) -> String {
        if let Some(alias) = self.name_aliases.get(name) {
            return alias.clone();
        }
        let alias = loop {
            let candidate = format!("#p{}", self.next_name);
            self.next_name += 1;
            if !self.names.contains_key(&candidate) {
                break candidate;
            }
        };
        self.names.insert(alias.clone(), name.to_owned());
        self.name_aliases.insert(name.to_owned(), alias.clone());
        alias
    }

    /// Alias for `value`, reused for equal values.
    pub fn value_alias(&mut self, value: AttributeValue) -> String {
        if let Some(alias) = self.value_aliases.get(&value) {
            return alias.clone();
        }
        let alias = loop {
            let candidate = format!(":v{}", self.next_value);
            self.next_value += 1;
            if !self.values.contains_key(&candidate) {
                break candidate;
            }
        };
        self.values.insert(alias.clone(), value.clone());
        self.value_aliases.insert(value, alias.clone());
        alias
    }

    /// Adds the bindings of a raw expression. An alias already bound to a
    /// different name or value is a conflict.
    pub fn merge_raw(&mut self, raw: &RawExpression) -> MapperResult<()> {
        for (alias, name) in &raw.names {
            match self.names.get(alias) {
                Some(existing) if existing != name => {
                    return Err(MapperError::AliasConflict {
                        alias: alias.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    self.names.insert(alias.clone(), name.clone());
                    self.name_aliases
                        .entry(name.clone())
                        .or_insert_with(|| alias.clone());
                }
            }
        }
        for (alias, value) in &raw.values {
            let encoded = encode_with(value, &self.codec, WriteFlags::persist_all())?
                .unwrap_or_else(AttributeValue::null);
            match self.values.get(alias) {
                Some(existing) if *existing != encoded => {
                    return Err(MapperError::AliasConflict {
                        alias: alias.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    self.values.insert(alias.clone(), encoded.clone());
                    self.value_aliases
                        .entry(encoded)
                        .or_insert_with(|| alias.clone());
                }
            }
        }
        Ok(())
    }

    fn log(&self, kind: &'static str, text: &str) {
        debug!(
            kind,
            expression = text,
            names = self.names.len(),
            values = self.values.len(),
            "compiled expression"
        );
    }

    /// Compiles a condition or filter.
    pub fn condition(&mut self, expr: &Expr) -> MapperResult<String> {
        let text = ExpressionCompiler::new(self).condition(expr)?;
        self.log("condition", &text);
        Ok(text)
    }

    /// Compiles an update built from `set`/`remove`/`add`/`delete` actions.
    pub fn update(&mut self, expr: &Expr) -> MapperResult<String> {
        let text = ExpressionCompiler::new(self).update(expr)?;
        self.log("update", &text);
        Ok(text)
    }

    /// Compiles a key condition and selects the index it addresses.
    pub fn key_condition(&mut self, expr: &Expr) -> MapperResult<(String, Option<String>)> {
        let (text, index_name) = ExpressionCompiler::new(self).key_condition(expr)?;
        self.log("key_condition", &text);
        Ok((text, index_name))
    }

    /// Compiles a projection of member paths.
    pub fn projection(&mut self, paths: &[Expr]) -> MapperResult<String> {
        let text = ExpressionCompiler::new(self).projection(paths)?;
        self.log("projection", &text);
        Ok(text)
    }

    /// Packages `expression` with the alias tables accumulated so far.
    #[must_use]
    pub fn finish(self, expression: String, index_name: Option<String>) -> CompiledExpression {
        CompiledExpression {
            expression,
            index_name,
            attribute_names: self.names,
            attribute_values: self.values,
        }
    }
}
