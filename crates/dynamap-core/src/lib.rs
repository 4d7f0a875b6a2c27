//! Object mapping for a typed document store.
//!
//! This crate maps Rust types to the store's attribute-value tree and back,
//! derives table and index layouts from declared member metadata, and
//! compiles typed predicates and update actions into the store's expression
//! language.
//!
//! # Overview
//!
//! - **Codec**: [`codec`] writes values through a compacting tree builder and
//!   reads them back through a converter chain.
//! - **Documents**: [`document`] declares members, keys and indexes per type.
//! - **Tables**: [`table`] resolves key layouts and index names.
//! - **Expressions**: [`expression`] folds and compiles expression trees.
//! - **Facade**: [`Mapper`] ties one configuration to all of the above.
//!
//! # Usage
//!
//! ```rust
//! use dynamap_core::document::{Document, SchemaBuilder};
//! use dynamap_core::expression::attr;
//! use dynamap_core::{Mapper, document_codec};
//!
//! #[derive(Debug, Default)]
//! struct User {
//!     id: String,
//!     age: u32,
//! }
//!
//! impl Document for User {
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema.member("id", |u| &u.id, |u| &mut u.id).partition_key();
//!         schema.member("age", |u| &u.age, |u| &mut u.age);
//!     }
//! }
//!
//! document_codec!(User);
//!
//! let mapper = Mapper::default();
//! let compiled = mapper
//!     .compile_condition::<User>(&(attr("age").ge(18) & attr("age").lt(65)))
//!     .unwrap();
//! assert_eq!(compiled.expression, "age >= :v0 AND age < :v1");
//! ```

pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod expression;
pub mod key;
pub mod mapper;
pub mod naming;
pub mod table;
pub mod value;

pub use codec::{CodecContext, Decode, Encode, EnumType, TypeConverter};
pub use config::{CodecOptions, EnumEncoding, MapperConfig};
pub use document::{Document, SchemaBuilder};
pub use dynamap_model::{AttributeValue, Item};
pub use error::{MapperError, MapperResult};
pub use expression::{CompiledExpression, Expr, ExpressionContext};
pub use key::{KeyValue, PrimaryKey};
pub use mapper::Mapper;
pub use naming::NamingPolicy;
pub use table::TableDescriptor;
pub use value::Value;
