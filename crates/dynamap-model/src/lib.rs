//! Wire data model for the dynamap document mapper.
//!
//! This crate holds the store's typed value tree ([`AttributeValue`]) and the
//! key-schema and index descriptor types used by table-management requests.
//! Everything here is plain data with serde derives; the mapping logic lives
//! in `dynamap-core`.
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod types;

use std::collections::BTreeMap;

pub use attribute_value::AttributeValue;

/// A whole item: top-level attribute name to value.
pub type Item = BTreeMap<String, AttributeValue>;
