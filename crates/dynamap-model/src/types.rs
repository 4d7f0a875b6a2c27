//! Table-management descriptor types.
//!
//! These follow the store's JSON wire format with `PascalCase` field names so a
//! network client can send them verbatim in create-table / update-table
//! requests. Enum variants use idiomatic Rust names with `#[serde(rename)]`
//! attributes to map to the `SCREAMING_SNAKE_CASE` wire form.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Key type within a key schema element.
///
/// `Hash` denotes the partition key; `Range` denotes the sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Partition key.
    #[serde(rename = "HASH")]
    Hash,
    /// Sort key.
    #[serde(rename = "RANGE")]
    Range,
}

impl KeyType {
    /// Returns the wire-format string representation of this key type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hash => "HASH",
            Self::Range => "RANGE",
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar attribute types allowed for key attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarAttributeType {
    /// String type.
    S,
    /// Number type.
    N,
    /// Binary type.
    B,
}

impl ScalarAttributeType {
    /// Returns the wire-format string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::N => "N",
            Self::B => "B",
        }
    }
}

impl std::fmt::Display for ScalarAttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing mode of a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillingMode {
    /// Provisioned capacity mode.
    #[serde(rename = "PROVISIONED")]
    Provisioned,
    /// On-demand capacity mode.
    #[default]
    #[serde(rename = "PAY_PER_REQUEST")]
    PayPerRequest,
}

/// Which attributes are copied into a secondary index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectionType {
    /// All attributes are projected.
    #[default]
    #[serde(rename = "ALL")]
    All,
    /// Only key attributes are projected.
    #[serde(rename = "KEYS_ONLY")]
    KeysOnly,
    /// Key attributes plus the listed non-key attributes.
    #[serde(rename = "INCLUDE")]
    Include,
}

// ---------------------------------------------------------------------------
// Key schema
// ---------------------------------------------------------------------------

/// An element of the key schema for a table or index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    /// The name of the key attribute.
    pub attribute_name: String,
    /// The role of the attribute in the key schema (`HASH` or `RANGE`).
    pub key_type: KeyType,
}

impl KeySchemaElement {
    /// Partition-key element for `attribute_name`.
    #[must_use]
    pub fn hash(attribute_name: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            key_type: KeyType::Hash,
        }
    }

    /// Sort-key element for `attribute_name`.
    #[must_use]
    pub fn range(attribute_name: impl Into<String>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            key_type: KeyType::Range,
        }
    }
}

/// An attribute definition specifying the attribute name and its scalar type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    /// The name of the attribute.
    pub attribute_name: String,
    /// The scalar data type of the attribute (`S`, `N`, or `B`).
    pub attribute_type: ScalarAttributeType,
}

// ---------------------------------------------------------------------------
// Indexes
// ---------------------------------------------------------------------------

/// Projection settings for a secondary index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Projection {
    /// The set of attributes projected into the index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_type: Option<ProjectionType>,
    /// The non-key attributes to project when `projection_type` is `INCLUDE`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_key_attributes: Vec<String>,
}

impl Projection {
    /// Projection of every attribute.
    #[must_use]
    pub fn all() -> Self {
        Self {
            projection_type: Some(ProjectionType::All),
            non_key_attributes: Vec::new(),
        }
    }
}

/// Local secondary index definition.
///
/// An LSI shares the partition key with the base table but uses a different sort key.
/// LSIs must be defined at table creation time and cannot be modified afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalSecondaryIndex {
    /// The name of the local secondary index.
    pub index_name: String,
    /// The key schema for this index.
    pub key_schema: Vec<KeySchemaElement>,
    /// The attributes projected into this index.
    pub projection: Projection,
}

/// Global secondary index definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GlobalSecondaryIndex {
    /// The name of the global secondary index.
    pub index_name: String,
    /// The key schema for this index (partition key, optional sort key).
    pub key_schema: Vec<KeySchemaElement>,
    /// The attributes projected into this index.
    pub projection: Projection,
}

// ---------------------------------------------------------------------------
// Table create / update descriptors
// ---------------------------------------------------------------------------

/// Everything a create-table request needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDefinition {
    /// Table name.
    pub table_name: String,
    /// Primary key schema.
    pub key_schema: Vec<KeySchemaElement>,
    /// Definitions of every attribute used by a table or index key.
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Local secondary indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_secondary_indexes: Vec<LocalSecondaryIndex>,
    /// Global secondary indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
    /// Billing mode.
    pub billing_mode: BillingMode,
}

/// A single change to the set of global secondary indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum GlobalSecondaryIndexUpdate {
    /// Create a new index.
    Create(GlobalSecondaryIndex),
    /// Delete an existing index.
    Delete {
        /// Name of the index to delete.
        #[serde(rename = "IndexName")]
        index_name: String,
    },
}

/// Everything an update-table request needs to converge indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableUpdate {
    /// Table name.
    pub table_name: String,
    /// Attribute definitions required by the created indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_definitions: Vec<AttributeDefinition>,
    /// Index creations and deletions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_secondary_index_updates: Vec<GlobalSecondaryIndexUpdate>,
}

impl TableUpdate {
    /// Returns `true` when applying the update would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global_secondary_index_updates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_serialize_key_schema_in_wire_case() {
        let json = serde_json::to_string(&KeySchemaElement::hash("pk")).unwrap();
        assert_eq!(json, r#"{"AttributeName":"pk","KeyType":"HASH"}"#);
    }

    #[test]
    fn test_should_serialize_billing_mode() {
        let json = serde_json::to_string(&BillingMode::PayPerRequest).unwrap();
        assert_eq!(json, r#""PAY_PER_REQUEST""#);
    }

    #[test]
    fn test_should_serialize_index_update_actions() {
        let update = GlobalSecondaryIndexUpdate::Delete {
            index_name: "gsi-1-email".to_owned(),
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"Delete":{"IndexName":"gsi-1-email"}}"#);
    }

    #[test]
    fn test_should_skip_empty_index_lists() {
        let def = TableDefinition {
            table_name: "t".to_owned(),
            key_schema: vec![KeySchemaElement::hash("pk")],
            attribute_definitions: vec![AttributeDefinition {
                attribute_name: "pk".to_owned(),
                attribute_type: ScalarAttributeType::S,
            }],
            local_secondary_indexes: Vec::new(),
            global_secondary_indexes: Vec::new(),
            billing_mode: BillingMode::PayPerRequest,
        };
        let json = serde_json::to_string(&def).unwrap();
        assert!(!json.contains("LocalSecondaryIndexes"));
        assert!(json.contains(r#""AttributeType":"S""#));
    }
}
