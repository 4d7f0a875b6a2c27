//! Table descriptor: primary key, version member and secondary index slots
//! resolved from document metadata.
//!
//! Descriptors are resolved once per document type and published into a
//! process-wide cache. Index choice is a deterministic lookup over the
//! declared roles, so the same pair of members always selects the same index.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use dynamap_model::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, GlobalSecondaryIndexUpdate,
    KeySchemaElement, LocalSecondaryIndex, Projection, TableDefinition, TableUpdate,
};
use heck::ToKebabCase;
use std::any::TypeId;
use tracing::debug;

use crate::codec::ValueKind;
use crate::config::{EnumEncoding, MapperConfig};
use crate::document::{Document, IndexKind, KeyPart, MemberInfo, SchemaInfo, schema_of};
use crate::error::{MapperError, MapperResult};

/// Maximum number of local secondary indexes per table.
pub const MAX_LOCAL_INDEXES: usize = 5;

/// Maximum number of global secondary indexes per table.
pub const MAX_GLOBAL_INDEXES: usize = 20;

static DESCRIPTORS: LazyLock<DashMap<TypeId, Arc<TableDescriptor>>> = LazyLock::new(DashMap::new);

/// Key layout of one document type. Slots hold member positions.
#[derive(Debug)]
pub struct TableDescriptor {
    schema: Arc<SchemaInfo>,
    partition_key: usize,
    sort_key: Option<usize>,
    version: Option<usize>,
    local_sort_keys: [Option<usize>; MAX_LOCAL_INDEXES],
    local_names: [Option<String>; MAX_LOCAL_INDEXES],
    global_partition_keys: [Option<usize>; MAX_GLOBAL_INDEXES],
    global_sort_keys: [Option<usize>; MAX_GLOBAL_INDEXES],
    global_names: [Option<String>; MAX_GLOBAL_INDEXES],
}

fn claim(
    slot: &mut Option<usize>,
    member: usize,
    what: &str,
    schema: &SchemaInfo,
) -> MapperResult<()> {
    match *slot {
        Some(existing) if existing != member => Err(MapperError::AmbiguousIndex {
            type_name: schema.type_name.to_owned(),
            message: format!(
                "{what} declared on both '{}' and '{}'",
                schema.members[existing].name(),
                schema.members[member].name()
            ),
        }),
        _ => {
            *slot = Some(member);
            Ok(())
        }
    }
}

fn claim_name(
    slot: &mut Option<String>,
    name: Option<&String>,
    what: &str,
    schema: &SchemaInfo,
) -> MapperResult<()> {
    let Some(name) = name else {
        return Ok(());
    };
    match slot {
        Some(existing) if existing != name => Err(MapperError::AmbiguousIndex {
            type_name: schema.type_name.to_owned(),
            message: format!("{what} named both '{existing}' and '{name}'"),
        }),
        _ => {
            *slot = Some(name.clone());
            Ok(())
        }
    }
}

fn ordinal_slot(ordinal: u8, max: usize, what: &str, schema: &SchemaInfo) -> MapperResult<usize> {
    let ordinal = usize::from(ordinal);
    if (1..=max).contains(&ordinal) {
        Ok(ordinal - 1)
    } else {
        Err(MapperError::InvalidMetadata {
            type_name: schema.type_name.to_owned(),
            message: format!("{what} ordinal {ordinal} is outside 1..={max}"),
        })
    }
}

impl TableDescriptor {
    /// Descriptor of document type `T`.
    pub fn resolve<T: Document>() -> MapperResult<Arc<Self>> {
        let schema = schema_of::<T>()?;
        Self::for_schema(&schema.info())
    }

    /// Descriptor for already-built metadata, cached per document type.
    pub fn for_schema(schema: &Arc<SchemaInfo>) -> MapperResult<Arc<Self>> {
        if let Some(cached) = DESCRIPTORS.get(&schema.type_id) {
            return Ok(Arc::clone(cached.value()));
        }
        let candidate = Arc::new(Self::build(Arc::clone(schema))?);
        let published = Arc::clone(DESCRIPTORS.entry(schema.type_id).or_insert(candidate).value());
        debug!(
            type_name = schema.type_name,
            partition = published.partition_key().name(),
            sort = published.sort_key().map(MemberInfo::name),
            "published table descriptor"
        );
        Ok(published)
    }

    fn build(schema: Arc<SchemaInfo>) -> MapperResult<Self> {
        let mut partition_key = None;
        let mut sort_key = None;
        let mut version = None;
        let mut local_sort_keys = [None; MAX_LOCAL_INDEXES];
        let mut local_names: [Option<String>; MAX_LOCAL_INDEXES] = std::array::from_fn(|_| None);
        let mut global_partition_keys = [None; MAX_GLOBAL_INDEXES];
        let mut global_sort_keys = [None; MAX_GLOBAL_INDEXES];
        let mut global_names: [Option<String>; MAX_GLOBAL_INDEXES] = std::array::from_fn(|_| None);

        for (idx, member) in schema.members.iter().enumerate() {
            if member.version {
                claim(&mut version, idx, "version", &schema)?;
            }
            if !member.roles.is_empty()
                && member
                    .attribute
                    .value_type
                    .kind
                    .scalar_type(EnumEncoding::Name)
                    .is_none()
            {
                return Err(MapperError::InvalidMetadata {
                    type_name: schema.type_name.to_owned(),
                    message: format!(
                        "key member '{}' must be a string, number or binary",
                        member.name()
                    ),
                });
            }
            for role in &member.roles {
                match (role.kind, role.part) {
                    (IndexKind::Primary, KeyPart::Partition) => {
                        claim(&mut partition_key, idx, "partition key", &schema)?;
                    }
                    (IndexKind::Primary, KeyPart::Sort) => {
                        claim(&mut sort_key, idx, "sort key", &schema)?;
                    }
                    (IndexKind::Local, KeyPart::Sort) => {
                        let slot = ordinal_slot(role.ordinal, MAX_LOCAL_INDEXES, "local index", &schema)?;
                        let what = format!("local index {}", role.ordinal);
                        claim(&mut local_sort_keys[slot], idx, &what, &schema)?;
                        claim_name(&mut local_names[slot], role.index_name.as_ref(), &what, &schema)?;
                    }
                    (IndexKind::Local, KeyPart::Partition) => {
                        return Err(MapperError::InvalidMetadata {
                            type_name: schema.type_name.to_owned(),
                            message: format!(
                                "'{}' declares a local index partition key; local indexes share the table partition key",
                                member.name()
                            ),
                        });
                    }
                    (IndexKind::Global, part) => {
                        let slot = ordinal_slot(role.ordinal, MAX_GLOBAL_INDEXES, "global index", &schema)?;
                        let what = format!("global index {}", role.ordinal);
                        let keys = match part {
                            KeyPart::Partition => &mut global_partition_keys,
                            KeyPart::Sort => &mut global_sort_keys,
                        };
                        let half = match part {
                            KeyPart::Partition => "partition key",
                            KeyPart::Sort => "sort key",
                        };
                        claim(&mut keys[slot], idx, &format!("{what} {half}"), &schema)?;
                        claim_name(&mut global_names[slot], role.index_name.as_ref(), &what, &schema)?;
                    }
                }
            }
        }

        let Some(partition_key) = partition_key else {
            return Err(MapperError::InvalidMetadata {
                type_name: schema.type_name.to_owned(),
                message: "no partition key declared".to_owned(),
            });
        };
        if sort_key.is_none() && local_sort_keys.iter().any(Option::is_some) {
            return Err(MapperError::InvalidMetadata {
                type_name: schema.type_name.to_owned(),
                message: "local indexes require a table sort key".to_owned(),
            });
        }

        Ok(Self {
            schema,
            partition_key,
            sort_key,
            version,
            local_sort_keys,
            local_names,
            global_partition_keys,
            global_sort_keys,
            global_names,
        })
    }

    /// Member metadata of the document type.
    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaInfo> {
        &self.schema
    }

    /// Position of the partition key member.
    #[must_use]
    pub fn partition_key_index(&self) -> usize {
        self.partition_key
    }

    /// Position of the sort key member.
    #[must_use]
    pub fn sort_key_index(&self) -> Option<usize> {
        self.sort_key
    }

    /// Partition key member.
    #[must_use]
    pub fn partition_key(&self) -> &MemberInfo {
        &self.schema.members[self.partition_key]
    }

    /// Sort key member.
    #[must_use]
    pub fn sort_key(&self) -> Option<&MemberInfo> {
        self.sort_key.map(|i| &self.schema.members[i])
    }

    /// Version member.
    #[must_use]
    pub fn version(&self) -> Option<&MemberInfo> {
        self.version.map(|i| &self.schema.members[i])
    }

    /// Sort key member of local index `ordinal`.
    #[must_use]
    pub fn local_index(&self, ordinal: u8) -> Option<&MemberInfo> {
        let slot = usize::from(ordinal).checked_sub(1)?;
        self.local_sort_keys
            .get(slot)
            .copied()
            .flatten()
            .map(|i| &self.schema.members[i])
    }

    /// Partition and sort members of global index `ordinal`. The partition
    /// falls back to the table partition key for a sort-only declaration.
    #[must_use]
    pub fn global_index(&self, ordinal: u8) -> Option<(&MemberInfo, Option<&MemberInfo>)> {
        let slot = usize::from(ordinal).checked_sub(1)?;
        let partition = self.effective_global_partition(slot)?;
        let sort = self.global_sort_keys.get(slot).copied().flatten();
        Some((
            &self.schema.members[partition],
            sort.map(|i| &self.schema.members[i]),
        ))
    }

    fn effective_global_partition(&self, slot: usize) -> Option<usize> {
        let partition = self.global_partition_keys.get(slot).copied().flatten();
        let sort = self.global_sort_keys.get(slot).copied().flatten();
        partition.or_else(|| sort.map(|_| self.partition_key))
    }

    /// Name of local index `ordinal`: explicit, else `lsi-{ordinal}-{sort}`.
    #[must_use]
    pub fn local_index_name(&self, ordinal: u8) -> Option<String> {
        let sort = self.local_index(ordinal)?;
        let slot = usize::from(ordinal) - 1;
        Some(self.local_names[slot].clone().unwrap_or_else(|| {
            format!("lsi-{ordinal}-{}", sort.name().to_kebab_case())
        }))
    }

    /// Name of global index `ordinal`: explicit, else
    /// `gsi-{ordinal}-{partition}[-{sort}]`.
    #[must_use]
    pub fn global_index_name(&self, ordinal: u8) -> Option<String> {
        let (partition, sort) = self.global_index(ordinal)?;
        let slot = usize::from(ordinal) - 1;
        Some(self.global_names[slot].clone().unwrap_or_else(|| {
            let mut name = format!("gsi-{ordinal}-{}", partition.name().to_kebab_case());
            if let Some(sort) = sort {
                name.push('-');
                name.push_str(&sort.name().to_kebab_case());
            }
            name
        }))
    }

    fn local_ordinals(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=MAX_LOCAL_INDEXES as u8).filter(|o| self.local_index(*o).is_some())
    }

    fn global_ordinals(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=MAX_GLOBAL_INDEXES as u8).filter(|o| self.global_index(*o).is_some())
    }

    /// Keys a member can partition, ordered by (kind, ordinal).
    fn partition_roles(&self, member: usize) -> Vec<(IndexKind, u8)> {
        let mut roles = Vec::new();
        if member == self.partition_key {
            roles.push((IndexKind::Primary, 0));
            roles.extend(self.local_ordinals().map(|o| (IndexKind::Local, o)));
        }
        for ordinal in self.global_ordinals() {
            if self.effective_global_partition(usize::from(ordinal) - 1) == Some(member) {
                roles.push((IndexKind::Global, ordinal));
            }
        }
        roles
    }

    /// Keys a member sorts.
    fn sort_roles(&self, member: usize) -> Vec<(IndexKind, u8)> {
        let mut roles = Vec::new();
        if self.sort_key == Some(member) {
            roles.push((IndexKind::Primary, 0));
        }
        for (slot, sort) in self.local_sort_keys.iter().enumerate() {
            if *sort == Some(member) {
                roles.push((IndexKind::Local, slot_ordinal(slot)));
            }
        }
        for (slot, sort) in self.global_sort_keys.iter().enumerate() {
            if *sort == Some(member) {
                roles.push((IndexKind::Global, slot_ordinal(slot)));
            }
        }
        roles
    }

    fn index_name(&self, kind: IndexKind, ordinal: u8) -> Option<String> {
        match kind {
            IndexKind::Primary => None,
            IndexKind::Local => self.local_index_name(ordinal),
            IndexKind::Global => self.global_index_name(ordinal),
        }
    }

    fn member_position(&self, name: &str) -> MapperResult<usize> {
        self.schema
            .member(name)
            .map(|(i, _)| i)
            .ok_or_else(|| MapperError::UnknownMember {
                type_name: self.schema.type_name.to_owned(),
                member: name.to_owned(),
            })
    }

    fn matching_key(&self, partition: usize, sort: usize) -> Option<(IndexKind, u8)> {
        let sort_roles = self.sort_roles(sort);
        self.partition_roles(partition)
            .into_iter()
            .find(|role| sort_roles.contains(role))
    }

    /// Index addressed by a query over `partition` (and `sort`) members.
    ///
    /// `None` means the base table. The members may be given in either
    /// order.
    pub fn resolve_index_name(
        &self,
        partition: &str,
        sort: Option<&str>,
    ) -> MapperResult<Option<String>> {
        let p = self.member_position(partition)?;
        let selected = match sort {
            None => self.partition_roles(p).first().copied(),
            Some(sort_name) => {
                let s = self.member_position(sort_name)?;
                self.matching_key(p, s).or_else(|| self.matching_key(s, p))
            }
        };
        let Some((kind, ordinal)) = selected else {
            return Err(MapperError::KeyIndexMismatch {
                partition: partition.to_owned(),
                sort: sort.unwrap_or("<none>").to_owned(),
            });
        };
        let name = self.index_name(kind, ordinal);
        debug!(
            type_name = self.schema.type_name,
            partition,
            sort,
            index = name.as_deref(),
            "resolved index"
        );
        Ok(name)
    }

    fn attribute_name(&self, member: &MemberInfo, config: &MapperConfig) -> String {
        member.attribute.resolved_name(&config.options)
    }

    fn key_schema(
        &self,
        partition: &MemberInfo,
        sort: Option<&MemberInfo>,
        config: &MapperConfig,
    ) -> Vec<KeySchemaElement> {
        let mut key_schema = vec![KeySchemaElement::hash(self.attribute_name(partition, config))];
        if let Some(sort) = sort {
            key_schema.push(KeySchemaElement::range(self.attribute_name(sort, config)));
        }
        key_schema
    }

    fn global_indexes(&self, config: &MapperConfig) -> Vec<GlobalSecondaryIndex> {
        self.global_ordinals()
            .filter_map(|ordinal| {
                let (partition, sort) = self.global_index(ordinal)?;
                Some(GlobalSecondaryIndex {
                    index_name: self.global_index_name(ordinal)?,
                    key_schema: self.key_schema(partition, sort, config),
                    projection: Projection::all(),
                })
            })
            .collect()
    }

    fn key_members(&self) -> Vec<&MemberInfo> {
        let mut members = vec![self.partition_key()];
        members.extend(self.sort_key());
        members.extend(self.local_ordinals().filter_map(|o| self.local_index(o)));
        for ordinal in self.global_ordinals() {
            if let Some((partition, sort)) = self.global_index(ordinal) {
                members.push(partition);
                members.extend(sort);
            }
        }
        members
    }

    fn attribute_definitions<'m>(
        &self,
        members: impl Iterator<Item = &'m MemberInfo>,
        config: &MapperConfig,
    ) -> MapperResult<Vec<AttributeDefinition>> {
        let mut seen = HashSet::new();
        let mut definitions = Vec::new();
        for member in members {
            let name = self.attribute_name(member, config);
            if !seen.insert(name.clone()) {
                continue;
            }
            let kind: ValueKind = member.attribute.value_type.kind;
            let attribute_type = kind
                .scalar_type(config.options.enum_encoding)
                .ok_or_else(|| MapperError::InvalidMetadata {
                    type_name: self.schema.type_name.to_owned(),
                    message: format!("key member '{}' has no scalar key type", member.name()),
                })?;
            definitions.push(AttributeDefinition {
                attribute_name: name,
                attribute_type,
            });
        }
        Ok(definitions)
    }

    /// Create-table descriptor for this document type.
    pub fn to_table_definition(
        &self,
        table_name: &str,
        config: &MapperConfig,
    ) -> MapperResult<TableDefinition> {
        let local_secondary_indexes = self
            .local_ordinals()
            .filter_map(|ordinal| {
                let sort = self.local_index(ordinal)?;
                Some(LocalSecondaryIndex {
                    index_name: self.local_index_name(ordinal)?,
                    key_schema: self.key_schema(self.partition_key(), Some(sort), config),
                    projection: Projection::all(),
                })
            })
            .collect();
        Ok(TableDefinition {
            table_name: table_name.to_owned(),
            key_schema: self.key_schema(self.partition_key(), self.sort_key(), config),
            attribute_definitions: self.attribute_definitions(self.key_members().into_iter(), config)?,
            local_secondary_indexes,
            global_secondary_indexes: self.global_indexes(config),
            billing_mode: BillingMode::PayPerRequest,
        })
    }

    /// Global index changes that bring `existing` in line with this
    /// descriptor. Local indexes are fixed at creation and are not diffed.
    pub fn to_table_update(
        &self,
        existing: &TableDefinition,
        config: &MapperConfig,
    ) -> MapperResult<TableUpdate> {
        let desired = self.global_indexes(config);
        let mut updates = Vec::new();
        let mut created = Vec::new();

        for current in &existing.global_secondary_indexes {
            let keep = desired
                .iter()
                .any(|d| d.index_name == current.index_name && d.key_schema == current.key_schema);
            if !keep {
                updates.push(GlobalSecondaryIndexUpdate::Delete {
                    index_name: current.index_name.clone(),
                });
            }
        }
        for index in desired {
            let exists = existing
                .global_secondary_indexes
                .iter()
                .any(|c| c.index_name == index.index_name && c.key_schema == index.key_schema);
            if !exists {
                created.push(index);
            }
        }

        let mut needed = Vec::new();
        for index in &created {
            for element in &index.key_schema {
                if let Some((_, member)) = self.schema.lookup(&element.attribute_name, &config.options) {
                    needed.push(member);
                }
            }
        }
        let attribute_definitions = self.attribute_definitions(needed.into_iter(), config)?;
        updates.extend(created.into_iter().map(GlobalSecondaryIndexUpdate::Create));

        Ok(TableUpdate {
            table_name: existing.table_name.clone(),
            attribute_definitions,
            global_secondary_index_updates: updates,
        })
    }
}

fn slot_ordinal(slot: usize) -> u8 {
    u8::try_from(slot + 1).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use dynamap_model::types::{KeyType, ScalarAttributeType};

    use super::*;
    use crate::document::SchemaBuilder;

    #[derive(Debug, Default)]
    struct Order {
        customer: String,
        placed_at: String,
        total: i64,
        region: String,
        status: String,
        revision: u32,
    }

    impl Document for Order {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .member("customer", |o| &o.customer, |o| &mut o.customer)
                .partition_key();
            schema
                .member("placed_at", |o| &o.placed_at, |o| &mut o.placed_at)
                .sort_key();
            schema
                .member("total", |o| &o.total, |o| &mut o.total)
                .local_index(1)
                .rename("Total");
            schema
                .member("region", |o| &o.region, |o| &mut o.region)
                .global_partition_key(1);
            schema
                .member("status", |o| &o.status, |o| &mut o.status)
                .global_sort_key(1)
                .global_sort_key(2)
                .index_name("by-status");
            schema
                .member("revision", |o| &o.revision, |o| &mut o.revision)
                .version();
        }
    }

    #[test]
    fn test_should_resolve_keys_and_indexes() {
        let d = TableDescriptor::resolve::<Order>().unwrap();
        assert_eq!(d.partition_key().name(), "customer");
        assert_eq!(d.sort_key().map(MemberInfo::name), Some("placed_at"));
        assert_eq!(d.version().map(MemberInfo::name), Some("revision"));
        assert_eq!(d.local_index_name(1).as_deref(), Some("lsi-1-total"));
        assert_eq!(
            d.global_index_name(1).as_deref(),
            Some("gsi-1-region-status")
        );
        let (partition, sort) = d.global_index(2).unwrap();
        assert_eq!(partition.name(), "customer");
        assert_eq!(sort.map(MemberInfo::name), Some("status"));
        assert_eq!(d.global_index_name(2).as_deref(), Some("by-status"));
    }

    #[test]
    fn test_should_select_index_for_member_pairs() {
        let d = TableDescriptor::resolve::<Order>().unwrap();
        assert_eq!(d.resolve_index_name("customer", Some("placed_at")).unwrap(), None);
        assert_eq!(d.resolve_index_name("customer", None).unwrap(), None);
        assert_eq!(
            d.resolve_index_name("customer", Some("total")).unwrap().as_deref(),
            Some("lsi-1-total")
        );
        assert_eq!(
            d.resolve_index_name("total", Some("customer")).unwrap().as_deref(),
            Some("lsi-1-total")
        );
        assert_eq!(
            d.resolve_index_name("region", Some("status")).unwrap().as_deref(),
            Some("gsi-1-region-status")
        );
        assert_eq!(
            d.resolve_index_name("region", None).unwrap().as_deref(),
            Some("gsi-1-region-status")
        );
        assert_eq!(
            d.resolve_index_name("customer", Some("status")).unwrap().as_deref(),
            Some("by-status")
        );
        assert!(matches!(
            d.resolve_index_name("region", Some("total")).unwrap_err(),
            MapperError::KeyIndexMismatch { .. }
        ));
        assert!(matches!(
            d.resolve_index_name("nope", None).unwrap_err(),
            MapperError::UnknownMember { .. }
        ));
    }

    #[test]
    fn test_should_build_table_definition() {
        let d = TableDescriptor::resolve::<Order>().unwrap();
        let def = d.to_table_definition("orders", &MapperConfig::default()).unwrap();
        assert_eq!(def.key_schema[0].attribute_name, "customer");
        assert_eq!(def.key_schema[1].key_type, KeyType::Range);
        let names: Vec<&str> = def
            .attribute_definitions
            .iter()
            .map(|a| a.attribute_name.as_str())
            .collect();
        assert_eq!(names, vec!["customer", "placed_at", "Total", "region", "status"]);
        let total = &def.attribute_definitions[2];
        assert_eq!(total.attribute_type, ScalarAttributeType::N);
        assert_eq!(def.local_secondary_indexes.len(), 1);
        assert_eq!(def.global_secondary_indexes.len(), 2);
        assert_eq!(def.billing_mode, BillingMode::PayPerRequest);
    }

    #[test]
    fn test_should_diff_global_indexes() {
        let d = TableDescriptor::resolve::<Order>().unwrap();
        let config = MapperConfig::default();
        let mut existing = d.to_table_definition("orders", &config).unwrap();
        assert!(d.to_table_update(&existing, &config).unwrap().is_empty());

        existing.global_secondary_indexes.retain(|g| g.index_name == "by-status");
        existing.global_secondary_indexes.push(GlobalSecondaryIndex {
            index_name: "legacy".to_owned(),
            key_schema: vec![KeySchemaElement::hash("region")],
            projection: Projection::all(),
        });
        existing.global_secondary_indexes[0].key_schema = vec![KeySchemaElement::hash("customer")];

        let update = d.to_table_update(&existing, &config).unwrap();
        let summary: Vec<String> = update
            .global_secondary_index_updates
            .iter()
            .map(|u| match u {
                GlobalSecondaryIndexUpdate::Create(g) => format!("+{}", g.index_name),
                GlobalSecondaryIndexUpdate::Delete { index_name } => format!("-{index_name}"),
            })
            .collect();
        assert_eq!(
            summary,
            vec!["-by-status", "-legacy", "+gsi-1-region-status", "+by-status"]
        );
        assert!(update
            .attribute_definitions
            .iter()
            .any(|a| a.attribute_name == "region"));
    }

    #[derive(Debug, Default)]
    struct TwoPartitions {
        a: String,
        b: String,
    }

    impl Document for TwoPartitions {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("a", |t| &t.a, |t| &mut t.a).partition_key();
            schema.member("b", |t| &t.b, |t| &mut t.b).partition_key();
        }
    }

    #[derive(Debug, Default)]
    struct NoKey {
        a: String,
    }

    impl Document for NoKey {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("a", |t| &t.a, |t| &mut t.a);
        }
    }

    #[derive(Debug, Default)]
    struct BadOrdinal {
        a: String,
        b: String,
    }

    impl Document for BadOrdinal {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("a", |t| &t.a, |t| &mut t.a).partition_key();
            schema.member("b", |t| &t.b, |t| &mut t.b).global_partition_key(21);
        }
    }

    #[test]
    fn test_should_reject_inconsistent_metadata() {
        assert!(matches!(
            TableDescriptor::resolve::<TwoPartitions>().unwrap_err(),
            MapperError::AmbiguousIndex { .. }
        ));
        assert!(matches!(
            TableDescriptor::resolve::<NoKey>().unwrap_err(),
            MapperError::InvalidMetadata { .. }
        ));
        assert!(matches!(
            TableDescriptor::resolve::<BadOrdinal>().unwrap_err(),
            MapperError::InvalidMetadata { .. }
        ));
    }

    #[test]
    fn test_should_publish_one_descriptor_per_type() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| TableDescriptor::resolve::<Order>().unwrap()))
            .collect();
        let all: Vec<Arc<TableDescriptor>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(all.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
