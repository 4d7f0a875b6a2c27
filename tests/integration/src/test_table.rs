//! Table descriptor and index resolution scenarios.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use dynamap_core::document::{Document, SchemaBuilder};
    use dynamap_core::expression::attr;
    use dynamap_core::{TableDescriptor, document_codec};
    use dynamap_model::types::{BillingMode, GlobalSecondaryIndexUpdate};
    use serde_json::json;

    use crate::mapper;

    #[derive(Debug, Default)]
    struct Indexed {
        p: String,
        s: i64,
        lsi1: String,
        gsi_p: String,
        gsi1_s: i64,
    }

    impl Document for Indexed {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("p", |i| &i.p, |i| &mut i.p).partition_key();
            schema.member("s", |i| &i.s, |i| &mut i.s).sort_key();
            schema.member("lsi1", |i| &i.lsi1, |i| &mut i.lsi1).local_index(1);
            schema
                .member("gsi_p", |i| &i.gsi_p, |i| &mut i.gsi_p)
                .global_partition_key(1);
            schema
                .member("gsi1_s", |i| &i.gsi1_s, |i| &mut i.gsi1_s)
                .global_sort_key(1);
        }
    }

    #[derive(Debug, Default)]
    struct Contended {
        id: String,
    }

    impl Document for Contended {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("id", |c| &c.id, |c| &mut c.id).partition_key();
        }
    }

    document_codec!(Indexed, Contended);

    #[test]
    fn test_should_resolve_indexes_from_key_members() {
        let descriptor = mapper().descriptor::<Indexed>().unwrap();
        let lsi = descriptor.local_index_name(1).unwrap();
        let gsi = descriptor.global_index_name(1).unwrap();
        assert_eq!(lsi, "lsi-1-lsi1");
        assert_eq!(gsi, "gsi-1-gsi-p-gsi1-s");

        assert_eq!(descriptor.resolve_index_name("p", Some("s")).unwrap(), None);
        assert_eq!(
            descriptor.resolve_index_name("p", Some("lsi1")).unwrap().as_deref(),
            Some(lsi.as_str())
        );
        assert_eq!(
            descriptor.resolve_index_name("lsi1", Some("p")).unwrap().as_deref(),
            Some(lsi.as_str())
        );
        assert_eq!(
            descriptor.resolve_index_name("gsi_p", Some("gsi1_s")).unwrap().as_deref(),
            Some(gsi.as_str())
        );
        assert!(descriptor.resolve_index_name("s", Some("gsi_p")).is_err());
    }

    #[test]
    fn test_should_select_index_for_key_conditions() {
        let mapper = mapper();
        let compiled = mapper
            .compile_key_condition::<Indexed>(&(attr("gsi_p").eq("g") & attr("gsi1_s").gt(3)))
            .unwrap();
        assert_eq!(compiled.expression, "gsi_p = :v0 AND gsi1_s > :v1");
        assert_eq!(compiled.index_name.as_deref(), Some("gsi-1-gsi-p-gsi1-s"));

        let compiled = mapper
            .compile_key_condition::<Indexed>(&(attr("lsi1").begins_with("a") & attr("p").eq("x")))
            .unwrap();
        assert_eq!(compiled.index_name.as_deref(), Some("lsi-1-lsi1"));
    }

    #[test]
    fn test_should_build_table_definition() {
        let definition = mapper().table_definition::<Indexed>("indexed").unwrap();
        assert_eq!(
            serde_json::to_value(&definition.key_schema).unwrap(),
            json!([
                {"AttributeName": "p", "KeyType": "HASH"},
                {"AttributeName": "s", "KeyType": "RANGE"}
            ])
        );
        let names: Vec<_> = definition
            .attribute_definitions
            .iter()
            .map(|d| d.attribute_name.as_str())
            .collect();
        assert_eq!(names.len(), 5);
        for name in ["p", "s", "lsi1", "gsi_p", "gsi1_s"] {
            assert!(names.contains(&name), "{name}");
        }
        assert_eq!(definition.local_secondary_indexes.len(), 1);
        assert_eq!(definition.global_secondary_indexes.len(), 1);
        assert_eq!(definition.billing_mode, BillingMode::PayPerRequest);
    }

    #[test]
    fn test_should_diff_global_indexes() {
        let mapper = mapper();
        let mut existing = mapper.table_definition::<Indexed>("indexed").unwrap();
        existing.global_secondary_indexes[0].index_name = "legacy".to_owned();
        let update = mapper.table_update::<Indexed>(&existing).unwrap();
        assert_eq!(update.table_name, "indexed");
        match update.global_secondary_index_updates.as_slice() {
            [
                GlobalSecondaryIndexUpdate::Delete { index_name },
                GlobalSecondaryIndexUpdate::Create(created),
            ] => {
                assert_eq!(index_name, "legacy");
                assert_eq!(created.index_name, "gsi-1-gsi-p-gsi1-s");
            }
            other => panic!("unexpected updates: {other:?}"),
        }
    }

    #[test]
    fn test_should_publish_one_descriptor_under_contention() {
        let descriptors: Vec<Arc<TableDescriptor>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(TableDescriptor::resolve::<Contended>))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });
        for descriptor in &descriptors[1..] {
            assert!(Arc::ptr_eq(&descriptors[0], descriptor));
        }
    }
}
