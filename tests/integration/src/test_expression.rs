//! Expression compilation scenarios.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    use dynamap_core::document::{Document, SchemaBuilder};
    use dynamap_core::expression::{attr, cond, deferred, raw, remove, set, val};
    use dynamap_core::{MapperError, document_codec, enum_codec};
    use dynamap_model::AttributeValue;

    use crate::mapper;

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    enum Status {
        #[default]
        Draft,
        Active = 2,
    }

    #[derive(Debug, Default)]
    struct Person {
        id: String,
        age: u32,
        status: Status,
        x: String,
        a: i64,
        b: i64,
        c: Option<String>,
    }

    impl Document for Person {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("id", |p| &p.id, |p| &mut p.id).partition_key();
            schema.member("age", |p| &p.age, |p| &mut p.age).rename("Age");
            schema.member("status", |p| &p.status, |p| &mut p.status);
            schema.member("x", |p| &p.x, |p| &mut p.x);
            schema.member("a", |p| &p.a, |p| &mut p.a);
            schema.member("b", |p| &p.b, |p| &mut p.b);
            schema.member("c", |p| &p.c, |p| &mut p.c);
        }
    }

    enum_codec!(Status { Draft, Active });
    document_codec!(Person);

    fn n(text: &str) -> AttributeValue {
        AttributeValue::N(text.to_owned())
    }

    #[test]
    fn test_should_compile_age_range() {
        let compiled = mapper()
            .compile_condition::<Person>(&(attr("age").ge(18) & attr("age").lt(65)))
            .unwrap();
        assert_eq!(compiled.expression, "Age >= :v0 AND Age < :v1");
        assert_eq!(compiled.attribute_values.len(), 2);
        assert_eq!(compiled.attribute_values[":v0"], n("18"));
        assert_eq!(compiled.attribute_values[":v1"], n("65"));
        assert!(compiled.attribute_names.is_empty());
    }

    #[test]
    fn test_should_reuse_one_alias_for_repeated_values() {
        let mapper = mapper();
        for _ in 0..2 {
            let compiled = mapper
                .compile_condition::<Person>(&(attr("x").eq("a") | attr("x").eq("a")))
                .unwrap();
            assert_eq!(compiled.expression, "x = :v0 OR x = :v0");
            assert_eq!(compiled.attribute_values.len(), 1);
        }
    }

    #[test]
    fn test_should_alias_reserved_member_names() {
        let compiled = mapper()
            .compile_condition::<Person>(&attr("status").eq(2))
            .unwrap();
        assert_eq!(compiled.expression, "#p0 = :v0");
        assert_eq!(compiled.attribute_names["#p0"], "status");
        assert_eq!(
            compiled.attribute_values[":v0"],
            AttributeValue::S("Active".to_owned())
        );
    }

    #[test]
    fn test_should_merge_update_verbs() {
        let mapper = mapper();
        let expected = "SET a = :v0, b = :v1 REMOVE c";
        let forward = mapper
            .compile_update::<Person>(&(set(attr("a"), 1) & set(attr("b"), 2) & remove(attr("c"))))
            .unwrap();
        assert_eq!(forward.expression, expected);
        let interleaved = mapper
            .compile_update::<Person>(&(set(attr("a"), 1) & remove(attr("c")) & set(attr("b"), 2)))
            .unwrap();
        assert_eq!(interleaved.expression, expected);
        assert_eq!(interleaved.attribute_values[":v1"], n("2"));
    }

    #[test]
    fn test_should_fold_captured_values_before_compiling() {
        let counter = Arc::new(AtomicI64::new(0));
        let captured = Arc::clone(&counter);
        let minimum = deferred(move || Ok(captured.load(Ordering::SeqCst) + 2));
        let adults_only = true;
        counter.store(40, Ordering::SeqCst);
        let expr = cond(val(adults_only), attr("age").ge(minimum), attr("age").ge(0));
        let compiled = mapper().compile_condition::<Person>(&expr).unwrap();
        assert_eq!(compiled.expression, "Age >= :v0");
        assert_eq!(compiled.attribute_values[":v0"], n("42"));
    }

    #[test]
    fn test_should_combine_raw_fragments() {
        let expr = attr("a").gt(1)
            & raw("attribute_exists(#n) OR #n = :z")
                .name("n", "nick")
                .value("z", "anon");
        let compiled = mapper().compile_condition::<Person>(&expr).unwrap();
        assert_eq!(
            compiled.expression,
            "a > :v0 AND (attribute_exists(#n) OR #n = :z)"
        );
        assert_eq!(compiled.attribute_names["#n"], "nick");
        assert_eq!(compiled.attribute_values[":z"], AttributeValue::S("anon".to_owned()));
    }

    #[test]
    fn test_should_reject_untranslatable_expressions() {
        let mapper = mapper();
        let err = mapper
            .compile_condition::<Person>(&(attr("a") * val(2)).gt(4))
            .unwrap_err();
        assert!(matches!(err, MapperError::UnsupportedExpression { .. }), "{err}");
        assert!(matches!(
            mapper.compile_condition::<Person>(&attr("zzz").eq(1)).unwrap_err(),
            MapperError::UnknownMember { .. }
        ));
    }
}
