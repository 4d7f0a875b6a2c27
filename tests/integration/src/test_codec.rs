//! Value codec scenarios.

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

    use bytes::Bytes;
    use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
    use dynamap_core::document::{Document, SchemaBuilder};
    use dynamap_core::{
        CodecOptions, MapperConfig, MapperError, Value, document_codec, enum_codec,
        polymorphic_codec,
    };
    use dynamap_model::AttributeValue;
    use serde_json::json;
    use uuid::Uuid;

    use crate::mapper;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Record {
        name: String,
        tags: BTreeSet<String>,
        notes: Option<String>,
    }

    impl Document for Record {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("name", |r| &r.name, |r| &mut r.name).rename("Name");
            schema.member("tags", |r| &r.tags, |r| &mut r.tags).rename("Tags");
            schema.member("notes", |r| &r.notes, |r| &mut r.notes).rename("Notes");
        }
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    enum Priority {
        #[default]
        Low,
        High = 5,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Everything {
        flag: bool,
        small: i8,
        big: u64,
        ratio: f64,
        letter: char,
        blob: Bytes,
        numbers: Vec<i32>,
        ids: BTreeSet<i64>,
        labels: HashMap<String, String>,
        nested: Option<Box<Record>>,
        priority: Priority,
        at: Option<DateTime<Utc>>,
        day: Option<NaiveDate>,
        elapsed: TimeDelta,
        token: Uuid,
    }

    impl Document for Everything {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("flag", |e| &e.flag, |e| &mut e.flag);
            schema.member("small", |e| &e.small, |e| &mut e.small);
            schema.member("big", |e| &e.big, |e| &mut e.big);
            schema.member("ratio", |e| &e.ratio, |e| &mut e.ratio);
            schema.member("letter", |e| &e.letter, |e| &mut e.letter);
            schema.member("blob", |e| &e.blob, |e| &mut e.blob);
            schema.member("numbers", |e| &e.numbers, |e| &mut e.numbers);
            schema.member("ids", |e| &e.ids, |e| &mut e.ids);
            schema.member("labels", |e| &e.labels, |e| &mut e.labels);
            schema.member("nested", |e| &e.nested, |e| &mut e.nested);
            schema.member("priority", |e| &e.priority, |e| &mut e.priority);
            schema.member("at", |e| &e.at, |e| &mut e.at);
            schema.member("day", |e| &e.day, |e| &mut e.day);
            schema.member("elapsed", |e| &e.elapsed, |e| &mut e.elapsed);
            schema.member("token", |e| &e.token, |e| &mut e.token);
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Circle {
        radius: f64,
    }

    impl Document for Circle {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("radius", |c| &c.radius, |c| &mut c.radius);
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Square {
        side: f64,
    }

    impl Document for Square {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("side", |s| &s.side, |s| &mut s.side);
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Shape {
        Circle(Circle),
        Square(Square),
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Drawing {
        shapes: Vec<Shape>,
    }

    impl Document for Drawing {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("shapes", |d| &d.shapes, |d| &mut d.shapes);
        }
    }

    enum_codec!(Priority { Low, High });
    document_codec!(Record, Everything, Circle, Square, Drawing);
    polymorphic_codec!(Shape { Circle(Circle), Square(Square) });

    #[test]
    fn test_should_encode_record_without_absent_members() {
        let mapper = mapper();
        let record = Record {
            name: "Ada".to_owned(),
            tags: ["x", "y"].into_iter().map(str::to_owned).collect(),
            notes: None,
        };
        let encoded = mapper.to_attribute_value(&record).unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&encoded).unwrap(),
            json!({"M": {"Name": {"S": "Ada"}, "Tags": {"SS": ["x", "y"]}}})
        );
        assert_eq!(mapper.from_attribute_value::<Record>(&encoded).unwrap(), record);
    }

    #[test]
    fn test_should_round_trip_every_supported_shape() {
        let mapper = mapper();
        let value = Everything {
            flag: true,
            small: -7,
            big: u64::MAX,
            ratio: 0.25,
            letter: 'λ',
            blob: Bytes::from_static(b"\x00\x01binary"),
            numbers: vec![3, 1, 2],
            ids: [10, 20].into_iter().collect(),
            labels: HashMap::from([("k".to_owned(), "v".to_owned())]),
            nested: Some(Box::new(Record {
                name: "inner".to_owned(),
                ..Record::default()
            })),
            priority: Priority::High,
            at: Some(DateTime::from_timestamp(1_700_000_000, 123_000_000).unwrap()),
            day: NaiveDate::from_ymd_opt(2024, 2, 29),
            elapsed: TimeDelta::new(90_061, 5).unwrap(),
            token: Uuid::new_v4(),
        };
        let item = mapper.to_item(&value).unwrap();
        assert_eq!(item.get("big"), Some(&AttributeValue::N(u64::MAX.to_string())));
        assert_eq!(item.get("priority"), Some(&AttributeValue::S("High".to_owned())));
        assert_eq!(mapper.from_item::<Everything>(&item).unwrap(), value);
    }

    #[test]
    fn test_should_compact_empty_documents_consistently() {
        let mapper = mapper();
        assert_eq!(mapper.to_attribute_value(&Record::default()).unwrap(), None);
        assert_eq!(mapper.to_attribute_value(&Record::default()).unwrap(), None);

        let options = CodecOptions::builder()
            .serialize_null_values(true)
            .serialize_default_values(true)
            .build();
        let persisting = dynamap_core::Mapper::new(MapperConfig::new(options));
        let first = persisting.to_attribute_value(&Record::default()).unwrap();
        let second = persisting.to_attribute_value(&Record::default()).unwrap();
        assert!(matches!(first, Some(AttributeValue::M(_))));
        assert_eq!(first, second);
    }

    #[test]
    fn test_should_infer_homogeneous_sets() {
        let mapper = mapper();
        let numbers: BTreeSet<i32> = [1, 2, 3].into_iter().collect();
        assert_eq!(
            mapper.to_attribute_value(&numbers).unwrap(),
            Some(AttributeValue::Ns(vec!["1".into(), "2".into(), "3".into()]))
        );
        let mixed = Value::Set(vec![Value::from("a"), Value::from(1)]);
        assert!(matches!(
            mapper.to_attribute_value(&mixed).unwrap_err().root_cause(),
            MapperError::InvalidSetContents { .. }
        ));
    }

    #[test]
    fn test_should_encode_hash_sets_in_a_stable_order() {
        let mapper = mapper();
        let numbers: HashSet<i32> = (1..=20).collect();
        let expected: Vec<String> = (1..=20).map(|n: i32| n.to_string()).collect();
        for _ in 0..3 {
            let encoded = mapper.to_attribute_value(&numbers).unwrap().unwrap();
            assert_eq!(serde_json::to_value(&encoded).unwrap(), json!({"NS": expected}));
        }

        let words: HashSet<String> = ["pear", "Apple", "fig", "banana"]
            .into_iter()
            .map(str::to_owned)
            .collect();
        let encoded = mapper.to_attribute_value(&words).unwrap().unwrap();
        assert_eq!(
            serde_json::to_value(&encoded).unwrap(),
            json!({"SS": ["Apple", "banana", "fig", "pear"]})
        );
    }

    #[test]
    fn test_should_round_trip_polymorphic_members() {
        let mapper = mapper();
        let drawing = Drawing {
            shapes: vec![
                Shape::Circle(Circle { radius: 1.5 }),
                Shape::Square(Square { side: 2.0 }),
            ],
        };
        let item = mapper.to_item(&drawing).unwrap();
        let AttributeValue::L(shapes) = &item["shapes"] else {
            panic!("shapes should be a list");
        };
        assert_eq!(
            shapes[0].as_m().unwrap().get("$type"),
            Some(&AttributeValue::S("Circle".to_owned()))
        );
        assert_eq!(mapper.from_item::<Drawing>(&item).unwrap(), drawing);

        let mut untagged = BTreeMap::new();
        untagged.insert("radius".to_owned(), AttributeValue::N("1".to_owned()));
        assert!(matches!(
            mapper
                .from_attribute_value::<Shape>(&AttributeValue::M(untagged))
                .unwrap_err(),
            MapperError::MissingRequiredAttribute { .. }
        ));
    }

    #[test]
    fn test_should_decode_untyped_items_as_dynamic_values() {
        let mapper = mapper();
        let item = mapper
            .to_item(&Record {
                name: "Ada".to_owned(),
                ..Record::default()
            })
            .unwrap();
        let value = mapper.from_item::<Value>(&item).unwrap();
        let Value::Map(map) = value else {
            panic!("expected a map");
        };
        assert_eq!(map["Name"], Value::String("Ada".to_owned()));
    }

    #[test]
    fn test_should_report_decode_path() {
        let mapper = mapper();
        let mut nested = BTreeMap::new();
        nested.insert("Name".to_owned(), AttributeValue::Bool(true));
        let mut item = BTreeMap::new();
        item.insert("nested".to_owned(), AttributeValue::M(nested));
        let err = mapper.from_item::<Everything>(&item).unwrap_err();
        assert!(err.path().contains("nested"), "{}", err.path());
        assert!(matches!(err.root_cause(), MapperError::TypeMismatch { .. }));
    }
}
