//! Primary key scenarios.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use bytes::Bytes;
    use dynamap_core::document::{Document, SchemaBuilder};
    use dynamap_core::{KeyValue, MapperError, PrimaryKey, Value, document_codec};
    use dynamap_model::AttributeValue;

    use crate::mapper;

    #[derive(Debug, Default)]
    struct Message {
        room: String,
        sent: i64,
        body: String,
    }

    impl Document for Message {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("room", |m| &m.room, |m| &mut m.room).partition_key();
            schema.member("sent", |m| &m.sent, |m| &mut m.sent).sort_key();
            schema.member("body", |m| &m.body, |m| &mut m.body);
        }
    }

    #[derive(Debug, Default)]
    struct Chunk {
        digest: Bytes,
    }

    impl Document for Chunk {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.member("digest", |c| &c.digest, |c| &mut c.digest).partition_key();
        }
    }

    document_codec!(Message, Chunk);

    #[test]
    fn test_should_round_trip_key_text_with_separators() {
        let mapper = mapper();
        let message = Message {
            room: "a|b%c\n".to_owned(),
            sent: -42,
            body: "hello".to_owned(),
        };
        let key = mapper.primary_key(&message).unwrap();
        let text = key.to_key_string();
        assert_eq!(text, "a%7Cb%25c%0A|-42");
        let parsed = mapper.parse_key::<Message>(&text).unwrap();
        assert_eq!(parsed, key);
        assert_eq!(parsed.sort(), Some(&KeyValue::N("-42".to_owned())));

        let item = key.to_item(mapper.codec()).unwrap();
        assert_eq!(item.len(), 2);
        assert_eq!(item["sent"], AttributeValue::N("-42".to_owned()));
    }

    #[test]
    fn test_should_round_trip_binary_keys() {
        let mapper = mapper();
        let chunk = Chunk {
            digest: Bytes::from_static(&[0xff, 0x00, 0x7c]),
        };
        let key = mapper.primary_key(&chunk).unwrap();
        let parsed = mapper.parse_key::<Chunk>(&key.to_key_string()).unwrap();
        assert_eq!(parsed.partition(), &KeyValue::B(chunk.digest.clone()));
    }

    #[test]
    fn test_should_order_keys_like_the_store() {
        let ctx = mapper().codec().clone();
        let keys: BTreeSet<PrimaryKey<Message>> = [10, 9, 100]
            .into_iter()
            .map(|sent| PrimaryKey::from_parts(&ctx, "room", Some(Value::from(sent))).unwrap())
            .collect();
        let sorts: Vec<_> = keys.iter().filter_map(|k| k.sort()).map(ToString::to_string).collect();
        assert_eq!(sorts, ["9", "10", "100"]);
    }

    #[test]
    fn test_should_reject_malformed_key_text() {
        let mapper = mapper();
        assert!(matches!(
            mapper.parse_key::<Message>("only-partition").unwrap_err(),
            MapperError::MalformedKeyText { .. }
        ));
        assert!(matches!(
            mapper.parse_key::<Message>("room|not-a-number").unwrap_err(),
            MapperError::MalformedKeyText { .. }
        ));
        for empty in ["|7", "room|"] {
            assert!(
                matches!(
                    mapper.parse_key::<Message>(empty).unwrap_err(),
                    MapperError::MalformedKeyText { .. }
                ),
                "{empty}"
            );
        }
        let ctx = mapper.codec();
        assert!(matches!(
            PrimaryKey::<Message>::from_parts(ctx, "room", None).unwrap_err(),
            MapperError::MissingRequiredAttribute { .. }
        ));
        assert!(matches!(
            PrimaryKey::<Message>::from_parts(ctx, "room", Some(Value::from("x"))).unwrap_err(),
            MapperError::InvalidNumber { .. }
        ));
    }
}
