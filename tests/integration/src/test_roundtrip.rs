//! Encode/decode behavior of single-type models.

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use dynamap_core::schema::{
        EnumDefinition, IgnoreMode, IndexDefinition, ModelDefinition, PropertyDefinition,
        TimestampPrecision, TypeCatalog,
    };
    use dynamap_core::{AttributeValue, CodecError, DecodeError, Entity, KeyContext};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    use crate::mapper;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    enum OrderStatus {
        Pending,
        Shipped,
        Cancelled,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Address {
        street: String,
        postcode: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Order {
        customer_id: String,
        order_id: Uuid,
        email: Option<String>,
        status: OrderStatus,
        placed_at: DateTime<Utc>,
        total: i64,
        lines: Vec<String>,
        tags: BTreeSet<String>,
        quantities: BTreeMap<String, u32>,
        ship_to: Option<Address>,
        #[serde(default)]
        audit_note: Option<String>,
        #[serde(default)]
        scratch: Option<String>,
    }

    impl Entity for Order {
        const TYPE_NAME: &'static str = "Order";

        fn describe(c: &mut TypeCatalog) {
            c.register_enum(EnumDefinition::new(
                "OrderStatus",
                ["Pending", "Shipped", "Cancelled"],
            ));
            c.register(
                ModelDefinition::new("Address")
                    .with_property(PropertyDefinition::new("street", "String"))
                    .with_property(
                        PropertyDefinition::new("postcode", "Option<String>").with_rename("zip"),
                    ),
            );
            c.register(
                ModelDefinition::new("Order")
                    .with_key("CUSTOMER#<customerId>", "ORDER#<orderId>")
                    .with_index(IndexDefinition::new("GSI1", "EMAIL#<email>"))
                    .with_index(
                        IndexDefinition::new("GSI2", "STATUS#<status>").with_sort("<placedAt>"),
                    )
                    .with_property(PropertyDefinition::new("customerId", "String"))
                    .with_property(PropertyDefinition::new("orderId", "Uuid"))
                    .with_property(PropertyDefinition::new("email", "Option<String>"))
                    .with_property(PropertyDefinition::new("status", "OrderStatus"))
                    .with_property(PropertyDefinition::new(
                        "placedAt",
                        "chrono::DateTime<chrono::Utc>",
                    ))
                    .with_property(PropertyDefinition::new("total", "i64").with_rename("amount"))
                    .with_property(PropertyDefinition::new("lines", "Vec<String>"))
                    .with_property(PropertyDefinition::new("tags", "BTreeSet<String>"))
                    .with_property(PropertyDefinition::new(
                        "quantities",
                        "BTreeMap<String, u32>",
                    ))
                    .with_property(PropertyDefinition::new("shipTo", "Option<Address>"))
                    .with_property(
                        PropertyDefinition::new("auditNote", "Option<String>")
                            .with_ignore(IgnoreMode::OnEncode),
                    )
                    .with_property(
                        PropertyDefinition::new("scratch", "Option<String>")
                            .with_ignore(IgnoreMode::Always),
                    ),
            );
        }
    }

    fn order() -> Order {
        Order {
            customer_id: "c-42".to_owned(),
            order_id: Uuid::parse_str("7f1c2b9e-3a55-4d4e-9a0e-6f1f0c1d2e3f").unwrap(),
            email: Some("ada@example.com".to_owned()),
            status: OrderStatus::Shipped,
            placed_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            total: 1999,
            lines: vec!["widget".to_owned(), "gadget".to_owned()],
            tags: ["gift".to_owned(), "rush".to_owned()].into(),
            quantities: [("widget".to_owned(), 2), ("gadget".to_owned(), 1)].into(),
            ship_to: Some(Address {
                street: "1 Main St".to_owned(),
                postcode: Some("94107".to_owned()),
            }),
            audit_note: None,
            scratch: None,
        }
    }

    #[test]
    fn test_should_roundtrip_full_order() {
        let m = mapper();
        let original = order();
        let item = m.encode(&original).unwrap();

        assert_eq!(
            item.key_text("PK"),
            Some("CUSTOMER#c-42")
        );
        assert_eq!(
            item.key_text("SK"),
            Some("ORDER#7f1c2b9e-3a55-4d4e-9a0e-6f1f0c1d2e3f")
        );
        assert_eq!(item.get("amount"), Some(&AttributeValue::N("1999".to_owned())));
        assert!(!item.contains("total"));
        assert_eq!(item.get("status"), Some(&AttributeValue::S("Shipped".to_owned())));
        assert!(matches!(item.get("tags"), Some(AttributeValue::Ss(_))));

        let ship_to = item.get("shipTo").and_then(AttributeValue::as_m).unwrap();
        assert_eq!(ship_to.get("zip"), Some(&AttributeValue::S("94107".to_owned())));
        assert!(!ship_to.contains_key("postcode"));

        assert_eq!(m.decode_item::<Order>(&item).unwrap(), original);
    }

    #[test]
    fn test_should_roundtrip_empty_collections() {
        let m = mapper();
        let original = Order {
            lines: Vec::new(),
            tags: BTreeSet::new(),
            quantities: BTreeMap::new(),
            ship_to: None,
            email: None,
            ..order()
        };
        let item = m.encode(&original).unwrap();

        assert_eq!(item.get("lines"), Some(&AttributeValue::L(Vec::new())));
        assert_eq!(item.get("tags"), Some(&AttributeValue::L(Vec::new())));
        assert_eq!(item.get("quantities"), Some(&AttributeValue::M(BTreeMap::new())));
        assert_eq!(m.decode_item::<Order>(&item).unwrap(), original);
    }

    #[test]
    fn test_should_omit_null_properties() {
        let m = mapper();
        let item = m
            .encode(&Order {
                email: None,
                ship_to: None,
                ..order()
            })
            .unwrap();
        assert!(!item.contains("email"));
        assert!(!item.contains("shipTo"));
        assert!(item.iter().all(|(_, v)| !v.is_null()));
    }

    #[test]
    fn test_should_write_sparse_index_only_when_value_present() {
        let m = mapper();
        let with_email = m.encode(&order()).unwrap();
        assert_eq!(with_email.key_text("GSI1PK"), Some("EMAIL#ada@example.com"));
        assert_eq!(with_email.key_text("GSI2PK"), Some("STATUS#Shipped"));
        assert!(with_email.contains("GSI2SK"));
        assert!(!with_email.contains("GSI1SK"));

        let without = m
            .encode(&Order {
                email: None,
                ..order()
            })
            .unwrap();
        assert!(!without.contains("GSI1PK"));
        assert!(without.contains("GSI2PK"));
    }

    #[test]
    fn test_should_honor_ignore_modes() {
        let m = mapper();
        let item = m
            .encode(&Order {
                audit_note: Some("checked".to_owned()),
                scratch: Some("tmp".to_owned()),
                ..order()
            })
            .unwrap();
        assert!(!item.contains("auditNote"));
        assert!(!item.contains("scratch"));

        let mut stored = item;
        stored.insert("auditNote", AttributeValue::S("from db".to_owned()));
        stored.insert("scratch", AttributeValue::S("from db".to_owned()));
        let decoded = m.decode_item::<Order>(&stored).unwrap();
        assert_eq!(decoded.audit_note.as_deref(), Some("from db"));
        assert_eq!(decoded.scratch, None);
    }

    #[test]
    fn test_should_reject_unknown_enum_member_on_decode() {
        let m = mapper();
        let mut item = m.encode(&order()).unwrap();
        item.insert("status", AttributeValue::S("Lost".to_owned()));
        let err = m.decode_item::<Order>(&item).unwrap_err();
        let CodecError::Decode(DecodeError::InvalidAttribute { attribute, key, .. }) = err else {
            panic!("expected InvalidAttribute, got {err:?}");
        };
        assert_eq!(attribute, "status");
        assert_eq!(key.pk.as_deref(), Some("CUSTOMER#c-42"));
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: String,
        name: String,
        count: i32,
    }

    impl Entity for Record {
        const TYPE_NAME: &'static str = "Record";

        fn describe(c: &mut TypeCatalog) {
            c.register(
                ModelDefinition::new("Record")
                    .with_key("ENTITY#<id>", "METADATA")
                    .with_property(PropertyDefinition::new("id", "String"))
                    .with_property(PropertyDefinition::new("name", "String"))
                    .with_property(PropertyDefinition::new("count", "i32")),
            );
        }
    }

    fn record() -> Record {
        Record {
            id: "abc123".to_owned(),
            name: "first".to_owned(),
            count: 3,
        }
    }

    #[test]
    fn test_should_render_entity_key() {
        let item = mapper().encode(&record()).unwrap();
        assert_eq!(item.key_text("PK"), Some("ENTITY#abc123"));
        assert_eq!(item.key_text("SK"), Some("METADATA"));
    }

    #[test]
    fn test_should_report_missing_attribute_with_key() {
        let m = mapper();
        let mut item = m.encode(&record()).unwrap();
        item.remove("name");

        let err = m.decode_item::<Record>(&item).unwrap_err();
        let CodecError::Decode(DecodeError::MissingAttribute {
            property,
            attribute,
            key,
        }) = err
        else {
            panic!("expected MissingAttribute, got {err:?}");
        };
        assert_eq!(property, "name");
        assert_eq!(attribute, "name");
        assert_eq!(key, KeyContext::new("ENTITY#abc123", "METADATA"));
    }

    #[test]
    fn test_should_use_caller_key_context() {
        let m = mapper();
        let mut item = m.encode(&record()).unwrap();
        item.remove("count");
        let key = KeyContext::new("ENTITY#abc123", "METADATA");
        let err = m.decode::<Record>(&item, &key).unwrap_err();
        assert!(err.to_string().contains("PK=ENTITY#abc123, SK=METADATA"));
    }

    #[test]
    fn test_should_reject_mistyped_attribute() {
        let m = mapper();
        let mut item = m.encode(&record()).unwrap();
        item.insert("count", AttributeValue::S("three".to_owned()));
        assert!(matches!(
            m.decode_item::<Record>(&item),
            Err(CodecError::Decode(DecodeError::InvalidAttribute { .. }))
        ));
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counters {
        id: String,
        zero: i64,
        negative: i64,
        big: u64,
        small: i8,
        ratio: f64,
    }

    impl Entity for Counters {
        const TYPE_NAME: &'static str = "Counters";

        fn describe(c: &mut TypeCatalog) {
            c.register(
                ModelDefinition::new("Counters")
                    .with_key("COUNTERS#<id>", "COUNTERS")
                    .with_property(PropertyDefinition::new("id", "String"))
                    .with_property(PropertyDefinition::new("zero", "i64"))
                    .with_property(PropertyDefinition::new("negative", "i64"))
                    .with_property(PropertyDefinition::new("big", "u64"))
                    .with_property(PropertyDefinition::new("small", "i8"))
                    .with_property(PropertyDefinition::new("ratio", "f64")),
            );
        }
    }

    #[test]
    fn test_should_roundtrip_numeric_extremes() {
        let m = mapper();
        let original = Counters {
            id: "x".to_owned(),
            zero: 0,
            negative: i64::MIN,
            big: u64::MAX,
            small: -128,
            ratio: -0.5,
        };
        let item = m.encode(&original).unwrap();
        assert_eq!(item.get("zero"), Some(&AttributeValue::N("0".to_owned())));
        assert_eq!(
            item.get("negative"),
            Some(&AttributeValue::N("-9223372036854775808".to_owned()))
        );
        assert_eq!(
            item.get("big"),
            Some(&AttributeValue::N("18446744073709551615".to_owned()))
        );
        assert_eq!(m.decode_item::<Counters>(&item).unwrap(), original);
    }

    #[test]
    fn test_should_reject_out_of_range_number() {
        let m = mapper();
        let mut item = m
            .encode(&Counters {
                id: "x".to_owned(),
                zero: 0,
                negative: -1,
                big: 1,
                small: 1,
                ratio: 1.0,
            })
            .unwrap();
        item.insert("small", AttributeValue::N("300".to_owned()));
        assert!(m.decode_item::<Counters>(&item).is_err());
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Session {
        id: String,
        created: DateTime<Utc>,
        expires: DateTime<Utc>,
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
        last_seen: Option<DateTime<Utc>>,
    }

    impl Entity for Session {
        const TYPE_NAME: &'static str = "Session";

        fn describe(c: &mut TypeCatalog) {
            c.register(
                ModelDefinition::new("Session")
                    .with_key("SESSION#<id>", "SESSION")
                    .with_property(PropertyDefinition::new("id", "String"))
                    .with_property(
                        PropertyDefinition::new("created", "DateTime<Utc>")
                            .with_timestamp(TimestampPrecision::Seconds),
                    )
                    .with_property(
                        PropertyDefinition::new("expires", "DateTime<Utc>")
                            .with_timestamp(TimestampPrecision::Milliseconds),
                    )
                    .with_property(PropertyDefinition::new("earliest", "DateTime<Utc>"))
                    .with_property(
                        PropertyDefinition::new("latest", "DateTime<Utc>")
                            .with_timestamp(TimestampPrecision::Milliseconds),
                    )
                    .with_property(
                        PropertyDefinition::new("last_seen", "Option<DateTime<Utc>>")
                            .with_timestamp(TimestampPrecision::Seconds),
                    ),
            );
        }
    }

    fn min_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap()
    }

    fn max_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap() + Duration::milliseconds(999)
    }

    fn session() -> Session {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        Session {
            id: "s1".to_owned(),
            created,
            expires: created + Duration::milliseconds(750),
            earliest: min_date(),
            latest: max_date(),
            last_seen: None,
        }
    }

    #[test]
    fn test_should_store_epoch_timestamps_at_declared_precision() {
        let m = mapper();
        let original = session();
        let item = m.encode(&original).unwrap();

        assert_eq!(item.get("created"), Some(&AttributeValue::N("1709294400".to_owned())));
        assert_eq!(
            item.get("expires"),
            Some(&AttributeValue::N("1709294400750".to_owned()))
        );
        assert!(!item.contains("last_seen"));
        assert_eq!(m.decode_item::<Session>(&item).unwrap(), original);
    }

    #[test]
    fn test_should_roundtrip_calendar_extremes() {
        let m = mapper();
        let original = Session {
            earliest: max_date(),
            latest: min_date(),
            last_seen: Some(min_date()),
            ..session()
        };
        let item = m.encode(&original).unwrap();
        assert_eq!(
            item.get("earliest"),
            Some(&AttributeValue::S("9999-12-31T23:59:59.999Z".to_owned()))
        );
        assert_eq!(
            item.get("latest"),
            Some(&AttributeValue::N(min_date().timestamp_millis().to_string()))
        );
        assert_eq!(m.decode_item::<Session>(&item).unwrap(), original);

        let flipped = session();
        let item = m.encode(&flipped).unwrap();
        assert_eq!(
            item.get("earliest"),
            Some(&AttributeValue::S("0001-01-01T00:00:00Z".to_owned()))
        );
        assert_eq!(m.decode_item::<Session>(&item).unwrap(), flipped);
    }

    #[test]
    fn test_should_truncate_sub_second_values_at_second_precision() {
        let m = mapper();
        let original = Session {
            created: session().created + Duration::milliseconds(400),
            ..session()
        };
        let item = m.encode(&original).unwrap();
        let decoded = m.decode_item::<Session>(&item).unwrap();
        assert_eq!(decoded.created, session().created);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Node {
        label: String,
        note: Option<String>,
        children: Vec<Node>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tree {
        id: String,
        root: Node,
    }

    impl Entity for Tree {
        const TYPE_NAME: &'static str = "Tree";

        fn describe(c: &mut TypeCatalog) {
            c.register(
                ModelDefinition::new("Node")
                    .with_property(PropertyDefinition::new("label", "String").with_rename("Label"))
                    .with_property(PropertyDefinition::new("note", "Option<String>"))
                    .with_property(PropertyDefinition::new("children", "Vec<Node>")),
            );
            c.register(
                ModelDefinition::new("Tree")
                    .with_key("TREE#<id>", "TREE")
                    .with_property(PropertyDefinition::new("id", "String"))
                    .with_property(PropertyDefinition::new("root", "Node")),
            );
        }
    }

    fn leaf(label: &str) -> Node {
        Node {
            label: label.to_owned(),
            note: None,
            children: Vec::new(),
        }
    }

    #[test]
    fn test_should_encode_recursive_types_identically_at_every_depth() {
        let m = mapper();
        let tree = Tree {
            id: "t1".to_owned(),
            root: Node {
                label: "a".to_owned(),
                note: Some("top".to_owned()),
                children: vec![Node {
                    children: vec![leaf("c")],
                    ..leaf("b")
                }],
            },
        };
        let item = m.encode(&tree).unwrap();

        let root = item.get("root").and_then(AttributeValue::as_m).unwrap();
        let b = root["children"].as_l().unwrap()[0].as_m().unwrap();
        let c = b["children"].as_l().unwrap()[0].as_m().unwrap();
        for (level, label) in [(b, "b"), (c, "c")] {
            assert_eq!(level.get("Label"), Some(&AttributeValue::S(label.to_owned())));
            assert!(!level.contains_key("label"));
            assert!(!level.contains_key("note"));
        }
        assert_eq!(c["children"], AttributeValue::L(Vec::new()));

        assert_eq!(m.decode_item::<Tree>(&item).unwrap(), tree);
    }
}
