//! Single-table polymorphism through the mapper.

#[cfg(test)]
mod tests {
    use dynamap_core::schema::{ModelDefinition, PropertyDefinition, TypeCatalog};
    use dynamap_core::{
        AttributeValue, CodecError, DecodeError, DiagnosticCode, Entity, Polymorphic, RecordDecoder,
        Variant,
    };
    use serde::{Deserialize, Serialize};

    use crate::mapper;

    fn event_root(c: &mut TypeCatalog) {
        c.register(
            ModelDefinition::new("Event")
                .with_abstract()
                .with_discriminator_attribute("Kind")
                .with_key("STREAM#<stream>", "EVENT#<sequence>")
                .with_property(PropertyDefinition::new("stream", "String"))
                .with_property(PropertyDefinition::new("sequence", "u64")),
        );
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Created {
        stream: String,
        sequence: u64,
        by: String,
    }

    impl Entity for Created {
        const TYPE_NAME: &'static str = "Created";

        fn describe(c: &mut TypeCatalog) {
            event_root(c);
            c.register(
                ModelDefinition::new("Created")
                    .with_parent("Event")
                    .with_discriminator("created")
                    .with_property(PropertyDefinition::new("by", "String").with_rename("author")),
            );
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Deleted {
        stream: String,
        sequence: u64,
        reason: Option<String>,
    }

    impl Entity for Deleted {
        const TYPE_NAME: &'static str = "Deleted";

        fn describe(c: &mut TypeCatalog) {
            event_root(c);
            c.register(
                ModelDefinition::new("Deleted")
                    .with_parent("Event")
                    .with_discriminator("deleted")
                    .with_property(PropertyDefinition::new("reason", "Option<String>")),
            );
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Created(Created),
        Deleted(Deleted),
    }

    impl Polymorphic for Event {
        const ROOT: &'static str = "Event";

        fn describe(c: &mut TypeCatalog) {
            event_root(c);
        }

        fn variants() -> Vec<Variant<Self>> {
            vec![
                Variant::of::<Created>(Event::Created, |e| match e {
                    Event::Created(c) => Some(c),
                    Event::Deleted(_) => None,
                }),
                Variant::of::<Deleted>(Event::Deleted, |e| match e {
                    Event::Deleted(d) => Some(d),
                    Event::Created(_) => None,
                }),
            ]
        }
    }

    fn created(sequence: u64) -> Event {
        Event::Created(Created {
            stream: "orders".to_owned(),
            sequence,
            by: "ada".to_owned(),
        })
    }

    fn deleted(sequence: u64) -> Event {
        Event::Deleted(Deleted {
            stream: "orders".to_owned(),
            sequence,
            reason: None,
        })
    }

    #[test]
    fn test_should_write_discriminator_and_inherited_key() {
        let item = mapper().encode_variant(&created(7)).unwrap();
        assert_eq!(item.key_text("PK"), Some("STREAM#orders"));
        assert_eq!(item.key_text("SK"), Some("EVENT#7"));
        assert_eq!(item.key_text("Kind"), Some("created"));
        assert!(!item.contains("Type"));
        assert_eq!(item.key_text("author"), Some("ada"));
    }

    #[test]
    fn test_should_dispatch_on_discriminator() {
        let m = mapper();
        for event in [created(1), deleted(2)] {
            let item = m.encode_variant(&event).unwrap();
            assert_eq!(m.decode_variant::<Event>(&item).unwrap(), event);
        }
    }

    #[test]
    fn test_should_reject_unknown_discriminator() {
        let m = mapper();
        let mut item = m.encode_variant(&created(3)).unwrap();
        item.insert("Kind", AttributeValue::S("archived".to_owned()));

        let err = m.decode_variant::<Event>(&item).unwrap_err();
        let CodecError::Decode(DecodeError::UnknownVariant {
            attribute,
            value,
            key,
        }) = err
        else {
            panic!("expected UnknownVariant, got {err:?}");
        };
        assert_eq!(attribute, "Kind");
        assert_eq!(value, "archived");
        assert_eq!(key.sk.as_deref(), Some("EVENT#3"));
    }

    #[test]
    fn test_should_require_discriminator() {
        let m = mapper();
        let mut item = m.encode_variant(&deleted(4)).unwrap();
        item.remove("Kind");
        assert!(matches!(
            m.decode_variant::<Event>(&item),
            Err(CodecError::Decode(DecodeError::MissingDiscriminator { .. }))
        ));
    }

    #[test]
    fn test_should_refuse_decoding_other_variant() {
        let m = mapper();
        let item = m.encode_variant(&deleted(5)).unwrap();
        let err = m.decode_item::<Created>(&item).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Decode(DecodeError::VariantMismatch { .. })
        ));
    }

    #[test]
    fn test_should_encode_variant_directly() {
        let m = mapper();
        let Event::Created(inner) = created(6) else {
            unreachable!()
        };
        let item = m.encode(&inner).unwrap();
        assert_eq!(item.key_text("Kind"), Some("created"));
        assert_eq!(m.decode_variant::<Event>(&item).unwrap(), created(6));
    }

    #[test]
    fn test_should_decode_mixed_batch_leniently() {
        let m = mapper();
        let mut broken = m.encode_variant(&created(9)).unwrap();
        broken.insert("Kind", AttributeValue::S("mystery".to_owned()));
        let items = vec![
            m.encode_variant(&created(8)).unwrap(),
            broken,
            m.encode_variant(&deleted(10)).unwrap(),
        ];

        let codec = m.polymorphic::<Event>().unwrap();
        let decoded = codec.decode_lenient(&items);
        assert_eq!(decoded, vec![created(8), deleted(10)]);
        assert!(codec.decode_many(&items).is_err());
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Cat {
        id: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Dog {
        id: String,
    }

    fn pet_root(c: &mut TypeCatalog) {
        c.register(
            ModelDefinition::new("Pet")
                .with_abstract()
                .with_key("PET#<id>", "PET")
                .with_property(PropertyDefinition::new("id", "String")),
        );
    }

    impl Entity for Cat {
        const TYPE_NAME: &'static str = "Cat";

        fn describe(c: &mut TypeCatalog) {
            pet_root(c);
            c.register(
                ModelDefinition::new("Cat")
                    .with_parent("Pet")
                    .with_discriminator("pet"),
            );
        }
    }

    impl Entity for Dog {
        const TYPE_NAME: &'static str = "Dog";

        fn describe(c: &mut TypeCatalog) {
            pet_root(c);
            c.register(
                ModelDefinition::new("Dog")
                    .with_parent("Pet")
                    .with_discriminator("pet"),
            );
        }
    }

    #[derive(Debug)]
    enum Pet {
        Cat(Cat),
        Dog(Dog),
    }

    impl Polymorphic for Pet {
        const ROOT: &'static str = "Pet";

        fn describe(c: &mut TypeCatalog) {
            pet_root(c);
        }

        fn variants() -> Vec<Variant<Self>> {
            vec![
                Variant::of::<Cat>(Pet::Cat, |p| match p {
                    Pet::Cat(c) => Some(c),
                    Pet::Dog(_) => None,
                }),
                Variant::of::<Dog>(Pet::Dog, |p| match p {
                    Pet::Dog(d) => Some(d),
                    Pet::Cat(_) => None,
                }),
            ]
        }
    }

    #[test]
    fn test_should_reject_duplicate_discriminators() {
        let err = mapper().polymorphic::<Pet>().unwrap_err();
        assert_eq!(
            err.diagnostics
                .with_code(DiagnosticCode::DuplicateDiscriminator)
                .count(),
            1
        );
        assert!(err.to_string().contains("'pet'"));
    }
}
