//! Schema validation and handler customization.

#[cfg(test)]
mod tests {
    use dynamap_core::config::CodecConfig;
    use dynamap_core::schema::{
        IndexDefinition, ModelDefinition, PropertyDefinition, SchemaAnalyzer, TypeCatalog,
    };
    use dynamap_core::types::{Category, HandlerRegistry, Leaf, ScalarKind, TypeHandler, ValueError};
    use dynamap_core::{AttributeValue, CodecError, DiagnosticCode, Entity, Mapper, Severity};
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    use crate::mapper;

    #[derive(Debug, Serialize, Deserialize)]
    struct Crowded {
        id: String,
    }

    impl Entity for Crowded {
        const TYPE_NAME: &'static str = "Crowded";

        fn describe(c: &mut TypeCatalog) {
            let mut model = ModelDefinition::new("Crowded")
                .with_key("C#<id>", "C")
                .with_property(PropertyDefinition::new("id", "String"));
            for i in 1..=6 {
                model = model.with_index(IndexDefinition::new(format!("GSI{i}"), "<id>"));
            }
            c.register(model);
        }
    }

    #[test]
    fn test_should_report_too_many_indexes_once() {
        let err = mapper()
            .encode(&Crowded { id: "x".to_owned() })
            .unwrap_err();
        let CodecError::Schema(err) = err else {
            panic!("expected a schema error, got {err:?}");
        };
        assert_eq!(err.type_name, "Crowded");
        assert_eq!(err.diagnostics.len(), 1);
        let d = err
            .diagnostics
            .with_code(DiagnosticCode::TooManySecondaryIndexes)
            .next()
            .unwrap();
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.subject_type, "Crowded");
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Misspelled {
        id: String,
    }

    impl Entity for Misspelled {
        const TYPE_NAME: &'static str = "Misspelled";

        fn describe(c: &mut TypeCatalog) {
            c.register(
                ModelDefinition::new("Misspelled")
                    .with_key("ENTITY#<Ident>", "METADATA")
                    .with_property(PropertyDefinition::new("id", "String")),
            );
        }
    }

    #[test]
    fn test_should_cite_pattern_and_type_for_unknown_placeholder() {
        let err = mapper().codec::<Misspelled>().unwrap_err();
        let d = err
            .diagnostics
            .with_code(DiagnosticCode::PropertyNotFound)
            .next()
            .unwrap();
        assert!(d.message.contains("ENTITY#<Ident>"), "{}", d.message);
        assert!(d.message.contains("Misspelled"), "{}", d.message);
    }

    #[test]
    fn test_should_collect_every_finding_in_one_pass() {
        let mut c = TypeCatalog::new();
        c.register(
            ModelDefinition::new("Broken")
                .with_key("B#<missing>", "")
                .with_index(IndexDefinition::new("GSI1", "X#<id>"))
                .with_index(IndexDefinition::new("GSI1", "Y#<id>"))
                .with_property(PropertyDefinition::new("id", "String"))
                .with_property(PropertyDefinition::new("tags", "Vec<Widget>"))
                .with_property(PropertyDefinition::new("maybe", "Option<Option<String>>")),
        );
        let config = CodecConfig::default();
        let err = SchemaAnalyzer::new(&c, &config).analyze("Broken").unwrap_err();
        let codes: Vec<_> = err.diagnostics.iter().map(|d| d.code).collect();
        assert!(codes.contains(&DiagnosticCode::PropertyNotFound));
        assert!(codes.contains(&DiagnosticCode::MissingKeyTemplate));
        assert!(codes.contains(&DiagnosticCode::DuplicateIndexName));
        assert!(codes.contains(&DiagnosticCode::UnknownType));
        assert!(codes.contains(&DiagnosticCode::UnsupportedType));
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Loose {
        id: Option<String>,
    }

    impl Entity for Loose {
        const TYPE_NAME: &'static str = "Loose";

        fn describe(c: &mut TypeCatalog) {
            c.register(
                ModelDefinition::new("Loose")
                    .with_key("L#<id>", "L")
                    .with_property(PropertyDefinition::new("id", "Option<String>")),
            );
        }
    }

    #[test]
    fn test_should_block_on_warnings_only_when_configured() {
        let lenient = mapper().codec::<Loose>().unwrap();
        let warnings = &lenient.item_codec().descriptor().warnings;
        assert_eq!(
            warnings.with_code(DiagnosticCode::NullableKeyProperty).count(),
            1
        );

        let strict = Mapper::new(CodecConfig::builder().warnings_as_errors(true).build());
        let err = strict.codec::<Loose>().unwrap_err();
        assert!(!err.diagnostics.has_errors());
        assert!(err.diagnostics.is_blocking(true));
    }

    #[test]
    fn test_should_fail_encode_when_primary_key_value_absent() {
        let err = mapper().encode(&Loose { id: None }).unwrap_err();
        assert!(err.to_string().contains("'id'"), "{err}");
    }

    #[test]
    fn test_should_honor_configured_attribute_names() {
        let config = CodecConfig::builder()
            .pk_attribute("pk".to_owned())
            .sk_attribute("sk".to_owned())
            .build();
        let m = Mapper::new(config);
        let item = m.encode(&Loose { id: Some("a".to_owned()) }).unwrap();
        assert_eq!(item.key_text("pk"), Some("L#a"));
        assert_eq!(item.key_text("sk"), Some("L"));
        assert!(!item.contains("PK"));
    }

    /// Stores integer cents as a fixed two-decimal number.
    #[derive(Debug)]
    struct MoneyHandler;

    impl TypeHandler for MoneyHandler {
        fn name(&self) -> &'static str {
            "money"
        }

        fn handles(&self, leaf: &Leaf) -> bool {
            leaf.category == Category::Scalar(ScalarKind::Custom("Money".to_owned()))
        }

        fn encode(&self, value: &Value, _: &Leaf) -> Result<AttributeValue, ValueError> {
            let cents = value.as_i64().ok_or(ValueError::InvalidNumber(value.to_string()))?;
            Ok(AttributeValue::N(format!("{}.{:02}", cents / 100, cents % 100)))
        }

        fn decode(&self, value: &AttributeValue, _: &Leaf) -> Result<Value, ValueError> {
            let text = value.as_n().ok_or(ValueError::UnexpectedNull)?;
            let (whole, frac) = text
                .split_once('.')
                .ok_or_else(|| ValueError::InvalidNumber(text.to_owned()))?;
            let cents = whole
                .parse::<i64>()
                .ok()
                .zip(frac.parse::<i64>().ok())
                .map(|(w, f)| w * 100 + f)
                .ok_or_else(|| ValueError::InvalidNumber(text.to_owned()))?;
            Ok(Value::from(cents))
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct Money(i64);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Invoice {
        id: String,
        amount: Money,
    }

    impl Entity for Invoice {
        const TYPE_NAME: &'static str = "Invoice";

        fn describe(c: &mut TypeCatalog) {
            c.register_scalar("Money");
            c.register(
                ModelDefinition::new("Invoice")
                    .with_key("INVOICE#<id>", "INVOICE")
                    .with_property(PropertyDefinition::new("id", "String"))
                    .with_property(PropertyDefinition::new("amount", "Money")),
            );
        }
    }

    #[test]
    fn test_should_use_registered_handler() {
        let mut registry = HandlerRegistry::default();
        registry.register(MoneyHandler);
        let m = Mapper::with_registry(CodecConfig::default(), registry);

        let invoice = Invoice {
            id: "i1".to_owned(),
            amount: Money(1234),
        };
        let item = m.encode(&invoice).unwrap();
        assert_eq!(item.get("amount"), Some(&AttributeValue::N("12.34".to_owned())));
        assert_eq!(m.decode_item::<Invoice>(&item).unwrap(), invoice);
    }

    #[test]
    fn test_should_reject_custom_scalar_without_handler() {
        let err = mapper().codec::<Invoice>().unwrap_err();
        assert!(
            err.diagnostics
                .with_code(DiagnosticCode::UnsupportedType)
                .next()
                .is_some(),
            "{err}"
        );
    }
}
