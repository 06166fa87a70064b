//! Schema analysis: inheritance flattening, template resolution and
//! validation.
//!
//! Every check reports into a [`Diagnostics`] collector instead of returning
//! early, so one run surfaces every problem with a model. Only at the end is
//! the collector inspected to decide whether a descriptor can be produced.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use super::definition::{IgnoreMode, IndexDefinition, ModelDefinition, PropertyDefinition, TypeCatalog};
use super::descriptor::{
    DiscriminatorDescriptor, IndexDescriptor, KeyDescriptor, PolymorphicDescriptor,
    PropertyDescriptor, SchemaDescriptor, VariantDescriptor,
};
use crate::config::{CodecConfig, MAX_SECONDARY_INDEXES};
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::SchemaError;
use crate::template::{ResolvedTemplate, Template, TemplateError};
use crate::types::{Category, ClassifyError, ScalarKind, TypeClassifier};

/// Builds [`SchemaDescriptor`]s from a [`TypeCatalog`].
#[derive(Debug, Clone, Copy)]
pub struct SchemaAnalyzer<'a> {
    catalog: &'a TypeCatalog,
    config: &'a CodecConfig,
}

/// A property after inheritance merging, before classification.
struct Candidate<'a> {
    def: &'a PropertyDefinition,
    declared_in: &'a str,
}

impl<'a> SchemaAnalyzer<'a> {
    /// Analyzer over `catalog`.
    #[must_use]
    pub fn new(catalog: &'a TypeCatalog, config: &'a CodecConfig) -> Self {
        Self { catalog, config }
    }

    /// Analyze a table model.
    pub fn analyze(&self, type_name: &str) -> Result<SchemaDescriptor, SchemaError> {
        let mut diags = Diagnostics::new();
        let descriptor = self.analyze_into(type_name, &mut diags);
        match descriptor {
            Some(d) if !diags.is_blocking(self.config.warnings_as_errors) => {
                debug!(
                    type_name,
                    properties = d.properties.len(),
                    indexes = d.indexes.len(),
                    "analyzed schema"
                );
                Ok(SchemaDescriptor {
                    warnings: diags,
                    ..d
                })
            }
            _ => Err(SchemaError::new(type_name, diags)),
        }
    }

    /// Analyze an abstract root and every concrete variant below it.
    pub fn analyze_root(&self, root: &str) -> Result<PolymorphicDescriptor, SchemaError> {
        let mut diags = Diagnostics::new();
        let Some(model) = self.catalog.model(root) else {
            diags.report(
                DiagnosticCode::UnknownType,
                root,
                format!("type '{root}' is not defined in the catalog"),
            );
            return Err(SchemaError::new(root, diags));
        };
        if !model.is_abstract {
            diags.report(
                DiagnosticCode::UnsupportedType,
                root,
                format!("'{root}' is not marked abstract and cannot be a polymorphic root"),
            );
            return Err(SchemaError::new(root, diags));
        }

        self.check_hierarchy(model, &mut diags);

        let mut variants = Vec::new();
        for variant in self.catalog.concrete_descendants(root) {
            match self.analyze(&variant.name) {
                Ok(schema) => {
                    if let Some(d) = &schema.discriminator {
                        variants.push(VariantDescriptor {
                            value: d.value.clone(),
                            schema: Arc::new(schema),
                        });
                    }
                }
                Err(err) => diags.extend(err.diagnostics),
            }
        }

        if diags.is_blocking(self.config.warnings_as_errors) {
            return Err(SchemaError::new(root, diags));
        }
        debug!(root, variants = variants.len(), "analyzed polymorphic root");
        Ok(PolymorphicDescriptor {
            root: root.to_owned(),
            attribute: self.discriminator_attribute(model).to_owned(),
            variants,
        })
    }

    /// Validate every model in the catalog.
    ///
    /// Models without a primary key that are only used as nested property
    /// types are checked for their properties alone.
    #[must_use]
    pub fn analyze_all(&self) -> Diagnostics {
        let nested = self.nested_type_names();
        let mut diags = Diagnostics::new();
        for model in self.catalog.models() {
            let has_key = self
                .catalog
                .ancestry(&model.name)
                .is_ok_and(|chain| chain.iter().any(|m| m.key.is_some()));
            if !has_key && nested.contains(model.name.as_str()) {
                if let Err(err) = self.properties_of(&model.name) {
                    diags.extend(err.diagnostics);
                }
                continue;
            }
            self.analyze_into(&model.name, &mut diags);
            if model.is_abstract {
                self.check_hierarchy(model, &mut diags);
            }
        }
        diags
    }

    /// Flattened properties of a nested object type.
    pub fn properties_of(&self, type_name: &str) -> Result<Vec<PropertyDescriptor>, SchemaError> {
        let mut diags = Diagnostics::new();
        let properties = self.ancestry(type_name, &mut diags).and_then(|chain| {
            let candidates = merge_properties(&chain);
            let properties = self.classify_properties(type_name, &candidates, &mut diags)?;
            check_attributes(type_name, &properties, &BTreeSet::new(), &mut diags);
            Some(properties)
        });
        match properties {
            Some(p) if !diags.is_blocking(self.config.warnings_as_errors) => Ok(p),
            _ => Err(SchemaError::new(type_name, diags)),
        }
    }

    fn ancestry(&self, type_name: &str, diags: &mut Diagnostics) -> Option<Vec<&'a ModelDefinition>> {
        match self.catalog.ancestry(type_name) {
            Ok(chain) => Some(chain),
            Err(err) => {
                diags.report(DiagnosticCode::UnknownType, type_name, err.to_string());
                None
            }
        }
    }

    /// Full analysis, reporting into `diags`. Returns a descriptor only when
    /// every structural piece could be built; blocking is decided by callers.
    fn analyze_into(&self, type_name: &str, diags: &mut Diagnostics) -> Option<SchemaDescriptor> {
        let chain = self.ancestry(type_name, diags)?;
        let model = *chain.last()?;

        let candidates = merge_properties(&chain);
        let names: Vec<&str> = candidates.iter().map(|c| c.def.name.as_str()).collect();
        let properties = self.classify_properties(type_name, &candidates, diags);

        let primary_key = self.primary_key(type_name, &chain, &names, properties.as_deref(), diags);
        let indexes = self.indexes(type_name, &chain, &names, properties.as_deref(), diags);

        let polymorphic = chain[..chain.len() - 1].iter().any(|m| m.is_abstract);
        let attribute = self.discriminator_attribute(chain[0]);
        let discriminator = match &model.discriminator {
            Some(value) => Some(DiscriminatorDescriptor {
                attribute: attribute.to_owned(),
                value: value.clone(),
            }),
            None => {
                if polymorphic && !model.is_abstract {
                    diags.report(
                        DiagnosticCode::MissingDiscriminator,
                        type_name,
                        format!(
                            "concrete variant '{type_name}' of '{}' declares no discriminator value",
                            chain[0].name
                        ),
                    );
                }
                None
            }
        };

        let properties = properties?;
        let primary_key = primary_key?;
        let indexes = indexes.unwrap_or_default();

        let mut reserved = BTreeSet::new();
        reserved.insert(primary_key.pk_attribute.clone());
        reserved.insert(primary_key.sk_attribute.clone());
        for index in &indexes {
            reserved.insert(index.pk_attribute.clone());
            if index.sk.is_some() {
                reserved.insert(index.sk_attribute.clone());
            }
        }
        if polymorphic || discriminator.is_some() {
            reserved.insert(attribute.to_owned());
        }
        check_attributes(type_name, &properties, &reserved, diags);

        Some(SchemaDescriptor {
            type_name: type_name.to_owned(),
            ancestors: chain[..chain.len() - 1]
                .iter()
                .map(|m| m.name.clone())
                .collect(),
            primary_key,
            indexes,
            properties,
            discriminator_required: model.is_abstract,
            discriminator,
            warnings: Diagnostics::new(),
        })
    }

    fn classify_properties(
        &self,
        type_name: &str,
        candidates: &[Candidate<'_>],
        diags: &mut Diagnostics,
    ) -> Option<Vec<PropertyDescriptor>> {
        let classifier = TypeClassifier::new(self.catalog);
        let mut out = Vec::with_capacity(candidates.len());
        let mut ok = true;
        for Candidate { def, declared_in } in candidates {
            let category = match classifier.classify_str(&def.type_expr) {
                Ok(c) => c,
                Err(err) => {
                    report_classify_error(type_name, &def.name, &err, diags);
                    ok = false;
                    continue;
                }
            };
            if def.timestamp.is_some() && !category.is_timestamp() {
                diags.report(
                    DiagnosticCode::InvalidTimestampMarker,
                    type_name,
                    format!(
                        "timestamp marker on '{}' requires a date-time type, found '{}'",
                        def.name, def.type_expr
                    ),
                );
                ok = false;
            }
            out.push(PropertyDescriptor {
                name: def.name.clone(),
                attribute: def.rename.clone().unwrap_or_else(|| def.name.clone()),
                type_expr: def.type_expr.clone(),
                nullable: category.is_nullable(),
                category,
                ignore: def.ignore,
                timestamp: def.timestamp,
                declared_in: (*declared_in).to_owned(),
            });
        }
        ok.then_some(out)
    }

    fn primary_key(
        &self,
        type_name: &str,
        chain: &[&ModelDefinition],
        names: &[&str],
        properties: Option<&[PropertyDescriptor]>,
        diags: &mut Diagnostics,
    ) -> Option<KeyDescriptor> {
        let Some(key) = chain.iter().rev().find_map(|m| m.key.as_ref()) else {
            diags.report(
                DiagnosticCode::MissingKeyTemplate,
                type_name,
                format!("'{type_name}' and its ancestors declare no primary key"),
            );
            return None;
        };
        let pk = self.key_template(type_name, "partition key", &key.pk, names, properties, true, diags);
        let sk = self.key_template(type_name, "sort key", &key.sk, names, properties, true, diags);
        Some(KeyDescriptor {
            pk: pk?,
            sk: sk?,
            pk_attribute: key
                .pk_attribute
                .clone()
                .unwrap_or_else(|| self.config.pk_attribute.clone()),
            sk_attribute: key
                .sk_attribute
                .clone()
                .unwrap_or_else(|| self.config.sk_attribute.clone()),
        })
    }

    fn indexes(
        &self,
        type_name: &str,
        chain: &[&ModelDefinition],
        names: &[&str],
        properties: Option<&[PropertyDescriptor]>,
        diags: &mut Diagnostics,
    ) -> Option<Vec<IndexDescriptor>> {
        // Union over the chain; a derived declaration replaces an inherited
        // one of the same name in place.
        let mut merged: Vec<&IndexDefinition> = Vec::new();
        for model in chain {
            let mut own = BTreeSet::new();
            for index in &model.indexes {
                if !own.insert(index.name.as_str()) {
                    diags.report(
                        DiagnosticCode::DuplicateIndexName,
                        type_name,
                        format!("index '{}' is declared twice on '{}'", index.name, model.name),
                    );
                    continue;
                }
                match merged.iter_mut().find(|i| i.name == index.name) {
                    Some(slot) => *slot = index,
                    None => merged.push(index),
                }
            }
        }

        if merged.len() > MAX_SECONDARY_INDEXES {
            diags.report(
                DiagnosticCode::TooManySecondaryIndexes,
                type_name,
                format!(
                    "'{type_name}' declares {} secondary indexes; at most {MAX_SECONDARY_INDEXES} are allowed",
                    merged.len()
                ),
            );
            return None;
        }

        let mut out = Vec::with_capacity(merged.len());
        let mut ok = true;
        for index in merged {
            let what = format!("index '{}' partition key", index.name);
            let pk = self.key_template(type_name, &what, &index.pk, names, properties, false, diags);
            let sk = match &index.sk {
                Some(sk) => {
                    let what = format!("index '{}' sort key", index.name);
                    self.key_template(type_name, &what, sk, names, properties, false, diags)
                        .map(Some)
                }
                None => Some(None),
            };
            let (Some(pk), Some(sk)) = (pk, sk) else {
                ok = false;
                continue;
            };
            out.push(IndexDescriptor {
                name: index.name.clone(),
                pk,
                sk,
                pk_attribute: index
                    .pk_attribute
                    .clone()
                    .unwrap_or_else(|| format!("{}PK", index.name)),
                sk_attribute: index
                    .sk_attribute
                    .clone()
                    .unwrap_or_else(|| format!("{}SK", index.name)),
            });
        }
        ok.then_some(out)
    }

    /// Parse, resolve and type-check one key template.
    #[allow(clippy::too_many_arguments)]
    fn key_template(
        &self,
        type_name: &str,
        what: &str,
        pattern: &str,
        names: &[&str],
        properties: Option<&[PropertyDescriptor]>,
        primary: bool,
        diags: &mut Diagnostics,
    ) -> Option<ResolvedTemplate> {
        if pattern.trim().is_empty() {
            diags.report(
                DiagnosticCode::MissingKeyTemplate,
                type_name,
                format!("{what} template of '{type_name}' is empty"),
            );
            return None;
        }
        let resolved = Template::parse(pattern).and_then(|t| t.resolve(names.iter().copied(), type_name));
        let resolved = match resolved {
            Ok(r) => r,
            Err(err @ TemplateError::PropertyNotFound { .. }) => {
                diags.report(DiagnosticCode::PropertyNotFound, type_name, err.to_string());
                return None;
            }
            Err(err) => {
                diags.report(DiagnosticCode::InvalidTemplate, type_name, err.to_string());
                return None;
            }
        };

        let mut ok = true;
        for index in resolved.property_indexes() {
            let Some(property) = properties.and_then(|p| p.get(index)) else {
                continue;
            };
            if !is_key_scalar(property.category.non_null()) {
                diags.report(
                    DiagnosticCode::NonScalarKeyProperty,
                    type_name,
                    format!(
                        "{what} '{pattern}' uses '{}' of type '{}', which cannot be rendered as key text",
                        property.name, property.type_expr
                    ),
                );
                ok = false;
            } else if primary && property.nullable {
                diags.report(
                    DiagnosticCode::NullableKeyProperty,
                    type_name,
                    format!(
                        "{what} '{pattern}' uses nullable '{}'; encoding fails when it is absent",
                        property.name
                    ),
                );
            }
        }
        ok.then_some(resolved)
    }

    fn check_hierarchy(&self, root: &ModelDefinition, diags: &mut Diagnostics) {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        let mut any = false;
        for variant in self.catalog.concrete_descendants(&root.name) {
            any = true;
            let Some(value) = variant.discriminator.as_deref() else {
                continue;
            };
            if let Some(first) = seen.insert(value, &variant.name) {
                diags.report(
                    DiagnosticCode::DuplicateDiscriminator,
                    &root.name,
                    format!(
                        "discriminator '{value}' is used by both '{first}' and '{}'",
                        variant.name
                    ),
                );
            }
        }
        if !any {
            diags.report(
                DiagnosticCode::EmptyHierarchy,
                &root.name,
                format!("abstract root '{}' has no concrete variants", root.name),
            );
        }
    }

    fn discriminator_attribute(&self, root: &'a ModelDefinition) -> &'a str {
        root.discriminator_attribute
            .as_deref()
            .unwrap_or(self.config.discriminator_attribute.as_str())
    }

    /// Names of model types referenced as nested property types anywhere.
    fn nested_type_names(&self) -> BTreeSet<String> {
        let classifier = TypeClassifier::new(self.catalog);
        let mut out = BTreeSet::new();
        for model in self.catalog.models() {
            for property in &model.properties {
                if let Ok(category) = classifier.classify_str(&property.type_expr) {
                    collect_nested(&category, &mut out);
                }
            }
        }
        out
    }
}

/// Merge the chain's property lists root-first. An override keeps the
/// inherited position and takes the derived definition.
fn merge_properties<'m>(chain: &[&'m ModelDefinition]) -> Vec<Candidate<'m>> {
    let mut out: Vec<Candidate<'m>> = Vec::new();
    for model in chain {
        for def in &model.properties {
            let candidate = Candidate {
                def,
                declared_in: model.name.as_str(),
            };
            match out.iter_mut().find(|c| c.def.name == def.name) {
                Some(slot) => *slot = candidate,
                None => out.push(candidate),
            }
        }
    }
    out
}

fn check_attributes(
    type_name: &str,
    properties: &[PropertyDescriptor],
    reserved: &BTreeSet<String>,
    diags: &mut Diagnostics,
) {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for property in properties {
        if property.ignore == IgnoreMode::Always {
            continue;
        }
        let attribute = property.attribute.as_str();
        if reserved.contains(attribute) {
            diags.report(
                DiagnosticCode::DuplicateAttribute,
                type_name,
                format!(
                    "property '{}' is stored as '{attribute}', which is a key or discriminator attribute",
                    property.name
                ),
            );
        } else if let Some(first) = seen.insert(attribute, &property.name) {
            diags.report(
                DiagnosticCode::DuplicateAttribute,
                type_name,
                format!(
                    "properties '{first}' and '{}' are both stored as '{attribute}'",
                    property.name
                ),
            );
        }
    }
}

fn report_classify_error(type_name: &str, property: &str, err: &ClassifyError, diags: &mut Diagnostics) {
    let code = match err {
        ClassifyError::UnknownType { .. } => DiagnosticCode::UnknownType,
        _ => DiagnosticCode::UnsupportedType,
    };
    diags.report(code, type_name, format!("property '{property}': {err}"));
}

/// Whether a value of this category renders as key text.
fn is_key_scalar(category: &Category) -> bool {
    match category {
        Category::Scalar(ScalarKind::Bytes) => false,
        c => c.is_leaf(),
    }
}

fn collect_nested(category: &Category, out: &mut BTreeSet<String>) {
    match category {
        Category::Nested(name) => {
            out.insert(name.clone());
        }
        Category::Nullable(inner) => collect_nested(inner, out),
        Category::Collection { element, .. } => collect_nested(element, out),
        Category::Dictionary { value, .. } => collect_nested(value, out),
        Category::Scalar(_) | Category::Enum(_) | Category::Timestamp(_) => {}
    }
}
