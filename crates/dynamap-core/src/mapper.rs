//! Typed entry point.
//!
//! [`Mapper`] compiles a codec the first time a Rust type is used and keeps
//! it for the life of the mapper. Codecs are immutable and shared behind
//! `Arc`, so a mapper can be used from any number of threads.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use dynamap_model::{Item, KeyContext};

use crate::codec::{ItemCodec, Variant, VariantRegistry};
use crate::config::CodecConfig;
use crate::error::{CodecError, DecodeError, EncodeError, SchemaError};
use crate::schema::SchemaAnalyzer;
use crate::schema::definition::TypeCatalog;
use crate::types::HandlerRegistry;

/// A model type that can be stored as an item.
///
/// `describe` registers the model's definition and every type it refers to
/// (parents, nested objects, enums) into the catalog.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the model's definition in the catalog.
    const TYPE_NAME: &'static str;

    /// Register this model's schema.
    fn describe(catalog: &mut TypeCatalog);
}

/// A closed set of variants sharing one abstract root.
pub trait Polymorphic: Sized + Send + Sync + 'static {
    /// Name of the abstract root's definition.
    const ROOT: &'static str;

    /// Register the root (variants register themselves).
    fn describe(catalog: &mut TypeCatalog);

    /// Every variant, with its wrap and projection functions.
    fn variants() -> Vec<Variant<Self>>;
}

/// Batch decoding over any per-record decoder.
pub trait RecordDecoder {
    /// Decoded value type.
    type Output;

    /// Decode one item, deriving its key context from the item.
    fn decode_record(&self, item: &Item) -> Result<Self::Output, DecodeError>;

    /// One result per item; never fails as a whole.
    fn decode_all<'i, I>(&self, items: I) -> Vec<Result<Self::Output, DecodeError>>
    where
        I: IntoIterator<Item = &'i Item>,
    {
        items.into_iter().map(|item| self.decode_record(item)).collect()
    }

    /// Every decodable item; failures are logged and skipped.
    fn decode_lenient<'i, I>(&self, items: I) -> Vec<Self::Output>
    where
        I: IntoIterator<Item = &'i Item>,
    {
        items
            .into_iter()
            .filter_map(|item| match self.decode_record(item) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(key = %err.key(), error = %err, "skipping undecodable record");
                    None
                }
            })
            .collect()
    }

    /// Every item, or the first failure.
    fn decode_many<'i, I>(&self, items: I) -> Result<Vec<Self::Output>, DecodeError>
    where
        I: IntoIterator<Item = &'i Item>,
    {
        items.into_iter().map(|item| self.decode_record(item)).collect()
    }
}

/// Typed handle over a compiled [`ItemCodec`].
#[derive(Debug)]
pub struct TypedCodec<T> {
    inner: ItemCodec,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> TypedCodec<T> {
    /// Wrap a compiled codec.
    #[must_use]
    pub fn new(inner: ItemCodec) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// The untyped codec.
    #[must_use]
    pub fn item_codec(&self) -> &ItemCodec {
        &self.inner
    }

    /// Encode a model.
    pub fn encode(&self, model: &T) -> Result<Item, EncodeError> {
        self.inner.encode_model(model)
    }

    /// Decode a model whose key is already known.
    pub fn decode(&self, item: &Item, key: &KeyContext) -> Result<T, DecodeError> {
        self.inner.decode_model(item, key)
    }

    /// Decode a model, reading its key from the item.
    pub fn decode_item(&self, item: &Item) -> Result<T, DecodeError> {
        let key = self.inner.key_context(item);
        self.decode(item, &key)
    }
}

impl<T: Entity> RecordDecoder for TypedCodec<T> {
    type Output = T;

    fn decode_record(&self, item: &Item) -> Result<T, DecodeError> {
        self.decode_item(item)
    }
}

impl<P: 'static> RecordDecoder for VariantRegistry<P> {
    type Output = P;

    fn decode_record(&self, item: &Item) -> Result<P, DecodeError> {
        self.decode_item(item)
    }
}

/// Codec cache and typed encode/decode surface.
#[derive(Debug)]
pub struct Mapper {
    config: CodecConfig,
    registry: Arc<HandlerRegistry>,
    codecs: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new(CodecConfig::default())
    }
}

impl Mapper {
    /// Mapper with the built-in handlers.
    #[must_use]
    pub fn new(config: CodecConfig) -> Self {
        Self::with_registry(config, HandlerRegistry::default())
    }

    /// Mapper with a custom handler registry.
    #[must_use]
    pub fn with_registry(config: CodecConfig, registry: HandlerRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            codecs: DashMap::new(),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Handler registry shared by every codec.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// The codec for `T`, compiling it on first use.
    pub fn codec<T: Entity>(&self) -> Result<Arc<TypedCodec<T>>, SchemaError> {
        if let Some(codec) = self.cached::<TypedCodec<T>>() {
            trace!(type_name = T::TYPE_NAME, "codec cache hit");
            return Ok(codec);
        }

        let mut catalog = TypeCatalog::new();
        T::describe(&mut catalog);
        let descriptor = SchemaAnalyzer::new(&catalog, &self.config).analyze(T::TYPE_NAME)?;
        let codec = ItemCodec::build(Arc::new(descriptor), &catalog, &self.registry)?;
        debug!(type_name = T::TYPE_NAME, "compiled codec");
        Ok(self.store(Arc::new(TypedCodec::<T>::new(codec))))
    }

    /// The codec for polymorphic `P`, compiling it on first use.
    pub fn polymorphic<P: Polymorphic>(&self) -> Result<Arc<VariantRegistry<P>>, SchemaError> {
        if let Some(codec) = self.cached::<VariantRegistry<P>>() {
            trace!(root = P::ROOT, "codec cache hit");
            return Ok(codec);
        }

        let variants = P::variants();
        let mut catalog = TypeCatalog::new();
        P::describe(&mut catalog);
        for variant in &variants {
            variant.describe(&mut catalog);
        }
        let descriptor = SchemaAnalyzer::new(&catalog, &self.config).analyze_root(P::ROOT)?;
        let codec = VariantRegistry::build(&descriptor, variants, &catalog, &self.registry)?;
        debug!(root = P::ROOT, variants = descriptor.variants.len(), "compiled polymorphic codec");
        Ok(self.store(Arc::new(codec)))
    }

    /// Encode a model.
    pub fn encode<T: Entity>(&self, model: &T) -> Result<Item, CodecError> {
        Ok(self.codec::<T>()?.encode(model)?)
    }

    /// Decode a model whose key is already known.
    pub fn decode<T: Entity>(&self, item: &Item, key: &KeyContext) -> Result<T, CodecError> {
        Ok(self.codec::<T>()?.decode(item, key)?)
    }

    /// Decode a model, reading its key from the item.
    pub fn decode_item<T: Entity>(&self, item: &Item) -> Result<T, CodecError> {
        Ok(self.codec::<T>()?.decode_item(item)?)
    }

    /// Decode every item; one result per item.
    pub fn decode_all<T: Entity>(
        &self,
        items: &[Item],
    ) -> Result<Vec<Result<T, DecodeError>>, SchemaError> {
        Ok(self.codec::<T>()?.decode_all(items))
    }

    /// Decode every item, skipping (and logging) the ones that fail.
    pub fn decode_lenient<T: Entity>(&self, items: &[Item]) -> Result<Vec<T>, SchemaError> {
        Ok(self.codec::<T>()?.decode_lenient(items))
    }

    /// Decode every item, stopping at the first failure.
    pub fn decode_many<T: Entity>(&self, items: &[Item]) -> Result<Vec<T>, CodecError> {
        Ok(self.codec::<T>()?.decode_many(items)?)
    }

    /// Encode a polymorphic value with its variant's codec.
    pub fn encode_variant<P: Polymorphic>(&self, value: &P) -> Result<Item, CodecError> {
        Ok(self.polymorphic::<P>()?.encode(value)?)
    }

    /// Decode a polymorphic value by its discriminator.
    pub fn decode_variant<P: Polymorphic>(&self, item: &Item) -> Result<P, CodecError> {
        Ok(self.polymorphic::<P>()?.decode_item(item)?)
    }

    fn cached<C: Any + Send + Sync>(&self) -> Option<Arc<C>> {
        let entry = self.codecs.get(&TypeId::of::<C>())?;
        Arc::clone(entry.value()).downcast::<C>().ok()
    }

    /// Insert a freshly built codec. Under a race the first insert wins and
    /// every caller gets that one.
    fn store<C: Any + Send + Sync>(&self, codec: Arc<C>) -> Arc<C> {
        let entry = self
            .codecs
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Arc::clone(&codec) as Arc<dyn Any + Send + Sync>);
        Arc::clone(entry.value()).downcast::<C>().unwrap_or(codec)
    }
}
