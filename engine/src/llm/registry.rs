//! Model Provider Registry
//!
//! Resolves model identifiers from the static model table to shared,
//! immutable handles. A handle is built once per identifier through the
//! injected [`ModelFactory`] and cached for the lifetime of the registry, so
//! every agent bound to `gpt-4` talks to the same backend instance.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use sdk::errors::EngineError;
use tracing::{debug, info, warn};

use super::{CompletionOptions, Embedder, LanguageModel, Result as ProviderResult};
use crate::config::{ModelSpec, RetrievalConfig};

/// Builds backends for the registry.
///
/// Construction is synchronous; a backend that needs to connect should do so
/// lazily on its first call.
pub trait ModelFactory: Send + Sync {
    /// Build the language model backing `model_id`
    fn build_model(&self, model_id: &str, spec: &ModelSpec)
        -> ProviderResult<Box<dyn LanguageModel>>;

    /// Build the embedding model `model_id` producing `dimension`-length vectors
    fn build_embedder(&self, model_id: &str, dimension: usize)
        -> ProviderResult<Box<dyn Embedder>>;
}

/// A resolved language model together with its table entry
pub struct ResolvedModel {
    id: String,
    spec: ModelSpec,
    backend: Box<dyn LanguageModel>,
}

impl ResolvedModel {
    /// Identifier in the model table
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Generation options fixed by the model table
    pub fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.spec.temperature,
            max_tokens: self.spec.max_tokens,
        }
    }

    /// Complete a prompt with the table's options
    pub async fn complete(&self, prompt: &str) -> ProviderResult<String> {
        self.backend.complete(prompt, &self.options()).await
    }
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("id", &self.id)
            .field("kind", &self.spec.kind)
            .field("backend", &self.backend.name())
            .finish()
    }
}

/// A resolved embedding model
pub struct ResolvedEmbedder {
    id: String,
    backend: Box<dyn Embedder>,
}

impl ResolvedEmbedder {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    pub async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        self.backend.embed(text).await
    }
}

impl std::fmt::Debug for ResolvedEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedEmbedder")
            .field("id", &self.id)
            .field("dimension", &self.backend.dimension())
            .finish()
    }
}

/// Shared language model handle
pub type ModelHandle = Arc<ResolvedModel>;

/// Shared embedding model handle
pub type EmbeddingHandle = Arc<ResolvedEmbedder>;

/// Cache of model handles keyed by identifier
pub struct ModelRegistry {
    table: BTreeMap<String, ModelSpec>,
    embedding_model: String,
    embedding_dim: usize,
    factory: Arc<dyn ModelFactory>,
    models: RwLock<HashMap<String, ModelHandle>>,
    embedders: RwLock<HashMap<String, EmbeddingHandle>>,
}

impl ModelRegistry {
    /// Create a registry over the given model table
    ///
    /// # Arguments
    /// * `table` - Known models (id → spec)
    /// * `retrieval` - Supplies the default embedding model and its dimension
    /// * `factory` - Builds backends on cache misses
    pub fn new(
        table: BTreeMap<String, ModelSpec>,
        retrieval: &RetrievalConfig,
        factory: Arc<dyn ModelFactory>,
    ) -> Self {
        Self {
            table,
            embedding_model: retrieval.embedding_model.clone(),
            embedding_dim: retrieval.embedding_dim,
            factory,
            models: RwLock::new(HashMap::new()),
            embedders: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a language model, building it on first use.
    ///
    /// Fails with `Config` when `model_id` is not in the table and with
    /// `Provider` when the backend cannot be built.
    pub fn resolve(&self, model_id: &str) -> Result<ModelHandle, EngineError> {
        {
            let cache = self.models.read().expect("ModelRegistry lock poisoned");
            if let Some(handle) = cache.get(model_id) {
                return Ok(Arc::clone(handle));
            }
        }

        let spec = self.table.get(model_id).ok_or_else(|| {
            EngineError::Config(format!(
                "unknown model '{}' (known models: {})",
                model_id,
                self.table.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })?;

        let backend = self.factory.build_model(model_id, spec).map_err(|e| {
            warn!(model_id = %model_id, error = %e, "Failed to build model backend");
            EngineError::from(e)
        })?;

        let built = Arc::new(ResolvedModel {
            id: model_id.to_string(),
            spec: spec.clone(),
            backend,
        });

        // A racing resolver may have inserted first; keep its handle.
        let mut cache = self.models.write().expect("ModelRegistry lock poisoned");
        let handle = cache
            .entry(model_id.to_string())
            .or_insert_with(|| {
                debug!(model_id = %model_id, kind = %spec.kind, "Model handle cached");
                built
            });
        Ok(Arc::clone(handle))
    }

    /// Resolve an embedding model; `None` means the configured default.
    pub fn resolve_embedding(&self, model_id: Option<&str>) -> Result<EmbeddingHandle, EngineError> {
        let model_id = model_id.unwrap_or(&self.embedding_model);

        {
            let cache = self.embedders.read().expect("ModelRegistry lock poisoned");
            if let Some(handle) = cache.get(model_id) {
                return Ok(Arc::clone(handle));
            }
        }

        if model_id.trim().is_empty() {
            return Err(EngineError::Config(
                "embedding model identifier is empty".to_string(),
            ));
        }

        let backend = self
            .factory
            .build_embedder(model_id, self.embedding_dim)
            .map_err(|e| {
                warn!(model_id = %model_id, error = %e, "Failed to build embedding backend");
                EngineError::from(e)
            })?;

        let built = Arc::new(ResolvedEmbedder {
            id: model_id.to_string(),
            backend,
        });

        let mut cache = self.embedders.write().expect("ModelRegistry lock poisoned");
        let handle = cache.entry(model_id.to_string()).or_insert(built);
        Ok(Arc::clone(handle))
    }

    /// The static model table
    pub fn available_models(&self) -> &BTreeMap<String, ModelSpec> {
        &self.table
    }

    /// Eagerly resolve every model in the table.
    ///
    /// Failures are logged, not returned. Returns the number of models that
    /// resolved.
    pub fn warm_up(&self) -> usize {
        let mut resolved = 0;
        for model_id in self.table.keys() {
            match self.resolve(model_id) {
                Ok(_) => resolved += 1,
                Err(e) => warn!(model_id = %model_id, error = %e, "Model warm-up failed"),
            }
        }
        info!(resolved, total = self.table.len(), "Model warm-up complete");
        resolved
    }

    /// Number of cached language model handles
    pub fn cached(&self) -> usize {
        self.models.read().expect("ModelRegistry lock poisoned").len()
    }

    /// Drop every cached handle. Outstanding handles stay valid.
    pub fn reset(&self) {
        self.models
            .write()
            .expect("ModelRegistry lock poisoned")
            .clear();
        self.embedders
            .write()
            .expect("ModelRegistry lock poisoned")
            .clear();
        debug!("Model registry reset");
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.table.keys().collect::<Vec<_>>())
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dim", &self.embedding_dim)
            .finish()
    }
}
