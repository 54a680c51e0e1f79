//! Offline Backends
//!
//! Deterministic backends that need no network access. `EchoModel` answers
//! with the final line of its prompt; `HashEmbedder` maps text onto a fixed
//! number of buckets by hashing its tokens. Both are what the CLI runs on out
//! of the box and what tests build on.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{CompletionOptions, Embedder, LanguageModel, ModelFactory, ProviderError, Result};
use crate::config::{ModelKind, ModelSpec};

/// Deterministic language model.
///
/// The completion is the last non-empty line of the prompt, prefixed with
/// the model name and cut to roughly `max_tokens` words.
#[derive(Debug, Clone)]
pub struct EchoModel {
    name: String,
    local: bool,
}

impl EchoModel {
    pub fn new(name: impl Into<String>, local: bool) -> Self {
        Self {
            name: name.into(),
            local,
        }
    }
}

#[async_trait]
impl LanguageModel for EchoModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_local(&self) -> bool {
        self.local
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        let last_line = prompt
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("empty prompt".to_string()))?;

        let words: Vec<&str> = last_line
            .split_whitespace()
            .take(options.max_tokens as usize)
            .collect();

        Ok(format!("[{}] {}", self.name, words.join(" ")))
    }
}

/// Feature-hashing embedder.
///
/// Every lowercase alphanumeric token is hashed with SHA-256; the first
/// eight bytes pick a bucket and the ninth picks the sign. The result is
/// L2-normalised, so cosine similarity reduces to token overlap.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    name: String,
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

/// Factory producing the offline backends for every entry of the model table.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFactory;

impl ModelFactory for OfflineFactory {
    fn build_model(&self, model_id: &str, spec: &ModelSpec) -> Result<Box<dyn LanguageModel>> {
        if spec.name.trim().is_empty() {
            return Err(ProviderError::Construction(format!(
                "model '{}' has no backend name",
                model_id
            )));
        }
        Ok(Box::new(EchoModel::new(
            spec.name.clone(),
            spec.kind == ModelKind::Local,
        )))
    }

    fn build_embedder(&self, model_id: &str, dimension: usize) -> Result<Box<dyn Embedder>> {
        if dimension == 0 {
            return Err(ProviderError::Construction(format!(
                "embedding model '{}' needs a non-zero dimension",
                model_id
            )));
        }
        Ok(Box::new(HashEmbedder::new(model_id, dimension)))
    }
}
