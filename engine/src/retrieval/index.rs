//! Retrieval Index
//!
//! In-memory vector index and its on-disk form. An index is immutable once
//! built; ingestion derives a new index from the current one and the engine
//! publishes it as a whole.
//!
//! On disk the index is `<index_dir>/index.json`:
//!
//! ```json
//! { "version": 1, "dimension": 768, "embedding_model": "...", "documents": [...] }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current on-disk format version
pub const INDEX_VERSION: u32 = 1;

/// File name of the serialized index inside the index directory
pub const INDEX_FILE: &str = "index.json";

/// Metadata attached to a document or chunk
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A document submitted for ingestion
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub text: String,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// A stored, embedded chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDocument {
    pub text: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub embedding: Vec<f32>,

    /// Hex SHA-256 of the text and canonical metadata
    pub content_hash: String,
}

impl VectorDocument {
    pub fn new(text: String, metadata: Metadata, embedding: Vec<f32>) -> Self {
        let content_hash = content_hash(&text, &metadata);
        Self {
            text,
            metadata,
            embedding,
            content_hash,
        }
    }

    /// True when every filter key is present with an equal value
    pub fn matches(&self, filter: &Metadata) -> bool {
        filter
            .iter()
            .all(|(key, value)| self.metadata.get(key) == Some(value))
    }
}

/// A search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Content hash used for deduplication.
///
/// Metadata is a `BTreeMap`, so its JSON form has sorted keys and the hash
/// does not depend on insertion order.
pub fn content_hash(text: &str, metadata: &Metadata) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update([0u8]);
    hasher.update(serde_json::to_string(metadata).unwrap_or_default().as_bytes());
    hex::encode(hasher.finalize())
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Vector index over embedded chunks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalIndex {
    pub version: u32,
    pub dimension: usize,
    pub embedding_model: String,
    documents: Vec<VectorDocument>,

    #[serde(skip)]
    hashes: HashSet<String>,
}

impl RetrievalIndex {
    pub fn new(dimension: usize, embedding_model: impl Into<String>) -> Self {
        Self {
            version: INDEX_VERSION,
            dimension,
            embedding_model: embedding_model.into(),
            documents: Vec::new(),
            hashes: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[VectorDocument] {
        &self.documents
    }

    pub fn contains_hash(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    /// Derive a new index holding every current document plus `additions`.
    ///
    /// Additions whose content hash is already present (in the index or
    /// earlier in `additions`) are skipped. Returns the new index and the
    /// number of skipped duplicates. Fails without building anything when an
    /// addition has the wrong dimension.
    pub fn merged(&self, additions: Vec<VectorDocument>) -> Result<(Self, usize), EngineError> {
        if let Some(bad) = additions.iter().find(|d| d.embedding.len() != self.dimension) {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.embedding.len(),
            });
        }

        let mut next = self.clone();
        let mut duplicates = 0;
        for doc in additions {
            if next.hashes.insert(doc.content_hash.clone()) {
                next.documents.push(doc);
            } else {
                duplicates += 1;
            }
        }
        Ok((next, duplicates))
    }

    /// Up to `k` documents matching `filter`, by descending similarity.
    ///
    /// Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], k: usize, filter: Option<&Metadata>) -> Vec<SearchHit> {
        let mut scored: Vec<(f32, &VectorDocument)> = self
            .documents
            .iter()
            .filter(|doc| filter.map_or(true, |f| doc.matches(f)))
            .map(|doc| (cosine_similarity(query, &doc.embedding), doc))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(score, doc)| SearchHit {
                text: doc.text.clone(),
                metadata: doc.metadata.clone(),
                score,
            })
            .collect()
    }

    /// Path of the index file inside `dir`
    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE)
    }

    /// Write the index to `dir`, creating it if needed.
    ///
    /// The file is written next to its final location and renamed into
    /// place, so a reader never sees a partial file.
    pub fn save(&self, dir: &Path) -> Result<(), EngineError> {
        fs::create_dir_all(dir)?;

        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| EngineError::Serialization(e.to_string()))?;

        let target = Self::file_path(dir);
        let tmp = dir.join(format!("{}.tmp", INDEX_FILE));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    /// Read the index stored in `dir`.
    ///
    /// Returns `Ok(None)` when the directory does not exist.
    pub fn load(dir: &Path) -> Result<Option<Self>, EngineError> {
        if !dir.exists() {
            return Ok(None);
        }

        let path = Self::file_path(dir);
        let bytes = fs::read(&path).map_err(|e| {
            EngineError::Serialization(format!(
                "index directory {} exists but {} is unreadable: {}",
                dir.display(),
                INDEX_FILE,
                e
            ))
        })?;

        let mut index: Self = serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::Serialization(format!("{}: {}", path.display(), e)))?;

        if index.version != INDEX_VERSION {
            return Err(EngineError::Serialization(format!(
                "unsupported index version {} (expected {})",
                index.version, INDEX_VERSION
            )));
        }

        index.hashes = index
            .documents
            .iter()
            .map(|d| d.content_hash.clone())
            .collect();
        Ok(Some(index))
    }
}
