//! Retrieval Engine
//!
//! Owns the persisted index. Ingestion is the only writer and is serialized
//! by an async mutex; the index itself is published as an `Arc` snapshot
//! swapped under a short write lock, so searches run against either the
//! pre-ingest or the post-ingest index.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use sdk::errors::EngineError;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::chunker::Chunker;
use super::index::{Document, Metadata, RetrievalIndex, SearchHit, VectorDocument};
use super::tool::RetrievalTool;
use crate::config::RetrievalConfig;
use crate::llm::EmbeddingHandle;

/// Text of the entry seeded into a freshly created index
pub const PLACEHOLDER_TEXT: &str = "Welcome to the autonomous agent system.";

/// Outcome of an ingestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Documents submitted
    pub documents: usize,

    /// Chunks produced from them
    pub chunks: usize,

    /// Chunks added to the index
    pub added: usize,

    /// Chunks skipped because an identical chunk was already indexed
    pub duplicates: usize,
}

/// Similarity search over ingested documents
pub struct RetrievalEngine {
    index_dir: PathBuf,
    chunker: Chunker,
    default_k: usize,
    dimension: usize,
    embedder: EmbeddingHandle,
    index: RwLock<Option<Arc<RetrievalIndex>>>,
    writer: Mutex<()>,
}

impl RetrievalEngine {
    /// Create an engine with no index loaded yet
    pub fn new(config: &RetrievalConfig, embedder: EmbeddingHandle) -> Self {
        Self {
            index_dir: config.index_dir.clone(),
            chunker: Chunker::new(config.chunk_size, config.chunk_overlap),
            default_k: config.default_k,
            dimension: config.embedding_dim,
            embedder,
            index: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    fn snapshot(&self) -> Option<Arc<RetrievalIndex>> {
        self.index
            .read()
            .expect("RetrievalEngine lock poisoned")
            .clone()
    }

    fn publish(&self, index: RetrievalIndex) {
        *self.index.write().expect("RetrievalEngine lock poisoned") = Some(Arc::new(index));
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Number of stored chunks; 0 when uninitialized
    pub fn len(&self) -> usize {
        self.snapshot().map_or(0, |index| index.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the index from the index directory.
    ///
    /// A missing directory yields a fresh index seeded with a placeholder
    /// entry, persisted immediately.
    pub async fn load(&self) -> Result<(), EngineError> {
        let _guard = self.writer.lock().await;
        self.load_locked()
            .await
            .inspect_err(|e| warn!(key = %e.log_key(), error = %e, "Retrieval index load failed"))
    }

    async fn load_locked(&self) -> Result<(), EngineError> {
        match RetrievalIndex::load(&self.index_dir)? {
            Some(index) => {
                if index.dimension != self.dimension {
                    return Err(EngineError::DimensionMismatch {
                        expected: self.dimension,
                        actual: index.dimension,
                    });
                }
                info!(
                    path = %self.index_dir.display(),
                    documents = index.len(),
                    "Retrieval index loaded"
                );
                self.publish(index);
            }
            None => {
                let embedding = self.embed_checked(PLACEHOLDER_TEXT).await?;
                let seed = VectorDocument::new(PLACEHOLDER_TEXT.to_string(), Metadata::new(), embedding);
                let (index, _) =
                    RetrievalIndex::new(self.dimension, self.embedder.id()).merged(vec![seed])?;
                index.save(&self.index_dir)?;
                info!(path = %self.index_dir.display(), "New retrieval index created");
                self.publish(index);
            }
        }
        Ok(())
    }

    async fn embed_checked(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        let embedding = self.embedder.embed(text).await?;
        if embedding.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }

    /// Chunk, embed and merge `documents` into the index, then persist it.
    ///
    /// An empty batch changes nothing and writes nothing. Any failure leaves
    /// the published index and the stored file untouched.
    pub async fn ingest(&self, documents: Vec<Document>) -> Result<IngestReport, EngineError> {
        if documents.is_empty() {
            debug!("Ingest called with no documents");
            return Ok(IngestReport::default());
        }

        let _guard = self.writer.lock().await;
        self.ingest_locked(documents)
            .await
            .inspect_err(|e| warn!(key = %e.log_key(), error = %e, "Ingest failed, index unchanged"))
    }

    async fn ingest_locked(&self, documents: Vec<Document>) -> Result<IngestReport, EngineError> {
        if !self.is_initialized() {
            self.load_locked().await?;
        }

        let mut report = IngestReport {
            documents: documents.len(),
            ..IngestReport::default()
        };

        let mut additions = Vec::new();
        for document in &documents {
            for chunk in self.chunker.chunk(&document.text) {
                let embedding = self.embed_checked(&chunk).await?;
                additions.push(VectorDocument::new(chunk, document.metadata.clone(), embedding));
            }
        }
        report.chunks = additions.len();

        let current = self
            .snapshot()
            .ok_or_else(|| EngineError::Config("retrieval index failed to initialize".to_string()))?;
        let (next, duplicates) = current.merged(additions)?;
        report.duplicates = duplicates;
        report.added = report.chunks - duplicates;

        next.save(&self.index_dir)?;
        self.publish(next);

        info!(
            documents = report.documents,
            chunks = report.chunks,
            added = report.added,
            duplicates = report.duplicates,
            "Documents ingested"
        );
        Ok(report)
    }

    /// Up to `k` (default `retrieval.default_k`) hits by descending similarity.
    ///
    /// Never fails: an uninitialized index or a failed query embedding
    /// yields no hits.
    pub async fn search(
        &self,
        query: &str,
        k: Option<usize>,
        filter: Option<&Metadata>,
    ) -> Vec<SearchHit> {
        let Some(index) = self.snapshot() else {
            warn!("Search on uninitialized retrieval index");
            return Vec::new();
        };

        let embedding = match self.embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(error = %e, "Failed to embed search query");
                return Vec::new();
            }
        };

        if embedding.len() != index.dimension {
            warn!(
                expected = index.dimension,
                actual = embedding.len(),
                "Query embedding dimension mismatch"
            );
            return Vec::new();
        }

        let hits = index.search(&embedding, k.unwrap_or(self.default_k), filter);
        debug!(results = hits.len(), "Retrieval search complete");
        hits
    }

    /// Write the current index to the index directory
    pub async fn persist(&self) -> Result<(), EngineError> {
        let _guard = self.writer.lock().await;
        match self.snapshot() {
            Some(index) => index.save(&self.index_dir),
            None => {
                debug!("Persist skipped, retrieval index not initialized");
                Ok(())
            }
        }
    }

    /// Tool exposing search to agents
    pub fn as_tool(self: &Arc<Self>) -> RetrievalTool {
        RetrievalTool::new(Arc::clone(self))
    }
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("index_dir", &self.index_dir)
            .field("dimension", &self.dimension)
            .field("documents", &self.len())
            .finish()
    }
}
