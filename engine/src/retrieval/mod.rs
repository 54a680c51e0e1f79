//! Retrieval-Augmented Generation
//!
//! Documents are split into overlapping character chunks, embedded, and
//! stored in a vector index persisted under `retrieval.index_dir`. Agents
//! reach the index through the `search_documents` tool.

pub mod chunker;
pub mod engine;
pub mod index;
pub mod tool;

pub use chunker::Chunker;
pub use engine::{IngestReport, RetrievalEngine, PLACEHOLDER_TEXT};
pub use index::{content_hash, cosine_similarity, Document, Metadata, RetrievalIndex, SearchHit, VectorDocument};
pub use tool::{RetrievalTool, SEARCH_TOOL_NAME};
