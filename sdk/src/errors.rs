//! Error types and handling
//!
//! This module provides the error taxonomy shared by every Fleet component.
//! All errors implement the `FleetErrorExt` trait which provides user-facing
//! hints and indicates whether errors are recoverable.
//!
//! # Propagation
//!
//! - Registry lookups and creation-time validation return these errors
//!   immediately to the caller.
//! - Agent invocation failures inside a crew run never surface here; they are
//!   folded into the run's failure text instead.
//! - Retrieval search failures degrade to an empty result.

use std::fmt;
use thiserror::Error;

/// Trait for Fleet error extensions
pub trait FleetErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or fixed by the caller without
    /// rebuilding the engine.
    fn is_recoverable(&self) -> bool;
}

/// Kind of registry object an error refers to.
///
/// Together with the object identifier this forms the stable key used when
/// logging failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Agent,
    Task,
    Crew,
    Model,
    Tool,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Agent => "agent",
            ObjectKind::Task => "task",
            ObjectKind::Crew => "crew",
            ObjectKind::Model => "model",
            ObjectKind::Tool => "tool",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main engine error type
///
/// # Error Categories
///
/// - **NotFound**: unknown agent, task, crew or tool identifier
/// - **Config**: bad or missing static configuration, unknown model id
/// - **Provider**: language model or embedding backend failure
/// - **DimensionMismatch**: embedding shape differs from the index
/// - **EmptyCrew**: a crew resolved to zero tasks
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, FleetErrorExt, ObjectKind};
///
/// let error = EngineError::not_found(ObjectKind::Agent, "researcher");
/// assert_eq!(error.to_string(), "agent not found: researcher");
/// assert!(error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ObjectKind, id: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Crew {0} has no resolvable tasks")]
    EmptyCrew(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Shorthand for [`EngineError::NotFound`]
    pub fn not_found(kind: ObjectKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable log key for the error (`kind:id` for lookups, variant name otherwise)
    pub fn log_key(&self) -> String {
        match self {
            Self::NotFound { kind, id } => format!("{}:{}", kind, id),
            Self::Config(_) => "config".to_string(),
            Self::Provider(_) => "provider".to_string(),
            Self::DimensionMismatch { .. } => "retrieval:dimension".to_string(),
            Self::EmptyCrew(id) => format!("crew:{}", id),
            Self::Tool(_) => "tool".to_string(),
            Self::Serialization(_) => "serialization".to_string(),
            Self::Io(_) => "io".to_string(),
        }
    }
}

impl FleetErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::NotFound { kind, .. } => match kind {
                ObjectKind::Agent => "Register the agent before referencing it",
                ObjectKind::Task => "Register the task before adding it to a crew",
                ObjectKind::Crew => "Create the crew before running it",
                ObjectKind::Model => "Add the model to the [models] table in config.toml",
                ObjectKind::Tool => "The requested tool is not attached to this agent",
            },
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Provider(_) => "Model backend unavailable. Check credentials and network",
            Self::DimensionMismatch { .. } => {
                "Embedding model does not match the index. Rebuild the index or fix embedding_dim"
            }
            Self::EmptyCrew(_) => "A crew needs at least one registered task",
            Self::Tool(_) => "Tool operation failed",
            Self::Serialization(_) => "Stored data could not be read. The index may be corrupted",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Require a config or data fix before anything can succeed
            Self::Config(_) | Self::DimensionMismatch { .. } | Self::Serialization(_) => false,

            _ => true,
        }
    }
}
