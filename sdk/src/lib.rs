//! Fleet SDK
//!
//! Shared library providing the error taxonomy, the tool trait, and tool
//! input/output types. Used by the engine and by anything that plugs tools
//! into an agent.

/// Error types and handling
pub mod errors;

/// Agent tool trait
pub mod tool;

/// Tool input/output types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, FleetErrorExt, ObjectKind};
pub use tool::Tool;
pub use types::{ToolError, ToolInput, ToolOutput};
