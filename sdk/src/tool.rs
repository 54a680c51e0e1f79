//! Tool trait
//!
//! Tools are the callable capabilities an agent carries. The agent advertises
//! them in its prompt and dispatches a tool call whenever the model asks for
//! one; the rendered [`ToolOutput`] is fed back as an observation.

use crate::types::{ToolError, ToolInput, ToolOutput};
use async_trait::async_trait;

/// Trait that all agent tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the name the model uses to call the tool
    fn name(&self) -> &str;

    /// One-line description advertised in the agent prompt
    fn description(&self) -> &str;

    /// Example arguments object shown next to the description
    fn arguments_hint(&self) -> &str {
        "{}"
    }

    /// Handle a tool invocation
    async fn call(&self, input: ToolInput) -> Result<ToolOutput, ToolError>;
}
