//! Agent Tool Sets
//!
//! An agent carries an ordered set of [`Tool`]s. The set renders the tool
//! section of the agent prompt and dispatches the tool calls the model asks
//! for. Dispatch never fails: errors come back as `ERROR: ...` observations so
//! the model can see them and correct itself.

use std::sync::Arc;

use sdk::{Tool, ToolInput};
use tracing::{debug, warn};

/// Ordered, name-unique collection of tools
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tool. A tool with the same name is replaced in place.
    pub fn push(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(pos) => self.tools[pos] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Names of the tools, in attachment order
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Dispatch a tool call by name and render its observation.
    pub async fn dispatch(&self, name: &str, arguments: &str) -> String {
        debug!(tool = %name, arguments = %arguments, "Dispatching tool");

        let Some(tool) = self.get(name) else {
            warn!(tool = %name, "Unknown tool requested");
            return format!(
                "ERROR: Unknown tool '{}'. Available tools: {}",
                name,
                self.names().join(", ")
            );
        };

        match tool.call(ToolInput::from_arguments(arguments)).await {
            Ok(output) => output.render(),
            Err(e) => format!("ERROR: {}", e),
        }
    }

    /// Prompt section describing the tools and the call format.
    ///
    /// Empty when the set is empty.
    pub fn prompt_section(&self) -> String {
        if self.tools.is_empty() {
            return String::new();
        }

        let mut parts = vec![
            "To call a tool, respond with ONLY a JSON object of this form:".to_string(),
            r#"{"function": "tool_name", "arguments": {"arg1": "value1"}}"#.to_string(),
            "When you have the final answer, respond with plain text only.".to_string(),
            String::new(),
            "Available tools:".to_string(),
        ];

        for tool in &self.tools {
            parts.push(String::new());
            parts.push(format!("## {}", tool.name()));
            parts.push(tool.description().to_string());
            parts.push(format!("Arguments: {}", tool.arguments_hint()));
        }

        parts.join("\n")
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tools.iter().map(|t| t.name())).finish()
    }
}
