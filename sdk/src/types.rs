//! Tool input/output types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Input to a tool call, as parsed from a model completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    pub params: HashMap<String, serde_json::Value>,
}

impl ToolInput {
    /// Create an empty ToolInput
    pub fn new() -> Self {
        Self::default()
    }

    /// Build input from a JSON arguments payload.
    ///
    /// Objects become named parameters. Any other value (a bare string the
    /// model produced instead of an object) is stored under `input`.
    pub fn from_arguments(arguments: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(arguments) {
            Ok(serde_json::Value::Object(map)) => Self {
                params: map.into_iter().collect(),
            },
            Ok(other) => Self::new().with_param("input", other),
            Err(_) => Self::new().with_param("input", serde_json::json!(arguments.trim())),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Get a string parameter
    pub fn param_str(&self, key: &str) -> Result<String, ToolError> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get an optional string parameter
    pub fn param_str_opt(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
    }

    /// Get an optional unsigned parameter
    pub fn param_u64_opt(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(|v| v.as_u64())
    }

    /// Get a parameter as a JSON value
    pub fn param_json(&self, key: &str) -> Result<&serde_json::Value, ToolError> {
        self.params
            .get(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }
}

/// Output from a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

impl ToolOutput {
    /// Create a successful output with text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            success: true,
            data: serde_json::json!({ "text": text.into() }),
            error: None,
        }
    }

    /// Create a successful output with JSON data
    pub fn json(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// Create an error output
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }

    /// Render the output as the observation text fed back to the model.
    ///
    /// Failures are prefixed with `ERROR:` so the model can self-correct.
    pub fn render(&self) -> String {
        if !self.success {
            return format!(
                "ERROR: {}",
                self.error.as_deref().unwrap_or("tool call failed")
            );
        }
        match self.data.get("text").and_then(|t| t.as_str()) {
            Some(text) => text.to_string(),
            None => self.data.to_string(),
        }
    }
}

/// Tool-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Tool failed: {0}")]
    Failed(String),
}
