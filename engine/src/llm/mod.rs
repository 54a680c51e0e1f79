//! Model Provider Abstraction Layer
//!
//! This module defines the two collaborator interfaces the engine talks to:
//! a [`LanguageModel`] (prompt → completion) and an [`Embedder`]
//! (text → fixed-length vector). Concrete backends are built by a
//! [`registry::ModelFactory`] and cached by the [`registry::ModelRegistry`].
//!
//! It also holds the tool-call parser used by the agent reasoning loop: a
//! completion either is a final answer or asks for a tool call.

use async_trait::async_trait;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};

pub mod offline;
pub mod registry;

pub use offline::{EchoModel, HashEmbedder, OfflineFactory};
pub use registry::{EmbeddingHandle, ModelFactory, ModelHandle, ModelRegistry};

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur while talking to a model backend
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Timeout")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Backend construction failed: {0}")]
    Construction(String),
}

impl From<ProviderError> for EngineError {
    fn from(err: ProviderError) -> Self {
        EngineError::Provider(err.to_string())
    }
}

/// Per-call generation options, taken from the model table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// Language model backend
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the backend model name
    fn name(&self) -> &str;

    /// Returns true if the model runs on this machine
    fn is_local(&self) -> bool;

    /// Complete a prompt
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;
}

/// Embedding model backend
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the embedding model name
    fn name(&self) -> &str;

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Tool call requested by a model completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,

    /// Name of the tool to call
    pub name: String,

    /// Arguments to pass to the tool (JSON string)
    pub arguments: String,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4()),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Parse a tool call out of a completion.
///
/// Recognised shapes:
/// 1. Raw JSON: `{"function": "...", "arguments": {...}}`
/// 2. The same JSON inside a markdown code fence, trailing prose allowed
/// 3. `<tool_call>name({...})</tool_call>` markers
/// 4. The JSON object embedded anywhere in prose
///
/// Returns `None` when the completion is a final answer.
pub fn parse_tool_call(content: &str) -> Option<ToolCall> {
    let trimmed = content.trim();

    if let Some(tc) = try_parse_function_json(trimmed) {
        return Some(tc);
    }

    if let Some(inner) = extract_fenced_block(trimmed) {
        if let Some(tc) = try_parse_function_json(inner.trim()) {
            return Some(tc);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find("<tool_call>"), trimmed.find("</tool_call>")) {
        if start < end {
            let body = &trimmed[start + "<tool_call>".len()..end];
            if let Some(paren) = body.find('(') {
                let name = body[..paren].trim();
                let args_end = body.rfind(')').unwrap_or(body.len());
                if !name.is_empty() && paren < args_end {
                    return Some(ToolCall::new(name, &body[paren + 1..args_end]));
                }
            }
        }
    }

    if let Some(pos) = trimmed.find("{\"function\"") {
        if let Some(json_str) = extract_balanced_json(&trimmed[pos..]) {
            return try_parse_function_json(json_str);
        }
    }

    None
}

fn try_parse_function_json(s: &str) -> Option<ToolCall> {
    let json: serde_json::Value = serde_json::from_str(s).ok()?;
    let function = json.get("function")?.as_str()?;
    let arguments = json
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));
    Some(ToolCall::new(function, arguments.to_string()))
}

/// Body of the first markdown code fence, without its language tag line.
fn extract_fenced_block(content: &str) -> Option<&str> {
    let (_, opened) = content.split_once("```")?;
    let (_, body) = opened.split_once('\n')?;
    let (body, _) = body.split_once("```")?;
    (!body.trim().is_empty()).then_some(body)
}

/// The `{...}` object `s` starts with, braces inside strings ignored.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut quoted = false;
    let mut chars = s.char_indices();
    while let Some((i, ch)) = chars.next() {
        match (quoted, ch) {
            (true, '\\') => {
                chars.next();
            }
            (_, '"') => quoted = !quoted,
            (false, '{') => depth += 1,
            (false, '}') => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return s.get(..=i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_answer_is_not_a_tool_call() {
        assert!(parse_tool_call("The capital of France is Paris.").is_none());
        assert!(parse_tool_call("{\"answer\": 42}").is_none());
    }

    #[test]
    fn test_parse_raw_json() {
        let tc = parse_tool_call(r#"{"function": "search_documents", "arguments": {"query": "rag"}}"#)
            .unwrap();
        assert_eq!(tc.name, "search_documents");
        let args: serde_json::Value = serde_json::from_str(&tc.arguments).unwrap();
        assert_eq!(args["query"], "rag");
        assert!(tc.id.starts_with("call_"));
    }

    #[test]
    fn test_parse_fenced_json_with_trailing_prose() {
        let content = "Let me look that up.\n```json\n{\"function\": \"lookup\", \"arguments\": {}}\n```\nThen I will answer.";
        let tc = parse_tool_call(content).unwrap();
        assert_eq!(tc.name, "lookup");
        assert_eq!(tc.arguments, "{}");
    }

    #[test]
    fn test_parse_xml_markers() {
        let tc = parse_tool_call(r#"<tool_call>search_documents({"query": "x"})</tool_call>"#)
            .unwrap();
        assert_eq!(tc.name, "search_documents");
        assert_eq!(tc.arguments, r#"{"query": "x"}"#);
    }

    #[test]
    fn test_parse_embedded_json() {
        let content = r#"I need data. {"function": "lookup", "arguments": {"q": "a}b"}} thanks"#;
        let tc = parse_tool_call(content).unwrap();
        assert_eq!(tc.name, "lookup");
        let args: serde_json::Value = serde_json::from_str(&tc.arguments).unwrap();
        assert_eq!(args["q"], "a}b");
    }

    #[test]
    fn test_balanced_json_skips_escaped_quotes() {
        let s = r#"{"q": "say \"}\" twice", "n": {"m": 1}} trailing }"#;
        assert_eq!(
            extract_balanced_json(s),
            Some(r#"{"q": "say \"}\" twice", "n": {"m": 1}}"#)
        );
        assert_eq!(extract_balanced_json("{\"open\": {"), None);
        assert_eq!(extract_balanced_json("no object"), None);
        assert_eq!(extract_fenced_block("```json\n  \n```"), None);
    }

    #[test]
    fn test_missing_arguments_default_to_empty_object() {
        let tc = parse_tool_call(r#"{"function": "now"}"#).unwrap();
        assert_eq!(tc.arguments, "{}");
    }

    #[test]
    fn test_provider_error_conversion() {
        let err: EngineError = ProviderError::AuthenticationFailed("bad key".to_string()).into();
        assert!(matches!(err, EngineError::Provider(_)));
        assert!(err.to_string().contains("bad key"));
    }
}
