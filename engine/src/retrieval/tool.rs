//! Retrieval as an agent tool.

use std::sync::Arc;

use async_trait::async_trait;
use sdk::{Tool, ToolError, ToolInput, ToolOutput};

use super::engine::RetrievalEngine;

/// Name agents use to call the retrieval tool
pub const SEARCH_TOOL_NAME: &str = "search_documents";

/// `search_documents` tool backed by a [`RetrievalEngine`]
#[derive(Debug, Clone)]
pub struct RetrievalTool {
    engine: Arc<RetrievalEngine>,
}

impl RetrievalTool {
    pub fn new(engine: Arc<RetrievalEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for RetrievalTool {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the document index for passages relevant to a query."
    }

    fn arguments_hint(&self) -> &str {
        r#"{"query": "what to look for", "k": 4}"#
    }

    async fn call(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let query = input.param_str("query")?;
        let k = input.param_u64_opt("k").map(|k| k as usize);

        let hits = self.engine.search(&query, k, None).await;
        if hits.is_empty() {
            return Ok(ToolOutput::text("No matching documents."));
        }

        let passages = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("[Source {}] (relevance: {:.2})\n{}", i + 1, hit.score, hit.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(ToolOutput::text(passages))
    }
}
