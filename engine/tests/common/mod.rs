//! Shared test doubles for integration tests
//!
//! `ScriptedModel` answers from the last line of its prompt and reacts to
//! markers in that line:
//!
//! - `FAIL`: returns a provider error
//! - `SLOW`: sleeps for the factory's delay before answering
//! - `TOOL:<name>`: asks for tool `<name>` once, then answers with the
//!   observation it got back
//!
//! Every prompt is recorded so tests can assert on what an agent saw.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fleet_engine::config::{Config, ModelKind, ModelSpec};
use fleet_engine::llm::{
    CompletionOptions, Embedder, HashEmbedder, LanguageModel, ModelFactory, ProviderError,
};

pub struct ScriptedModel {
    name: String,
    prompts: Arc<Mutex<Vec<String>>>,
    slow: Duration,
}

fn last_line(prompt: &str) -> &str {
    prompt
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn complete(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(pos) = prompt.rfind("\nObservation from") {
            let observation = prompt[pos + 1..].lines().next().unwrap_or_default();
            return Ok(format!("final: {}", observation));
        }

        let line = last_line(prompt);
        if line.contains("FAIL") {
            return Err(ProviderError::Unavailable("scripted failure".to_string()));
        }
        if line.contains("SLOW") {
            tokio::time::sleep(self.slow).await;
        }
        if let Some(pos) = line.find("TOOL:") {
            let name: String = line[pos + 5..]
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            return Ok(format!(
                r#"{{"function": "{}", "arguments": {{"query": "{}"}}}}"#,
                name, "tokio runtime"
            ));
        }
        Ok(format!("done: {}", line))
    }
}

/// Factory handing out scripted models that share one prompt log
#[derive(Clone)]
pub struct ScriptedFactory {
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub slow: Duration,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self {
            prompts: Arc::new(Mutex::new(Vec::new())),
            slow: Duration::from_secs(3),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl ModelFactory for ScriptedFactory {
    fn build_model(
        &self,
        _model_id: &str,
        spec: &ModelSpec,
    ) -> Result<Box<dyn LanguageModel>, ProviderError> {
        Ok(Box::new(ScriptedModel {
            name: spec.name.clone(),
            prompts: Arc::clone(&self.prompts),
            slow: self.slow,
        }))
    }

    fn build_embedder(
        &self,
        model_id: &str,
        dimension: usize,
    ) -> Result<Box<dyn Embedder>, ProviderError> {
        Ok(Box::new(HashEmbedder::new(model_id, dimension)))
    }
}

/// Factory whose embedder returns vectors of a fixed, possibly wrong, length
pub struct FixedDimensionFactory {
    pub dimension: usize,
}

pub struct FixedDimensionEmbedder {
    dimension: usize,
}

#[async_trait]
impl Embedder for FixedDimensionEmbedder {
    fn name(&self) -> &str {
        "fixed"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(vec![0.5; self.dimension])
    }
}

impl ModelFactory for FixedDimensionFactory {
    fn build_model(
        &self,
        _model_id: &str,
        spec: &ModelSpec,
    ) -> Result<Box<dyn LanguageModel>, ProviderError> {
        Ok(Box::new(fleet_engine::llm::EchoModel::new(spec.name.clone(), true)))
    }

    fn build_embedder(
        &self,
        _model_id: &str,
        _dimension: usize,
    ) -> Result<Box<dyn Embedder>, ProviderError> {
        Ok(Box::new(FixedDimensionEmbedder {
            dimension: self.dimension,
        }))
    }
}

/// Config with a temporary index directory and small, fast settings
pub fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.core.data_dir = dir.to_path_buf();
    config.retrieval.index_dir = dir.join("index");
    config.retrieval.embedding_dim = 64;
    config.retrieval.chunk_size = 200;
    config.retrieval.chunk_overlap = 20;

    let mut models = BTreeMap::new();
    models.insert(
        "gpt-4".to_string(),
        ModelSpec::new(ModelKind::HostedCompletion, "gpt-4"),
    );
    models.insert("local".to_string(), ModelSpec::new(ModelKind::Local, "local-model"));
    config.models = models;
    config
}
