//! Configuration management
//!
//! This module handles loading, validation, and management of the Fleet configuration.
//! Configuration is stored in TOML format at ~/.fleet/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **retrieval**: Index location, chunking, embedding model and dimensionality
//! - **models**: The static table of known language models
//! - **agents**: Invocation timeout, reasoning iterations, default model
//! - **memory**: Short-term conversation limit
//! - **crew**: Worker pool size and crew timeout
//!
//! The configuration is consumed by the engine, never owned by it: every
//! component receives the section it needs when the [`crate::fleet::Fleet`]
//! is built. A referenced model identifier that is missing from the model
//! table fails validation immediately.
//!
//! # Examples
//!
//! ```no_run
//! use fleet_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Index: {:?}", config.retrieval.index_dir);
//! println!("Default model: {}", config.agents.default_model);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    pub core: CoreConfig,

    /// Retrieval index settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Known language models, keyed by model identifier
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, ModelSpec>,

    /// Agent invocation settings
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Conversation memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Crew execution settings
    #[serde(default)]
    pub crew: CrewConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Retrieval index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Directory holding the persisted index (supports ~ expansion)
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding dimensionality
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Number of matches returned when the caller does not ask for a count
    #[serde(default = "default_k")]
    pub default_k: usize,
}

/// Backend family of a language model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// Hosted completion API
    HostedCompletion,

    /// Hosted model hub inference endpoint
    HostedHub,

    /// Model running on this machine
    Local,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::HostedCompletion => "hosted-completion",
            ModelKind::HostedHub => "hosted-hub",
            ModelKind::Local => "local",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the static model table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Backend family
    pub kind: ModelKind,

    /// Backend-specific model name (API model name or hub repository id)
    pub name: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Token/length ceiling for a single completion
    #[serde(default = "default_max_tokens", alias = "max_length")]
    pub max_tokens: u32,
}

impl ModelSpec {
    pub fn new(kind: ModelKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Agent invocation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Ceiling for a single agent invocation (seconds)
    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,

    /// Maximum reasoning iterations (model round-trips) per invocation
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Model used by the default agents
    #[serde(default = "default_agent_model")]
    pub default_model: String,

    /// Log prompts and completions at debug level
    #[serde(default = "default_true")]
    pub verbose: bool,
}

/// Conversation memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of turns kept per agent
    #[serde(default = "default_short_term_limit")]
    pub short_term_limit: usize,
}

/// Crew execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewConfig {
    /// Size of the worker pool running task invocations
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Ceiling for a whole crew run (seconds)
    #[serde(default = "default_crew_timeout")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.fleet")
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("~/.fleet/vector_store")
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-mpnet-base-v2".to_string()
}

fn default_embedding_dim() -> usize {
    768
}

fn default_k() -> usize {
    4
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_agent_timeout() -> u64 {
    300
}

fn default_max_iterations() -> usize {
    10
}

fn default_agent_model() -> String {
    "gpt-4".to_string()
}

fn default_short_term_limit() -> usize {
    10
}

fn default_max_workers() -> usize {
    4
}

fn default_crew_timeout() -> u64 {
    900
}

fn default_models() -> BTreeMap<String, ModelSpec> {
    let mut models = BTreeMap::new();
    models.insert(
        "gpt-4".to_string(),
        ModelSpec::new(ModelKind::HostedCompletion, "gpt-4"),
    );
    models.insert(
        "llama2-7b".to_string(),
        ModelSpec::new(ModelKind::HostedHub, "meta-llama/Llama-2-7b-chat-hf"),
    );
    models.insert(
        "flan-t5-xxl".to_string(),
        ModelSpec::new(ModelKind::HostedHub, "google/flan-t5-xxl"),
    );
    models
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
            default_k: default_k(),
        }
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_agent_timeout(),
            max_iterations: default_max_iterations(),
            default_model: default_agent_model(),
            verbose: true,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_limit: default_short_term_limit(),
        }
    }
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            timeout_secs: default_crew_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            models: default_models(),
            agents: AgentsConfig::default(),
            memory: MemoryConfig::default(),
            crew: CrewConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.fleet/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse, validate and process configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        // Serialize before processing so the file keeps the portable ~ paths
        let config = Self::default();
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = config;
        config.validate_and_process()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.fleet/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".fleet").join("config.toml"))
    }

    /// Look up a model in the static table
    pub fn model(&self, model_id: &str) -> Result<&ModelSpec, EngineError> {
        self.models.get(model_id).ok_or_else(|| {
            EngineError::Config(format!(
                "Model '{}' is not in the model table. Known models: {}",
                model_id,
                self.models.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// Check every value without touching the file system
    pub fn validate(&self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let retrieval = &self.retrieval;
        if retrieval.chunk_size == 0 {
            return Err(EngineError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if retrieval.chunk_overlap >= retrieval.chunk_size {
            return Err(EngineError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                retrieval.chunk_overlap, retrieval.chunk_size
            )));
        }
        if retrieval.embedding_dim == 0 {
            return Err(EngineError::Config(
                "embedding_dim must be greater than 0".to_string(),
            ));
        }
        if retrieval.embedding_model.trim().is_empty() {
            return Err(EngineError::Config(
                "embedding_model must not be empty".to_string(),
            ));
        }
        if retrieval.default_k == 0 {
            return Err(EngineError::Config(
                "default_k must be at least 1".to_string(),
            ));
        }

        if self.models.is_empty() {
            return Err(EngineError::Config(
                "The model table must define at least one model".to_string(),
            ));
        }
        for (id, spec) in &self.models {
            if !(0.0..=2.0).contains(&spec.temperature) {
                return Err(EngineError::Config(format!(
                    "Model '{}': temperature must be between 0.0 and 2.0",
                    id
                )));
            }
            if spec.max_tokens == 0 {
                return Err(EngineError::Config(format!(
                    "Model '{}': max_tokens must be greater than 0",
                    id
                )));
            }
        }
        self.model(&self.agents.default_model)?;

        if self.agents.max_iterations == 0 {
            return Err(EngineError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.agents.timeout_secs == 0 {
            return Err(EngineError::Config(
                "agents.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.memory.short_term_limit == 0 {
            return Err(EngineError::Config(
                "short_term_limit must be at least 1".to_string(),
            ));
        }
        if self.crew.max_workers == 0 {
            return Err(EngineError::Config(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.crew.timeout_secs == 0 {
            return Err(EngineError::Config(
                "crew.timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate and process configuration
    ///
    /// Validates every section, expands ~ in paths and creates the data
    /// directory. The index directory is left alone: its absence is what
    /// triggers index bootstrap on first use.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        self.validate()?;

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        self.retrieval.index_dir = expand_path(&self.retrieval.index_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
