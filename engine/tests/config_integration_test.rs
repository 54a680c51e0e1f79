//! Integration tests for configuration management
//!
//! These tests verify that the Config struct can be loaded from TOML,
//! validated, and processed with path expansion.

use fleet_engine::config::{Config, ModelKind};
use sdk::errors::EngineError;

fn full_config_toml(data_dir: &str, index_dir: &str) -> String {
    format!(
        r#"
[core]
log_level = "debug"
data_dir = "{data_dir}"

[retrieval]
index_dir = "{index_dir}"
chunk_size = 500
chunk_overlap = 50
embedding_model = "sentence-transformers/all-mpnet-base-v2"
embedding_dim = 128
default_k = 3

[models.gpt-4]
kind = "hosted-completion"
name = "gpt-4"
temperature = 0.2
max_tokens = 1500

[models.llama2-7b]
kind = "hosted-hub"
name = "meta-llama/Llama-2-7b-chat-hf"
max_length = 512

[agents]
timeout_secs = 60
max_iterations = 5
default_model = "gpt-4"
verbose = false

[memory]
short_term_limit = 6

[crew]
max_workers = 2
timeout_secs = 120
"#
    )
}

#[test]
fn test_config_toml_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let index_dir = dir.path().join("index");
    let toml = full_config_toml(
        &data_dir.display().to_string(),
        &index_dir.display().to_string(),
    );

    let config = Config::from_toml_str(&toml).unwrap();

    assert_eq!(config.core.log_level, "debug");
    assert_eq!(config.retrieval.chunk_size, 500);
    assert_eq!(config.retrieval.chunk_overlap, 50);
    assert_eq!(config.retrieval.embedding_dim, 128);
    assert_eq!(config.retrieval.default_k, 3);
    assert_eq!(config.agents.timeout_secs, 60);
    assert_eq!(config.agents.max_iterations, 5);
    assert!(!config.agents.verbose);
    assert_eq!(config.memory.short_term_limit, 6);
    assert_eq!(config.crew.max_workers, 2);
    assert_eq!(config.crew.timeout_secs, 120);

    let llama = config.model("llama2-7b").unwrap();
    assert_eq!(llama.kind, ModelKind::HostedHub);
    assert_eq!(llama.max_tokens, 512);
    assert_eq!(config.model("gpt-4").unwrap().temperature, 0.2);

    // The data directory is created, the index directory is not
    assert!(data_dir.exists());
    assert!(!index_dir.exists());
}

#[test]
fn test_minimal_config_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let toml = format!(
        "[core]\ndata_dir = \"{}\"\n",
        dir.path().join("data").display()
    );

    let config = Config::from_toml_str(&toml).unwrap();

    assert_eq!(config.core.log_level, "info");
    assert_eq!(config.retrieval.chunk_size, 1000);
    assert_eq!(config.retrieval.chunk_overlap, 200);
    assert_eq!(config.retrieval.embedding_dim, 768);
    assert_eq!(config.agents.default_model, "gpt-4");
    assert!(config.agents.verbose);
    assert_eq!(config.crew.max_workers, 4);
    assert_eq!(config.models.len(), 3);
}

#[test]
fn test_load_from_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let toml = full_config_toml(
        &dir.path().join("data").display().to_string(),
        &dir.path().join("index").display().to_string(),
    );
    std::fs::write(&path, toml).unwrap();

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.retrieval.embedding_dim, 128);

    let missing = Config::load_from_path(&dir.path().join("missing.toml"));
    assert!(matches!(missing, Err(EngineError::Config(_))));
}

#[test]
fn test_invalid_log_level_rejected() {
    let err = Config::from_toml_str("[core]\nlog_level = \"loud\"\n").unwrap_err();
    assert!(err.to_string().contains("Invalid log level"));
}

#[test]
fn test_unknown_default_model_rejected() {
    let toml = r#"
[core]
log_level = "info"

[agents]
default_model = "gpt-5"
"#;
    let err = Config::from_toml_str(toml).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
    assert!(err.to_string().contains("gpt-5"));
}

#[test]
fn test_unknown_model_kind_rejected() {
    let toml = r#"
[core]
log_level = "info"

[models.gpt-4]
kind = "quantum"
name = "gpt-4"
"#;
    assert!(Config::from_toml_str(toml).is_err());
}

#[test]
fn test_threshold_validation() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.crew.timeout_secs = 0;
    assert!(config.validate().is_err());
    config.crew.timeout_secs = 900;

    config.agents.max_iterations = 0;
    assert!(config.validate().is_err());
    config.agents.max_iterations = 10;

    config.retrieval.embedding_dim = 0;
    assert!(config.validate().is_err());
    config.retrieval.embedding_dim = 768;

    if let Some(spec) = config.models.get_mut("gpt-4") {
        spec.temperature = 3.5;
    }
    assert!(config.validate().is_err());
}
