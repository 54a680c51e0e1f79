//! Command handlers for CLI operations
//!
//! - models: List the model table
//! - agents: List registered agents
//! - ingest: Add files to the document index
//! - search: Query the document index
//! - run: Execute the objective crew

use anyhow::{Context, Result};
use serde_json::json;
use std::path::PathBuf;

use crate::config::Config;
use crate::crew::{CrewState, Process};
use crate::fleet::Fleet;
use crate::retrieval::Document;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// List the configured models
pub fn handle_models(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("Models:");
            for (id, spec) in &config.models {
                let marker = if *id == config.agents.default_model {
                    " (default)"
                } else {
                    ""
                };
                println!("  {}{}", id, marker);
                println!("    Kind: {}", spec.kind);
                println!("    Name: {}", spec.name);
                println!("    Temperature: {}", spec.temperature);
                println!("    Max tokens: {}", spec.max_tokens);
            }
            println!();
            println!(
                "Embedding model: {} ({} dimensions)",
                config.retrieval.embedding_model, config.retrieval.embedding_dim
            );
        }
        OutputFormat::Json => {
            let output = json!({
                "models": config.models,
                "default_model": config.agents.default_model,
                "embedding_model": config.retrieval.embedding_model,
                "embedding_dim": config.retrieval.embedding_dim,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// List the registered agents
pub fn handle_agents(fleet: &Fleet, format: OutputFormat) -> Result<()> {
    let agents: Vec<_> = fleet.agents().list().iter().map(|a| a.summary()).collect();

    match format {
        OutputFormat::Text => {
            for agent in &agents {
                println!("{} ({})", agent.id, agent.role);
                println!("  Goal: {}", agent.goal);
                println!("  Model: {}", agent.model);
                println!("  Variant: {}", agent.variant);
                if !agent.tools.is_empty() {
                    println!("  Tools: {}", agent.tools.join(", "));
                }
                println!();
            }
        }
        OutputFormat::Json => {
            let output = json!({ "agents": agents, "count": agents.len() });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Add text files to the document index
pub async fn handle_ingest(fleet: &Fleet, files: Vec<PathBuf>, format: OutputFormat) -> Result<()> {
    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        documents.push(
            Document::new(text).with_metadata("source", json!(path.display().to_string())),
        );
    }

    let retrieval = fleet.retrieval();
    retrieval
        .load()
        .await
        .context("Failed to load the document index")?;
    let report = retrieval
        .ingest(documents)
        .await
        .context("Failed to ingest documents")?;

    match format {
        OutputFormat::Text => {
            println!("✓ Ingested {} file(s)", report.documents);
            println!("  Chunks: {}", report.chunks);
            println!("  Added: {}", report.added);
            println!("  Duplicates skipped: {}", report.duplicates);
            println!("  Index size: {}", retrieval.len());
        }
        OutputFormat::Json => {
            let output = json!({
                "report": report,
                "index_size": retrieval.len(),
                "index_dir": retrieval.index_dir().display().to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Query the document index
pub async fn handle_search(
    fleet: &Fleet,
    query: String,
    k: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let retrieval = fleet.retrieval();
    retrieval
        .load()
        .await
        .context("Failed to load the document index")?;
    let hits = retrieval.search(&query, k, None).await;

    match format {
        OutputFormat::Text => {
            if hits.is_empty() {
                println!("No matching documents");
                return Ok(());
            }
            for (i, hit) in hits.iter().enumerate() {
                println!("[{}] score {:.3}", i + 1, hit.score);
                if let Some(source) = hit.metadata.get("source").and_then(|v| v.as_str()) {
                    println!("    Source: {}", source);
                }
                println!("    {}", hit.text.replace('\n', "\n    "));
                println!();
            }
        }
        OutputFormat::Json => {
            let output = json!({ "query": query, "results": hits, "count": hits.len() });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Research, analyze and act on an objective
pub async fn handle_run(
    fleet: &Fleet,
    objective: String,
    parallel: bool,
    format: OutputFormat,
) -> Result<()> {
    let process = if parallel {
        Process::Parallel
    } else {
        Process::Sequential
    };

    if let Err(e) = fleet.retrieval().load().await {
        tracing::warn!(error = %e, "Document index unavailable, agents run without it");
    }

    if let OutputFormat::Text = format {
        println!("Objective: {}", objective);
        println!("Process: {}", process);
        println!();
    }

    let run = fleet
        .run_objective(&objective, process)
        .await
        .context("Failed to run the objective crew")?;

    match format {
        OutputFormat::Text => {
            for outcome in &run.tasks {
                println!("── {} ({}) [{:?}]", outcome.task_id, outcome.agent_id, outcome.status);
                println!("{}", outcome.output);
                println!();
            }
            println!("Result:");
            println!("{}", run.output.text());
            println!();
            match run.state {
                CrewState::Completed => println!("✓ Crew completed"),
                _ => println!("✗ Crew finished with failures"),
            }
            println!("  Run: {}", run.run_id);
            println!("  Duration: {}ms", run.duration_ms);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
    }

    if run.state == CrewState::Failed {
        anyhow::bail!("crew run {} failed", run.run_id);
    }
    Ok(())
}
