//! Fleet
//!
//! Composition root. Builds every component once from a [`Config`] and a
//! [`ModelFactory`] and wires them together by `Arc` handle:
//!
//! ```text
//! ModelRegistry ──┬── RetrievalEngine
//!                 └── AgentRegistry ── TaskRegistry ── CrewOrchestrator
//! MemoryStore ────────┘
//! ```

use std::sync::Arc;

use sdk::errors::EngineError;
use tracing::info;

use crate::agent::{AgentRegistry, AgentSpec, Variant};
use crate::config::Config;
use crate::crew::{CrewInputs, CrewOrchestrator, CrewRun, CrewSpec, Process};
use crate::llm::{ModelFactory, ModelRegistry, OfflineFactory};
use crate::memory::MemoryStore;
use crate::retrieval::RetrievalEngine;
use crate::task::{TaskRegistry, TaskSpec};

/// Identifiers of the agents every fleet starts with
pub const DEFAULT_AGENTS: [&str; 3] = ["researcher", "analyst", "executor"];

/// Crew id used by [`Fleet::run_objective`]
pub const OBJECTIVE_CREW: &str = "objective";

/// The assembled engine
pub struct Fleet {
    config: Config,
    models: Arc<ModelRegistry>,
    memory: Arc<MemoryStore>,
    agents: Arc<AgentRegistry>,
    tasks: Arc<TaskRegistry>,
    crews: Arc<CrewOrchestrator>,
    retrieval: Arc<RetrievalEngine>,
}

impl Fleet {
    /// Build the components with empty registries.
    ///
    /// The configuration is validated first; the retrieval index is not
    /// loaded until first use.
    pub fn new(config: Config, factory: Arc<dyn ModelFactory>) -> Result<Self, EngineError> {
        config.validate()?;

        let models = Arc::new(ModelRegistry::new(
            config.models.clone(),
            &config.retrieval,
            factory,
        ));
        let memory = Arc::new(MemoryStore::new(config.memory.short_term_limit)?);
        let agents = Arc::new(AgentRegistry::new(
            Arc::clone(&models),
            Arc::clone(&memory),
            config.agents.clone(),
        ));
        let tasks = Arc::new(TaskRegistry::new(Arc::clone(&agents)));
        let crews = Arc::new(CrewOrchestrator::new(
            Arc::clone(&agents),
            Arc::clone(&tasks),
            config.crew.clone(),
        ));

        let embedder = models.resolve_embedding(None)?;
        let retrieval = Arc::new(RetrievalEngine::new(&config.retrieval, embedder));

        Ok(Self {
            config,
            models,
            memory,
            agents,
            tasks,
            crews,
            retrieval,
        })
    }

    /// Build the components and register the default agents
    pub fn with_defaults(config: Config, factory: Arc<dyn ModelFactory>) -> Result<Self, EngineError> {
        let fleet = Self::new(config, factory)?;
        fleet.register_default_agents()?;
        Ok(fleet)
    }

    /// [`Fleet::with_defaults`] on the offline backends
    pub fn offline(config: Config) -> Result<Self, EngineError> {
        Self::with_defaults(config, Arc::new(OfflineFactory))
    }

    /// Register `researcher`, `analyst` and `executor`.
    ///
    /// The researcher carries the retrieval tool.
    pub fn register_default_agents(&self) -> Result<(), EngineError> {
        self.agents.register(
            AgentSpec::new(
                "researcher",
                "Senior Researcher",
                "Find and analyze relevant information accurately",
                "You are a research specialist who uses advanced tools to find accurate and \
                 relevant information across many sources.",
            )
            .with_variant(Variant::Research)
            .with_tool(Arc::new(self.retrieval.as_tool())),
        )?;

        self.agents.register(
            AgentSpec::new(
                "analyst",
                "Senior Data Analyst",
                "Analyze data and produce valuable insights",
                "You are an analyst who turns complex data into actionable, understandable \
                 insights.",
            )
            .with_variant(Variant::Analysis),
        )?;

        self.agents.register(
            AgentSpec::new(
                "executor",
                "Implementation Specialist",
                "Carry out tasks based on the information provided",
                "You are an efficient executor who turns plans and instructions into concrete \
                 actions and measurable results.",
            )
            .with_variant(Variant::Execution),
        )?;

        info!(agents = DEFAULT_AGENTS.len(), "Default agents registered");
        Ok(())
    }

    /// Research, analyze and act on an objective with the default agents.
    pub async fn run_objective(&self, objective: &str, process: Process) -> Result<CrewRun, EngineError> {
        self.tasks.register(TaskSpec::new(
            "research",
            "Conduct in-depth research on: {objective}\n\
             Make sure to collect relevant information from reliable sources.",
            "researcher",
        ))?;
        self.tasks.register(TaskSpec::new(
            "analysis",
            "Analyze the information collected and produce valuable insights.\n\
             Identify patterns, trends and opportunities.",
            "analyst",
        ))?;
        self.tasks.register(TaskSpec::new(
            "execution",
            "Based on the analysis, carry out the necessary actions.\n\
             Provide a detailed implementation plan.",
            "executor",
        ))?;

        self.crews.create_crew(
            CrewSpec::new(
                OBJECTIVE_CREW,
                vec!["research".into(), "analysis".into(), "execution".into()],
            )
            .with_process(process),
        )?;

        let inputs = CrewInputs::from([("objective".to_string(), objective.to_string())]);
        self.crews.run(OBJECTIVE_CREW, &inputs).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn agents(&self) -> &Arc<AgentRegistry> {
        &self.agents
    }

    pub fn tasks(&self) -> &Arc<TaskRegistry> {
        &self.tasks
    }

    pub fn crews(&self) -> &Arc<CrewOrchestrator> {
        &self.crews
    }

    pub fn retrieval(&self) -> &Arc<RetrievalEngine> {
        &self.retrieval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::CrewState;

    fn config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.retrieval.index_dir = dir.path().join("index");
        config.retrieval.embedding_dim = 32;
        (dir, config)
    }

    #[test]
    fn test_default_agents_registered() {
        let (_dir, config) = config();
        let fleet = Fleet::offline(config).unwrap();
        let ids: Vec<String> = fleet.agents().list().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["analyst", "executor", "researcher"]);

        let researcher = fleet.agents().get("researcher").unwrap();
        assert_eq!(researcher.tools.names(), vec!["search_documents"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (_dir, mut config) = config();
        config.agents.default_model = "missing".to_string();
        assert!(matches!(Fleet::offline(config), Err(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn test_run_objective_sequential() {
        let (_dir, config) = config();
        let fleet = Fleet::offline(config).unwrap();
        let run = fleet
            .run_objective("AI for business automation", Process::Sequential)
            .await
            .unwrap();

        assert_eq!(run.state, CrewState::Completed);
        assert_eq!(run.tasks.len(), 3);
        assert_eq!(run.output.text(), run.tasks[2].output);
    }
}
