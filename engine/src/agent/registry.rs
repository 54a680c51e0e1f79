//! Agent Registry
//!
//! Owns agent definitions keyed by identifier and runs the reasoning loop:
//!
//! 1. Render the prompt (persona, framing, tools, memory, context, input)
//! 2. Ask the model for a completion
//! 3. If the completion is a tool call: dispatch it, append the observation
//!    to the scratchpad, continue
//! 4. Otherwise: the completion is the final answer
//!
//! The loop is bounded by `agents.max_iterations` and the whole invocation by
//! `agents.timeout_secs`. Failures inside the loop come back as
//! [`Invocation::Failed`]; only an unknown agent is an error.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use sdk::errors::{EngineError, ObjectKind};
use sdk::Tool;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{render_prompt, Agent, AgentSpec, Invocation, InvocationError, Variant};
use crate::config::AgentsConfig;
use crate::llm::{parse_tool_call, ModelRegistry};
use crate::memory::{MemoryStore, Turn};
use crate::tools::ToolSet;

/// Registry of agents
pub struct AgentRegistry {
    models: Arc<ModelRegistry>,
    memory: Arc<MemoryStore>,
    settings: AgentsConfig,
    agents: RwLock<HashMap<String, Agent>>,
}

impl AgentRegistry {
    pub fn new(models: Arc<ModelRegistry>, memory: Arc<MemoryStore>, settings: AgentsConfig) -> Self {
        Self {
            models,
            memory,
            settings,
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Register an agent, replacing any agent with the same identifier.
    ///
    /// The model is resolved up front. Memory of a replaced agent is kept.
    pub fn register(&self, spec: AgentSpec) -> Result<Agent, EngineError> {
        let model_id = spec
            .model_id
            .clone()
            .unwrap_or_else(|| self.settings.default_model.clone());
        let model = self.models.resolve(&model_id)?;

        let mut tools = ToolSet::new();
        for tool in spec.tools {
            tools.push(tool);
        }

        let agent = Agent {
            id: spec.id,
            role: spec.role,
            goal: spec.goal,
            backstory: spec.backstory,
            model,
            variant: spec.variant,
            tools,
            verbose: spec.verbose.unwrap_or(self.settings.verbose),
        };

        let mut agents = self.agents.write().expect("AgentRegistry lock poisoned");
        if agents.contains_key(&agent.id) {
            warn!(agent_id = %agent.id, "Agent already registered, updating definition");
        } else {
            info!(agent_id = %agent.id, model_id = %model_id, variant = %agent.variant, "Agent registered");
        }
        agents.insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    fn with_agent_mut<F>(&self, agent_id: &str, f: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut Agent),
    {
        let mut agents = self.agents.write().expect("AgentRegistry lock poisoned");
        let agent = agents
            .get_mut(agent_id)
            .ok_or_else(|| EngineError::not_found(ObjectKind::Agent, agent_id))?;
        f(agent);
        Ok(())
    }

    /// Append a tool to an agent's tool set
    pub fn attach_tool(&self, agent_id: &str, tool: Arc<dyn Tool>) -> Result<(), EngineError> {
        let name = tool.name().to_string();
        self.with_agent_mut(agent_id, |agent| agent.tools.push(tool))?;
        debug!(agent_id = %agent_id, tool = %name, "Tool attached");
        Ok(())
    }

    /// Change an agent's behavior variant in place
    pub fn set_variant(&self, agent_id: &str, variant: Variant) -> Result<(), EngineError> {
        self.with_agent_mut(agent_id, |agent| agent.variant = variant)
    }

    pub fn get(&self, agent_id: &str) -> Result<Agent, EngineError> {
        self.agents
            .read()
            .expect("AgentRegistry lock poisoned")
            .get(agent_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(ObjectKind::Agent, agent_id))
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents
            .read()
            .expect("AgentRegistry lock poisoned")
            .contains_key(agent_id)
    }

    /// All agents, sorted by identifier
    pub fn list(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self
            .agents
            .read()
            .expect("AgentRegistry lock poisoned")
            .values()
            .cloned()
            .collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }

    pub fn len(&self) -> usize {
        self.agents.read().expect("AgentRegistry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove an agent together with its memory
    pub fn remove(&self, agent_id: &str) -> Result<Agent, EngineError> {
        let removed = self
            .agents
            .write()
            .expect("AgentRegistry lock poisoned")
            .remove(agent_id)
            .ok_or_else(|| EngineError::not_found(ObjectKind::Agent, agent_id))?;
        self.memory.forget(agent_id);
        info!(agent_id = %agent_id, "Agent removed");
        Ok(removed)
    }

    /// Remembered turns of an agent
    pub fn memory(&self, agent_id: &str) -> Result<Vec<Turn>, EngineError> {
        if !self.contains(agent_id) {
            return Err(EngineError::not_found(ObjectKind::Agent, agent_id));
        }
        Ok(self.memory.history(agent_id))
    }

    pub fn clear_memory(&self, agent_id: &str) -> Result<(), EngineError> {
        if !self.contains(agent_id) {
            return Err(EngineError::not_found(ObjectKind::Agent, agent_id));
        }
        self.memory.clear(agent_id);
        debug!(agent_id = %agent_id, "Agent memory cleared");
        Ok(())
    }

    /// Run an agent on `input` with the given context.
    ///
    /// On success the input and the answer are appended to the agent's memory.
    pub async fn invoke(
        &self,
        agent_id: &str,
        input: &str,
        context: &str,
    ) -> Result<Invocation, EngineError> {
        let agent = self
            .get(agent_id)
            .inspect_err(|e| warn!(key = %e.log_key(), error = %e, "Invocation rejected"))?;
        let history = self.memory.history(agent_id);
        let prompt = render_prompt(&agent, input, context, &history);

        let limit = self.settings.timeout_secs;
        let outcome = match timeout(Duration::from_secs(limit), self.reason(&agent, prompt)).await {
            Ok(result) => result,
            Err(_) => Err(InvocationError::Timeout(limit)),
        };

        match outcome {
            Ok(answer) => {
                self.memory.append(agent_id, Turn::user(input));
                self.memory.append(agent_id, Turn::assistant(answer.clone()));
                Ok(Invocation::Completed(answer))
            }
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "Agent invocation failed");
                Ok(Invocation::Failed(format!(
                    "Error running agent {}: {}",
                    agent_id, e
                )))
            }
        }
    }

    async fn reason(&self, agent: &Agent, prompt: String) -> Result<String, InvocationError> {
        let max_iterations = self.settings.max_iterations;
        let mut scratchpad = String::new();

        for iteration in 1..=max_iterations {
            if agent.verbose {
                info!(agent_id = %agent.id, iteration, max_iterations, "Agent thinking");
            } else {
                debug!(agent_id = %agent.id, iteration, max_iterations, "Agent thinking");
            }

            let full_prompt = if scratchpad.is_empty() {
                prompt.clone()
            } else {
                format!("{}\n{}", prompt, scratchpad)
            };

            let completion = agent.model.complete(&full_prompt).await?;

            // Only calls naming a carried tool are dispatched
            let call = match parse_tool_call(&completion) {
                Some(call) if agent.tools.get(&call.name).is_some() => call,
                _ => return Ok(completion.trim().to_string()),
            };

            let observation = agent.tools.dispatch(&call.name, &call.arguments).await;
            if agent.verbose {
                info!(agent_id = %agent.id, tool = %call.name, call_id = %call.id, "Tool observation received");
            }

            scratchpad.push_str(&format!(
                "\n{}\nObservation from {}: {}\n",
                completion.trim(),
                call.name,
                observation
            ));
        }

        Err(InvocationError::IterationsExhausted(max_iterations))
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.list().iter().map(|a| a.id.clone()).collect::<Vec<_>>())
            .finish()
    }
}
