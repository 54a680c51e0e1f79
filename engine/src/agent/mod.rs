//! Agents
//!
//! An agent is a role-bound wrapper around a language model: a persona
//! (role, goal, backstory), a behavior variant that frames its prompt, a
//! tool set, and a bounded conversation memory kept in the
//! [`MemoryStore`](crate::memory::MemoryStore).
//!
//! The [`AgentRegistry`] owns the definitions and runs invocations.

pub mod registry;
pub mod variant;

pub use registry::AgentRegistry;
pub use variant::{framing, Framing, Variant};

use std::sync::Arc;

use sdk::Tool;
use serde::Serialize;

use crate::llm::{ModelHandle, ProviderError};
use crate::memory::Turn;
use crate::tools::ToolSet;

/// Registration request for an agent
#[derive(Clone)]
pub struct AgentSpec {
    pub id: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,

    /// Model table identifier; `None` uses the configured default model
    pub model_id: Option<String>,

    pub variant: Variant,
    pub tools: Vec<Arc<dyn Tool>>,

    /// Overrides `agents.verbose` when set
    pub verbose: Option<bool>,
}

impl AgentSpec {
    pub fn new(
        id: impl Into<String>,
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            model_id: None,
            variant: Variant::default(),
            tools: Vec::new(),
            verbose: None,
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }
}

/// A registered agent.
///
/// Values handed out by the registry are snapshots; later changes to the
/// registered definition do not affect them.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,

    /// Resolved model handle
    pub model: ModelHandle,

    pub variant: Variant,
    pub tools: ToolSet,
    pub verbose: bool,
}

impl Agent {
    pub fn model_id(&self) -> &str {
        self.model.id()
    }

    /// Serializable summary for listings
    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            id: self.id.clone(),
            role: self.role.clone(),
            goal: self.goal.clone(),
            model: self.model_id().to_string(),
            variant: self.variant,
            tools: self.tools.names(),
        }
    }
}

/// Agent listing entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSummary {
    pub id: String,
    pub role: String,
    pub goal: String,
    pub model: String,
    pub variant: Variant,
    pub tools: Vec<String>,
}

/// Result of one agent invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum Invocation {
    /// Final answer of the agent
    Completed(String),

    /// Description of why the invocation failed
    Failed(String),
}

impl Invocation {
    pub fn is_completed(&self) -> bool {
        matches!(self, Invocation::Completed(_))
    }

    /// Answer or failure description
    pub fn text(&self) -> &str {
        match self {
            Invocation::Completed(text) | Invocation::Failed(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Invocation::Completed(text) | Invocation::Failed(text) => text,
        }
    }
}

/// Why a reasoning loop did not produce an answer
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("no final answer after {0} iterations")]
    IterationsExhausted(usize),

    #[error("timed out after {0}s")]
    Timeout(u64),
}

/// Render the prompt for one invocation.
///
/// Sections appear in a fixed order: persona, variant instructions, tools,
/// remembered turns, supplied context, and finally the labelled input.
pub fn render_prompt(agent: &Agent, input: &str, context: &str, history: &[Turn]) -> String {
    let frame = framing(agent.variant);
    let mut sections = Vec::new();

    sections.push(format!(
        "You are {}, {}.\nYour goal: {}",
        agent.id, agent.role, agent.goal
    ));

    if !agent.backstory.trim().is_empty() {
        sections.push(format!("Background:\n{}", agent.backstory.trim()));
    }

    sections.push(frame.instructions.to_string());

    let tools = agent.tools.prompt_section();
    if !tools.is_empty() {
        sections.push(tools);
    }

    if !history.is_empty() {
        let turns: Vec<String> = history
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.content))
            .collect();
        sections.push(format!("Conversation so far:\n{}", turns.join("\n")));
    }

    if !context.trim().is_empty() {
        sections.push(format!("Context:\n{}", context.trim()));
    }

    sections.push(format!("{}: {}", frame.input_label, input));

    sections.join("\n\n")
}
