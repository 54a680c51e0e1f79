//! Task Registry
//!
//! A task is a unit of work bound to exactly one registered agent. Tasks are
//! immutable once registered; registering the same identifier again replaces
//! the definition.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use sdk::errors::{EngineError, ObjectKind};
use serde::Serialize;
use tracing::{info, warn};

use crate::agent::AgentRegistry;

/// Registration request for a task
#[derive(Debug, Clone, Default)]
pub struct TaskSpec {
    pub id: String,
    pub description: String,
    pub agent_id: String,

    /// Description of the expected result; blank means the description
    pub expected_output: String,

    /// Dispatch without blocking the sequence of a sequential crew
    pub async_execution: bool,
}

impl TaskSpec {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            agent_id: agent_id.into(),
            ..Self::default()
        }
    }

    pub fn with_expected_output(mut self, expected_output: impl Into<String>) -> Self {
        self.expected_output = expected_output.into();
        self
    }

    pub fn asynchronous(mut self, async_execution: bool) -> Self {
        self.async_execution = async_execution;
        self
    }
}

/// A registered task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub agent_id: String,
    pub expected_output: String,
    pub async_execution: bool,
}

/// Registry of tasks
pub struct TaskRegistry {
    agents: Arc<AgentRegistry>,
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskRegistry {
    pub fn new(agents: Arc<AgentRegistry>) -> Self {
        Self {
            agents,
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Register a task. Fails with `NotFound` when the agent is unknown.
    pub fn register(&self, spec: TaskSpec) -> Result<Task, EngineError> {
        if !self.agents.contains(&spec.agent_id) {
            let err = EngineError::not_found(ObjectKind::Agent, spec.agent_id);
            warn!(task_id = %spec.id, key = %err.log_key(), "Task references unknown agent");
            return Err(err);
        }

        let expected_output = if spec.expected_output.trim().is_empty() {
            spec.description.clone()
        } else {
            spec.expected_output
        };

        let task = Task {
            id: spec.id,
            description: spec.description,
            agent_id: spec.agent_id,
            expected_output,
            async_execution: spec.async_execution,
        };

        let mut tasks = self.tasks.write().expect("TaskRegistry lock poisoned");
        if tasks.contains_key(&task.id) {
            warn!(task_id = %task.id, "Task already registered, replacing definition");
        } else {
            info!(task_id = %task.id, agent_id = %task.agent_id, "Task registered");
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    pub fn get(&self, task_id: &str) -> Result<Task, EngineError> {
        self.tasks
            .read()
            .expect("TaskRegistry lock poisoned")
            .get(task_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(ObjectKind::Task, task_id))
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks
            .read()
            .expect("TaskRegistry lock poisoned")
            .contains_key(task_id)
    }

    /// All tasks, sorted by identifier
    pub fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .expect("TaskRegistry lock poisoned")
            .values()
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    pub fn remove(&self, task_id: &str) -> Result<Task, EngineError> {
        self.tasks
            .write()
            .expect("TaskRegistry lock poisoned")
            .remove(task_id)
            .ok_or_else(|| EngineError::not_found(ObjectKind::Task, task_id))
    }
}
