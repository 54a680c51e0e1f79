//! Crews
//!
//! A crew is an ordered group of tasks executed together under one process
//! mode. The [`CrewOrchestrator`] owns crew definitions and runs them.

pub mod orchestrator;

pub use orchestrator::CrewOrchestrator;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};

use crate::task::Task;

/// Values substituted for `{key}` placeholders in task text
pub type CrewInputs = BTreeMap<String, String>;

/// Process mode for crew execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Process {
    /// Execute tasks one by one, each seeing the outputs before it
    #[default]
    Sequential,

    /// Execute every task at once against the shared inputs only
    Parallel,
}

impl Process {
    pub fn as_str(&self) -> &'static str {
        match self {
            Process::Sequential => "sequential",
            Process::Parallel => "parallel",
        }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Process {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(Process::Sequential),
            "parallel" => Ok(Process::Parallel),
            other => Err(EngineError::Config(format!(
                "unknown process mode '{}' (expected sequential or parallel)",
                other
            ))),
        }
    }
}

/// Lifecycle state of a crew's most recent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrewState {
    Created,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for CrewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CrewState::Created => "created",
            CrewState::Running => "running",
            CrewState::Completed => "completed",
            CrewState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Creation request for a crew
#[derive(Debug, Clone)]
pub struct CrewSpec {
    pub id: String,
    pub task_ids: Vec<String>,
    pub process: Process,

    /// Log verbosity of runs, 0 to 2
    pub verbose: u8,
}

impl CrewSpec {
    pub fn new(id: impl Into<String>, task_ids: Vec<String>) -> Self {
        Self {
            id: id.into(),
            task_ids,
            process: Process::default(),
            verbose: 2,
        }
    }

    pub fn with_process(mut self, process: Process) -> Self {
        self.process = process;
        self
    }

    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose.min(2);
        self
    }
}

/// A created crew
#[derive(Debug, Clone, Serialize)]
pub struct Crew {
    pub id: String,

    /// Task definitions resolved at creation time, in crew order
    pub tasks: Vec<Task>,

    pub process: Process,
    pub verbose: u8,
    pub state: CrewState,

    /// Identifier of the most recent run
    pub last_run: Option<String>,
}

impl Crew {
    pub fn task_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.id.as_str()).collect()
    }
}

/// Terminal status of one task within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed,
    TimedOut,
}

/// Result of one task within a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub task_id: String,
    pub agent_id: String,
    pub status: TaskStatus,

    /// Agent answer, or the failure description
    pub output: String,
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub(crate) fn timed_out(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            agent_id: task.agent_id.clone(),
            status: TaskStatus::TimedOut,
            output: format!("Task {} timed out before completing", task.id),
        }
    }
}

/// Task output keyed by task identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyedOutput {
    pub task_id: String,
    pub output: String,
}

/// Composite result of a crew run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CrewOutput {
    /// Output of the final task (sequential)
    Final(String),

    /// Output of every task, in crew order (parallel)
    Keyed(Vec<KeyedOutput>),
}

impl CrewOutput {
    /// Human-readable rendering
    pub fn text(&self) -> String {
        match self {
            CrewOutput::Final(text) => text.clone(),
            CrewOutput::Keyed(outputs) => outputs
                .iter()
                .map(|o| format!("## {}\n{}", o.task_id, o.output))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }

    /// Output of one task, for keyed results
    pub fn get(&self, task_id: &str) -> Option<&str> {
        match self {
            CrewOutput::Final(_) => None,
            CrewOutput::Keyed(outputs) => outputs
                .iter()
                .find(|o| o.task_id == task_id)
                .map(|o| o.output.as_str()),
        }
    }
}

/// Record of one crew run
#[derive(Debug, Clone, Serialize)]
pub struct CrewRun {
    pub run_id: String,
    pub crew_id: String,
    pub process: Process,
    pub state: CrewState,
    pub output: CrewOutput,

    /// Per-task outcomes, in crew order
    pub tasks: Vec<TaskOutcome>,

    /// True when the crew timeout cut the run short
    pub timed_out: bool,

    pub duration_ms: u64,
}

/// Replace `{key}` placeholders with values from `inputs`.
///
/// Placeholders without a matching input are left as they are.
///
/// The template is scanned once; substituted values are not scanned again.
pub fn interpolate(template: &str, inputs: &CrewInputs) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match tail[1..].find(['{', '}']).map(|i| (i + 1, &tail[i + 1..i + 2])) {
            Some((close, "}")) => match inputs.get(&tail[1..close]) {
                Some(value) => {
                    out.push_str(value);
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push_str(&tail[..=close]);
                    rest = &tail[close + 1..];
                }
            },
            _ => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
