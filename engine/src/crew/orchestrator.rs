//! Crew Orchestrator
//!
//! Runs crews under their process mode:
//!
//! - **Sequential**: a fold over the task list. The accumulator carries the
//!   context built from completed outputs and the outcome of every task so
//!   far. A failed task records its failure text and the fold continues.
//! - **Parallel**: every task is spawned at once with only the run inputs;
//!   the results are joined in crew order.
//!
//! Tasks flagged `async_execution` inside a sequential crew are spawned
//! without blocking. They are joined, in list order, right before the next
//! synchronous task starts or when the crew finishes.
//!
//! Every task runs on the worker pool (a semaphore sized by
//! `crew.max_workers`). All joins share one deadline derived from
//! `crew.timeout_secs`; when it passes, outstanding tasks are aborted and
//! recorded as timed out.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use sdk::errors::{EngineError, ObjectKind};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    interpolate, Crew, CrewInputs, CrewOutput, CrewRun, CrewSpec, CrewState, KeyedOutput, Process,
    TaskOutcome, TaskStatus,
};
use crate::agent::{AgentRegistry, Invocation};
use crate::config::CrewConfig;
use crate::task::{Task, TaskRegistry};

/// Accumulator of a sequential run
#[derive(Default)]
struct Fold {
    /// Completed outputs so far, handed to the next task as context
    context: String,

    outcomes: Vec<TaskOutcome>,

    /// Async tasks dispatched but not joined yet, in list order
    pending: Vec<(Task, JoinHandle<TaskOutcome>)>,

    timed_out: bool,
}

impl Fold {
    fn absorb(&mut self, task: &Task, outcome: Option<TaskOutcome>) {
        match outcome {
            Some(outcome) => {
                if outcome.is_completed() {
                    if !self.context.is_empty() {
                        self.context.push_str("\n\n");
                    }
                    self.context.push_str(&outcome.output);
                }
                self.outcomes.push(outcome);
            }
            None => {
                self.timed_out = true;
                self.outcomes.push(TaskOutcome::timed_out(task));
            }
        }
    }

    async fn join_pending(&mut self, deadline: Instant) {
        for (task, handle) in std::mem::take(&mut self.pending) {
            let outcome = join(&task, handle, deadline).await;
            self.absorb(&task, outcome);
        }
    }
}

/// Wait for a dispatched task until `deadline`.
///
/// Returns `None` when the deadline passed first; the task is aborted.
async fn join(task: &Task, mut handle: JoinHandle<TaskOutcome>, deadline: Instant) -> Option<TaskOutcome> {
    match timeout_at(deadline, &mut handle).await {
        Ok(Ok(outcome)) => Some(outcome),
        Ok(Err(e)) => Some(TaskOutcome {
            task_id: task.id.clone(),
            agent_id: task.agent_id.clone(),
            status: TaskStatus::Failed,
            output: format!("Task {} did not finish: {}", task.id, e),
        }),
        Err(_) => {
            handle.abort();
            warn!(task_id = %task.id, "Task aborted at crew deadline");
            None
        }
    }
}

/// Invoke the task's agent, recovering every failure into the outcome
async fn execute(agents: &AgentRegistry, task: &Task, input: &str, context: &str) -> TaskOutcome {
    let (status, output) = match agents.invoke(&task.agent_id, input, context).await {
        Ok(Invocation::Completed(text)) => (TaskStatus::Completed, text),
        Ok(Invocation::Failed(text)) => (TaskStatus::Failed, text),
        Err(e) => (
            TaskStatus::Failed,
            format!("Error running agent {}: {}", task.agent_id, e),
        ),
    };

    TaskOutcome {
        task_id: task.id.clone(),
        agent_id: task.agent_id.clone(),
        status,
        output,
    }
}

/// Agent input for a task: the description, plus the expected output when
/// it says something the description does not.
fn task_input(task: &Task, inputs: &CrewInputs) -> String {
    let description = interpolate(&task.description, inputs);
    let expected = interpolate(&task.expected_output, inputs);
    if expected.trim().is_empty() || expected == description {
        description
    } else {
        format!("{}\n\nExpected output: {}", description, expected)
    }
}

/// Owns crews and runs them
pub struct CrewOrchestrator {
    agents: Arc<AgentRegistry>,
    tasks: Arc<TaskRegistry>,
    settings: CrewConfig,
    workers: Arc<Semaphore>,
    crews: RwLock<HashMap<String, Crew>>,
}

impl CrewOrchestrator {
    pub fn new(agents: Arc<AgentRegistry>, tasks: Arc<TaskRegistry>, settings: CrewConfig) -> Self {
        let workers = Arc::new(Semaphore::new(settings.max_workers.max(1)));
        Self {
            agents,
            tasks,
            settings,
            workers,
            crews: RwLock::new(HashMap::new()),
        }
    }

    /// Create a crew, replacing any crew with the same identifier.
    ///
    /// Fails with `NotFound` when a task id is unknown and with `EmptyCrew`
    /// when no task is given.
    pub fn create_crew(&self, spec: CrewSpec) -> Result<Crew, EngineError> {
        let tasks = spec
            .task_ids
            .iter()
            .map(|task_id| self.tasks.get(task_id))
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| {
                warn!(crew_id = %spec.id, key = %e.log_key(), error = %e, "Crew creation rejected")
            })?;

        if tasks.is_empty() {
            let err = EngineError::EmptyCrew(spec.id);
            warn!(key = %err.log_key(), error = %err, "Crew creation rejected");
            return Err(err);
        }

        let crew = Crew {
            id: spec.id,
            tasks,
            process: spec.process,
            verbose: spec.verbose.min(2),
            state: CrewState::Created,
            last_run: None,
        };

        let mut crews = self.crews.write().expect("CrewOrchestrator lock poisoned");
        if crews.contains_key(&crew.id) {
            warn!(crew_id = %crew.id, "Crew already exists, replacing definition");
        }
        crews.insert(crew.id.clone(), crew.clone());
        info!(crew_id = %crew.id, tasks = crew.tasks.len(), process = %crew.process, "Crew created");
        Ok(crew)
    }

    pub fn get(&self, crew_id: &str) -> Result<Crew, EngineError> {
        self.crews
            .read()
            .expect("CrewOrchestrator lock poisoned")
            .get(crew_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found(ObjectKind::Crew, crew_id))
    }

    /// All crews, sorted by identifier
    pub fn list(&self) -> Vec<Crew> {
        let mut crews: Vec<Crew> = self
            .crews
            .read()
            .expect("CrewOrchestrator lock poisoned")
            .values()
            .cloned()
            .collect();
        crews.sort_by(|a, b| a.id.cmp(&b.id));
        crews
    }

    pub fn state(&self, crew_id: &str) -> Result<CrewState, EngineError> {
        self.get(crew_id).map(|crew| crew.state)
    }

    fn set_state(&self, crew_id: &str, state: CrewState, run_id: Option<&str>) {
        let mut crews = self.crews.write().expect("CrewOrchestrator lock poisoned");
        if let Some(crew) = crews.get_mut(crew_id) {
            crew.state = state;
            if let Some(run_id) = run_id {
                crew.last_run = Some(run_id.to_string());
            }
        }
    }

    fn dispatch(&self, task: &Task, inputs: &CrewInputs, context: String) -> JoinHandle<TaskOutcome> {
        let agents = Arc::clone(&self.agents);
        let workers = Arc::clone(&self.workers);
        let task = task.clone();
        let input = task_input(&task, inputs);

        tokio::spawn(async move {
            let _permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return TaskOutcome {
                        task_id: task.id.clone(),
                        agent_id: task.agent_id.clone(),
                        status: TaskStatus::Failed,
                        output: "Worker pool closed".to_string(),
                    }
                }
            };
            debug!(task_id = %task.id, agent_id = %task.agent_id, "Task started");
            execute(&agents, &task, &input, &context).await
        })
    }

    /// Run a crew.
    ///
    /// An unknown crew fails with `NotFound` before anything changes. Task
    /// failures never fail the call; they end the run in `Failed`.
    pub async fn run(&self, crew_id: &str, inputs: &CrewInputs) -> Result<CrewRun, EngineError> {
        let crew = self
            .get(crew_id)
            .inspect_err(|e| warn!(key = %e.log_key(), error = %e, "Crew run rejected"))?;
        let run_id = Uuid::new_v4().to_string();
        self.set_state(crew_id, CrewState::Running, Some(&run_id));

        info!(crew_id = %crew_id, run_id = %run_id, process = %crew.process, "Crew run started");
        let started = Instant::now();
        let deadline = started + Duration::from_secs(self.settings.timeout_secs);

        let (outcomes, timed_out) = match crew.process {
            Process::Sequential => self.run_sequential(&crew, &run_id, inputs, deadline).await,
            Process::Parallel => self.run_parallel(&crew, &run_id, inputs, deadline).await,
        };

        let failed = timed_out || outcomes.iter().any(|o| !o.is_completed());
        let state = if failed {
            CrewState::Failed
        } else {
            CrewState::Completed
        };

        let output = match crew.process {
            Process::Sequential => {
                CrewOutput::Final(outcomes.last().map(|o| o.output.clone()).unwrap_or_default())
            }
            Process::Parallel => CrewOutput::Keyed(
                outcomes
                    .iter()
                    .map(|o| KeyedOutput {
                        task_id: o.task_id.clone(),
                        output: o.output.clone(),
                    })
                    .collect(),
            ),
        };

        self.set_state(crew_id, state, None);
        let duration_ms = started.elapsed().as_millis() as u64;

        if failed {
            error!(
                crew_id = %crew_id,
                run_id = %run_id,
                failed_tasks = outcomes.iter().filter(|o| !o.is_completed()).count(),
                timed_out,
                duration_ms,
                "Crew run failed"
            );
        } else {
            info!(crew_id = %crew_id, run_id = %run_id, duration_ms, "Crew run completed");
        }

        Ok(CrewRun {
            run_id,
            crew_id: crew_id.to_string(),
            process: crew.process,
            state,
            output,
            tasks: outcomes,
            timed_out,
            duration_ms,
        })
    }

    async fn run_sequential(
        &self,
        crew: &Crew,
        run_id: &str,
        inputs: &CrewInputs,
        deadline: Instant,
    ) -> (Vec<TaskOutcome>, bool) {
        let mut fold = Fold::default();

        for task in &crew.tasks {
            if fold.timed_out {
                fold.outcomes.push(TaskOutcome::timed_out(task));
                continue;
            }

            if task.async_execution {
                debug!(crew_id = %crew.id, task_id = %task.id, "Dispatching async task");
                fold.pending
                    .push((task.clone(), self.dispatch(task, inputs, fold.context.clone())));
                continue;
            }

            fold.join_pending(deadline).await;
            if fold.timed_out {
                fold.outcomes.push(TaskOutcome::timed_out(task));
                continue;
            }

            let handle = self.dispatch(task, inputs, fold.context.clone());
            let outcome = join(task, handle, deadline).await;
            fold.absorb(task, outcome);
            if let Some(outcome) = fold.outcomes.last() {
                Self::log_outcome(crew, run_id, outcome);
            }
        }

        fold.join_pending(deadline).await;
        (fold.outcomes, fold.timed_out)
    }

    async fn run_parallel(
        &self,
        crew: &Crew,
        run_id: &str,
        inputs: &CrewInputs,
        deadline: Instant,
    ) -> (Vec<TaskOutcome>, bool) {
        let handles: Vec<_> = crew
            .tasks
            .iter()
            .map(|task| (task, self.dispatch(task, inputs, String::new())))
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        let mut timed_out = false;
        for (task, handle) in handles {
            match join(task, handle, deadline).await {
                Some(outcome) => {
                    Self::log_outcome(crew, run_id, &outcome);
                    outcomes.push(outcome);
                }
                None => {
                    timed_out = true;
                    outcomes.push(TaskOutcome::timed_out(task));
                }
            }
        }
        (outcomes, timed_out)
    }

    fn log_outcome(crew: &Crew, run_id: &str, outcome: &TaskOutcome) {
        match crew.verbose {
            0 => debug!(crew_id = %crew.id, run_id = %run_id, task_id = %outcome.task_id, status = ?outcome.status, "Task finished"),
            1 => info!(crew_id = %crew.id, run_id = %run_id, task_id = %outcome.task_id, status = ?outcome.status, "Task finished"),
            _ => info!(
                crew_id = %crew.id,
                run_id = %run_id,
                task_id = %outcome.task_id,
                agent_id = %outcome.agent_id,
                status = ?outcome.status,
                output = %outcome.output,
                "Task finished"
            ),
        }
    }
}

impl std::fmt::Debug for CrewOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrewOrchestrator")
            .field("crews", &self.list().iter().map(|c| c.id.clone()).collect::<Vec<_>>())
            .field("max_workers", &self.settings.max_workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentSpec;
    use crate::config::Config;
    use crate::llm::{ModelRegistry, OfflineFactory};
    use crate::memory::MemoryStore;
    use crate::task::TaskSpec;

    fn orchestrator() -> CrewOrchestrator {
        let config = Config::default();
        let models = Arc::new(ModelRegistry::new(
            config.models.clone(),
            &config.retrieval,
            Arc::new(OfflineFactory),
        ));
        let memory = Arc::new(MemoryStore::new(10).unwrap());
        let agents = Arc::new(AgentRegistry::new(models, memory, config.agents));
        agents
            .register(AgentSpec::new("researcher", "Researcher", "Find facts", ""))
            .unwrap();
        let tasks = Arc::new(TaskRegistry::new(Arc::clone(&agents)));
        tasks
            .register(TaskSpec::new("t1", "find {topic}", "researcher"))
            .unwrap();
        CrewOrchestrator::new(agents, tasks, config.crew)
    }

    #[test]
    fn test_task_input_includes_distinct_expected_output() {
        let task = Task {
            id: "t".into(),
            description: "find {topic}".into(),
            agent_id: "a".into(),
            expected_output: "a list about {topic}".into(),
            async_execution: false,
        };
        let inputs = CrewInputs::from([("topic".to_string(), "Rust".to_string())]);
        assert_eq!(
            task_input(&task, &inputs),
            "find Rust\n\nExpected output: a list about Rust"
        );
    }

    #[test]
    fn test_create_crew_validation() {
        let orchestrator = orchestrator();
        let err = orchestrator
            .create_crew(CrewSpec::new("c", vec!["t1".into(), "missing".into()]))
            .unwrap_err();
        assert_eq!(err.log_key(), "task:missing");

        let err = orchestrator.create_crew(CrewSpec::new("c", vec![])).unwrap_err();
        assert!(matches!(err, EngineError::EmptyCrew(_)));
        assert!(orchestrator.list().is_empty());
    }

    #[tokio::test]
    async fn test_run_interpolates_inputs() {
        let orchestrator = orchestrator();
        orchestrator
            .create_crew(CrewSpec::new("c1", vec!["t1".into()]))
            .unwrap();
        assert_eq!(orchestrator.state("c1").unwrap(), CrewState::Created);

        let inputs = CrewInputs::from([("topic".to_string(), "X".to_string())]);
        let run = orchestrator.run("c1", &inputs).await.unwrap();
        assert_eq!(run.state, CrewState::Completed);
        assert_eq!(run.output, CrewOutput::Final("[gpt-4] Input: find X".to_string()));
        assert_eq!(
            orchestrator.get("c1").unwrap().last_run.as_deref(),
            Some(run.run_id.as_str())
        );
    }

    #[tokio::test]
    async fn test_rejections_are_logged_with_stable_key() {
        let (logs, _guard) = crate::telemetry::capture::Logs::install();
        let orchestrator = orchestrator();

        orchestrator
            .create_crew(CrewSpec::new("c", vec!["missing".into()]))
            .unwrap_err();
        orchestrator.create_crew(CrewSpec::new("empty", vec![])).unwrap_err();
        orchestrator.run("ghost", &CrewInputs::new()).await.unwrap_err();

        let logs = logs.contents();
        assert!(logs.contains("key=task:missing"));
        assert!(logs.contains("key=crew:empty"));
        assert!(logs.contains("key=crew:ghost"));
    }
}
