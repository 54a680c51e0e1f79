//! Fleet Engine Library
//!
//! Core of the Fleet multi-agent orchestration engine: registries for
//! agents, tasks and crews, the crew execution protocol, and the retrieval
//! subsystem agents draw grounding context from. Used by the `fleet` binary
//! and by integration tests.

/// Configuration management module
pub mod config;

/// Telemetry and Observability
pub mod telemetry;

/// Model provider abstraction and registry
pub mod llm;

/// Per-agent conversation memory
pub mod memory;

/// Agent tool sets
pub mod tools;

/// Agent registry and reasoning loop
pub mod agent;

/// Task registry
pub mod task;

/// Crew orchestration
pub mod crew;

/// Retrieval-augmented generation
pub mod retrieval;

/// Composition root
pub mod fleet;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;

pub use fleet::Fleet;
