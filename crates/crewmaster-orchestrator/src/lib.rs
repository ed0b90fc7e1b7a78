//! Crew creation pipeline for CrewMaster.
//!
//! Turns a free-text task description into a persisted crew: the task is
//! analyzed into a profile, agents are designed from a capability affinity
//! table, matched against stored agents for reuse, and assembled into a crew
//! with wired task dependencies and a performance prediction.
//!
//! # Main types
//!
//! - [`CrewFactory`]: The full pipeline: analyze, design, match, assemble, persist.
//! - [`CrewExport`]: A crew with its agent records, for moving crews between stores.
//! - [`Analyzer`]: Task analysis, deterministic or model-backed.
//! - [`AgentDesigner`]: Groups capabilities into roles, one agent per role.
//! - [`ReuseMatcher`]: Reuse-vs-create decision against stored agents.
//! - [`CrewOrchestrator`]: Builds tasks, process and prediction for a crew.
//! - [`OrchestratorConfig`]: Pipeline settings loaded from TOML.

/// Capability affinity table and role templates.
pub mod affinity;
/// Task description analysis.
pub mod analyzer;
/// Crew assembly and performance prediction.
pub mod assembler;
/// Pipeline configuration.
pub mod config;
/// Agent design from task profiles.
pub mod designer;
/// Task dependency graph checks.
pub mod graph;
/// Reuse matching against stored agents.
pub mod matcher;
/// Crew name generation.
pub mod naming;
/// End-to-end crew creation.
pub mod pipeline;

pub use affinity::{default_templates, AffinityTable, RoleTemplate};
pub use analyzer::{build_analyzer, Analyzer, DeterministicAnalyzer, ModelBackedAnalyzer};
pub use assembler::{select_process, CrewOrchestrator};
pub use config::{AnalysisConfig, AnalyzerMode, OrchestratorConfig, ReuseConfig};
pub use designer::AgentDesigner;
pub use graph::{has_cycle, topological_order};
pub use matcher::ReuseMatcher;
pub use pipeline::{CreateRequest, CrewExport, CrewFactory};
