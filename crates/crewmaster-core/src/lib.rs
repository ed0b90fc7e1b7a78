//! Core types and error definitions for CrewMaster.
//!
//! This crate provides the data model shared by every CrewMaster crate:
//! task profiles, agent and crew specifications, reuse decisions, and the
//! unified error taxonomy of the crew creation pipeline.
//!
//! # Main types
//!
//! - [`CrewmasterError`]: Unified error enum; one variant per failure kind.
//! - [`CrewmasterResult`]: Convenience alias for `Result<T, CrewmasterError>`.
//! - [`CreationFailure`]: Structured failure (kind + cause chain) shown to callers.
//! - [`CapabilityTag`]: Identifier naming a class of action an agent may take.
//! - [`TaskProfile`]: Analyzed form of a free-text task description.
//! - [`AgentSpec`] / [`AgentRecord`]: Designed agent and its stored counterpart.
//! - [`CrewSpec`] / [`TaskSpec`]: Executable crew specification.
//! - [`ReuseDecision`]: Reuse-vs-create verdict for one designed agent.

/// Agent specifications and stored agent records.
pub mod agent;
/// Capability tags.
pub mod capability;
/// Crew, task, and reuse decision types.
pub mod crew;
/// Error taxonomy.
pub mod error;
/// Task profile, domain, and complexity.
pub mod profile;

pub use agent::{AgentRecord, AgentSpec, DEFAULT_MAX_ITERATIONS};
pub use capability::CapabilityTag;
pub use crew::{
    AgentReference, AgentSlot, Confidence, CrewSpec, Decision, PerformancePrediction, Process,
    Provisioning, ReuseDecision, TaskSpec,
};
pub use error::{CreationFailure, CrewmasterError, CrewmasterResult, ErrorKind};
pub use profile::{Complexity, Domain, TaskProfile};
