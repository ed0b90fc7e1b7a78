use crate::agent::AgentSpec;
use crate::profile::{Complexity, Domain};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Execution topology governing how task outputs flow between agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Process {
    /// Each task depends on the one before it.
    Sequential,
    /// A coordinating agent feeds every other task.
    Hierarchical,
}

impl std::fmt::Display for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Process::Sequential => write!(f, "sequential"),
            Process::Hierarchical => write!(f, "hierarchical"),
        }
    }
}

/// Reference to an agent kept by the agent store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentReference {
    pub id: Uuid,
    pub role: String,
}

/// One agent position in a crew: either a fresh spec or a shared reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentSlot {
    New { spec: AgentSpec },
    Existing { agent: AgentReference },
}

impl AgentSlot {
    pub fn role(&self) -> &str {
        match self {
            AgentSlot::New { spec } => &spec.role,
            AgentSlot::Existing { agent } => &agent.role,
        }
    }

    pub fn is_reused(&self) -> bool {
        matches!(self, AgentSlot::Existing { .. })
    }

    pub fn existing_id(&self) -> Option<Uuid> {
        match self {
            AgentSlot::Existing { agent } => Some(agent.id),
            AgentSlot::New { .. } => None,
        }
    }
}

/// A unit of work assigned to one agent of the crew.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub description: String,
    pub expected_output: String,
    /// Index into [`CrewSpec::agents`].
    pub assigned_agent: usize,
    /// Indices into [`CrewSpec::tasks`].
    #[serde(default)]
    pub depends_on: BTreeSet<usize>,
}

/// Qualitative confidence that the crew will perform well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

/// Provisioning of the crew relative to task complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provisioning {
    Under,
    Balanced,
    Over,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformancePrediction {
    pub confidence: Confidence,
    /// Fraction of agents reused from the store, in `[0, 1]`.
    pub reuse_fraction: f64,
    pub provisioning: Provisioning,
    /// Human-readable reasons behind the label.
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Executable crew specification handed to the generation/execution collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewSpec {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub domain: Domain,
    pub complexity: Complexity,
    pub agents: Vec<AgentSlot>,
    pub tasks: Vec<TaskSpec>,
    pub process: Process,
    pub prediction: PerformancePrediction,
    pub created_at: DateTime<Utc>,
}

impl CrewSpec {
    pub fn reused_agent_count(&self) -> usize {
        self.agents.iter().filter(|a| a.is_reused()).count()
    }

    /// IDs of every store agent this crew references.
    pub fn referenced_agents(&self) -> Vec<Uuid> {
        self.agents.iter().filter_map(AgentSlot::existing_id).collect()
    }

    /// Check non-emptiness and index bounds. Cycle detection is the
    /// orchestrator's job.
    pub fn check_structure(&self) -> Result<(), String> {
        if self.agents.is_empty() {
            return Err("crew has no agents".to_string());
        }
        if self.tasks.is_empty() {
            return Err("crew has no tasks".to_string());
        }
        for (idx, task) in self.tasks.iter().enumerate() {
            if task.assigned_agent >= self.agents.len() {
                return Err(format!(
                    "task {idx} is assigned to missing agent {}",
                    task.assigned_agent
                ));
            }
            if let Some(dep) = task.depends_on.iter().find(|d| **d >= self.tasks.len()) {
                return Err(format!("task {idx} depends on missing task {dep}"));
            }
            if task.depends_on.contains(&idx) {
                return Err(format!("task {idx} depends on itself"));
            }
        }
        Ok(())
    }
}

/// Outcome of comparing a designed agent against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Reuse,
    Create,
}

/// Transient result of the reuse matcher for one candidate agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReuseDecision {
    pub candidate: AgentSpec,
    pub matched_existing: Option<AgentReference>,
    /// In `[0, 1]`.
    pub similarity_score: f64,
    pub decision: Decision,
}

impl ReuseDecision {
    /// A `create` decision with no match.
    pub fn create(candidate: AgentSpec) -> Self {
        Self {
            candidate,
            matched_existing: None,
            similarity_score: 0.0,
            decision: Decision::Create,
        }
    }

    /// The crew slot this decision resolves to.
    pub fn into_slot(self) -> AgentSlot {
        match (self.decision, self.matched_existing) {
            (Decision::Reuse, Some(agent)) => AgentSlot::Existing { agent },
            _ => AgentSlot::New {
                spec: self.candidate,
            },
        }
    }
}
