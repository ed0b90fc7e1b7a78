use crate::capability::CapabilityTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Broad domain a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Research,
    Writing,
    Analysis,
    Engineering,
    Other,
}

impl Domain {
    /// All domains, in tie-break priority order.
    pub const ALL: [Domain; 5] = [
        Domain::Research,
        Domain::Analysis,
        Domain::Engineering,
        Domain::Writing,
        Domain::Other,
    ];

    /// The kind of deliverable agents in this domain work towards.
    pub fn deliverable(&self) -> &'static str {
        match self {
            Domain::Research => "well-sourced research findings",
            Domain::Writing => "polished written content",
            Domain::Analysis => "actionable analytical insights",
            Domain::Engineering => "a working technical solution",
            Domain::Other => "a complete, accurate result",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Research => write!(f, "research"),
            Domain::Writing => write!(f, "writing"),
            Domain::Analysis => write!(f, "analysis"),
            Domain::Engineering => write!(f, "engineering"),
            Domain::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "research" => Ok(Domain::Research),
            "writing" => Ok(Domain::Writing),
            "analysis" => Ok(Domain::Analysis),
            "engineering" => Ok(Domain::Engineering),
            "other" => Ok(Domain::Other),
            other => Err(format!("unknown domain '{other}'")),
        }
    }
}

/// Complexity tier of a task. Ordered: `Simple < Moderate < Complex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    /// Agent-count range considered well provisioned for this tier.
    pub fn ideal_agent_range(&self) -> std::ops::RangeInclusive<usize> {
        match self {
            Complexity::Simple => 1..=2,
            Complexity::Moderate => 1..=3,
            Complexity::Complex => 3..=5,
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Moderate => write!(f, "moderate"),
            Complexity::Complex => write!(f, "complex"),
        }
    }
}

impl std::str::FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" | "low" => Ok(Complexity::Simple),
            "moderate" | "medium" => Ok(Complexity::Moderate),
            "complex" | "high" => Ok(Complexity::Complex),
            other => Err(format!("unknown complexity '{other}'")),
        }
    }
}

/// Structured result of analyzing one task description.
///
/// Created once per crew creation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProfile {
    pub raw_description: String,
    pub domain: Domain,
    pub complexity: Complexity,
    pub required_capabilities: BTreeSet<CapabilityTag>,
    /// Always `>= max(1, required_capabilities.len())`.
    pub estimated_steps: u32,
}

impl TaskProfile {
    pub fn requires(&self, tag: &CapabilityTag) -> bool {
        self.required_capabilities.contains(tag)
    }
}
