use crate::capability::CapabilityTag;
use crate::profile::Domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Default iteration cap for a freshly designed agent.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Declarative definition of one agent: role, goal, backstory, and tool access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Ordered, duplicate-free.
    pub tools: Vec<CapabilityTag>,
    #[serde(default)]
    pub allow_delegation: bool,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

impl AgentSpec {
    pub fn new(role: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: String::new(),
            tools: Vec::new(),
            allow_delegation: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    /// Append tools, skipping any already present.
    pub fn with_tools<I, T>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<CapabilityTag>,
    {
        for tool in tools {
            let tool = tool.into();
            if !self.tools.contains(&tool) {
                self.tools.push(tool);
            }
        }
        self
    }

    pub fn tool_set(&self) -> BTreeSet<CapabilityTag> {
        self.tools.iter().cloned().collect()
    }
}

/// An agent previously created and kept by the agent store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: Uuid,
    pub spec: AgentSpec,
    pub domain: Domain,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_count: u32,
}

impl AgentRecord {
    pub fn new(spec: AgentSpec, domain: Domain) -> Self {
        Self {
            id: Uuid::new_v4(),
            spec,
            domain,
            created_at: Utc::now(),
            last_used: None,
            usage_count: 0,
        }
    }

    /// Timestamp used to rank warm agents: last use, else creation time.
    pub fn recency(&self) -> DateTime<Utc> {
        self.last_used.unwrap_or(self.created_at)
    }

    pub fn mark_used(&mut self, at: DateTime<Utc>) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.last_used = Some(at);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_with_tools_deduplicates_and_keeps_order() {
        let spec = AgentSpec::new("Researcher", "Find sources")
            .with_tools(["web_search", "document_search", "web_search"]);
        assert_eq!(
            spec.tools,
            vec![
                CapabilityTag::from("web_search"),
                CapabilityTag::from("document_search")
            ]
        );
    }

    #[test]
    fn test_spec_defaults_on_deserialize() {
        let spec: AgentSpec = serde_json::from_str(
            r#"{"role":"Analyst","goal":"g","backstory":"b","tools":["data_processing"]}"#,
        )
        .unwrap();
        assert!(!spec.allow_delegation);
        assert_eq!(spec.max_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_record_usage_tracking() {
        let mut record = AgentRecord::new(AgentSpec::new("Writer", "Write"), Domain::Writing);
        assert_eq!(record.recency(), record.created_at);
        let now = Utc::now();
        record.mark_used(now);
        assert_eq!(record.usage_count, 1);
        assert_eq!(record.recency(), now);
    }
}
