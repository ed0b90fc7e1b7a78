use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crewmaster_core::{
    AgentRecord, AgentReference, AgentSlot, CapabilityTag, CrewSpec, CrewmasterError,
    CrewmasterResult, Domain,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Persistence for agents and crews.
///
/// Implementations must be safe under concurrent reads. `persist_crew` is
/// atomic per crew: it either stores the crew and updates every member
/// agent, or changes nothing.
#[async_trait]
pub trait CrewStore: Send + Sync {
    /// Stored agents matching `filter`, best overlap first.
    async fn find_similar_agents(&self, filter: &AgentFilter) -> CrewmasterResult<Vec<AgentRecord>>;

    /// Store a crew, registering its new agents and marking reused ones as used.
    ///
    /// Fails with `Conflict` if the id or the name is already taken.
    async fn persist_crew(&self, crew: &CrewSpec) -> CrewmasterResult<Uuid>;

    async fn load_crew(&self, id: Uuid) -> CrewmasterResult<Option<CrewSpec>>;

    /// Stored agent behind each slot of a persisted crew, in slot order.
    async fn crew_members(&self, id: Uuid) -> CrewmasterResult<Vec<AgentReference>>;

    /// All crews, oldest first.
    async fn list_crews(&self) -> CrewmasterResult<Vec<CrewSpec>>;

    async fn find_crew_by_name(&self, name: &str) -> CrewmasterResult<Option<CrewSpec>>;

    async fn get_agent(&self, id: Uuid) -> CrewmasterResult<Option<AgentRecord>>;

    /// Remove a crew. Its agents stay stored, since other crews may share
    /// them. Returns `false` if no such crew exists.
    async fn delete_crew(&self, id: Uuid) -> CrewmasterResult<bool>;

    /// Remove an agent that no stored crew references.
    ///
    /// Fails with `Conflict` while a crew still uses it. Returns `false` if
    /// no such agent exists.
    async fn delete_agent(&self, id: Uuid) -> CrewmasterResult<bool>;
}

/// Query for [`CrewStore::find_similar_agents`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentFilter {
    /// Agents sharing at least one of these capabilities. Empty matches all.
    #[serde(default)]
    pub capabilities: BTreeSet<CapabilityTag>,
    #[serde(default)]
    pub domain: Option<Domain>,
    /// Case-insensitive substring of the role.
    #[serde(default)]
    pub role_contains: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AgentFilter {
    pub fn with_capabilities<'a, I>(tags: I) -> Self
    where
        I: IntoIterator<Item = &'a CapabilityTag>,
    {
        Self {
            capabilities: tags.into_iter().cloned().collect(),
            ..Self::default()
        }
    }

    fn overlap(&self, record: &AgentRecord) -> usize {
        record
            .spec
            .tools
            .iter()
            .filter(|t| self.capabilities.contains(*t))
            .count()
    }

    pub fn matches(&self, record: &AgentRecord) -> bool {
        if !self.capabilities.is_empty() && self.overlap(record) == 0 {
            return false;
        }
        if let Some(domain) = self.domain {
            if record.domain != domain {
                return false;
            }
        }
        if let Some(needle) = &self.role_contains {
            if !record
                .spec
                .role
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        true
    }

    /// Apply the filter: matching records by overlap, then recency, then id.
    pub fn select<'a, I>(&self, records: I) -> Vec<AgentRecord>
    where
        I: IntoIterator<Item = &'a AgentRecord>,
    {
        let mut hits: Vec<(usize, &AgentRecord)> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .map(|r| (self.overlap(r), r))
            .collect();
        hits.sort_by(|(oa, a), (ob, b)| {
            ob.cmp(oa)
                .then_with(|| b.recency().cmp(&a.recency()))
                .then_with(|| a.id.cmp(&b.id))
        });
        let limit = self.limit.unwrap_or(usize::MAX);
        hits.into_iter().take(limit).map(|(_, r)| r.clone()).collect()
    }
}

/// On-disk and in-memory form of a persisted crew.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredCrew {
    pub crew: CrewSpec,
    pub members: Vec<AgentReference>,
}

/// Compute the agent updates for persisting `crew` without touching `agents`.
///
/// Returns the member references and the records to upsert. Fails if a
/// reused slot points at an agent the store does not know.
pub(crate) fn plan_members(
    crew: &CrewSpec,
    agents: &HashMap<Uuid, AgentRecord>,
    now: DateTime<Utc>,
) -> CrewmasterResult<(Vec<AgentReference>, Vec<AgentRecord>)> {
    let mut members = Vec::with_capacity(crew.agents.len());
    let mut upserts: Vec<AgentRecord> = Vec::with_capacity(crew.agents.len());

    for slot in &crew.agents {
        let mut record = match slot {
            AgentSlot::New { spec } => AgentRecord::new(spec.clone(), crew.domain),
            AgentSlot::Existing { agent } => {
                // A crew may list the same stored agent twice; count each use.
                match upserts.iter().position(|r| r.id == agent.id) {
                    Some(pos) => upserts.remove(pos),
                    None => agents.get(&agent.id).cloned().ok_or_else(|| {
                        CrewmasterError::Store(format!(
                            "crew '{}' references unknown agent {}",
                            crew.name, agent.id
                        ))
                    })?,
                }
            }
        };
        record.mark_used(now);
        members.push(AgentReference {
            id: record.id,
            role: record.spec.role.clone(),
        });
        upserts.push(record);
    }

    Ok((members, upserts))
}

pub(crate) fn name_conflict(name: &str) -> CrewmasterError {
    CrewmasterError::Conflict(format!("a crew named '{name}' already exists"))
}

pub(crate) fn agent_in_use(id: Uuid, crew: &str) -> CrewmasterError {
    CrewmasterError::Conflict(format!("agent {id} is still used by crew '{crew}'"))
}

pub(crate) fn id_conflict(id: Uuid) -> CrewmasterError {
    CrewmasterError::Conflict(format!("crew id {id} already exists"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crewmaster_core::AgentSpec;

    fn record(role: &str, tools: &[&str], domain: Domain) -> AgentRecord {
        AgentRecord::new(
            AgentSpec::new(role, "goal").with_tools(tools.iter().copied()),
            domain,
        )
    }

    #[test]
    fn test_filter_requires_shared_capability() {
        let web = record("Researcher", &["web_search"], Domain::Research);
        let code = record("Engineer", &["code_execution"], Domain::Engineering);
        let filter = AgentFilter::with_capabilities(&[CapabilityTag::from("web_search")]);
        assert!(filter.matches(&web));
        assert!(!filter.matches(&code));
    }

    #[test]
    fn test_filter_orders_by_overlap() {
        let one = record("Researcher", &["web_search"], Domain::Research);
        let two = record("Analyst", &["web_search", "document_search"], Domain::Research);
        let filter = AgentFilter::with_capabilities(&[
            CapabilityTag::from("web_search"),
            CapabilityTag::from("document_search"),
        ]);
        let hits = filter.select([&one, &two]);
        assert_eq!(hits[0].id, two.id);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_filter_role_domain_and_limit() {
        let a = record("Research Specialist", &["web_search"], Domain::Research);
        let b = record("research assistant", &["web_search"], Domain::Writing);
        let filter = AgentFilter {
            role_contains: Some("RESEARCH".into()),
            domain: Some(Domain::Research),
            ..AgentFilter::default()
        };
        assert_eq!(filter.select([&a, &b]).len(), 1);

        let limited = AgentFilter {
            limit: Some(1),
            ..AgentFilter::default()
        };
        assert_eq!(limited.select([&a, &b]).len(), 1);
    }
}
