use crate::store::{
    agent_in_use, id_conflict, name_conflict, plan_members, AgentFilter, CrewStore, StoredCrew,
};
use async_trait::async_trait;
use chrono::Utc;
use crewmaster_core::{AgentRecord, AgentReference, CrewSpec, CrewmasterError, CrewmasterResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    agents: HashMap<Uuid, AgentRecord>,
    crews: HashMap<Uuid, StoredCrew>,
}

/// Process-local store. Used by tests and by callers that do not need
/// durability.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing agent.
    pub fn insert_agent(&self, record: AgentRecord) {
        self.inner.write().agents.insert(record.id, record);
    }

    pub fn agent_count(&self) -> usize {
        self.inner.read().agents.len()
    }
}

#[async_trait]
impl CrewStore for InMemoryStore {
    async fn find_similar_agents(&self, filter: &AgentFilter) -> CrewmasterResult<Vec<AgentRecord>> {
        Ok(filter.select(self.inner.read().agents.values()))
    }

    async fn persist_crew(&self, crew: &CrewSpec) -> CrewmasterResult<Uuid> {
        let mut inner = self.inner.write();

        if inner.crews.contains_key(&crew.id) {
            return Err(id_conflict(crew.id));
        }
        if inner.crews.values().any(|s| s.crew.name == crew.name) {
            return Err(name_conflict(&crew.name));
        }

        let (members, upserts) = plan_members(crew, &inner.agents, Utc::now())?;
        for record in upserts {
            inner.agents.insert(record.id, record);
        }
        inner.crews.insert(
            crew.id,
            StoredCrew {
                crew: crew.clone(),
                members,
            },
        );

        info!(crew = %crew.name, id = %crew.id, "Crew persisted");
        Ok(crew.id)
    }

    async fn load_crew(&self, id: Uuid) -> CrewmasterResult<Option<CrewSpec>> {
        Ok(self.inner.read().crews.get(&id).map(|s| s.crew.clone()))
    }

    async fn crew_members(&self, id: Uuid) -> CrewmasterResult<Vec<AgentReference>> {
        self.inner
            .read()
            .crews
            .get(&id)
            .map(|s| s.members.clone())
            .ok_or_else(|| CrewmasterError::Store(format!("crew {id} not found")))
    }

    async fn list_crews(&self) -> CrewmasterResult<Vec<CrewSpec>> {
        let mut crews: Vec<CrewSpec> = self
            .inner
            .read()
            .crews
            .values()
            .map(|s| s.crew.clone())
            .collect();
        crews.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(crews)
    }

    async fn find_crew_by_name(&self, name: &str) -> CrewmasterResult<Option<CrewSpec>> {
        Ok(self
            .inner
            .read()
            .crews
            .values()
            .find(|s| s.crew.name == name)
            .map(|s| s.crew.clone()))
    }

    async fn get_agent(&self, id: Uuid) -> CrewmasterResult<Option<AgentRecord>> {
        Ok(self.inner.read().agents.get(&id).cloned())
    }

    async fn delete_crew(&self, id: Uuid) -> CrewmasterResult<bool> {
        let removed = self.inner.write().crews.remove(&id).is_some();
        if removed {
            info!(id = %id, "Crew deleted");
        }
        Ok(removed)
    }

    async fn delete_agent(&self, id: Uuid) -> CrewmasterResult<bool> {
        let mut inner = self.inner.write();
        if !inner.agents.contains_key(&id) {
            return Ok(false);
        }
        if let Some(user) = inner
            .crews
            .values()
            .find(|s| s.members.iter().any(|m| m.id == id))
        {
            return Err(agent_in_use(id, &user.crew.name));
        }
        inner.agents.remove(&id);
        info!(id = %id, "Agent deleted");
        Ok(true)
    }
}
