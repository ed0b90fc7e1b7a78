use crate::store::{
    agent_in_use, id_conflict, name_conflict, plan_members, AgentFilter, CrewStore, StoredCrew,
};
use async_trait::async_trait;
use chrono::Utc;
use crewmaster_core::{AgentRecord, AgentReference, CrewSpec, CrewmasterError, CrewmasterResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// File-based store: one JSON file per crew plus a single agents file.
///
/// ```text
/// <dir>/agents.json
/// <dir>/crews/<uuid>.json
/// ```
///
/// Writes go through a temp file and a rename, so readers never observe a
/// half-written file. Writers are serialized by an async mutex. Persisting a
/// crew stages both files first and renames the crew file last, restoring
/// the agents file if that final step fails.
pub struct FileCrewStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCrewStore {
    pub async fn new(dir: PathBuf) -> CrewmasterResult<Self> {
        tokio::fs::create_dir_all(dir.join("crews")).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn agents_path(&self) -> PathBuf {
        self.dir.join("agents.json")
    }

    fn crew_path(&self, id: Uuid) -> PathBuf {
        self.dir.join("crews").join(format!("{id}.json"))
    }

    async fn read_agents(&self) -> CrewmasterResult<HashMap<Uuid, AgentRecord>> {
        let path = self.agents_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let data = tokio::fs::read_to_string(&path).await?;
        let records: Vec<AgentRecord> = serde_json::from_str(&data)
            .map_err(|e| CrewmasterError::Store(format!("Failed to parse agents file: {e}")))?;
        Ok(records.into_iter().map(|r| (r.id, r)).collect())
    }

    async fn read_crew(&self, path: &Path) -> CrewmasterResult<StoredCrew> {
        let data = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&data).map_err(|e| {
            CrewmasterError::Store(format!("Failed to parse crew {}: {e}", path.display()))
        })
    }

    async fn read_all_crews(&self) -> CrewmasterResult<Vec<StoredCrew>> {
        let mut entries = tokio::fs::read_dir(self.dir.join("crews")).await?;
        let mut crews = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_crew_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
                .is_some_and(|stem| Uuid::parse_str(stem).is_ok());
            if !is_crew_file {
                continue;
            }
            match self.read_crew(&path).await {
                Ok(stored) => crews.push(stored),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable crew file"),
            }
        }
        Ok(crews)
    }

    async fn write_atomic(&self, path: &Path, json: String) -> CrewmasterResult<()> {
        let tmp = temp_path(path);
        if let Err(e) = tokio::fs::write(&tmp, json).await {
            discard(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            discard(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Put the previous agents file back, or remove it if there was none.
    async fn restore_agents(&self, previous: Option<String>) {
        let path = self.agents_path();
        let restored = match previous {
            Some(data) => self.write_atomic(&path, data).await,
            None => tokio::fs::remove_file(&path).await.map_err(Into::into),
        };
        if let Err(e) = restored {
            error!(path = %path.display(), error = %e, "Failed to restore agents file");
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove temp file");
        }
    }
}

#[async_trait]
impl CrewStore for FileCrewStore {
    async fn find_similar_agents(&self, filter: &AgentFilter) -> CrewmasterResult<Vec<AgentRecord>> {
        let agents = self.read_agents().await?;
        Ok(filter.select(agents.values()))
    }

    async fn persist_crew(&self, crew: &CrewSpec) -> CrewmasterResult<Uuid> {
        let _guard = self.write_lock.lock().await;

        let path = self.crew_path(crew.id);
        if path.exists() {
            return Err(id_conflict(crew.id));
        }
        if self
            .read_all_crews()
            .await?
            .iter()
            .any(|s| s.crew.name == crew.name)
        {
            return Err(name_conflict(&crew.name));
        }

        let mut agents = self.read_agents().await?;
        let (members, upserts) = plan_members(crew, &agents, Utc::now())?;
        for record in upserts {
            agents.insert(record.id, record);
        }

        let mut records: Vec<&AgentRecord> = agents.values().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let stored = StoredCrew {
            crew: crew.clone(),
            members,
        };
        // Both files are staged before either is renamed into place, and the
        // crew file lands last: a failure leaves the agents file as it was.
        let agents_path = self.agents_path();
        let agents_tmp = temp_path(&agents_path);
        let crew_tmp = temp_path(&path);
        let previous = if agents_path.exists() {
            Some(tokio::fs::read_to_string(&agents_path).await?)
        } else {
            None
        };
        let staged = async {
            tokio::fs::write(&agents_tmp, serde_json::to_string_pretty(&records)?).await?;
            tokio::fs::write(&crew_tmp, serde_json::to_string_pretty(&stored)?).await?;
            CrewmasterResult::Ok(())
        }
        .await;
        if let Err(e) = staged {
            discard(&agents_tmp).await;
            discard(&crew_tmp).await;
            return Err(e);
        }

        if let Err(e) = tokio::fs::rename(&agents_tmp, &agents_path).await {
            discard(&agents_tmp).await;
            discard(&crew_tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&crew_tmp, &path).await {
            discard(&crew_tmp).await;
            self.restore_agents(previous).await;
            return Err(e.into());
        }

        info!(crew = %crew.name, id = %crew.id, path = %path.display(), "Crew persisted");
        Ok(crew.id)
    }

    async fn load_crew(&self, id: Uuid) -> CrewmasterResult<Option<CrewSpec>> {
        let path = self.crew_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(self.read_crew(&path).await?.crew))
    }

    async fn crew_members(&self, id: Uuid) -> CrewmasterResult<Vec<AgentReference>> {
        let path = self.crew_path(id);
        if !path.exists() {
            return Err(CrewmasterError::Store(format!("crew {id} not found")));
        }
        Ok(self.read_crew(&path).await?.members)
    }

    async fn list_crews(&self) -> CrewmasterResult<Vec<CrewSpec>> {
        let mut crews: Vec<CrewSpec> = self
            .read_all_crews()
            .await?
            .into_iter()
            .map(|s| s.crew)
            .collect();
        crews.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(crews)
    }

    async fn find_crew_by_name(&self, name: &str) -> CrewmasterResult<Option<CrewSpec>> {
        Ok(self
            .read_all_crews()
            .await?
            .into_iter()
            .map(|s| s.crew)
            .find(|c| c.name == name))
    }

    async fn get_agent(&self, id: Uuid) -> CrewmasterResult<Option<AgentRecord>> {
        Ok(self.read_agents().await?.remove(&id))
    }

    async fn delete_crew(&self, id: Uuid) -> CrewmasterResult<bool> {
        let _guard = self.write_lock.lock().await;
        let path = self.crew_path(id);
        if !path.exists() {
            return Ok(false);
        }
        tokio::fs::remove_file(&path).await?;
        info!(id = %id, "Crew deleted");
        Ok(true)
    }

    async fn delete_agent(&self, id: Uuid) -> CrewmasterResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut agents = self.read_agents().await?;
        if !agents.contains_key(&id) {
            return Ok(false);
        }
        let crews = self.read_all_crews().await?;
        if let Some(user) = crews.iter().find(|s| s.members.iter().any(|m| m.id == id)) {
            return Err(agent_in_use(id, &user.crew.name));
        }
        agents.remove(&id);
        let mut records: Vec<&AgentRecord> = agents.values().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        self.write_atomic(&self.agents_path(), serde_json::to_string_pretty(&records)?)
            .await?;
        info!(id = %id, "Agent deleted");
        Ok(true)
    }
}
