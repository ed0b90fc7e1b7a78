use crate::affinity::AffinityTable;
use crate::analyzer::{build_analyzer, Analyzer};
use crate::assembler::{predict, CrewOrchestrator};
use crate::config::OrchestratorConfig;
use crate::designer::AgentDesigner;
use crate::matcher::ReuseMatcher;
use crate::naming::{disambiguate, normalize_name, slug_from_description};
use chrono::Utc;
use crewmaster_core::{
    AgentRecord, AgentReference, AgentSlot, AgentSpec, CreationFailure, CrewSpec, CrewmasterError, CrewmasterResult, Decision,
    ReuseDecision, TaskProfile,
};
use crewmaster_llm::LlmBackend;
use crewmaster_store::{AgentFilter, ClaimGuard, CrewStore, IdentifierClaims};
use crewmaster_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Input to [`CrewFactory::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub description: String,
    /// Crew name; generated from the description when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Consult the store for reusable agents.
    #[serde(default = "default_reuse")]
    pub reuse: bool,
}

fn default_reuse() -> bool {
    true
}

impl CreateRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            name: None,
            reuse: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn without_reuse(mut self) -> Self {
        self.reuse = false;
        self
    }
}

/// A crew with the full records of its agents, as written by `export`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewExport {
    pub crew: CrewSpec,
    /// One record per slot of `crew.agents`, in slot order.
    pub agents: Vec<AgentRecord>,
}

/// The crew creation pipeline: analyze, design, match, assemble, persist.
///
/// Each call runs the stages in order and either returns a complete,
/// persisted crew or an error; nothing is stored on failure.
pub struct CrewFactory {
    analyzer: Arc<dyn Analyzer>,
    designer: AgentDesigner,
    matcher: ReuseMatcher,
    orchestrator: CrewOrchestrator,
    store: Arc<dyn CrewStore>,
    claims: IdentifierClaims,
}

impl CrewFactory {
    /// Build the pipeline from configuration.
    ///
    /// `backend` is only used when the analysis mode is `model`.
    pub fn new(
        registry: Arc<ToolRegistry>,
        config: &OrchestratorConfig,
        store: Arc<dyn CrewStore>,
        backend: Option<Arc<dyn LlmBackend>>,
    ) -> CrewmasterResult<Self> {
        config.validate()?;
        let analyzer = build_analyzer(Arc::clone(&registry), &config.analysis, backend)?;
        let table = match &config.affinity {
            Some(templates) => AffinityTable::new(templates.clone()),
            None => AffinityTable::default(),
        };

        Ok(Self {
            analyzer,
            designer: AgentDesigner::new(
                Arc::clone(&registry),
                table,
                config.max_agents_per_crew,
            ),
            matcher: ReuseMatcher::new(config.reuse.clone()),
            orchestrator: CrewOrchestrator::new(registry),
            store,
            claims: IdentifierClaims::new(),
        })
    }

    /// Replace the analyzer, e.g. with a custom model-backed one.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Share identifier claims with other factories over the same store.
    pub fn with_claims(mut self, claims: IdentifierClaims) -> Self {
        self.claims = claims;
        self
    }

    pub fn store(&self) -> &Arc<dyn CrewStore> {
        &self.store
    }

    /// Run only the analysis stage.
    pub async fn analyze(&self, description: &str) -> CrewmasterResult<TaskProfile> {
        self.analyzer
            .analyze(description)
            .await
            .map_err(|e| surface(e, "analyzing task"))
    }

    /// Create and persist a crew for `request`.
    pub async fn create(&self, request: CreateRequest) -> CrewmasterResult<CrewSpec> {
        info!(reuse = request.reuse, "Creating crew");

        let profile = self.analyze(&request.description).await?;

        let candidates = self
            .designer
            .design(&profile)
            .map_err(|e| surface(e, "designing agents"))?;

        let decisions = if request.reuse {
            self.match_agents(&profile, candidates)
                .await
                .map_err(|e| surface(e, "matching agents"))?
        } else {
            candidates.into_iter().map(ReuseDecision::create).collect()
        };

        let claim = self
            .claim_name(
                request.name.as_deref(),
                slug_from_description(&request.description),
            )
            .await
            .map_err(|e| surface(e, "naming crew"))?;

        let crew = self
            .orchestrator
            .assemble(&profile, decisions, claim.id())
            .map_err(|e| surface(e, "assembling crew"))?;

        self.store
            .persist_crew(&crew)
            .await
            .map_err(|e| surface(e, "persisting crew"))?;
        drop(claim);

        info!(
            crew = %crew.name,
            id = %crew.id,
            agents = crew.agents.len(),
            reused = crew.reused_agent_count(),
            "Crew created"
        );
        Ok(crew)
    }

    /// Like [`create`](Self::create), reporting failures as a [`CreationFailure`].
    pub async fn try_create(&self, request: CreateRequest) -> Result<CrewSpec, CreationFailure> {
        self.create(request)
            .await
            .map_err(|e| CreationFailure::from(&e))
    }

    /// Copy a stored crew under a new name and id.
    ///
    /// The copy references the same stored agents; they are shared, not
    /// duplicated.
    pub async fn clone_crew(&self, id: Uuid, new_name: Option<&str>) -> CrewmasterResult<CrewSpec> {
        let source = self
            .store
            .load_crew(id)
            .await?
            .ok_or_else(|| CrewmasterError::Store(format!("crew {id} not found")))?;
        let members = self.store.crew_members(id).await?;
        if members.len() != source.agents.len() {
            return Err(CrewmasterError::Store(format!(
                "crew {id} has {} agents but {} stored members",
                source.agents.len(),
                members.len()
            )));
        }

        let claim = self
            .claim_name(new_name, format!("{}-copy", source.name))
            .await
            .map_err(|e| e.context(format!("cloning crew {id}")))?;

        let agents: Vec<AgentSlot> = members
            .into_iter()
            .map(|agent| AgentSlot::Existing { agent })
            .collect();
        let crew = self.store_copy(claim, source, agents, "cloning crew").await?;

        info!(source = %id, crew = %crew.name, id = %crew.id, "Crew cloned");
        Ok(crew)
    }

    /// A stored crew together with the records of its agents, in slot order.
    pub async fn export_crew(&self, id: Uuid) -> CrewmasterResult<CrewExport> {
        let crew = self
            .store
            .load_crew(id)
            .await?
            .ok_or_else(|| CrewmasterError::Store(format!("crew {id} not found")))?;
        let mut agents = Vec::with_capacity(crew.agents.len());
        for member in self.store.crew_members(id).await? {
            let record = self.store.get_agent(member.id).await?.ok_or_else(|| {
                CrewmasterError::Store(format!(
                    "crew '{}' references missing agent {}",
                    crew.name, member.id
                ))
            })?;
            agents.push(record);
        }
        Ok(CrewExport { crew, agents })
    }

    /// Store an exported crew under a fresh id.
    ///
    /// Agents this store already knows are referenced; the others are
    /// registered as new agents. Without `new_name` the exported name is
    /// kept, with a numeric suffix if it is taken.
    pub async fn import_crew(
        &self,
        export: CrewExport,
        new_name: Option<&str>,
    ) -> CrewmasterResult<CrewSpec> {
        let CrewExport { crew: source, agents: records } = export;
        if records.len() != source.agents.len() {
            return Err(CrewmasterError::Store(format!(
                "export of crew '{}' lists {} agents for {} slots",
                source.name,
                records.len(),
                source.agents.len()
            )));
        }

        let mut base = normalize_name(&source.name);
        if base.is_empty() {
            base = "crew".to_string();
        }
        let claim = self
            .claim_name(new_name, base)
            .await
            .map_err(|e| e.context(format!("importing crew '{}'", source.name)))?;

        let mut agents = Vec::with_capacity(records.len());
        for record in records {
            let slot = match self.store.get_agent(record.id).await? {
                Some(stored) => AgentSlot::Existing {
                    agent: AgentReference {
                        id: stored.id,
                        role: stored.spec.role,
                    },
                },
                None => AgentSlot::New { spec: record.spec },
            };
            agents.push(slot);
        }
        let source_name = source.name.clone();
        let crew = self.store_copy(claim, source, agents, "importing crew").await?;

        info!(
            source = %source_name,
            crew = %crew.name,
            id = %crew.id,
            reused = crew.reused_agent_count(),
            "Crew imported"
        );
        Ok(crew)
    }

    /// Persist `source` under the claimed name with new agent slots.
    async fn store_copy(
        &self,
        claim: ClaimGuard,
        source: CrewSpec,
        agents: Vec<AgentSlot>,
        stage: &str,
    ) -> CrewmasterResult<CrewSpec> {
        let crew = CrewSpec {
            id: Uuid::new_v4(),
            name: claim.id().to_string(),
            prediction: predict(source.complexity, &agents),
            agents,
            created_at: Utc::now(),
            ..source
        };
        crew.check_structure()
            .map_err(|e| surface(CrewmasterError::Assembly(e), stage))?;

        self.store.persist_crew(&crew).await?;
        drop(claim);
        Ok(crew)
    }

    /// Reuse decisions for every candidate, in order.
    ///
    /// A stored agent fills at most one slot, and never one whose role
    /// would clash with another agent of the same crew.
    async fn match_agents(
        &self,
        profile: &TaskProfile,
        candidates: Vec<AgentSpec>,
    ) -> CrewmasterResult<Vec<ReuseDecision>> {
        let filter = AgentFilter::with_capabilities(&profile.required_capabilities);
        let existing = self.store.find_similar_agents(&filter).await?;

        let mut exclude: HashSet<Uuid> = HashSet::new();
        let mut taken_roles: BTreeSet<String> = BTreeSet::new();
        let mut decisions = Vec::with_capacity(candidates.len());

        for (idx, candidate) in candidates.iter().enumerate() {
            let others: BTreeSet<&str> = candidates
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, c)| c.role.as_str())
                .collect();

            // Agents skipped for this candidate stay available to later ones.
            let mut skip = exclude.clone();
            let decision = loop {
                let decision = self
                    .matcher
                    .evaluate(candidate, profile.domain, &existing, &skip);
                let Some(agent) = &decision.matched_existing else {
                    break decision;
                };
                if taken_roles.contains(&agent.role) || others.contains(agent.role.as_str()) {
                    warn!(
                        role = %agent.role,
                        agent = %agent.id,
                        "Stored agent role clashes with this crew; trying the next match"
                    );
                    skip.insert(agent.id);
                    continue;
                }
                exclude.insert(agent.id);
                break decision;
            };

            let role = match (&decision.decision, &decision.matched_existing) {
                (Decision::Reuse, Some(agent)) => agent.role.clone(),
                _ => candidate.role.clone(),
            };
            taken_roles.insert(role);
            decisions.push(decision);
        }

        let reused = decisions
            .iter()
            .filter(|d| d.decision == Decision::Reuse)
            .count();
        info!(
            candidates = decisions.len(),
            reused,
            considered = existing.len(),
            "Reuse resolved"
        );
        Ok(decisions)
    }

    /// Pick and claim a crew name.
    ///
    /// An explicit name must be free. A generated one gets a numeric suffix
    /// until it is neither stored nor claimed by a concurrent creation. The
    /// store is checked again once the claim is held, since a creation that
    /// released the same name has already persisted its crew.
    async fn claim_name(
        &self,
        requested: Option<&str>,
        base: String,
    ) -> CrewmasterResult<ClaimGuard> {
        if let Some(requested) = requested {
            let name = normalize_name(requested);
            if name.is_empty() {
                return Err(CrewmasterError::Analysis(format!(
                    "crew name '{requested}' has no usable characters"
                )));
            }
            let guard = self.claims.try_acquire(&name).ok_or_else(|| {
                CrewmasterError::Conflict(format!("crew name '{name}' is being created"))
            })?;
            if self.store.find_crew_by_name(&name).await?.is_some() {
                return Err(CrewmasterError::Conflict(format!(
                    "crew name '{name}' is already taken"
                )));
            }
            return Ok(guard);
        }

        let mut taken: HashSet<String> = self
            .store
            .list_crews()
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();
        loop {
            let name = disambiguate(&base, &taken);
            if let Some(guard) = self.claims.try_acquire(&name) {
                if self.store.find_crew_by_name(&name).await?.is_none() {
                    return Ok(guard);
                }
            }
            taken.insert(name);
        }
    }
}

/// Add the stage to the cause chain; internal bugs are logged as errors.
fn surface(err: CrewmasterError, stage: &str) -> CrewmasterError {
    if err.is_internal() {
        error!(stage, error = %err, "Internal error while creating crew");
    }
    err.context(stage)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crewmaster_core::{AgentRecord, CapabilityTag, Complexity, Domain};
    use crewmaster_store::InMemoryStore;
    use crewmaster_tools::register_builtins;

    fn factory(store: Arc<InMemoryStore>) -> CrewFactory {
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry).unwrap();
        CrewFactory::new(
            Arc::new(registry),
            &OrchestratorConfig::default(),
            store,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: CreateRequest =
            serde_json::from_str(r#"{"description": "Summarize a paper"}"#).unwrap();
        assert!(request.reuse);
        assert!(request.name.is_none());
        assert!(!CreateRequest::new("x").without_reuse().reuse);
    }

    #[tokio::test]
    async fn test_generated_names_skip_claimed_ones() {
        let factory = factory(Arc::new(InMemoryStore::new()));
        let held = factory.claims.try_acquire("market-report").unwrap();
        let guard = factory.claim_name(None, "market-report".into()).await.unwrap();
        assert_eq!(guard.id(), "market-report-2");
        drop(held);
    }

    #[tokio::test]
    async fn test_explicit_name_held_elsewhere_conflicts() {
        let factory = factory(Arc::new(InMemoryStore::new()));
        let _held = factory.claims.try_acquire("ev-team").unwrap();
        let err = factory.claim_name(Some("EV Team"), String::new()).await.unwrap_err();
        assert!(matches!(err, CrewmasterError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_blank_explicit_name_is_rejected() {
        let factory = factory(Arc::new(InMemoryStore::new()));
        let err = factory.claim_name(Some(" !! "), String::new()).await.unwrap_err();
        assert!(err.is_user_facing());
    }

    #[tokio::test]
    async fn test_claim_released_after_create() {
        let factory = factory(Arc::new(InMemoryStore::new()));
        let crew = factory
            .create(CreateRequest::new("Search the web for Rust news").with_name("rust-news"))
            .await
            .unwrap();
        assert_eq!(crew.name, "rust-news");
        assert!(!factory.claims.is_claimed("rust-news"));
    }

    #[tokio::test]
    async fn test_agent_skipped_for_role_clash_is_reused_by_matching_candidate() {
        let store = Arc::new(InMemoryStore::new());
        let writer = AgentRecord::new(
            AgentSpec::new("Content Writer", "Gather sources on the topic and write")
                .with_tools(["web_search"]),
            Domain::Research,
        );
        store.insert_agent(writer.clone());
        let factory = factory(store);

        let profile = TaskProfile {
            raw_description: "Research and write about solar storage".into(),
            domain: Domain::Research,
            complexity: Complexity::Moderate,
            required_capabilities: BTreeSet::from([CapabilityTag::from("web_search")]),
            estimated_steps: 2,
        };
        let candidates = vec![
            AgentSpec::new("Research Specialist", "Gather sources on the topic")
                .with_tools(["web_search"]),
            AgentSpec::new("Content Writer", "Gather sources on the topic and write")
                .with_tools(["web_search"]),
        ];

        let decisions = factory.match_agents(&profile, candidates).await.unwrap();
        assert_eq!(decisions[0].decision, Decision::Create);
        assert_eq!(decisions[1].decision, Decision::Reuse);
        assert_eq!(
            decisions[1].matched_existing.as_ref().map(|a| a.id),
            Some(writer.id)
        );
    }

    #[tokio::test]
    async fn test_try_create_reports_structured_failure() {
        let factory = factory(Arc::new(InMemoryStore::new()));
        let failure = factory.try_create(CreateRequest::new("   ")).await.unwrap_err();
        assert_eq!(failure.kind, crewmaster_core::ErrorKind::Analysis);
        assert!(failure.causes.iter().any(|c| c.contains("analyzing task")));
    }
}
