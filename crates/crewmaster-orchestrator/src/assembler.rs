use crate::graph;
use chrono::Utc;
use crewmaster_core::{
    AgentSlot, Complexity, Confidence, CrewSpec, CrewmasterError, CrewmasterResult,
    PerformancePrediction, Process, Provisioning, ReuseDecision, TaskProfile, TaskSpec,
};
use crewmaster_tools::ToolRegistry;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Reuse fraction at which confidence is raised.
const HIGH_REUSE_FRACTION: f64 = 0.5;

/// Turns resolved agents into an executable crew: tasks, dependency
/// wiring, process and performance prediction.
pub struct CrewOrchestrator {
    registry: Arc<ToolRegistry>,
}

impl CrewOrchestrator {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Assemble a crew from the reuse decisions, in designer order.
    ///
    /// The result is checked before it is returned; a structural problem or
    /// dependency cycle is an `Assembly` error and no crew is produced.
    pub fn assemble(
        &self,
        profile: &TaskProfile,
        decisions: Vec<ReuseDecision>,
        name: impl Into<String>,
    ) -> CrewmasterResult<CrewSpec> {
        if decisions.is_empty() {
            return Err(CrewmasterError::Assembly("no agents to assemble".into()));
        }

        let mut agents: Vec<AgentSlot> =
            decisions.into_iter().map(ReuseDecision::into_slot).collect();
        self.check_new_agents(profile, &agents)?;

        let process = select_process(profile.complexity, agents.len());
        if process == Process::Hierarchical {
            if let Some(AgentSlot::New { spec }) = agents.first_mut() {
                spec.allow_delegation = true;
            }
        }

        let tasks = build_tasks(profile, &agents, process);
        let prediction = predict(profile.complexity, &agents);

        let crew = CrewSpec {
            id: Uuid::new_v4(),
            name: name.into(),
            description: profile.raw_description.clone(),
            domain: profile.domain,
            complexity: profile.complexity,
            agents,
            tasks,
            process,
            prediction,
            created_at: Utc::now(),
        };

        crew.check_structure().map_err(CrewmasterError::Assembly)?;
        if graph::has_cycle(&crew.tasks) {
            return Err(CrewmasterError::Assembly(format!(
                "task dependency cycle in crew '{}'",
                crew.name
            )));
        }

        info!(
            crew = %crew.name,
            agents = crew.agents.len(),
            reused = crew.reused_agent_count(),
            process = %crew.process,
            confidence = %crew.prediction.confidence,
            "Crew assembled"
        );
        Ok(crew)
    }

    /// Freshly designed agents must carry registered tools drawn from the
    /// profile. Reused agents were validated when they were stored.
    fn check_new_agents(&self, profile: &TaskProfile, agents: &[AgentSlot]) -> CrewmasterResult<()> {
        for slot in agents {
            let AgentSlot::New { spec } = slot else {
                continue;
            };
            if spec.tools.is_empty() {
                return Err(CrewmasterError::Assembly(format!(
                    "agent '{}' has no tools",
                    spec.role
                )));
            }
            if let Some(extra) = spec.tools.iter().find(|t| !profile.requires(t)) {
                return Err(CrewmasterError::Assembly(format!(
                    "agent '{}' was given '{extra}', which the task does not require",
                    spec.role
                )));
            }
            self.registry
                .resolve(&spec.tools)
                .map_err(|e| e.context(format!("agent '{}'", spec.role)))?;
        }

        let mut roles = BTreeSet::new();
        if let Some(dup) = agents.iter().map(AgentSlot::role).find(|r| !roles.insert(*r)) {
            return Err(CrewmasterError::Assembly(format!("duplicate role '{dup}'")));
        }
        Ok(())
    }
}

/// Hierarchical only pays off for complex work spread over more than two agents.
pub fn select_process(complexity: Complexity, agent_count: usize) -> Process {
    if complexity == Complexity::Complex && agent_count > 2 {
        Process::Hierarchical
    } else {
        Process::Sequential
    }
}

fn build_tasks(profile: &TaskProfile, agents: &[AgentSlot], process: Process) -> Vec<TaskSpec> {
    agents
        .iter()
        .enumerate()
        .map(|(idx, slot)| {
            let depends_on = match (process, idx) {
                (_, 0) => BTreeSet::new(),
                (Process::Sequential, _) => BTreeSet::from([idx - 1]),
                (Process::Hierarchical, _) => BTreeSet::from([0]),
            };
            let description = if idx == 0 {
                profile.raw_description.clone()
            } else {
                format!(
                    "Support the main task using your {} expertise: {}",
                    slot.role(),
                    profile.raw_description
                )
            };
            let produces_final = match process {
                Process::Sequential => idx + 1 == agents.len(),
                Process::Hierarchical => idx == 0,
            };
            let expected_output = if produces_final {
                format!(
                    "{} addressing the task in full",
                    capitalize(profile.domain.deliverable())
                )
            } else {
                format!("Intermediate findings from the {} for the next step", slot.role())
            };
            debug!(task = idx, agent = %slot.role(), deps = ?depends_on, "Task wired");
            TaskSpec {
                description,
                expected_output,
                assigned_agent: idx,
                depends_on,
            }
        })
        .collect()
}

pub(crate) fn predict(complexity: Complexity, agents: &[AgentSlot]) -> PerformancePrediction {
    let count = agents.len();
    let reused = agents.iter().filter(|a| a.is_reused()).count();
    let reuse_fraction = if count == 0 {
        0.0
    } else {
        reused as f64 / count as f64
    };

    let range = complexity.ideal_agent_range();
    let provisioning = if count < *range.start() {
        Provisioning::Under
    } else if count > *range.end() {
        Provisioning::Over
    } else {
        Provisioning::Balanced
    };

    let mut points: i32 = 1;
    let mut notes = Vec::new();
    if reuse_fraction >= HIGH_REUSE_FRACTION {
        points += 1;
        notes.push(format!("{reused} of {count} agents are proven and reused"));
    } else if reused == 0 {
        notes.push("all agents are newly created".to_string());
    } else {
        notes.push(format!("{reused} of {count} agents are reused"));
    }
    match provisioning {
        Provisioning::Balanced => {
            notes.push(format!("{count} agents suit a {complexity} task"));
        }
        Provisioning::Under => {
            points -= 1;
            notes.push(format!(
                "{count} agents may be too few for a {complexity} task (ideal {}-{})",
                range.start(),
                range.end()
            ));
        }
        Provisioning::Over => {
            points -= 1;
            notes.push(format!(
                "{count} agents may be too many for a {complexity} task (ideal {}-{})",
                range.start(),
                range.end()
            ));
        }
    }

    let confidence = match points {
        p if p >= 2 => Confidence::High,
        1 => Confidence::Medium,
        _ => Confidence::Low,
    };

    PerformancePrediction {
        confidence,
        reuse_fraction,
        provisioning,
        notes,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crewmaster_core::{AgentReference, AgentSpec, CapabilityTag, Decision, Domain, ErrorKind};
    use crewmaster_tools::register_builtins;

    fn orchestrator() -> CrewOrchestrator {
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry).unwrap();
        CrewOrchestrator::new(Arc::new(registry))
    }

    fn profile(complexity: Complexity, caps: &[&str]) -> TaskProfile {
        TaskProfile {
            raw_description: "Compare cloud vendors".into(),
            domain: Domain::Analysis,
            complexity,
            required_capabilities: caps.iter().map(|c| CapabilityTag::from(*c)).collect(),
            estimated_steps: caps.len() as u32,
        }
    }

    fn fresh(role: &str, tools: &[&str]) -> ReuseDecision {
        ReuseDecision::create(AgentSpec::new(role, "goal").with_tools(tools.iter().copied()))
    }

    fn reused(role: &str, tools: &[&str]) -> ReuseDecision {
        ReuseDecision {
            candidate: AgentSpec::new(role, "goal").with_tools(tools.iter().copied()),
            matched_existing: Some(AgentReference {
                id: Uuid::new_v4(),
                role: role.into(),
            }),
            similarity_score: 0.9,
            decision: Decision::Reuse,
        }
    }

    #[test]
    fn test_sequential_chain() {
        let crew = orchestrator()
            .assemble(
                &profile(Complexity::Moderate, &["web_search", "data_processing"]),
                vec![
                    fresh("Research Specialist", &["web_search"]),
                    fresh("Data Analyst", &["data_processing"]),
                ],
                "cloud-vendors",
            )
            .unwrap();
        assert_eq!(crew.process, Process::Sequential);
        assert_eq!(crew.tasks.len(), 2);
        assert!(crew.tasks[0].depends_on.is_empty());
        assert_eq!(crew.tasks[1].depends_on, BTreeSet::from([0]));
        assert_eq!(crew.tasks[0].description, "Compare cloud vendors");
        assert_eq!(crew.tasks[1].assigned_agent, 1);
    }

    #[test]
    fn test_complex_crew_is_a_star() {
        let caps = ["web_search", "code_execution", "data_processing"];
        let crew = orchestrator()
            .assemble(
                &profile(Complexity::Complex, &caps),
                vec![
                    fresh("Research Specialist", &["web_search"]),
                    fresh("Technical Analyst", &["code_execution"]),
                    fresh("Data Analyst", &["data_processing"]),
                ],
                "star",
            )
            .unwrap();
        assert_eq!(crew.process, Process::Hierarchical);
        for task in &crew.tasks[1..] {
            assert_eq!(task.depends_on, BTreeSet::from([0]));
        }
        match &crew.agents[0] {
            AgentSlot::New { spec } => assert!(spec.allow_delegation),
            other => panic!("unexpected slot {other:?}"),
        }
        assert!(graph::topological_order(&crew.tasks).is_some());
    }

    #[test]
    fn test_complex_with_two_agents_stays_sequential() {
        assert_eq!(select_process(Complexity::Complex, 2), Process::Sequential);
        assert_eq!(select_process(Complexity::Moderate, 5), Process::Sequential);
        assert_eq!(select_process(Complexity::Complex, 3), Process::Hierarchical);
    }

    #[test]
    fn test_prediction_rewards_reuse_and_fit() {
        let crew = orchestrator()
            .assemble(
                &profile(Complexity::Simple, &["web_search"]),
                vec![reused("Research Specialist", &["web_search", "document_search"])],
                "warm",
            )
            .unwrap();
        assert_eq!(crew.prediction.confidence, Confidence::High);
        assert_eq!(crew.prediction.reuse_fraction, 1.0);
        assert_eq!(crew.prediction.provisioning, Provisioning::Balanced);
    }

    #[test]
    fn test_prediction_penalizes_under_provisioning() {
        let crew = orchestrator()
            .assemble(
                &profile(Complexity::Complex, &["web_search"]),
                vec![fresh("Research Specialist", &["web_search"])],
                "thin",
            )
            .unwrap();
        assert_eq!(crew.prediction.provisioning, Provisioning::Under);
        assert_eq!(crew.prediction.confidence, Confidence::Low);
    }

    #[test]
    fn test_new_agent_with_foreign_tool_is_rejected() {
        let err = orchestrator()
            .assemble(
                &profile(Complexity::Simple, &["web_search"]),
                vec![fresh("Research Specialist", &["web_search", "vision"])],
                "bad",
            )
            .unwrap_err();
        assert!(matches!(err, CrewmasterError::Assembly(_)));
        assert!(err.is_internal());
    }

    #[test]
    fn test_unregistered_tool_surfaces_unknown_capability() {
        let err = orchestrator()
            .assemble(
                &profile(Complexity::Simple, &["teleportation"]),
                vec![fresh("Mover", &["teleportation"])],
                "bad",
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownCapability);
    }

    #[test]
    fn test_no_decisions_is_assembly_error() {
        let err = orchestrator()
            .assemble(&profile(Complexity::Simple, &["web_search"]), vec![], "empty")
            .unwrap_err();
        assert!(matches!(err, CrewmasterError::Assembly(_)));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("a working solution"), "A working solution");
        assert_eq!(capitalize(""), "");
    }
}
