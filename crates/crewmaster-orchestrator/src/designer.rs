use crate::affinity::{AffinityTable, RoleTemplate};
use crewmaster_core::{AgentSpec, CapabilityTag, CrewmasterError, CrewmasterResult, TaskProfile};
use crewmaster_tools::ToolRegistry;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Capabilities gathered under one template.
#[derive(Debug, Clone)]
struct Group {
    template: usize,
    capabilities: BTreeSet<CapabilityTag>,
}

/// Proposes the agents for a task profile.
///
/// Capabilities are grouped by the affinity table, one agent per group,
/// each agent receiving only its group's capabilities.
pub struct AgentDesigner {
    registry: Arc<ToolRegistry>,
    table: AffinityTable,
    max_agents: usize,
}

impl AgentDesigner {
    pub fn new(registry: Arc<ToolRegistry>, table: AffinityTable, max_agents: usize) -> Self {
        Self {
            registry,
            table,
            max_agents: max_agents.max(1),
        }
    }

    pub fn max_agents(&self) -> usize {
        self.max_agents
    }

    pub fn design(&self, profile: &TaskProfile) -> CrewmasterResult<Vec<AgentSpec>> {
        if profile.required_capabilities.is_empty() {
            return Err(CrewmasterError::Design(
                "task profile has no required capabilities".into(),
            ));
        }

        let mut groups = self.group(&profile.required_capabilities);
        while groups.len() > self.max_agents {
            self.merge_smallest(&mut groups);
        }

        let mut specs = Vec::with_capacity(groups.len());
        let mut seen_roles: HashMap<String, usize> = HashMap::new();
        for group in &groups {
            let template = &self.table.templates()[group.template];
            let tools = self.registry.order(&group.capabilities)?;
            let role = unique_role(&template.role, &mut seen_roles);
            specs.push(build_spec(template, role, tools, profile));
        }

        info!(
            agents = specs.len(),
            roles = ?specs.iter().map(|s| s.role.as_str()).collect::<Vec<_>>(),
            "Agents designed"
        );
        Ok(specs)
    }

    /// One group per claiming template, in table order.
    fn group(&self, capabilities: &BTreeSet<CapabilityTag>) -> Vec<Group> {
        let mut by_template: Vec<Group> = Vec::new();
        for tag in capabilities {
            let template = self.table.claim(tag);
            match by_template.iter_mut().find(|g| g.template == template) {
                Some(group) => {
                    group.capabilities.insert(tag.clone());
                }
                None => by_template.push(Group {
                    template,
                    capabilities: BTreeSet::from([tag.clone()]),
                }),
            }
        }
        by_template.sort_by_key(|g| g.template);
        by_template
    }

    /// How specific a group's role is: catch-all least, then by how narrow
    /// its template is.
    fn specificity(&self, group: &Group) -> usize {
        let template = &self.table.templates()[group.template];
        if template.is_catch_all() {
            0
        } else {
            usize::MAX - template.capabilities.len()
        }
    }

    /// Merge the smallest group into the next smallest.
    ///
    /// Smaller capability count goes first; among equals, less specific roles
    /// go first so the most specific roles are merged last. The merged group
    /// keeps the more specific role.
    fn merge_smallest(&self, groups: &mut Vec<Group>) {
        if groups.len() < 2 {
            return;
        }
        let mut order: Vec<usize> = (0..groups.len()).collect();
        order.sort_by_key(|&i| {
            (
                groups[i].capabilities.len(),
                self.specificity(&groups[i]),
                std::cmp::Reverse(groups[i].template),
            )
        });
        let (victim, target) = (order[0], order[1]);

        let absorbed = groups[victim].clone();
        let survivor_template =
            if self.specificity(&absorbed) > self.specificity(&groups[target]) {
                absorbed.template
            } else {
                groups[target].template
            };
        debug!(
            from = %self.table.templates()[absorbed.template].role,
            into = %self.table.templates()[groups[target].template].role,
            "Merging agent groups"
        );
        groups[target].capabilities.extend(absorbed.capabilities);
        groups[target].template = survivor_template;
        groups.remove(victim);
        groups.sort_by_key(|g| g.template);
    }
}

fn unique_role(base: &str, seen: &mut HashMap<String, usize>) -> String {
    let count = seen.entry(base.to_string()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base.to_string()
    } else {
        format!("{base} {count}")
    }
}

fn build_spec(
    template: &RoleTemplate,
    role: String,
    tools: Vec<CapabilityTag>,
    profile: &TaskProfile,
) -> AgentSpec {
    let goal = format!(
        "{} {} for: {}",
        template.goal.trim(),
        profile.domain.deliverable(),
        profile.raw_description
    );
    let mut spec = AgentSpec::new(role, goal)
        .with_backstory(template.backstory.clone())
        .with_tools(tools);
    spec.allow_delegation = template.allow_delegation;
    spec.max_iterations = template.max_iterations;
    spec
}
