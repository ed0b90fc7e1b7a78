use crewmaster_core::{CapabilityTag, DEFAULT_MAX_ITERATIONS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A role and the capabilities that belong together under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTemplate {
    pub role: String,
    pub capabilities: BTreeSet<CapabilityTag>,
    /// Goal prefix; the designer appends the domain deliverable and the task.
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub allow_delegation: bool,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

impl RoleTemplate {
    /// A template with no capabilities absorbs anything no other template claims.
    pub fn is_catch_all(&self) -> bool {
        self.capabilities.is_empty()
    }
}

/// Capability-affinity table: ordered role templates.
///
/// The first template listing a capability claims it. A catch-all template
/// (empty capability set) collects the rest; if the table has none, a
/// generic one is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityTable {
    templates: Vec<RoleTemplate>,
}

impl AffinityTable {
    pub fn new(mut templates: Vec<RoleTemplate>) -> Self {
        if !templates.iter().any(RoleTemplate::is_catch_all) {
            templates.push(generalist());
        }
        Self { templates }
    }

    pub fn templates(&self) -> &[RoleTemplate] {
        &self.templates
    }

    /// Index of the template that claims `tag`.
    pub fn claim(&self, tag: &CapabilityTag) -> usize {
        self.templates
            .iter()
            .position(|t| t.capabilities.contains(tag))
            .or_else(|| self.templates.iter().position(RoleTemplate::is_catch_all))
            .unwrap_or(self.templates.len().saturating_sub(1))
    }
}

impl Default for AffinityTable {
    fn default() -> Self {
        Self::new(default_templates())
    }
}

fn template(
    role: &str,
    capabilities: &[&str],
    goal: &str,
    backstory: &str,
) -> RoleTemplate {
    RoleTemplate {
        role: role.to_string(),
        capabilities: capabilities.iter().map(|c| CapabilityTag::from(*c)).collect(),
        goal: goal.to_string(),
        backstory: backstory.to_string(),
        allow_delegation: false,
        max_iterations: DEFAULT_MAX_ITERATIONS,
    }
}

fn generalist() -> RoleTemplate {
    template(
        "Task Specialist",
        &[],
        "Reason through the task and deliver",
        "A versatile generalist who breaks problems down, reasons carefully, \
         and fills the gaps between specialists.",
    )
}

/// Built-in role templates, most specific first.
pub fn default_templates() -> Vec<RoleTemplate> {
    vec![
        template(
            "Research Specialist",
            &["web_search", "web_scraping", "document_search", "youtube_search"],
            "Gather and verify information to produce",
            "An experienced researcher skilled at finding reliable sources, \
             cross-checking facts, and distilling what matters.",
        ),
        template(
            "Technical Analyst",
            &["code_execution", "file_operations", "github_search"],
            "Build, run, and inspect technical artifacts to produce",
            "A pragmatic engineer comfortable with code, repositories, and \
             file-based workflows.",
        ),
        template(
            "Data Analyst",
            &["data_processing", "database_search"],
            "Query, process, and interpret data to produce",
            "A meticulous analyst who turns raw data into clear, defensible \
             conclusions.",
        ),
        template(
            "Integration Engineer",
            &["api_calls", "browser_automation"],
            "Connect to external services and automate interactions to produce",
            "An automation specialist fluent in APIs and browser workflows.",
        ),
        template(
            "Vision Specialist",
            &["vision"],
            "Interpret and create visual material to produce",
            "A visual analyst who reads images and diagrams as easily as text.",
        ),
        generalist(),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crewmaster_tools::BUILTIN_CAPABILITIES;

    #[test]
    fn test_every_builtin_is_claimed() {
        let table = AffinityTable::default();
        for (tag, _, _) in BUILTIN_CAPABILITIES {
            let idx = table.claim(&CapabilityTag::from(*tag));
            assert!(idx < table.templates().len());
        }
        let reasoning = table.claim(&CapabilityTag::reasoning());
        assert_eq!(table.templates()[reasoning].role, "Task Specialist");
    }

    #[test]
    fn test_research_group() {
        let table = AffinityTable::default();
        let idx = table.claim(&"web_search".into());
        assert_eq!(table.templates()[idx].role, "Research Specialist");
        assert_eq!(idx, table.claim(&"document_search".into()));
    }

    #[test]
    fn test_custom_table_gets_catch_all() {
        let table = AffinityTable::new(vec![template("Scout", &["web_search"], "Scout", "")]);
        assert_eq!(table.templates().len(), 2);
        assert_eq!(table.claim(&"vision".into()), 1);
    }

    #[test]
    fn test_table_loads_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            affinity: Vec<RoleTemplate>,
        }
        let parsed: Wrapper = toml::from_str(
            r#"
            [[affinity]]
            role = "Market Researcher"
            capabilities = ["web_search", "document_search"]
            goal = "Map the market to produce"
            backstory = "Knows every analyst report."
            "#,
        )
        .unwrap();
        let table = AffinityTable::new(parsed.affinity);
        assert_eq!(table.templates()[0].max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(table.templates()[table.claim(&"web_search".into())].role, "Market Researcher");
    }
}
