use crate::affinity::RoleTemplate;
use crewmaster_core::{CrewmasterError, CrewmasterResult};
use serde::{Deserialize, Serialize};

/// Settings for the crew creation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_agents")]
    pub max_agents_per_crew: usize,
    #[serde(default)]
    pub reuse: ReuseConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Replaces the built-in capability affinity table when set.
    #[serde(default)]
    pub affinity: Option<Vec<RoleTemplate>>,
}

fn default_max_agents() -> usize {
    5
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_agents_per_crew: default_max_agents(),
            reuse: ReuseConfig::default(),
            analysis: AnalysisConfig::default(),
            affinity: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> CrewmasterResult<()> {
        if self.max_agents_per_crew == 0 {
            return Err(CrewmasterError::Config(
                "max_agents_per_crew must be at least 1".into(),
            ));
        }
        self.reuse.validate()?;
        if self.analysis.max_description_length == 0 {
            return Err(CrewmasterError::Config(
                "analysis.max_description_length must be at least 1".into(),
            ));
        }
        if self.analysis.model_deadline_secs == 0 {
            return Err(CrewmasterError::Config(
                "analysis.model_deadline_secs must be at least 1".into(),
            ));
        }
        if let Some(table) = &self.affinity {
            if table.is_empty() {
                return Err(CrewmasterError::Config("affinity table is empty".into()));
            }
            if let Some(t) = table.iter().find(|t| t.role.trim().is_empty()) {
                return Err(CrewmasterError::Config(format!(
                    "affinity template with capabilities {:?} has an empty role",
                    t.capabilities
                )));
            }
        }
        Ok(())
    }
}

/// Reuse matcher weights and threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReuseConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_tool_weight")]
    pub tool_weight: f64,
    #[serde(default = "default_text_weight")]
    pub text_weight: f64,
    #[serde(default = "default_domain_weight")]
    pub domain_weight: f64,
}

fn default_threshold() -> f64 {
    0.75
}

fn default_tool_weight() -> f64 {
    0.5
}

fn default_text_weight() -> f64 {
    0.3
}

fn default_domain_weight() -> f64 {
    0.2
}

impl Default for ReuseConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            tool_weight: default_tool_weight(),
            text_weight: default_text_weight(),
            domain_weight: default_domain_weight(),
        }
    }
}

impl ReuseConfig {
    pub fn validate(&self) -> CrewmasterResult<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(CrewmasterError::Config(format!(
                "reuse.threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        let weights = [self.tool_weight, self.text_weight, self.domain_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(CrewmasterError::Config(
                "reuse weights must be finite and non-negative".into(),
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(CrewmasterError::Config(
                "at least one reuse weight must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Which analyzer the pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerMode {
    /// Keyword and structure based; no external calls.
    #[default]
    Deterministic,
    /// Ask a language model, falling back to deterministic analysis.
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum description length in characters.
    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,
    #[serde(default)]
    pub mode: AnalyzerMode,
    /// Bound on one model-backed analysis, provider retries included.
    #[serde(default = "default_model_deadline_secs")]
    pub model_deadline_secs: u64,
}

fn default_max_description_length() -> usize {
    10_000
}

fn default_model_deadline_secs() -> u64 {
    120
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_description_length: default_max_description_length(),
            mode: AnalyzerMode::default(),
            model_deadline_secs: default_model_deadline_secs(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: OrchestratorConfig = toml::from_str("").unwrap();
        assert_eq!(config, OrchestratorConfig::default());
        assert_eq!(config.max_agents_per_crew, 5);
        assert_eq!(config.reuse.threshold, 0.75);
        assert_eq!(config.analysis.mode, AnalyzerMode::Deterministic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config: OrchestratorConfig = toml::from_str(
            r#"
            max_agents_per_crew = 3
            [reuse]
            threshold = 0.9
            [analysis]
            mode = "model"
            model_deadline_secs = 45
            "#,
        )
        .unwrap();
        assert_eq!(config.max_agents_per_crew, 3);
        assert_eq!(config.reuse.threshold, 0.9);
        assert_eq!(config.reuse.tool_weight, 0.5);
        assert_eq!(config.analysis.mode, AnalyzerMode::Model);
        assert_eq!(config.analysis.max_description_length, 10_000);
        assert_eq!(config.analysis.model_deadline_secs, 45);
        assert_eq!(AnalysisConfig::default().model_deadline_secs, 120);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_agents = OrchestratorConfig {
            max_agents_per_crew: 0,
            ..OrchestratorConfig::default()
        };
        assert!(zero_agents.validate().is_err());

        let mut bad_threshold = OrchestratorConfig::default();
        bad_threshold.reuse.threshold = 1.5;
        assert!(bad_threshold.validate().is_err());

        let mut no_weights = OrchestratorConfig::default();
        no_weights.reuse.tool_weight = 0.0;
        no_weights.reuse.text_weight = 0.0;
        no_weights.reuse.domain_weight = 0.0;
        assert!(no_weights.validate().is_err());

        let mut no_deadline = OrchestratorConfig::default();
        no_deadline.analysis.model_deadline_secs = 0;
        assert!(no_deadline.validate().is_err());
    }
}
