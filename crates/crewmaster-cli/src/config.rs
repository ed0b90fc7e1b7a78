use crewmaster_llm::ModelConfig;
use crewmaster_orchestrator::OrchestratorConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "crewmaster.toml";

#[derive(Debug, Deserialize)]
pub struct CrewmasterConfig {
    /// Directory of the JSON crew store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Language model used when `orchestrator.analysis.mode = "model"`.
    #[serde(default)]
    pub model: Option<ModelConfig>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for CrewmasterConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            orchestrator: OrchestratorConfig::default(),
            model: None,
        }
    }
}

impl CrewmasterConfig {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.orchestrator.validate()?;
        Ok(config)
    }

    /// Load `path`, or `crewmaster.toml` if it exists, or the defaults.
    ///
    /// An explicitly given path must exist.
    pub async fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !tokio::fs::try_exists(&fallback).await.unwrap_or(false) {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        Self::parse(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e))
    }
}
