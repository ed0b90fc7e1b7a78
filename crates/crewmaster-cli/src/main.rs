mod config;

use clap::{Parser, Subcommand};
use config::CrewmasterConfig;
use crewmaster_llm::{LlmBackend, LlmClient};
use crewmaster_orchestrator::{AnalyzerMode, CreateRequest, CrewExport, CrewFactory};
use crewmaster_store::{CrewStore, FileCrewStore};
use crewmaster_tools::{register_builtins, ToolRegistry};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "crewmaster",
    about = "CrewMaster: assemble multi-agent crews from task descriptions"
)]
struct Cli {
    /// Path to config file (defaults to ./crewmaster.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and store a crew for a task
    Create {
        /// Free-text task description
        task: String,
        /// Crew name (generated from the task when omitted)
        #[arg(long)]
        name: Option<String>,
        /// Always create new agents instead of reusing stored ones
        #[arg(long)]
        no_reuse: bool,
    },
    /// Show the task profile without creating a crew
    Analyze {
        task: String,
    },
    /// List available capabilities
    Tools,
    /// List stored crews
    Crews,
    /// Show a stored crew and the agents behind it
    Inspect {
        id: Uuid,
    },
    /// Copy a stored crew under a new name, sharing its agents
    Clone {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a stored crew (its agents stay available for reuse)
    Delete {
        id: Uuid,
    },
    /// Write a crew and its agents as JSON
    Export {
        id: Uuid,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Store a crew from an exported JSON file
    Import {
        file: PathBuf,
        /// Name for the imported crew (the exported name when omitted)
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Serialize)]
struct CrewSummary<'a> {
    id: Uuid,
    name: &'a str,
    domain: String,
    complexity: String,
    process: String,
    agents: usize,
    reused_agents: usize,
    confidence: String,
    created_at: String,
}

fn init_logging(pretty: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if pretty {
        builder.init();
    } else {
        builder.json().init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_registry() -> anyhow::Result<Arc<ToolRegistry>> {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry)?;
    info!(count = registry.len(), "Built-in capabilities registered");
    Ok(Arc::new(registry))
}

/// The model client for model-backed analysis, if configured and usable.
///
/// A client that cannot be built (for example an unset `env:` key) is
/// logged and skipped, so analysis degrades to the deterministic path.
fn build_backend(config: &CrewmasterConfig) -> Option<Arc<dyn LlmBackend>> {
    let model = match (&config.model, config.orchestrator.analysis.mode) {
        (Some(model), AnalyzerMode::Model) => model,
        _ => return None,
    };
    match LlmClient::new(model.clone()) {
        Ok(client) => {
            info!(
                provider = ?model.provider,
                model = %model.model_id,
                "Model-backed analysis enabled"
            );
            let backend: Arc<dyn LlmBackend> = Arc::new(client);
            Some(backend)
        }
        Err(e) => {
            warn!(
                provider = ?model.provider,
                model = %model.model_id,
                error = %e,
                "Model client unavailable; using deterministic analysis"
            );
            None
        }
    }
}

async fn build_factory(config: &CrewmasterConfig) -> anyhow::Result<CrewFactory> {
    let registry = build_registry()?;
    let store: Arc<dyn CrewStore> = Arc::new(FileCrewStore::new(config.data_dir.clone()).await?);
    Ok(CrewFactory::new(
        registry,
        &config.orchestrator,
        store,
        build_backend(config),
    )?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.pretty);

    let config = CrewmasterConfig::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Create {
            task,
            name,
            no_reuse,
        } => {
            let factory = build_factory(&config).await?;
            let request = CreateRequest {
                description: task,
                name,
                reuse: !no_reuse,
            };
            match factory.try_create(request).await {
                Ok(crew) => print_json(&crew)?,
                Err(failure) => {
                    eprintln!("{}", serde_json::to_string_pretty(&failure)?);
                    std::process::exit(1);
                }
            }
        }
        Commands::Analyze { task } => {
            let factory = build_factory(&config).await?;
            let profile = factory.analyze(&task).await?;
            print_json(&profile)?;
        }
        Commands::Tools => {
            let registry = build_registry()?;
            print_json(&registry.descriptors())?;
        }
        Commands::Crews => {
            let store = FileCrewStore::new(config.data_dir.clone()).await?;
            let crews = store.list_crews().await?;
            let summaries: Vec<CrewSummary<'_>> = crews
                .iter()
                .map(|crew| CrewSummary {
                    id: crew.id,
                    name: &crew.name,
                    domain: crew.domain.to_string(),
                    complexity: crew.complexity.to_string(),
                    process: crew.process.to_string(),
                    agents: crew.agents.len(),
                    reused_agents: crew.reused_agent_count(),
                    confidence: crew.prediction.confidence.to_string(),
                    created_at: crew.created_at.to_rfc3339(),
                })
                .collect();
            print_json(&summaries)?;
        }
        Commands::Inspect { id } => {
            let store = FileCrewStore::new(config.data_dir.clone()).await?;
            let crew = store
                .load_crew(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Crew {id} not found"))?;
            let mut members = Vec::new();
            for reference in store.crew_members(id).await? {
                if let Some(record) = store.get_agent(reference.id).await? {
                    members.push(record);
                }
            }
            print_json(&serde_json::json!({ "crew": crew, "agents": members }))?;
        }
        Commands::Clone { id, name } => {
            let factory = build_factory(&config).await?;
            let crew = factory.clone_crew(id, name.as_deref()).await?;
            print_json(&crew)?;
        }
        Commands::Delete { id } => {
            let store = FileCrewStore::new(config.data_dir.clone()).await?;
            if !store.delete_crew(id).await? {
                anyhow::bail!("Crew {id} not found");
            }
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
        Commands::Export { id, output } => {
            let factory = build_factory(&config).await?;
            let export = factory.export_crew(id).await?;
            let json = serde_json::to_string_pretty(&export)?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json).await?;
                    info!(crew = %export.crew.name, path = %path.display(), "Crew exported");
                }
                None => println!("{json}"),
            }
        }
        Commands::Import { file, name } => {
            let raw = tokio::fs::read_to_string(&file).await.map_err(|e| {
                anyhow::anyhow!("Failed to read export file '{}': {}", file.display(), e)
            })?;
            let export: CrewExport = serde_json::from_str(&raw).map_err(|e| {
                anyhow::anyhow!("Invalid export file '{}': {}", file.display(), e)
            })?;
            let factory = build_factory(&config).await?;
            let crew = factory.import_crew(export, name.as_deref()).await?;
            print_json(&crew)?;
        }
    }

    Ok(())
}
