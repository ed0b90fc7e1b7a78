use crate::config::{AnalysisConfig, AnalyzerMode};
use async_trait::async_trait;
use crewmaster_core::{
    CapabilityTag, Complexity, CrewmasterError, CrewmasterResult, Domain, TaskProfile,
};
use crewmaster_llm::LlmBackend;
use crewmaster_tools::ToolRegistry;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Turns a free-text task description into a [`TaskProfile`].
///
/// Every implementation rejects empty or over-long descriptions with
/// `Analysis` and otherwise always produces a profile: unclear input
/// degrades to `domain = other` and a structural complexity estimate.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, description: &str) -> CrewmasterResult<TaskProfile>;
}

/// Keyword patterns that signal a capability.
const CAPABILITY_PATTERNS: &[(&str, &str)] = &[
    (
        "web_search",
        r"\b(web[_\s]?search|search|research|find|look\s+up|latest|current|news|markets?|trends?|competitors?)\b",
    ),
    ("web_scraping", r"\b(web[_\s]?scraping|scrape|scraping|crawl|crawling|websites?)\b"),
    ("document_search", r"\b(document[_\s]?search|documents?|pdfs?|docx|papers?|manuals?)\b"),
    ("github_search", r"\b(github[_\s]?search|github|git|repository|repositories)\b"),
    ("youtube_search", r"\b(youtube[_\s]?search|youtube|videos?)\b"),
    ("vision", r"\b(vision|dall[-_]?e|images?|photos?|diagrams?|screenshots?)\b"),
    ("database_search", r"\b(database[_\s]?search|databases?|sql|postgres|queries)\b"),
    ("browser_automation", r"\b(browser[_\s]?automation|browser|fill\s+(in\s+)?forms?)\b"),
    ("file_operations", r"\b(file[_\s]?operations|files?|save|export|folders?)\b"),
    (
        "code_execution",
        r"\b(code[_\s]?execution|python|execute|scripts?|code|program|implement|compile)\b",
    ),
    (
        "data_processing",
        r"\b(data[_\s]?processing|data|csv|statistics|statistical|datasets?|spreadsheets?)\b",
    ),
    ("api_calls", r"\b(api[_\s]?calls?|apis?|endpoints?|webhooks?|http|rest)\b"),
];

/// Keyword patterns that signal a domain.
const DOMAIN_PATTERNS: &[(Domain, &str)] = &[
    (
        Domain::Research,
        r"\b(research|investigate|market|markets|reports?|survey|study|sources|trends?|competitors?)\b",
    ),
    (
        Domain::Analysis,
        r"\b(analy[sz]e|analysis|data|statistics|metrics|compare|comparison|evaluate|insights?|forecast)\b",
    ),
    (
        Domain::Engineering,
        r"\b(code|build|develop|implement|software|apis?|deploy|debug|program|application|app|refactor)\b",
    ),
    (
        Domain::Writing,
        r"\b(write|draft|article|blog|essay|content|copy|story|newsletter|summari[sz]e|summary)\b",
    ),
];

/// Separators between clauses: sentence punctuation, commas, connectives.
const CLAUSE_PATTERN: &str = r"[.;:!?,]|\b(and|then|also|after|before|while|plus)\b";

/// Word-count and clause-count measurements of a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shape {
    words: usize,
    clauses: usize,
}

fn compile(pattern: &str) -> CrewmasterResult<Regex> {
    Regex::new(&format!("(?i){pattern}"))
        .map_err(|e| CrewmasterError::Config(format!("invalid analyzer pattern: {e}")))
}

/// Reject empty and over-long descriptions.
fn validate(description: &str, max_len: usize) -> CrewmasterResult<&str> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(CrewmasterError::Analysis("task description is empty".into()));
    }
    let len = trimmed.chars().count();
    if len > max_len {
        return Err(CrewmasterError::Analysis(format!(
            "task description is {len} characters long; the maximum is {max_len}"
        )));
    }
    Ok(trimmed)
}

/// Pattern-matching analyzer. Pure and deterministic.
pub struct DeterministicAnalyzer {
    registry: Arc<ToolRegistry>,
    config: AnalysisConfig,
    capabilities: Vec<(CapabilityTag, Regex)>,
    domains: Vec<(Domain, Regex)>,
    clause_split: Regex,
}

impl DeterministicAnalyzer {
    /// Compile the keyword tables.
    ///
    /// Fails with `UnknownCapability` when the registry cannot provide the
    /// `reasoning` fallback, since every vague description would then fail.
    pub fn new(registry: Arc<ToolRegistry>, config: AnalysisConfig) -> CrewmasterResult<Self> {
        let fallback = CapabilityTag::reasoning();
        if !registry.contains(&fallback) {
            return Err(CrewmasterError::UnknownCapability(format!(
                "{fallback} (the fallback capability must be registered)"
            )));
        }
        let capabilities = CAPABILITY_PATTERNS
            .iter()
            .map(|(tag, pattern)| -> CrewmasterResult<(CapabilityTag, Regex)> {
                Ok((CapabilityTag::from(*tag), compile(pattern)?))
            })
            .collect::<CrewmasterResult<Vec<_>>>()?;
        let domains = DOMAIN_PATTERNS
            .iter()
            .map(|(domain, pattern)| -> CrewmasterResult<(Domain, Regex)> {
                Ok((*domain, compile(pattern)?))
            })
            .collect::<CrewmasterResult<Vec<_>>>()?;
        Ok(Self {
            registry,
            config,
            capabilities,
            domains,
            clause_split: compile(CLAUSE_PATTERN)?,
        })
    }

    fn shape(&self, text: &str) -> Shape {
        Shape {
            words: text.split_whitespace().count(),
            clauses: self
                .clause_split
                .split(text)
                .filter(|segment| segment.split_whitespace().next().is_some())
                .count()
                .max(1),
        }
    }

    /// Capabilities signalled by the text that the registry can provide.
    ///
    /// Falls back to `reasoning` when nothing specific is detected.
    fn detect_capabilities(&self, text: &str) -> BTreeSet<CapabilityTag> {
        let mut found = BTreeSet::new();
        for (tag, pattern) in &self.capabilities {
            if !pattern.is_match(text) {
                continue;
            }
            if self.registry.contains(tag) {
                found.insert(tag.clone());
            } else {
                debug!(capability = %tag, "Capability detected but not registered, dropping");
            }
        }
        if found.is_empty() {
            found.insert(CapabilityTag::reasoning());
        }
        found
    }

    /// Highest-scoring domain; ties go to the earlier entry of `Domain::ALL`.
    fn detect_domain(&self, text: &str) -> Domain {
        let scores: BTreeMap<Domain, usize> = self
            .domains
            .iter()
            .map(|(domain, pattern)| (*domain, pattern.find_iter(text).count()))
            .collect();

        let mut best = (Domain::Other, 0);
        for domain in Domain::ALL {
            let score = scores.get(&domain).copied().unwrap_or(0);
            if score > best.1 {
                best = (domain, score);
            }
        }
        best.0
    }

    /// Complexity from the description's structure alone.
    fn structural_complexity(&self, text: &str, capability_count: usize) -> Complexity {
        let shape = self.shape(text);
        if shape.words > 40 || shape.clauses >= 4 || capability_count >= 4 {
            Complexity::Complex
        } else if shape.words <= 12 && shape.clauses <= 1 && capability_count <= 2 {
            Complexity::Simple
        } else {
            Complexity::Moderate
        }
    }

    fn estimate_steps(&self, text: &str, capability_count: usize, complexity: Complexity) -> u32 {
        let bonus = match complexity {
            Complexity::Simple => 0,
            Complexity::Moderate => 1,
            Complexity::Complex => 2,
        };
        let base = capability_count.max(self.shape(text).clauses);
        u32::try_from(base).unwrap_or(u32::MAX).saturating_add(bonus).max(1)
    }

    fn profile(&self, text: &str) -> TaskProfile {
        let required_capabilities = self.detect_capabilities(text);
        let complexity = self.structural_complexity(text, required_capabilities.len());
        let estimated_steps = self.estimate_steps(text, required_capabilities.len(), complexity);
        TaskProfile {
            raw_description: text.to_string(),
            domain: self.detect_domain(text),
            complexity,
            required_capabilities,
            estimated_steps,
        }
    }
}

#[async_trait]
impl Analyzer for DeterministicAnalyzer {
    async fn analyze(&self, description: &str) -> CrewmasterResult<TaskProfile> {
        let text = validate(description, self.config.max_description_length)?;
        let profile = self.profile(text);
        info!(
            domain = %profile.domain,
            complexity = %profile.complexity,
            capabilities = profile.required_capabilities.len(),
            steps = profile.estimated_steps,
            "Task analyzed"
        );
        Ok(profile)
    }
}

const MODEL_SYSTEM_PROMPT: &str = "\
You analyze task descriptions for a system that assembles teams of AI agents. \
Reply with a single JSON object and nothing else, with these fields: \
\"domain\" (one of research, writing, analysis, engineering, other), \
\"complexity\" (one of simple, moderate, complex), \
\"capabilities\" (array of capability tags chosen only from the provided list), \
\"estimated_steps\" (positive integer).";

#[derive(Debug, Deserialize)]
struct ModelReply {
    domain: String,
    complexity: String,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    estimated_steps: Option<u32>,
}

/// Analyzer that asks a language model and falls back to
/// [`DeterministicAnalyzer`] when the provider fails, times out, or replies
/// with something that is not a usable profile.
pub struct ModelBackedAnalyzer {
    backend: Arc<dyn LlmBackend>,
    fallback: DeterministicAnalyzer,
    deadline: Duration,
}

impl ModelBackedAnalyzer {
    pub fn new(backend: Arc<dyn LlmBackend>, fallback: DeterministicAnalyzer) -> Self {
        let deadline = Duration::from_secs(fallback.config.model_deadline_secs);
        Self {
            backend,
            fallback,
            deadline,
        }
    }

    /// Bound on the whole model call, retries included.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    fn prompt(&self, text: &str) -> String {
        let tags: Vec<String> = self
            .fallback
            .registry
            .tags()
            .iter()
            .map(|t| t.to_string())
            .collect();
        format!(
            "Available capabilities: {}\n\nTask description:\n{text}",
            tags.join(", ")
        )
    }

    async fn ask_model(&self, text: &str) -> CrewmasterResult<TaskProfile> {
        let prompt = self.prompt(text);
        let call = self.backend.complete(Some(MODEL_SYSTEM_PROMPT), &prompt);
        let reply = tokio::time::timeout(self.deadline, call)
            .await
            .map_err(|_| {
                CrewmasterError::Provider(format!(
                    "model analysis timeout after {} s",
                    self.deadline.as_secs()
                ))
            })??;
        self.normalize(text, &reply)
    }

    /// Parse the model's reply and enforce the profile guarantees on it.
    fn normalize(&self, text: &str, reply: &str) -> CrewmasterResult<TaskProfile> {
        let json = match (reply.find('{'), reply.rfind('}')) {
            (Some(start), Some(end)) if start < end => &reply[start..=end],
            _ => {
                return Err(CrewmasterError::Provider(
                    "model reply contains no JSON object".into(),
                ))
            }
        };
        let parsed: ModelReply = serde_json::from_str(json)
            .map_err(|e| CrewmasterError::Provider(format!("unparseable model reply: {e}")))?;

        let mut required_capabilities: BTreeSet<CapabilityTag> = parsed
            .capabilities
            .iter()
            .map(CapabilityTag::new)
            .filter(|tag| {
                let known = self.fallback.registry.contains(tag);
                if !known {
                    debug!(capability = %tag, "Model proposed unregistered capability, dropping");
                }
                known
            })
            .collect();
        if required_capabilities.is_empty() {
            required_capabilities.insert(CapabilityTag::reasoning());
        }

        let domain = parsed.domain.parse().unwrap_or(Domain::Other);
        let floor = self
            .fallback
            .structural_complexity(text, required_capabilities.len());
        let complexity = parsed
            .complexity
            .parse::<Complexity>()
            .map_or(floor, |c| c.max(floor));

        let min_steps = u32::try_from(required_capabilities.len())
            .unwrap_or(u32::MAX)
            .max(1);
        let estimated_steps = parsed.estimated_steps.unwrap_or(0).max(min_steps);

        Ok(TaskProfile {
            raw_description: text.to_string(),
            domain,
            complexity,
            required_capabilities,
            estimated_steps,
        })
    }
}

#[async_trait]
impl Analyzer for ModelBackedAnalyzer {
    async fn analyze(&self, description: &str) -> CrewmasterResult<TaskProfile> {
        let text = validate(description, self.fallback.config.max_description_length)?;
        match self.ask_model(text).await {
            Ok(profile) => {
                info!(
                    domain = %profile.domain,
                    complexity = %profile.complexity,
                    capabilities = profile.required_capabilities.len(),
                    "Task analyzed by model"
                );
                Ok(profile)
            }
            Err(e) => {
                warn!(error = %e, "Model analysis failed, falling back to deterministic analysis");
                self.fallback.analyze(text).await
            }
        }
    }
}

/// Build the analyzer selected by `config.mode`.
///
/// Model mode without a backend degrades to deterministic analysis.
pub fn build_analyzer(
    registry: Arc<ToolRegistry>,
    config: &AnalysisConfig,
    backend: Option<Arc<dyn LlmBackend>>,
) -> CrewmasterResult<Arc<dyn Analyzer>> {
    let deterministic = DeterministicAnalyzer::new(registry, config.clone())?;
    match (config.mode, backend) {
        (AnalyzerMode::Model, Some(backend)) => {
            Ok(Arc::new(ModelBackedAnalyzer::new(backend, deterministic)))
        }
        (AnalyzerMode::Model, None) => {
            warn!("Model analysis requested but no provider is configured; using deterministic analysis");
            Ok(Arc::new(deterministic))
        }
        (AnalyzerMode::Deterministic, _) => Ok(Arc::new(deterministic)),
    }
}
