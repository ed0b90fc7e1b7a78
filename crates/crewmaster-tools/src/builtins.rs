use crate::registry::ToolRegistry;
use crate::tool::{Tool, ToolDescriptor, ToolFactory};
use async_trait::async_trait;
use crewmaster_core::{CapabilityTag, CrewmasterResult};
use std::sync::Arc;

/// Built-in capability catalog: `(tag, category, description)`.
pub const BUILTIN_CAPABILITIES: &[(&str, &str, &str)] = &[
    ("web_search", "web", "Search the web for current information"),
    ("web_scraping", "web", "Scrape and extract data from websites"),
    ("document_search", "documents", "Search within documents (PDF, DOCX, etc.)"),
    ("github_search", "code", "Search GitHub repositories and code"),
    ("youtube_search", "media", "Search YouTube videos and channels"),
    ("vision", "media", "Analyze and generate images"),
    ("database_search", "data", "Query SQL databases"),
    ("browser_automation", "integration", "Automate browser interactions"),
    ("file_operations", "files", "Read and write files"),
    ("code_execution", "code", "Execute code in a sandbox"),
    ("data_processing", "data", "Process and analyze structured data"),
    ("api_calls", "integration", "Make HTTP API calls"),
    (CapabilityTag::REASONING, "general", "General reasoning without external tools"),
];

/// Tool whose real implementation is supplied by the execution engine.
///
/// Invoking it reports what would have run instead of doing it.
pub struct DeferredTool {
    name: String,
}

impl DeferredTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Tool for DeferredTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: &str) -> CrewmasterResult<String> {
        let preview: String = input.chars().take(100).collect();
        let ellipsis = if input.chars().count() > 100 { "..." } else { "" };
        Ok(format!(
            "{} is provided by the execution engine; no local implementation ran. \
             Input: {preview}{ellipsis}",
            self.name
        ))
    }
}

/// Factory producing a [`DeferredTool`] named after the capability.
pub fn deferred_factory(tag: &str) -> Arc<dyn ToolFactory> {
    let name = tag.to_string();
    Arc::new(move || -> CrewmasterResult<Arc<dyn Tool>> {
        Ok(Arc::new(DeferredTool::new(name.clone())))
    })
}

/// Register every built-in capability.
pub fn register_builtins(registry: &mut ToolRegistry) -> CrewmasterResult<()> {
    for (tag, category, description) in BUILTIN_CAPABILITIES {
        registry.register(
            ToolDescriptor::new(*tag, *category, *description),
            deferred_factory(tag),
        )?;
    }
    Ok(())
}
