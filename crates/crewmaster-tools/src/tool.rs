use async_trait::async_trait;
use crewmaster_core::{CapabilityTag, CrewmasterResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Metadata describing one registered capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub tag: CapabilityTag,
    pub category: String,
    pub description: String,
}

impl ToolDescriptor {
    pub fn new(
        tag: impl Into<CapabilityTag>,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            category: category.into(),
            description: description.into(),
        }
    }
}

/// A concrete tool instance an execution engine can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, input: &str) -> CrewmasterResult<String>;
}

/// Builds tool instances for one capability.
pub trait ToolFactory: Send + Sync {
    fn build(&self) -> CrewmasterResult<Arc<dyn Tool>>;
}

impl<F> ToolFactory for F
where
    F: Fn() -> CrewmasterResult<Arc<dyn Tool>> + Send + Sync,
{
    fn build(&self) -> CrewmasterResult<Arc<dyn Tool>> {
        self()
    }
}

/// Resolved capability: its descriptor plus the factory that builds it.
#[derive(Clone)]
pub struct ToolHandle {
    descriptor: ToolDescriptor,
    factory: Arc<dyn ToolFactory>,
}

impl ToolHandle {
    pub(crate) fn new(descriptor: ToolDescriptor, factory: Arc<dyn ToolFactory>) -> Self {
        Self {
            descriptor,
            factory,
        }
    }

    pub fn tag(&self) -> &CapabilityTag {
        &self.descriptor.tag
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    /// Build a fresh tool instance through the registered factory.
    pub fn instantiate(&self) -> CrewmasterResult<Arc<dyn Tool>> {
        self.factory.build()
    }
}

impl std::fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHandle")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
