use crate::tool::{ToolDescriptor, ToolFactory, ToolHandle};
use crewmaster_core::{CapabilityTag, CrewmasterError, CrewmasterResult};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

struct Entry {
    descriptor: ToolDescriptor,
    factory: Arc<dyn ToolFactory>,
}

/// Catalog of available capabilities.
///
/// Registration happens once at startup through `&mut self`. After that the
/// registry is shared behind an `Arc` and only read, so `resolve` and
/// `categories` are safe under concurrent crew creation.
pub struct ToolRegistry {
    /// Registration order.
    entries: Vec<Entry>,
    index: HashMap<CapabilityTag, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a capability. Fails if the tag is already registered.
    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        factory: Arc<dyn ToolFactory>,
    ) -> CrewmasterResult<()> {
        self.insert(descriptor, factory, false)
    }

    /// Register a capability, replacing any existing registration in place.
    pub fn register_override(
        &mut self,
        descriptor: ToolDescriptor,
        factory: Arc<dyn ToolFactory>,
    ) -> CrewmasterResult<()> {
        self.insert(descriptor, factory, true)
    }

    fn insert(
        &mut self,
        descriptor: ToolDescriptor,
        factory: Arc<dyn ToolFactory>,
        allow_override: bool,
    ) -> CrewmasterResult<()> {
        if descriptor.tag.is_empty() {
            return Err(CrewmasterError::Config(
                "capability tag must not be empty".to_string(),
            ));
        }

        if let Some(&pos) = self.index.get(&descriptor.tag) {
            if !allow_override {
                return Err(CrewmasterError::DuplicateCapability(
                    descriptor.tag.to_string(),
                ));
            }
            warn!(capability = %descriptor.tag, "Overriding registered capability");
            self.entries[pos] = Entry {
                descriptor,
                factory,
            };
            return Ok(());
        }

        info!(
            capability = %descriptor.tag,
            category = %descriptor.category,
            "Registered capability"
        );
        self.index
            .insert(descriptor.tag.clone(), self.entries.len());
        self.entries.push(Entry {
            descriptor,
            factory,
        });
        Ok(())
    }

    pub fn contains(&self, tag: &CapabilityTag) -> bool {
        self.index.contains_key(tag)
    }

    /// Resolve tags to handles, in registration order.
    ///
    /// Fails with `UnknownCapability` naming the first unknown tag (in tag
    /// order, so the error is reproducible for identical inputs).
    pub fn resolve<'a, I>(&self, tags: I) -> CrewmasterResult<Vec<ToolHandle>>
    where
        I: IntoIterator<Item = &'a CapabilityTag>,
    {
        let requested: BTreeSet<&CapabilityTag> = tags.into_iter().collect();

        let mut positions = Vec::with_capacity(requested.len());
        for tag in requested {
            match self.index.get(tag) {
                Some(&pos) => positions.push(pos),
                None => {
                    return Err(CrewmasterError::UnknownCapability(tag.to_string()));
                }
            }
        }
        positions.sort_unstable();

        Ok(positions
            .into_iter()
            .map(|pos| {
                let entry = &self.entries[pos];
                ToolHandle::new(entry.descriptor.clone(), entry.factory.clone())
            })
            .collect())
    }

    /// Like [`resolve`](Self::resolve) but returns only the ordered tags.
    pub fn order<'a, I>(&self, tags: I) -> CrewmasterResult<Vec<CapabilityTag>>
    where
        I: IntoIterator<Item = &'a CapabilityTag>,
    {
        Ok(self
            .resolve(tags)?
            .into_iter()
            .map(|h| h.tag().clone())
            .collect())
    }

    /// Registration position of a tag.
    pub fn position(&self, tag: &CapabilityTag) -> Option<usize> {
        self.index.get(tag).copied()
    }

    pub fn categories(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .map(|e| e.descriptor.category.clone())
            .collect()
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    pub fn tags(&self) -> Vec<CapabilityTag> {
        self.entries.iter().map(|e| e.descriptor.tag.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
