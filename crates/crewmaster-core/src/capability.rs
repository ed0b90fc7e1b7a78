use serde::{Deserialize, Serialize};

/// Identifier naming a class of action an agent may take (e.g. `web_search`).
///
/// Tags are normalised to trimmed lowercase so that `"Web_Search"` and
/// `"web_search"` name the same capability.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityTag(String);

impl CapabilityTag {
    /// Generic capability used when no specific capability is detected.
    pub const REASONING: &'static str = "reasoning";

    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_lowercase())
    }

    /// The generic `reasoning` capability.
    pub fn reasoning() -> Self {
        Self(Self::REASONING.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CapabilityTag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CapabilityTag {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for CapabilityTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
