use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Exclusive claims on identifiers being created.
///
/// A claim is held from the moment a creation picks an identifier until the
/// returned [`ClaimGuard`] is dropped, on success or failure alike. Two
/// concurrent creations can never hold the same identifier.
#[derive(Debug, Clone, Default)]
pub struct IdentifierClaims {
    held: Arc<Mutex<HashSet<String>>>,
}

impl IdentifierClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or `None` if another creation holds it.
    pub fn try_acquire(&self, id: &str) -> Option<ClaimGuard> {
        let mut held = self.held.lock();
        if !held.insert(id.to_string()) {
            debug!(identifier = id, "Identifier already claimed");
            return None;
        }
        Some(ClaimGuard {
            id: id.to_string(),
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_claimed(&self, id: &str) -> bool {
        self.held.lock().contains(id)
    }
}

/// Releases its identifier when dropped.
#[derive(Debug)]
pub struct ClaimGuard {
    id: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl ClaimGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.held.lock().remove(&self.id);
    }
}
