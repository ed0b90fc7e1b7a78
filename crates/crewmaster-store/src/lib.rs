pub mod claims;
pub mod file;
pub mod memory;
pub mod store;

pub use claims::{ClaimGuard, IdentifierClaims};
pub use file::FileCrewStore;
pub use memory::InMemoryStore;
pub use store::{AgentFilter, CrewStore};
