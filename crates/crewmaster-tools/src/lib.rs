//! Tool registry for CrewMaster.
//!
//! Maps capability tags to tool handles. Resolution is deterministic
//! (registration order) so identical inputs always yield identical agent
//! tool lists.

pub mod builtins;
pub mod registry;
pub mod tool;

pub use builtins::{deferred_factory, register_builtins, DeferredTool, BUILTIN_CAPABILITIES};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolDescriptor, ToolFactory, ToolHandle};
