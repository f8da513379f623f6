//! Domain models for the coordination core.

pub mod model;
pub mod registry;
pub mod session;

pub use model::{ModelDescriptor, ModelInfo};
pub use registry::{ModelRegistry, ModelSettings};
pub use session::{AddOutcome, ChatMessage, CommitInfo, ContextEntry, EditMode, Role, Session};
