//! In-memory collaborators for tests and the demo binary.

pub mod backend;

pub use backend::MockBackend;
pub use crate::draft::MemoryDraftStore;
