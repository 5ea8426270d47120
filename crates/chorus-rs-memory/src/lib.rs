//! Conversation memory for Chorus bots and its durable snapshot.

pub mod error;
pub mod memory;
pub mod snapshot;

/// Memory error type.
pub use error::MemoryError;
/// Ordered conversation log.
pub use memory::{ConversationMemory, seed_message};
/// JSONL snapshot store.
pub use snapshot::{SNAPSHOT_SCHEMA_VERSION, SnapshotStore};
