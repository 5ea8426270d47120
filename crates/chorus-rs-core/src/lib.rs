//! Core runtime for Chorus bots.
//!
//! This crate owns the per-bot runtime: the memory actor, the streaming
//! response coordinator, chat turns, the audit log, and the
//! OpenAI-compatible LLM client used in production.

pub mod audit;
pub mod bot;
pub mod clock;
pub mod context;
pub mod error;
pub mod llm;
pub mod memory_actor;
pub mod session;
pub mod stream;
pub mod table;

pub use audit::AuditLog;
pub use bot::{BotRuntime, LlmPair};
pub use clock::{Clock, FixedClock, SystemClock, TimeSource};
pub use error::ChorusCoreError;
pub use llm::OpenAiClient;
pub use memory_actor::{Appended, MemoryHandle};
pub use session::{ChatSession, TurnOutcome};
pub use stream::{StreamCoordinator, StreamHandle, StreamId, TokenObserver};
pub use table::{contains_table, justify};
