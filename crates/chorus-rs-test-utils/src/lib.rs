//! Test doubles shared by Chorus crates.

mod llm;
mod platform;

pub use llm::{FailingLLM, FixedLLM, RecordedCall, RecordingLLM, StreamingLLM};
pub use platform::{PlatformOp, RecordingPlatform, ScriptedConnector};
