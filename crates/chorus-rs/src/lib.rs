//! Chorus: runs a roster of chat bots that stream LLM replies.
//!
//! The binary wires the manifest bootstrap, the worker supervisor, and a
//! console platform connector together. The building blocks live in the
//! re-exported crates.

pub mod bootstrap;
pub mod console;
pub mod supervisor;

/// Re-export for convenience.
pub use chorus_rs_config as config;
pub use chorus_rs_core as core;
/// Re-export for convenience.
pub use chorus_rs_memory as memory;
/// Re-export for convenience.
pub use chorus_rs_protocol as protocol;

/// Initialize process logging from `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();
}
