//! OpenAI-compatible chat-completions backend.

mod openai;
mod sse;

pub use openai::OpenAiClient;
