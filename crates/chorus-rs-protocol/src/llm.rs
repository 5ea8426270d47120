use crate::Message;
use async_trait::async_trait;

/// Per-token observer handed to streaming generations.
pub type TokenSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Errors returned by LLM backends.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    /// Credentials were not available.
    #[error("missing api key: {0}")]
    MissingApiKey(String),
    /// The request could not be sent or the connection dropped.
    #[error("request failed: {0}")]
    Request(String),
    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// The backend response could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
    /// Any other provider-reported failure.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Chat-completion backend used by bots.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model name, for logs.
    fn model(&self) -> &str;

    /// Generate a full response in one call.
    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<String, LlmError>;

    /// Generate a response, invoking `on_token` for every token as it arrives.
    ///
    /// Resolves to the final text once the backend signals completion.
    async fn generate_stream(
        &self,
        system_prompt: &str,
        messages: &[Message],
        on_token: TokenSink<'_>,
    ) -> Result<String, LlmError>;
}
