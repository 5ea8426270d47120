use async_trait::async_trait;
use chorus_rs_protocol::{LlmClient, LlmError, Message, TokenSink};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FixedLLM {
    response: String,
}

impl FixedLLM {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl LlmClient for FixedLLM {
    fn model(&self) -> &str {
        "fixed"
    }

    async fn generate(
        &self,
        _system_prompt: &str,
        _messages: &[Message],
    ) -> Result<String, LlmError> {
        Ok(self.response.clone())
    }

    async fn generate_stream(
        &self,
        _system_prompt: &str,
        _messages: &[Message],
        on_token: TokenSink<'_>,
    ) -> Result<String, LlmError> {
        on_token(&self.response);
        Ok(self.response.clone())
    }
}

/// Emits scripted chunks one at a time, optionally pausing between them.
#[derive(Debug, Clone)]
pub struct StreamingLLM {
    chunks: Vec<String>,
    delay: Option<Duration>,
}

impl StreamingLLM {
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            chunks,
            delay: None,
        }
    }

    pub fn from_strs(chunks: &[&str]) -> Self {
        Self::new(chunks.iter().map(|chunk| chunk.to_string()).collect())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn response(&self) -> String {
        self.chunks.concat()
    }
}

#[async_trait]
impl LlmClient for StreamingLLM {
    fn model(&self) -> &str {
        "streaming"
    }

    async fn generate(
        &self,
        _system_prompt: &str,
        _messages: &[Message],
    ) -> Result<String, LlmError> {
        Ok(self.response())
    }

    async fn generate_stream(
        &self,
        _system_prompt: &str,
        _messages: &[Message],
        on_token: TokenSink<'_>,
    ) -> Result<String, LlmError> {
        for chunk in &self.chunks {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            on_token(chunk);
        }
        Ok(self.response())
    }
}

/// Fails every call, after streaming any scripted partial chunks.
#[derive(Debug, Clone)]
pub struct FailingLLM {
    message: String,
    partial: Vec<String>,
}

impl FailingLLM {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: Vec::new(),
        }
    }

    pub fn after_chunks(mut self, partial: &[&str]) -> Self {
        self.partial = partial.iter().map(|chunk| chunk.to_string()).collect();
        self
    }
}

#[async_trait]
impl LlmClient for FailingLLM {
    fn model(&self) -> &str {
        "failing"
    }

    async fn generate(
        &self,
        _system_prompt: &str,
        _messages: &[Message],
    ) -> Result<String, LlmError> {
        Err(LlmError::Provider(self.message.clone()))
    }

    async fn generate_stream(
        &self,
        _system_prompt: &str,
        _messages: &[Message],
        on_token: TokenSink<'_>,
    ) -> Result<String, LlmError> {
        for chunk in &self.partial {
            on_token(chunk);
            tokio::task::yield_now().await;
        }
        Err(LlmError::Provider(self.message.clone()))
    }
}

/// One call observed by [`RecordingLLM`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub streamed: bool,
}

/// Answers with a fixed response and records every request.
#[derive(Debug, Clone)]
pub struct RecordingLLM {
    response: String,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl RecordingLLM {
    pub fn new(response: impl Into<String>) -> (Self, Arc<Mutex<Vec<RecordedCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                response: response.into(),
                calls: calls.clone(),
            },
            calls,
        )
    }

    fn record(&self, system_prompt: &str, messages: &[Message], streamed: bool) {
        self.calls.lock().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            messages: messages.to_vec(),
            streamed,
        });
    }
}

#[async_trait]
impl LlmClient for RecordingLLM {
    fn model(&self) -> &str {
        "recording"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<String, LlmError> {
        self.record(system_prompt, messages, false);
        Ok(self.response.clone())
    }

    async fn generate_stream(
        &self,
        system_prompt: &str,
        messages: &[Message],
        on_token: TokenSink<'_>,
    ) -> Result<String, LlmError> {
        self.record(system_prompt, messages, true);
        on_token(&self.response);
        Ok(self.response.clone())
    }
}
