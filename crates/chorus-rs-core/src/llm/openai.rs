use super::sse::{LineBuffer, SseEvent, parse_line};
use async_trait::async_trait;
use chorus_rs_config::{LlmConfig, ModelConfig};
use chorus_rs_protocol::{LlmClient, LlmError, Message, TokenSink};
use futures_util::StreamExt;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat-completions client for OpenAI and compatible endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    request_timeout: Duration,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    stream: bool,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: &ModelConfig,
        request_timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| LlmError::Request(err.to_string()))?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.name.clone(),
            temperature: model.temperature,
            request_timeout,
        })
    }

    /// Build a client for one model tier, reading the key from the
    /// configured environment variable.
    pub fn from_config(config: &LlmConfig, model: &ModelConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(
            &config.base_url,
            api_key,
            model,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn request<'a>(
        &'a self,
        system_prompt: &'a str,
        messages: &'a [Message],
        stream: bool,
    ) -> ChatRequest<'a> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(WireMessage {
            role: "system",
            content: system_prompt,
        });
        wire.extend(messages.iter().map(|message| WireMessage {
            role: message.role.as_str(),
            content: &message.content,
        }));
        ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            stream,
            messages: wire,
        }
    }

    async fn post(&self, body: &ChatRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body);
        if !body.stream {
            request = request.timeout(self.request_timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|err| LlmError::Request(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<String, LlmError> {
        let body = self.request(system_prompt, messages, false);
        let completion: ChatCompletion = self
            .post(&body)
            .await?
            .json()
            .await
            .map_err(|err| LlmError::Decode(err.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Decode("completion has no content".to_string()))
    }

    async fn generate_stream(
        &self,
        system_prompt: &str,
        messages: &[Message],
        on_token: TokenSink<'_>,
    ) -> Result<String, LlmError> {
        let body = self.request(system_prompt, messages, true);
        let response = self.post(&body).await?;
        let mut bytes = Box::pin(response.bytes_stream());
        let mut lines = LineBuffer::default();
        let mut text = String::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|err| LlmError::Request(err.to_string()))?;
            for line in lines.push(&chunk) {
                match parse_line(&line)? {
                    SseEvent::Delta(delta) => {
                        on_token(&delta);
                        text.push_str(&delta);
                    }
                    SseEvent::Done => {
                        debug!(
                            "stream finished (model={}, chars={})",
                            self.model,
                            text.len()
                        );
                        return Ok(text);
                    }
                    SseEvent::Skip => {}
                }
            }
        }
        if let Some(line) = lines.finish() {
            if let SseEvent::Delta(delta) = parse_line(&line)? {
                on_token(&delta);
                text.push_str(&delta);
            }
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_rs_protocol::Role;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_prepends_system_prompt() {
        let model = ModelConfig {
            name: "gpt-test".to_string(),
            temperature: 0.5,
        };
        let client = OpenAiClient::new(
            "http://localhost:9/v1/",
            "key",
            &model,
            Duration::from_secs(1),
        )
        .expect("client");
        assert_eq!(client.endpoint, "http://localhost:9/v1/chat/completions");

        let history = vec![Message::user("hi", None, None), Message::assistant("hello")];
        let body = serde_json::to_value(client.request("be nice", &history, true)).expect("json");
        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-test",
                "temperature": 0.5,
                "stream": true,
                "messages": [
                    { "role": "system", "content": "be nice" },
                    { "role": Role::User.as_str(), "content": "hi" },
                    { "role": "assistant", "content": "hello" },
                ]
            })
        );
    }

    #[test]
    fn missing_key_is_reported_by_variable_name() {
        let config = LlmConfig {
            api_key_env: "CHORUS_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmConfig::default()
        };
        let err = OpenAiClient::from_config(&config, &config.smart).unwrap_err();
        let LlmError::MissingApiKey(name) = err else {
            panic!("expected a missing api key error");
        };
        assert_eq!(name, "CHORUS_TEST_KEY_THAT_IS_NEVER_SET");
    }
}
