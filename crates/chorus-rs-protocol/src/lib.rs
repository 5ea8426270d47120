//! Shared types for Chorus bots, plus the LLM and chat-platform seams.

mod llm;
mod platform;

pub use llm::{LlmClient, LlmError, TokenSink};
pub use platform::{
    ChatPlatform, MessageHandle, PlatformConnection, PlatformConnector, PlatformError,
};

use serde::{Deserialize, Serialize};

/// Speaker role for a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-generated message.
    System,
    /// User-authored message.
    User,
    /// Assistant-authored message.
    Assistant,
}

impl Role {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single entry in a bot's conversation memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Role that produced the message.
    pub role: Role,
    /// Rendered message content as sent to the model.
    pub content: String,
    /// Display name of the author, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Formatted wall-clock time the message was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Message {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            author: None,
            timestamp: None,
        }
    }

    /// Build a user message with author and time labels.
    pub fn user(
        content: impl Into<String>,
        author: Option<String>,
        timestamp: Option<String>,
    ) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            author,
            timestamp,
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            author: None,
            timestamp: None,
        }
    }

    /// Attach a timestamp label.
    pub fn at(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

/// A running bot, as listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    /// Bot name; keys every per-bot file on disk.
    pub name: String,
    /// Whether conversation memory is snapshotted to disk.
    pub save_memory: bool,
}

impl BotIdentity {
    pub fn new(name: impl Into<String>, save_memory: bool) -> Self {
        Self {
            name: name.into(),
            save_memory,
        }
    }
}

/// Kind of venue a message arrived in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VenueKind {
    /// Named group channel.
    Channel,
    /// One-to-one direct message.
    DirectMessage,
}

/// A chat channel or direct-message context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Venue {
    /// Platform identifier for the venue.
    pub id: String,
    /// Human-readable venue name.
    pub name: String,
    /// Channel or direct message.
    pub kind: VenueKind,
}

impl Venue {
    /// Build a named channel venue.
    pub fn channel(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: VenueKind::Channel,
        }
    }

    /// Build a direct-message venue.
    pub fn direct(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind: VenueKind::DirectMessage,
        }
    }

    /// Name used when describing the venue to the model and in logs.
    pub fn display_name(&self) -> &str {
        match self.kind {
            VenueKind::Channel => &self.name,
            VenueKind::DirectMessage => "A Direct Message",
        }
    }
}

/// An inbound chat message delivered by the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundMessage {
    /// Platform identifier of the author.
    pub author_id: String,
    /// Author handle as shown on the platform.
    pub author_name: String,
    /// Venue the message was posted in.
    pub venue: Venue,
    /// Raw text content.
    pub content: String,
}

/// Events delivered by a platform connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// A message was posted in a venue the bot can see.
    Message(InboundMessage),
    /// The bot was added to a new venue.
    JoinedVenue(Venue),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn message_serializes_without_empty_labels() {
        let message = Message::assistant("hi");
        let encoded = serde_json::to_value(&message).expect("serialize");
        assert_eq!(
            encoded,
            serde_json::json!({ "role": "assistant", "content": "hi" })
        );
    }

    #[test]
    fn message_keeps_author_and_time() {
        let message = Message::user(
            "From Alice in channel general at 01-02-2024 10:00 AM: Hello",
            Some("Alice".to_string()),
            Some("01-02-2024 10:00 AM".to_string()),
        );
        let encoded = serde_json::to_string(&message).expect("serialize");
        let decoded: Message = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded, message);
        assert_eq!(decoded.role.as_str(), "user");
    }

    #[test]
    fn direct_venues_render_generic_name() {
        assert_eq!(Venue::direct("dm-42").display_name(), "A Direct Message");
        assert_eq!(Venue::channel("1", "general").display_name(), "general");
    }
}
