use crate::{BotIdentity, PlatformEvent, Venue};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Errors returned by chat platform bindings.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlatformError {
    /// Credentials or endpoint configuration were rejected.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The live connection dropped.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    /// A send or edit did not reach the platform.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Reference to a message the bot has posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    /// Venue the message lives in.
    pub venue_id: String,
    /// Platform message identifier.
    pub message_id: String,
}

/// Outward operations a bot may perform on its chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Platform identifier of the bot's own account.
    fn self_id(&self) -> String;

    /// Post a new message.
    async fn send(&self, venue: &Venue, text: &str) -> Result<MessageHandle, PlatformError>;

    /// Replace the content of a previously posted message.
    async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<(), PlatformError>;

    /// Show or hide the typing indicator in a venue.
    async fn set_typing(&self, venue: &Venue, active: bool) -> Result<(), PlatformError>;
}

/// A live connection: outward operations plus the inbound event feed.
///
/// The connection is considered lost once `events` yields `None`.
pub struct PlatformConnection {
    pub platform: Arc<dyn ChatPlatform>,
    pub events: mpsc::Receiver<PlatformEvent>,
}

/// Opens platform connections for bot identities.
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    async fn connect(&self, bot: &BotIdentity) -> Result<PlatformConnection, PlatformError>;
}
