//! In-memory conversation log.

use chorus_rs_protocol::Message;

/// Build the system message that opens every fresh memory.
pub fn seed_message(stamp: &str) -> Message {
    Message::system(format!(
        "Memory was initialized/reset at {stamp}. Let the user know if appropriate."
    ))
    .at(stamp)
}

/// Ordered sequence of messages for one bot.
///
/// Messages are never edited once appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationMemory {
    messages: Vec<Message>,
}

impl ConversationMemory {
    /// A memory holding only the seed system message.
    pub fn seeded(stamp: &str) -> Self {
        Self {
            messages: vec![seed_message(stamp)],
        }
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Add a message at the end.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The last `n` messages in order; everything when fewer exist.
    pub fn tail(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Message contents in order.
    pub fn contents(&self) -> Vec<String> {
        self.messages
            .iter()
            .map(|message| message.content.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
