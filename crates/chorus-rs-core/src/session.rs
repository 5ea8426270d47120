//! One inbound-message turn: record, generate, relay, persist, audit.

use crate::bot::BotShared;
use crate::context::compose_system_context;
use crate::table::{contains_table, justify};
use crate::{ChorusCoreError, StreamHandle};
use chorus_rs_protocol::{
    ChatPlatform, InboundMessage, Message, MessageHandle, PlatformError, PlatformEvent, Venue,
};
use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The event needed no reply.
    Ignored,
    /// The bot greeted a venue it joined.
    Greeted,
    /// A reply was generated and recorded.
    Responded { response: String, elapsed: Duration },
    /// The turn failed; the failure was logged and announced.
    Failed(String),
}

/// Handles platform events for one bot on one platform connection.
pub struct ChatSession {
    bot: Arc<BotShared>,
    platform: Arc<dyn ChatPlatform>,
}

impl ChatSession {
    pub(crate) fn new(bot: Arc<BotShared>, platform: Arc<dyn ChatPlatform>) -> Self {
        Self { bot, platform }
    }

    pub async fn handle_event(&self, event: PlatformEvent) -> TurnOutcome {
        match event {
            PlatformEvent::Message(inbound) => self.handle_message(inbound).await,
            PlatformEvent::JoinedVenue(venue) => self.greet(&venue).await,
        }
    }

    /// Post the join greeting in a newly joined venue.
    pub async fn greet(&self, venue: &Venue) -> TurnOutcome {
        let greeting = &self.bot.config.chat.join_greeting;
        match self.platform.send(venue, greeting).await {
            Ok(_) => {
                self.bot
                    .audit
                    .record(&format!("Joined {}, sent greeting.", venue.display_name()));
                TurnOutcome::Greeted
            }
            Err(err) => {
                self.bot.audit.record(&format!(
                    "Failed to greet {}: {err}",
                    venue.display_name()
                ));
                TurnOutcome::Failed(err.to_string())
            }
        }
    }

    /// Run one full turn for an inbound message. Never panics on turn errors.
    pub async fn handle_message(&self, inbound: InboundMessage) -> TurnOutcome {
        if inbound.author_id == self.platform.self_id() {
            debug!(
                "ignoring own message (bot={}, venue={})",
                self.bot.identity.name, inbound.venue.id
            );
            return TurnOutcome::Ignored;
        }

        let started = Instant::now();
        let bot = &self.bot;
        let chat = &bot.config.chat;
        let venue_name = inbound.venue.display_name().to_string();

        let mut author = inbound.author_name.clone();
        let mut hard_reset = false;
        if let Some(admin) = chat.admin(&inbound.author_name) {
            bot.audit.record("This is an admin Message.");
            if let Some(alias) = &admin.alias {
                author = alias.clone();
            }
            hard_reset = inbound
                .content
                .to_lowercase()
                .contains(&chat.reset_phrase.to_lowercase());
        }

        let mut outward = OutwardMessage::new(self.platform.clone(), inbound.venue.clone());
        if let Err(err) = self.platform.set_typing(&inbound.venue, true).await {
            debug!("typing indicator failed (venue={}, err={err})", inbound.venue.id);
        }
        let result = self
            .respond(&inbound, &author, &venue_name, hard_reset, &mut outward)
            .await;
        if let Err(err) = self.platform.set_typing(&inbound.venue, false).await {
            debug!("typing indicator failed (venue={}, err={err})", inbound.venue.id);
        }

        match result {
            Ok(response) => {
                let elapsed = started.elapsed();
                let summary = self.summarize(&response).await;
                bot.audit.record(&format!(
                    "Responded in {:.1}s to {author} in channel {venue_name}, Summary: {summary}",
                    elapsed.as_secs_f64()
                ));
                TurnOutcome::Responded { response, elapsed }
            }
            Err(err) => {
                bot.audit.record(&format!(
                    "Failed to respond to {author} in channel {venue_name}: {err}"
                ));
                outward.replace(&chat.failure_notice).await;
                TurnOutcome::Failed(err.to_string())
            }
        }
    }

    async fn respond(
        &self,
        inbound: &InboundMessage,
        author: &str,
        venue_name: &str,
        hard_reset: bool,
        outward: &mut OutwardMessage,
    ) -> Result<String, ChorusCoreError> {
        let bot = &self.bot;
        if hard_reset {
            bot.audit.record(&format!("Memory reset requested by {author}."));
            bot.memory.reset(bot.time.labeled()).await?;
        }

        let stamp = bot.time.stamp();
        bot.audit.record(&format!(
            "{} Received message from {author} in channel {venue_name}: {}",
            bot.identity.name, inbound.content
        ));
        bot.memory
            .append(Message::user(
                format!(
                    "From {author} in channel {venue_name} at {stamp}: {}",
                    inbound.content
                ),
                Some(author.to_string()),
                Some(stamp),
            ))
            .await?;

        let prompt = bot.prompts.system_prompt(&bot.identity.name)?;
        let system_context = compose_system_context(
            &prompt,
            Some(bot.config.chat.venue_hint.as_str()),
            &bot.time.annotation(),
        );
        let history = bot.memory.context(bot.config.context.window).await?;

        let stream = bot.smart.begin_stream(system_context, history, None);
        debug!(
            "relaying stream (bot={}, stream_id={}, venue={})",
            bot.identity.name,
            stream.id(),
            inbound.venue.id
        );
        let response = self.relay(stream, outward).await?;
        if response.trim().is_empty() {
            return Err(ChorusCoreError::EmptyResponse);
        }

        let rendered = if contains_table(&response) {
            justify(&response)
        } else {
            response.clone()
        };
        if let Err(err) = outward.finish(&rendered).await {
            bot.audit
                .record(&format!("Failed to deliver final reply in {venue_name}: {err}"));
        }

        let appended = bot
            .memory
            .append_persisted(Message::assistant(response.clone()))
            .await?;
        if let Err(err) = appended.saved {
            bot.audit.record(&format!("Failed to save memory: {err}"));
        }
        Ok(response)
    }

    /// Mirror stream progress into the outward message at a bounded rate.
    async fn relay(
        &self,
        mut stream: StreamHandle,
        outward: &mut OutwardMessage,
    ) -> Result<String, ChorusCoreError> {
        let streaming = &self.bot.config.streaming;
        let first_poll = Duration::from_millis(streaming.first_content_poll_ms);
        let interval = Duration::from_millis(streaming.edit_interval_ms);

        stream.wait_for_content(first_poll).await;
        loop {
            outward.sync(&stream.current_text()).await;
            if stream.is_done() {
                break;
            }
            tokio::time::sleep(interval).await;
            if stream.current_text().len() == outward.sent_len() {
                stream.changed().await;
            }
        }
        stream.await_completion().await
    }

    async fn summarize(&self, response: &str) -> String {
        let bot = &self.bot;
        let request = [Message::user(response, None, None)];
        match bot
            .fast
            .generate(&bot.config.chat.summary_prompt, &request)
            .await
        {
            Ok(summary) => summary,
            Err(err) => {
                warn!(
                    "summary generation failed (bot={}, err={err})",
                    bot.identity.name
                );
                format!("(summary unavailable: {err})")
            }
        }
    }
}

/// The single outward message a turn writes into.
struct OutwardMessage {
    platform: Arc<dyn ChatPlatform>,
    venue: Venue,
    handle: Option<MessageHandle>,
    sent: String,
}

impl OutwardMessage {
    fn new(platform: Arc<dyn ChatPlatform>, venue: Venue) -> Self {
        Self {
            platform,
            venue,
            handle: None,
            sent: String::new(),
        }
    }

    fn sent_len(&self) -> usize {
        self.sent.len()
    }

    /// Send the first content or edit in the unsent delta. Delivery
    /// failures are logged and retried on the next call.
    async fn sync(&mut self, text: &str) {
        let delta = text.strip_prefix(self.sent.as_str()).unwrap_or(text);
        if delta.trim().is_empty() {
            return;
        }
        if let Err(err) = self.deliver(text).await {
            warn!(
                "outward update failed, retrying next tick (venue={}, err={err})",
                self.venue.id
            );
        }
    }

    /// Write the complete final text unless it is already showing.
    async fn finish(&mut self, text: &str) -> Result<(), PlatformError> {
        if self.handle.is_some() && self.sent == text {
            return Ok(());
        }
        self.deliver(text).await
    }

    /// Overwrite whatever was shown, or post fresh, ignoring failures.
    async fn replace(&mut self, text: &str) {
        if let Err(err) = self.deliver(text).await {
            warn!(
                "failure notice not delivered (venue={}, err={err})",
                self.venue.id
            );
        }
    }

    async fn deliver(&mut self, text: &str) -> Result<(), PlatformError> {
        if let Some(handle) = &self.handle {
            self.platform.edit(handle, text).await?;
        } else {
            let handle = self.platform.send(&self.venue, text).await?;
            self.handle = Some(handle);
        }
        self.sent = text.to_string();
        Ok(())
    }
}
