//! Per-bot runtime: owns the memory actor, prompts, audit log, and model
//! handles, and serves platform turns plus direct calls.

use crate::context::compose_system_context;
use crate::{
    AuditLog, ChatSession, ChorusCoreError, MemoryHandle, OpenAiClient, StreamCoordinator,
    TimeSource, TokenObserver,
};
use chorus_rs_config::{ChorusConfig, LlmConfig, PromptStore};
use chorus_rs_memory::{ConversationMemory, SnapshotStore};
use chorus_rs_protocol::{
    BotIdentity, ChatPlatform, LlmClient, Message, PlatformConnection, PlatformError,
};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// The two model tiers a bot uses.
#[derive(Clone)]
pub struct LlmPair {
    /// Streaming model for chat turns.
    pub smart: Arc<dyn LlmClient>,
    /// Model for task queries and summaries.
    pub fast: Arc<dyn LlmClient>,
}

impl LlmPair {
    pub fn new(smart: Arc<dyn LlmClient>, fast: Arc<dyn LlmClient>) -> Self {
        Self { smart, fast }
    }

    /// Both tiers served by the configured OpenAI-compatible endpoint.
    pub fn openai(config: &LlmConfig) -> Result<Self, ChorusCoreError> {
        Ok(Self {
            smart: Arc::new(OpenAiClient::from_config(config, &config.smart)?),
            fast: Arc::new(OpenAiClient::from_config(config, &config.fast)?),
        })
    }
}

pub(crate) struct BotShared {
    pub(crate) identity: BotIdentity,
    pub(crate) config: Arc<ChorusConfig>,
    pub(crate) prompts: PromptStore,
    pub(crate) time: TimeSource,
    pub(crate) audit: AuditLog,
    pub(crate) memory: MemoryHandle,
    pub(crate) smart: StreamCoordinator,
    pub(crate) fast: Arc<dyn LlmClient>,
}

/// A running bot.
#[derive(Clone)]
pub struct BotRuntime {
    shared: Arc<BotShared>,
}

impl BotRuntime {
    /// Restore the bot's memory and start its memory actor.
    ///
    /// Storage paths resolve against `cwd`. Must be called from within a
    /// tokio runtime.
    pub fn start(
        identity: BotIdentity,
        config: Arc<ChorusConfig>,
        cwd: &Path,
        llms: LlmPair,
    ) -> Result<Self, ChorusCoreError> {
        let time = TimeSource::from_config(&config.time)?;
        Self::start_with_time(identity, config, cwd, llms, time)
    }

    /// Like [`BotRuntime::start`] with an explicit time source.
    pub fn start_with_time(
        identity: BotIdentity,
        config: Arc<ChorusConfig>,
        cwd: &Path,
        llms: LlmPair,
        time: TimeSource,
    ) -> Result<Self, ChorusCoreError> {
        let paths = config.storage.resolve(cwd);
        let audit = AuditLog::new(&paths.log_dir, identity.name.clone(), time.clone());
        audit.record(&format!(
            "Loading memory (save_memory={}).",
            identity.save_memory
        ));

        let store = identity.save_memory.then(|| {
            SnapshotStore::new(&paths.memory_dir, identity.name.clone())
                .with_recover_corrupt(config.memory.recover_corrupt)
        });
        let restored = ConversationMemory::restore_or_init(store.as_ref(), false, &time.labeled());
        let memory = match restored {
            Ok(memory) => memory,
            Err(err) => {
                audit.record(&format!("Failed to load memory: {err}"));
                return Err(err.into());
            }
        };
        info!(
            "bot started (bot={}, messages={}, smart={}, fast={})",
            identity.name,
            memory.len(),
            llms.smart.model(),
            llms.fast.model()
        );

        let shared = BotShared {
            prompts: PromptStore::new(&paths.config_dir),
            memory: MemoryHandle::spawn(memory, store),
            smart: StreamCoordinator::new(
                llms.smart,
                Duration::from_secs(config.streaming.generation_timeout_secs),
            ),
            fast: llms.fast,
            identity,
            config,
            time,
            audit,
        };
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.shared.identity
    }

    pub fn audit(&self) -> &AuditLog {
        &self.shared.audit
    }

    /// Turn handler bound to one platform.
    pub fn session(&self, platform: Arc<dyn ChatPlatform>) -> ChatSession {
        ChatSession::new(self.shared.clone(), platform)
    }

    /// Serve platform events until the connection drops.
    ///
    /// Turns run concurrently; in-flight turns finish before this returns.
    /// Always ends with [`PlatformError::ConnectionLost`] so the caller can
    /// reconnect.
    pub async fn run(&self, connection: PlatformConnection) -> Result<(), ChorusCoreError> {
        let PlatformConnection {
            platform,
            mut events,
        } = connection;
        let session = Arc::new(self.session(platform));
        let mut turns = JoinSet::new();
        self.shared.audit.record("Connected to chat platform.");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        let session = session.clone();
                        turns.spawn(async move { session.handle_event(event).await });
                    }
                    None => break,
                },
                Some(joined) = turns.join_next(), if !turns.is_empty() => {
                    if let Err(err) = joined {
                        warn!("turn task aborted (bot={}, err={err})", self.shared.identity.name);
                    }
                }
            }
        }

        while let Some(joined) = turns.join_next().await {
            if let Err(err) = joined {
                warn!("turn task aborted (bot={}, err={err})", self.shared.identity.name);
            }
        }
        self.shared.audit.record("Lost connection to chat platform.");
        Err(PlatformError::ConnectionLost(format!(
            "event feed closed for {}",
            self.shared.identity.name
        ))
        .into())
    }

    /// Chat outside any platform and return the full reply.
    ///
    /// `observer` receives each token and the text so far.
    pub async fn chat_direct(
        &self,
        message: &str,
        author: &str,
        observer: Option<TokenObserver>,
    ) -> Result<String, ChorusCoreError> {
        let bot = &self.shared;
        let stamp = bot.time.stamp();
        let (event, content) = if author.is_empty() {
            (
                format!(
                    "{} Received Anonymous message via direct interface: {message}",
                    bot.identity.name
                ),
                format!("From an Anonymous User at {stamp} via direct interface: {message}"),
            )
        } else {
            (
                format!(
                    "{} Received message from {author} via direct interface: {message}",
                    bot.identity.name
                ),
                format!("From {author} at {stamp} via direct interface: {message}"),
            )
        };
        bot.audit.record(&event);
        let author_label = (!author.is_empty()).then(|| author.to_string());
        bot.memory
            .append(Message::user(content, author_label, Some(stamp)))
            .await?;

        let prompt = bot.prompts.system_prompt(&bot.identity.name)?;
        let system_context = compose_system_context(&prompt, None, &bot.time.annotation());
        let history = bot.memory.context(bot.config.context.window).await?;
        let stream = bot.smart.begin_stream(system_context, history, observer);
        let response = match stream.await_completion().await {
            Ok(response) => response,
            Err(err) => {
                bot.audit
                    .record(&format!("Failed to respond via direct interface: {err}"));
                return Err(err);
            }
        };

        let appended = bot
            .memory
            .append_persisted(Message::assistant(response.clone()))
            .await?;
        if let Err(err) = appended.saved {
            bot.audit.record(&format!("Failed to save memory: {err}"));
        }
        Ok(response)
    }

    /// Context-free query on the fast model: `query` is the system prompt
    /// and `param` the only user message.
    pub async fn task(&self, query: &str, param: &str) -> Result<String, ChorusCoreError> {
        let request = [Message::user(param, None, None)];
        Ok(self.shared.fast.generate(query, &request).await?)
    }

    /// Contents of every message in memory, in order.
    pub async fn chatlog(&self) -> Result<Vec<String>, ChorusCoreError> {
        let messages = self.shared.memory.messages().await?;
        Ok(messages.into_iter().map(|message| message.content).collect())
    }

    /// Hard-reset memory to a fresh seed and persist it.
    pub async fn reset(&self) -> Result<(), ChorusCoreError> {
        let bot = &self.shared;
        bot.audit.record("Memory reset requested.");
        bot.memory.reset(bot.time.labeled()).await
    }
}
