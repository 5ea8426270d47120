//! Single-writer owner of a bot's conversation memory.
//!
//! Every read and mutation is serialized through one channel to a worker
//! task, so concurrent turns append in the order they reach the actor and
//! snapshots never interleave.

use crate::ChorusCoreError;
use chorus_rs_config::ContextWindow;
use chorus_rs_memory::{ConversationMemory, MemoryError, SnapshotStore};
use chorus_rs_protocol::Message;
use log::{debug, warn};
use tokio::sync::{mpsc, oneshot};

type Reply<T> = oneshot::Sender<T>;

enum MemoryCommand {
    Append {
        message: Message,
        persist: bool,
        reply: Reply<Appended>,
    },
    Context {
        window: ContextWindow,
        reply: Reply<Vec<Message>>,
    },
    Tail {
        n: usize,
        reply: Reply<Vec<Message>>,
    },
    Reset {
        stamp: String,
        reply: Reply<Result<(), MemoryError>>,
    },
}

/// Result of an append. The message is in memory even when `saved` is an
/// error.
#[derive(Debug)]
pub struct Appended {
    /// Memory length after the append.
    pub len: usize,
    /// Outcome of the snapshot write; `Ok` when no write was requested.
    pub saved: Result<(), MemoryError>,
}

/// Cloneable handle to the memory actor.
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    tx: mpsc::Sender<MemoryCommand>,
}

impl std::fmt::Debug for MemoryCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MemoryCommand::Append { .. } => "Append",
            MemoryCommand::Context { .. } => "Context",
            MemoryCommand::Tail { .. } => "Tail",
            MemoryCommand::Reset { .. } => "Reset",
        };
        f.write_str(name)
    }
}

impl MemoryHandle {
    /// Spawn the actor on the current runtime.
    ///
    /// `store` is `None` when persistence is disabled for the bot.
    pub fn spawn(memory: ConversationMemory, store: Option<SnapshotStore>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(memory_worker(rx, memory, store));
        Self { tx }
    }

    /// Append a message; returns the new length.
    pub async fn append(&self, message: Message) -> Result<usize, ChorusCoreError> {
        Ok(self.append_inner(message, false).await?.len)
    }

    /// Append a message and snapshot in the same step.
    ///
    /// Only a stopped actor is an error here; a failed snapshot write is
    /// reported in [`Appended::saved`] with the message still appended.
    pub async fn append_persisted(&self, message: Message) -> Result<Appended, ChorusCoreError> {
        self.append_inner(message, true).await
    }

    async fn append_inner(
        &self,
        message: Message,
        persist: bool,
    ) -> Result<Appended, ChorusCoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(MemoryCommand::Append {
            message,
            persist,
            reply,
        })
        .await?;
        rx.await.map_err(|_| ChorusCoreError::MemoryClosed)
    }

    /// History to send with a generation under `window`.
    pub async fn context(&self, window: ContextWindow) -> Result<Vec<Message>, ChorusCoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(MemoryCommand::Context { window, reply }).await?;
        rx.await.map_err(|_| ChorusCoreError::MemoryClosed)
    }

    /// The last `n` messages.
    pub async fn tail(&self, n: usize) -> Result<Vec<Message>, ChorusCoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(MemoryCommand::Tail { n, reply }).await?;
        rx.await.map_err(|_| ChorusCoreError::MemoryClosed)
    }

    /// Every message in order.
    pub async fn messages(&self) -> Result<Vec<Message>, ChorusCoreError> {
        self.context(ContextWindow::Full).await
    }

    /// Replace the memory with a fresh seed and persist it.
    pub async fn reset(&self, stamp: impl Into<String>) -> Result<(), ChorusCoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(MemoryCommand::Reset {
            stamp: stamp.into(),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| ChorusCoreError::MemoryClosed)??)
    }

    async fn send(&self, command: MemoryCommand) -> Result<(), ChorusCoreError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ChorusCoreError::MemoryClosed)
    }
}

async fn memory_worker(
    mut rx: mpsc::Receiver<MemoryCommand>,
    mut memory: ConversationMemory,
    store: Option<SnapshotStore>,
) {
    let save = |memory: &ConversationMemory| match store.as_ref() {
        Some(store) => store.save(memory),
        None => Ok(()),
    };

    while let Some(command) = rx.recv().await {
        match command {
            MemoryCommand::Append {
                message,
                persist,
                reply,
            } => {
                memory.append(message);
                let saved = if persist { save(&memory) } else { Ok(()) };
                if let Err(err) = &saved {
                    warn!("memory snapshot failed after append (err={err})");
                }
                let _ = reply.send(Appended {
                    len: memory.len(),
                    saved,
                });
            }
            MemoryCommand::Context { window, reply } => {
                let slice = crate::context::apply_window(memory.messages(), window);
                let _ = reply.send(slice.to_vec());
            }
            MemoryCommand::Tail { n, reply } => {
                let _ = reply.send(memory.tail(n).to_vec());
            }
            MemoryCommand::Reset { stamp, reply } => {
                memory = ConversationMemory::seeded(&stamp);
                let _ = reply.send(save(&memory));
            }
        }
    }
    debug!("memory actor stopped (messages={})", memory.len());
}
