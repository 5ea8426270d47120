use async_trait::async_trait;
use chorus_rs_protocol::{
    BotIdentity, ChatPlatform, MessageHandle, PlatformConnection, PlatformConnector,
    PlatformError, PlatformEvent, Venue,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Outward operation observed by [`RecordingPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformOp {
    Send { venue_id: String, text: String },
    Edit { message_id: String, text: String },
    Typing { venue_id: String, active: bool },
}

/// In-memory chat platform that records every outward call.
#[derive(Debug, Default)]
pub struct RecordingPlatform {
    self_id: String,
    ops: Mutex<Vec<PlatformOp>>,
    next_id: AtomicUsize,
    failing_sends: AtomicUsize,
    failing_edits: AtomicUsize,
}

impl RecordingPlatform {
    pub fn new(self_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            self_id: self_id.into(),
            ..Self::default()
        })
    }

    /// Make the next `count` sends fail with a delivery error.
    pub fn fail_next_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` edits fail with a delivery error.
    pub fn fail_next_edits(&self, count: usize) {
        self.failing_edits.store(count, Ordering::SeqCst);
    }

    pub fn ops(&self) -> Vec<PlatformOp> {
        self.ops.lock().clone()
    }

    pub fn sends(&self) -> Vec<String> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match op {
                PlatformOp::Send { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<String> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match op {
                PlatformOp::Edit { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Latest text of the first message the platform accepted.
    pub fn final_text(&self) -> Option<String> {
        let ops = self.ops.lock();
        let mut text = None;
        for op in ops.iter() {
            match op {
                PlatformOp::Send { text: sent, .. } if text.is_none() => {
                    text = Some(sent.clone())
                }
                PlatformOp::Edit { text: edited, .. } => text = Some(edited.clone()),
                _ => {}
            }
        }
        text
    }

    /// Connection whose events are fed through the returned sender.
    pub fn connection(self: &Arc<Self>) -> (PlatformConnection, mpsc::Sender<PlatformEvent>) {
        let (tx, rx) = mpsc::channel(32);
        (
            PlatformConnection {
                platform: self.clone(),
                events: rx,
            },
            tx,
        )
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    fn self_id(&self) -> String {
        self.self_id.clone()
    }

    async fn send(&self, venue: &Venue, text: &str) -> Result<MessageHandle, PlatformError> {
        if Self::take_failure(&self.failing_sends) {
            return Err(PlatformError::Delivery("scripted send failure".to_string()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.ops.lock().push(PlatformOp::Send {
            venue_id: venue.id.clone(),
            text: text.to_string(),
        });
        Ok(MessageHandle {
            venue_id: venue.id.clone(),
            message_id: format!("msg-{id}"),
        })
    }

    async fn edit(&self, handle: &MessageHandle, text: &str) -> Result<(), PlatformError> {
        if Self::take_failure(&self.failing_edits) {
            return Err(PlatformError::Delivery("scripted edit failure".to_string()));
        }
        self.ops.lock().push(PlatformOp::Edit {
            message_id: handle.message_id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn set_typing(&self, venue: &Venue, active: bool) -> Result<(), PlatformError> {
        self.ops.lock().push(PlatformOp::Typing {
            venue_id: venue.id.clone(),
            active,
        });
        Ok(())
    }
}

/// Connector that hands out pre-scripted connection results in order.
///
/// Once the script is exhausted every connect attempt fails.
#[derive(Default)]
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Result<PlatformConnection, PlatformError>>>,
    attempts: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(script: Vec<Result<PlatformConnection, PlatformError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformConnector for ScriptedConnector {
    async fn connect(&self, _bot: &BotIdentity) -> Result<PlatformConnection, PlatformError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(PlatformError::Connect("script exhausted".to_string())))
    }
}
