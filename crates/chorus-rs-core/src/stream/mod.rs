//! Streaming response coordinator.
//!
//! A stream runs one generation on a background task and accumulates its
//! tokens into a buffer owned by that stream. Readers observe progress
//! through a `watch` channel and decide on their own how often to act on
//! it; the coordinator never pushes to an outward sink.

mod state;

#[cfg(test)]
mod tests;

use crate::ChorusCoreError;
use chorus_rs_protocol::{LlmClient, Message};
use log::{debug, warn};
use parking_lot::Mutex;
use rand::Rng;
use state::{ActiveGuard, StreamState};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const STREAM_ID_MIN: u32 = 111_111;
const STREAM_ID_MAX: u32 = 999_999;

/// Per-token observer: receives the new token and the text so far.
pub type TokenObserver = Box<dyn FnMut(&str, &str) + Send>;

/// Identifier of an in-flight stream, unique among active streams of one
/// coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u32);

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Launches generations and tracks the ids of streams still running.
#[derive(Clone)]
pub struct StreamCoordinator {
    llm: Arc<dyn LlmClient>,
    active: Arc<Mutex<HashSet<StreamId>>>,
    timeout: Duration,
}

impl StreamCoordinator {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self {
            llm,
            active: Arc::new(Mutex::new(HashSet::new())),
            timeout,
        }
    }

    /// Number of streams whose generation has not finished.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    /// Start a generation and return a handle to its progress.
    ///
    /// Must be called from within a tokio runtime.
    pub fn begin_stream(
        &self,
        system_context: String,
        history: Vec<Message>,
        observer: Option<TokenObserver>,
    ) -> StreamHandle {
        let id = self.allocate_id();
        let guard = ActiveGuard::new(self.active.clone(), id);
        let state = Arc::new(StreamState::default());
        let (progress_tx, progress_rx) = watch::channel(0usize);

        let llm = self.llm.clone();
        let timeout = self.timeout;
        let task_state = state.clone();
        debug!(
            "stream started (stream_id={}, model={}, history={})",
            id,
            llm.model(),
            history.len()
        );
        let task = tokio::spawn(async move {
            let _guard = guard;
            let mut observer = observer;
            let mut observed = String::new();
            let mut on_token = |token: &str| {
                let len = task_state.push(token);
                if let Some(observer) = observer.as_mut() {
                    observed.push_str(token);
                    observer(token, &observed);
                }
                progress_tx.send_replace(len);
            };
            let outcome = tokio::time::timeout(
                timeout,
                llm.generate_stream(&system_context, &history, &mut on_token),
            )
            .await;

            let result = match outcome {
                Ok(Ok(text)) => {
                    task_state.settle(&text);
                    Ok(text)
                }
                Ok(Err(err)) => Err(ChorusCoreError::Generation(err)),
                Err(_) => Err(ChorusCoreError::GenerationTimeout(timeout.as_secs())),
            };
            if let Err(err) = &result {
                warn!("stream failed (stream_id={id}, err={err})");
            }
            task_state.finish();
            progress_tx.send_modify(|_| {});
            result
        });

        StreamHandle {
            id,
            state,
            progress: progress_rx,
            task,
        }
    }

    fn allocate_id(&self) -> StreamId {
        let mut active = self.active.lock();
        let mut rng = rand::rng();
        loop {
            let id = StreamId(rng.random_range(STREAM_ID_MIN..=STREAM_ID_MAX));
            if active.insert(id) {
                return id;
            }
        }
    }
}

/// Read side of one stream.
pub struct StreamHandle {
    id: StreamId,
    state: Arc<StreamState>,
    progress: watch::Receiver<usize>,
    task: JoinHandle<Result<String, ChorusCoreError>>,
}

impl StreamHandle {
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Live copy of the text received so far.
    pub fn current_text(&self) -> String {
        self.state.text()
    }

    /// Whether the generation has finished, successfully or not.
    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// Wait until new tokens arrive or the generation finishes.
    ///
    /// Returns immediately when the stream is already done.
    pub async fn changed(&mut self) {
        if self.is_done() {
            return;
        }
        // An error means the task dropped its sender, which only happens
        // once it is finished.
        let _ = self.progress.changed().await;
    }

    /// Wait for the first non-whitespace text, re-checking at least every
    /// `poll`. Returns `false` if the stream finished without any.
    pub async fn wait_for_content(&mut self, poll: Duration) -> bool {
        loop {
            if !self.state.text().trim().is_empty() {
                return true;
            }
            if self.is_done() {
                return false;
            }
            let _ = tokio::time::timeout(poll, self.progress.changed()).await;
        }
    }

    /// Wait for the generation to end and return its final text.
    ///
    /// Failures are propagated; partial text stays readable through
    /// [`StreamHandle::current_text`] until this is called.
    pub async fn await_completion(self) -> Result<String, ChorusCoreError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(ChorusCoreError::StreamAborted(err.to_string())),
        }
    }
}
