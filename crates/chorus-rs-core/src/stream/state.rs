use super::StreamId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Buffer written only by the generation task.
#[derive(Debug, Default)]
pub(super) struct StreamState {
    buffer: RwLock<String>,
    done: AtomicBool,
}

impl StreamState {
    /// Append a token; returns the new buffer length.
    pub(super) fn push(&self, token: &str) -> usize {
        let mut buffer = self.buffer.write();
        buffer.push_str(token);
        buffer.len()
    }

    pub(super) fn text(&self) -> String {
        self.buffer.read().clone()
    }

    /// Adopt the backend's final text when it extends what was streamed.
    pub(super) fn settle(&self, text: &str) {
        let mut buffer = self.buffer.write();
        if text.starts_with(buffer.as_str()) {
            let streamed = buffer.len();
            buffer.push_str(&text[streamed..]);
        }
    }

    pub(super) fn finish(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub(super) fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// Releases a stream id when the generation task ends, including on panic.
pub(super) struct ActiveGuard {
    active: Arc<Mutex<HashSet<StreamId>>>,
    id: StreamId,
}

impl ActiveGuard {
    pub(super) fn new(active: Arc<Mutex<HashSet<StreamId>>>, id: StreamId) -> Self {
        Self { active, id }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.id);
    }
}
