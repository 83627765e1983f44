use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

const SUBSCRIBER_CAPACITY: usize = 64;

/// Append-only log of human-readable status lines.
///
/// Lines are kept for later rendering and also broadcast to live
/// subscribers. Clones share the same log.
#[derive(Clone)]
pub struct StatusLog {
    lines: Arc<Mutex<Vec<String>>>,
    sender: broadcast::Sender<String>,
}

impl Default for StatusLog {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            lines: Arc::new(Mutex::new(Vec::new())),
            sender,
        }
    }
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line and notify subscribers.
    pub fn push(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        // No subscribers is fine.
        let _ = self.sender.send(message);
    }

    /// Receive lines pushed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Snapshot of every line pushed so far.
    pub fn messages(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|line| line.contains(needle))
    }
}

impl std::fmt::Debug for StatusLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusLog")
            .field("lines", &self.messages().len())
            .finish()
    }
}
