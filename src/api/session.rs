//! Caller-owned marker for the active conversation attempt

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared generation counter identifying the active local conversation.
///
/// The caller keeps one clone and bumps it when the user moves on (new chat,
/// switched conversation, stop button). A running stream holds another clone
/// and compares it against the value captured when the stream started.
#[derive(Debug, Clone, Default)]
pub struct SessionToken {
    generation: Arc<AtomicU64>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a new session, invalidating streams tied to the old one
    pub fn advance(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn set(&self, generation: u64) {
        self.generation.store(generation, Ordering::SeqCst);
    }

    /// True while the token still holds `captured`
    pub fn is_current(&self, captured: u64) -> bool {
        self.current() == captured
    }
}
