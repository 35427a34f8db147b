//! Latest correlation id seen on any response

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Response header carrying the backend's correlation id
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// What to do when a response carries no correlation id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationPolicy {
    /// Reset the tracked value to the empty string
    #[default]
    #[serde(rename = "clear")]
    ClearOnMissing,
    /// Leave the previously tracked value in place
    #[serde(rename = "keep")]
    KeepLastSeen,
}

/// Thread-safe single-slot store for the most recent correlation id.
///
/// Clones share the slot. Concurrent requests race on it; the last write
/// wins.
#[derive(Debug, Clone, Default)]
pub struct CorrelationTracker {
    slot: Arc<RwLock<String>>,
    policy: CorrelationPolicy,
}

impl CorrelationTracker {
    pub fn new(policy: CorrelationPolicy) -> Self {
        Self {
            slot: Arc::new(RwLock::new(String::new())),
            policy,
        }
    }

    pub fn policy(&self) -> CorrelationPolicy {
        self.policy
    }

    /// Update the slot from a response's headers
    pub fn record_from_headers(&self, headers: &HeaderMap) {
        let id = headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok());

        match (id, self.policy) {
            (Some(id), _) => self.set(id),
            (None, CorrelationPolicy::ClearOnMissing) => self.set(""),
            (None, CorrelationPolicy::KeepLastSeen) => {}
        }
    }

    pub fn set(&self, id: &str) {
        // A poisoned lock still holds a usable String
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        slot.clear();
        slot.push_str(id);
    }

    /// Latest recorded id, or empty if none yet
    pub fn current(&self) -> String {
        self.slot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
