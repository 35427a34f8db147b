//! Backend endpoint URLs, derived from the configured base URL

use super::models::ChatModeKey;
use reqwest::Url;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Query flags for fetching a chat by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatQuery {
    pub with_chat: bool,
    pub with_messages: bool,
}

impl Default for ChatQuery {
    fn default() -> Self {
        Self {
            with_chat: true,
            with_messages: false,
        }
    }
}

impl ChatQuery {
    /// Messages only, without the chat metadata
    pub fn messages_only() -> Self {
        Self {
            with_chat: false,
            with_messages: true,
        }
    }

    /// Chat metadata together with its messages
    pub fn chat_and_messages() -> Self {
        Self {
            with_chat: true,
            with_messages: true,
        }
    }
}

/// Maps backend resources to fully-qualified URLs
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Result<Self, EndpointError> {
        let base = Url::parse(base_url).map_err(|e| EndpointError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        if base.cannot_be_a_base() {
            return Err(EndpointError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "URL cannot carry a path".to_string(),
            });
        }

        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Append path segments to the base URL, percent-encoding each one
    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn health(&self) -> Url {
        self.join(&["health"])
    }

    pub fn user_upsert(&self) -> Url {
        self.join(&["user-service", "user"])
    }

    pub fn terms_of_use(&self, version: &str) -> Url {
        self.join(&["user-service", "user", "tou", version])
    }

    pub fn user_settings(&self) -> Url {
        self.join(&["user-service", "user", "settings"])
    }

    pub fn language(&self) -> Url {
        self.join(&["user-service", "user", "tou", "language"])
    }

    /// Chat list for a mode; no mode yields the bare listing with a trailing slash
    pub fn chats_by_mode(&self, mode: Option<ChatModeKey>) -> Url {
        let mode = mode.map(|m| m.as_str()).unwrap_or("");
        self.join(&["chat-service", "chat", "mode", mode])
    }

    pub fn chat_by_id(&self, chat_id: &str, query: ChatQuery) -> Url {
        let mut url = self.join(&["chat-service", "chat", "id", chat_id]);
        url.query_pairs_mut()
            .append_pair("with_chat", bool_str(query.with_chat))
            .append_pair("with_messages", bool_str(query.with_messages));
        url
    }

    pub fn chat_hide(&self, chat_id: &str) -> Url {
        self.join(&["chat-service", "chat", "hide", chat_id])
    }

    pub fn stream_start(&self) -> Url {
        self.join(&["chat-service", "chat", "stream", "start"])
    }

    pub fn stream_stop(&self, chat_id: &str) -> Url {
        self.join(&["chat-service", "chat", "stream", "stop", chat_id])
    }

    pub fn message_feedback(&self) -> Url {
        self.join(&["chat-service", "message", "feedback"])
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
