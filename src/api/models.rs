//! Request and response structures exchanged with the chat backend

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Conversation mode; decides which optional key of a stream request is meaningful
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatModeKey {
    /// Free chat with a selectable language model
    Generic,
    /// Retrieval over a knowledge base
    Documents,
}

impl ChatModeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatModeKey::Generic => "generic",
            ChatModeKey::Documents => "documents",
        }
    }
}

impl std::str::FromStr for ChatModeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generic" => Ok(ChatModeKey::Generic),
            "documents" => Ok(ChatModeKey::Documents),
            other => Err(format!("unknown chat mode '{}'", other)),
        }
    }
}

/// A request to stream an answer for one user prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAnswerRequest {
    /// Existing conversation, or None to have the backend create one
    pub conversation_id: Option<String>,
    pub user_prompt: String,
    pub chat_mode_key: ChatModeKey,
    /// Only sent in generic mode
    pub language_model_key: Option<String>,
    /// Only sent in documents mode
    pub knowledge_base_key: Option<String>,
}

impl StreamAnswerRequest {
    /// `user_prompt` must not be empty; streaming an empty prompt fails with
    /// [`TransportError::EmptyPrompt`](super::TransportError::EmptyPrompt).
    pub fn new(user_prompt: impl Into<String>, chat_mode_key: ChatModeKey) -> Self {
        Self {
            conversation_id: None,
            user_prompt: user_prompt.into(),
            chat_mode_key,
            language_model_key: None,
            knowledge_base_key: None,
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_language_model(mut self, key: impl Into<String>) -> Self {
        self.language_model_key = Some(key.into());
        self
    }

    pub fn with_knowledge_base(mut self, key: impl Into<String>) -> Self {
        self.knowledge_base_key = Some(key.into());
        self
    }

    /// Wire body, with the key that does not belong to the mode blanked
    pub fn to_body(&self) -> StreamAnswerBody {
        let language_model_key = match self.chat_mode_key {
            ChatModeKey::Generic => self.language_model_key.clone().unwrap_or_default(),
            ChatModeKey::Documents => String::new(),
        };
        let knowledge_base_key = match self.chat_mode_key {
            ChatModeKey::Documents => self.knowledge_base_key.clone().unwrap_or_default(),
            ChatModeKey::Generic => String::new(),
        };

        StreamAnswerBody {
            chat_id: self.conversation_id.clone(),
            user_prompt: self.user_prompt.clone(),
            chat_mode_key: self.chat_mode_key,
            language_model_key,
            knowledge_base_key,
        }
    }
}

/// JSON body of the stream start request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAnswerBody {
    pub chat_id: Option<String>,
    pub user_prompt: String,
    pub chat_mode_key: ChatModeKey,
    pub language_model_key: String,
    pub knowledge_base_key: String,
}

/// How a stream ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The backend closed the body
    Completed,
    /// The caller's session changed mid-stream
    Cancelled,
}

/// Outcome of one streaming invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAnswerResult {
    pub user_prompt: String,
    /// Every chunk delivered to the callback, concatenated in arrival order
    pub final_answer: String,
    /// Conversation id assigned by the backend for a new conversation
    pub new_chat_id: Option<String>,
    pub outcome: StreamOutcome,
}

impl StreamAnswerResult {
    pub fn is_cancelled(&self) -> bool {
        self.outcome == StreamOutcome::Cancelled
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Version of the terms of use the user accepted, if any
    pub tou_version: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub language: Option<String>,
    pub chat_mode_key: Option<ChatModeKey>,
    pub language_model_key: Option<String>,
    pub knowledge_base_key: Option<String>,
    /// Settings this client does not interpret, passed back untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageType {
    pub language: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chat {
    pub id: String,
    pub title: Option<String>,
    pub chat_mode_key: Option<ChatModeKey>,
    pub created_at: Option<String>,
    pub hidden: bool,
}

impl Chat {
    /// A chat worth listing: has an id and title and was not hidden
    pub fn is_listable(&self) -> bool {
        !self.id.is_empty() && self.title.as_deref().is_some_and(|t| !t.is_empty()) && !self.hidden
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[default]
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Source {
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub url: Option<String>,
    pub page_label: Option<String>,
    pub last_modified_date: Option<String>,
    pub relevance: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: String,
    pub chat_id: Option<String>,
    pub role: MessageRole,
    pub content: String,
    pub created_at: Option<String>,
    pub feedback: Option<MessageFeedback>,
    /// Sources keyed by citation index
    pub sources: Option<BTreeMap<String, Source>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatMetadataAndMessages {
    pub chat: Option<Chat>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFeedback {
    Positive,
    Negative,
    None,
}

impl std::str::FromStr for MessageFeedback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" | "up" => Ok(MessageFeedback::Positive),
            "negative" | "down" => Ok(MessageFeedback::Negative),
            "none" => Ok(MessageFeedback::None),
            other => Err(format!("unknown feedback '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFeedbackRequest {
    pub message_id: String,
    pub feedback: MessageFeedback,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendFeedbackResponse {
    pub message_id: String,
    pub feedback: Option<MessageFeedback>,
    pub comment_feedback: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HideChatResponse {
    pub id: String,
    pub hidden: bool,
}
