//! Chat data model — messages, sessions, the shared read model, and the
//! wire shapes exchanged with the hosted chatbot endpoint.
//!
//! Field names follow the persisted/exchanged JSON: messages and history
//! records are camelCase, session records and API bodies are snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

// =============================================================================
// MESSAGE
// =============================================================================

/// One chat turn. Immutable once appended to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub is_bot: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Caller-supplied part of a message; the store assigns the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub text: String,
    pub is_bot: bool,
    /// Defaults to the store clock's `now` when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewMessage {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_bot: false, timestamp: None }
    }

    #[must_use]
    pub fn bot(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_bot: true, timestamp: None }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// A logical conversation with a sliding expiry window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
}

impl Session {
    /// Valid while active and touched within `timeout` of `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        self.is_active && now.signed_duration_since(self.last_activity) < timeout
    }
}

// =============================================================================
// READ MODELS
// =============================================================================

/// Snapshot every view mirrors.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedChatState {
    pub current_session: Option<Session>,
    pub message_history: Vec<Message>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub last_sync_timestamp: DateTime<Utc>,
}

/// Persisted history record, also the export snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    pub messages: Vec<Message>,
    pub last_updated: DateTime<Utc>,
    pub session_id: String,
}

/// Result of a successful round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct SendOutcome {
    pub user_message: Message,
    pub bot_message: Message,
}

// =============================================================================
// SYNC EVENTS
// =============================================================================

/// Change notification broadcast by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    MessageAdded(Message),
    MessagesCleared,
    /// `None` when the session ended without a replacement.
    SessionChanged(Option<Session>),
    StateUpdated { message_count: usize },
    LoadingStarted,
    LoadingStopped,
    ErrorOccurred { message: String, kind: ErrorKind },
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// `POST` body sent to the chatbot endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// Structured success body. Bare-string bodies are accepted separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReplyStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}
