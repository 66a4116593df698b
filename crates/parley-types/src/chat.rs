//! Message, attachment, and conversation types for Parley.
//!
//! These types model one chat conversation from the client's point of view:
//! the ordered messages shown on screen and the identity/title of the
//! conversation they belong to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// Title shown until a conversation is auto-named or renamed.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

/// Server-assigned identity of a persisted conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A file attached to a user message.
///
/// `handle` is opaque to the session layer: a path, upload token, or URI
/// understood by the chat service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub handle: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: handle.into(),
        }
    }
}

/// A single message within a conversation.
///
/// Assistant replies arrive as cumulative snapshots: each snapshot carries
/// the full text produced so far, and `is_streaming` is false on the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Text body. May be empty while an assistant reply is streaming.
    #[serde(default)]
    pub content: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_streaming: bool,
    /// Absent on the first user message of a conversation that has no identity yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    /// Attachments, in the order the user added them (user messages only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<Attachment>,
}

impl Message {
    /// Build a locally authored message stamped with the current time.
    pub fn user(
        content: impl Into<String>,
        files: Vec<Attachment>,
        conversation_id: Option<ConversationId>,
    ) -> Self {
        Self {
            content: content.into(),
            is_user: true,
            timestamp: Utc::now(),
            is_streaming: false,
            conversation_id,
            files,
        }
    }

    /// Build an assistant message. Producers normally supply their own timestamp;
    /// this is mostly useful for services and tests.
    pub fn assistant(content: impl Into<String>, is_streaming: bool) -> Self {
        Self {
            content: content.into(),
            is_user: false,
            timestamp: Utc::now(),
            is_streaming,
            conversation_id: None,
            files: Vec::new(),
        }
    }

    pub fn with_conversation_id(mut self, id: impl Into<ConversationId>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Identity phase of a conversation.
///
/// `Anonymous` and `Deleted` have no further identity transitions;
/// `Deleted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    /// No server identity yet (local draft).
    Anonymous,
    /// Identity assigned, auto-generated title requested but not yet received.
    AutoNaming,
    /// Identity assigned.
    Identified,
    /// Deleted on the server; the owning screen should close.
    Deleted,
}

impl fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationPhase::Anonymous => write!(f, "anonymous"),
            ConversationPhase::AutoNaming => write!(f, "auto_naming"),
            ConversationPhase::Identified => write!(f, "identified"),
            ConversationPhase::Deleted => write!(f, "deleted"),
        }
    }
}

/// A conversation's identity and display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Option<ConversationId>,
    pub title: String,
    pub phase: ConversationPhase,
}

impl Conversation {
    /// A fresh conversation with no identity.
    pub fn anonymous() -> Self {
        Self {
            id: None,
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            phase: ConversationPhase::Anonymous,
        }
    }

    /// A conversation that already exists on the server.
    pub fn existing(id: ConversationId, title: Option<String>) -> Self {
        Self {
            id: Some(id),
            title: title.unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string()),
            phase: ConversationPhase::Identified,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.phase == ConversationPhase::Deleted
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::anonymous()
    }
}
