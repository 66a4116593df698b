//! Error types shared by the chat service, session and settings layers.

use thiserror::Error;

use std::fmt;

/// Failures reported by a chat service implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatServiceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("authentication failed")]
    Unauthorized,

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("chat service not configured: {0}")]
    NotConfigured(String),
}

/// The session-level operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SendMessage,
    LoadHistory,
    RenameConversation,
    DeleteConversation,
    GenerateTitle,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::SendMessage => write!(f, "send message"),
            Operation::LoadHistory => write!(f, "load history"),
            Operation::RenameConversation => write!(f, "rename conversation"),
            Operation::DeleteConversation => write!(f, "delete conversation"),
            Operation::GenerateTitle => write!(f, "generate title"),
        }
    }
}

/// Errors from session controller operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The chat service call failed. Recoverable; shown to the user.
    #[error("failed to {operation}: {source}")]
    Service {
        operation: Operation,
        #[source]
        source: ChatServiceError,
    },

    /// The operation needs a conversation identity and there is none.
    #[error("cannot {operation}: conversation has no identity yet")]
    MissingConversation { operation: Operation },

    /// The conversation was deleted; nothing more can be done with it.
    #[error("cannot {operation}: conversation was deleted")]
    ConversationDeleted { operation: Operation },

    /// The session was shut down; late results are discarded.
    #[error("cannot {operation}: session is closed")]
    SessionClosed { operation: Operation },
}

impl SessionError {
    pub fn service(operation: Operation, source: ChatServiceError) -> Self {
        SessionError::Service { operation, source }
    }

    /// Whether this error came from the chat service (as opposed to a
    /// caller-side precondition violation).
    pub fn is_service(&self) -> bool {
        matches!(self, SessionError::Service { .. })
    }
}

/// Errors from the settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io error: {0}")]
    Io(String),

    #[error("failed to serialize settings: {0}")]
    Serialize(String),
}
