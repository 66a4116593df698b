//! Chat service wire types.
//!
//! Request and response bodies for the chat service's JSON endpoints. Field
//! names are camelCase on the wire. Messages themselves use the shared
//! `parley_types::chat::Message` representation.

use serde::{Deserialize, Serialize};

use parley_types::chat::{Attachment, ConversationId};

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest<'a> {
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<&'a ConversationId>,
    pub user_id: &'a str,
    pub files: &'a [Attachment],
}

/// Body of `PATCH /conversations/{id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest<'a> {
    pub title: &'a str,
    pub auto_generate: bool,
}

/// Response of `PATCH /conversations/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RenameResponse {
    #[serde(default)]
    pub title: String,
}
