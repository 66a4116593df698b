//! ChatService trait definition.
//!
//! The network side of a conversation: sending messages, fetching history,
//! renaming and deleting conversations, and the broadcast feed of streamed
//! assistant output. Uses native async fn in traits (RPITIT, Rust 2024
//! edition), following the same pattern as the repository traits.

use parley_types::chat::{Attachment, ConversationId, Message};
use parley_types::error::ChatServiceError;
use tokio::sync::broadcast;

/// Client for the remote chat service.
///
/// Implementations live in parley-infra (e.g., `HttpChatService`).
pub trait ChatService: Send + Sync {
    /// Bind the service to a conversation (or to none) before other calls.
    fn set_conversation_id(&self, id: Option<ConversationId>);

    /// Send a user message. Returns the assistant's (or echoed) message,
    /// carrying `conversation_id` when one was newly assigned.
    fn send_message(
        &self,
        text: &str,
        files: &[Attachment],
    ) -> impl std::future::Future<Output = Result<Message, ChatServiceError>> + Send;

    /// Fetch the ordered message history of a conversation.
    fn get_message_history(
        &self,
        id: &ConversationId,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, ChatServiceError>> + Send;

    /// Rename a conversation and return the title the service settled on.
    ///
    /// With `auto_generate`, `new_title` is ignored and the name is derived
    /// server-side.
    fn rename_conversation(
        &self,
        id: &ConversationId,
        new_title: &str,
        auto_generate: bool,
    ) -> impl std::future::Future<Output = Result<String, ChatServiceError>> + Send;

    /// Delete a conversation.
    fn delete_conversation(
        &self,
        id: &ConversationId,
    ) -> impl std::future::Future<Output = Result<(), ChatServiceError>> + Send;

    /// Subscribe to the broadcast feed of streamed assistant snapshots.
    fn subscribe(&self) -> broadcast::Receiver<Message>;
}
