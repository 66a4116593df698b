//! Single-conversation session management.
//!
//! The `SessionController` composes the `MessageStore`, the stream
//! reconciler, and the `ConversationLifecycle` over a `ChatService`.

pub mod feed;
pub mod lifecycle;
pub mod reconciler;
pub mod service;
pub mod session;
pub mod store;
pub mod title;

#[cfg(test)]
pub(crate) mod testing;

pub use feed::MessageFeed;
pub use lifecycle::{ConversationLifecycle, DeleteOutcome, RenameOutcome};
pub use reconciler::{Applied, ReconcilerHandle, StreamReconciler};
pub use service::ChatService;
pub use session::{SessionController, SubmitOutcome};
pub use store::{ChangeKind, MessageStore, SharedStore, StoreChange};
