//! Ordered message list for the active conversation.
//!
//! The store is append-only apart from `replace_last`, which the stream
//! reconciler uses to swap a partial assistant snapshot for a newer one.
//! Every mutation emits exactly one `StoreChange`, synchronously and in
//! mutation order. Once closed, mutations are silently ignored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use parley_types::chat::Message;
use tokio::sync::broadcast;
use tracing::trace;

/// Capacity of the change notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// What a mutation did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Appended,
    ReplacedLast,
    Reloaded,
}

/// Notification emitted after each store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChange {
    /// Monotonic mutation counter, starting at 1 for the first mutation.
    pub revision: u64,
    pub kind: ChangeKind,
    /// Number of messages after the mutation.
    pub len: usize,
}

/// Store handle shared between the session controller and the reconciler task.
pub type SharedStore = Arc<Mutex<MessageStore>>;

/// Lock a shared store. A poisoned lock still yields the data; every store
/// mutation leaves the list in a valid state.
pub fn lock_store(store: &Mutex<MessageStore>) -> MutexGuard<'_, MessageStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The single source of truth for what the conversation screen renders.
pub struct MessageStore {
    messages: Vec<Message>,
    revision: u64,
    closed: bool,
    changes: broadcast::Sender<StoreChange>,
}

impl MessageStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            messages: Vec::new(),
            revision: 0,
            closed: false,
            changes,
        }
    }

    /// Subscribe to change notifications for all future mutations.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Add a message to the end of the list.
    pub fn append(&mut self, message: Message) {
        if self.closed {
            return;
        }
        self.messages.push(message);
        self.notify(ChangeKind::Appended);
    }

    /// Replace the final message wholesale.
    ///
    /// Returns `false` (and changes nothing) when the store is empty or closed.
    pub fn replace_last(&mut self, message: Message) -> bool {
        if self.closed {
            return false;
        }
        let Some(last) = self.messages.last_mut() else {
            return false;
        };
        *last = message;
        self.notify(ChangeKind::ReplacedLast);
        true
    }

    /// Discard the current content and install `messages` in one step.
    pub fn clear_and_load(&mut self, messages: Vec<Message>) {
        if self.closed {
            return;
        }
        self.messages = messages;
        self.notify(ChangeKind::Reloaded);
    }

    /// Read-only ordered view for rendering.
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Tear the store down. Later mutations become no-ops.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn notify(&mut self, kind: ChangeKind) {
        self.revision += 1;
        let change = StoreChange {
            revision: self.revision,
            kind,
            len: self.messages.len(),
        };
        trace!(revision = change.revision, kind = ?kind, len = change.len, "message store changed");
        let _ = self.changes.send(change);
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStore")
            .field("len", &self.messages.len())
            .field("revision", &self.revision)
            .field("closed", &self.closed)
            .finish()
    }
}
