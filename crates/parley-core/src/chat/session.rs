//! Session controller for one visible conversation.
//!
//! Composes the `MessageStore`, the stream reconciler, and the
//! `ConversationLifecycle`, and orchestrates user submissions:
//! optimistic insert, send, reply reconciliation, first-send identity and
//! auto-naming, and error recovery. The presentation layer reads the store
//! snapshot, the busy flag, the last error, and the title from here.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use parley_types::chat::{Attachment, Conversation, ConversationId, ConversationPhase, Message};
use parley_types::error::{Operation, SessionError};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn, Span};

use super::lifecycle::{ConversationLifecycle, DeleteOutcome, RenameOutcome};
use super::reconciler::{ReconcilerHandle, StreamReconciler};
use super::service::ChatService;
use super::store::{lock_store, MessageStore, SharedStore, StoreChange};

/// Result of a `submit` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank input; nothing was inserted or sent.
    Ignored,
    /// The service accepted the message.
    Sent {
        reply: Message,
        /// Set when this send gave an anonymous conversation its identity.
        created: Option<ConversationId>,
    },
}

/// Marks the controller busy for as long as it lives.
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The public-facing unit for one conversation screen.
///
/// Owns the message store and conversation state exclusively. Methods take
/// `&self` so stream events can be applied while a submit is awaiting the
/// service.
pub struct SessionController<S: ChatService> {
    service: Arc<S>,
    store: SharedStore,
    lifecycle: ConversationLifecycle<S>,
    busy: AtomicUsize,
    last_error: Mutex<Option<String>>,
    load_error: Mutex<Option<String>>,
    reconciler: Mutex<Option<ReconcilerHandle>>,
    span: Span,
}

impl<S: ChatService> SessionController<S> {
    /// Create a controller for a new, anonymous conversation.
    pub fn new(service: Arc<S>) -> Self {
        let lifecycle = ConversationLifecycle::new(Arc::clone(&service));
        Self {
            service,
            store: Arc::new(Mutex::new(MessageStore::new())),
            lifecycle,
            busy: AtomicUsize::new(0),
            last_error: Mutex::new(None),
            load_error: Mutex::new(None),
            reconciler: Mutex::new(None),
            span: Span::none(),
        }
    }

    /// Run the reconciler task under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Subscribe the reconciler to the service's stream feed.
    ///
    /// Replaces (and cancels) any previous subscription, so at most one
    /// reconciler applies events to this store. Must be called from within a
    /// Tokio runtime.
    pub fn attach_stream(&self) {
        let handle = StreamReconciler::spawn(
            self.service.subscribe(),
            Arc::downgrade(&self.store),
            self.lifecycle.scope(),
            self.span.clone(),
        );
        if let Some(previous) = lock(&self.reconciler).replace(handle) {
            previous.cancel();
        }
    }

    /// Bind to an existing conversation and load its history.
    pub async fn open_existing(
        &self,
        id: ConversationId,
        title: Option<String>,
    ) -> Result<usize, SessionError> {
        self.lifecycle.bind_existing(id, title)?;
        self.load_history().await
    }

    // --- Presentation-facing state ---

    /// Ordered copy of the messages to render.
    pub fn snapshot(&self) -> Vec<Message> {
        lock_store(&self.store).snapshot().to_vec()
    }

    pub fn message_count(&self) -> usize {
        lock_store(&self.store).len()
    }

    /// Store change notifications, one per mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        lock_store(&self.store).subscribe()
    }

    /// Whether a send or history load is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst) > 0
    }

    /// The most recent service failure, until dismissed.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn dismiss_error(&self) {
        lock(&self.last_error).take();
    }

    /// History load failure, shown only while there is nothing else to show.
    pub fn visible_load_error(&self) -> Option<String> {
        if lock_store(&self.store).is_empty() {
            lock(&self.load_error).clone()
        } else {
            None
        }
    }

    pub fn title(&self) -> String {
        self.lifecycle.title()
    }

    pub fn conversation(&self) -> Conversation {
        self.lifecycle.conversation()
    }

    pub fn phase(&self) -> ConversationPhase {
        self.lifecycle.phase()
    }

    /// True once the conversation is deleted; the screen should close.
    pub fn should_close(&self) -> bool {
        self.lifecycle.is_deleted()
    }

    pub fn lifecycle(&self) -> &ConversationLifecycle<S> {
        &self.lifecycle
    }

    // --- Operations ---

    /// Submit user text with optional attachments.
    ///
    /// Blank text is ignored. Otherwise the user message is appended at once
    /// and stays visible whether or not the send succeeds. The busy flag is
    /// cleared before the first-send auto-naming follow-up runs. A send that
    /// resolves after `shutdown` changes nothing.
    #[tracing::instrument(skip(self, text, files), fields(chars = text.len(), files = files.len()))]
    pub async fn submit(
        &self,
        text: &str,
        files: Vec<Attachment>,
    ) -> Result<SubmitOutcome, SessionError> {
        if text.trim().is_empty() {
            debug!("ignoring blank submission");
            return Ok(SubmitOutcome::Ignored);
        }

        let conversation = self.lifecycle.conversation();
        if conversation.is_deleted() {
            error!("submit attempted on a deleted conversation");
            return Err(SessionError::ConversationDeleted {
                operation: Operation::SendMessage,
            });
        }
        let was_anonymous = conversation.is_anonymous();

        {
            let mut store = lock_store(&self.store);
            if store.is_closed() {
                error!("submit attempted on a closed session");
                return Err(SessionError::SessionClosed {
                    operation: Operation::SendMessage,
                });
            }
            store.append(Message::user(text, files.clone(), conversation.id));
        }

        let result = {
            let _busy = BusyGuard::enter(&self.busy);
            self.service.send_message(text, &files).await
        };

        if lock_store(&self.store).is_closed() {
            debug!("session closed while sending; discarding result");
            return Err(SessionError::SessionClosed {
                operation: Operation::SendMessage,
            });
        }

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                let err = SessionError::service(Operation::SendMessage, e);
                warn!(error = %err, "send failed; keeping optimistic message");
                self.record_error(&err);
                return Err(err);
            }
        };

        if !reply.is_user {
            let applied = StreamReconciler::apply(&mut lock_store(&self.store), reply.clone());
            debug!(?applied, "reply reconciled");
        }

        let mut created = None;
        if was_anonymous {
            if let Some(id) = reply.conversation_id.clone() {
                created = Some(id.clone());
                if let Err(e) = self.lifecycle.on_first_send_completed(id).await {
                    self.record_error(&e);
                }
            }
        }

        Ok(SubmitOutcome::Sent { reply, created })
    }

    /// Replace the store with the bound conversation's history.
    ///
    /// On failure the current messages stay; the error is recorded and, while
    /// the store is empty, exposed through `visible_load_error`.
    #[tracing::instrument(skip(self))]
    pub async fn load_history(&self) -> Result<usize, SessionError> {
        let id = self.lifecycle.require_identity(Operation::LoadHistory)?;

        let result = {
            let _busy = BusyGuard::enter(&self.busy);
            self.service.get_message_history(&id).await
        };

        match result {
            Ok(messages) => {
                let count = messages.len();
                lock_store(&self.store).clear_and_load(messages);
                lock(&self.load_error).take();
                info!(conversation_id = %id, count, "history loaded");
                Ok(count)
            }
            Err(e) => {
                let err = SessionError::service(Operation::LoadHistory, e);
                warn!(conversation_id = %id, error = %err, "history load failed");
                *lock(&self.load_error) = Some(err.to_string());
                self.record_error(&err);
                Err(err)
            }
        }
    }

    /// Empty the visible message list.
    pub fn clear(&self) {
        lock_store(&self.store).clear_and_load(Vec::new());
    }

    /// Rename the conversation. A blank title is a no-op.
    pub async fn rename(&self, new_title: &str) -> Result<RenameOutcome, SessionError> {
        self.lifecycle
            .rename(new_title)
            .await
            .inspect_err(|e| self.record_error(e))
    }

    /// Delete the conversation. On success the store is discarded and the
    /// stream subscription released.
    pub async fn delete(&self) -> Result<DeleteOutcome, SessionError> {
        let outcome = self
            .lifecycle
            .delete()
            .await
            .inspect_err(|e| self.record_error(e))?;
        self.teardown();
        Ok(outcome)
    }

    /// Release the stream subscription and close the store. Later
    /// mutations, including from in-flight calls, are ignored.
    pub async fn shutdown(&self) {
        let handle = lock(&self.reconciler).take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
        lock_store(&self.store).close();
        debug!("session shut down");
    }

    fn teardown(&self) {
        if let Some(handle) = lock(&self.reconciler).take() {
            handle.cancel();
        }
        let mut store = lock_store(&self.store);
        store.clear_and_load(Vec::new());
        store.close();
    }

    fn record_error(&self, err: &SessionError) {
        if err.is_service() {
            *lock(&self.last_error) = Some(err.to_string());
        }
    }
}

impl<S: ChatService> Drop for SessionController<S> {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.reconciler).take() {
            handle.cancel();
        }
        lock_store(&self.store).close();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
