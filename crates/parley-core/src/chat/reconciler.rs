//! Stream reconciliation: applying assistant snapshots to the message store.
//!
//! A streaming reply arrives as a sequence of whole-message snapshots, each
//! carrying the full text so far. The merge rule, in order:
//!
//! 1. If the event is not user-authored, the store is non-empty, and the
//!    last entry is not user-authored: replace the last entry.
//! 2. Otherwise: append.
//!
//! The first snapshot of a turn therefore appends (the last entry is the
//! user's message) and later snapshots replace it in place. A stream event
//! can never overwrite a user message. `is_streaming` does not affect merging.

use std::sync::{Mutex, Weak};

use parley_types::chat::{ConversationId, Message};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn, Instrument, Span};

use super::store::{lock_store, MessageStore};

/// How an event was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Appended,
    Replaced,
    /// The store was closed; nothing changed.
    Ignored,
}

/// Replace-or-append policy for incoming assistant messages.
pub struct StreamReconciler;

impl StreamReconciler {
    /// Apply one event to the store.
    pub fn apply(store: &mut MessageStore, event: Message) -> Applied {
        if store.is_closed() {
            return Applied::Ignored;
        }

        let replace = !event.is_user && store.last().is_some_and(|last| !last.is_user);
        if replace {
            store.replace_last(event);
            Applied::Replaced
        } else {
            store.append(event);
            Applied::Appended
        }
    }

    /// Whether an event belongs to the conversation currently bound.
    ///
    /// Anonymous sessions accept everything (the id is not known yet), and
    /// events without an id are accepted by every session.
    pub fn in_scope(event: &Message, bound: Option<&ConversationId>) -> bool {
        match (bound, event.conversation_id.as_ref()) {
            (None, _) | (_, None) => true,
            (Some(bound), Some(id)) => bound == id,
        }
    }

    /// Start applying `events` to `store` on a background task.
    ///
    /// The task holds only a weak reference to the store: once the owner drops
    /// it, further events are discarded and the task ends. Dropping the
    /// returned handle cancels the subscription.
    pub fn spawn(
        mut events: broadcast::Receiver<Message>,
        store: Weak<Mutex<MessageStore>>,
        scope: watch::Receiver<Option<ConversationId>>,
        span: Span,
    ) -> ReconcilerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(
            async move {
                debug!("stream reconciler started");
                loop {
                    let received = tokio::select! {
                        biased;
                        _ = cancelled.cancelled() => break,
                        received = events.recv() => received,
                    };

                    match received {
                        Ok(event) => {
                            let bound = scope.borrow().clone();
                            if !Self::in_scope(&event, bound.as_ref()) {
                                debug!(
                                    event_conversation = ?event.conversation_id,
                                    bound_conversation = ?bound,
                                    "dropping stream event for another conversation"
                                );
                                continue;
                            }

                            let Some(store) = store.upgrade() else {
                                debug!("message store dropped, stopping reconciler");
                                break;
                            };
                            let applied = Self::apply(&mut lock_store(&store), event);
                            trace!(?applied, "stream event applied");
                        }
                        // Snapshots are cumulative; skipped ones are superseded.
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "stream reconciler lagged behind the feed");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("stream feed closed");
                            break;
                        }
                    }
                }
                debug!("stream reconciler stopped");
            }
            .instrument(span),
        );

        ReconcilerHandle {
            token,
            task: Some(task),
        }
    }
}

/// Owns a running reconciler task. Cancels it on drop.
#[derive(Debug)]
pub struct ReconcilerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ReconcilerHandle {
    /// Stop consuming events. Events already applied stay applied.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Cancel and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "stream reconciler task failed");
            }
        }
    }
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
