//! Conversation identity lifecycle.
//!
//! ```text
//! Anonymous --(first send returns id)--> AutoNaming --(name received)--> Identified
//! Identified/AutoNaming --(rename succeeds)--> Identified
//! Identified/AutoNaming --(delete succeeds)--> Deleted (terminal)
//! ```
//!
//! A conversation is never re-anonymized. Rename and delete need an identity;
//! calling them without one is a caller bug and is rejected with
//! `SessionError::MissingConversation`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use parley_types::chat::{Conversation, ConversationId, ConversationPhase};
use parley_types::error::{Operation, SessionError};
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::service::ChatService;
use super::title::normalize_title;

/// Result of a rename request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The service accepted the new title.
    Renamed { title: String },
    /// The requested title was blank; nothing was sent.
    Rejected,
}

/// Result of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The conversation is gone; the owning screen should close.
    Deleted { id: ConversationId },
}

/// Owns the identity and title of one conversation.
pub struct ConversationLifecycle<S: ChatService> {
    service: Arc<S>,
    conversation: Mutex<Conversation>,
    scope: watch::Sender<Option<ConversationId>>,
}

impl<S: ChatService> ConversationLifecycle<S> {
    /// Start an anonymous conversation and unbind the service.
    pub fn new(service: Arc<S>) -> Self {
        service.set_conversation_id(None);
        let (scope, _) = watch::channel(None);
        Self {
            service,
            conversation: Mutex::new(Conversation::anonymous()),
            scope,
        }
    }

    /// Current state of the conversation.
    pub fn conversation(&self) -> Conversation {
        self.lock().clone()
    }

    pub fn id(&self) -> Option<ConversationId> {
        self.lock().id.clone()
    }

    pub fn title(&self) -> String {
        self.lock().title.clone()
    }

    pub fn phase(&self) -> ConversationPhase {
        self.lock().phase
    }

    /// Whether the owning screen should close.
    pub fn is_deleted(&self) -> bool {
        self.lock().is_deleted()
    }

    /// Watch the bound conversation id (used to scope the stream feed).
    pub fn scope(&self) -> watch::Receiver<Option<ConversationId>> {
        self.scope.subscribe()
    }

    /// Bind to a conversation that already exists on the server.
    ///
    /// No network effect; the caller loads history afterwards.
    pub fn bind_existing(
        &self,
        id: ConversationId,
        title: Option<String>,
    ) -> Result<(), SessionError> {
        {
            let mut conversation = self.lock();
            if conversation.is_deleted() {
                return Err(SessionError::ConversationDeleted {
                    operation: Operation::LoadHistory,
                });
            }
            *conversation = Conversation::existing(id.clone(), title);
        }
        self.bind(id.clone());
        info!(conversation_id = %id, "bound existing conversation");
        Ok(())
    }

    /// Record the identity returned by the first successful send, then ask
    /// the service for an auto-generated name.
    ///
    /// Only acts when the conversation is still anonymous. Returns the applied
    /// title, or `None` when the call was ignored or the service returned a
    /// blank name. An auto-naming failure leaves the conversation identified
    /// with its current title.
    #[tracing::instrument(name = "auto_name", skip(self, new_id), fields(conversation_id = %new_id))]
    pub async fn on_first_send_completed(
        &self,
        new_id: ConversationId,
    ) -> Result<Option<String>, SessionError> {
        {
            let mut conversation = self.lock();
            if !conversation.is_anonymous() {
                warn!(
                    existing = ?conversation.id,
                    "ignoring first-send identity: conversation already identified"
                );
                return Ok(None);
            }
            conversation.id = Some(new_id.clone());
            conversation.phase = ConversationPhase::AutoNaming;
        }
        self.bind(new_id.clone());
        info!("conversation created");

        let result = self.service.rename_conversation(&new_id, "", true).await;

        let mut conversation = self.lock();
        if conversation.is_deleted() {
            return Ok(None);
        }
        // A rename that finished while naming was in flight takes precedence.
        if conversation.phase != ConversationPhase::AutoNaming {
            return Ok(None);
        }
        conversation.phase = ConversationPhase::Identified;

        match result {
            Ok(raw) => {
                let title = normalize_title(&raw);
                if let Some(title) = &title {
                    conversation.title = title.clone();
                    info!(title = %title, "conversation auto-named");
                } else {
                    warn!("service returned a blank auto-generated title");
                }
                Ok(title)
            }
            Err(e) => {
                warn!(error = %e, "failed to auto-name conversation");
                Err(SessionError::service(Operation::GenerateTitle, e))
            }
        }
    }

    /// Rename the conversation.
    ///
    /// A blank title is rejected without calling the service. On failure the
    /// title is unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn rename(&self, new_title: &str) -> Result<RenameOutcome, SessionError> {
        let requested = new_title.trim();
        if requested.is_empty() {
            return Ok(RenameOutcome::Rejected);
        }

        let id = self.require_identity(Operation::RenameConversation)?;
        let title = self
            .service
            .rename_conversation(&id, requested, false)
            .await
            .map_err(|e| {
                warn!(conversation_id = %id, error = %e, "rename failed");
                SessionError::service(Operation::RenameConversation, e)
            })?;
        let title = normalize_title(&title).unwrap_or_else(|| requested.to_string());

        let mut conversation = self.lock();
        if conversation.is_deleted() {
            return Err(SessionError::ConversationDeleted {
                operation: Operation::RenameConversation,
            });
        }
        conversation.title = title.clone();
        conversation.phase = ConversationPhase::Identified;
        info!(conversation_id = %id, title = %title, "conversation renamed");
        Ok(RenameOutcome::Renamed { title })
    }

    /// Delete the conversation on the server.
    ///
    /// On success the conversation becomes `Deleted` for good. On failure
    /// nothing changes.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self) -> Result<DeleteOutcome, SessionError> {
        let id = self.require_identity(Operation::DeleteConversation)?;
        self.service.delete_conversation(&id).await.map_err(|e| {
            warn!(conversation_id = %id, error = %e, "delete failed");
            SessionError::service(Operation::DeleteConversation, e)
        })?;

        self.lock().phase = ConversationPhase::Deleted;
        info!(conversation_id = %id, "conversation deleted");
        Ok(DeleteOutcome::Deleted { id })
    }

    /// The bound identity, or the precondition error for `operation`.
    pub(crate) fn require_identity(
        &self,
        operation: Operation,
    ) -> Result<ConversationId, SessionError> {
        let conversation = self.lock();
        if conversation.is_deleted() {
            error!(%operation, "operation attempted on a deleted conversation");
            return Err(SessionError::ConversationDeleted { operation });
        }
        match &conversation.id {
            Some(id) => Ok(id.clone()),
            None => {
                error!(%operation, "operation attempted without a conversation identity");
                Err(SessionError::MissingConversation { operation })
            }
        }
    }

    fn bind(&self, id: ConversationId) {
        self.service.set_conversation_id(Some(id.clone()));
        self.scope.send_replace(Some(id));
    }

    fn lock(&self) -> MutexGuard<'_, Conversation> {
        self.conversation.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::{Call, FakeChatService};
    use parley_types::chat::DEFAULT_CONVERSATION_TITLE;
    use parley_types::error::ChatServiceError;

    fn lifecycle(service: &Arc<FakeChatService>) -> ConversationLifecycle<FakeChatService> {
        ConversationLifecycle::new(Arc::clone(service))
    }

    #[tokio::test]
    async fn test_new_lifecycle_is_anonymous_and_unbinds_service() {
        let service = Arc::new(FakeChatService::new());
        let lc = lifecycle(&service);

        assert_eq!(lc.phase(), ConversationPhase::Anonymous);
        assert_eq!(lc.title(), DEFAULT_CONVERSATION_TITLE);
        assert_eq!(service.bound_id(), None);
    }

    #[tokio::test]
    async fn test_bind_existing_sets_identity_without_network() {
        let service = Arc::new(FakeChatService::new());
        let lc = lifecycle(&service);

        lc.bind_existing(ConversationId::new("c1"), Some("Old chat".to_string()))
            .unwrap();

        assert_eq!(lc.id(), Some(ConversationId::new("c1")));
        assert_eq!(lc.title(), "Old chat");
        assert_eq!(service.bound_id(), Some(ConversationId::new("c1")));
        assert_eq!(*lc.scope().borrow(), Some(ConversationId::new("c1")));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_first_send_transitions_and_auto_names() {
        let service = Arc::new(FakeChatService::new());
        service.push_rename(Ok("\"Greeting Chat\"".to_string()));
        let lc = lifecycle(&service);

        let title = lc
            .on_first_send_completed(ConversationId::new("c1"))
            .await
            .unwrap();

        assert_eq!(title.as_deref(), Some("Greeting Chat"));
        assert_eq!(lc.title(), "Greeting Chat");
        assert_eq!(lc.phase(), ConversationPhase::Identified);
        assert_eq!(
            service.calls(),
            vec![Call::Rename {
                id: ConversationId::new("c1"),
                title: String::new(),
                auto_generate: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_first_send_ignored_when_already_identified() {
        let service = Arc::new(FakeChatService::new());
        let lc = lifecycle(&service);
        lc.bind_existing(ConversationId::new("c1"), None).unwrap();

        let title = lc
            .on_first_send_completed(ConversationId::new("c2"))
            .await
            .unwrap();

        assert_eq!(title, None);
        assert_eq!(lc.id(), Some(ConversationId::new("c1")));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_auto_name_failure_keeps_identity_and_default_title() {
        let service = Arc::new(FakeChatService::new());
        service.push_rename(Err(ChatServiceError::Transport("timeout".to_string())));
        let lc = lifecycle(&service);

        let err = lc
            .on_first_send_completed(ConversationId::new("c1"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Service {
                operation: Operation::GenerateTitle,
                ..
            }
        ));
        assert_eq!(lc.id(), Some(ConversationId::new("c1")));
        assert_eq!(lc.phase(), ConversationPhase::Identified);
        assert_eq!(lc.title(), DEFAULT_CONVERSATION_TITLE);
    }

    #[tokio::test]
    async fn test_rename_during_auto_naming_wins() {
        let service = Arc::new(FakeChatService::new());
        service.push_rename(Ok("Auto".to_string()));
        service.push_rename(Ok("Mine".to_string()));
        let gate = service.gate_next_rename();
        let lc = lifecycle(&service);

        let user_rename = async {
            for _ in 0..100 {
                if lc.phase() == ConversationPhase::AutoNaming {
                    break;
                }
                tokio::task::yield_now().await;
            }
            assert_eq!(lc.phase(), ConversationPhase::AutoNaming);
            assert_eq!(lc.id(), Some(ConversationId::new("c1")));

            let outcome = lc.rename("Mine").await.unwrap();
            assert_eq!(
                outcome,
                RenameOutcome::Renamed {
                    title: "Mine".to_string()
                }
            );
            let _ = gate.send(());
        };
        let (named, ()) = tokio::join!(
            lc.on_first_send_completed(ConversationId::new("c1")),
            user_rename
        );

        assert_eq!(named.unwrap(), None);
        assert_eq!(lc.title(), "Mine");
        assert_eq!(lc.phase(), ConversationPhase::Identified);
        assert_eq!(service.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_rename_blank_makes_no_call() {
        let service = Arc::new(FakeChatService::new());
        let lc = lifecycle(&service);
        lc.bind_existing(ConversationId::new("c1"), Some("Keep".to_string()))
            .unwrap();

        assert_eq!(lc.rename("   ").await.unwrap(), RenameOutcome::Rejected);
        assert_eq!(lc.title(), "Keep");
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rename_success_updates_title() {
        let service = Arc::new(FakeChatService::new());
        service.push_rename(Ok("Trip Planning".to_string()));
        let lc = lifecycle(&service);
        lc.bind_existing(ConversationId::new("c1"), None).unwrap();

        let outcome = lc.rename("  Trip Planning ").await.unwrap();

        assert_eq!(
            outcome,
            RenameOutcome::Renamed {
                title: "Trip Planning".to_string()
            }
        );
        assert_eq!(lc.title(), "Trip Planning");
        assert_eq!(
            service.calls(),
            vec![Call::Rename {
                id: ConversationId::new("c1"),
                title: "Trip Planning".to_string(),
                auto_generate: false,
            }]
        );
    }

    #[tokio::test]
    async fn test_rename_failure_leaves_title() {
        let service = Arc::new(FakeChatService::new());
        service.push_rename(Err(ChatServiceError::Status {
            status: 500,
            message: "db down".to_string(),
        }));
        let lc = lifecycle(&service);
        lc.bind_existing(ConversationId::new("c1"), Some("Before".to_string()))
            .unwrap();

        let err = lc.rename("After").await.unwrap_err();

        assert!(err.to_string().contains("db down"));
        assert_eq!(lc.title(), "Before");
    }

    #[tokio::test]
    async fn test_rename_and_delete_require_identity() {
        let service = Arc::new(FakeChatService::new());
        let lc = lifecycle(&service);

        assert!(matches!(
            lc.rename("Title").await,
            Err(SessionError::MissingConversation { .. })
        ));
        assert!(matches!(
            lc.delete().await,
            Err(SessionError::MissingConversation { .. })
        ));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_success_is_terminal() {
        let service = Arc::new(FakeChatService::new());
        let lc = lifecycle(&service);
        lc.bind_existing(ConversationId::new("c1"), None).unwrap();

        let outcome = lc.delete().await.unwrap();

        assert_eq!(
            outcome,
            DeleteOutcome::Deleted {
                id: ConversationId::new("c1")
            }
        );
        assert!(lc.is_deleted());
        assert!(matches!(
            lc.rename("again").await,
            Err(SessionError::ConversationDeleted { .. })
        ));
        assert!(matches!(
            lc.bind_existing(ConversationId::new("c2"), None),
            Err(SessionError::ConversationDeleted { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_conversation() {
        let service = Arc::new(FakeChatService::new());
        service.push_delete(Err(ChatServiceError::Transport("offline".to_string())));
        let lc = lifecycle(&service);
        lc.bind_existing(ConversationId::new("c1"), None).unwrap();

        let err = lc.delete().await.unwrap_err();

        assert!(err.to_string().contains("offline"));
        assert_eq!(lc.phase(), ConversationPhase::Identified);
        assert_eq!(lc.id(), Some(ConversationId::new("c1")));
    }
}
