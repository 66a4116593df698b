//! HttpChatService -- concrete [`ChatService`] implementation over HTTP.
//!
//! Talks to the chat service's JSON endpoints with bearer authentication and
//! republishes its server-sent event feed onto a [`MessageFeed`].
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is only exposed
//! when building request headers.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use parley_core::chat::{ChatService, MessageFeed};
use parley_types::chat::{Attachment, ConversationId, Message};
use parley_types::config::Settings;
use parley_types::error::ChatServiceError;

use super::stream::open_event_stream;
use super::types::{RenameRequest, RenameResponse, SendRequest};

/// Per-request timeout for the JSON endpoints. Sends wait for the full reply.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause before reopening a dropped event stream.
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Map a non-success HTTP status to a [`ChatServiceError`].
pub fn status_error(status: u16, body: String) -> ChatServiceError {
    match status {
        401 | 403 => ChatServiceError::Unauthorized,
        _ => ChatServiceError::Status {
            status,
            message: if body.trim().is_empty() {
                "no response body".to_string()
            } else {
                body.trim().to_string()
            },
        },
    }
}

/// Chat service client.
///
/// Remembers the bound conversation id and attaches it to every send.
pub struct HttpChatService {
    client: reqwest::Client,
    base_url: reqwest::Url,
    api_key: SecretString,
    user_id: String,
    conversation_id: Mutex<Option<ConversationId>>,
    feed: MessageFeed,
}

impl HttpChatService {
    /// Build a client from stored settings.
    ///
    /// Fails with `NotConfigured` when the base URL or API key is missing or
    /// the base URL does not parse.
    pub fn new(settings: &Settings) -> Result<Self, ChatServiceError> {
        if !settings.is_configured() {
            return Err(ChatServiceError::NotConfigured(
                "base URL and API key are required (see `parley config set`)".to_string(),
            ));
        }

        let base_url = reqwest::Url::parse(settings.normalized_base_url()).map_err(|e| {
            ChatServiceError::NotConfigured(format!("invalid base URL '{}': {e}", settings.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ChatServiceError::NotConfigured(format!(
                "base URL '{}' cannot carry a path",
                settings.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ChatServiceError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: SecretString::from(settings.api_key.clone()),
            user_id: settings.user_id.clone(),
            conversation_id: Mutex::new(None),
            feed: MessageFeed::default(),
        })
    }

    /// The feed stream snapshots are published on.
    pub fn feed(&self) -> &MessageFeed {
        &self.feed
    }

    /// Keep the event stream open until `cancel` fires, reconnecting after
    /// drops, and publish every decoded snapshot onto the feed.
    pub fn spawn_event_listener(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let client = self.client.clone();
        let url = self.endpoint(&["events"]);
        let user_id = self.user_id.clone();
        let api_key = self.api_key.clone();
        let feed = self.feed.clone();

        tokio::spawn(async move {
            loop {
                let mut events = open_event_stream(&client, url.clone(), &user_id, &api_key);
                loop {
                    let next = tokio::select! {
                        _ = cancel.cancelled() => return,
                        next = events.next() => next,
                    };
                    match next {
                        Some(Ok(message)) => feed.publish(message),
                        Some(Err(ChatServiceError::Decode(e))) => {
                            tracing::warn!(error = %e, "skipping undecodable stream event");
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "event stream failed");
                        }
                        None => break,
                    }
                }

                tracing::debug!(delay_secs = RECONNECT_DELAY.as_secs(), "reconnecting event stream");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
            }
        })
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL can carry a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn bound_id(&self) -> Option<ConversationId> {
        lock(&self.conversation_id).clone()
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ChatServiceError> {
        let response = request
            .bearer_auth(self.api_key.expose_secret())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| ChatServiceError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "chat service error response");
            return Err(status_error(status.as_u16(), body));
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ChatServiceError> {
        response
            .json()
            .await
            .map_err(|e| ChatServiceError::Decode(format!("failed to parse response: {e}")))
    }
}

impl ChatService for HttpChatService {
    fn set_conversation_id(&self, id: Option<ConversationId>) {
        tracing::debug!(conversation_id = ?id, "binding chat service");
        *lock(&self.conversation_id) = id;
    }

    async fn send_message(
        &self,
        text: &str,
        files: &[Attachment],
    ) -> Result<Message, ChatServiceError> {
        let conversation_id = self.bound_id();
        let body = SendRequest {
            message: text,
            conversation_id: conversation_id.as_ref(),
            user_id: &self.user_id,
            files,
        };

        let response = self
            .execute(self.client.post(self.endpoint(&["chat"])).json(&body))
            .await?;
        Self::decode(response).await
    }

    async fn get_message_history(
        &self,
        id: &ConversationId,
    ) -> Result<Vec<Message>, ChatServiceError> {
        let url = self.endpoint(&["conversations", id.as_str(), "messages"]);
        let response = self.execute(self.client.get(url)).await?;
        Self::decode(response).await
    }

    async fn rename_conversation(
        &self,
        id: &ConversationId,
        new_title: &str,
        auto_generate: bool,
    ) -> Result<String, ChatServiceError> {
        let body = RenameRequest {
            title: new_title,
            auto_generate,
        };
        let url = self.endpoint(&["conversations", id.as_str()]);
        let response = self.execute(self.client.patch(url).json(&body)).await?;
        let renamed: RenameResponse = Self::decode(response).await?;
        Ok(renamed.title)
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<(), ChatServiceError> {
        let url = self.endpoint(&["conversations", id.as_str()]);
        self.execute(self.client.delete(url)).await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.feed.subscribe()
    }
}

impl std::fmt::Debug for HttpChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChatService")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("conversation_id", &self.bound_id())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base_url: &str) -> Settings {
        Settings {
            base_url: base_url.to_string(),
            api_key: "test-key-not-real".to_string(),
            user_id: "u1".to_string(),
        }
    }

    #[test]
    fn test_new_requires_configuration() {
        let err = HttpChatService::new(&Settings::default()).unwrap_err();
        assert!(matches!(err, ChatServiceError::NotConfigured(_)));
    }

    #[test]
    fn test_new_rejects_unparseable_base_url() {
        let err = HttpChatService::new(&settings("not a url")).unwrap_err();
        assert!(matches!(err, ChatServiceError::NotConfigured(_)));
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let service = HttpChatService::new(&settings("http://localhost:8000/")).unwrap();
        assert_eq!(
            service.endpoint(&["conversations", "c1", "messages"]).as_str(),
            "http://localhost:8000/conversations/c1/messages"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_ids() {
        let service = HttpChatService::new(&settings("https://chat.example.com/api")).unwrap();
        assert_eq!(
            service.endpoint(&["conversations", "a/b c"]).as_str(),
            "https://chat.example.com/api/conversations/a%2Fb%20c"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_error(401, String::new()), ChatServiceError::Unauthorized);
        assert_eq!(status_error(403, "nope".to_string()), ChatServiceError::Unauthorized);
        assert_eq!(
            status_error(500, " boom \n".to_string()),
            ChatServiceError::Status {
                status: 500,
                message: "boom".to_string()
            }
        );
        assert_eq!(
            status_error(404, String::new()),
            ChatServiceError::Status {
                status: 404,
                message: "no response body".to_string()
            }
        );
    }

    #[test]
    fn test_binding_is_remembered() {
        let service = HttpChatService::new(&settings("http://localhost:8000")).unwrap();
        assert!(service.bound_id().is_none());

        service.set_conversation_id(Some(ConversationId::new("c9")));
        assert_eq!(service.bound_id(), Some(ConversationId::new("c9")));

        service.set_conversation_id(None);
        assert!(service.bound_id().is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let service = HttpChatService::new(&settings("http://localhost:8000")).unwrap();
        let debug = format!("{service:?}");
        assert!(!debug.contains("test-key-not-real"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_subscribe_receives_feed_messages() {
        let service = HttpChatService::new(&settings("http://localhost:8000")).unwrap();
        let mut rx = service.subscribe();

        service.feed().publish(Message::assistant("H", true));

        assert_eq!(rx.recv().await.unwrap().content, "H");
    }

    #[tokio::test]
    async fn test_event_listener_stops_on_cancel() {
        // Nothing listens on port 9; the listener keeps failing and retrying.
        let service = HttpChatService::new(&settings("http://127.0.0.1:9")).unwrap();
        let cancel = CancellationToken::new();
        let handle = service.spawn_event_listener(cancel.clone());

        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("listener did not stop")
            .unwrap();
    }
}
