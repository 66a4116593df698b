//! In-memory `ChatService` double for session tests.
//!
//! Responses are scripted per operation (FIFO); when a queue is empty a
//! benign default is returned. Every call is recorded. Sends and renames
//! can be held open with `gate_next_send` and `gate_next_rename` to
//! interleave other work with a pending call.

use std::collections::VecDeque;
use std::sync::Mutex;

use parley_types::chat::{Attachment, ConversationId, Message};
use parley_types::error::ChatServiceError;
use tokio::sync::{broadcast, oneshot};

use super::feed::MessageFeed;
use super::service::ChatService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send { text: String, files: Vec<Attachment> },
    History { id: ConversationId },
    Rename { id: ConversationId, title: String, auto_generate: bool },
    Delete { id: ConversationId },
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    bound: Option<ConversationId>,
    sends: VecDeque<Result<Message, ChatServiceError>>,
    histories: VecDeque<Result<Vec<Message>, ChatServiceError>>,
    renames: VecDeque<Result<String, ChatServiceError>>,
    deletes: VecDeque<Result<(), ChatServiceError>>,
    send_gate: Option<oneshot::Receiver<()>>,
    rename_gate: Option<oneshot::Receiver<()>>,
}

pub struct FakeChatService {
    script: Mutex<Script>,
    feed: MessageFeed,
}

impl FakeChatService {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::default()),
            feed: MessageFeed::new(64),
        }
    }

    pub fn feed(&self) -> &MessageFeed {
        &self.feed
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn send_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Send { .. }))
            .count()
    }

    pub fn bound_id(&self) -> Option<ConversationId> {
        self.script.lock().unwrap().bound.clone()
    }

    pub fn push_send(&self, result: Result<Message, ChatServiceError>) {
        self.script.lock().unwrap().sends.push_back(result);
    }

    pub fn push_history(&self, result: Result<Vec<Message>, ChatServiceError>) {
        self.script.lock().unwrap().histories.push_back(result);
    }

    pub fn push_rename(&self, result: Result<String, ChatServiceError>) {
        self.script.lock().unwrap().renames.push_back(result);
    }

    pub fn push_delete(&self, result: Result<(), ChatServiceError>) {
        self.script.lock().unwrap().deletes.push_back(result);
    }

    /// Hold the next `send_message` until the returned sender fires (or drops).
    pub fn gate_next_send(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().send_gate = Some(rx);
        tx
    }

    /// Hold the next `rename_conversation` until the returned sender fires.
    pub fn gate_next_rename(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().rename_gate = Some(rx);
        tx
    }
}

impl ChatService for FakeChatService {
    fn set_conversation_id(&self, id: Option<ConversationId>) {
        self.script.lock().unwrap().bound = id;
    }

    async fn send_message(
        &self,
        text: &str,
        files: &[Attachment],
    ) -> Result<Message, ChatServiceError> {
        let (result, gate) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(Call::Send {
                text: text.to_string(),
                files: files.to_vec(),
            });
            let result = script
                .sends
                .pop_front()
                .unwrap_or_else(|| Ok(Message::assistant("ok", false)));
            (result, script.send_gate.take())
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }

    async fn get_message_history(
        &self,
        id: &ConversationId,
    ) -> Result<Vec<Message>, ChatServiceError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::History { id: id.clone() });
        script.histories.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn rename_conversation(
        &self,
        id: &ConversationId,
        new_title: &str,
        auto_generate: bool,
    ) -> Result<String, ChatServiceError> {
        let (result, gate) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(Call::Rename {
                id: id.clone(),
                title: new_title.to_string(),
                auto_generate,
            });
            let result = script
                .renames
                .pop_front()
                .unwrap_or_else(|| Ok(new_title.to_string()));
            (result, script.rename_gate.take())
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        result
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<(), ChatServiceError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Delete { id: id.clone() });
        script.deletes.pop_front().unwrap_or(Ok(()))
    }

    fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.feed.subscribe()
    }
}
