use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::chat::{ChatMessage, ChatRequest, ChatResponsePayload};
use crate::services::api::{ApiError, DashboardApi};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("still waiting for the previous reply")]
    Busy,
    #[error("session was cleared while the reply was pending")]
    SessionCleared,
}

#[derive(Default)]
struct ChatLog {
    messages: Vec<ChatMessage>,
    /// Bumped on every clear; replies for an older epoch are dropped.
    epoch: u64,
    awaiting: bool,
}

/// Client-owned, append-only conversation for one session id.
pub struct ChatSession {
    session_id: String,
    log: Mutex<ChatLog>,
}

/// A sent prompt whose reply has not been recorded yet. Dropping it
/// without completing records a failed assistant turn and releases the
/// busy guard.
pub struct PendingTurn<'a> {
    session: &'a ChatSession,
    epoch: u64,
    request: ChatRequest,
    completed: bool,
}

const CANCELLED: &str = "request cancelled before a reply arrived";

impl ChatSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            log: Mutex::new(ChatLog::default()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.log.lock().messages.clone()
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.log.lock().awaiting
    }

    /// Appends the user turn immediately, then records exactly one
    /// assistant turn: an answer, an in-band rejection, or a failure.
    pub async fn send(&self, api: &dyn DashboardApi, text: &str) -> Result<ChatMessage, ChatError> {
        let pending = self.begin(text)?;
        let outcome = api.send_chat(&pending.request).await;
        pending.complete(outcome)
    }

    pub fn begin(&self, text: &str) -> Result<PendingTurn<'_>, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let mut log = self.log.lock();
        if log.awaiting {
            return Err(ChatError::Busy);
        }
        log.messages.push(ChatMessage::prompt(text));
        log.awaiting = true;

        Ok(PendingTurn {
            session: self,
            epoch: log.epoch,
            request: ChatRequest {
                user_message: text.to_string(),
                session_id: self.session_id.clone(),
            },
            completed: false,
        })
    }

    /// Clears the server-side session first, then the local log. The local
    /// log is emptied even when the remote clear fails.
    pub async fn clear_history(&self, api: &dyn DashboardApi) -> bool {
        let remote_cleared = match api.clear_chat(&self.session_id).await {
            Ok(()) => true,
            Err(err) => {
                warn!(session_id = %self.session_id, error = %err, "remote chat clear failed, clearing locally");
                false
            }
        };

        let mut log = self.log.lock();
        let dropped = log.messages.len();
        log.messages.clear();
        log.epoch += 1;
        log.awaiting = false;
        info!(session_id = %self.session_id, dropped, "chat history cleared");

        remote_cleared
    }
}

impl PendingTurn<'_> {
    pub fn request(&self) -> &ChatRequest {
        &self.request
    }

    pub fn complete(
        mut self,
        outcome: Result<ChatResponsePayload, ApiError>,
    ) -> Result<ChatMessage, ChatError> {
        self.completed = true;
        let message = match outcome {
            Ok(payload) => ChatMessage::reply(payload),
            Err(err) => {
                warn!(session_id = %self.request.session_id, error = %err, "chat request failed");
                ChatMessage::failed(err.to_string())
            }
        };

        let mut log = self.session.log.lock();
        if log.epoch != self.epoch {
            return Err(ChatError::SessionCleared);
        }
        log.messages.push(message.clone());
        Ok(message)
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        let mut log = self.session.log.lock();
        if log.epoch != self.epoch {
            return;
        }
        log.awaiting = false;
        if !self.completed {
            warn!(session_id = %self.request.session_id, "chat request dropped before completion");
            log.messages.push(ChatMessage::failed(CANCELLED));
        }
    }
}
