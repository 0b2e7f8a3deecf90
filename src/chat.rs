//! Chat transcript backed by the generation client.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::generation::{GenerationClient, GenerationError, GenerationKind, GenerationRequest, ToneParams};
use crate::notify::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ChatMessage {
    fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), sender, text: text.into(), timestamp: now_ms() }
    }
}

/// Conversation state for the assistant panel.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
    /// True while an assistant reply is outstanding.
    pub pending: bool,
}

impl ChatState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `text` and append the assistant's reply.
    ///
    /// Blank input is ignored and returns `Ok(None)`. On failure the user
    /// message stays in the transcript and no reply is appended.
    ///
    /// # Errors
    ///
    /// Returns the [`GenerationError`] from submitting or polling.
    pub async fn send(
        &mut self,
        client: &GenerationClient,
        text: &str,
        params: ToneParams,
        cancel: &CancellationToken,
    ) -> Result<Option<ChatMessage>, GenerationError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        self.messages.push(ChatMessage::new(Sender::User, text));
        let request = GenerationRequest::new(text).with_params(params);
        let outcome = {
            let _pending = PendingGuard::set(&mut self.pending);
            client.generate(GenerationKind::General, request, cancel).await
        };

        let reply = ChatMessage::new(Sender::Assistant, outcome?);
        info!(messages = self.messages.len() + 1, "chat reply received");
        self.messages.push(reply.clone());
        Ok(Some(reply))
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Holds `pending` true until dropped, including when `send` is abandoned.
struct PendingGuard<'a>(&'a mut bool);

impl<'a> PendingGuard<'a> {
    fn set(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
