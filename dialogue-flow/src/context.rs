use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A single turn in the conversation history.
///
/// Turns are append-only once recorded; the only permitted mutation is
/// extending the text of the most recent assistant turn while a streamed
/// reply is still in flight (see [`Context::extend_last_assistant_message`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Shared state for a dialogue session: a typed key/value store plus the
/// ordered conversation history. Cloning is cheap and clones share state.
///
/// All writes happen from a single logical task per session, so the locking
/// here only guards against accidental cross-session sharing.
#[derive(Clone, Debug, Default)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
    history: Arc<RwLock<Vec<ChatMessage>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Serialize) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.data.insert(key.into(), value);
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize context value, dropping it"),
        }
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_sync(key)
    }

    /// Synchronous variant of [`Context::get`], usable inside edge conditions.
    pub fn get_sync<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub async fn clear(&self) {
        self.data.clear();
        self.history.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub async fn add_user_message(&self, content: impl Into<String>) {
        self.push_message(ChatMessage::user(content));
    }

    pub async fn add_assistant_message(&self, content: impl Into<String>) {
        self.push_message(ChatMessage::assistant(content));
    }

    pub async fn add_system_message(&self, content: impl Into<String>) {
        self.push_message(ChatMessage::system(content));
    }

    /// Append a text delta to the most recent assistant turn.
    ///
    /// If the history is empty or ends with a non-assistant turn, a fresh
    /// assistant turn is opened with the delta as its initial content. This is
    /// the mutation used to build up a streamed reply incrementally.
    pub async fn extend_last_assistant_message(&self, delta: &str) {
        let mut history = self.history.write().unwrap_or_else(|e| e.into_inner());
        match history.last_mut() {
            Some(last) if last.role == MessageRole::Assistant => last.content.push_str(delta),
            _ => history.push(ChatMessage::assistant(delta)),
        }
    }

    pub async fn get_all_messages(&self) -> Vec<ChatMessage> {
        self.history
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn get_last_messages(&self, n: usize) -> Vec<ChatMessage> {
        let history = self.history.read().unwrap_or_else(|e| e.into_inner());
        let start = history.len().saturating_sub(n);
        history[start..].to_vec()
    }

    pub async fn message_count(&self) -> usize {
        self.history.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn push_message(&self, message: ChatMessage) {
        self.history
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
    }
}
