//! Append-only message log with clamped offset pagination.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Largest page a single request may fetch.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page size substituted when the requested count is below 1.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// A posted chat message. The id is the message's position in the log,
/// assigned at append time and stable forever; the author is the username
/// captured at append time, not a live reference to a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    #[serde(rename = "message")]
    pub body: String,
    pub author: String,
}

/// Shared handle to the message sequence. Cheap to clone.
///
/// The log only grows; entries are never mutated or removed. Its lock is
/// independent of the session registry's and no code path holds both.
#[derive(Clone, Default)]
pub struct MessageLog {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message, assigning the next sequence id. Empty bodies are
    /// accepted; the log does not interpret content.
    pub async fn append(&self, body: &str, author: &str) -> Message {
        let mut messages = self.messages.lock().await;
        let message = Message {
            id: messages.len() as u64,
            body: body.to_owned(),
            author: author.to_owned(),
        };
        messages.push(message.clone());
        message
    }

    /// Fetch a window of messages in append order.
    ///
    /// Clamps are applied in this exact order:
    /// 1. `count > 100` clamps to 100
    /// 2. `count < 1` substitutes the default of 10
    /// 3. `offset < 0` clamps to 0
    /// 4. `offset` past the end clamps to the end (empty result)
    /// 5. the window is truncated to the messages actually available
    pub async fn page(&self, count: i64, offset: i64) -> Vec<Message> {
        let messages = self.messages.lock().await;
        let len = messages.len() as i64;

        let mut count = count;
        if count > MAX_PAGE_SIZE {
            count = MAX_PAGE_SIZE;
        }
        if count < 1 {
            count = DEFAULT_PAGE_SIZE;
        }

        let mut offset = offset;
        if offset < 0 {
            offset = 0;
        }
        if offset > len {
            offset = len;
        }

        let end = (offset + count).min(len);
        messages[offset as usize..end as usize].to_vec()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }
}
