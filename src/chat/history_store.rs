//! Message history store.
//!
//! `GET /history/{roomId}` -> 200 `[MessageEnvelope, ...]` in chronological
//! order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Url;

use crate::chat::directory::endpoint;
use crate::chat::error::ChatError;
use crate::chat::protocol::MessageEnvelope;
use crate::chat::room::RoomId;

/// Source of previously sent messages for a room.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Returns the room's messages, oldest first.
    async fn fetch(&self, room: &RoomId) -> Result<Vec<MessageEnvelope>, ChatError>;
}

#[async_trait]
impl<H: HistoryStore + ?Sized> HistoryStore for Arc<H> {
    async fn fetch(&self, room: &RoomId) -> Result<Vec<MessageEnvelope>, ChatError> {
        (**self).fetch(room).await
    }
}

/// History client speaking the HTTP API.
#[derive(Debug, Clone)]
pub struct HttpHistoryStore {
    client: reqwest::Client,
    base: Url,
}

impl HttpHistoryStore {
    /// Creates a client for the history service at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ChatError> {
        let base = Url::parse(base_url)
            .map_err(|e| ChatError::History(format!("invalid URL {}: {}", base_url, e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn fetch(&self, room: &RoomId) -> Result<Vec<MessageEnvelope>, ChatError> {
        let url = endpoint(&self.base, &["history", room.as_str()]).map_err(ChatError::History)?;
        self.client
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| ChatError::History(e.to_string()))?
            .json()
            .await
            .map_err(|e| ChatError::History(e.to_string()))
    }
}

/// In-process history, for tests and offline use.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    rooms: Mutex<HashMap<String, Vec<MessageEnvelope>>>,
}

impl MemoryHistoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to its room's history.
    pub fn record(&self, envelope: MessageEnvelope) {
        if let Ok(mut rooms) = self.rooms.lock() {
            rooms.entry(envelope.room.clone()).or_default().push(envelope);
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn fetch(&self, room: &RoomId) -> Result<Vec<MessageEnvelope>, ChatError> {
        let rooms = self
            .rooms
            .lock()
            .map_err(|_| ChatError::History("history lock poisoned".to_string()))?;
        Ok(rooms.get(room.as_str()).cloned().unwrap_or_default())
    }
}
