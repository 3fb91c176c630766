use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use crate::history::{ HistoryStore, StoreError };
use crate::models::chat::ChatMessage;

/// Process-local store. A single lock serializes every operation.
#[derive(Default)]
pub struct MemoryHistoryStore {
    conversations: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self, key: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let conversations = self.conversations.lock().await;
        Ok(conversations.get(key).cloned().unwrap_or_default())
    }

    async fn save(&self, key: &str, messages: &[ChatMessage]) -> Result<(), StoreError> {
        let mut conversations = self.conversations.lock().await;
        conversations.insert(key.to_string(), messages.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conversations = self.conversations.lock().await;
        conversations.remove(key);
        Ok(())
    }
}
