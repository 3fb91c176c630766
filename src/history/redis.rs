use async_trait::async_trait;
use crate::models::chat::ChatMessage;
use crate::history::{ HistoryStore, StoreError };
use log::{ debug, error };
use redis::{ Client, AsyncCommands };

/// Keeps each conversation as one JSON array under `<prefix><key>`.
///
/// Every operation is a single Redis command, and Redis executes commands one at a
/// time, so operations on the same key are linearizable.
pub struct RedisHistoryStore {
    client: Client,
    key_prefix: String,
}

impl RedisHistoryStore {
    pub fn new(host: &str, key_prefix: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::open(host).map_err(|e| StoreError::Connection(e.to_string()))?,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection().await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn load(&self, key: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let mut conn = self.get_connection().await?;
        let storage_key = self.storage_key(key);
        let raw: Option<String> = conn
            .get(&storage_key).await
            .map_err(|e| StoreError::Command(e.to_string()))?;

        match raw {
            None => Ok(Vec::new()),
            Some(json) =>
                serde_json::from_str::<Vec<ChatMessage>>(&json).map_err(|e| {
                    error!("Error parsing history entry '{}': {}", storage_key, e);
                    StoreError::Corrupt {
                        key: key.to_string(),
                        reason: e.to_string(),
                    }
                }),
        }
    }

    async fn save(&self, key: &str, messages: &[ChatMessage]) -> Result<(), StoreError> {
        let json = serde_json::to_string(messages)?;
        let mut conn = self.get_connection().await?;
        let storage_key = self.storage_key(key);
        conn
            .set::<_, _, ()>(&storage_key, json).await
            .map_err(|e| StoreError::Command(e.to_string()))?;
        debug!("Saved {} messages to '{}'", messages.len(), storage_key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let storage_key = self.storage_key(key);
        let _: i64 = conn.del(&storage_key).await.map_err(|e| StoreError::Command(e.to_string()))?;
        debug!("Deleted '{}'", storage_key);
        Ok(())
    }
}
