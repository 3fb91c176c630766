pub mod memory;
pub mod redis;
use async_trait::async_trait;
use log::info;
use std::error::Error;
use crate::cli::Args;
use std::sync::Arc;
use crate::models::chat::ChatMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history store connection failed: {0}")]
    Connection(String),
    #[error("history store command failed: {0}")]
    Command(String),
    #[error("stored history for '{key}' is corrupt: {reason}")]
    Corrupt {
        key: String,
        reason: String,
    },
    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable per-conversation message log.
///
/// Implementations must serialize `load`, `save` and `delete` for the same key so
/// that operations on one conversation are linearizable. Different keys carry no
/// ordering requirement. Writes must be durable before the call returns.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Returns the stored messages in append order, or an empty list if the key was never written.
    async fn load(&self, key: &str) -> Result<Vec<ChatMessage>, StoreError>;

    /// Replaces the stored sequence for `key` wholesale.
    async fn save(&self, key: &str, messages: &[ChatMessage]) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

pub fn create_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "redis" => {
            let store = redis::RedisHistoryStore::new(
                &args.history_host,
                &args.history_redis_prefix
            )?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(memory::MemoryHistoryStore::new())),
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub fn initialize_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    if args.history_type.eq_ignore_ascii_case("memory") {
        info!("Chat history will be kept in process memory (not durable across restarts)");
    } else {
        info!("Chat history will be stored in: {} at {}", args.history_type, args.history_host);
    }
    create_history_store(args)
}
