use crate::history::{ HistoryStore, StoreError };
use crate::models::chat::{ ChatMessage, Role };
use log::debug;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid message: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owner of one conversation's message list for the duration of a request.
///
/// The list is loaded from the store at most once per session; every mutation is
/// written back through the store before the call returns.
pub struct ConversationSession {
    key: String,
    store: Arc<dyn HistoryStore>,
    messages: Option<Vec<ChatMessage>>,
}

impl ConversationSession {
    pub fn new(key: impl Into<String>, store: Arc<dyn HistoryStore>) -> Self {
        Self {
            key: key.into(),
            store,
            messages: None,
        }
    }

    /// Builds a session and hydrates it from the store right away.
    pub async fn open(
        key: impl Into<String>,
        store: Arc<dyn HistoryStore>
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(key, store);
        session.hydrate().await?;
        Ok(session)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_hydrated(&self) -> bool {
        self.messages.is_some()
    }

    async fn hydrate(&mut self) -> Result<&mut Vec<ChatMessage>, SessionError> {
        if self.messages.is_none() {
            let loaded = self.store.load(&self.key).await?;
            debug!("Hydrated conversation '{}' with {} messages", self.key, loaded.len());
            self.messages = Some(loaded);
        }
        Ok(self.messages.get_or_insert_with(Vec::new))
    }

    pub async fn append(&mut self, mut message: ChatMessage) -> Result<(), SessionError> {
        validate(&message)?;

        let key = self.key.clone();
        let store = Arc::clone(&self.store);
        let cached = self.hydrate().await?;

        if let Some(last) = cached.last() {
            if message.timestamp < last.timestamp {
                message.timestamp = last.timestamp;
            }
        }

        let mut updated = cached.clone();
        updated.push(message);
        store.save(&key, &updated).await?;
        *cached = updated;
        Ok(())
    }

    pub async fn history(&mut self) -> Result<&[ChatMessage], SessionError> {
        Ok(self.hydrate().await?.as_slice())
    }

    pub async fn clear(&mut self) -> Result<(), SessionError> {
        self.store.delete(&self.key).await?;
        self.messages = Some(Vec::new());
        debug!("Cleared conversation '{}'", self.key);
        Ok(())
    }
}

fn validate(message: &ChatMessage) -> Result<(), SessionError> {
    match message.role {
        Role::User | Role::Assistant if message.content.trim().is_empty() => {
            Err(SessionError::Validation(format!("{} message content must not be empty", message.role)))
        }
        _ => Ok(()),
    }
}
