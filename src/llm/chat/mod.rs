pub mod ollama;
pub mod openai;
pub mod workers_ai;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use super::{ LlmConfig, LlmError, LlmType, PromptMessage };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use self::workers_ai::WorkersAIChatClient;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends the full prompt (system instruction plus context window) and returns the reply.
    /// A provider that answers without text yields an empty `response`.
    async fn complete(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::WorkersAI => {
            let specific_client = WorkersAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}
