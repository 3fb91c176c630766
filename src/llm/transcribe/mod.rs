pub mod openai;
pub mod workers_ai;

use async_trait::async_trait;
use std::sync::Arc;
use super::{ LlmConfig, LlmError, LlmType };
use self::openai::OpenAITranscriptionClient;
use self::workers_ai::WorkersAITranscriptionClient;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcription {
    /// Empty when the model heard no speech.
    pub text: String,
}

#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<Transcription, LlmError>;

    fn get_model(&self) -> String;
}

/// Stand-in used when the configured provider cannot transcribe. Every call fails with
/// `LlmError::Unsupported` so the rest of the service can still start.
pub struct UnavailableTranscriber {
    reason: String,
}

impl UnavailableTranscriber {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl TranscriptionClient for UnavailableTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>, _mime_type: &str) -> Result<Transcription, LlmError> {
        Err(LlmError::Unsupported(self.reason.clone()))
    }

    fn get_model(&self) -> String {
        "unavailable".into()
    }
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn TranscriptionClient>, LlmError> {
    let client: Arc<dyn TranscriptionClient> = match config.llm_type {
        LlmType::OpenAI => Arc::new(OpenAITranscriptionClient::from_config(config)?),
        LlmType::WorkersAI => Arc::new(WorkersAITranscriptionClient::from_config(config)?),
        LlmType::Ollama => {
            return Err(LlmError::Unsupported("Ollama does not provide speech-to-text".into()));
        }
    };
    Ok(client)
}
