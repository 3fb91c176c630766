use async_trait::async_trait;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use super::{ Transcription, TranscriptionClient };
use crate::llm::chat::workers_ai::{ envelope_failure, run_url, RunEnvelope };
use crate::llm::{ build_http_client, check_status, LlmConfig, LlmError, WORKERS_AI_BASE_URL };

const DEFAULT_WORKERS_AI_TRANSCRIBE_MODEL: &str = "@cf/openai/whisper";

pub struct WorkersAITranscriptionClient {
    http: HttpClient,
    model: String,
    base_url: String,
    account_id: String,
}

#[derive(Deserialize)]
struct WhisperResult {
    text: Option<String>,
}

impl WorkersAITranscriptionClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.require_api_key()?;
        let account_id = config.require_account_id()?;
        Ok(Self {
            http: build_http_client(Some(&api_key), config.timeout, false)?,
            model: config.model
                .clone()
                .unwrap_or_else(|| DEFAULT_WORKERS_AI_TRANSCRIBE_MODEL.to_string()),
            base_url: config.resolve_base_url(WORKERS_AI_BASE_URL)?,
            account_id,
        })
    }
}

#[async_trait]
impl TranscriptionClient for WorkersAITranscriptionClient {
    async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<Transcription, LlmError> {
        let url = run_url(&self.base_url, &self.account_id, &self.model);
        debug!("Workers AI transcription request: model={}, bytes={}", self.model, audio.len());

        let resp = self.http.post(&url).header(CONTENT_TYPE, mime_type).body(audio).send().await?;
        let envelope = check_status(resp).await?.json::<RunEnvelope<WhisperResult>>().await?;
        if let Some(err) = envelope_failure(&envelope) {
            return Err(err);
        }

        Ok(Transcription {
            text: envelope.result.and_then(|r| r.text).unwrap_or_default(),
        })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
