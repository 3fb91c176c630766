use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{ Form, Part };
use reqwest::Client as HttpClient;
use serde::Deserialize;

use super::{ Transcription, TranscriptionClient };
use crate::llm::chat::openai::DEFAULT_OPENAI_BASE_URL;
use crate::llm::{ build_http_client, check_status, join_url, LlmConfig, LlmError };

const DEFAULT_OPENAI_TRANSCRIBE_MODEL: &str = "whisper-1";

pub struct OpenAITranscriptionClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Whisper infers the container from the file name, so it has to match the upload.
fn file_name_for(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "audio/webm" | "video/webm" => "audio.webm",
        "audio/ogg" => "audio.ogg",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "audio.wav",
        "audio/mpeg" | "audio/mp3" => "audio.mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "audio.m4a",
        "audio/flac" => "audio.flac",
        _ => "audio.webm",
    }
}

impl OpenAITranscriptionClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.require_api_key()?;
        Ok(Self {
            http: build_http_client(Some(&api_key), config.timeout, false)?,
            model: config.model.clone().unwrap_or_else(|| DEFAULT_OPENAI_TRANSCRIBE_MODEL.to_string()),
            base_url: config.resolve_base_url(DEFAULT_OPENAI_BASE_URL)?,
        })
    }
}

#[async_trait]
impl TranscriptionClient for OpenAITranscriptionClient {
    async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<Transcription, LlmError> {
        let url = join_url(&self.base_url, "/v1/audio/transcriptions");
        debug!("OpenAI transcription request: model={}, bytes={}", self.model, audio.len());

        let part = Part::bytes(audio).file_name(file_name_for(mime_type)).mime_str(mime_type)?;
        let form = Form::new().part("file", part).text("model", self.model.clone());

        let resp = self.http.post(&url).multipart(form).send().await?;
        let data = check_status(resp).await?.json::<TranscriptionResponse>().await?;
        Ok(Transcription { text: data.text })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
