use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };

use super::{ ChatClient, CompletionResponse };
use crate::llm::{
    build_http_client,
    check_status,
    join_url,
    LlmConfig,
    LlmError,
    PromptMessage,
    WORKERS_AI_BASE_URL,
};

const DEFAULT_WORKERS_AI_CHAT_MODEL: &str = "@cf/meta/llama-3-8b-instruct";

/// Cloudflare Workers AI text generation over the REST `ai/run` endpoint.
pub struct WorkersAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    account_id: String,
}

#[derive(Serialize)]
struct RunRequest<'a> {
    messages: &'a [PromptMessage],
}

#[derive(Deserialize)]
pub(crate) struct RunEnvelope<T> {
    pub(crate) result: Option<T>,
    #[serde(default)]
    pub(crate) success: Option<bool>,
    #[serde(default)]
    pub(crate) errors: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct TextGenerationResult {
    response: Option<String>,
}

/// `{base}/client/v4/accounts/{account}/ai/run/{model}`
pub(crate) fn run_url(base_url: &str, account_id: &str, model: &str) -> String {
    join_url(base_url, &format!("/client/v4/accounts/{}/ai/run/{}", account_id, model))
}

pub(crate) fn envelope_failure<T>(envelope: &RunEnvelope<T>) -> Option<LlmError> {
    if envelope.success == Some(false) {
        return Some(LlmError::Api {
            status: 200,
            body: serde_json::Value::Array(envelope.errors.clone()).to_string(),
        });
    }
    None
}

impl WorkersAIChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.require_api_key()?;
        let account_id = config.require_account_id()?;

        Ok(Self {
            http: build_http_client(Some(&api_key), config.timeout, true)?,
            model: config.model.clone().unwrap_or_else(|| DEFAULT_WORKERS_AI_CHAT_MODEL.to_string()),
            base_url: config.resolve_base_url(WORKERS_AI_BASE_URL)?,
            account_id,
        })
    }
}

#[async_trait]
impl ChatClient for WorkersAIChatClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, LlmError> {
        let url = run_url(&self.base_url, &self.account_id, &self.model);
        debug!("Workers AI chat request: model={}, messages={}", self.model, messages.len());

        let resp = self.http.post(&url).json(&RunRequest { messages }).send().await?;
        let envelope = check_status(resp).await?.json::<RunEnvelope<TextGenerationResult>>().await?;
        if let Some(err) = envelope_failure(&envelope) {
            return Err(err);
        }

        Ok(CompletionResponse {
            response: envelope.result.and_then(|r| r.response).unwrap_or_default(),
        })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
