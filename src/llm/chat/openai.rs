use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };

use super::{ ChatClient, CompletionResponse };
use crate::llm::{ build_http_client, check_status, join_url, LlmConfig, LlmError, PromptMessage };

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_OPENAI_CHAT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store: Option<bool>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_OPENAI_CHAT_MODEL.to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let http = build_http_client(Some(&api_key), timeout, true)?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.require_api_key()?;
        let base_url = config.resolve_base_url(DEFAULT_OPENAI_BASE_URL)?;
        Self::new(api_key, config.model.clone(), Some(base_url), config.timeout)
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, LlmError> {
        let url = join_url(&self.base_url, "/v1/chat/completions");

        let req = OpenAIChatRequest {
            model: &self.model,
            messages,
            temperature: 0.7,
            max_completion_tokens: Some(1024),
            store: Some(false),
        };

        debug!("OpenAI chat request: model={}, messages={}", self.model, messages.len());
        let resp = self.http.post(&url).json(&req).send().await?;
        let resp = check_status(resp).await?.json::<OpenAIResponse>().await?;

        let content = resp.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(CompletionResponse { response: content })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
