use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use super::{ ChatClient, CompletionResponse };
use crate::llm::{ build_http_client, check_status, join_url, LlmConfig, LlmError, LlmType, PromptMessage };
use log::debug;

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "llama3";

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    pub fn new(
        base_url: Option<String>,
        completion_model: Option<String>,
        timeout: std::time::Duration
    ) -> Result<Self, LlmError> {
        let model = completion_model.unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());
        let url = base_url.unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.into());

        Ok(Self {
            http: build_http_client(None, timeout, true)?,
            base_url: url,
            completion_model: model,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.llm_type != LlmType::Ollama {
            return Err(LlmError::Unsupported("Invalid config type for OllamaClient".into()));
        }

        let base_url = config.resolve_base_url(DEFAULT_OLLAMA_BASE_URL)?;
        Self::new(Some(base_url), config.model.clone(), config.timeout)
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, LlmError> {
        let url = join_url(&self.base_url, "/api/chat");
        let req = ChatRequest {
            model: &self.completion_model,
            messages,
            stream: false,
        };
        debug!("Ollama chat request: model={}, messages={}", self.completion_model, messages.len());
        let resp = self.http.post(&url).json(&req).send().await?;
        let data = check_status(resp).await?.json::<ChatResponse>().await?;
        Ok(CompletionResponse {
            response: data.message.map(|m| m.content).unwrap_or_default(),
        })
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
