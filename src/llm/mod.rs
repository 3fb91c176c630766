pub mod chat;
pub mod transcribe;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use std::time::Duration;
use reqwest::header::{ HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE };
use thiserror::Error;
use crate::models::chat::Role;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const WORKERS_AI_BASE_URL: &str = "https://api.cloudflare.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmType {
    OpenAI,
    Ollama,
    WorkersAI,
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmType::OpenAI => "openai",
            LlmType::Ollama => "ollama",
            LlmType::WorkersAI => "workers-ai",
        };
        f.write_str(name)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LlmType::OpenAI),
            "ollama" => Ok(LlmType::Ollama),
            "workers-ai" | "workersai" | "cloudflare" => Ok(LlmType::WorkersAI),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned {status}: {body}")]
    Api {
        status: u16,
        body: String,
    },
    #[error("missing configuration: {0}")]
    MissingConfig(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
    #[error("invalid base url '{url}': {reason}")]
    InvalidUrl {
        url: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// Cloudflare account, only read by the Workers AI adapters.
    pub account_id: Option<String>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::OpenAI,
            api_key: None,
            model: None,
            base_url: None,
            account_id: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl LlmConfig {
    pub(crate) fn require_api_key(&self) -> Result<String, LlmError> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingConfig(format!("{} API key is required", self.llm_type)))
    }

    /// Configured base URL, or `default` when unset. Only absolute http(s) URLs are accepted.
    pub(crate) fn resolve_base_url(&self, default: &str) -> Result<String, LlmError> {
        let raw = self.base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(default);
        let parsed = url::Url::parse(raw).map_err(|e| LlmError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(LlmError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        Ok(raw.trim_end_matches('/').to_string())
    }

    pub(crate) fn require_account_id(&self) -> Result<String, LlmError> {
        self.account_id
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingConfig("Workers AI account id is required".into()))
    }
}

/// A single role-tagged entry of a model prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

pub(crate) fn build_http_client(
    bearer: Option<&str>,
    timeout: Duration,
    json: bool
) -> Result<reqwest::Client, LlmError> {
    let mut headers = HeaderMap::new();
    if json {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    if let Some(key) = bearer {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e|
                LlmError::InvalidHeader(format!("Invalid API key format: {}", e))
            )?
        );
    }

    Ok(reqwest::Client::builder().default_headers(headers).timeout(timeout).build()?)
}

/// Turns a non-2xx response into `LlmError::Api`, keeping the body for the log.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(LlmError::Api { status: status.as_u16(), body })
}

pub(crate) fn join_url(base: &str, route: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), route)
}
