use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::info;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful voice assistant. Keep your answers concise and conversational, since they will be read aloud.";
pub const DEFAULT_FALLBACK_RESPONSE: &str = "Sorry, I couldn't generate a response.";
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

#[derive(Debug)]
pub enum PromptError {
    InvalidWindow(usize),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::InvalidWindow(n) =>
                write!(f, "history_window must be at least 1, got {}", n),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

/// What the agent tells the model about itself, and how much history it sends along.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PromptConfig {
    pub system_prompt: String,
    /// Sent to the user when the model answers with nothing.
    pub fallback_response: String,
    pub history_window: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            fallback_response: DEFAULT_FALLBACK_RESPONSE.to_string(),
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if self.history_window == 0 {
            return Err(PromptError::InvalidWindow(self.history_window));
        }
        Ok(())
    }
}

pub fn parse_prompts(text: &str) -> Result<PromptConfig, PromptError> {
    let config: PromptConfig = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let config = parse_prompts(&file_content)?;
    info!("Loaded prompt configuration from {}", path.as_ref().display());
    Ok(Arc::new(config))
}

/// Built-in defaults when no path is configured.
pub fn load_prompts_or_default(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    match path.filter(|p| !p.trim().is_empty()) {
        Some(p) => load_prompts(p),
        None => {
            info!("No prompts file configured, using built-in system prompt");
            Ok(Arc::new(PromptConfig::default()))
        }
    }
}
