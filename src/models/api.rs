use serde::{ Serialize, Deserialize };
use crate::models::chat::ChatMessage;

pub const DEFAULT_CONVERSATION_ID: &str = "default";

/// Blank or missing ids fall back to the shared default conversation.
pub fn resolve_conversation_id(id: Option<&str>) -> String {
    match id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => DEFAULT_CONVERSATION_ID.to_string(),
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub conversation_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HistoryResponse {
    pub messages: Vec<ChatMessage>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClearRequest {
    pub conversation_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ClearResponse {
    pub success: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TranscribeResponse {
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
