use crate::agent::{ AgentError, VoiceAgent };
use crate::models::api::{
    resolve_conversation_id,
    ChatRequest,
    ChatResponse,
    ClearRequest,
    ClearResponse,
    ErrorResponse,
    HistoryQuery,
    HistoryResponse,
    TranscribeResponse,
};
use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::{ rejection::QueryRejection, DefaultBodyLimit, Multipart, Query, State },
    extract::multipart::{ MultipartError, MultipartRejection },
    http::StatusCode,
    response::{ IntoResponse, Response },
    routing::{ get, post },
    Json,
    Router,
};
use serde::de::DeserializeOwned;
use tower_http::cors::{ Any, CorsLayer };
use log::{ debug, error, info };

const AUDIO_FIELD: &str = "audio";
const DEFAULT_AUDIO_MIME: &str = "audio/webm";

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    PayloadTooLarge(String),
    Internal(String),
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Validation(msg) => ApiError::Validation(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::PayloadTooLarge(msg) => {
                debug!("Rejected oversized upload: {}", msg);
                (StatusCode::PAYLOAD_TOO_LARGE, msg)
            }
            ApiError::Internal(msg) => {
                error!("Request failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    agent: Arc<VoiceAgent>,
}

pub fn router(agent: Arc<VoiceAgent>, max_audio_bytes: usize) -> Router {
    let app_state = AppState { agent };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/transcribe",
            post(transcribe_handler).layer(DefaultBodyLimit::max(max_audio_bytes))
        )
        .route("/api/chat", post(chat_handler))
        .route("/api/history", get(history_handler))
        .route("/api/clear", post(clear_handler))
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .layer(cors)
        .with_state(app_state)
}

/// Over-limit bodies surface as multipart read errors; keep their 413 instead of reporting a 400.
fn multipart_error(context: &str, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Audio exceeds the upload size limit".into())
    } else {
        ApiError::Validation(format!("{}: {}", context, err))
    }
}

/// An empty body reads as `T::default()`, so optional-only payloads may be omitted.
fn parse_json_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::Validation(format!("Invalid JSON body: {}", e)))
}

async fn transcribe_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>
) -> Result<Json<TranscribeResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::Validation(e.body_text()))?;

    let mut audio = None;
    while
        let Some(field) = multipart
            .next_field().await
            .map_err(|e| multipart_error("Malformed multipart body", e))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        let mime = field.content_type().unwrap_or(DEFAULT_AUDIO_MIME).to_string();
        let bytes = field
            .bytes().await
            .map_err(|e| multipart_error("Failed to read audio", e))?;
        audio = Some((bytes, mime));
        break;
    }

    let (bytes, mime) = audio.ok_or_else(|| ApiError::Validation("No audio file provided".into()))?;
    info!("Transcribing {} bytes of {}", bytes.len(), mime);
    let text = state.agent.transcribe(bytes.to_vec(), &mime).await?;
    Ok(Json(TranscribeResponse { text }))
}

async fn chat_handler(
    State(state): State<AppState>,
    body: Bytes
) -> Result<Json<ChatResponse>, ApiError> {
    let req: ChatRequest = parse_json_body(&body)?;
    let conversation_id = resolve_conversation_id(req.conversation_id.as_deref());
    let message = req.message.unwrap_or_default();
    info!("Chat message for conversation '{}'", conversation_id);

    let response = state.agent.process_message(&conversation_id, &message).await?;
    Ok(Json(ChatResponse { response, conversation_id }))
}

async fn history_handler(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::Validation(e.body_text()))?;
    let conversation_id = resolve_conversation_id(query.conversation_id.as_deref());
    let messages = state.agent.history(&conversation_id).await?;
    debug!("History for '{}': {} messages", conversation_id, messages.len());
    Ok(Json(HistoryResponse { messages }))
}

async fn clear_handler(
    State(state): State<AppState>,
    body: Bytes
) -> Result<Json<ClearResponse>, ApiError> {
    let req: ClearRequest = parse_json_body(&body)?;
    let conversation_id = resolve_conversation_id(req.conversation_id.as_deref());
    state.agent.clear(&conversation_id).await?;
    Ok(Json(ClearResponse { success: true }))
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tests::{ agent_with, MockChat };
    use crate::config::prompt::PromptConfig;
    use crate::history::HistoryStore;
    use crate::llm::transcribe::UnavailableTranscriber;
    use crate::models::chat::{ ChatMessage, Role };
    use axum::body::{ to_bytes, Body };
    use axum::http::{ header, Method, Request };
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(reply: &str, transcript: &str) -> (Router, Arc<crate::history::memory::MemoryHistoryStore>) {
        let (agent, store) = agent_with(Arc::new(MockChat::replying(reply)), transcript);
        (router(Arc::new(agent), 1024 * 1024), store)
    }

    fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn multipart_request(field: &str, payload: &[u8]) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"clip.webm\"\r\nContent-Type: audio/webm\r\n\r\n",
                field
            ).as_bytes()
        );
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/api/transcribe")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn chat_defaults_conversation_id() {
        let (app, _) = app("hello there", "");
        let (status, body) = send(app, json_request(Method::POST, "/api/chat", r#"{"message":"hi"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "hello there");
        assert_eq!(body["conversationId"], "default");
    }

    #[tokio::test]
    async fn blank_chat_message_is_400() {
        let (app, _) = app("unused", "");
        let (status, body) = send(app, json_request(Method::POST, "/api/chat", r#"{"message":"  "}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let (app, _) = app("unused", "");
        let (status, body) = send(app, json_request(Method::POST, "/api/chat", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid JSON"));
    }

    #[tokio::test]
    async fn completion_failure_is_500() {
        let (agent, _) = agent_with(Arc::new(MockChat { fail: true, ..Default::default() }), "");
        let app = router(Arc::new(agent), 1024);
        let (status, body) = send(app, json_request(Method::POST, "/api/chat", r#"{"message":"hi"}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("chat completion failed"));
    }

    #[tokio::test]
    async fn clear_then_history_is_empty() {
        let (app, store) = app("ok", "");
        let seeded: Vec<ChatMessage> = (0..5)
            .map(|i| ChatMessage { role: Role::User, content: format!("m{}", i), timestamp: i })
            .collect();
        store.save("X", &seeded).await.unwrap();

        let (status, body) = send(
            app.clone(),
            Request::get("/api/history?conversationId=X").body(Body::empty()).unwrap()
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"].as_array().unwrap().len(), 5);
        assert_eq!(body["messages"][0]["role"], "user");

        let (status, body) = send(
            app.clone(),
            json_request(Method::POST, "/api/clear", r#"{"conversationId":"X"}"#)
        ).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, body) = send(
            app,
            Request::get("/api/history?conversationId=X").body(Body::empty()).unwrap()
        ).await;
        assert_eq!(body, serde_json::json!({ "messages": [] }));
    }

    #[tokio::test]
    async fn clear_accepts_empty_body() {
        let (app, store) = app("ok", "");
        store.save("default", &[ChatMessage::user("hi")]).await.unwrap();
        let req = Request::post("/api/clear").body(Body::empty()).unwrap();
        let (status, _) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(store.load("default").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transcribe_returns_text() {
        let (app, _) = app("unused", "turn on the lights");
        let (status, body) = send(app, multipart_request("audio", b"\x1a\x45\xdf\xa3fake")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "turn on the lights");
    }

    #[tokio::test]
    async fn empty_transcript_is_200() {
        let (app, _) = app("unused", "");
        let (status, body) = send(app, multipart_request("audio", b"silence")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["text"], "");
    }

    #[tokio::test]
    async fn missing_audio_field_is_400() {
        let (app, _) = app("unused", "text");
        let (status, body) = send(app, multipart_request("video", b"data")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No audio file provided");
    }

    #[tokio::test]
    async fn oversized_audio_is_413() {
        let (agent, _) = agent_with(Arc::new(MockChat::replying("unused")), "never");
        let app = router(Arc::new(agent), 64);
        let (status, body) = send(app, multipart_request("audio", &[7u8; 1024])).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "Audio exceeds the upload size limit");
    }

    #[tokio::test]
    async fn transcribe_without_speech_provider_is_500() {
        let agent = VoiceAgent::from_parts(
            Arc::new(MockChat::replying("unused")),
            Arc::new(UnavailableTranscriber::new("Ollama does not provide speech-to-text")),
            Arc::new(crate::history::memory::MemoryHistoryStore::new()),
            Arc::new(PromptConfig::default())
        );
        let app = router(Arc::new(agent), 1024 * 1024);
        let (status, body) = send(app, multipart_request("audio", b"clip")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("speech-to-text"));
    }

    #[tokio::test]
    async fn unknown_path_is_plain_404() {
        let (app, _) = app("ok", "");
        let resp = app.oneshot(Request::get("/nope").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Not Found");
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        let (app, _) = app("ok", "");
        let resp = app.oneshot(Request::get("/api/chat").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn responses_allow_any_origin() {
        let (app, _) = app("ok", "");
        let req = Request::get("/api/history")
            .header(header::ORIGIN, "http://example.com")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    }
}
