use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::history::{ initialize_history_store, HistoryStore, StoreError };
use crate::llm::chat::{ new_client as new_chat_client, ChatClient };
use crate::llm::transcribe::{
    new_client as new_transcription_client,
    TranscriptionClient,
    UnavailableTranscriber,
};
use crate::llm::{ LlmConfig, LlmError, LlmType, PromptMessage };
use crate::models::chat::{ ChatMessage, Role };
use crate::session::{ ConversationSession, SessionError };

use log::{ debug, error, info, warn };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    Validation(String),
    #[error("history store error: {0}")]
    Store(#[from] StoreError),
    #[error("chat completion failed: {0}")]
    Completion(LlmError),
    #[error("transcription failed: {0}")]
    Transcription(LlmError),
}

impl From<SessionError> for AgentError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Validation(msg) => AgentError::Validation(msg),
            SessionError::Store(e) => AgentError::Store(e),
        }
    }
}

/// The system instruction followed by the last `window` messages of `history`, oldest first.
pub fn build_prompt(system_prompt: &str, history: &[ChatMessage], window: usize) -> Vec<PromptMessage> {
    let start = history.len().saturating_sub(window);
    let mut prompt = Vec::with_capacity(1 + history.len() - start);
    prompt.push(PromptMessage::new(Role::System, system_prompt));
    prompt.extend(
        history[start..].iter().map(|msg| PromptMessage::new(msg.role, msg.content.clone()))
    );
    prompt
}

#[derive(Clone)]
pub struct VoiceAgent {
    chat_client: Arc<dyn ChatClient>,
    transcription_client: Arc<dyn TranscriptionClient>,
    history_store: Arc<dyn HistoryStore>,
    prompt_config: Arc<PromptConfig>,
}

impl VoiceAgent {
    fn initialize_llm_clients(
        args: &Args
    ) -> Result<(Arc<dyn ChatClient>, Arc<dyn TranscriptionClient>), Box<dyn Error + Send + Sync>> {
        let timeout = Duration::from_secs(args.llm_timeout_secs);
        let chat_llm_type: LlmType = args.chat_llm_type.parse()?;
        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: chat_llm_type,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            model: args.chat_model.clone(),
            account_id: args.workers_ai_account_id.clone(),
            timeout,
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            chat_llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        let transcribe_llm_type: LlmType = match &args.transcribe_llm_type {
            Some(s) if !s.trim().is_empty() => s.parse()?,
            _ => chat_llm_type,
        };
        let transcribe_api_key = args.transcribe_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| chat_config.api_key.clone());
        // A chat model name never fits a speech model, so only the provider falls back.
        let inherits_endpoint = transcribe_llm_type == chat_llm_type;
        let transcribe_config = LlmConfig {
            llm_type: transcribe_llm_type,
            base_url: args.transcribe_base_url
                .clone()
                .or_else(|| inherits_endpoint.then(|| args.chat_base_url.clone()).flatten()),
            api_key: transcribe_api_key,
            model: args.transcribe_model.clone(),
            account_id: args.workers_ai_account_id.clone(),
            timeout,
        };
        let transcription_client: Arc<dyn TranscriptionClient> = match
            new_transcription_client(&transcribe_config)
        {
            Ok(client) => client,
            Err(LlmError::Unsupported(reason)) => {
                warn!(
                    "Transcription disabled: {}. /api/transcribe will fail until TRANSCRIBE_LLM_TYPE is set to a speech-capable provider.",
                    reason
                );
                Arc::new(UnavailableTranscriber::new(reason))
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            "Transcription client configured: Type={}, Model={}",
            transcribe_llm_type,
            transcription_client.get_model()
        );

        Ok((chat_client, transcription_client))
    }

    pub async fn new(args: Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let (chat_client, transcription_client) = Self::initialize_llm_clients(&args)?;
        let history_store = initialize_history_store(&args)?;
        let prompt_config = prompt::load_prompts_or_default(args.prompts_path.as_deref())?;

        Ok(Self::from_parts(chat_client, transcription_client, history_store, prompt_config))
    }

    pub fn from_parts(
        chat_client: Arc<dyn ChatClient>,
        transcription_client: Arc<dyn TranscriptionClient>,
        history_store: Arc<dyn HistoryStore>,
        prompt_config: Arc<PromptConfig>
    ) -> Self {
        Self {
            chat_client,
            transcription_client,
            history_store,
            prompt_config,
        }
    }

    /// Runs one chat turn.
    ///
    /// The user message is persisted before the model is called and is not rolled back
    /// if the call fails, so a failed turn leaves a user message without a reply.
    pub async fn process_message(
        &self,
        conversation_id: &str,
        message: &str
    ) -> Result<String, AgentError> {
        if message.trim().is_empty() {
            return Err(AgentError::Validation("Message must not be empty".into()));
        }

        let mut session = ConversationSession::open(
            conversation_id,
            Arc::clone(&self.history_store)
        ).await?;
        session.append(ChatMessage::user(message)).await?;

        let prompt = build_prompt(
            &self.prompt_config.system_prompt,
            session.history().await?,
            self.prompt_config.history_window
        );
        debug!("Conversation '{}': sending {} prompt messages", conversation_id, prompt.len());

        let completion = self.chat_client.complete(&prompt).await.map_err(|e| {
            error!("LLM interaction error: {}", e);
            AgentError::Completion(e)
        })?;

        let response_content = if completion.response.trim().is_empty() {
            self.prompt_config.fallback_response.clone()
        } else {
            completion.response
        };

        session.append(ChatMessage::assistant(response_content.clone())).await?;
        Ok(response_content)
    }

    /// Speech-to-text passthrough. An empty transcript means no speech was detected.
    pub async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<String, AgentError> {
        if audio.is_empty() {
            return Err(AgentError::Validation("Audio payload is empty".into()));
        }
        let transcription = self.transcription_client
            .transcribe(audio, mime_type).await
            .map_err(|e| {
                error!("Transcription error: {}", e);
                AgentError::Transcription(e)
            })?;
        Ok(transcription.text)
    }

    pub async fn history(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, AgentError> {
        let mut session = ConversationSession::new(conversation_id, Arc::clone(&self.history_store));
        Ok(session.history().await?.to_vec())
    }

    pub async fn clear(&self, conversation_id: &str) -> Result<(), AgentError> {
        let mut session = ConversationSession::new(conversation_id, Arc::clone(&self.history_store));
        session.clear().await?;
        info!("Conversation '{}' cleared", conversation_id);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::history::memory::MemoryHistoryStore;
    use crate::llm::chat::CompletionResponse;
    use crate::llm::transcribe::Transcription;
    use async_trait::async_trait;
    use clap::Parser;
    use std::sync::Mutex;

    /// Replies with canned text and records every prompt it receives.
    #[derive(Default)]
    pub(crate) struct MockChat {
        pub(crate) reply: String,
        pub(crate) fail: bool,
        pub(crate) prompts: Mutex<Vec<Vec<PromptMessage>>>,
    }

    impl MockChat {
        pub(crate) fn replying(reply: &str) -> Self {
            Self { reply: reply.into(), ..Default::default() }
        }
    }

    #[async_trait]
    impl ChatClient for MockChat {
        async fn complete(&self, messages: &[PromptMessage]) -> Result<CompletionResponse, LlmError> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            if self.fail {
                return Err(LlmError::Api { status: 503, body: "overloaded".into() });
            }
            Ok(CompletionResponse { response: self.reply.clone() })
        }

        fn get_model(&self) -> String {
            "mock".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    pub(crate) struct MockTranscriber {
        pub(crate) text: String,
    }

    #[async_trait]
    impl TranscriptionClient for MockTranscriber {
        async fn transcribe(&self, _audio: Vec<u8>, _mime: &str) -> Result<Transcription, LlmError> {
            Ok(Transcription { text: self.text.clone() })
        }

        fn get_model(&self) -> String {
            "mock-whisper".into()
        }
    }

    pub(crate) fn agent_with(chat: Arc<MockChat>, transcript: &str) -> (VoiceAgent, Arc<MemoryHistoryStore>) {
        let store = Arc::new(MemoryHistoryStore::new());
        let agent = VoiceAgent::from_parts(
            chat,
            Arc::new(MockTranscriber { text: transcript.into() }),
            store.clone(),
            Arc::new(PromptConfig::default())
        );
        (agent, store)
    }

    fn msg(role: Role, content: &str) -> ChatMessage {
        ChatMessage { role, content: content.into(), timestamp: 0 }
    }

    #[test]
    fn prompt_is_bounded_to_recent_window() {
        let history: Vec<ChatMessage> = (0..25)
            .map(|i| msg(if i % 2 == 0 { Role::User } else { Role::Assistant }, &format!("m{}", i)))
            .collect();
        let prompt = build_prompt("sys", &history, 10);

        assert_eq!(prompt.len(), 11);
        assert_eq!(prompt[0], PromptMessage::new(Role::System, "sys"));
        let contents: Vec<&str> = prompt[1..].iter().map(|m| m.content.as_str()).collect();
        let expected: Vec<String> = (15..25).map(|i| format!("m{}", i)).collect();
        assert_eq!(contents, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn short_history_is_sent_whole() {
        let history = vec![msg(Role::User, "a"), msg(Role::Assistant, "b")];
        let prompt = build_prompt("sys", &history, 10);
        assert_eq!(prompt.len(), 3);
        assert_eq!(prompt[1].content, "a");
        assert_eq!(prompt[2].content, "b");
    }

    #[tokio::test]
    async fn chat_turn_appends_user_and_assistant() {
        let chat = Arc::new(MockChat::replying("I'm well"));
        let (agent, store) = agent_with(chat.clone(), "");
        store.save("x", &[msg(Role::User, "hi")]).await.unwrap();

        let reply = agent.process_message("x", "how are you").await.unwrap();
        assert_eq!(reply, "I'm well");

        let history = agent.history("x").await.unwrap();
        let turns: Vec<(Role, &str)> = history.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(turns, vec![
            (Role::User, "hi"),
            (Role::User, "how are you"),
            (Role::Assistant, "I'm well"),
        ]);

        let prompts = chat.prompts.lock().unwrap();
        assert_eq!(prompts[0].len(), 3);
        assert_eq!(prompts[0][0].role, Role::System);
    }

    #[tokio::test]
    async fn blank_message_is_rejected_before_anything_is_stored() {
        let chat = Arc::new(MockChat::replying("unused"));
        let (agent, store) = agent_with(chat.clone(), "");
        let err = agent.process_message("x", "   ").await.unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
        assert!(store.load("x").await.unwrap().is_empty());
        assert!(chat.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_completion_uses_fallback() {
        let (agent, _) = agent_with(Arc::new(MockChat::replying("  ")), "");
        let reply = agent.process_message("x", "hello").await.unwrap();
        assert_eq!(reply, prompt::DEFAULT_FALLBACK_RESPONSE);
        let history = agent.history("x").await.unwrap();
        assert_eq!(history[1].content, prompt::DEFAULT_FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn failed_completion_keeps_user_message() {
        let chat = Arc::new(MockChat { fail: true, ..Default::default() });
        let (agent, _) = agent_with(chat, "");
        let err = agent.process_message("x", "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::Completion(_)));

        let history = agent.history("x").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn prompt_never_exceeds_window_over_long_conversation() {
        let chat = Arc::new(MockChat::replying("ok"));
        let (agent, _) = agent_with(chat.clone(), "");
        for i in 0..8 {
            agent.process_message("x", &format!("turn {}", i)).await.unwrap();
        }
        assert_eq!(agent.history("x").await.unwrap().len(), 16);

        let prompts = chat.prompts.lock().unwrap();
        assert!(prompts.iter().all(|p| p.len() <= 11));
        let last = prompts.last().unwrap();
        assert_eq!(last.len(), 11);
        assert_eq!(last.last().unwrap().content, "turn 7");
    }

    #[tokio::test]
    async fn empty_transcript_is_not_an_error() {
        let (agent, _) = agent_with(Arc::new(MockChat::default()), "");
        assert_eq!(agent.transcribe(vec![1, 2, 3], "audio/webm").await.unwrap(), "");
    }

    #[tokio::test]
    async fn empty_audio_is_rejected() {
        let (agent, _) = agent_with(Arc::new(MockChat::default()), "hello");
        assert!(matches!(agent.transcribe(Vec::new(), "audio/webm").await, Err(AgentError::Validation(_))));
    }

    #[tokio::test]
    async fn clear_empties_history() {
        let (agent, _) = agent_with(Arc::new(MockChat::replying("ok")), "");
        agent.process_message("x", "one").await.unwrap();
        agent.clear("x").await.unwrap();
        assert!(agent.history("x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ollama_chat_starts_without_transcription() {
        let args = Args::try_parse_from([
            "voice-chat-agent",
            "--chat-llm-type",
            "ollama",
            "--transcribe-llm-type",
            "ollama",
            "--history-type",
            "memory",
        ]).unwrap();
        let agent = VoiceAgent::new(args).await.unwrap();

        let err = agent.transcribe(vec![1, 2, 3], "audio/webm").await.unwrap_err();
        assert!(matches!(err, AgentError::Transcription(LlmError::Unsupported(_))));
        assert!(agent.history("default").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_provider_still_fails_startup() {
        let args = Args::try_parse_from([
            "voice-chat-agent",
            "--chat-llm-type",
            "ollama",
            "--transcribe-llm-type",
            "carrier-pigeon",
            "--history-type",
            "memory",
        ]).unwrap();
        assert!(VoiceAgent::new(args).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_turns_on_one_key_keep_each_reply_after_its_question() {
        let (agent, store) = agent_with(Arc::new(MockChat::replying("ok")), "");
        let a = agent.clone();
        let b = agent.clone();
        let first = tokio::spawn(async move { a.process_message("k", "first").await });
        let second = tokio::spawn(async move { b.process_message("k", "second").await });
        assert_eq!(first.await.unwrap().unwrap(), "ok");
        assert_eq!(second.await.unwrap().unwrap(), "ok");

        // Same-key turns are not mutually excluded, so one turn may be overwritten, but the
        // stored list is always some turn's complete view ending in its question and reply.
        let history = store.load("k").await.unwrap();
        assert!((2..=4).contains(&history.len()), "unexpected history {:?}", history);
        assert_eq!(history[0].role, Role::User);
        let tail = &history[history.len() - 2..];
        assert_eq!(tail[0].role, Role::User);
        assert_eq!((tail[1].role, tail[1].content.as_str()), (Role::Assistant, "ok"));
        for (i, m) in history.iter().enumerate() {
            if m.role == Role::Assistant {
                assert_eq!(history[i - 1].role, Role::User);
            }
        }
        let users: Vec<&str> = history
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect();
        assert!(users.iter().all(|c| *c == "first" || *c == "second"));
    }

    #[tokio::test]
    async fn sequential_turns_on_one_key_alternate() {
        let (agent, store) = agent_with(Arc::new(MockChat::replying("ok")), "");
        agent.process_message("k", "first").await.unwrap();
        agent.process_message("k", "second").await.unwrap();
        let contents: Vec<String> = store
            .load("k").await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["first", "ok", "second", "ok"]);
    }

    #[tokio::test]
    async fn concurrent_turns_on_different_keys_are_independent() {
        let (agent, _) = agent_with(Arc::new(MockChat::replying("ok")), "");
        let a = agent.clone();
        let b = agent.clone();
        let (ra, rb) = futures::join!(a.process_message("a", "first"), b.process_message("b", "second"));
        ra.unwrap();
        rb.unwrap();
        assert_eq!(agent.history("a").await.unwrap()[0].content, "first");
        assert_eq!(agent.history("b").await.unwrap()[0].content, "second");
    }
}
