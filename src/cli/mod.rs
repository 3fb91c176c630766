use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- History Store Args ---
    /// History chat store type (redis, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "memory")]
    pub history_type: String,

    /// History chat store host endpoint (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Prefix for Redis history keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "conversation:")]
    pub history_redis_prefix: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, ollama, workers-ai)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-4o-mini, llama3, @cf/meta/llama-3-8b-instruct)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    // --- Transcription Provider Args (Optional) ---
    /// Type of provider for speech-to-text (openai, workers-ai). Defaults to CHAT_LLM_TYPE if not set.
    #[arg(long, env = "TRANSCRIBE_LLM_TYPE")]
    pub transcribe_llm_type: Option<String>,

    /// Base URL for the speech-to-text provider. Defaults to CHAT_BASE_URL if not set.
    #[arg(long, env = "TRANSCRIBE_BASE_URL")]
    pub transcribe_base_url: Option<String>,

    /// API Key for the speech-to-text provider. Defaults to CHAT_API_KEY if not set.
    #[arg(long, env = "TRANSCRIBE_API_KEY")]
    pub transcribe_api_key: Option<String>,

    /// Model name for speech-to-text (e.g., whisper-1, @cf/openai/whisper)
    #[arg(long, env = "TRANSCRIBE_MODEL")]
    pub transcribe_model: Option<String>,

    /// Cloudflare account id, required by the workers-ai provider.
    #[arg(long, env = "WORKERS_AI_ACCOUNT_ID")]
    pub workers_ai_account_id: Option<String>,

    /// Timeout in seconds for every request to a model provider.
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value = "60")]
    pub llm_timeout_secs: u64,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Path to the prompt configuration file. Built-in prompts are used when unset.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8787")]
    pub server_addr: String,

    /// Largest accepted request body for /api/transcribe, in bytes.
    #[arg(long, env = "MAX_AUDIO_BYTES", default_value = "26214400")]
    pub max_audio_bytes: usize,

    /// Optional path to the TLS certificate file (PEM format) for enabling HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
