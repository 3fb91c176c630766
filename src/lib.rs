pub mod agent;
pub mod models;
pub mod server;
pub mod session;
pub mod config;
pub mod llm;
pub mod cli;
pub mod history;

use agent::VoiceAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("History Store Type: {}", args.history_type);
    info!("History Store Host: {}", args.history_host);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!(
        "Transcription LLM Type: {}",
        args.transcribe_llm_type.as_deref().unwrap_or(&args.chat_llm_type)
    );
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("LLM Timeout: {}s", args.llm_timeout_secs);
    info!("Max Audio Upload: {} bytes", args.max_audio_bytes);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = Arc::new(VoiceAgent::new(args.clone()).await?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
