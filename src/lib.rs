pub mod cli;
pub mod client;
pub mod config;
pub mod conversation;
pub mod dashboard;
pub mod llm;
pub mod markdown;
pub mod models;
pub mod questionnaire;
pub mod relay;
pub mod server;
pub mod sse;

use cli::Args;
use config::prompt::{ self, PromptConfig };
use llm::{ chat::new_client, LlmConfig, LlmType };
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("(provider default)"));
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("(provider default)"));
    info!("Max Tokens: {}", args.chat_max_tokens);
    match args.history_limit() {
        Some(limit) => info!("History Limit: {} messages", limit),
        None => info!("History Limit: unbounded"),
    }
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("(built-in)"));
    info!("Chat Rate Limit: {}/s", args.chat_rate_limit);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("Backend URL: {}", args.backend_url);
    info!("-------------------------");

    let llm_config = LlmConfig {
        llm_type: args.chat_llm_type.parse::<LlmType>()?,
        api_key: args.resolved_api_key(),
        model: args.chat_model.clone(),
        base_url: args.chat_base_url.clone(),
    };
    let client = new_client(&llm_config)?;

    let prompts = match &args.prompts_path {
        Some(path) => prompt::load_prompts(path)?,
        None => Arc::new(PromptConfig::default()),
    };

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, client, prompts, args);
    server.run().await?;

    Ok(())
}
