use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (anthropic, openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "anthropic")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider. Falls back to ANTHROPIC_API_KEY.
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., claude-sonnet-4-5-20250929, gpt-4o, llama3.1)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Upper bound on tokens generated per reply.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "4096")]
    pub chat_max_tokens: u32,

    /// Most recent messages forwarded to the provider. 0 forwards the whole history.
    #[arg(long, env = "MAX_HISTORY_MESSAGES", default_value = "0")]
    pub max_history_messages: usize,

    // --- General App Args ---
    /// Optional path to a JSON file overriding the assistant's system prompt.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Host address and port for the relay server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Chat requests admitted per second across all clients.
    #[arg(long, env = "CHAT_RATE_LIMIT", default_value = "10")]
    pub chat_rate_limit: u32,

    /// Base URL of the conversation/auth backend used by client tooling.
    #[arg(long, env = "BACKEND_URL", default_value = "http://127.0.0.1:8000")]
    pub backend_url: String,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    /// The provider key, falling back to the conventional Anthropic variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.chat_api_key.trim().is_empty() {
            return Some(self.chat_api_key.clone());
        }
        std::env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.trim().is_empty())
    }

    pub fn history_limit(&self) -> Option<usize> {
        if self.max_history_messages == 0 { None } else { Some(self.max_history_messages) }
    }
}
