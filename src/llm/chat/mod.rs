pub mod anthropic;
pub mod openai;
pub mod ollama;

use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::debug;
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmType };
use self::anthropic::AnthropicChatClient;
use self::openai::OpenAIChatClient;
use self::ollama::OllamaClient;
use crate::models::chat::ChatMessage;
use crate::sse::SseLineBuffer;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{0}")]
    Config(String),
    #[error("request to completion provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion provider returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("{0}")]
    Provider(String),
}

/// Incremental text fragments. The stream ends after the provider's
/// end-of-message signal; an `Err` item is always the last one.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Opens one streaming completion request.
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> String;
}

pub const TRUNCATED: &str = "stream ended before end of message";

/// What a provider-specific parser makes of one body line.
#[derive(Debug, PartialEq)]
pub enum LineOutcome {
    Skip,
    Text(String),
    Stop,
    Fail(String),
}

/// Sends `request`, checks the status, and pumps the body through `line_parser`
/// on a spawned task. Mirrors the provider's own order; nothing is buffered
/// beyond the line currently being assembled.
pub fn http_stream_generate(
    request: reqwest::RequestBuilder,
    line_parser: fn(&str) -> LineOutcome
) -> ChatStream {
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let resp = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let _ = tx.send(Err(LlmError::Transport(e))).await;
                return;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let _ = tx.send(Err(LlmError::Status { status: status.as_u16(), body })).await;
            return;
        }

        let mut bytes = resp.bytes_stream();
        let mut lines = SseLineBuffer::new();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    for line in lines.push(&buf) {
                        match line_parser(&line) {
                            LineOutcome::Skip => {}
                            LineOutcome::Text(tok) => {
                                if tx.send(Ok(tok)).await.is_err() {
                                    return;
                                }
                            }
                            LineOutcome::Stop => {
                                return;
                            }
                            LineOutcome::Fail(message) => {
                                let _ = tx.send(Err(LlmError::Provider(message))).await;
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(LlmError::Transport(e))).await;
                    return;
                }
            }
        }

        if let Some(tail) = lines.finish() {
            match line_parser(&tail) {
                LineOutcome::Stop => {
                    return;
                }
                LineOutcome::Fail(message) => {
                    let _ = tx.send(Err(LlmError::Provider(message))).await;
                    return;
                }
                LineOutcome::Text(tok) => {
                    if tx.send(Ok(tok)).await.is_err() {
                        return;
                    }
                }
                LineOutcome::Skip => {}
            }
        }

        // A body that closes without the provider's end marker is a cut-off reply.
        debug!("Completion stream body ended before end of message");
        let _ = tx.send(Err(LlmError::Provider(TRUNCATED.to_string()))).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Anthropic => {
            let specific_client = AnthropicChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Replays a fixed script of fragments and records what it was asked.
    pub struct ScriptedClient {
        script: Vec<Result<String, String>>,
        fail_to_open: Option<String>,
        pub seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedClient {
        pub fn new(fragments: &[&str]) -> Self {
            Self {
                script: fragments.iter().map(|f| Ok(f.to_string())).collect(),
                fail_to_open: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn failing_after(fragments: &[&str], error: &str) -> Self {
            let mut client = Self::new(fragments);
            client.script.push(Err(error.to_string()));
            client
        }

        pub fn unreachable(error: &str) -> Self {
            let mut client = Self::new(&[]);
            client.fail_to_open = Some(error.to_string());
            client
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream, LlmError> {
            self.seen.lock().unwrap().push(request);
            if let Some(err) = &self.fail_to_open {
                return Err(LlmError::Provider(err.clone()));
            }
            let items: Vec<Result<String, LlmError>> = self.script
                .iter()
                .map(|item| item.clone().map_err(LlmError::Provider))
                .collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }

        fn get_model(&self) -> String {
            "scripted".to_string()
        }

        fn get_base_url(&self) -> String {
            "memory://".to_string()
        }
    }
}
