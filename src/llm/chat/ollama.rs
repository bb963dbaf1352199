use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use super::{ http_stream_generate, ChatClient, ChatRequest, ChatStream, LineOutcome, LlmError };
use crate::llm::LlmConfig;
use log::info;

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    message: Option<StreamMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct StreamMessage {
    #[serde(default)]
    content: String,
}

// Ollama streams newline-delimited JSON; the final object carries `done: true`
// and may still hold a last fragment.
fn parse_ollama_line(line: &str) -> LineOutcome {
    if line.trim().is_empty() {
        return LineOutcome::Skip;
    }
    match serde_json::from_str::<StreamResponse>(line) {
        Ok(resp) => {
            if let Some(err) = resp.error {
                return LineOutcome::Fail(err);
            }
            let content = resp.message.map(|m| m.content).unwrap_or_default();
            if !content.is_empty() {
                LineOutcome::Text(content)
            } else if resp.done {
                LineOutcome::Stop
            } else {
                LineOutcome::Skip
            }
        }
        Err(e) => {
            info!("JSON parse error: {} for line: {}", e, line);
            LineOutcome::Skip
        }
    }
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| "llama3.1".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http: HttpClient::new(),
            base_url: url,
            completion_model: model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.llm_type != crate::llm::LlmType::Ollama {
            return Err(LlmError::Config("Invalid config type for OllamaClient".into()));
        }

        Ok(Self::new(config.base_url.clone(), config.model.clone()))
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream, LlmError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let mut messages = vec![OllamaMessage {
            role: "system".to_string(),
            content: request.system,
        }];
        messages.extend(
            request.messages.into_iter().map(|m| OllamaMessage {
                role: m.role.to_string(),
                content: m.content,
            })
        );
        let req = OllamaChatRequest {
            model: self.completion_model.clone(),
            messages,
            stream: true,
            options: OllamaOptions { num_predict: request.max_tokens },
        };

        Ok(http_stream_generate(self.http.post(url).json(&req), parse_ollama_line))
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}
