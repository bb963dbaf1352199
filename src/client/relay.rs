use futures::{ Stream, StreamExt };
use log::debug;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::ClientError;
use crate::models::chat::{ ChatMessage, RelayEvent, RelayRequest };
use crate::sse::{ data_payload, SseLineBuffer };

pub type RelayEventStream = Pin<Box<dyn Stream<Item = RelayEvent> + Send>>;

#[derive(Deserialize)]
struct RelayErrorBody {
    error: String,
}

/// Talks to `POST /api/chat` and decodes its event stream.
#[derive(Clone)]
pub struct RelayClient {
    http: HttpClient,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        url::Url::parse(base_url)?;
        Ok(Self {
            http: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Opens the stream. Events arrive in relay order and the stream ends
    /// after the first terminal event; malformed lines are dropped.
    pub async fn open(
        &self,
        messages: Vec<ChatMessage>,
        conversation_id: Option<String>
    ) -> Result<RelayEventStream, ClientError> {
        let body = RelayRequest { messages, conversation_id };
        let resp = self.http
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<RelayErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            return Err(ClientError::Status { status: status.as_u16(), message });
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut bytes = resp.bytes_stream();
            let mut lines = SseLineBuffer::new();
            while let Some(chunk) = bytes.next().await {
                let buf = match chunk {
                    Ok(buf) => buf,
                    Err(e) => {
                        let _ = tx.send(RelayEvent::error(e.to_string())).await;
                        return;
                    }
                };
                for line in lines.push(&buf) {
                    let Some(event) = decode(&line) else {
                        continue;
                    };
                    let terminal = event.is_terminal();
                    if tx.send(event).await.is_err() || terminal {
                        return;
                    }
                }
            }
            if let Some(event) = lines.finish().as_deref().and_then(decode) {
                let _ = tx.send(event).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

fn decode(line: &str) -> Option<RelayEvent> {
    let payload = data_payload(line)?;
    match serde_json::from_str::<RelayEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("Discarding malformed relay event {:?}: {}", payload, e);
            None
        }
    }
}
