use crate::config::prompt::{ reload_prompts_if_changed, PromptConfig };
use crate::llm::chat::ChatClient;
use crate::models::chat::RelayRequest;
use crate::relay::{ self, RelayError, RelaySettings };
use std::convert::Infallible;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::{ Mutex, RwLock };
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ State, rejection::JsonRejection },
    response::{ IntoResponse, Response, sse::{ Event, Sse } },
    http::StatusCode,
};
use futures::StreamExt;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn };

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
    details: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error("Invalid request body: {0}")]
    BadBody(String),
    #[error("Too many requests")]
    RateLimited,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Relay(_) | ApiError::BadBody(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    client: Arc<dyn ChatClient>,
    prompts: Arc<RwLock<Arc<PromptConfig>>>,
    prompts_path: Option<String>,
    reload_lock: Arc<Mutex<()>>,
    max_tokens: u32,
    max_history: Option<usize>,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl AppState {
    pub fn new(
        client: Arc<dyn ChatClient>,
        prompts: Arc<PromptConfig>,
        prompts_path: Option<String>,
        max_tokens: u32,
        max_history: Option<usize>,
        rate_per_second: u32
    ) -> Self {
        let rate = NonZeroU32::new(rate_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            client,
            prompts: Arc::new(RwLock::new(prompts)),
            prompts_path,
            reload_lock: Arc::new(Mutex::new(())),
            max_tokens,
            max_history,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate))),
        }
    }

    async fn relay_settings(&self) -> RelaySettings {
        let prompts = self.prompts.read().await.clone();
        RelaySettings {
            system: prompts.system_prompt.clone(),
            max_tokens: prompts.max_tokens.unwrap_or(self.max_tokens),
            max_history: self.max_history,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/health", get(health_handler))
        .route("/api/reload-prompts", get(reload_prompts_handler))
        .layer(cors)
        .with_state(state)
}

async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Json<RelayRequest>, JsonRejection>
) -> Result<Response, ApiError> {
    if state.limiter.check().is_err() {
        warn!("Chat request rejected by rate limiter");
        return Err(ApiError::RateLimited);
    }
    let Json(request) = body.map_err(|e| ApiError::BadBody(e.body_text()))?;

    let settings = state.relay_settings().await;
    let events = relay::relay(state.client.clone(), settings, request)?;
    let frames = events.map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json())));

    // Sse sets `Cache-Control: no-cache` itself.
    Ok(Sse::new(frames).into_response())
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "service": "Fast Aid API" }))
}

async fn reload_prompts_handler(State(state): State<AppState>) -> impl IntoResponse {
    let _guard = match state.reload_lock.try_lock() {
        Ok(g) => g,
        Err(_) =>
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReloadResponse {
                    success: false,
                    message: "Reload already in progress".into(),
                    details: None,
                }),
            ).into_response(),
    };

    let Some(path) = state.prompts_path.as_deref() else {
        return (
            StatusCode::OK,
            Json(ReloadResponse {
                success: true,
                message: "Reload complete".into(),
                details: Some(vec!["Built-in prompt in use".into()]),
            }),
        ).into_response();
    };

    let current = state.prompts.read().await.clone();
    let (ok, detail) = match reload_prompts_if_changed(path, &current) {
        Ok(Some(fresh)) => {
            *state.prompts.write().await = fresh;
            info!("System prompt reloaded from {}", path);
            (true, "Local reloaded".to_string())
        }
        Ok(None) => (true, "Local unchanged".to_string()),
        Err(e) => {
            warn!("Prompt reload from {} failed: {}", path, e);
            (false, format!("Local error: {}", e))
        }
    };

    let code = if ok { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    (
        code,
        Json(ReloadResponse {
            success: ok,
            message: if ok { "Reload complete".into() } else { "Reload errors".into() },
            details: Some(vec![detail]),
        }),
    ).into_response()
}
