pub mod auth;
pub mod relay;

use async_trait::async_trait;
use chrono::Utc;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, RequestBuilder, Response };
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::models::backend::{
    AuthResponse,
    ConversationRecord,
    Credentials,
    ErrorBody,
    MessageRecord,
    NewConversation,
    NewMessage,
    Prediagnosis,
    PrediagnosisRequest,
};
use crate::models::chat::Role;
use crate::questionnaire::{ Submission, SurveyAnswer, SurveyError, SurveySink };
use auth::AuthContext;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Not signed in")]
    Unauthenticated,
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Validation(String),
    #[error("backend returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("session storage error: {0}")]
    Storage(String),
}

/// Typed access to the conversation, prediagnosis and auth endpoints.
#[derive(Clone)]
pub struct BackendClient {
    http: HttpClient,
    base_url: String,
    auth: AuthContext,
}

impl BackendClient {
    pub fn new(base_url: &str, auth: AuthContext) -> Result<Self, ClientError> {
        url::Url::parse(base_url)?;
        Ok(Self {
            http: HttpClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, ClientError> {
        self.send(self.authed_get("/api/conversations/")?).await
    }

    pub async fn create_conversation(&self, title: &str) -> Result<ConversationRecord, ClientError> {
        let body = NewConversation { title: title.to_string() };
        self.send(self.authed_post("/api/conversations")?.json(&body)).await
    }

    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, ClientError> {
        let path = format!("/api/conversations/{}/messages", conversation_id);
        self.send(self.authed_get(&path)?).await
    }

    pub async fn create_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str
    ) -> Result<MessageRecord, ClientError> {
        let path = format!("/api/conversations/{}/messages", conversation_id);
        let body = NewMessage { role, content: content.to_string() };
        self.send(self.authed_post(&path)?.json(&body)).await
    }

    pub async fn my_prediagnoses(&self) -> Result<Vec<Prediagnosis>, ClientError> {
        self.send(self.authed_get("/api/prediagnosis/my")?).await
    }

    pub async fn create_prediagnosis(
        &self,
        symptoms: Vec<String>,
        conversation_id: Option<String>
    ) -> Result<Prediagnosis, ClientError> {
        let body = PrediagnosisRequest { symptoms, conversation_id };
        self.send(self.authed_post("/api/prediagnosis")?.json(&body)).await
    }

    pub async fn submit_questionnaire(&self, answers: &[SurveyAnswer]) -> Result<(), ClientError> {
        let body = json!({ "answers": answers, "submittedAt": Utc::now().to_rfc3339() });
        let resp = self.authed_post("/api/questionnaire")?.json(&body).send().await?;
        check(resp).await.map(|_| ())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        self.authenticate("/api/auth/signin", email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        self.authenticate("/api/auth/signup", email, password).await
    }

    async fn authenticate(
        &self,
        path: &str,
        email: &str,
        password: &str
    ) -> Result<AuthResponse, ClientError> {
        let body = Credentials { email: email.to_string(), password: password.to_string() };
        let resp = self.http.post(self.url(path)).json(&body).send().await?;
        if !resp.status().is_success() {
            let message = resp
                .json::<ErrorBody>().await
                .ok()
                .and_then(ErrorBody::into_message)
                .unwrap_or_else(|| "Authentication failed".to_string());
            return Err(ClientError::Auth(message));
        }
        let auth: AuthResponse = resp.json().await?;
        self.auth.sign_in(auth.access_token.clone(), auth.user.clone())?;
        info!("Signed in via {}", path);
        Ok(auth)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<String, ClientError> {
        self.auth.token().ok_or(ClientError::Unauthenticated)
    }

    fn authed_get(&self, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.http.get(self.url(path)).bearer_auth(self.bearer()?))
    }

    fn authed_post(&self, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.http.post(self.url(path)).bearer_auth(self.bearer()?))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let resp = check(request.send().await?).await?;
        Ok(resp.json().await?)
    }
}

async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    debug!("Backend error body: {}", text);
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(ClientError::Status { status: status.as_u16(), message })
}

#[async_trait]
impl SurveySink for BackendClient {
    async fn submit_survey(&self, submission: Submission) -> Result<(), SurveyError> {
        let result = match submission {
            Submission::Questionnaire(answers) => self.submit_questionnaire(&answers).await,
            Submission::Symptoms { symptoms, conversation_id } =>
                self.create_prediagnosis(symptoms, conversation_id).await.map(|_| ()),
        };
        result.map_err(|e| SurveyError::Rejected(e.to_string()))
    }
}
