//! JSON records exchanged with the conversation/prediagnosis backend.

use chrono::{ DateTime, NaiveDateTime, Utc };
use serde::{ Deserialize, Deserializer, Serialize };

use super::chat::Role;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    #[serde(deserialize_with = "record_id")]
    pub id: String,
    #[serde(deserialize_with = "record_id")]
    pub patient_id: String,
    #[serde(default, deserialize_with = "optional_record_id")]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    #[serde(deserialize_with = "record_id")]
    pub id: String,
    pub content: String,
    pub role: Role,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediagnosis {
    #[serde(deserialize_with = "record_id")]
    pub id: String,
    #[serde(deserialize_with = "record_id")]
    pub conversation_id: String,
    #[serde(deserialize_with = "record_id")]
    pub patient_id: String,
    #[serde(default)]
    pub potential_diseases: String,
    #[serde(default)]
    pub course_of_action: String,
    #[serde(default)]
    pub support_messages: String,
    #[serde(default)]
    pub recommended_practitioners: String,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Prediagnosis {
    /// Markdown summary suitable for the chat renderer.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("## Prediagnosis\n");
        let sections = [
            ("Potential conditions", &self.potential_diseases),
            ("Suggested next steps", &self.course_of_action),
            ("Recommended practitioners", &self.recommended_practitioners),
        ];
        for (title, body) in sections {
            if body.trim().is_empty() {
                continue;
            }
            out.push_str(&format!("### {}\n", title));
            for item in split_list(body) {
                out.push_str(&format!("- {}\n", item));
            }
        }
        if !self.support_messages.trim().is_empty() {
            out.push_str(&format!("> {}\n", self.support_messages.trim()));
        }
        out.push_str("\n*Always consult a healthcare professional before acting on this summary.*\n");
        out
    }
}

// Backend fields are free text; comma separated values render as a list.
fn split_list(body: &str) -> Vec<&str> {
    let trimmed = body.trim();
    if trimmed.contains('.') {
        return vec![trimmed];
    }
    trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct NewConversation {
    pub title: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PrediagnosisRequest {
    pub symptoms: Vec<String>,
    pub conversation_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "record_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl User {
    /// Avatar initials: the first letter of each word of the name.
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Error body returned by the backend on a failed call.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// `message` verbatim, then a string `detail`, else `None`.
    pub fn into_message(self) -> Option<String> {
        if let Some(message) = self.message {
            return Some(message);
        }
        match self.detail {
            Some(serde_json::Value::String(detail)) => Some(detail),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

fn record_id<'de, D>(deserializer: D) -> Result<String, D::Error> where D: Deserializer<'de> {
    RawId::deserialize(deserializer).map(String::from)
}

fn optional_record_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where D: Deserializer<'de>
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

// The backend emits naive local timestamps; offset-carrying ones are accepted too.
fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error> where D: Deserializer<'de> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}
