//! Local conversation state kept in step with the backend and the relay.
//!
//! Every change is published as a fresh [`Snapshot`] on a watch channel, so a
//! UI only ever renders whole states. A reply keeps writing into the
//! conversation it started in even if another conversation becomes active.

pub mod actions;

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use futures::StreamExt;
use log::{ info, warn };
use tokio::sync::watch;
use uuid::Uuid;

use crate::cli::Args;
use crate::client::auth::AuthContext;
use crate::client::relay::{ RelayClient, RelayEventStream };
use crate::client::{ BackendClient, ClientError };
use crate::models::backend::{ ConversationRecord, MessageRecord, Prediagnosis };
use crate::models::chat::{ ChatMessage, RelayEvent, Role };

pub const DEFAULT_TITLE: &str = "New Conversation";
pub const GREETING: &str = "Hello! How can I assist you today?";
pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";
const CUT_OFF: &str = "reply stream ended before it was complete";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Widget {
    IntakeQuestionnaire,
    SymptomChecklist,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Widget(Widget),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text.as_str()),
            MessageContent::Widget(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: String,
    pub content: MessageContent,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn local(role: Role, content: MessageContent) -> Self {
        Self { id: Uuid::new_v4().to_string(), content, role, timestamp: Utc::now() }
    }
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            content: MessageContent::Text(record.content),
            role: record.role,
            timestamp: record.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub last_updated: DateTime<Utc>,
    /// The assistant message currently receiving text, if any.
    pub streaming: Option<String>,
}

impl Conversation {
    fn from_record(record: ConversationRecord, messages: Vec<Message>) -> Self {
        Self {
            id: record.id,
            title: record.title,
            messages,
            last_updated: record.updated_at,
            streaming: None,
        }
    }

    fn push(&mut self, message: Message) {
        self.last_updated = message.timestamp;
        self.messages.push(message);
    }

    fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Text history for the relay. Widgets and empty texts are left out.
    fn history(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter_map(|m| {
                m.content
                    .as_text()
                    .filter(|t| !t.is_empty())
                    .map(|t| ChatMessage::new(m.role, t))
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub conversations: Vec<Conversation>,
    pub active: Option<String>,
}

impl Snapshot {
    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    fn conversation_mut(&mut self, id: &str) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input or no active conversation.
    Ignored,
    /// The active conversation is still receiving a reply.
    Busy,
    Completed {
        message_id: String,
    },
    /// The apology was shown; the string is the underlying cause.
    Failed(String),
}

/// Persistence side of the conversation client.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, ClientError>;
    async fn create_conversation(&self, title: &str) -> Result<ConversationRecord, ClientError>;
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, ClientError>;
    async fn create_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str
    ) -> Result<MessageRecord, ClientError>;
}

/// Streaming side of the conversation client.
#[async_trait]
pub trait ChatStreamer: Send + Sync {
    async fn open(
        &self,
        messages: Vec<ChatMessage>,
        conversation_id: Option<String>
    ) -> Result<RelayEventStream, ClientError>;
}

#[async_trait]
impl ConversationStore for BackendClient {
    async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, ClientError> {
        BackendClient::list_conversations(self).await
    }

    async fn create_conversation(&self, title: &str) -> Result<ConversationRecord, ClientError> {
        BackendClient::create_conversation(self, title).await
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, ClientError> {
        BackendClient::list_messages(self, conversation_id).await
    }

    async fn create_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str
    ) -> Result<MessageRecord, ClientError> {
        BackendClient::create_message(self, conversation_id, role, content).await
    }
}

#[async_trait]
impl ChatStreamer for RelayClient {
    async fn open(
        &self,
        messages: Vec<ChatMessage>,
        conversation_id: Option<String>
    ) -> Result<RelayEventStream, ClientError> {
        RelayClient::open(self, messages, conversation_id).await
    }
}

pub struct ConversationClient<S, R> {
    store: S,
    streamer: R,
    state: watch::Sender<Snapshot>,
}

impl ConversationClient<BackendClient, RelayClient> {
    /// Talks to the backend at `BACKEND_URL` and to the relay served on
    /// `SERVER_ADDR`.
    pub fn from_args(args: &Args, auth: AuthContext) -> Result<Self, ClientError> {
        let scheme = if args.enable_tls { "https" } else { "http" };
        let store = BackendClient::new(&args.backend_url, auth)?;
        let streamer = RelayClient::new(&format!("{}://{}", scheme, args.server_addr))?;
        Ok(Self::new(store, streamer))
    }
}

impl<S: ConversationStore, R: ChatStreamer> ConversationClient<S, R> {
    pub fn new(store: S, streamer: R) -> Self {
        let (state, _) = watch::channel(Snapshot::default());
        Self { store, streamer, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    pub fn active(&self) -> Option<Conversation> {
        let state = self.state.borrow();
        let active = state.active.as_deref().and_then(|id| state.conversation(id)).cloned();
        active
    }

    /// Replaces local state with the backend's conversations.
    pub async fn load(&self) -> Result<(), ClientError> {
        let records = self.store.list_conversations().await?;
        let mut conversations = Vec::with_capacity(records.len());
        for record in records {
            let messages = self.store.list_messages(&record.id).await?;
            let messages = messages.into_iter().map(Message::from).collect();
            conversations.push(Conversation::from_record(record, messages));
        }
        info!("Loaded {} conversations", conversations.len());
        self.state.send_modify(|s| {
            s.active = conversations.first().map(|c| c.id.clone());
            s.conversations = conversations;
        });
        Ok(())
    }

    /// Creates a conversation seeded with the greeting and the intake
    /// questionnaire, puts it first and makes it active.
    pub async fn new_chat(&self) -> Result<String, ClientError> {
        let record = self.store.create_conversation(DEFAULT_TITLE).await?;
        let mut conversation = Conversation::from_record(record, Vec::new());
        if conversation.title.is_empty() {
            conversation.title = DEFAULT_TITLE.to_string();
        }
        conversation.push(
            Message::local(Role::Assistant, MessageContent::Text(GREETING.to_string()))
        );
        conversation.push(
            Message::local(Role::Assistant, MessageContent::Widget(Widget::IntakeQuestionnaire))
        );
        let id = conversation.id.clone();
        self.state.send_modify(|s| {
            s.conversations.insert(0, conversation);
            s.active = Some(id.clone());
        });
        Ok(id)
    }

    /// Local removal only. The active conversation falls back to the first
    /// remaining one.
    pub fn delete_chat(&self, id: &str) -> bool {
        self.state.send_if_modified(|s| {
            let before = s.conversations.len();
            s.conversations.retain(|c| c.id != id);
            if s.conversations.len() == before {
                return false;
            }
            if s.active.as_deref() == Some(id) {
                s.active = s.conversations.first().map(|c| c.id.clone());
            }
            true
        })
    }

    pub fn select(&self, id: &str) -> bool {
        self.state.send_if_modified(|s| {
            if s.conversation(id).is_none() || s.active.as_deref() == Some(id) {
                return false;
            }
            s.active = Some(id.to_string());
            true
        })
    }

    /// Appends the symptom checklist to the active conversation.
    pub fn offer_symptom_checklist(&self) -> bool {
        self.state.send_if_modified(|s| {
            let Some(id) = s.active.clone() else {
                return false;
            };
            match s.conversation_mut(&id) {
                Some(c) => {
                    c.push(Message::local(Role::Assistant, MessageContent::Widget(Widget::SymptomChecklist)));
                    true
                }
                None => false,
            }
        })
    }

    /// Shows a prediagnosis in the conversation it was made for.
    pub fn show_prediagnosis(&self, prediagnosis: &Prediagnosis) -> bool {
        let text = prediagnosis.to_markdown();
        self.state.send_if_modified(|s| {
            match s.conversation_mut(&prediagnosis.conversation_id) {
                Some(c) => {
                    c.push(Message::local(Role::Assistant, MessageContent::Text(text)));
                    true
                }
                None => false,
            }
        })
    }

    /// Sends `text` in the active conversation and streams the reply into it.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Ignored;
        }
        let Some(conversation_id) = self.state.borrow().active.clone() else {
            return SendOutcome::Ignored;
        };

        // (a) optimistic user message; the reply slot is claimed in the same
        // update so a concurrent send sees the conversation as busy
        let user = Message::local(Role::User, MessageContent::Text(text.to_string()));
        let user_id = user.id.clone();
        let placeholder = Message::local(Role::Assistant, MessageContent::Text(String::new()));
        let reply_id = placeholder.id.clone();
        let mut busy = false;
        let mut history = Vec::new();
        self.state.send_if_modified(|s| {
            let Some(c) = s.conversation_mut(&conversation_id) else {
                return false;
            };
            if c.streaming.is_some() {
                busy = true;
                return false;
            }
            c.streaming = Some(reply_id.clone());
            c.push(user);
            history = c.history();
            true
        });
        if busy {
            return SendOutcome::Busy;
        }

        // (b) persist it; on failure the user message stays and no placeholder is shown
        match self.store.create_message(&conversation_id, Role::User, text).await {
            Ok(record) => self.reconcile(&conversation_id, &user_id, record),
            Err(e) => {
                warn!("Could not save message in conversation {}: {}", conversation_id, e);
                self.release(&conversation_id);
                self.apologise(&conversation_id);
                return SendOutcome::Failed(e.to_string());
            }
        }

        // (c) empty placeholder
        self.state.send_modify(|s| {
            if let Some(c) = s.conversation_mut(&conversation_id) {
                c.push(placeholder);
            }
        });

        // (d) + (e)
        let failure = match self.streamer.open(history, Some(conversation_id.clone())).await {
            Ok(events) => self.pump(&conversation_id, &reply_id, events).await,
            Err(e) => Some(e.to_string()),
        };

        if let Some(cause) = failure {
            // (g)
            warn!("Reply in conversation {} failed: {}", conversation_id, cause);
            self.state.send_modify(|s| {
                if let Some(c) = s.conversation_mut(&conversation_id) {
                    c.streaming = None;
                    let empty = c
                        .messages
                        .iter()
                        .any(|m| m.id == reply_id && m.content.as_text() == Some(""));
                    if empty {
                        c.messages.retain(|m| m.id != reply_id);
                    }
                }
            });
            self.apologise(&conversation_id);
            return SendOutcome::Failed(cause);
        }

        // (f) persist the finished reply and adopt the server id
        let content = self.reply_text(&conversation_id, &reply_id);
        self.release(&conversation_id);
        let mut message_id = reply_id.clone();
        if content.is_empty() {
            warn!("Empty reply in conversation {} was not saved", conversation_id);
        } else {
            match self.store.create_message(&conversation_id, Role::Assistant, &content).await {
                Ok(record) => {
                    message_id = record.id.clone();
                    self.reconcile(&conversation_id, &reply_id, record);
                }
                Err(e) => warn!("Could not save reply in conversation {}: {}", conversation_id, e),
            }
        }
        SendOutcome::Completed { message_id }
    }

    /// Applies relay events to the placeholder. Returns the failure, if any.
    /// A stream that ends without a terminal event is a failure.
    async fn pump(
        &self,
        conversation_id: &str,
        reply_id: &str,
        mut events: RelayEventStream
    ) -> Option<String> {
        while let Some(event) = events.next().await {
            match event {
                RelayEvent::Text { text } => {
                    self.state.send_modify(|s| {
                        let message = s
                            .conversation_mut(conversation_id)
                            .and_then(|c| c.message_mut(reply_id));
                        if let Some(Message { content: MessageContent::Text(body), .. }) = message {
                            body.push_str(&text);
                        }
                    });
                }
                RelayEvent::Done { done: true } => return None,
                RelayEvent::Done { done: false } => {}
                RelayEvent::Error { error } => return Some(error),
            }
        }
        Some(CUT_OFF.to_string())
    }

    fn reply_text(&self, conversation_id: &str, reply_id: &str) -> String {
        let state = self.state.borrow();
        let text = state
            .conversation(conversation_id)
            .and_then(|c| c.messages.iter().find(|m| m.id == reply_id))
            .and_then(|m| m.content.as_text())
            .unwrap_or_default()
            .to_string();
        text
    }

    fn reconcile(&self, conversation_id: &str, local_id: &str, record: MessageRecord) {
        self.state.send_modify(|s| {
            if let Some(m) = s.conversation_mut(conversation_id).and_then(|c| c.message_mut(local_id)) {
                m.id = record.id;
                m.timestamp = record.created_at;
            }
        });
    }

    fn release(&self, conversation_id: &str) {
        self.state.send_modify(|s| {
            if let Some(c) = s.conversation_mut(conversation_id) {
                c.streaming = None;
            }
        });
    }

    fn apologise(&self, conversation_id: &str) {
        self.state.send_modify(|s| {
            if let Some(c) = s.conversation_mut(conversation_id) {
                c.push(Message::local(Role::Assistant, MessageContent::Text(APOLOGY.to_string())));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{ AtomicUsize, Ordering };
    use std::sync::{ Arc, Mutex };

    #[derive(Default)]
    struct FakeStore {
        fail_messages: bool,
        delay: Option<std::time::Duration>,
        next_id: AtomicUsize,
        saved: Mutex<Vec<(String, Role, String)>>,
    }

    fn record(id: &str, title: &str) -> ConversationRecord {
        ConversationRecord {
            id: id.into(),
            patient_id: "3".into(),
            doctor_id: None,
            title: title.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[async_trait]
    impl ConversationStore for FakeStore {
        async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, ClientError> {
            Ok(vec![record("a", "Headache"), record("b", "Rash")])
        }

        async fn create_conversation(&self, title: &str) -> Result<ConversationRecord, ClientError> {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(record(&format!("conv-{}", n), title))
        }

        async fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, ClientError> {
            if conversation_id != "a" {
                return Ok(Vec::new());
            }
            Ok(vec![MessageRecord {
                id: "m1".into(),
                content: "I have a headache".into(),
                role: Role::User,
                created_at: Utc::now(),
            }])
        }

        async fn create_message(
            &self,
            conversation_id: &str,
            role: Role,
            content: &str
        ) -> Result<MessageRecord, ClientError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_messages {
                return Err(ClientError::Status { status: 500, message: "database down".into() });
            }
            self.saved.lock().unwrap().push((conversation_id.into(), role, content.into()));
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(MessageRecord {
                id: format!("srv-{}", n),
                content: content.into(),
                role,
                created_at: Utc::now(),
            })
        }
    }

    struct FakeStreamer {
        events: Option<Vec<RelayEvent>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl FakeStreamer {
        fn replying(events: Vec<RelayEvent>) -> Self {
            Self { events: Some(events), seen: Mutex::new(Vec::new()) }
        }

        fn unreachable() -> Self {
            Self { events: None, seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl ChatStreamer for FakeStreamer {
        async fn open(
            &self,
            messages: Vec<ChatMessage>,
            _conversation_id: Option<String>
        ) -> Result<RelayEventStream, ClientError> {
            self.seen.lock().unwrap().push(messages);
            match &self.events {
                Some(events) => Ok(Box::pin(futures::stream::iter(events.clone()))),
                None => Err(ClientError::Status { status: 502, message: "relay down".into() }),
            }
        }
    }

    fn texts(conversation: &Conversation) -> Vec<(Role, Option<String>)> {
        conversation.messages
            .iter()
            .map(|m| (m.role, m.content.as_text().map(str::to_string)))
            .collect()
    }

    #[test]
    fn from_args_uses_backend_url() {
        use clap::Parser;
        let auth = AuthContext::initialize(Arc::new(crate::client::auth::MemoryTokenStore::new()));
        let args = Args::parse_from(["fast-aid", "--backend-url", "http://10.0.0.5:8000"]);
        assert!(ConversationClient::from_args(&args, auth.clone()).is_ok());
        let args = Args::parse_from(["fast-aid", "--backend-url", "not a url"]);
        assert!(matches!(ConversationClient::from_args(&args, auth), Err(ClientError::Url(_))));
    }

    #[tokio::test]
    async fn new_chat_is_seeded_first_and_active() {
        let client = ConversationClient::new(FakeStore::default(), FakeStreamer::unreachable());
        let mut updates = client.subscribe();
        let first = client.new_chat().await.unwrap();
        let second = client.new_chat().await.unwrap();
        assert!(updates.has_changed().unwrap());

        let snapshot = updates.borrow_and_update().clone();
        assert_eq!(snapshot.active.as_deref(), Some(second.as_str()));
        assert_eq!(snapshot.conversations[0].id, second);
        assert_eq!(snapshot.conversations[1].id, first);

        let active = client.active().unwrap();
        assert_eq!(active.title, DEFAULT_TITLE);
        assert_eq!(active.messages[0].content, MessageContent::Text(GREETING.into()));
        assert_eq!(active.messages[1].content, MessageContent::Widget(Widget::IntakeQuestionnaire));
    }

    #[tokio::test]
    async fn streamed_reply_accumulates_and_is_saved() {
        let streamer = FakeStreamer::replying(
            vec![RelayEvent::text("Hel"), RelayEvent::text("lo"), RelayEvent::done()]
        );
        let client = ConversationClient::new(FakeStore::default(), streamer);
        let id = client.new_chat().await.unwrap();

        let message_id = match client.send_message("I feel dizzy").await {
            SendOutcome::Completed { message_id } => message_id,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert!(message_id.starts_with("srv-"));

        let conversation = client.active().unwrap();
        assert_eq!(conversation.id, id);
        assert_eq!(conversation.streaming, None);
        let last_two = &conversation.messages[2..];
        assert_eq!(last_two[0].content, MessageContent::Text("I feel dizzy".into()));
        assert!(last_two[0].id.starts_with("srv-"));
        assert_eq!(last_two[1].content, MessageContent::Text("Hello".into()));
        assert_eq!(last_two[1].id, message_id);

        let saved = client.store.saved.lock().unwrap().clone();
        assert_eq!(
            saved,
            vec![
                (id.clone(), Role::User, "I feel dizzy".to_string()),
                (id.clone(), Role::Assistant, "Hello".to_string())
            ]
        );
        let seen = client.streamer.seen.lock().unwrap();
        assert_eq!(seen[0], vec![ChatMessage::assistant(GREETING), ChatMessage::user("I feel dizzy")]);
    }

    #[tokio::test]
    async fn failed_user_save_keeps_message_and_never_shows_placeholder() {
        let store = FakeStore { fail_messages: true, ..FakeStore::default() };
        let client = ConversationClient::new(store, FakeStreamer::replying(vec![RelayEvent::done()]));
        client.new_chat().await.unwrap();

        let outcome = client.send_message("hello").await;
        assert!(matches!(outcome, SendOutcome::Failed(_)));
        let conversation = client.active().unwrap();
        assert_eq!(
            texts(&conversation)[2..],
            [(Role::User, Some("hello".to_string())), (Role::Assistant, Some(APOLOGY.to_string()))]
        );
        assert!(conversation.messages.iter().all(|m| m.content.as_text() != Some("")));
        assert_eq!(conversation.streaming, None);
        assert!(client.streamer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_send_while_first_is_saving_is_busy() {
        let store = FakeStore {
            delay: Some(std::time::Duration::from_millis(20)),
            ..FakeStore::default()
        };
        let streamer = FakeStreamer::replying(
            vec![RelayEvent::text("a"), RelayEvent::text("b"), RelayEvent::done()]
        );
        let client = ConversationClient::new(store, streamer);
        client.new_chat().await.unwrap();

        let (first, second) = tokio::join!(client.send_message("first"), client.send_message("second"));
        assert!(matches!(first, SendOutcome::Completed { .. }));
        assert_eq!(second, SendOutcome::Busy);

        let conversation = client.active().unwrap();
        assert_eq!(
            texts(&conversation)[2..],
            [(Role::User, Some("first".to_string())), (Role::Assistant, Some("ab".to_string()))]
        );
        assert_eq!(conversation.streaming, None);
        assert_eq!(client.streamer.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stream_closing_without_terminal_event_is_not_saved() {
        let client = ConversationClient::new(
            FakeStore::default(),
            FakeStreamer::replying(vec![RelayEvent::text("Take 2 tab")])
        );
        let id = client.new_chat().await.unwrap();
        assert_eq!(client.send_message("dose?").await, SendOutcome::Failed(CUT_OFF.into()));

        let conversation = client.active().unwrap();
        assert_eq!(
            texts(&conversation)[3..],
            [(Role::Assistant, Some("Take 2 tab".to_string())), (Role::Assistant, Some(APOLOGY.to_string()))]
        );
        let saved = client.store.saved.lock().unwrap().clone();
        assert_eq!(saved, vec![(id, Role::User, "dose?".to_string())]);
    }

    #[tokio::test]
    async fn done_false_is_not_the_end_of_the_reply() {
        let client = ConversationClient::new(
            FakeStore::default(),
            FakeStreamer::replying(
                vec![
                    RelayEvent::text("a"),
                    RelayEvent::Done { done: false },
                    RelayEvent::text("b"),
                    RelayEvent::done()
                ]
            )
        );
        client.new_chat().await.unwrap();
        assert!(matches!(client.send_message("hi").await, SendOutcome::Completed { .. }));
        let last = client.active().unwrap().messages.last().cloned().unwrap();
        assert_eq!(last.content, MessageContent::Text("ab".into()));
    }

    #[tokio::test]
    async fn error_before_text_replaces_placeholder_with_apology() {
        let client = ConversationClient::new(
            FakeStore::default(),
            FakeStreamer::replying(vec![RelayEvent::error("overloaded")])
        );
        client.new_chat().await.unwrap();
        assert_eq!(client.send_message("hi").await, SendOutcome::Failed("overloaded".into()));
        let conversation = client.active().unwrap();
        assert_eq!(
            texts(&conversation)[2..],
            [(Role::User, Some("hi".to_string())), (Role::Assistant, Some(APOLOGY.to_string()))]
        );
        assert_eq!(conversation.streaming, None);
    }

    #[tokio::test]
    async fn error_mid_stream_keeps_partial_text() {
        let client = ConversationClient::new(
            FakeStore::default(),
            FakeStreamer::replying(vec![RelayEvent::text("Rest and"), RelayEvent::error("reset")])
        );
        client.new_chat().await.unwrap();
        client.send_message("hi").await;
        let conversation = client.active().unwrap();
        assert_eq!(
            texts(&conversation)[3..],
            [(Role::Assistant, Some("Rest and".to_string())), (Role::Assistant, Some(APOLOGY.to_string()))]
        );
    }

    #[tokio::test]
    async fn unreachable_relay_shows_apology() {
        let client = ConversationClient::new(FakeStore::default(), FakeStreamer::unreachable());
        client.new_chat().await.unwrap();
        let outcome = client.send_message("hi").await;
        assert_eq!(outcome, SendOutcome::Failed("backend returned 502: relay down".into()));
        assert_eq!(client.active().unwrap().messages.last().unwrap().content, MessageContent::Text(APOLOGY.into()));
    }

    #[tokio::test]
    async fn blank_input_and_missing_conversation_are_ignored() {
        let client = ConversationClient::new(FakeStore::default(), FakeStreamer::unreachable());
        assert_eq!(client.send_message("hi").await, SendOutcome::Ignored);
        client.new_chat().await.unwrap();
        assert_eq!(client.send_message("   ").await, SendOutcome::Ignored);
        assert_eq!(client.active().unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn load_select_and_delete() {
        let client = ConversationClient::new(FakeStore::default(), FakeStreamer::unreachable());
        client.load().await.unwrap();
        let snapshot = client.snapshot();
        assert_eq!(snapshot.active.as_deref(), Some("a"));
        assert_eq!(snapshot.conversation("a").unwrap().messages[0].id, "m1");

        assert!(client.select("b"));
        assert!(!client.select("zzz"));
        assert!(client.delete_chat("b"));
        assert_eq!(client.snapshot().active.as_deref(), Some("a"));
        assert!(client.delete_chat("a"));
        assert_eq!(client.snapshot().active, None);
        assert!(!client.delete_chat("a"));
    }

    #[tokio::test]
    async fn prediagnosis_and_checklist_land_in_conversation() {
        let client = ConversationClient::new(FakeStore::default(), FakeStreamer::unreachable());
        let id = client.new_chat().await.unwrap();
        assert!(client.offer_symptom_checklist());
        let prediagnosis = Prediagnosis {
            id: "1".into(),
            conversation_id: id.clone(),
            patient_id: "3".into(),
            potential_diseases: "Migraine, Tension headache".into(),
            course_of_action: String::new(),
            support_messages: String::new(),
            recommended_practitioners: String::new(),
            created_at: Utc::now(),
        };
        assert!(client.show_prediagnosis(&prediagnosis));
        let messages = client.active().unwrap().messages;
        assert_eq!(messages[2].content, MessageContent::Widget(Widget::SymptomChecklist));
        assert!(messages[3].content.as_text().unwrap().contains("- Migraine"));
    }
}
