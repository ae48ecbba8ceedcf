use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::config::{ChatSettings, Settings, SupportSettings};
use crate::constants::messages::{ERROR_PREFIX, TRANSPORT_FAILURE};
use crate::render::{escape_html, TextRenderer};
use crate::session::{ChatView, NullView, RenderedMessage};
use crate::store::{ConversationStore, ConversationSummary, Message, Sender};
use crate::stream::{decode_stream, AnswerClient, ChatRequest, StreamEvent};

/// Result of a [`SessionController::send`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Input was empty or whitespace; nothing happened.
    Empty,
    /// A send for the same conversation is still outstanding.
    Busy,
    /// The answer was committed to the conversation.
    Answered { conversation_id: String, message: Message },
    /// An error message was committed in place of an answer.
    Failed { conversation_id: String, message: Message },
}

enum Failure {
    Protocol(String),
    Transport,
}

impl Failure {
    fn text(&self) -> String {
        match self {
            Failure::Protocol(message) => format!("{ERROR_PREFIX}{message}"),
            Failure::Transport => TRANSPORT_FAILURE.to_string(),
        }
    }
}

/// Marks a conversation as having a send in flight until dropped.
struct InFlight<'a> {
    set: &'a std::sync::Mutex<HashSet<String>>,
    id: String,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a std::sync::Mutex<HashSet<String>>, id: &str) -> Option<Self> {
        let mut ids = set.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(id.to_string()) {
            return None;
        }
        Some(Self {
            set,
            id: id.to_string(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut ids = self.set.lock().unwrap_or_else(|e| e.into_inner());
        ids.remove(&self.id);
    }
}

/// Drives request/response cycles and conversation actions for one view.
pub struct SessionController {
    store: Arc<Mutex<ConversationStore>>,
    client: Arc<dyn AnswerClient>,
    renderer: TextRenderer,
    view: Arc<dyn ChatView>,
    chat: ChatSettings,
    support: SupportSettings,
    in_flight: std::sync::Mutex<HashSet<String>>,
}

impl SessionController {
    pub fn new(store: ConversationStore, client: Arc<dyn AnswerClient>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            client,
            renderer: TextRenderer::default(),
            view: Arc::new(NullView),
            chat: ChatSettings::default(),
            support: SupportSettings::default(),
            in_flight: std::sync::Mutex::new(HashSet::new()),
        }
    }

    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.renderer = TextRenderer::new(settings.render.clone());
        self.chat = settings.chat.clone();
        self.support = settings.support.clone();
        self
    }

    pub fn with_chat_settings(mut self, chat: ChatSettings) -> Self {
        self.chat = chat;
        self
    }

    pub fn with_renderer(mut self, renderer: TextRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_view(mut self, view: Arc<dyn ChatView>) -> Self {
        self.view = view;
        self
    }

    /// Shared handle to the store, for hosts that read it directly.
    pub fn store(&self) -> Arc<Mutex<ConversationStore>> {
        self.store.clone()
    }

    pub fn renderer(&self) -> &TextRenderer {
        &self.renderer
    }

    fn markup_for(&self, message: &Message) -> String {
        match message.sender {
            Sender::Assistant => self.renderer.render(&message.text),
            Sender::User => escape_html(&message.text),
        }
    }

    /// Send `text` in the active conversation and wait for the answer.
    ///
    /// The reply always lands in the conversation that was active when this
    /// was called, even if the user switches away while it streams.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Empty;
        }

        let (target_id, context) = {
            let store = self.store.lock().await;
            let id = store.active_id().to_string();
            let context = store.context_window(&id, self.chat.max_history_length);
            (id, context)
        };

        let Some(_in_flight) = InFlight::acquire(&self.in_flight, &target_id) else {
            tracing::debug!("Send rejected, answer pending for {target_id}");
            return SendOutcome::Busy;
        };

        self.commit(&target_id, Message::user(text)).await;

        if self.is_active(&target_id).await {
            self.view.typing_started(&target_id);
        }
        let delay = self.chat.typing_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let request = ChatRequest {
            query: text.to_string(),
            chat_history: context.to_history(),
        };
        self.stream_reply(&target_id, &request).await
    }

    async fn stream_reply(&self, target_id: &str, request: &ChatRequest) -> SendOutcome {
        let bytes = match self.client.stream_answer(request).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Answer request failed: {e}");
                return self.fail(target_id, Failure::Transport).await;
            }
        };

        let mut events = Box::pin(decode_stream(bytes));
        let mut answer = String::new();

        while let Some(event) = events.next().await {
            match event {
                StreamEvent::Metadata(fields) => {
                    if self.is_active(target_id).await {
                        self.view.metadata_received(target_id, &fields);
                    }
                }
                StreamEvent::Content(delta) => {
                    answer.push_str(&delta);
                    // The whole answer is re-rendered on every delta so that
                    // constructs split across deltas come out right.
                    let markup = self.renderer.render(&answer);
                    if self.is_active(target_id).await {
                        self.view.stream_updated(target_id, &answer, &markup);
                    }
                }
                StreamEvent::Done => {
                    self.view.stream_cleared(target_id);
                    let message = Message::assistant(answer);
                    self.commit(target_id, message.clone()).await;
                    return SendOutcome::Answered {
                        conversation_id: target_id.to_string(),
                        message,
                    };
                }
                StreamEvent::Error { message, synthetic } => {
                    let failure = if synthetic {
                        Failure::Transport
                    } else {
                        Failure::Protocol(message)
                    };
                    return self.fail(target_id, failure).await;
                }
            }
        }

        tracing::warn!("Answer stream ended without a done event");
        self.fail(target_id, Failure::Transport).await
    }

    async fn fail(&self, target_id: &str, failure: Failure) -> SendOutcome {
        self.view.stream_cleared(target_id);
        let message = Message::assistant(failure.text());
        self.commit(target_id, message.clone()).await;
        SendOutcome::Failed {
            conversation_id: target_id.to_string(),
            message,
        }
    }

    /// Render, display if `target_id` is active, then persist and republish.
    async fn commit(&self, target_id: &str, message: Message) -> bool {
        let rendered = RenderedMessage {
            markup: self.markup_for(&message),
            message,
        };

        let mut store = self.store.lock().await;
        if !store.contains(target_id) {
            tracing::warn!("Dropping message for deleted conversation {target_id}");
            return false;
        }
        if store.is_active(target_id) {
            self.view.message_shown(target_id, &rendered);
        }
        store.append(target_id, rendered.message)
    }

    async fn is_active(&self, id: &str) -> bool {
        self.store.lock().await.is_active(id)
    }

    fn show_active(&self, store: &ConversationStore) {
        if let Some(conversation) = store.active() {
            let messages: Vec<RenderedMessage> = conversation
                .messages()
                .iter()
                .map(|m| RenderedMessage {
                    markup: self.markup_for(m),
                    message: m.clone(),
                })
                .collect();
            self.view
                .conversation_shown(conversation.id(), conversation.title(), &messages);
        }
    }

    /// Show the active conversation; used once a host view is attached.
    pub async fn show_current(&self) {
        let store = self.store.lock().await;
        self.show_active(&store);
    }

    pub async fn new_conversation(&self) -> String {
        let mut store = self.store.lock().await;
        let id = store.create();
        self.show_active(&store);
        id
    }

    pub async fn switch_to(&self, id: &str) -> bool {
        let mut store = self.store.lock().await;
        if !store.switch_to(id) {
            return false;
        }
        self.show_active(&store);
        true
    }

    pub async fn delete(&self, id: &str) -> bool {
        let mut store = self.store.lock().await;
        let was_active = store.is_active(id);
        if !store.delete(id) {
            return false;
        }
        if was_active {
            self.show_active(&store);
        }
        true
    }

    pub async fn active_id(&self) -> String {
        self.store.lock().await.active_id().to_string()
    }

    pub async fn conversations(&self) -> Vec<ConversationSummary> {
        self.store.lock().await.summaries()
    }

    pub async fn subscribe(&self) -> watch::Receiver<Vec<ConversationSummary>> {
        self.store.lock().await.subscribe()
    }

    /// Messages of the active conversation.
    pub async fn active_messages(&self) -> Vec<Message> {
        let store = self.store.lock().await;
        store
            .active()
            .map(|c| c.messages().to_vec())
            .unwrap_or_default()
    }

    /// Post the support contact details as an assistant message in the
    /// active conversation.
    pub async fn support_message(&self) -> Message {
        let text = format!(
            "You can reach support via the hotline {} or by email at {}.",
            self.support.hotline, self.support.email
        );
        let message = Message::assistant(text);
        let target_id = self.active_id().await;
        self.commit(&target_id, message.clone()).await;
        message
    }
}
