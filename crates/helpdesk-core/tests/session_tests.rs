use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use helpdesk_core::config::ChatSettings;
use helpdesk_core::constants::messages::TRANSPORT_FAILURE;
use helpdesk_core::{
    AnswerClient, ByteStream, ChatError, ChatRequest, ChatView, ConversationStore, MemoryStorage,
    Message, RenderedMessage, Role, SendOutcome, Sender, SessionController,
};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

// ========================================================================
// Mocks
// ========================================================================

#[derive(Clone)]
enum Chunk {
    Data(&'static str),
    Fail(&'static str),
}

/// Replies to every request with the same scripted chunks.
struct ScriptedClient {
    chunks: Vec<Chunk>,
    refuse: bool,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedClient {
    fn new(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks,
            refuse: false,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl AnswerClient for ScriptedClient {
    async fn stream_answer(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.refuse {
            return Err(ChatError::Transport("connection refused".into()));
        }
        let items: Vec<Result<Vec<u8>, ChatError>> = self
            .chunks
            .iter()
            .map(|c| match c {
                Chunk::Data(s) => Ok(s.as_bytes().to_vec()),
                Chunk::Fail(e) => Err(ChatError::Transport(e.to_string())),
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Hands out one body stream driven by the test, and reports when the
/// request has been dispatched.
struct GatedClient {
    body: Mutex<Option<fmpsc::UnboundedReceiver<Result<Vec<u8>, ChatError>>>>,
    dispatched: mpsc::UnboundedSender<ChatRequest>,
}

#[async_trait]
impl AnswerClient for GatedClient {
    async fn stream_answer(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        let body = self
            .body
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ChatError::Other("body already taken".into()))?;
        let _ = self.dispatched.send(request.clone());
        Ok(Box::pin(body))
    }
}

struct Gate {
    body: fmpsc::UnboundedSender<Result<Vec<u8>, ChatError>>,
    dispatched: mpsc::UnboundedReceiver<ChatRequest>,
}

impl Gate {
    fn push(&self, line: &str) {
        self.body.unbounded_send(Ok(line.as_bytes().to_vec())).unwrap();
    }
}

fn gated() -> (GatedClient, Gate) {
    let (body_tx, body_rx) = fmpsc::unbounded();
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    (
        GatedClient {
            body: Mutex::new(Some(body_rx)),
            dispatched: req_tx,
        },
        Gate {
            body: body_tx,
            dispatched: req_rx,
        },
    )
}

#[derive(Debug, Clone, PartialEq)]
enum ViewEvent {
    Conversation(String),
    Message(String, Sender, String),
    Typing(String),
    Stream(String, String),
    Cleared(String),
}

#[derive(Default)]
struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl ChatView for RecordingView {
    fn conversation_shown(&self, id: &str, _title: &str, _messages: &[RenderedMessage]) {
        self.record(ViewEvent::Conversation(id.to_string()));
    }

    fn message_shown(&self, id: &str, message: &RenderedMessage) {
        self.record(ViewEvent::Message(
            id.to_string(),
            message.message.sender,
            message.markup.clone(),
        ));
    }

    fn typing_started(&self, id: &str) {
        self.record(ViewEvent::Typing(id.to_string()));
    }

    fn stream_updated(&self, id: &str, _text: &str, markup: &str) {
        self.record(ViewEvent::Stream(id.to_string(), markup.to_string()));
    }

    fn stream_cleared(&self, id: &str) {
        self.record(ViewEvent::Cleared(id.to_string()));
    }
}

fn no_delay() -> ChatSettings {
    ChatSettings {
        typing_delay_ms: 0,
        ..ChatSettings::default()
    }
}

fn controller(client: Arc<dyn AnswerClient>, view: Arc<RecordingView>) -> SessionController {
    let store = ConversationStore::open(Box::new(MemoryStorage::new()));
    SessionController::new(store, client)
        .with_chat_settings(no_delay())
        .with_view(view)
}

fn content(text: &str) -> String {
    format!("data: {{\"type\":\"content\",\"content\":\"{text}\"}}\n")
}

const DONE: &str = "data: {\"type\":\"done\"}\n";

// ========================================================================
// Request/response cycle
// ========================================================================

#[tokio::test]
async fn test_answer_is_committed() {
    let view = Arc::new(RecordingView::default());
    let client = Arc::new(ScriptedClient::new(vec![
        Chunk::Data("data: {\"type\":\"metadata\",\"sources\":[]}\n"),
        Chunk::Data("data: {\"type\":\"content\",\"content\":\"**Bring** \"}\n"),
        Chunk::Data("data: {\"type\":\"content\",\"content\":\"your ID\"}\n"),
        Chunk::Data(DONE),
    ]));
    let controller = controller(client.clone(), view.clone());
    let id = controller.active_id().await;

    let outcome = controller.send("  What do I need?  ").await;
    match outcome {
        SendOutcome::Answered {
            conversation_id,
            message,
        } => {
            assert_eq!(conversation_id, id);
            assert_eq!(message.text, "**Bring** your ID");
            assert_eq!(message.sender, Sender::Assistant);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let messages = controller.active_messages().await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "What do I need?");
    assert_eq!(messages[1].text, "**Bring** your ID");

    let requests = client.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].query, "What do I need?");
    assert!(requests[0].chat_history.is_empty());

    let events = view.events();
    assert!(events.contains(&ViewEvent::Typing(id.clone())));
    assert!(events.contains(&ViewEvent::Cleared(id.clone())));
    let last_stream = events
        .iter()
        .rev()
        .find_map(|e| match e {
            ViewEvent::Stream(_, markup) => Some(markup.clone()),
            _ => None,
        })
        .unwrap();
    assert!(last_stream.contains("<strong>Bring</strong> your ID"));
    assert!(matches!(
        events.last(),
        Some(ViewEvent::Message(_, Sender::Assistant, markup)) if markup.contains("<strong>Bring</strong>")
    ));
}

#[tokio::test]
async fn test_empty_input_is_ignored() {
    let view = Arc::new(RecordingView::default());
    let client = Arc::new(ScriptedClient::new(vec![Chunk::Data(DONE)]));
    let controller = controller(client.clone(), view.clone());

    assert_eq!(controller.send("   \n ").await, SendOutcome::Empty);
    assert!(client.requests.lock().unwrap().is_empty());
    assert!(controller.active_messages().await.is_empty());
    assert!(view.events().is_empty());
}

#[tokio::test]
async fn test_user_text_is_escaped_for_display() {
    let view = Arc::new(RecordingView::default());
    let client = Arc::new(ScriptedClient::new(vec![Chunk::Data(DONE)]));
    let controller = controller(client, view.clone());

    controller.send("<b>hi</b>").await;
    let first = view.events().into_iter().find_map(|e| match e {
        ViewEvent::Message(_, Sender::User, markup) => Some(markup),
        _ => None,
    });
    assert_eq!(first.as_deref(), Some("&lt;b&gt;hi&lt;/b&gt;"));
    // Stored text is the raw input.
    assert_eq!(controller.active_messages().await[0].text, "<b>hi</b>");
}

#[tokio::test]
async fn test_malformed_frame_mid_stream() {
    let view = Arc::new(RecordingView::default());
    let client = Arc::new(ScriptedClient::new(vec![
        Chunk::Data("data: {\"type\":\"content\",\"content\":\"A\"}\n"),
        Chunk::Data("data: {oops\n"),
        Chunk::Data("data: {\"type\":\"content\",\"content\":\"B\"}\n"),
        Chunk::Data(DONE),
    ]));
    let controller = controller(client, view);

    match controller.send("hi").await {
        SendOutcome::Answered { message, .. } => assert_eq!(message.text, "AB"),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_drop_commits_error_placeholder() {
    let view = Arc::new(RecordingView::default());
    let client = Arc::new(ScriptedClient::new(vec![
        Chunk::Data("data: {\"type\":\"content\",\"content\":\"A\"}\n"),
        Chunk::Data("data: {\"type\":\"content\",\"content\":\"B\"}\n"),
        Chunk::Fail("connection reset"),
    ]));
    let controller = controller(client, view.clone());
    let id = controller.active_id().await;

    match controller.send("hi").await {
        SendOutcome::Failed {
            conversation_id,
            message,
        } => {
            assert_eq!(conversation_id, id);
            assert_eq!(message.text, TRANSPORT_FAILURE);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let messages = controller.active_messages().await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].text, TRANSPORT_FAILURE);
    // The partial answer was shown while streaming but never committed.
    assert!(view
        .events()
        .iter()
        .any(|e| matches!(e, ViewEvent::Stream(_, markup) if markup.contains("AB"))));
    assert!(view.events().contains(&ViewEvent::Cleared(id)));
}

#[tokio::test]
async fn test_refused_connection_commits_error_placeholder() {
    let view = Arc::new(RecordingView::default());
    let controller = controller(Arc::new(ScriptedClient::refusing()), view);

    match controller.send("hi").await {
        SendOutcome::Failed { message, .. } => assert_eq!(message.text, TRANSPORT_FAILURE),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_stream_without_done_is_a_failure() {
    let view = Arc::new(RecordingView::default());
    let client = Arc::new(ScriptedClient::new(vec![Chunk::Data(
        "data: {\"type\":\"content\",\"content\":\"A\"}\n",
    )]));
    let controller = controller(client, view);

    match controller.send("hi").await {
        SendOutcome::Failed { message, .. } => assert_eq!(message.text, TRANSPORT_FAILURE),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_protocol_error_is_committed_with_prefix() {
    let view = Arc::new(RecordingView::default());
    let client = Arc::new(ScriptedClient::new(vec![
        Chunk::Data("data: {\"type\":\"content\",\"content\":\"A\"}\n"),
        Chunk::Data("data: {\"type\":\"error\",\"error\":\"retrieval failed\"}\n"),
    ]));
    let controller = controller(client, view);

    match controller.send("hi").await {
        SendOutcome::Failed { message, .. } => {
            assert_eq!(message.text, "Error: retrieval failed")
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_history_is_capped_and_most_recent() {
    let view = Arc::new(RecordingView::default());
    let client = Arc::new(ScriptedClient::new(vec![Chunk::Data(DONE)]));
    let controller = controller(client.clone(), view);

    {
        let store = controller.store();
        let mut store = store.lock().await;
        let id = store.active_id().to_string();
        for i in 0..12 {
            let message = if i % 2 == 0 {
                Message::user(format!("m{i}"))
            } else {
                Message::assistant(format!("m{i}"))
            };
            store.append(&id, message);
        }
    }

    controller.send("latest").await;
    let request = client.requests.lock().unwrap()[0].clone();
    assert_eq!(request.query, "latest");
    assert_eq!(request.chat_history.len(), 10);
    assert_eq!(request.chat_history[0].content, "m2");
    assert_eq!(request.chat_history[0].role, Role::User);
    assert_eq!(request.chat_history[9].content, "m11");
    assert_eq!(request.chat_history[9].role, Role::Assistant);
}

// ========================================================================
// Concurrency with conversation actions
// ========================================================================

#[tokio::test]
async fn test_reply_lands_in_origin_after_switch() {
    let view = Arc::new(RecordingView::default());
    let (client, mut gate) = gated();
    let controller = Arc::new(controller(Arc::new(client), view.clone()));
    let origin = controller.active_id().await;

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.send("question").await })
    };

    gate.dispatched.recv().await.unwrap();
    gate.push(&content("Hel"));

    let other = controller.new_conversation().await;
    assert_ne!(other, origin);

    gate.push(&content("lo"));
    gate.push(DONE);
    let outcome = task.await.unwrap();

    assert!(matches!(
        &outcome,
        SendOutcome::Answered { conversation_id, message }
            if *conversation_id == origin && message.text == "Hello"
    ));

    let store = controller.store();
    let store = store.lock().await;
    let origin_messages = store.get(&origin).unwrap().messages();
    assert_eq!(origin_messages.len(), 2);
    assert_eq!(origin_messages[1].text, "Hello");
    assert!(store.get(&other).unwrap().is_empty());
    assert_eq!(store.active_id(), other);

    // The answer was committed after the switch, so it was never shown.
    assert!(!view
        .events()
        .iter()
        .any(|e| matches!(e, ViewEvent::Message(_, Sender::Assistant, _))));
}

#[tokio::test]
async fn test_overlapping_send_is_busy() {
    let view = Arc::new(RecordingView::default());
    let (client, mut gate) = gated();
    let controller = Arc::new(controller(Arc::new(client), view));

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.send("first").await })
    };
    gate.dispatched.recv().await.unwrap();

    assert_eq!(controller.send("second").await, SendOutcome::Busy);

    gate.push(&content("ok"));
    gate.push(DONE);
    assert!(matches!(task.await.unwrap(), SendOutcome::Answered { .. }));

    let texts: Vec<String> = controller
        .active_messages()
        .await
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(texts, vec!["first".to_string(), "ok".to_string()]);
}

#[tokio::test]
async fn test_reply_for_deleted_conversation_is_dropped() {
    let view = Arc::new(RecordingView::default());
    let (client, mut gate) = gated();
    let controller = Arc::new(controller(Arc::new(client), view));
    let origin = controller.active_id().await;

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.send("question").await })
    };
    gate.dispatched.recv().await.unwrap();

    assert!(controller.delete(&origin).await);
    gate.push(&content("late"));
    gate.push(DONE);
    task.await.unwrap();

    let summaries = controller.conversations().await;
    assert_eq!(summaries.len(), 1);
    assert_ne!(summaries[0].id, origin);
    assert!(controller.active_messages().await.is_empty());
}

// ========================================================================
// Conversation actions
// ========================================================================

#[tokio::test]
async fn test_switch_shows_conversation() {
    let view = Arc::new(RecordingView::default());
    let client = Arc::new(ScriptedClient::new(vec![Chunk::Data(DONE)]));
    let controller = controller(client, view.clone());
    let first = controller.active_id().await;
    let second = controller.new_conversation().await;

    assert!(controller.switch_to(&first).await);
    assert!(!controller.switch_to("conv_missing").await);
    assert_eq!(
        view.events(),
        vec![
            ViewEvent::Conversation(second),
            ViewEvent::Conversation(first.clone()),
        ]
    );
    assert_eq!(controller.active_id().await, first);
}

#[tokio::test]
async fn test_support_message() {
    let view = Arc::new(RecordingView::default());
    let client = Arc::new(ScriptedClient::new(vec![]));
    let controller = controller(client, view);

    let message = controller.support_message().await;
    assert_eq!(message.sender, Sender::Assistant);
    assert!(message.text.contains("18001096"));
    assert_eq!(controller.active_messages().await, vec![message]);
}

#[tokio::test]
async fn test_subscribers_see_new_titles() {
    let view = Arc::new(RecordingView::default());
    let client = Arc::new(ScriptedClient::new(vec![
        Chunk::Data("data: {\"type\":\"content\",\"content\":\"Sure\"}\n"),
        Chunk::Data(DONE),
    ]));
    let controller = controller(client, view);
    let mut rx = controller.subscribe().await;

    controller.send("Register a household").await;
    assert!(rx.has_changed().unwrap());
    let list = rx.borrow_and_update().clone();
    assert_eq!(list[0].title, "Register a household");
    assert_eq!(list[0].preview, "Sure...");
}
