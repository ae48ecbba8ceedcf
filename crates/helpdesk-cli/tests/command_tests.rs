use chrono::{Duration, Utc};
use helpdesk_cli::commands::{handle_command, CommandResult};
use helpdesk_cli::view::{format_summary, TerminalView};
use helpdesk_core::{ChatView, ConversationSummary, Message, RenderedMessage};
use std::io::Write;
use std::sync::{Arc, Mutex};

// ========================================================================
// Command Parsing Tests (commands.rs)
// ========================================================================

#[test]
fn test_help_command() {
    let result = handle_command("/help");
    if let CommandResult::Message(msg) = result {
        assert!(msg.contains("Helpdesk Commands"));
        assert!(msg.contains("/switch <id>"));
    } else {
        panic!("expected help text");
    }
}

#[test]
fn test_help_command_short_alias() {
    assert!(matches!(handle_command("/h"), CommandResult::Message(_)));
}

#[test]
fn test_quit_aliases() {
    for cmd in ["/quit", "/exit", "/q"] {
        assert_eq!(handle_command(cmd), CommandResult::Quit);
    }
}

#[test]
fn test_new_conversation_command() {
    assert_eq!(handle_command("/new"), CommandResult::NewConversation);
}

#[test]
fn test_list_command() {
    assert_eq!(handle_command("/list"), CommandResult::ListConversations);
    assert_eq!(handle_command("/history"), CommandResult::ListConversations);
}

#[test]
fn test_switch_with_id() {
    assert_eq!(
        handle_command("/switch conv_1714557600000"),
        CommandResult::SwitchConversation("conv_1714557600000".into())
    );
}

#[test]
fn test_switch_without_id_shows_usage() {
    match handle_command("/switch") {
        CommandResult::Message(msg) => assert!(msg.starts_with("Usage: /switch")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_delete_trims_argument() {
    assert_eq!(
        handle_command("/delete   conv_42  "),
        CommandResult::DeleteConversation("conv_42".into())
    );
}

#[test]
fn test_support_command() {
    assert_eq!(handle_command("/support"), CommandResult::ShowSupport);
}

#[test]
fn test_unknown_command() {
    match handle_command("/frobnicate") {
        CommandResult::Message(msg) => assert!(msg.contains("Unknown command: /frobnicate")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_plain_text_is_not_a_command() {
    assert_eq!(
        handle_command("How do I register a birth?"),
        CommandResult::NotACommand
    );
    assert_eq!(handle_command("a/b path"), CommandResult::NotACommand);
}

// ========================================================================
// Terminal View Tests (view.rs)
// ========================================================================

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn rendered(message: Message) -> RenderedMessage {
    RenderedMessage {
        markup: String::new(),
        message,
    }
}

#[test]
fn test_view_prints_answers_only() {
    let buffer = SharedBuffer::default();
    let view = TerminalView::with_writer(Box::new(buffer.clone()));

    view.message_shown("conv_1", &rendered(Message::user("question")));
    view.message_shown("conv_1", &rendered(Message::assistant("**answer**")));

    assert_eq!(buffer.text(), "helpdesk: **answer**\n\n");
}

#[test]
fn test_view_streams_answer_once() {
    let buffer = SharedBuffer::default();
    let view = TerminalView::with_writer(Box::new(buffer.clone()));

    view.typing_started("conv_1");
    view.stream_updated("conv_1", "Hel", "<p>Hel</p>");
    view.stream_updated("conv_1", "Hello", "<p>Hello</p>");
    view.stream_cleared("conv_1");
    view.message_shown("conv_1", &rendered(Message::assistant("Hello")));

    assert_eq!(buffer.text(), "helpdesk is typing...\nhelpdesk: Hello\n\n");
}

#[test]
fn test_view_prints_error_after_partial_answer() {
    let buffer = SharedBuffer::default();
    let view = TerminalView::with_writer(Box::new(buffer.clone()));

    view.stream_updated("conv_1", "AB", "<p>AB</p>");
    view.stream_cleared("conv_1");
    view.message_shown("conv_1", &rendered(Message::assistant("Connection lost.")));

    assert_eq!(buffer.text(), "helpdesk: AB\n\nhelpdesk: Connection lost.\n\n");
}

#[test]
fn test_view_shows_conversation_history() {
    let buffer = SharedBuffer::default();
    let view = TerminalView::with_writer(Box::new(buffer.clone()));

    view.conversation_shown(
        "conv_1",
        "Passport renewal",
        &[
            rendered(Message::user("How?")),
            rendered(Message::assistant("Form TK01.")),
        ],
    );

    let text = buffer.text();
    assert!(text.starts_with("── Passport renewal (conv_1) ──\n"));
    assert!(text.contains("you: How?\n"));
    assert!(text.contains("helpdesk: Form TK01.\n"));
}

#[test]
fn test_format_summary() {
    let now = Utc::now();
    let summary = ConversationSummary {
        id: "conv_1".into(),
        title: "Passport renewal".into(),
        preview: "Form TK01....".into(),
        updated_at: now - Duration::minutes(5),
        active: true,
    };
    assert_eq!(
        format_summary(&summary, now),
        "* conv_1  Passport renewal  (5 min)  Form TK01...."
    );
}
