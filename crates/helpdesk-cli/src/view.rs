use chrono::{DateTime, Utc};
use helpdesk_core::{ChatView, ConversationSummary, RenderedMessage, Sender};
use std::io::{self, Write};
use std::sync::Mutex;

const ASSISTANT_LABEL: &str = "helpdesk";
const USER_LABEL: &str = "you";

/// Line-oriented view for a terminal.
///
/// Answers are printed as source text while they stream in. Printed text
/// cannot be replaced, so each update only appends what arrived since the
/// last one, and the committed answer is not printed a second time.
pub struct TerminalView {
    out: Mutex<Box<dyn Write + Send>>,
    progress: Mutex<StreamProgress>,
}

#[derive(Default)]
struct StreamProgress {
    /// Answer text already on screen for the running stream.
    printed: String,
    /// Text of the last stream, until its committed message arrives.
    finished: Option<String>,
}

impl TerminalView {
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            progress: Mutex::new(StreamProgress::default()),
        }
    }

    fn write(&self, text: &str) {
        self.write_raw(&format!("{text}\n"));
    }

    fn write_raw(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            tracing::debug!("Terminal write failed: {e}");
        }
    }

    fn progress(&self) -> std::sync::MutexGuard<'_, StreamProgress> {
        self.progress.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn label(sender: Sender) -> &'static str {
    match sender {
        Sender::User => USER_LABEL,
        Sender::Assistant => ASSISTANT_LABEL,
    }
}

impl ChatView for TerminalView {
    fn conversation_shown(&self, conversation_id: &str, title: &str, messages: &[RenderedMessage]) {
        *self.progress() = StreamProgress::default();
        let mut text = format!("── {title} ({conversation_id}) ──");
        for rendered in messages {
            text.push('\n');
            text.push_str(&format!(
                "{}: {}",
                label(rendered.message.sender),
                rendered.message.text
            ));
        }
        self.write(&text);
    }

    fn message_shown(&self, _conversation_id: &str, message: &RenderedMessage) {
        // The user's own input is already on screen.
        if message.message.sender != Sender::Assistant {
            return;
        }
        let finished = self.progress().finished.take();
        if finished.as_deref() != Some(message.message.text.as_str()) {
            self.write(&format!("{ASSISTANT_LABEL}: {}\n", message.message.text));
        }
    }

    fn typing_started(&self, _conversation_id: &str) {
        *self.progress() = StreamProgress::default();
        self.write(&format!("{ASSISTANT_LABEL} is typing..."));
    }

    fn stream_updated(&self, _conversation_id: &str, text: &str, _markup: &str) {
        let mut progress = self.progress();
        let chunk = if progress.printed.is_empty() {
            if text.is_empty() {
                return;
            }
            format!("{ASSISTANT_LABEL}: {text}")
        } else if let Some(rest) = text.strip_prefix(progress.printed.as_str()) {
            rest.to_string()
        } else {
            // The answer no longer extends what is on screen; start over.
            format!("\n{ASSISTANT_LABEL}: {text}")
        };
        progress.printed = text.to_string();
        drop(progress);
        if !chunk.is_empty() {
            self.write_raw(&chunk);
        }
    }

    fn stream_cleared(&self, _conversation_id: &str) {
        let mut progress = self.progress();
        let printed = std::mem::take(&mut progress.printed);
        if printed.is_empty() {
            return;
        }
        progress.finished = Some(printed);
        drop(progress);
        self.write_raw("\n\n");
    }
}

/// One line of `/list` output.
pub fn format_summary(summary: &ConversationSummary, now: DateTime<Utc>) -> String {
    let marker = if summary.active { '*' } else { ' ' };
    format!(
        "{marker} {}  {}  ({})  {}",
        summary.id,
        summary.title,
        summary.time_ago(now),
        summary.preview
    )
}
