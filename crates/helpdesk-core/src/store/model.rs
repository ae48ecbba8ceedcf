use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::chat::{EMPTY_PREVIEW, NEW_CHAT_TITLE, PREVIEW_MAX_CHARS, TITLE_MAX_CHARS};
use crate::stream::Role;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    #[serde(alias = "bot")]
    Assistant,
}

impl From<Sender> for Role {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::User => Role::User,
            Sender::Assistant => Role::Assistant,
        }
    }
}

/// A single chat message. Never modified after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub sender: Sender,
    #[serde(rename = "message")]
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }
}

/// Keep the first `max` characters, appending `...` when something was cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    id: String,
    title: String,
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self::created_at_time(id, Utc::now())
    }

    pub(crate) fn created_at_time(id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: NEW_CHAT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = id;
    }

    #[cfg(test)]
    pub(crate) fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    /// Append a message, move `updated_at` to `at` and derive the title when
    /// this is the first user message.
    pub(crate) fn push(&mut self, message: Message, at: DateTime<Utc>) {
        let first_user = message.sender == Sender::User
            && !self.messages.iter().any(|m| m.sender == Sender::User);
        if first_user {
            self.title = truncate_chars(&message.text, TITLE_MAX_CHARS);
        }
        self.messages.push(message);
        self.updated_at = at.max(self.updated_at);
    }

    pub fn summary(&self, active: bool) -> ConversationSummary {
        let preview = match self.messages.last() {
            Some(last) => {
                let cut: String = last.text.chars().take(PREVIEW_MAX_CHARS).collect();
                format!("{cut}...")
            }
            None => EMPTY_PREVIEW.to_string(),
        };
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            preview,
            updated_at: self.updated_at,
            active,
        }
    }
}

/// List entry republished by the store after every change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
}

impl ConversationSummary {
    pub fn time_ago(&self, now: DateTime<Utc>) -> String {
        time_ago(self.updated_at, now)
    }
}

/// Short relative age used by conversation lists.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} min")
    } else if hours < 24 {
        format!("{hours} h")
    } else if days < 7 {
        format!("{days} d")
    } else {
        then.format("%d/%m/%Y").to_string()
    }
}
