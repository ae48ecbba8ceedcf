use crate::store::Message;
use crate::stream::HistoryEntry;
use std::collections::VecDeque;

/// The most recent messages of a conversation, as sent to the backend.
///
/// Materialized at send time; later appends to the conversation do not
/// change an existing window.
#[derive(Debug, Clone, Default)]
pub struct ContextWindow {
    messages: VecDeque<Message>,
    max_messages: usize,
}

impl ContextWindow {
    pub fn new(max_messages: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages,
        }
    }

    pub fn from_messages(messages: &[Message], max_messages: usize) -> Self {
        let mut window = Self::new(max_messages);
        for message in messages {
            window.push(message.clone());
        }
        window
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        self.trim_if_needed();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Wire form, oldest first.
    pub fn to_history(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .map(|m| HistoryEntry {
                role: m.sender.into(),
                content: m.text.clone(),
            })
            .collect()
    }

    fn trim_if_needed(&mut self) {
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
    }
}
