use serde_json::{Map, Value};

use crate::store::Message;

/// A message paired with the markup it is displayed as.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub message: Message,
    pub markup: String,
}

/// Presentation surface driven by [`super::SessionController`].
///
/// The controller only calls the message and stream hooks for the
/// conversation that is active at the time of the call. All hooks default to
/// doing nothing.
pub trait ChatView: Send + Sync {
    /// A conversation became active and should replace what is on screen.
    fn conversation_shown(&self, _conversation_id: &str, _title: &str, _messages: &[RenderedMessage]) {}

    fn message_shown(&self, _conversation_id: &str, _message: &RenderedMessage) {}

    /// The typing indicator for a pending answer.
    fn typing_started(&self, _conversation_id: &str) {}

    /// Replace the in-progress answer. `text` is the answer received so far
    /// and `markup` its rendering.
    fn stream_updated(&self, _conversation_id: &str, _text: &str, _markup: &str) {}

    /// Drop the in-progress answer and typing indicator.
    fn stream_cleared(&self, _conversation_id: &str) {}

    /// Metadata frames are a hint to re-check the scroll position.
    fn metadata_received(&self, _conversation_id: &str, _fields: &Map<String, Value>) {}
}

/// A view that shows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl ChatView for NullView {}
