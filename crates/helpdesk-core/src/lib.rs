pub mod config;
pub mod constants;
pub mod error;
pub mod render;
pub mod session;
pub mod store;
pub mod stream;

// Re-export key types
pub use config::Settings;
pub use error::{ChatError, Result};
pub use render::TextRenderer;
pub use session::{ChatView, NullView, RenderedMessage, SendOutcome, SessionController};
pub use store::{
    ContextWindow, Conversation, ConversationStore, ConversationSummary, FileStorage,
    KeyValueStorage, MemoryStorage, Message, Sender,
};
pub use stream::{
    decode_stream, AnswerClient, ByteStream, ChatRequest, HistoryEntry, HttpAnswerClient, Role,
    SseDecoder, StreamEvent,
};
