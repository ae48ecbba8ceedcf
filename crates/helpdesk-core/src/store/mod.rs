mod context;
mod conversations;
mod model;
mod storage;

pub use context::ContextWindow;
pub use conversations::ConversationStore;
pub use model::{time_ago, truncate_chars, Conversation, ConversationSummary, Message, Sender};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
