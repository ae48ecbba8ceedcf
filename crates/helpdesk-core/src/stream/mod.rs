mod client;
mod decoder;

pub use client::{AnswerClient, ByteStream, ChatRequest, HistoryEntry, HttpAnswerClient, Role};
pub use decoder::{decode_stream, parse_line, SseDecoder, StreamEvent};
