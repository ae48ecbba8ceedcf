//! Helpdesk chat: centralized constants.
//! Limits, storage keys and user-facing strings live here.

// ─── API ──────────────────────────────────────────────────────────────────────

pub mod api {
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
    pub const STREAM_PATH: &str = "/api/chat/stream";
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    /// Prefix of every event line in the answer stream.
    pub const DATA_PREFIX: &str = "data: ";
}

// ─── Chat ─────────────────────────────────────────────────────────────────────

pub mod chat {
    /// Messages sent to the backend as conversational memory.
    pub const MAX_HISTORY_LENGTH: usize = 10;
    pub const TYPING_DELAY_MS: u64 = 800;
    pub const TITLE_MAX_CHARS: usize = 30;
    pub const PREVIEW_MAX_CHARS: usize = 40;
    pub const NEW_CHAT_TITLE: &str = "New chat";
    pub const EMPTY_PREVIEW: &str = "No messages yet";
}

// ─── Messages ─────────────────────────────────────────────────────────────────

pub mod messages {
    pub const TRANSPORT_FAILURE: &str =
        "Unable to reach the server. Please check your internet connection and try again.";
    pub const UNKNOWN_ERROR: &str = "Unknown error";
    pub const ERROR_PREFIX: &str = "Error: ";
}

// ─── Storage ──────────────────────────────────────────────────────────────────

pub mod storage {
    pub const CONVERSATIONS_KEY: &str = "chatbot_conversations";
    pub const ACTIVE_CONVERSATION_KEY: &str = "chatbot_current_conversation";
    pub const APP_DIR: &str = "helpdesk";
    pub const CONFIG_FILE: &str = "config.toml";
}

// ─── Rendering ────────────────────────────────────────────────────────────────

pub mod render {
    /// Inputs above this size skip the markdown parser.
    pub const MAX_INPUT_BYTES: usize = 256 * 1024;

    pub const LINK_CLASS: &str = "chat-link";
    pub const PHONE_CLASS: &str = "phone-link";
    pub const EMAIL_CLASS: &str = "email-link";
    pub const EXTERNAL_CLASS: &str = "external-link";
    pub const PHONE_ICON: &str = "fas fa-phone";
    pub const EMAIL_ICON: &str = "fas fa-envelope";
    pub const EXTERNAL_ICON: &str = "fas fa-external-link-alt";
    pub const EXTERNAL_REL: &str = "noopener noreferrer";

    pub const ALLOWED_TAGS: &[&str] = &[
        "h1", "h2", "h3", "h4", "h5", "h6", "p", "br", "hr", "strong", "em", "u", "s", "del",
        "mark", "i", "a", "code", "pre", "ul", "ol", "li", "table", "thead", "tbody", "tr", "th",
        "td", "blockquote", "div", "span", "img",
    ];

    pub const ALLOWED_ATTRIBUTES: &[&str] =
        &["href", "title", "target", "rel", "class", "src", "alt", "loading"];
}

// ─── Support ──────────────────────────────────────────────────────────────────

pub mod support {
    pub const HOTLINE: &str = "18001096";
    pub const EMAIL: &str = "support@example.com";
    pub const WEBSITE: &str = "https://example.com";
}
