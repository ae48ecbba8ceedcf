//! Untrusted answer text to safe, annotated markup.
//!
//! Stages: markdown to HTML (comrak), allow-list sanitization (ammonia), then
//! link decoration and contact annotation. The fallback formatter covers the
//! cases where the markdown stage cannot run.

mod enhance;
mod fallback;
mod sanitize;

pub use enhance::{annotate_contacts, enhance, is_external, EnhanceOptions};
pub use fallback::{escape_html, format as fallback_format};
pub use sanitize::sanitize;

use crate::config::RenderSettings;
use comrak::nodes::{AstNode, NodeValue};
use std::panic::{self, AssertUnwindSafe};

#[derive(Debug, Clone)]
pub struct TextRenderer {
    settings: RenderSettings,
}

impl TextRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    fn enhance_options(&self) -> EnhanceOptions {
        EnhanceOptions {
            phones: self.settings.link_enhancement && self.settings.phone_auto_detect,
            emails: self.settings.link_enhancement && self.settings.email_auto_detect,
        }
    }

    /// Render raw text to sanitized markup. Never fails: oversized input or a
    /// failing markdown stage falls back to the escaping formatter.
    pub fn render(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        if !self.settings.markdown_support {
            return fallback::format(raw);
        }
        if raw.len() > self.settings.max_input_bytes {
            tracing::debug!(
                "Input of {} bytes exceeds render limit, using fallback formatter",
                raw.len()
            );
            return fallback::format(raw);
        }

        match panic::catch_unwind(AssertUnwindSafe(|| self.render_markdown(raw))) {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => {
                tracing::error!("Markdown output failed: {e}, using fallback formatter");
                fallback::format(raw)
            }
            Err(_) => {
                tracing::error!("Markdown rendering failed, using fallback formatter");
                fallback::format(raw)
            }
        }
    }

    fn render_markdown(&self, raw: &str) -> std::io::Result<String> {
        let mut options = comrak::Options::default();
        options.extension.strikethrough = true;
        options.extension.table = true;
        options.extension.autolink = self.settings.link_enhancement;
        // Single newlines in answers are meant as line breaks.
        options.render.hardbreaks = true;
        // Raw HTML is passed through to the sanitizer, which owns the allow-list.
        options.render.unsafe_ = true;

        let arena = comrak::Arena::new();
        let root = comrak::parse_document(&arena, raw, &options);
        unwrap_links_in_raw_anchors(root);
        let mut html = Vec::new();
        comrak::format_html(root, &options, &mut html)?;

        let clean = sanitize(&String::from_utf8_lossy(&html));
        Ok(enhance(&clean, self.enhance_options()))
    }
}

/// +1 for a raw `<a ...>` tag, -1 for `</a>`.
fn raw_anchor_delta(html: &str) -> i32 {
    let tag = html.trim_start().to_ascii_lowercase();
    let (delta, rest) = match tag.strip_prefix("</a") {
        Some(rest) => (-1, rest),
        None => match tag.strip_prefix("<a") {
            Some(rest) => (1, rest),
            None => return 0,
        },
    };
    if rest.starts_with('>') || rest.starts_with(char::is_whitespace) {
        delta
    } else {
        0
    }
}

/// Replace link nodes that sit between a raw `<a ...>` and its `</a>` with
/// their children. Nested anchors would otherwise be split apart by the
/// sanitizer, and already rendered markup would gain a second link.
fn unwrap_links_in_raw_anchors<'a>(root: &'a AstNode<'a>) {
    let mut depth = 0;
    let mut nested = Vec::new();
    for node in root.descendants() {
        let data = node.data.borrow();
        match &data.value {
            NodeValue::HtmlInline(html) => depth = (depth + raw_anchor_delta(html)).max(0),
            NodeValue::Link(_) if depth > 0 => nested.push(node),
            other if other.block() => depth = 0,
            _ => {}
        }
    }
    for link in nested {
        let children: Vec<_> = link.children().collect();
        for child in children {
            link.insert_before(child);
        }
        link.detach();
    }
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new(RenderSettings::default())
    }
}
