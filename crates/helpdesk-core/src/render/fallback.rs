use crate::constants::render::{EXTERNAL_ICON, EXTERNAL_REL, LINK_CLASS};
use regex::{Captures, Regex};
use std::sync::OnceLock;

struct Rules {
    h3: Regex,
    h2: Regex,
    h1: Regex,
    bold_star: Regex,
    bold_underscore: Regex,
    em_star: Regex,
    em_underscore: Regex,
    code_block: Regex,
    code_span: Regex,
    link: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        h3: Regex::new(r"(?m)^### (.*)$").unwrap(),
        h2: Regex::new(r"(?m)^## (.*)$").unwrap(),
        h1: Regex::new(r"(?m)^# (.*)$").unwrap(),
        bold_star: Regex::new(r"\*\*(.*?)\*\*").unwrap(),
        bold_underscore: Regex::new(r"__(.*?)__").unwrap(),
        em_star: Regex::new(r"\*(.*?)\*").unwrap(),
        em_underscore: Regex::new(r"_(.*?)_").unwrap(),
        code_block: Regex::new(r"(?s)```(.*?)```").unwrap(),
        code_span: Regex::new(r"`(.*?)`").unwrap(),
        link: Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap(),
    })
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

fn safe_href(href: &str) -> bool {
    match href.split_once(':') {
        Some((scheme, _)) if !scheme.contains('/') => {
            matches!(scheme.to_ascii_lowercase().as_str(), "http" | "https" | "mailto" | "tel")
        }
        _ => true,
    }
}

/// Minimal formatter used when the markdown pipeline cannot run.
///
/// Input is escaped before any tag is produced, so angle brackets in the
/// input can never become structure.
pub fn format(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let r = rules();
    let html = escape_html(text);
    let html = r.h3.replace_all(&html, "<h3>${1}</h3>");
    let html = r.h2.replace_all(&html, "<h2>${1}</h2>");
    let html = r.h1.replace_all(&html, "<h1>${1}</h1>");
    let html = r.bold_star.replace_all(&html, "<strong>${1}</strong>");
    let html = r.bold_underscore.replace_all(&html, "<strong>${1}</strong>");
    let html = r.em_star.replace_all(&html, "<em>${1}</em>");
    let html = r.em_underscore.replace_all(&html, "<em>${1}</em>");
    let html = r.code_block.replace_all(&html, "<pre><code>${1}</code></pre>");
    let html = r.code_span.replace_all(&html, "<code>${1}</code>");
    let html = r.link.replace_all(&html, |caps: &Captures| {
        let (label, href) = (&caps[1], &caps[2]);
        if safe_href(href) {
            format!(
                r#"<a href="{href}" target="_blank" rel="{EXTERNAL_REL}" class="{LINK_CLASS}">{label} <i class="{EXTERNAL_ICON}"></i></a>"#
            )
        } else {
            label.to_string()
        }
    });

    html.split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| {
            if block.starts_with("<h") || block.starts_with("<pre") {
                block.to_string()
            } else {
                format!("<p>{}</p>", block.replace('\n', "<br>"))
            }
        })
        .collect()
}
