//! Link and contact annotation over sanitized markup.
//!
//! The pass walks the markup as a flat token sequence. Whether the scanner is
//! inside an anchor or inside code is tracked as state, and text is only
//! annotated outside both, which keeps the pass idempotent.

use crate::constants::render::*;
use regex::Regex;
use std::sync::OnceLock;

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\+84|0)([0-9]{9,10})(?-u:\b)").unwrap())
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?-u:\b)([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})(?-u:\b)").unwrap()
    })
}

#[derive(Debug, Clone, Copy)]
pub struct EnhanceOptions {
    pub phones: bool,
    pub emails: bool,
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    Text(&'a str),
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End(String),
    /// Comments, doctypes and anything else passed through verbatim.
    Raw(&'a str),
}

/// Find the `>` closing a tag that starts at `from`, skipping quoted values.
fn tag_end(html: &str, from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, b) in html.as_bytes()[from..].iter().enumerate() {
        match (quote, *b) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(*b),
            (None, b'>') => return Some(from + i),
            _ => {}
        }
    }
    None
}

fn parse_attrs(src: &str) -> Vec<(String, String)> {
    let bytes = src.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' && bytes[i] != b'/' {
            i += 1;
        }
        if name_start == i {
            break;
        }
        let name = src[name_start..i].to_ascii_lowercase();
        let mut value = String::new();
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                let q = bytes[i];
                let start = i + 1;
                let end = bytes[start..]
                    .iter()
                    .position(|b| *b == q)
                    .map(|p| start + p)
                    .unwrap_or(bytes.len());
                value = src[start..end].to_string();
                i = (end + 1).min(bytes.len());
            } else {
                let start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                value = src[start..i].to_string();
            }
        }
        attrs.push((name, value));
    }
    attrs
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < html.len() {
        let Some(lt) = html[pos..].find('<').map(|p| pos + p) else {
            tokens.push(Token::Text(&html[pos..]));
            break;
        };
        if lt > pos {
            tokens.push(Token::Text(&html[pos..lt]));
        }
        let Some(gt) = tag_end(html, lt + 1) else {
            tokens.push(Token::Text(&html[lt..]));
            break;
        };
        let inner = &html[lt + 1..gt];
        if let Some(name) = inner.strip_prefix('/') {
            tokens.push(Token::End(name.trim().to_ascii_lowercase()));
        } else if inner.starts_with('!') || inner.starts_with('?') || inner.is_empty() {
            tokens.push(Token::Raw(&html[lt..=gt]));
        } else {
            let name_len = inner
                .find(|c: char| c.is_ascii_whitespace() || c == '/')
                .unwrap_or(inner.len());
            tokens.push(Token::Start {
                name: inner[..name_len].to_ascii_lowercase(),
                attrs: parse_attrs(&inner[name_len..]),
                self_closing: inner.ends_with('/'),
            });
        }
        pos = gt + 1;
    }
    tokens
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
}

fn set_attr(attrs: &mut Vec<(String, String)>, name: &str, value: impl Into<String>) {
    let value = value.into();
    match attrs.iter_mut().find(|(n, _)| n == name) {
        Some(slot) => slot.1 = value,
        None => attrs.push((name.to_string(), value)),
    }
}

fn set_default_attr(attrs: &mut Vec<(String, String)>, name: &str, value: &str) {
    if attr(attrs, name).is_none() {
        attrs.push((name.to_string(), value.to_string()));
    }
}

fn has_class(attrs: &[(String, String)], class: &str) -> bool {
    attr(attrs, "class")
        .map(|c| c.split_ascii_whitespace().any(|c| c == class))
        .unwrap_or(false)
}

fn add_classes(attrs: &mut Vec<(String, String)>, classes: &[&str]) {
    let mut value = attr(attrs, "class").unwrap_or("").trim().to_string();
    for class in classes {
        if !value.split_ascii_whitespace().any(|c| c == *class) {
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(class);
        }
    }
    set_attr(attrs, "class", value);
}

pub fn is_external(href: &str) -> bool {
    href.starts_with("http") || href.starts_with("www.") || href.starts_with("//")
}

fn icon(class: &str) -> String {
    format!(r#"<i class="{class}"></i>"#)
}

fn write_start(out: &mut String, name: &str, attrs: &[(String, String)], self_closing: bool) {
    out.push('<');
    out.push_str(name);
    for (n, v) in attrs {
        out.push(' ');
        out.push_str(n);
        out.push_str("=\"");
        out.push_str(v);
        out.push('"');
    }
    if self_closing {
        out.push_str(" /");
    }
    out.push('>');
}

/// What an anchor needs around its content once decorated.
#[derive(Debug, Default)]
struct AnchorDecoration {
    leading_icon: Option<&'static str>,
    trailing_icon: bool,
}

/// Classes and safety attributes are applied to every anchor. Icons are only
/// added to anchors that do not carry `chat-link` yet, so a second pass
/// leaves decorated markup unchanged.
fn decorate_anchor(attrs: &mut Vec<(String, String)>) -> AnchorDecoration {
    let decorated = has_class(attrs, LINK_CLASS);
    let href = attr(attrs, "href").unwrap_or("").to_string();

    let decoration = if href.starts_with("tel:") {
        add_classes(attrs, &[LINK_CLASS, PHONE_CLASS]);
        AnchorDecoration {
            leading_icon: Some(PHONE_ICON),
            trailing_icon: false,
        }
    } else if href.starts_with("mailto:") {
        add_classes(attrs, &[LINK_CLASS, EMAIL_CLASS]);
        AnchorDecoration {
            leading_icon: Some(EMAIL_ICON),
            trailing_icon: false,
        }
    } else if is_external(&href) {
        if href.starts_with("www.") {
            set_attr(attrs, "href", format!("https://{href}"));
        }
        add_classes(attrs, &[LINK_CLASS, EXTERNAL_CLASS]);
        set_attr(attrs, "target", "_blank");
        set_attr(attrs, "rel", EXTERNAL_REL);
        AnchorDecoration {
            leading_icon: None,
            trailing_icon: true,
        }
    } else {
        add_classes(attrs, &[LINK_CLASS]);
        AnchorDecoration::default()
    };

    if decorated {
        AnchorDecoration::default()
    } else {
        decoration
    }
}

/// Bare `www.` addresses are autolinked as `http://www.…`; serve them over https.
fn upgrade_bare_www(attrs: &mut Vec<(String, String)>, text: &str) {
    let autolinked = text.starts_with("www.")
        && attr(attrs, "href")
            .and_then(|href| href.strip_prefix("http://"))
            .is_some_and(|rest| rest == text);
    if autolinked {
        set_attr(attrs, "href", format!("https://{text}"));
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Contact {
    Phone,
    Email,
}

fn contact_link(kind: Contact, value: &str) -> String {
    let (scheme, class, icon_class) = match kind {
        Contact::Phone => ("tel", PHONE_CLASS, PHONE_ICON),
        Contact::Email => ("mailto", EMAIL_CLASS, EMAIL_ICON),
    };
    format!(
        r#"<a href="{scheme}:{value}" class="{LINK_CLASS} {class}">{} {value}</a>"#,
        icon(icon_class)
    )
}

/// Wrap phone numbers, then email addresses, found in a text run.
pub fn annotate_contacts(text: &str, options: EnhanceOptions) -> String {
    let mut spans: Vec<(usize, usize, Contact)> = Vec::new();
    if options.phones {
        spans.extend(
            phone_regex()
                .find_iter(text)
                .map(|m| (m.start(), m.end(), Contact::Phone)),
        );
    }
    if options.emails {
        for m in email_regex().find_iter(text) {
            let overlaps = spans.iter().any(|(s, e, _)| m.start() < *e && *s < m.end());
            if !overlaps {
                spans.push((m.start(), m.end(), Contact::Email));
            }
        }
    }
    if spans.is_empty() {
        return text.to_string();
    }
    spans.sort_by_key(|(start, _, _)| *start);

    let mut out = String::with_capacity(text.len() * 2);
    let mut cursor = 0;
    for (start, end, kind) in spans {
        out.push_str(&text[cursor..start]);
        out.push_str(&contact_link(kind, &text[start..end]));
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Decorate links and presentational elements, and annotate contacts in
/// text that is not inside an anchor or code.
pub fn enhance(html: &str, options: EnhanceOptions) -> String {
    let mut out = String::with_capacity(html.len() + html.len() / 4);
    let mut anchors: Vec<bool> = Vec::new();
    let mut code_depth = 0usize;

    let mut tokens = tokenize(html).into_iter().peekable();
    while let Some(token) = tokens.next() {
        match token {
            Token::Text(text) => {
                if anchors.is_empty() && code_depth == 0 && (options.phones || options.emails) {
                    out.push_str(&annotate_contacts(text, options));
                } else {
                    out.push_str(text);
                }
            }
            Token::Raw(raw) => out.push_str(raw),
            Token::Start {
                name,
                mut attrs,
                self_closing,
            } => match name.as_str() {
                "a" => {
                    if let Some(Token::Text(text)) = tokens.peek() {
                        upgrade_bare_www(&mut attrs, text);
                    }
                    let decoration = decorate_anchor(&mut attrs);
                    write_start(&mut out, &name, &attrs, self_closing);
                    if let Some(class) = decoration.leading_icon {
                        out.push_str(&icon(class));
                        out.push(' ');
                    }
                    if !self_closing {
                        anchors.push(decoration.trailing_icon);
                    }
                }
                "code" | "pre" => {
                    code_depth += 1;
                    write_start(&mut out, &name, &attrs, self_closing);
                }
                "img" => {
                    set_default_attr(&mut attrs, "class", "markdown-image");
                    set_default_attr(&mut attrs, "loading", "lazy");
                    write_start(&mut out, &name, &attrs, self_closing);
                }
                "table" | "blockquote" | "hr" => {
                    set_default_attr(&mut attrs, "class", &format!("markdown-{name}"));
                    write_start(&mut out, &name, &attrs, self_closing);
                }
                _ => write_start(&mut out, &name, &attrs, self_closing),
            },
            Token::End(name) => {
                match name.as_str() {
                    "a" => {
                        if anchors.pop() == Some(true) {
                            out.push(' ');
                            out.push_str(&icon(EXTERNAL_ICON));
                        }
                    }
                    "code" | "pre" => code_depth = code_depth.saturating_sub(1),
                    _ => {}
                }
                out.push_str("</");
                out.push_str(&name);
                out.push('>');
            }
        }
    }
    out
}
