//! Comment widget helpers: discussion terms, labels, and the status
//! messages the widget posts back to the page.

use serde_json::Value;
use url::Url;

use crate::github_url::decode_uri_component;
use crate::slug::slugify;
use crate::viewer::ViewerPageType;

pub const GISCUS_ORIGIN: &str = "https://giscus.app";

const UNTITLED: &str = "未命名";
const MAX_LABEL_SLUG_CHARS: usize = 45;
const SOURCE_HASH_CHARS: usize = 8;

/// A readable message from whatever the widget reported as its error.
#[must_use]
pub fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.trim().to_string(),
        Value::Object(fields) => match fields.get("message") {
            Some(Value::String(message)) => message.trim().to_string(),
            _ => error.to_string(),
        },
        other => other.to_string(),
    }
}

#[must_use]
pub fn is_discussion_not_found(message: &str) -> bool {
    message.to_lowercase().contains("discussion not found")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiscusEvent {
    Loaded,
    /// No discussion exists yet for this term; the first comment creates it.
    DiscussionMissing,
    Failed { message: String },
}

/// Classify a `message` event posted by the widget frame. Events from other
/// origins, or without a `giscus` payload, are not ours.
#[must_use]
pub fn classify_message(origin: &str, data: &Value) -> Option<GiscusEvent> {
    if origin != GISCUS_ORIGIN {
        return None;
    }
    let payload = data.get("giscus").filter(|payload| is_truthy(payload))?;
    let Some(error) = payload.get("error").filter(|error| is_truthy(error)) else {
        return Some(GiscusEvent::Loaded);
    };
    let message = error_message(error);
    if is_discussion_not_found(&message) {
        return Some(GiscusEvent::DiscussionMissing);
    }
    Some(GiscusEvent::Failed { message })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Discussion lookup term and labels for one viewer page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscussionTerm {
    pub term: String,
    pub labels: String,
}

#[must_use]
pub fn discussion_term(
    page_type: ViewerPageType,
    title: Option<&str>,
    source_url: Option<&str>,
) -> DiscussionTerm {
    let page_label = page_type.route().trim_start_matches('/');
    let source_url = source_url.filter(|url| !url.is_empty());

    let fallback = source_url.map(title_from_url).unwrap_or_default();
    let title = title
        .filter(|title| !title.is_empty())
        .or_else(|| Some(fallback.as_str()).filter(|title| !title.is_empty()))
        .unwrap_or(UNTITLED)
        .trim();

    let term = match source_url {
        Some(url) => {
            let hash = source_hash(url);
            let short = hash.get(..SOURCE_HASH_CHARS).unwrap_or(&hash);
            format!("{page_label} | {title} #{short}")
        }
        None => format!("{page_label} | {title}"),
    };

    let slug = slugify(title)
        .chars()
        .take(MAX_LABEL_SLUG_CHARS)
        .collect::<String>();
    let labels = if slug.is_empty() {
        page_label.to_string()
    } else {
        format!("{page_label},{slug}")
    };
    DiscussionTerm { term, labels }
}

/// File name without a `.pdf`/`.md` extension, or empty.
#[must_use]
pub fn title_from_url(url: &str) -> String {
    let Some(decoded) = decode_uri_component(url) else {
        return String::new();
    };
    let Ok(parsed) = Url::parse(&decoded) else {
        return String::new();
    };
    let segment = parsed.path().rsplit('/').next().unwrap_or_default();
    let name = decode_uri_component(segment).unwrap_or_else(|| segment.to_string());
    let lower = name.to_ascii_lowercase();
    [".pdf", ".md"]
        .iter()
        .find(|extension| lower.ends_with(*extension))
        .map_or(name.as_str(), |extension| &name[..name.len() - extension.len()])
        .to_string()
}

/// 31-multiplier string hash over UTF-16 units, rendered in base 36.
#[must_use]
pub fn source_hash(value: &str) -> String {
    let hash = value.encode_utf16().fold(0_u32, |hash, unit| {
        hash.wrapping_mul(31).wrapping_add(u32::from(unit))
    });
    to_base36(hash)
}

fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(char::from(DIGITS[(value % 36) as usize]));
        value /= 36;
    }
    digits.iter().rev().collect()
}
