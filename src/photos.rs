//! Photo-list normalization.
//!
//! Product photo lists reach the console in several shapes depending on how
//! the record was last written: a JSON array, a JSON-encoded string, or
//! free text with newline/comma separators. Everything funnels through
//! [`normalize_photos`] into one canonical ordered list of trimmed URLs.

use serde_json::Value;

/// Canonical photo list from any wire representation. Total: malformed
/// input degrades to an empty list, never an error.
pub fn normalize_photos(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => collect_items(items),
        Value::String(text) => normalize_photo_text(text),
        other => normalize_photo_text(&scalar_text(other)),
    }
}

/// Canonical photo list from the free-text editing view. A leading `[` is
/// treated as an attempted JSON array; on parse failure the text falls back
/// to delimiter splitting.
pub fn normalize_photo_text(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.starts_with('[')
        && let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed)
    {
        return collect_items(&items);
    }

    trimmed
        .split(['\n', ','])
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Newline-joined rendering shown in the free-text editor.
pub fn photos_to_text(photos: &[String]) -> String {
    photos.join("\n")
}

fn collect_items(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .map(|item| scalar_text(item).trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
