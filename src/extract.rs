//! Scalar field extraction from loosely shaped feed items.
use serde_json::Value;

use crate::feed::FeedItem;
use crate::model::{now_iso, parse_instant, to_iso};

pub const DEFAULT_DURATION: &str = "00:00:00";

const TITLE_KEYS: &[&str] = &["title", "itunes:title"];
const DESCRIPTION_KEYS: &[&str] = &["description", "content:encoded", "itunes:summary"];
const ENCLOSURE_KEYS: &[&str] = &["enclosure", "media:content"];
const PUBDATE_KEYS: &[&str] = &["pubDate", "dc:date"];
const DURATION_KEYS: &[&str] = &["itunes:duration"];
const EPISODE_KEYS: &[&str] = &["itunes:episode"];

/// Normalized strings pulled out of one feed item. Every field is trimmed;
/// absent optional fields are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFields {
    pub title: String,
    pub description: String,
    pub audio_url: String,
    /// ISO-8601 when the feed value parsed, the raw text when it did not,
    /// and the current instant when the item had no date at all.
    pub publish_date: String,
    pub duration: String,
    pub episode_hint: String,
}

impl ExtractedFields {
    /// An item without a title or an audio URL cannot become an episode.
    pub fn is_usable(&self) -> bool {
        !self.title.is_empty() && !self.audio_url.is_empty()
    }
}

/// Look up a key exactly, then ignoring ASCII case.
fn lookup<'a>(item: &'a FeedItem, key: &str) -> Option<&'a Value> {
    let fields = item.fields();
    fields.get(key).or_else(|| {
        fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// Text content of a node: plain strings, numbers, `#text` of an element
/// with attributes, or the first usable entry of a repeated element.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("#text").and_then(text_of),
        Value::Array(items) => items.iter().filter_map(text_of).find(|s| !s.is_empty()),
        _ => None,
    }
}

/// Attribute of a node, stored either plainly (`url`) or prefixed (`@_url`).
fn attr_of(value: &Value, name: &str) -> Option<String> {
    match value {
        Value::Object(map) => map
            .get(name)
            .or_else(|| map.get(&format!("@_{}", name)))
            .and_then(text_of),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| attr_of(v, name))
            .find(|s| !s.is_empty()),
        _ => None,
    }
}

fn first_text(item: &FeedItem, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| lookup(item, k))
        .filter_map(text_of)
        .find(|s| !s.is_empty())
}

fn first_attr(item: &FeedItem, keys: &[&str], attr: &str) -> Option<String> {
    keys.iter()
        .filter_map(|k| lookup(item, k))
        .filter_map(|v| attr_of(v, attr))
        .find(|s| !s.is_empty())
}

/// Pull the episode fields out of a raw item. Never fails; use
/// [`ExtractedFields::is_usable`] to decide whether to keep going.
pub fn extract_fields(item: &FeedItem) -> ExtractedFields {
    let publish_date = match first_text(item, PUBDATE_KEYS) {
        Some(raw) => parse_instant(&raw).map(to_iso).unwrap_or(raw),
        None => now_iso(),
    };

    ExtractedFields {
        title: first_text(item, TITLE_KEYS).unwrap_or_default(),
        description: first_text(item, DESCRIPTION_KEYS).unwrap_or_default(),
        audio_url: first_attr(item, ENCLOSURE_KEYS, "url").unwrap_or_default(),
        publish_date,
        duration: first_text(item, DURATION_KEYS).unwrap_or_else(|| DEFAULT_DURATION.to_string()),
        episode_hint: first_text(item, EPISODE_KEYS).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(v: Value) -> FeedItem {
        FeedItem::from_value(v).unwrap()
    }

    #[test]
    fn extracts_attribute_style_enclosure() {
        let fields = extract_fields(&item(json!({
            "title": "  194. La inteligencia artificial ",
            "description": "Hola",
            "enclosure": { "@_url": " https://x/ep194.mp3 ", "@_type": "audio/mpeg" },
            "pubDate": "Mon, 01 Jan 2024 10:00:00 GMT",
            "itunes:duration": "00:25:10",
            "itunes:episode": 194
        })));
        assert_eq!(fields.title, "194. La inteligencia artificial");
        assert_eq!(fields.audio_url, "https://x/ep194.mp3");
        assert_eq!(fields.publish_date, "2024-01-01T10:00:00.000Z");
        assert_eq!(fields.duration, "00:25:10");
        assert_eq!(fields.episode_hint, "194");
        assert!(fields.is_usable());
    }

    #[test]
    fn extracts_plain_enclosure_and_odd_casing() {
        let fields = extract_fields(&item(json!({
            "Title": "Intro",
            "Enclosure": { "url": "https://x/intro.mp3" },
            "pubdate": "2024-01-01"
        })));
        assert_eq!(fields.title, "Intro");
        assert_eq!(fields.audio_url, "https://x/intro.mp3");
        assert_eq!(fields.publish_date, "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn defaults_for_missing_optional_fields() {
        let fields = extract_fields(&item(json!({
            "title": "X",
            "enclosure": { "@_url": "https://x/x.mp3" }
        })));
        assert_eq!(fields.description, "");
        assert_eq!(fields.duration, DEFAULT_DURATION);
        assert_eq!(fields.episode_hint, "");
        assert!(parse_instant(&fields.publish_date).is_some());
    }

    #[test]
    fn unparsable_date_is_kept_raw() {
        let fields = extract_fields(&item(json!({
            "title": "X",
            "enclosure": { "@_url": "https://x/x.mp3" },
            "pubDate": "sometime soon"
        })));
        assert_eq!(fields.publish_date, "sometime soon");
    }

    #[test]
    fn missing_title_or_audio_is_unusable() {
        assert!(!extract_fields(&item(json!({ "enclosure": { "@_url": "https://x/a.mp3" } }))).is_usable());
        assert!(!extract_fields(&item(json!({ "title": "A" }))).is_usable());
        assert!(!extract_fields(&item(json!({ "title": "   ", "enclosure": { "@_url": "https://x/a.mp3" } }))).is_usable());
        assert!(!extract_fields(&item(json!({ "title": "A", "enclosure": "" }))).is_usable());
    }

    #[test]
    fn text_next_to_attributes_is_read() {
        let fields = extract_fields(&item(json!({
            "title": { "@_lang": "es", "#text": "Con atributos" },
            "enclosure": [{ "@_url": "" }, { "@_url": "https://x/b.mp3" }]
        })));
        assert_eq!(fields.title, "Con atributos");
        assert_eq!(fields.audio_url, "https://x/b.mp3");
    }
}
