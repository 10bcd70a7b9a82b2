//! RSS text to loose item records.
//!
//! The document is folded into a JSON tree: an element with only text becomes
//! a string, anything with attributes or children becomes an object, and
//! repeated siblings collapse into an array.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use super::{FeedError, FeedItem};

struct Frame {
    name: String,
    map: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, FeedError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut map = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| FeedError::Xml(e.to_string()))?;
            let key = format!("@_{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr
                .unescape_value()
                .map_err(|e| FeedError::Xml(e.to_string()))?
                .into_owned();
            map.insert(key, Value::String(value));
        }
        Ok(Self {
            name,
            map,
            text: String::new(),
        })
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();
        if self.map.is_empty() {
            return Value::String(text.to_string());
        }
        let mut map = self.map;
        if !text.is_empty() {
            map.insert("#text".to_string(), Value::String(text.to_string()));
        }
        Value::Object(map)
    }
}

fn insert_child(map: &mut Map<String, Value>, name: String, value: Value) {
    match map.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(name, value);
        }
    }
}

fn close(stack: &mut [Frame], frame: Frame) -> Result<(), FeedError> {
    let parent = stack
        .last_mut()
        .ok_or_else(|| FeedError::Xml("unbalanced closing tag".into()))?;
    let name = frame.name.clone();
    insert_child(&mut parent.map, name, frame.into_value());
    Ok(())
}

/// Parse a whole XML document into a JSON object keyed by the root element.
pub fn parse_document(text: &str) -> Result<Map<String, Value>, FeedError> {
    let mut reader = Reader::from_str(text);
    let mut stack = vec![Frame {
        name: String::new(),
        map: Map::new(),
        text: String::new(),
    }];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(Frame::open(&e)?),
            Ok(Event::Empty(e)) => {
                let frame = Frame::open(&e)?;
                close(&mut stack, frame)?;
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(FeedError::Xml("unbalanced closing tag".into()));
                }
                if let Some(frame) = stack.pop() {
                    close(&mut stack, frame)?;
                }
            }
            Ok(Event::Text(e)) => {
                let text = match e.unescape() {
                    Ok(t) => t.into_owned(),
                    // Undeclared HTML entities are common in descriptions; keep them verbatim.
                    Err(_) => String::from_utf8_lossy(&e).into_owned(),
                };
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FeedError::Xml(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(FeedError::Xml("unexpected end of document".into()));
    }
    Ok(stack.pop().map(|root| root.map).unwrap_or_default())
}

/// Parse RSS text into its items. A lone `<item>` yields a one-element list.
pub fn parse_feed(text: &str) -> Result<Vec<FeedItem>, FeedError> {
    let root = parse_document(text)?;
    let channel = root
        .get("rss")
        .and_then(|rss| rss.get("channel"))
        .filter(|channel| channel.is_object())
        .ok_or(FeedError::MissingChannel)?;

    let items = match channel.get("item") {
        Some(Value::Array(items)) => items.clone(),
        Some(item) => vec![item.clone()],
        None => Vec::new(),
    };
    Ok(items.into_iter().filter_map(FeedItem::from_value).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Podcast</title>
    <item>
      <title>194. La inteligencia artificial</title>
      <description><![CDATA[<p>Notas: <a href="https://docs.google.com/document/d/ABC">doc</a></p>]]></description>
      <enclosure url="https://x/ep194.mp3" length="123" type="audio/mpeg"/>
      <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
      <itunes:duration>00:25:10</itunes:duration>
      <itunes:episode>194</itunes:episode>
    </item>
    <item>
      <title>193. Los viajes &amp; las vacaciones</title>
      <enclosure url="https://x/ep193.mp3"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn items_keep_prefixes_and_attributes() {
        let items = parse_feed(FEED).unwrap();
        assert_eq!(items.len(), 2);
        let first = items[0].fields();
        assert_eq!(first["title"], "194. La inteligencia artificial");
        assert_eq!(first["enclosure"]["@_url"], "https://x/ep194.mp3");
        assert_eq!(first["itunes:episode"], "194");
        assert!(first["description"]
            .as_str()
            .unwrap()
            .contains("https://docs.google.com/document/d/ABC"));
        assert_eq!(items[1].fields()["title"], "193. Los viajes & las vacaciones");
    }

    #[test]
    fn single_item_becomes_one_element_list() {
        let xml = r#"<rss><channel><item><title>Solo</title></item></channel></rss>"#;
        let items = parse_feed(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].fields()["title"], "Solo");
    }

    #[test]
    fn channel_without_items_is_empty() {
        let xml = r#"<rss><channel><title>Empty</title></channel></rss>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn text_next_to_attributes_lands_under_text_key() {
        let xml = r#"<rss><channel><item><guid isPermaLink="false">abc-1</guid></item></channel></rss>"#;
        let items = parse_feed(xml).unwrap();
        assert_eq!(items[0].fields()["guid"]["#text"], "abc-1");
        assert_eq!(items[0].fields()["guid"]["@_isPermaLink"], "false");
    }

    #[test]
    fn missing_channel_is_fatal() {
        let xml = r#"<rss version="2.0"></rss>"#;
        assert_eq!(parse_feed(xml).unwrap_err(), FeedError::MissingChannel);
        let xml = r#"<feed><entry/></feed>"#;
        assert_eq!(parse_feed(xml).unwrap_err(), FeedError::MissingChannel);
    }

    #[test]
    fn malformed_xml_is_fatal() {
        let err = parse_feed("<rss><channel><item></channel></rss>").unwrap_err();
        assert!(matches!(err, FeedError::Xml(_)));
        let err = parse_feed("<rss><channel>").unwrap_err();
        assert!(matches!(err, FeedError::Xml(_)));
    }
}
