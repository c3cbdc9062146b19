//! Feed adapter: every RSS item (or Atom entry) is a component whose title
//! carries the health signal.

use super::config::{FeedConfig, TreeEncoding};
use super::path::{resolve, value_text};
use super::types::{label_or_placeholder, CanonicalState, Classification, Component};
use super::{Adapter, ConfigError, Document, ExtractError};
use crate::document::decode_tree;

use serde_json::{json, Value};

impl Adapter for FeedConfig {
    fn label(&self, _document: &Document<'_>) -> &'static str {
        "RSS"
    }

    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn extract(&self, document: &Document<'_>) -> Result<Vec<Component>, ExtractError> {
        let decoded;
        let tree = match document {
            Document::Tree(tree) => *tree,
            Document::Text(text) => {
                decoded = decode_tree(text, TreeEncoding::Xml)?;
                &decoded
            }
        };

        let (channel, entries) = if let Some(channel) = tree.get("rss").and_then(|rss| rss.get("channel")) {
            (channel, channel.get("item"))
        } else if let Some(feed) = tree.get("feed") {
            (feed, feed.get("entry"))
        } else {
            return Err(ExtractError::Shape(
                "feed has no rss channel or atom feed element".to_string(),
            ));
        };

        let entries: Vec<&Value> = match entries {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(Value::Object(_)) => entries.into_iter().collect(),
            _ => Vec::new(),
        };

        let feed = json!({
            "channelTitle": first_text(channel, &["title"]).unwrap_or_else(|| "Unknown".to_string()),
            "channelDescription": first_text(channel, &["description", "subtitle"]).unwrap_or_default(),
            "itemsFound": entries.len(),
        });

        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| self.component(entry, index, &feed))
            .collect())
    }
}

impl FeedConfig {
    fn component(&self, entry: &Value, index: usize, feed: &Value) -> Component {
        let title = resolve(entry, "title").and_then(value_text);
        let lower = title.as_deref().unwrap_or_default().to_lowercase();
        let normal = self
            .normal_phrases
            .iter()
            .any(|phrase| !phrase.is_empty() && lower.contains(&phrase.to_lowercase()));

        let state = if normal {
            CanonicalState::Operational
        } else {
            CanonicalState::MajorOutage
        };
        let classification = Classification::new(state, title.clone(), &self.error_states);

        let detail = json!({
            "description": first_text(entry, &["description", "summary", "content"]),
            "pubDate": first_text(entry, &["pubDate", "updated", "published"]),
            "link": first_text(entry, &["link", "link.href"]),
            "isNormalOperation": normal,
            "feed": feed,
        });

        Component::new(label_or_placeholder(title, "RSS Item", index), classification)
            .with_status_text(if normal { "Operating normally" } else { "Issue reported" })
            .with_detail(detail)
    }
}

fn first_text(entry: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .find_map(|path| resolve(entry, path).and_then(value_text))
}
