//! Lenient decoding of raw payloads into a tree of nested maps and sequences.
//!
//! Path-addressed and feed sources hand the engine text; this module turns it
//! into a `serde_json::Value` regardless of whether the wire format was JSON
//! or XML. XML is folded the way most status APIs expect to be read:
//!
//! - the root element becomes a single-key object (`<data>` -> `{"data": ...}`);
//! - attributes and child elements share one map;
//! - repeated children collapse into a sequence, single children stay scalar;
//! - a text-only element becomes a string, otherwise its text sits under
//!   [`TEXT_KEY`].

use crate::extract::path::TEXT_KEY;
use crate::extract::TreeEncoding;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a payload could not be turned into a tree.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("response is empty")]
    Empty,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid XML: {0}")]
    Xml(String),
}

/// Decode `text` into a tree. `Auto` picks XML when the payload starts with
/// `<` and JSON otherwise.
pub fn decode_tree(text: &str, encoding: TreeEncoding) -> Result<Value, DocumentError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DocumentError::Empty);
    }

    match encoding {
        TreeEncoding::Json => Ok(serde_json::from_str(trimmed)?),
        TreeEncoding::Xml => parse_xml(trimmed),
        TreeEncoding::Auto if trimmed.starts_with('<') => parse_xml(trimmed),
        TreeEncoding::Auto => Ok(serde_json::from_str(trimmed)?),
    }
}

/// An element still being read.
struct Frame {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, DocumentError> {
        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| DocumentError::Xml(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| DocumentError::Xml(e.to_string()))?
                .into_owned();
            insert_merged(&mut fields, key, Value::String(value));
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            fields,
            text: String::new(),
        })
    }

    fn push_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }

    fn close(self) -> (String, Value) {
        let value = if self.fields.is_empty() {
            Value::String(self.text)
        } else {
            let mut fields = self.fields;
            if !self.text.is_empty() {
                fields.insert(TEXT_KEY.to_string(), Value::String(self.text));
            }
            Value::Object(fields)
        };
        (self.name, value)
    }
}

/// Insert `value` under `key`, turning repeated keys into a sequence.
fn insert_merged(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

fn parse_xml(text: &str) -> Result<Value, DocumentError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| DocumentError::Xml(format!("{} at position {}", e, reader.buffer_position())))?;

        match event {
            Event::Start(e) => stack.push(Frame::open(&e)?),
            Event::Empty(e) => {
                let frame = Frame::open(&e)?;
                attach(&mut stack, &mut root, frame)?;
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| DocumentError::Xml("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, frame)?;
            }
            Event::Text(e) => {
                if let Some(frame) = stack.last_mut() {
                    let text = match e.unescape() {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => String::from_utf8_lossy(&e).into_owned(),
                    };
                    frame.push_text(&text);
                }
            }
            Event::CData(e) => {
                if let Some(frame) = stack.last_mut() {
                    frame.push_text(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(DocumentError::Xml(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| DocumentError::Xml("no root element".to_string()))
}

fn attach(stack: &mut [Frame], root: &mut Option<Value>, frame: Frame) -> Result<(), DocumentError> {
    let (name, value) = frame.close();
    match stack.last_mut() {
        Some(parent) => insert_merged(&mut parent.fields, name, value),
        None => {
            if root.is_some() {
                return Err(DocumentError::Xml(format!("second root element <{}>", name)));
            }
            let mut map = Map::new();
            map.insert(name, value);
            *root = Some(Value::Object(map));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::path::{resolve, walk};
    use serde_json::json;

    const SERVICES_XML: &str = r#"<?xml version="1.0"?>
        <data>
          <result>true</result>
          <services>
            <name>Alma CA01</name>
            <outages><outage>0</outage><degradation>0</degradation><planned>0</planned></outages>
          </services>
          <services>
            <name>Primo VE CA01</name>
            <outages><outage>1</outage><degradation>0</degradation><planned>0</planned></outages>
          </services>
        </data>"#;

    #[test]
    fn test_xml_repeated_children_become_sequence() {
        let tree = decode_tree(SERVICES_XML, TreeEncoding::Auto).unwrap();
        let services = walk(&tree, "data.services").unwrap().as_array().unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(resolve(&services[1], "outages.outage"), Some(&json!("1")));
        assert_eq!(resolve(&tree, "data.result"), Some(&json!("true")));
    }

    #[test]
    fn test_xml_attributes_merge_with_text() {
        let tree = decode_tree(
            r#"<feed><title type="text">Status &amp; News</title><link href="https://x"/></feed>"#,
            TreeEncoding::Xml,
        )
        .unwrap();
        assert_eq!(tree["feed"]["title"], json!({"type": "text", "$text": "Status & News"}));
        assert_eq!(tree["feed"]["link"], json!({"href": "https://x"}));
    }

    #[test]
    fn test_xml_cdata_and_empty_elements() {
        let tree = decode_tree(
            "<item><description><![CDATA[<b>Down</b>]]></description><guid/></item>",
            TreeEncoding::Auto,
        )
        .unwrap();
        assert_eq!(tree["item"]["description"], "<b>Down</b>");
        assert_eq!(tree["item"]["guid"], "");
    }

    #[test]
    fn test_json_auto_detected() {
        let tree = decode_tree(r#" {"result": {"ok": 1}} "#, TreeEncoding::Auto).unwrap();
        assert_eq!(tree["result"]["ok"], 1);
    }

    #[test]
    fn test_failures() {
        assert!(matches!(decode_tree("   ", TreeEncoding::Auto), Err(DocumentError::Empty)));
        assert!(matches!(
            decode_tree("{not json", TreeEncoding::Auto),
            Err(DocumentError::Json(_))
        ));
        assert!(matches!(
            decode_tree("<a><b></a>", TreeEncoding::Auto),
            Err(DocumentError::Xml(_))
        ));
        assert!(matches!(
            decode_tree("<a><b>", TreeEncoding::Auto),
            Err(DocumentError::Xml(_))
        ));
    }
}
