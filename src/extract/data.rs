//! Path-addressed adapter for JSON and XML status APIs.

use super::cascade::with_fallback;
use super::config::{PathConfig, StatusRule, Threshold, TreeEncoding};
use super::path::{resolve, value_integer, value_text, walk};
use super::types::{label_or_placeholder, CanonicalState, Classification, Component, ErrorStates};
use super::vocabulary::{keyword_state, Vocabulary};
use super::{Adapter, ConfigError, Document, ExtractError};
use crate::document::decode_tree;

use serde_json::Value;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Keys whose presence on the first element marks an array as a service list.
const SERVICE_KEYS: &[&str] = &["name", "title", "serviceName", "status", "state", "operational"];

impl Adapter for PathConfig {
    fn label(&self, document: &Document<'_>) -> &'static str {
        match (self.encoding, document) {
            (TreeEncoding::Xml, _) => "XML",
            (TreeEncoding::Auto, Document::Text(text)) if text.trim_start().starts_with('<') => "XML",
            _ => "JSON",
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let missing = |field: &'static str| ConfigError::MissingField {
            format: "path-addressed",
            field,
        };
        if self.items_path.trim().is_empty() {
            return Err(missing("items_path"));
        }
        match &self.status {
            StatusRule::Field { status_field, .. } if status_field.trim().is_empty() => {
                Err(missing("status_field"))
            }
            StatusRule::Thresholds { thresholds } if thresholds.is_empty() => Err(missing("thresholds")),
            _ => Ok(()),
        }
    }

    fn extract(&self, document: &Document<'_>) -> Result<Vec<Component>, ExtractError> {
        let decoded;
        let tree = match document {
            Document::Tree(tree) => *tree,
            Document::Text(text) => {
                decoded = decode_tree(text, self.encoding)?;
                &decoded
            }
        };

        let located = walk(tree, &self.items_path);
        // Only a missed path triggers discovery; an empty collection is a result.
        let discovered = match &located {
            Err(_) if self.discover_services => discover_service_arrays(tree),
            _ => Vec::new(),
        };

        let mut missed = None;
        let components = with_fallback(
            || match located {
                Ok(found) => collection(found)
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| self.component(item, index))
                    .collect::<Vec<_>>(),
                Err(e) => {
                    missed = Some(e);
                    Vec::new()
                }
            },
            &discovered,
            |path: &str| walk(tree, path).map(collection).unwrap_or_default(),
            |item: &Value, index| self.component(item, index),
        );

        match missed {
            Some(e) if components.is_empty() => Err(e.into()),
            _ => Ok(components),
        }
    }
}

fn collection(found: &Value) -> Vec<&Value> {
    match found {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        single => vec![single],
    }
}

/// Paths of every array whose first element looks like a service, largest
/// first. Equal sizes keep document order.
fn discover_service_arrays(root: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_service_arrays(root, "", &mut found);
    found.sort_by_key(|(_, len)| Reverse(*len));
    tracing::debug!("Discovered {} candidate service array(s)", found.len());
    found.into_iter().map(|(path, _)| path).collect()
}

fn collect_service_arrays(value: &Value, path: &str, found: &mut Vec<(String, usize)>) {
    let join = |segment: &str| {
        if path.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", path, segment)
        }
    };

    match value {
        Value::Array(items) => {
            if items.first().is_some_and(looks_like_service) {
                found.push((path.to_string(), items.len()));
            }
            for (index, item) in items.iter().enumerate() {
                collect_service_arrays(item, &join(index.to_string().as_str()), found);
            }
        }
        Value::Object(map) => {
            // Dotted keys cannot be addressed by a path.
            for (key, child) in map.iter().filter(|(key, _)| !key.contains('.')) {
                collect_service_arrays(child, &join(key.as_str()), found);
            }
        }
        _ => {}
    }
}

fn looks_like_service(item: &Value) -> bool {
    item.as_object()
        .is_some_and(|map| SERVICE_KEYS.iter().any(|key| map.contains_key(*key)))
}

impl PathConfig {
    fn component(&self, item: &Value, index: usize) -> Component {
        let name = resolve(item, &self.name_field).and_then(value_text);
        let name = label_or_placeholder(name, "Service", index);

        let (classification, messages) = match &self.status {
            StatusRule::Field {
                status_field,
                error_vocabulary,
                vocabulary,
            } => {
                let value = resolve(item, status_field);
                (
                    classify_field(value, error_vocabulary, vocabulary, &self.error_states),
                    Vec::new(),
                )
            }
            StatusRule::Thresholds { thresholds } => {
                classify_thresholds(item, thresholds, &self.error_states)
            }
        };

        let status_text = classification
            .raw_indicator()
            .map(|raw| format!("{} ({})", classification.state(), raw))
            .unwrap_or_else(|| classification.state().to_string());

        Component::new(name, classification)
            .with_status_text(status_text)
            .with_messages(messages)
            .with_detail(item.clone())
    }
}

/// A single status field: exact vocabulary hits, then case-insensitive
/// containment of any error term. Booleans, and the strings "true" and
/// "false" that XML yields for them, read as up/down.
fn classify_field(
    value: Option<&Value>,
    error_vocabulary: &[String],
    vocabulary: &BTreeMap<String, CanonicalState>,
    error_states: &ErrorStates,
) -> Classification {
    if let Some(up) = value.and_then(flag) {
        let state = if up {
            CanonicalState::Operational
        } else {
            CanonicalState::MajorOutage
        };
        return Classification::new(state, Some(up.to_string()), error_states);
    }
    let Some(text) = value.and_then(value_text) else {
        return Classification::new(CanonicalState::Unknown, None, error_states);
    };

    let vocabulary = Vocabulary::new(vocabulary, CanonicalState::Unknown);
    if let Some(state) = vocabulary.lookup(&text) {
        return Classification::new(state, Some(text), error_states);
    }

    let lower = text.to_lowercase();
    // Longest term wins so "partial_outage" is not read as "outage".
    let state = match error_vocabulary
        .iter()
        .map(|term| term.trim().to_lowercase())
        .filter(|term| !term.is_empty() && lower.contains(term.as_str()))
        .min_by_key(|term| Reverse(term.len()))
    {
        Some(term) => term.parse().unwrap_or(CanonicalState::MajorOutage),
        None => CanonicalState::Operational,
    };
    Classification::new(state, Some(text), error_states)
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(up) => Some(*up),
        other => match value_text(other)?.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
    }
}

/// Counter fields compared against limits. The worst tripped state wins; a
/// missing counter reads as zero.
fn classify_thresholds(
    item: &Value,
    thresholds: &[Threshold],
    error_states: &ErrorStates,
) -> (Classification, Vec<String>) {
    let mut worst: Option<CanonicalState> = None;
    let mut messages = Vec::new();
    let mut readings = Vec::new();

    for threshold in thresholds {
        let Some(limit) = threshold.limit else {
            continue;
        };
        let value = resolve(item, &threshold.field);

        let tripped = match value.and_then(value_integer) {
            Some(count) => {
                readings.push(format!("{}={}", threshold.field, count));
                (count > limit).then(|| format!("{} {}", count, threshold_label(threshold)))
            }
            None => match value.and_then(value_text) {
                // Some feeds put words where counters belong ("OK", "Down").
                Some(text) => {
                    readings.push(format!("{}={}", threshold.field, text));
                    (keyword_state(&text) != Some(CanonicalState::Operational))
                        .then(|| format!("{}: {}", threshold_label(threshold), text))
                }
                None => None,
            },
        };

        if let Some(message) = tripped {
            messages.push(message);
            if worst.map_or(true, |w| threshold.state.severity() > w.severity()) {
                worst = Some(threshold.state);
            }
        }
    }

    let raw = (!readings.is_empty()).then(|| readings.join(", "));
    let state = worst.unwrap_or(CanonicalState::Operational);
    (Classification::new(state, raw, error_states), messages)
}

fn threshold_label(threshold: &Threshold) -> &str {
    threshold
        .label
        .as_deref()
        .unwrap_or_else(|| threshold.field.rsplit('.').next().unwrap_or(&threshold.field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn threshold(field: &str, limit: Option<i64>, state: CanonicalState, label: &str) -> Threshold {
        Threshold {
            field: field.to_string(),
            limit,
            state,
            label: Some(label.to_string()),
        }
    }

    fn service_thresholds() -> PathConfig {
        PathConfig {
            items_path: "data.services".to_string(),
            name_field: "name".to_string(),
            status: StatusRule::Thresholds {
                thresholds: vec![
                    threshold("outages.outage", Some(0), CanonicalState::MajorOutage, "outages"),
                    threshold("outages.degradation", Some(0), CanonicalState::Degraded, "degradations"),
                    threshold("outages.planned", None, CanonicalState::Degraded, "planned"),
                ],
            },
            error_states: ErrorStates::default(),
            encoding: TreeEncoding::Auto,
            discover_services: false,
        }
    }

    fn field_config(error_vocabulary: &[&str]) -> PathConfig {
        PathConfig {
            items_path: "result.containers.1.rows.0.columns.0.widgets.0.widget.data.services".to_string(),
            name_field: "name".to_string(),
            status: StatusRule::Field {
                status_field: "status".to_string(),
                error_vocabulary: error_vocabulary.iter().map(|s| s.to_string()).collect(),
                vocabulary: BTreeMap::new(),
            },
            error_states: ErrorStates::default(),
            encoding: TreeEncoding::Json,
            discover_services: false,
        }
    }

    fn widget_payload(services: Value) -> Value {
        json!({"result": {"containers": [
            {"rows": []},
            {"rows": [{"columns": [{"widgets": [{"widget": {"data": {"services": services}}}]}]}]}
        ]}})
    }

    #[test]
    fn test_thresholds_zero_is_healthy_one_is_error() {
        let cfg = service_thresholds();
        let xml = r#"<data>
              <services><name>Alma</name><outages><outage>0</outage><degradation>0</degradation><planned>3</planned></outages></services>
              <services><name>Primo</name><outages><outage>1</outage><degradation>0</degradation><planned>0</planned></outages></services>
            </data>"#;
        let components = cfg.extract(&Document::Text(xml)).unwrap();
        assert_eq!(components.len(), 2);

        assert_eq!(components[0].name(), "Alma");
        assert_eq!(components[0].state(), CanonicalState::Operational);
        assert!(!components[0].is_error());

        assert_eq!(components[1].name(), "Primo");
        assert_eq!(components[1].state(), CanonicalState::MajorOutage);
        assert!(components[1].is_error());
        assert_eq!(components[1].messages(), ["1 outages".to_string()]);
        assert_eq!(components[1].detail().unwrap()["name"], "Primo");
    }

    #[test]
    fn test_worst_threshold_wins() {
        let tree = json!({"data": {"services": {"name": "Leganto", "outages": {"outage": 2, "degradation": 5}}}});
        let components = service_thresholds().extract(&Document::Tree(&tree)).unwrap();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].state(), CanonicalState::MajorOutage);
        assert_eq!(components[0].messages().len(), 2);
        assert_eq!(
            components[0].raw_indicator(),
            Some("outages.outage=2, outages.degradation=5")
        );
    }

    #[test]
    fn test_textual_counter_is_classified_by_keyword() {
        let tree = json!({"data": {"services": [
            {"name": "A", "outages": {"outage": "OK"}},
            {"name": "B", "outages": {"outage": "Down"}},
        ]}});
        let components = service_thresholds().extract(&Document::Tree(&tree)).unwrap();
        assert_eq!(components[0].state(), CanonicalState::Operational);
        assert_eq!(components[1].state(), CanonicalState::MajorOutage);
    }

    #[test]
    fn test_error_vocabulary_substring() {
        let tree = widget_payload(json!([
            {"name": "WorldCat", "status": "Operational"},
            {"name": "WorldShare", "status": "Service Outage"},
            {"name": "EZproxy", "status": "Degraded Performance"},
            {"name": "Tipasa"},
        ]));
        let cfg = field_config(&["outage", "degraded"]);
        let components = cfg.extract(&Document::Tree(&tree)).unwrap();
        assert_eq!(components.len(), 4);
        assert_eq!(components[0].state(), CanonicalState::Operational);
        assert_eq!(components[1].state(), CanonicalState::MajorOutage);
        assert_eq!(components[1].raw_indicator(), Some("Service Outage"));
        assert_eq!(components[2].state(), CanonicalState::Degraded);
        assert_eq!(components[3].state(), CanonicalState::Unknown);
        assert!(!components[3].is_error());
    }

    #[test]
    fn test_unknown_can_be_made_an_error() {
        let tree = widget_payload(json!([{"name": "Tipasa"}]));
        let mut cfg = field_config(&["outage"]);
        cfg.error_states = ErrorStates::new([CanonicalState::MajorOutage, CanonicalState::Unknown]);
        let components = cfg.extract(&Document::Tree(&tree)).unwrap();
        assert!(components[0].is_error());
    }

    #[test]
    fn test_exact_vocabulary_and_booleans() {
        let tree = widget_payload(json!([
            {"name": "A", "status": "maint"},
            {"name": "B", "status": true},
            {"name": "C", "status": false},
        ]));
        let mut cfg = field_config(&[]);
        if let StatusRule::Field { vocabulary, .. } = &mut cfg.status {
            vocabulary.insert("MAINT".to_string(), CanonicalState::Degraded);
        }
        let components = cfg.extract(&Document::Tree(&tree)).unwrap();
        assert_eq!(components[0].state(), CanonicalState::Degraded);
        assert_eq!(components[1].state(), CanonicalState::Operational);
        assert_eq!(components[2].state(), CanonicalState::MajorOutage);
    }

    #[test]
    fn test_xml_boolean_text_reads_as_flag() {
        let mut cfg = field_config(&[]);
        cfg.items_path = "status.services".to_string();
        cfg.encoding = TreeEncoding::Xml;
        if let StatusRule::Field { status_field, .. } = &mut cfg.status {
            *status_field = "operational".to_string();
        }

        let xml = r#"<status>
              <services><name>A</name><operational>false</operational></services>
              <services><name>B</name><operational> TRUE </operational></services>
            </status>"#;
        let components = cfg.extract(&Document::Text(xml)).unwrap();
        assert_eq!(components[0].state(), CanonicalState::MajorOutage);
        assert!(components[0].is_error());
        assert_eq!(components[1].state(), CanonicalState::Operational);

        let tree = json!({"status": {"services": [{"name": "A", "operational": false}]}});
        let components = cfg.extract(&Document::Tree(&tree)).unwrap();
        assert_eq!(components[0].state(), CanonicalState::MajorOutage);
    }

    #[test]
    fn test_longest_error_term_wins() {
        let tree = widget_payload(json!([
            {"name": "A", "status": "partial_outage"},
            {"name": "B", "status": "outage"},
        ]));
        let cfg = field_config(&["down", "error", "outage", "degraded", "partial_outage", "major_outage"]);
        let components = cfg.extract(&Document::Tree(&tree)).unwrap();
        assert_eq!(components[0].state(), CanonicalState::PartialOutage);
        assert_eq!(components[1].state(), CanonicalState::MajorOutage);
    }

    fn discovery_config() -> PathConfig {
        let mut cfg = field_config(&["outage"]);
        cfg.items_path = "data.services".to_string();
        cfg.discover_services = true;
        cfg
    }

    #[test]
    fn test_missed_path_discovers_largest_service_array() {
        let tree = json!({"page": {
            "widgets": [{"kind": "banner"}, {"kind": "footer"}, {"kind": "nav"}],
            "featured": [{"name": "X", "status": "operational"}],
            "groups": [{"services": [
                {"name": "WorldCat", "status": "operational"},
                {"name": "WorldShare", "status": "Major outage"},
            ]}],
        }});
        let components = discovery_config().extract(&Document::Tree(&tree)).unwrap();
        let names: Vec<_> = components.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["WorldCat", "WorldShare"]);
        assert_eq!(components[1].state(), CanonicalState::MajorOutage);
    }

    #[test]
    fn test_discovery_is_opt_in_and_keeps_path_error() {
        let tree = json!({"groups": [{"name": "A", "status": "operational"}]});
        let mut cfg = discovery_config();
        cfg.discover_services = false;
        assert!(matches!(cfg.extract(&Document::Tree(&tree)), Err(ExtractError::Path(_))));

        let nothing = json!({"groups": [{"kind": "banner"}]});
        let err = discovery_config().extract(&Document::Tree(&nothing)).unwrap_err();
        assert!(err.to_string().contains("not found at part 'data'"));
    }

    #[test]
    fn test_empty_collection_does_not_trigger_discovery() {
        let tree = json!({"data": {"services": []}, "other": [{"name": "A"}]});
        assert!(discovery_config().extract(&Document::Tree(&tree)).unwrap().is_empty());
    }

    #[test]
    fn test_missing_names_get_placeholders() {
        let tree = json!({"data": {"services": [{"outages": {"outage": 0}}, {"name": "  "}]}});
        let components = service_thresholds().extract(&Document::Tree(&tree)).unwrap();
        assert_eq!(components[0].name(), "Service 1");
        assert_eq!(components[1].name(), "Service 2");
    }

    #[test]
    fn test_empty_collection() {
        let tree = json!({"data": {"services": []}});
        assert!(service_thresholds().extract(&Document::Tree(&tree)).unwrap().is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(service_thresholds().validate().is_ok());

        let mut cfg = field_config(&[]);
        cfg.status = StatusRule::Field {
            status_field: " ".to_string(),
            error_vocabulary: Vec::new(),
            vocabulary: BTreeMap::new(),
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingField { field: "status_field", .. })
        ));

        cfg.items_path.clear();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingField { field: "items_path", .. })
        ));
    }

    #[test]
    fn test_label_follows_encoding() {
        let cfg = service_thresholds();
        assert_eq!(cfg.label(&Document::Text("<data/>")), "XML");
        assert_eq!(cfg.label(&Document::Text("{}")), "JSON");
        let tree = json!({});
        assert_eq!(cfg.label(&Document::Tree(&tree)), "JSON");
    }
}
