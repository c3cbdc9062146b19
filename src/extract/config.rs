//! Declarative per-source extraction configuration.
//!
//! One variant per input format, selected by the `format` tag:
//!
//! ```json
//! { "format": "structured-markup", "primary_selector": [".component-inner-container"],
//!   "status_vocabulary": { "status-green": "operational", "status-red": "major_outage" } }
//! ```

use super::types::{CanonicalState, ErrorStates};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "kebab-case")]
pub enum ExtractConfig {
    StructuredMarkup(MarkupConfig),
    PathAddressed(PathConfig),
    Feed(FeedConfig),
    HeuristicText(HeuristicConfig),
}

impl ExtractConfig {
    /// Short format name used in persisted rows and the dashboard.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StructuredMarkup(_) => "html",
            Self::PathAddressed(_) => "json",
            Self::Feed(_) => "rss",
            Self::HeuristicText(_) => "html",
        }
    }
}

/// Styled HTML status pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupConfig {
    /// CSS selectors whose union (in document order) yields the components.
    pub primary_selector: Vec<String>,
    /// Keep only primary matches containing a node matching this selector.
    #[serde(default)]
    pub require_descendant: Option<String>,
    #[serde(default)]
    pub status_vocabulary: BTreeMap<String, CanonicalState>,
    #[serde(default)]
    pub error_states: ErrorStates,
    #[serde(default = "default_fallback_selectors")]
    pub fallback_selectors: Vec<String>,
    /// State given to components whose indicators match nothing.
    #[serde(default = "default_unmatched_state")]
    pub unmatched_state: CanonicalState,
}

/// JSON or XML payloads navigated by dot paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathConfig {
    pub items_path: String,
    pub name_field: String,
    pub status: StatusRule,
    /// Add `unknown` here to treat a missing status as an error.
    #[serde(default)]
    pub error_states: ErrorStates,
    #[serde(default)]
    pub encoding: TreeEncoding,
    /// When `items_path` misses, fall back to the largest array whose first
    /// element has a service-like key (`name`, `title`, `status`, ...).
    #[serde(default)]
    pub discover_services: bool,
}

/// How a path-addressed item's health is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusRule {
    /// A single status field. Booleans read as operational or major outage.
    /// Exact `vocabulary` hits win next; otherwise the value is an error when
    /// it contains any `error_vocabulary` term. The longest contained term
    /// decides the state: a term naming a canonical state ("degraded",
    /// "partial_outage") yields that state, any other term `major_outage`.
    Field {
        status_field: String,
        #[serde(default)]
        error_vocabulary: Vec<String>,
        #[serde(default)]
        vocabulary: BTreeMap<String, CanonicalState>,
    },
    /// Numeric counters compared against limits.
    Thresholds { thresholds: Vec<Threshold> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub field: String,
    /// A value strictly above the limit trips the threshold; `None` ignores the field.
    pub limit: Option<i64>,
    /// State reported when this threshold trips.
    pub state: CanonicalState,
    /// Noun used in diagnostics, e.g. "outages".
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeEncoding {
    #[default]
    Auto,
    Json,
    Xml,
}

/// RSS or Atom feeds whose entry titles carry the health signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_normal_phrases")]
    pub normal_phrases: Vec<String>,
    #[serde(default = "ErrorStates::major_only")]
    pub error_states: ErrorStates,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            normal_phrases: default_normal_phrases(),
            error_states: ErrorStates::major_only(),
        }
    }
}

/// Announcement and blog listings with no status markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicConfig {
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default = "default_broad_selectors")]
    pub broad_selectors: Vec<String>,
    /// Substring of a link target that marks it as a post, e.g. "discussion".
    #[serde(default = "default_topic_indicator")]
    pub topic_indicator: String,
    #[serde(default = "default_resolved_keywords")]
    pub resolved_keywords: Vec<String>,
    /// Checked before `resolved_keywords`, so "NOT RESOLVED" stays unresolved.
    #[serde(default = "default_unresolved_keywords")]
    pub unresolved_keywords: Vec<String>,
    #[serde(default = "default_boilerplate_phrases")]
    pub boilerplate_phrases: Vec<String>,
    #[serde(default = "default_min_title_len")]
    pub min_title_len: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_true")]
    pub scan_noscript: bool,
    /// Name of the placeholder emitted when no candidates exist at all.
    #[serde(default = "default_placeholder_name")]
    pub placeholder_name: String,
    #[serde(default = "ErrorStates::major_only")]
    pub error_states: ErrorStates,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            selectors: Vec::new(),
            broad_selectors: default_broad_selectors(),
            topic_indicator: default_topic_indicator(),
            resolved_keywords: default_resolved_keywords(),
            unresolved_keywords: default_unresolved_keywords(),
            boilerplate_phrases: default_boilerplate_phrases(),
            min_title_len: default_min_title_len(),
            max_candidates: default_max_candidates(),
            scan_noscript: true,
            placeholder_name: default_placeholder_name(),
            error_states: ErrorStates::major_only(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn default_fallback_selectors() -> Vec<String> {
    strings(&[
        r#"div[class*="component"]"#,
        r#"div[class*="service"]"#,
        r#"div[class*="status"]"#,
        ".status",
        ".service",
        ".component",
        "[data-status]",
        r#"div[id*="status"]"#,
        r#"div[id*="service"]"#,
        r#"tr[class*="status"]"#,
        r#"li[class*="status"]"#,
    ])
}

fn default_unmatched_state() -> CanonicalState {
    CanonicalState::Unknown
}

fn default_normal_phrases() -> Vec<String> {
    strings(&["operating normally", "all systems operational", "no issues"])
}

fn default_broad_selectors() -> Vec<String> {
    strings(&[
        "li",
        "article",
        ".post",
        ".entry",
        r#"div[class*="post"]"#,
        r#"div[class*="entry"]"#,
        r#"a[href*="discussion"]"#,
    ])
}

fn default_topic_indicator() -> String {
    "discussion".to_string()
}

fn default_resolved_keywords() -> Vec<String> {
    strings(&["resolved", "fix released", "merged"])
}

fn default_unresolved_keywords() -> Vec<String> {
    strings(&["not resolved", "unresolved", "not fixed"])
}

fn default_boilerplate_phrases() -> Vec<String> {
    strings(&[
        "all categories",
        "recent posts",
        "navigation",
        "springy community announcements",
        "community announcements",
    ])
}

fn default_min_title_len() -> usize {
    20
}

fn default_max_candidates() -> usize {
    15
}

fn default_true() -> bool {
    true
}

fn default_placeholder_name() -> String {
    "Announcements".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_markup_defaults() {
        let cfg: ExtractConfig = serde_json::from_value(json!({
            "format": "structured-markup",
            "primary_selector": [".component-inner-container"],
            "status_vocabulary": {"status-green": "operational"}
        }))
        .unwrap();

        let ExtractConfig::StructuredMarkup(markup) = cfg else {
            panic!("wrong variant");
        };
        assert_eq!(markup.fallback_selectors.len(), 11);
        assert_eq!(markup.unmatched_state, CanonicalState::Unknown);
        assert!(markup.error_states.contains(CanonicalState::Degraded));
        assert!(!markup.error_states.contains(CanonicalState::Unknown));
    }

    #[test]
    fn test_threshold_rule_parses() {
        let cfg: ExtractConfig = serde_json::from_value(json!({
            "format": "path-addressed",
            "items_path": "data.services",
            "name_field": "name",
            "status": {
                "kind": "thresholds",
                "thresholds": [
                    {"field": "outages.outage", "limit": 0, "state": "major_outage", "label": "outages"},
                    {"field": "outages.planned", "limit": null, "state": "degraded"}
                ]
            },
            "encoding": "xml"
        }))
        .unwrap();

        let ExtractConfig::PathAddressed(path) = cfg else {
            panic!("wrong variant");
        };
        assert_eq!(path.encoding, TreeEncoding::Xml);
        let StatusRule::Thresholds { thresholds } = &path.status else {
            panic!("wrong rule");
        };
        assert_eq!(thresholds[0].limit, Some(0));
        assert_eq!(thresholds[1].limit, None);
    }

    #[test]
    fn test_feed_and_heuristic_need_no_fields() {
        let feed: ExtractConfig = serde_json::from_value(json!({"format": "feed"})).unwrap();
        assert_eq!(feed, ExtractConfig::Feed(FeedConfig::default()));
        assert_eq!(feed.kind(), "rss");

        let heuristic: ExtractConfig =
            serde_json::from_value(json!({"format": "heuristic-text"})).unwrap();
        assert_eq!(heuristic, ExtractConfig::HeuristicText(HeuristicConfig::default()));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let result: Result<ExtractConfig, _> = serde_json::from_value(json!({"format": "csv"}));
        assert!(result.is_err());
    }
}
