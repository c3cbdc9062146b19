//! JSON view of the stored health data.

use crate::db::{SourceHealth, StoredComponent};
use crate::extract::CanonicalState;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub total_sources: usize,
    pub healthy_sources: usize,
    pub error_sources: usize,
    /// Most recent check among all sources, or now when nothing is stored.
    pub check_time: DateTime<Utc>,
    pub sources: Vec<SourceSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: String,
    /// "OK" or "ERROR".
    pub status: &'static str,
    pub is_error: bool,
    pub status_code: Option<i64>,
    pub response_time: Option<i64>,
    pub error_message: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub total_components: usize,
    pub error_count: usize,
    pub healthy_count: usize,
    pub components: Vec<ComponentSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSummary {
    pub name: String,
    pub status: CanonicalState,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_indicator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error_messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ComponentSummary {
    /// Pretty-printed detail for the dashboard drill-down.
    pub fn details_pretty(&self) -> Option<String> {
        self.details
            .as_ref()
            .and_then(|details| serde_json::to_string_pretty(details).ok())
    }
}

impl From<&StoredComponent> for ComponentSummary {
    fn from(c: &StoredComponent) -> Self {
        Self {
            name: c.name.clone(),
            status: c.state,
            is_error: c.is_error,
            raw_indicator: c.raw_indicator.clone(),
            status_text: c.status_text.clone(),
            error_messages: c.error_messages.clone(),
            details: c.details.clone(),
        }
    }
}

impl From<&SourceHealth> for SourceSummary {
    fn from(health: &SourceHealth) -> Self {
        let check = &health.check;
        let error_count = health.error_components().count();
        Self {
            name: check.source_name.clone(),
            url: check.source_url.clone(),
            source_type: check.source_type.clone(),
            status: if check.is_error { "ERROR" } else { "OK" },
            is_error: check.is_error,
            status_code: check.status_code,
            response_time: check.response_time_ms,
            error_message: check.error_message.clone(),
            last_updated: check.checked_at,
            total_components: health.components.len(),
            error_count,
            healthy_count: health.components.len() - error_count,
            components: health.components.iter().map(ComponentSummary::from).collect(),
        }
    }
}

/// Summarize the stored checks.
pub fn summarize(data: &[SourceHealth]) -> HealthSummary {
    let sources: Vec<SourceSummary> = data.iter().map(SourceSummary::from).collect();
    let error_sources = sources.iter().filter(|s| s.is_error).count();
    let check_time = sources
        .iter()
        .map(|s| s.last_updated)
        .max()
        .unwrap_or_else(Utc::now);

    tracing::debug!(
        "Summary: {} sources, {} healthy, {} errors",
        sources.len(),
        sources.len() - error_sources,
        error_sources
    );

    HealthSummary {
        total_sources: sources.len(),
        healthy_sources: sources.len() - error_sources,
        error_sources,
        check_time,
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::HealthCheck;
    use chrono::Duration;

    fn health(name: &str, is_error: bool, age_secs: i64, states: &[CanonicalState]) -> SourceHealth {
        let checked_at = Utc::now() - Duration::seconds(age_secs);
        SourceHealth {
            check: HealthCheck {
                id: 1,
                source_name: name.to_string(),
                source_url: "https://example.com".to_string(),
                source_type: "html".to_string(),
                status_code: Some(200),
                is_error,
                response_time_ms: Some(50),
                error_message: None,
                checked_at,
                updated_at: checked_at,
            },
            components: states
                .iter()
                .enumerate()
                .map(|(i, state)| StoredComponent {
                    id: i as i64,
                    health_check_id: 1,
                    name: format!("c{}", i),
                    state: *state,
                    is_error: *state == CanonicalState::MajorOutage,
                    raw_indicator: None,
                    status_text: None,
                    error_messages: Vec::new(),
                    details: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_summary_counts_and_latest_time() {
        let data = vec![
            health("Ebsco", false, 30, &[CanonicalState::Operational]),
            health("Gale", true, 5, &[CanonicalState::Operational, CanonicalState::MajorOutage]),
        ];
        let summary = summarize(&data);
        assert_eq!(summary.total_sources, 2);
        assert_eq!(summary.healthy_sources, 1);
        assert_eq!(summary.error_sources, 1);
        assert_eq!(summary.check_time, data[1].check.checked_at);
        assert_eq!(summary.sources[1].status, "ERROR");
        assert_eq!(summary.sources[1].error_count, 1);
        assert_eq!(summary.sources[1].healthy_count, 1);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = summarize(&[health("Ebsco", false, 0, &[CanonicalState::Degraded])]);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["totalSources"], 1);
        assert_eq!(value["sources"][0]["type"], "html");
        assert_eq!(value["sources"][0]["status"], "OK");
        assert_eq!(value["sources"][0]["components"][0]["status"], "degraded");
        assert!(value["sources"][0]["components"][0].get("details").is_none());
    }

    #[test]
    fn test_details_pretty() {
        let mut data = health("Gale", false, 0, &[CanonicalState::Operational]);
        data.components[0].details = Some(serde_json::json!({"link": "https://x"}));
        let summary = summarize(&[data]);
        let pretty = summary.sources[0].components[0].details_pretty().unwrap();
        assert!(pretty.contains("\"link\": \"https://x\""));

        let bare = summarize(&[health("Ebsco", false, 0, &[CanonicalState::Operational])]);
        assert!(bare.sources[0].components[0].details_pretty().is_none());
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_sources, 0);
        assert!(summary.sources.is_empty());
    }
}
