//! One check of one source: fetch, normalize, summarize.

use crate::config::SourceConfig;
use crate::extract::{normalize, Document, NormalizedReport};
use crate::fetch::fetch_document;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Outcome of checking a source. Always produced, whatever went wrong.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceResult {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub status_code: Option<u16>,
    pub is_error: bool,
    pub response_time_ms: Option<i64>,
    pub checked_at: DateTime<Utc>,
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<NormalizedReport>,
}

impl SourceResult {
    fn new(source: &SourceConfig, checked_at: DateTime<Utc>) -> Self {
        Self {
            name: source.name.clone(),
            url: source.url.clone(),
            source_type: source.kind().to_string(),
            status_code: None,
            is_error: false,
            response_time_ms: None,
            checked_at,
            error_message: None,
            report: None,
        }
    }

    fn failed(mut self, message: impl Into<String>) -> Self {
        self.is_error = true;
        self.error_message = Some(message.into());
        self
    }
}

/// Fetch `source` and run it through the extraction engine.
pub async fn check_source(client: &reqwest::Client, source: &SourceConfig, timeout: Duration) -> SourceResult {
    let mut result = SourceResult::new(source, Utc::now());

    let fetched = match fetch_document(client, &source.url, timeout).await {
        Ok(fetched) => fetched,
        Err(e) => {
            tracing::warn!("Check failed for {}: {}", source.name, e);
            return result.failed(e.to_string());
        }
    };

    result.status_code = Some(fetched.status);
    result.response_time_ms = Some(fetched.elapsed_ms());

    if fetched.status >= 400 {
        tracing::warn!("Check failed for {}: HTTP {}", source.name, fetched.status);
        return result.failed(format!("HTTP {}", fetched.status));
    }

    // HTML parsing is CPU-bound and the parsed tree is not Send.
    let config = source.extract.clone();
    let body = fetched.body;
    let outcome = tokio::task::spawn_blocking(move || normalize(&Document::Text(&body), &config)).await;

    match outcome {
        Ok(Ok(report)) => {
            result.is_error = report.error_count() > 0;
            result.error_message = report.summary_message();
            tracing::debug!(
                "Checked {}: {} component(s), {} with issues",
                source.name,
                report.total_components(),
                report.error_count()
            );
            result.report = Some(report);
            result
        }
        Ok(Err(e)) => {
            tracing::error!("Configuration error for {}: {}", source.name, e);
            result.failed(format!("Configuration error: {}", e))
        }
        Err(e) => {
            tracing::error!("Extraction task failed for {}: {}", source.name, e);
            result.failed(format!("Extraction failed: {}", e))
        }
    }
}
