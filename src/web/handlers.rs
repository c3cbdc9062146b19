//! HTTP request handlers.

use super::summary::{summarize, HealthSummary, SourceSummary};
use super::AppState;
use crate::db::SourceHealth;

use askama::Template;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json},
};
use rust_embed::Embed;
use serde::Serialize;
use serde_json::json;

#[derive(Embed)]
#[folder = "static/"]
struct StaticAssets;

// ============================================================================
// Dashboard
// ============================================================================

struct SourceGroup {
    heading: &'static str,
    sources: Vec<SourceSummary>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    title: &'static str,
    summary: HealthSummary,
    // Sources with issues first, empty groups omitted
    groups: Vec<SourceGroup>,
    configured: usize,
}

impl DashboardTemplate {
    fn new(summary: HealthSummary, configured: usize) -> Self {
        let (errors, healthy): (Vec<_>, Vec<_>) = summary.sources.iter().cloned().partition(|s| s.is_error);
        let groups = [("Issues", errors), ("Healthy", healthy)]
            .into_iter()
            .filter(|(_, sources)| !sources.is_empty())
            .map(|(heading, sources)| SourceGroup { heading, sources })
            .collect();

        Self {
            title: "StatusTrail",
            summary,
            groups,
            configured,
        }
    }
}

pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let data = match state.store.get_latest_health_data() {
        Ok(data) => data,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let page = DashboardTemplate::new(summarize(&data), state.scheduler.sources().len());
    match page.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to render dashboard: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

// ============================================================================
// API: Health
// ============================================================================

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_latest_health_data() {
        Ok(data) => Json(summarize(&data)).into_response(),
        Err(e) => {
            tracing::error!("Failed to load health data: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to retrieve system health from database",
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetailedHealth {
    pub summary: HealthSummary,
    pub detailed: Vec<SourceHealth>,
}

pub async fn handle_health_detailed(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_latest_health_data() {
        Ok(data) => Json(DetailedHealth {
            summary: summarize(&data),
            detailed: data,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to load detailed health data: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to retrieve detailed health data from database",
                    "message": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub message: &'static str,
    pub summary: HealthSummary,
}

pub async fn handle_check_now(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("Manual check requested");
    state.scheduler.run_checks().await;

    match state.store.get_latest_health_data() {
        Ok(data) => Json(CheckResponse {
            message: "Health check completed and stored in database",
            summary: summarize(&data),
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Failed to perform health check",
                "message": e.to_string(),
            })),
        )
            .into_response(),
    }
}

// ============================================================================
// API: Sources
// ============================================================================

pub async fn handle_sources(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.sources().to_vec())
}

// ============================================================================
// Static assets
// ============================================================================

pub async fn handle_static(Path(path): Path<String>) -> impl IntoResponse {
    match StaticAssets::get(&path) {
        Some(file) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.to_string())], file.data.into_owned()).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

pub async fn handle_favicon() -> impl IntoResponse {
    let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100">
        <circle cx="50" cy="50" r="45" fill="#2e7d5b"/>
        <path d="M28 52 L44 68 L74 34" stroke="white" stroke-width="9" fill="none" stroke-linecap="round"/>
    </svg>"##;

    ([(header::CONTENT_TYPE, "image/svg+xml")], svg)
}
