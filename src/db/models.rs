//! Database model types.

use crate::extract::CanonicalState;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Latest check of one source.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub id: i64,
    pub source_name: String,
    pub source_url: String,
    pub source_type: String,
    pub status_code: Option<i64>,
    pub is_error: bool,
    pub response_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A component row belonging to a [`HealthCheck`].
#[derive(Debug, Clone, Serialize)]
pub struct StoredComponent {
    pub id: i64,
    pub health_check_id: i64,
    pub name: String,
    pub state: CanonicalState,
    pub is_error: bool,
    pub raw_indicator: Option<String>,
    pub status_text: Option<String>,
    pub error_messages: Vec<String>,
    pub details: Option<Value>,
}

/// A check together with its components.
#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    pub check: HealthCheck,
    pub components: Vec<StoredComponent>,
}

impl SourceHealth {
    pub fn error_components(&self) -> impl Iterator<Item = &StoredComponent> {
        self.components.iter().filter(|c| c.is_error)
    }
}
