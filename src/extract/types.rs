//! Canonical output types of the extraction engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The fixed set of health states the engine ever emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalState {
    Operational,
    Degraded,
    PartialOutage,
    MajorOutage,
    Unknown,
}

impl CanonicalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Operational => "operational",
            Self::Degraded => "degraded",
            Self::PartialOutage => "partial_outage",
            Self::MajorOutage => "major_outage",
            Self::Unknown => "unknown",
        }
    }

    /// Ranking used when several signals disagree; higher is worse.
    /// `Unknown` ranks below every classified state.
    pub fn severity(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Operational => 1,
            Self::Degraded => 2,
            Self::PartialOutage => 3,
            Self::MajorOutage => 4,
        }
    }
}

impl fmt::Display for CanonicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown canonical state: {0}")]
pub struct UnknownStateName(pub String);

impl FromStr for CanonicalState {
    type Err = UnknownStateName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "operational" => Ok(Self::Operational),
            "degraded" => Ok(Self::Degraded),
            "partial_outage" => Ok(Self::PartialOutage),
            "major_outage" => Ok(Self::MajorOutage),
            "unknown" => Ok(Self::Unknown),
            _ => Err(UnknownStateName(s.to_string())),
        }
    }
}

/// The subset of canonical states a source treats as unhealthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorStates(BTreeSet<CanonicalState>);

impl ErrorStates {
    pub fn new(states: impl IntoIterator<Item = CanonicalState>) -> Self {
        Self(states.into_iter().collect())
    }

    pub fn contains(&self, state: CanonicalState) -> bool {
        self.0.contains(&state)
    }

    /// Only `major_outage` counts; used by feed and heuristic sources.
    pub fn major_only() -> Self {
        Self::new([CanonicalState::MajorOutage])
    }
}

impl Default for ErrorStates {
    fn default() -> Self {
        Self::new([
            CanonicalState::Degraded,
            CanonicalState::PartialOutage,
            CanonicalState::MajorOutage,
        ])
    }
}

/// A canonical state paired with its error flag and the token that produced it.
///
/// The only ways to build one are [`Classification::new`], which derives
/// `is_error` from the source's error states, and [`Classification::failure`]
/// for the synthetic parse-error component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    state: CanonicalState,
    is_error: bool,
    raw_indicator: Option<String>,
}

impl Classification {
    pub fn new(state: CanonicalState, raw_indicator: Option<String>, error_states: &ErrorStates) -> Self {
        Self {
            state,
            is_error: error_states.contains(state),
            raw_indicator,
        }
    }

    pub(crate) fn failure() -> Self {
        Self {
            state: CanonicalState::MajorOutage,
            is_error: true,
            raw_indicator: None,
        }
    }

    pub fn state(&self) -> CanonicalState {
        self.state
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn raw_indicator(&self) -> Option<&str> {
        self.raw_indicator.as_deref()
    }
}

/// One monitored sub-service extracted from a source document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    name: String,
    state: CanonicalState,
    is_error: bool,
    raw_indicator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    messages: Vec<String>,
    detail: Option<Value>,
}

impl Component {
    pub fn new(name: impl Into<String>, classification: Classification) -> Self {
        let mut name = name.into();
        if name.trim().is_empty() {
            name = "Unnamed component".to_string();
        }
        Self {
            name,
            state: classification.state,
            is_error: classification.is_error,
            raw_indicator: classification.raw_indicator,
            status_text: None,
            messages: Vec::new(),
            detail: None,
        }
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.status_text = if text.is_empty() { None } else { Some(text) };
        self
    }

    pub fn with_messages(mut self, messages: Vec<String>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CanonicalState {
        self.state
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn raw_indicator(&self) -> Option<&str> {
        self.raw_indicator.as_deref()
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }
}

/// Returns `candidate` trimmed, or `"{prefix} {index + 1}"` when it is blank.
pub fn label_or_placeholder(candidate: Option<String>, prefix: &str, index: usize) -> String {
    match candidate {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => format!("{} {}", prefix, index + 1),
    }
}

/// Engine output. Built only by [`crate::extract::aggregate`], which keeps
/// `total_components == healthy_count + error_count == components.len()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReport {
    pub(super) total_components: usize,
    pub(super) error_count: usize,
    pub(super) healthy_count: usize,
    pub(super) components: Vec<Component>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) parse_error: Option<String>,
}

impl NormalizedReport {
    pub fn total_components(&self) -> usize {
        self.total_components
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn healthy_count(&self) -> usize {
        self.healthy_count
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn parse_error(&self) -> Option<&str> {
        self.parse_error.as_deref()
    }

    /// Human-readable summary, present only when something is unhealthy.
    pub fn summary_message(&self) -> Option<String> {
        if let Some(err) = &self.parse_error {
            return Some(format!("Parse error: {}", err));
        }
        if self.error_count == 0 {
            return None;
        }
        Some(format!(
            "{} of {} components have issues",
            self.error_count, self.total_components
        ))
    }
}
