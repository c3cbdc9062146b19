//! Assembles extracted components into a [`NormalizedReport`].

use super::types::{Classification, Component, NormalizedReport};

use serde_json::json;

/// Sum up components into a report.
pub fn aggregate(components: Vec<Component>) -> NormalizedReport {
    let error_count = components.iter().filter(|c| c.is_error()).count();
    NormalizedReport {
        total_components: components.len(),
        error_count,
        healthy_count: components.len() - error_count,
        components,
        parse_error: None,
    }
}

/// Report for a document that could not be interpreted at all: one synthetic
/// `major_outage` component named `"{label} Parse Error"` carrying the message.
pub fn parse_failure(label: &str, message: impl Into<String>) -> NormalizedReport {
    let message = message.into();
    let component = Component::new(format!("{} Parse Error", label), Classification::failure())
        .with_status_text(format!("{} parsing failed: {}", label, message))
        .with_messages(vec![message.clone()])
        .with_detail(json!({ "error": message }));

    let mut report = aggregate(vec![component]);
    report.parse_error = Some(message);
    report
}
