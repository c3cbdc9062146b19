//! Structured-markup adapter for styled HTML status pages.
//!
//! Components are the nodes matched by the configured selectors. Each one is
//! named from nested label elements, `data-*` attributes or its own text, and
//! classified from its status attribute, its classes (and those of its
//! descendants, which is where icon fonts live) and finally its text.
//! When the configured selectors match nothing, a list of generic status-page
//! selectors is tried through the fallback cascade.

use super::cascade::with_fallback;
use super::config::MarkupConfig;
use super::types::{label_or_placeholder, Component};
use super::vocabulary::{classify, Indicator, Vocabulary};
use super::{Adapter, ConfigError, Document, ExtractError};

use scraper::{ElementRef, Html, Selector};

const NAME_SELECTORS: &[&str] = &[
    ".component",
    ".name",
    ".component-name",
    ".service-name",
    ".title",
    "h1",
    "h2",
    "h3",
    "h4",
    ".label",
];

const NAME_ATTRIBUTES: &[&str] = &["data-name", "data-component-name", "data-service"];

const STATUS_ATTRIBUTES: &[&str] = &["data-component-status", "data-status"];

const STATUS_TEXT_SELECTOR: &str = ".component-status, .status, .status-text";

/// Longest visible text still accepted as a component name.
const MAX_TEXT_NAME: usize = 100;

/// Characters of element text kept as status text for fallback matches.
const EXCERPT_LEN: usize = 100;

#[derive(Debug, Clone, Copy)]
enum StatusTextSource {
    /// Text of nested status elements.
    Nested,
    /// Leading excerpt of the element's own text.
    Excerpt,
}

impl Adapter for MarkupConfig {
    fn label(&self, _document: &Document<'_>) -> &'static str {
        "HTML"
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.primary_selector.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::MissingField {
                format: "structured-markup",
                field: "primary_selector",
            });
        }
        parse_selector(&self.primary_css())?;
        if let Some(css) = &self.require_descendant {
            parse_selector(css)?;
        }
        for css in &self.fallback_selectors {
            parse_selector(css)?;
        }
        Ok(())
    }

    fn extract(&self, document: &Document<'_>) -> Result<Vec<Component>, ExtractError> {
        let html = document.text().ok_or(ConfigError::UnsupportedDocument {
            format: "structured-markup",
            expected: "markup text",
        })?;

        let doc = Html::parse_document(html);
        let primary = parse_selector(&self.primary_css())?;
        let required = self
            .require_descendant
            .as_deref()
            .map(parse_selector)
            .transpose()?;
        let vocabulary = Vocabulary::new(&self.status_vocabulary, self.unmatched_state);

        let components = with_fallback(
            || {
                doc.select(&primary)
                    .filter(|el| required.as_ref().map_or(true, |r| el.select(r).next().is_some()))
                    .enumerate()
                    .map(|(index, el)| self.component(el, index, &vocabulary, StatusTextSource::Nested))
                    .collect()
            },
            &self.fallback_selectors,
            |css| match Selector::parse(css) {
                Ok(sel) => doc.select(&sel).collect::<Vec<_>>(),
                Err(_) => Vec::new(),
            },
            |el, index| self.component(el, index, &vocabulary, StatusTextSource::Excerpt),
        );

        tracing::debug!(
            "Markup extraction produced {} component(s), {} unhealthy",
            components.len(),
            components.iter().filter(|c| c.is_error()).count()
        );
        Ok(components)
    }
}

impl MarkupConfig {
    fn primary_css(&self) -> String {
        self.primary_selector
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn component(
        &self,
        el: ElementRef<'_>,
        index: usize,
        vocabulary: &Vocabulary,
        status_text: StatusTextSource,
    ) -> Component {
        let name = extract_name(el, index);
        let classification = classify(&collect_indicators(el), vocabulary, &self.error_states);
        let status_text = match status_text {
            StatusTextSource::Nested => nested_status_text(el),
            StatusTextSource::Excerpt => truncate_chars(&element_text(&el), EXCERPT_LEN),
        };
        Component::new(name, classification).with_status_text(status_text)
    }
}

pub(super) fn parse_selector(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::InvalidSelector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Collect all visible text content from an element, trimmed and whitespace-
/// collapsed.
pub(super) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace-collapsed text of the first descendant matching `css`, if any.
pub(super) fn first_text(el: &ElementRef<'_>, css: &str) -> Option<String> {
    let sel = Selector::parse(css).ok()?;
    el.select(&sel)
        .map(|child| element_text(&child))
        .find(|text| !text.is_empty())
}

pub(super) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn is_row(el: &ElementRef<'_>) -> bool {
    el.value().name().eq_ignore_ascii_case("tr")
}

fn extract_name(el: ElementRef<'_>, index: usize) -> String {
    if is_row(&el) {
        let first_cell = Selector::parse("td")
            .ok()
            .and_then(|td| el.select(&td).next());
        if let Some(cell) = first_cell {
            let label = first_text(&cell, ".component, a.component")
                .or_else(|| first_text(&cell, "span.component"))
                .or_else(|| Some(element_text(&cell)).filter(|t| !t.is_empty()));
            if label.is_some() {
                return label_or_placeholder(label, "Component", index);
            }
        }
    }

    for css in NAME_SELECTORS {
        if let Some(name) = first_text(&el, css) {
            return name;
        }
    }

    for attr in NAME_ATTRIBUTES {
        if let Some(name) = el.value().attr(attr).map(str::trim).filter(|v| !v.is_empty()) {
            return name.to_string();
        }
    }

    let raw: String = el.text().collect();
    let raw = raw.trim();
    let first_line = (!raw.is_empty() && raw.chars().count() < MAX_TEXT_NAME)
        .then(|| raw.lines().next().unwrap_or_default().trim().to_string());
    label_or_placeholder(first_line, "Component", index)
}

fn collect_indicators(el: ElementRef<'_>) -> Vec<Indicator> {
    let mut indicators = Vec::new();

    for attr in STATUS_ATTRIBUTES {
        if let Some(value) = el.value().attr(attr).map(str::trim).filter(|v| !v.is_empty()) {
            indicators.push(Indicator::Attribute(value.to_string()));
        }
    }

    indicators.extend(el.value().classes().map(|c| Indicator::Class(c.to_string())));
    for child in el.descendants().skip(1).filter_map(ElementRef::wrap) {
        indicators.extend(child.value().classes().map(|c| Indicator::Class(c.to_string())));
    }

    // Tooltips on status icons ("Service is operating normally")
    if is_row(&el) {
        for child in el.descendants().skip(1).filter_map(ElementRef::wrap) {
            if let Some(title) = child.value().attr("data-title").filter(|t| !t.trim().is_empty()) {
                indicators.push(Indicator::Text(title.to_string()));
            }
        }
    }

    let text = element_text(&el);
    if !text.is_empty() {
        indicators.push(Indicator::Text(text));
    }
    indicators
}

fn nested_status_text(el: ElementRef<'_>) -> String {
    Selector::parse(STATUS_TEXT_SELECTOR)
        .map(|sel| {
            el.select(&sel)
                .map(|child| element_text(&child))
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}
