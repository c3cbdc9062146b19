//! Heuristic adapter for vendors that publish incidents as blog or forum
//! posts instead of a status page.
//!
//! Post titles are mined from list items and the resolution state is read
//! from keywords in the title. Listings rendered client-side often keep a
//! static copy inside `<noscript>`, so that is searched first.

use super::cascade::first_match;
use super::config::HeuristicConfig;
use super::markup::{element_text, parse_selector, truncate_chars};
use super::types::{CanonicalState, Classification, Component};
use super::{Adapter, ConfigError, Document, ExtractError};

use scraper::{ElementRef, Html, Selector};
use serde_json::json;

const NOSCRIPT_ITEMS: &str = "li, article, .post, .entry, .discussion-item";

/// Longest element text used as a title when no link is present.
const MAX_TITLE: usize = 200;

const MAX_NAME: usize = 60;

/// A post found in the listing, before filtering.
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    title: String,
    url: Option<String>,
}

impl Adapter for HeuristicConfig {
    fn label(&self, _document: &Document<'_>) -> &'static str {
        "HTML"
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for css in self.selectors.iter().chain(&self.broad_selectors) {
            parse_selector(css)?;
        }
        Ok(())
    }

    fn extract(&self, document: &Document<'_>) -> Result<Vec<Component>, ExtractError> {
        let html = document.text().ok_or(ConfigError::UnsupportedDocument {
            format: "heuristic-text",
            expected: "markup text",
        })?;
        let doc = Html::parse_document(html);

        let mut candidates = if self.scan_noscript {
            self.noscript_candidates(&doc)
        } else {
            Vec::new()
        };

        if candidates.is_empty() {
            let query = |css: &str| match Selector::parse(css) {
                Ok(sel) => doc.select(&sel).collect::<Vec<_>>(),
                Err(_) => Vec::new(),
            };
            let matched = first_match(&self.selectors, query).or_else(|| {
                tracing::debug!("No posts matched configured selectors, trying broad selectors");
                first_match(&self.broad_selectors, query)
            });
            if let Some((css, elements)) = matched {
                tracing::debug!("Selector {} matched {} candidate(s)", css, elements.len());
                candidates = elements.into_iter().map(|el| self.candidate(el)).collect();
            }
        }

        if candidates.is_empty() {
            return Ok(vec![self.placeholder()]);
        }

        let components: Vec<Component> = candidates
            .into_iter()
            .take(self.max_candidates)
            .filter(|c| self.is_post(c))
            .map(|c| self.component(c))
            .collect();

        tracing::debug!(
            "Found {} post(s), {} unresolved",
            components.len(),
            components.iter().filter(|c| c.is_error()).count()
        );
        Ok(components)
    }
}

impl HeuristicConfig {
    /// Candidates from the first `<noscript>` block that holds any list items.
    fn noscript_candidates(&self, doc: &Html) -> Vec<Candidate> {
        let (Ok(noscript), Ok(items)) = (Selector::parse("noscript"), Selector::parse(NOSCRIPT_ITEMS)) else {
            return Vec::new();
        };

        for block in doc.select(&noscript) {
            // With scripting enabled the parser keeps noscript bodies as raw text.
            let markup: String = if block.children().any(|child| child.value().is_element()) {
                block.inner_html()
            } else {
                block.text().collect()
            };

            let fragment = Html::parse_fragment(&markup);
            let found: Vec<Candidate> = fragment.select(&items).map(|el| self.candidate(el)).collect();
            if !found.is_empty() {
                tracing::debug!("Found {} candidate(s) inside noscript", found.len());
                return found;
            }
        }
        Vec::new()
    }

    fn candidate(&self, el: ElementRef<'_>) -> Candidate {
        let Ok(links) = Selector::parse("a") else {
            return Candidate {
                title: element_title(&el),
                url: None,
            };
        };
        let link_candidate = |a: ElementRef<'_>| {
            let text = element_text(&a);
            (!text.is_empty()).then(|| Candidate {
                title: text,
                url: a.value().attr("href").map(str::to_string),
            })
        };

        let topic_link = el
            .select(&links)
            .filter(|a| {
                !self.topic_indicator.is_empty()
                    && a.value()
                        .attr("href")
                        .map_or(false, |href| href.contains(&self.topic_indicator))
            })
            .find_map(link_candidate);

        topic_link
            .or_else(|| el.select(&links).find_map(link_candidate))
            .unwrap_or_else(|| Candidate {
                title: element_title(&el),
                url: None,
            })
    }

    fn is_post(&self, candidate: &Candidate) -> bool {
        let lower = candidate.title.to_lowercase();
        !mentions_any(&lower, &self.boilerplate_phrases)
            && candidate.title.chars().count() >= self.min_title_len
    }

    /// Unresolved keywords are checked first so "NOT RESOLVED" is not read as
    /// resolved.
    fn is_resolved(&self, title: &str) -> bool {
        let lower = title.to_lowercase();
        !mentions_any(&lower, &self.unresolved_keywords) && mentions_any(&lower, &self.resolved_keywords)
    }

    fn component(&self, candidate: Candidate) -> Component {
        let resolved = self.is_resolved(&candidate.title);
        let state = if resolved {
            CanonicalState::Operational
        } else {
            CanonicalState::MajorOutage
        };

        let name = if candidate.title.chars().count() > MAX_NAME {
            format!("{}...", truncate_chars(&candidate.title, MAX_NAME))
        } else {
            candidate.title.clone()
        };

        Component::new(name, Classification::new(state, None, &self.error_states))
            .with_status_text(if resolved { "Issue resolved" } else { "Unresolved outage" })
            .with_detail(json!({
                "fullTitle": candidate.title,
                "url": candidate.url,
                "isResolved": resolved,
            }))
    }

    fn placeholder(&self) -> Component {
        Component::new(
            self.placeholder_name.clone(),
            Classification::new(CanonicalState::Operational, None, &self.error_states),
        )
        .with_status_text("No recent posts found")
    }
}

fn mentions_any(lower: &str, phrases: &[String]) -> bool {
    phrases
        .iter()
        .any(|phrase| !phrase.is_empty() && lower.contains(&phrase.to_lowercase()))
}

fn element_title(el: &ElementRef<'_>) -> String {
    let text = element_text(el);
    if text.chars().count() > MAX_TITLE {
        format!("{}...", truncate_chars(&text, MAX_TITLE))
    } else {
        text
    }
}
