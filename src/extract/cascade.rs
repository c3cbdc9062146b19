//! Ordered fallback attempts for when the configured strategy finds nothing.

use super::types::Component;

/// Most nodes a fallback selector may contribute.
pub const FALLBACK_LIMIT: usize = 10;

/// Run `primary`; if it yields no components, try each fallback selector in
/// order and extract from the first one that matches at least one node.
///
/// `query` runs a selector against the document. It is never called when the
/// primary extractor produced output. Finding nothing anywhere is an empty
/// result, not an error.
pub fn with_fallback<T, P, Q, E>(
    primary: P,
    fallback_selectors: &[String],
    query: Q,
    mut per_element: E,
) -> Vec<Component>
where
    P: FnOnce() -> Vec<Component>,
    Q: FnMut(&str) -> Vec<T>,
    E: FnMut(T, usize) -> Component,
{
    let found = primary();
    if !found.is_empty() {
        return found;
    }

    match first_match(fallback_selectors, query) {
        Some((selector, nodes)) => {
            tracing::debug!(
                "Fallback selector {} matched {} node(s), using first {}",
                selector,
                nodes.len(),
                FALLBACK_LIMIT.min(nodes.len())
            );
            nodes
                .into_iter()
                .take(FALLBACK_LIMIT)
                .enumerate()
                .map(|(index, node)| per_element(node, index))
                .collect()
        }
        None => {
            tracing::debug!("No fallback selector matched");
            Vec::new()
        }
    }
}

/// The first selector (in order) that matches anything, with its matches.
pub fn first_match<'s, T, Q>(selectors: &'s [String], mut query: Q) -> Option<(&'s str, Vec<T>)>
where
    Q: FnMut(&str) -> Vec<T>,
{
    selectors.iter().find_map(|selector| {
        let nodes = query(selector.as_str());
        (!nodes.is_empty()).then_some((selector.as_str(), nodes))
    })
}
