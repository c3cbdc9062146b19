//! Maps raw vendor indicators onto canonical states.

use super::types::{CanonicalState, Classification, ErrorStates};

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// A raw signal found on an item. Variants are listed in priority order:
/// an explicit attribute beats a class match, which beats free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indicator {
    /// Explicit status attribute value, e.g. `data-status="degraded"`.
    Attribute(String),
    /// A class name on the item or one of its descendants.
    Class(String),
    /// Free text to be scanned for built-in keywords.
    Text(String),
}

impl Indicator {
    fn rank(&self) -> u8 {
        match self {
            Self::Attribute(_) => 0,
            Self::Class(_) => 1,
            Self::Text(_) => 2,
        }
    }
}

/// Source-specific token table plus the state used when nothing matches.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: HashMap<String, CanonicalState>,
    unmatched: CanonicalState,
}

impl Vocabulary {
    pub fn new(tokens: &BTreeMap<String, CanonicalState>, unmatched: CanonicalState) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|(k, v)| (k.trim().to_ascii_lowercase(), *v))
                .collect(),
            unmatched,
        }
    }

    pub fn lookup(&self, token: &str) -> Option<CanonicalState> {
        self.tokens.get(&token.trim().to_ascii_lowercase()).copied()
    }

    pub fn unmatched(&self) -> CanonicalState {
        self.unmatched
    }
}

/// Classify an item from its indicators.
///
/// Indicators are tried in priority order and the first match wins:
/// attributes (vocabulary, then the canonical state names themselves),
/// classes (vocabulary only), then text (built-in keyword groups). With no
/// match the vocabulary's unmatched state is used.
pub fn classify(
    indicators: &[Indicator],
    vocabulary: &Vocabulary,
    error_states: &ErrorStates,
) -> Classification {
    let mut ordered: Vec<&Indicator> = indicators.iter().collect();
    ordered.sort_by_key(|i| i.rank());

    for indicator in ordered {
        let hit = match indicator {
            Indicator::Attribute(value) => vocabulary
                .lookup(value)
                .or_else(|| value.parse::<CanonicalState>().ok())
                .map(|state| (state, value.trim().to_ascii_lowercase())),
            Indicator::Class(class) => vocabulary.lookup(class).map(|state| (state, class.clone())),
            Indicator::Text(text) => keyword_match(text).map(|(state, phrase)| (state, phrase.to_string())),
        };

        if let Some((state, raw)) = hit {
            return Classification::new(state, Some(raw), error_states);
        }
    }

    Classification::new(vocabulary.unmatched(), None, error_states)
}

fn keyword_groups() -> &'static [(CanonicalState, Regex)] {
    static GROUPS: OnceLock<Vec<(CanonicalState, Regex)>> = OnceLock::new();
    GROUPS.get_or_init(|| {
        vec![
            (
                CanonicalState::Operational,
                Regex::new(r"\b(operating normally|operational|ok|normal)\b").unwrap(),
            ),
            (
                CanonicalState::Degraded,
                Regex::new(r"\b(degraded|warnings?|slow)\b").unwrap(),
            ),
            (
                CanonicalState::MajorOutage,
                Regex::new(r"\b(outages?|down|errors?|incidents?)\b").unwrap(),
            ),
        ]
    })
}

/// Scan lower-cased text for the built-in phrase groups; the first group
/// with a hit wins. Returns the state and the phrase that matched.
pub fn keyword_match(text: &str) -> Option<(CanonicalState, String)> {
    let lower = text.to_lowercase();
    keyword_groups().iter().find_map(|(state, re)| {
        re.find(&lower).map(|m| (*state, m.as_str().to_string()))
    })
}

/// Convenience over [`keyword_match`] that drops the matched phrase.
pub fn keyword_state(text: &str) -> Option<CanonicalState> {
    keyword_match(text).map(|(state, _)| state)
}
