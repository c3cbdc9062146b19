//! Vendor-status normalization engine.
//!
//! [`normalize`] turns one fetched document plus its declarative
//! [`ExtractConfig`] into a [`NormalizedReport`]. Each input format has an
//! adapter; they share the vocabulary mapper, the path navigator and the
//! fallback cascade, and all of them hand their components to the aggregator.

pub mod aggregate;
pub mod cascade;
pub mod config;
pub mod path;
pub mod types;
pub mod vocabulary;

mod data;
mod feed;
mod heuristic;
mod markup;

pub use config::{
    ExtractConfig, FeedConfig, HeuristicConfig, MarkupConfig, PathConfig, StatusRule, Threshold,
    TreeEncoding,
};
pub use types::{CanonicalState, Classification, Component, ErrorStates, NormalizedReport};

use crate::document::DocumentError;
use path::PathError;

use serde_json::Value;
use thiserror::Error;

/// The configuration cannot be applied at all. Unlike a malformed document,
/// this is reported to the caller instead of being folded into the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{format}: required field '{field}' is empty")]
    MissingField {
        format: &'static str,
        field: &'static str,
    },
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("{format} expects {expected}")]
    UnsupportedDocument {
        format: &'static str,
        expected: &'static str,
    },
}

/// Anything that stops an adapter. Only `Config` escapes [`normalize`].
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("{0}")]
    Shape(String),
}

/// Input handed to the engine.
#[derive(Debug, Clone, Copy)]
pub enum Document<'a> {
    /// Raw response text (HTML, RSS, XML or JSON).
    Text(&'a str),
    /// An already-deserialized tree.
    Tree(&'a Value),
}

impl<'a> Document<'a> {
    pub fn text(&self) -> Option<&'a str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Tree(_) => None,
        }
    }
}

/// One input format's extraction strategy.
trait Adapter {
    /// Prefix of the synthetic component emitted when the document is unusable.
    fn label(&self, document: &Document<'_>) -> &'static str;

    fn validate(&self) -> Result<(), ConfigError>;

    fn extract(&self, document: &Document<'_>) -> Result<Vec<Component>, ExtractError>;
}

/// Normalize one document.
///
/// Documents that cannot be interpreted (undecodable payload, missing path,
/// missing feed channel) produce a report with a single `major_outage`
/// component and `parse_error` set. Only configuration faults are returned as
/// errors.
pub fn normalize(document: &Document<'_>, config: &ExtractConfig) -> Result<NormalizedReport, ConfigError> {
    let adapter = adapter(config);
    adapter.validate()?;
    match adapter.extract(document) {
        Ok(components) => Ok(aggregate::aggregate(components)),
        Err(ExtractError::Config(e)) => Err(e),
        Err(e) => {
            let label = adapter.label(document);
            tracing::debug!("{} document could not be interpreted: {}", label, e);
            Ok(aggregate::parse_failure(label, e.to_string()))
        }
    }
}

/// Check a configuration without a document, e.g. when loading sources.
pub fn validate(config: &ExtractConfig) -> Result<(), ConfigError> {
    adapter(config).validate()
}

fn adapter(config: &ExtractConfig) -> &dyn Adapter {
    match config {
        ExtractConfig::StructuredMarkup(c) => c,
        ExtractConfig::PathAddressed(c) => c,
        ExtractConfig::Feed(c) => c,
        ExtractConfig::HeuristicText(c) => c,
    }
}
