//! Configuration module for StatusTrail.
//!
//! Server settings come from environment variables with sensible defaults.
//! The list of monitored sources is JSON, either from a file named by
//! `STATUSTRAIL_SOURCES` or the built-in list compiled into the binary.

use crate::extract::{self, ConfigError, ExtractConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const BUILTIN_SOURCES: &str = include_str!("../config/sources.json");

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "statustrail.db")
    pub db_path: String,
    /// Optional JSON file overriding the built-in source list
    pub sources_path: Option<PathBuf>,
    /// Time between scheduled checks (default: 300s)
    pub check_interval: Duration,
    /// Per-request fetch timeout (default: 10s)
    pub fetch_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "statustrail.db".to_string(),
            sources_path: None,
            check_interval: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STATUSTRAIL_HTTP_PORT`: HTTP port (default: 8080)
    /// - `STATUSTRAIL_DB_PATH`: Database file path (default: "statustrail.db")
    /// - `STATUSTRAIL_SOURCES`: Source list JSON file (default: built-in list)
    /// - `STATUSTRAIL_CHECK_INTERVAL_SECS`: Check interval (default: 300)
    /// - `STATUSTRAIL_FETCH_TIMEOUT_SECS`: Fetch timeout (default: 10)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("STATUSTRAIL_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("STATUSTRAIL_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(path) = env::var("STATUSTRAIL_SOURCES") {
            if !path.trim().is_empty() {
                cfg.sources_path = Some(PathBuf::from(path));
            }
        }

        if let Some(secs) = env_secs("STATUSTRAIL_CHECK_INTERVAL_SECS") {
            cfg.check_interval = secs;
        }

        if let Some(secs) = env_secs("STATUSTRAIL_FETCH_TIMEOUT_SECS") {
            cfg.fetch_timeout = secs;
        }

        cfg
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

/// One monitored vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extract: ExtractConfig,
}

impl SourceConfig {
    /// Short format name ("html", "json", "rss") stored with each check.
    pub fn kind(&self) -> &'static str {
        self.extract.kind()
    }
}

/// Source list loading errors.
#[derive(Error, Debug)]
pub enum SourcesError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid source list: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("source #{0} has an empty name or url")]
    Incomplete(usize),
    #[error("duplicate source name: {0}")]
    Duplicate(String),
    #[error("source {name}: {source}")]
    Invalid { name: String, source: ConfigError },
}

/// Load sources from `path`, or the built-in list when `None`.
pub fn load_sources(path: Option<&Path>) -> Result<Vec<SourceConfig>, SourcesError> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| SourcesError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            parse_sources(&text)
        }
        None => parse_sources(BUILTIN_SOURCES),
    }
}

/// Parse and check a JSON array of sources. Names must be unique because
/// results are stored per source name.
pub fn parse_sources(text: &str) -> Result<Vec<SourceConfig>, SourcesError> {
    let sources: Vec<SourceConfig> = serde_json::from_str(text)?;

    let mut seen = HashSet::new();
    for (i, source) in sources.iter().enumerate() {
        if source.name.trim().is_empty() || source.url.trim().is_empty() {
            return Err(SourcesError::Incomplete(i + 1));
        }
        if !seen.insert(source.name.as_str()) {
            return Err(SourcesError::Duplicate(source.name.clone()));
        }
        extract::validate(&source.extract).map_err(|source_err| SourcesError::Invalid {
            name: source.name.clone(),
            source: source_err,
        })?;
    }

    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "statustrail.db");
        assert_eq!(cfg.check_interval, Duration::from_secs(300));
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(10));
        assert!(cfg.sources_path.is_none());
    }

    #[test]
    fn test_builtin_sources_load() {
        let sources = load_sources(None).unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Ebsco", "ProQuest", "Springshare", "Gale", "OCLC", "Ex Libris"]);
        assert_eq!(sources[3].kind(), "rss");
        assert_eq!(sources[4].kind(), "json");
        assert!(matches!(&sources[4].extract, ExtractConfig::PathAddressed(p) if p.discover_services));
    }

    #[test]
    fn test_sources_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "Vendor", "url": "status.example.com", "format": "feed"}}]"#
        )
        .unwrap();

        let sources = load_sources(Some(file.path())).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "status.example.com");
        assert!(sources[0].description.is_none());
    }

    #[test]
    fn test_missing_file() {
        let err = load_sources(Some(Path::new("/nonexistent/sources.json"))).unwrap_err();
        assert!(matches!(err, SourcesError::Io { .. }));
    }

    #[test]
    fn test_duplicate_and_invalid_sources() {
        let dup = r#"[
            {"name": "A", "url": "https://a", "format": "feed"},
            {"name": "A", "url": "https://b", "format": "feed"}
        ]"#;
        assert!(matches!(parse_sources(dup), Err(SourcesError::Duplicate(name)) if name == "A"));

        let bad = r#"[{"name": "A", "url": "https://a", "format": "structured-markup", "primary_selector": ["div["]}]"#;
        assert!(matches!(parse_sources(bad), Err(SourcesError::Invalid { .. })));

        let blank = r#"[{"name": " ", "url": "https://a", "format": "feed"}]"#;
        assert!(matches!(parse_sources(blank), Err(SourcesError::Incomplete(1))));
    }
}
