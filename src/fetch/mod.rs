//! HTTP fetching of vendor status documents.

use std::time::{Duration, Instant};
use thiserror::Error;

/// Fetch error types.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
}

/// A fetched response. Any status code is accepted here; callers decide
/// what counts as a failure.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub status: u16,
    pub body: String,
    pub elapsed: Duration,
}

impl FetchedDocument {
    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed.as_millis() as i64
    }
}

/// Build the shared client used for every source.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("statustrail/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| FetchError::Network(e.to_string()))
}

/// Addresses without a scheme are fetched over plain HTTP.
pub fn normalize_url(address: &str) -> String {
    let address = address.trim();
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

/// Fetch `address` and read the full body as text.
pub async fn fetch_document(
    client: &reqwest::Client,
    address: &str,
    timeout: Duration,
) -> Result<FetchedDocument, FetchError> {
    let url = normalize_url(address);
    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            FetchError::Network(e.to_string())
        }
    };

    let start = Instant::now();
    let response = client.get(&url).send().await.map_err(map_err)?;
    let status = response.status().as_u16();
    let body = response.text().await.map_err(map_err)?;

    Ok(FetchedDocument {
        status,
        body,
        elapsed: start.elapsed(),
    })
}
