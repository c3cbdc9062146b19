//! Scheduler module for periodically checking every configured source.

mod check;

pub use check::*;

use crate::config::{ServerConfig, SourceConfig};
use crate::db::Store;
use crate::fetch::{build_client, FetchError};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinSet;

/// Runs all source checks on an interval and persists the results.
pub struct Scheduler {
    store: Arc<Store>,
    sources: Arc<Vec<SourceConfig>>,
    client: reqwest::Client,
    fetch_timeout: Duration,
    check_interval: Duration,
    // Held for the duration of a run
    run_lock: Mutex<()>,
    last_run: RwLock<Option<DateTime<Utc>>>,
    stop_tx: broadcast::Sender<()>,
}

impl Scheduler {
    /// Create a new scheduler for the given sources.
    pub fn new(store: Arc<Store>, sources: Vec<SourceConfig>, cfg: &ServerConfig) -> Result<Self, FetchError> {
        let (stop_tx, _) = broadcast::channel(1);
        Ok(Self {
            store,
            sources: Arc::new(sources),
            client: build_client(cfg.fetch_timeout)?,
            fetch_timeout: cfg.fetch_timeout,
            check_interval: cfg.check_interval,
            run_lock: Mutex::new(()),
            last_run: RwLock::new(None),
            stop_tx,
        })
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    /// When the last completed run started.
    pub async fn last_run(&self) -> Option<DateTime<Utc>> {
        *self.last_run.read().await
    }

    /// Check every source now. Waits for a run already in progress to finish
    /// first.
    pub async fn run_checks(&self) -> Vec<SourceResult> {
        let _guard = self.run_lock.lock().await;
        self.run_all().await
    }

    /// Check every source unless a run is already in progress.
    pub async fn try_run_checks(&self) -> Option<Vec<SourceResult>> {
        let _guard = self.run_lock.try_lock().ok()?;
        Some(self.run_all().await)
    }

    async fn run_all(&self) -> Vec<SourceResult> {
        let started = Utc::now();
        tracing::info!("Checking {} source(s)", self.sources.len());

        let mut tasks = JoinSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            let client = self.client.clone();
            let source = source.clone();
            let timeout = self.fetch_timeout;
            tasks.spawn(async move {
                // Add jitter so vendors are not hit in the same instant
                let jitter = rand::random::<u64>() % 250;
                tokio::time::sleep(Duration::from_millis(jitter)).await;
                (index, check_source(&client, &source, timeout).await)
            });
        }

        let mut results = Vec::with_capacity(self.sources.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => tracing::error!("Check task failed: {}", e),
            }
        }
        results.sort_by_key(|(index, _)| *index);
        let results: Vec<SourceResult> = results.into_iter().map(|(_, r)| r).collect();

        for result in &results {
            if let Err(e) = self.store.upsert_health_check(result) {
                tracing::error!("Failed to store result for {}: {}", result.name, e);
            }
        }

        let errors = results.iter().filter(|r| r.is_error).count();
        tracing::info!(
            "Checked {} source(s) in {}ms, {} with issues",
            results.len(),
            (Utc::now() - started).num_milliseconds(),
            errors
        );

        *self.last_run.write().await = Some(started);
        results
    }

    /// Start the periodic check loop. The first run happens immediately.
    pub fn start(self: &Arc<Self>) {
        let scheduler = self.clone();
        let mut stop_rx = self.stop_tx.subscribe();

        tracing::info!(
            "Starting scheduler with {} sources every {:?}",
            self.sources.len(),
            self.check_interval
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.check_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::info!("Scheduler stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        if scheduler.try_run_checks().await.is_none() {
                            tracing::warn!("Skipping scheduled check, previous run still in progress");
                        }
                    }
                }
            }
        });
    }

    /// Stop the periodic loop. A run in progress completes.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_sources;
    use axum::{routing::get, Router};
    use tempfile::NamedTempFile;

    async fn serve_feed() -> String {
        let app = Router::new().route(
            "/rss",
            get(|| async { "<rss><channel><item><title>All systems operational</title></item></channel></rss>" }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn scheduler(store: Arc<Store>, base: &str) -> Scheduler {
        let sources = parse_sources(&format!(
            r#"[
                {{"name": "Feed", "url": "{}/rss", "format": "feed"}},
                {{"name": "Missing", "url": "{}/nope", "format": "feed"}}
            ]"#,
            base, base
        ))
        .unwrap();
        let cfg = ServerConfig {
            fetch_timeout: Duration::from_secs(5),
            ..ServerConfig::default()
        };
        Scheduler::new(store, sources, &cfg).unwrap()
    }

    #[tokio::test]
    async fn test_run_checks_persists_results_in_source_order() {
        let base = serve_feed().await;
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let scheduler = scheduler(store.clone(), &base);

        let results = scheduler.run_checks().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "Feed");
        assert!(!results[0].is_error);
        assert_eq!(results[1].name, "Missing");
        assert_eq!(results[1].error_message.as_deref(), Some("HTTP 404"));

        let stored = store.get_latest_health_data().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].check.source_name, "Feed");
        assert_eq!(stored[0].components.len(), 1);
        assert!(scheduler.last_run().await.is_some());
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let base = serve_feed().await;
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let scheduler = scheduler(store, &base);

        let _held = scheduler.run_lock.lock().await;
        assert!(scheduler.try_run_checks().await.is_none());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let base = serve_feed().await;
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let scheduler = Arc::new(scheduler(store.clone(), &base));

        scheduler.start();
        for _ in 0..50 {
            if scheduler.last_run().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        scheduler.stop();
        assert!(scheduler.last_run().await.is_some());
        assert_eq!(store.get_health_checks().unwrap().len(), 2);
    }
}
