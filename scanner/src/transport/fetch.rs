use std::time::Duration;

use futures::future::join_all;
use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::error::{FetchError, Result, ScanError};

/// Upper bound on runtime worker threads for one fan-out
const MAX_WORKER_THREADS: usize = 8;

/// Fetches device descriptions, one GET per location, all in flight at once
#[derive(Debug, Clone)]
pub struct DescriptionFetcher {
    timeout: Duration,
}

impl DescriptionFetcher {
    /// Create a fetcher whose individual requests give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch every location concurrently and block until all have settled.
    ///
    /// The returned map has exactly one entry per location, in input order.
    /// A location whose request failed for any reason (timeout, refused
    /// connection, non-success status, unreadable body) maps to an empty
    /// string. The only error is failing to start the runtime.
    ///
    /// The fan-out runs on a private runtime. When called from inside an
    /// existing runtime that private runtime lives on a separate thread.
    pub fn fetch(&self, locations: &[String]) -> Result<IndexMap<String, String>> {
        if locations.is_empty() {
            return Ok(IndexMap::new());
        }

        if tokio::runtime::Handle::try_current().is_err() {
            return self.fetch_on_own_runtime(locations);
        }

        debug!("Called from inside a runtime, fetching on a dedicated thread");
        std::thread::scope(|scope| {
            scope
                .spawn(|| self.fetch_on_own_runtime(locations))
                .join()
                .unwrap_or_else(|_| {
                    warn!("Fetch thread panicked, no descriptions fetched");
                    Ok(empty_bodies(locations))
                })
        })
    }

    fn fetch_on_own_runtime(&self, locations: &[String]) -> Result<IndexMap<String, String>> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(locations.len().clamp(1, MAX_WORKER_THREADS))
            .enable_all()
            .build()
            .map_err(ScanError::Runtime)?;

        let client = match reqwest::Client::builder().timeout(self.timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to create HTTP client, no descriptions fetched: {}", e);
                return Ok(empty_bodies(locations));
            }
        };

        let outcomes = runtime.block_on(async {
            let tasks = locations.iter().cloned().map(|location| {
                let client = client.clone();
                tokio::spawn(async move { fetch_one(&client, &location).await })
            });
            join_all(tasks).await
        });

        let mut bodies = IndexMap::with_capacity(locations.len());
        let mut failures = 0;
        for (location, outcome) in locations.iter().zip(outcomes) {
            let body = match outcome {
                Ok(Ok(body)) => body,
                Ok(Err(e)) => {
                    failures += 1;
                    debug!("Fetching {} failed: {}", location, e);
                    String::new()
                }
                Err(e) => {
                    failures += 1;
                    warn!("Fetch task for {} did not complete: {}", location, e);
                    String::new()
                }
            };
            bodies.insert(location.clone(), body);
        }

        info!(
            "Fetched {} device descriptions ({} failed)",
            bodies.len() - failures,
            failures
        );
        Ok(bodies)
    }
}

fn empty_bodies(locations: &[String]) -> IndexMap<String, String> {
    locations.iter().map(|location| (location.clone(), String::new())).collect()
}

async fn fetch_one(client: &reqwest::Client, location: &str) -> std::result::Result<String, FetchError> {
    let response = client.get(location).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status { status });
    }

    Ok(response.text().await?)
}
