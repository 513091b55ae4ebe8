use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::RunConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
}

/// One successful GET, kept only long enough to extract from.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub url: String,
    pub status_code: u16,
    pub content_type: String,
    pub raw_body: String,
    /// Attempts actually made, the successful one included.
    pub elapsed_attempts: u32,
}

/// Retry knobs consumed by [`Fetcher::fetch`]. The wait before retry `n`
/// (zero-based) is `base_backoff_ms * 2^n`, saturating on overflow.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let millis = self.base_backoff_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(millis)
    }
}

/// HTTP session shared across a run: one client, one retry policy.
pub struct Fetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(cfg: &RunConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(&cfg.user_agent)
            .build()
            .map_err(FetchError::Build)?;
        Ok(Self {
            client,
            policy: RetryPolicy {
                max_retries: cfg.max_retries,
                base_backoff_ms: cfg.base_backoff_ms,
            },
        })
    }

    /// GET with bounded retries. Timeouts, connection errors and non-2xx
    /// statuses all count as failed attempts; the last error is returned once
    /// the policy is exhausted.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let max = self.policy.max_retries.max(1);
        let mut attempt = 0;
        loop {
            info!("Fetching: {} (attempt {})", url, attempt + 1);
            match self.get_once(url).await {
                Ok(mut res) => {
                    res.elapsed_attempts = attempt + 1;
                    return Ok(res);
                }
                Err(e) if attempt + 1 < max => {
                    let backoff = self.policy.backoff(attempt);
                    warn!(
                        "Attempt {} failed for {}: {} (backing off {:.1}s)",
                        attempt + 1,
                        url,
                        e,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("Failed to fetch {} after {} attempts", url, max);
                    return Err(e);
                }
            }
        }
    }

    /// `fetch`, with exhausted retries flattened to `None` for callers that
    /// skip and move on. The failure has already been logged.
    pub async fn fetch_ok(&self, url: &str) -> Option<FetchResult> {
        self.fetch(url).await.ok()
    }

    /// Single-attempt GET used for existence checks. Any failure, including a
    /// non-2xx status, reads as "not there".
    pub async fn probe(&self, url: &str) -> Option<FetchResult> {
        self.get_once(url).await.ok()
    }

    async fn get_once(&self, url: &str) -> Result<FetchResult, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let raw_body = response.text().await.map_err(|e| FetchError::Network {
            url: url.to_string(),
            source: e,
        })?;

        Ok(FetchResult {
            url: url.to_string(),
            status_code: status.as_u16(),
            content_type,
            raw_body,
            elapsed_attempts: 1,
        })
    }
}
