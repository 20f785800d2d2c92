//! Resilient retrieval of the leaderboard page.
//!
//! The upstream sits behind anti-bot protection that answers default HTTP
//! clients with 403/429/503 pages. Every attempt therefore goes out with
//! browser-like headers, and any non-success status is treated as a
//! retryable failure rather than a protocol error: the body of a block page
//! says nothing useful, so it is only kept (truncated) for diagnostics.
//!
//! ## Retry Strategy
//!
//! Attempts are sequential. After failed attempt `n` the fetcher waits
//! `n × backoff_unit` (1 s → 2 s → … with the default unit) before trying
//! again. Timeouts and connection resets are handled exactly like bad
//! statuses. Once the budget is spent the last-seen failure is returned; no
//! partial body ever escapes.

use crate::config::BoardConfig;
use crate::error::{truncate_chars, BoardError};
use crate::observer::PipelineObserver;
use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, REFERER, USER_AGENT,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Characters of a rejected body kept for the error message.
const SNIPPET_LEN: usize = 200;

/// Anything that can hand back the raw leaderboard markup.
///
/// The HTTP fetcher is the production implementation; tests and embedders
/// inject their own through [`crate::config::BoardConfigBuilder::source`].
#[async_trait]
pub trait MarkupSource: Send + Sync {
    /// Return the full markup of the page, or the error that ended the attempt budget.
    async fn fetch_markup(&self) -> Result<String, BoardError>;
}

/// Attempt budget and backoff for [`fetch_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    /// Wait after the given 1-indexed failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }
}

/// HTTP fetcher with browser-like request shaping.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    policy: RetryPolicy,
    observer: Option<Arc<dyn PipelineObserver>>,
}

impl HttpSource {
    /// Build the fetcher described by `config`.
    pub fn from_config(config: &BoardConfig) -> Result<Self, BoardError> {
        let referer = match &config.referer {
            Some(r) => r.clone(),
            None => default_referer(&config.source_url)?,
        };
        let headers = browser_headers(&config.accept_language, &referer)?;

        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| BoardError::Internal(format!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            client,
            url: config.source_url.clone(),
            policy: RetryPolicy {
                max_attempts: config.fetch_attempts,
                backoff_unit: config.backoff_unit,
            },
            observer: config.observer.clone(),
        })
    }
}

#[async_trait]
impl MarkupSource for HttpSource {
    async fn fetch_markup(&self) -> Result<String, BoardError> {
        fetch_with_retry(&self.client, &self.url, self.policy, self.observer.as_deref()).await
    }
}

/// GET `url` until it answers with a success status or the budget runs out.
pub async fn fetch_with_retry(
    client: &reqwest::Client,
    url: &str,
    policy: RetryPolicy,
    observer: Option<&dyn PipelineObserver>,
) -> Result<String, BoardError> {
    info!("Fetching leaderboard: {}", url);
    let max_attempts = policy.max_attempts.max(1);
    let mut last_err = String::from("no attempt was made");

    for attempt in 1..=max_attempts {
        match attempt_once(client, url).await {
            Ok(body) => {
                debug!("Fetched {} bytes on attempt {}", body.len(), attempt);
                return Ok(body);
            }
            Err(reason) => {
                warn!(
                    "Fetch attempt {}/{} failed — {}",
                    attempt, max_attempts, reason
                );
                if let Some(obs) = observer {
                    obs.on_fetch_retry(attempt, max_attempts, &reason);
                }
                last_err = reason;
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(policy.backoff(attempt)).await;
        }
    }

    Err(BoardError::Fetch {
        url: url.to_string(),
        attempts: max_attempts,
        reason: last_err,
    })
}

/// One GET. Any failure comes back as a diagnostic string.
async fn attempt_once(client: &reqwest::Client, url: &str) -> Result<String, String> {
    let resp = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            format!("timed out: {e}")
        } else {
            e.to_string()
        }
    })?;

    let status = resp.status();
    debug!("Upstream HTTP status: {}", status);

    if status.is_success() {
        return resp
            .text()
            .await
            .map_err(|e| format!("reading body failed: {e}"));
    }

    let body = resp.text().await.unwrap_or_default();
    Err(format!("HTTP {} | body: {}", status.as_u16(), body_snippet(&body)))
}

/// First [`SNIPPET_LEN`] characters of `body` with whitespace runs collapsed.
pub fn body_snippet(body: &str) -> String {
    truncate_chars(body, SNIPPET_LEN)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn default_referer(source_url: &str) -> Result<String, BoardError> {
    let parsed = reqwest::Url::parse(source_url)
        .map_err(|e| BoardError::InvalidConfig(format!("source URL is invalid: {e}")))?;
    Ok(format!("{}/", parsed.origin().ascii_serialization()))
}

fn browser_headers(accept_language: &str, referer: &str) -> Result<HeaderMap, BoardError> {
    let value = |name: &str, v: &str| {
        HeaderValue::from_str(v)
            .map_err(|e| BoardError::InvalidConfig(format!("invalid {name} header value: {e}")))
    };

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, value("Accept-Language", accept_language)?);
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(REFERER, value("Referer", referer)?);
    Ok(headers)
}
