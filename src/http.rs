//! Thin JSON-over-HTTP client with an explicit retry policy.
//!
//! The OpenAI chat and embedding clients only describe request and response
//! bodies; attempts, backoff and status classification all live here.

use crate::error::CodeQueryError;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// How many times a request is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(500), Duration::from_secs(30))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff,
        }
    }

    /// Total attempts, including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based), doubling each time up to the cap
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }

    pub fn is_retryable_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    pub fn is_retryable_error(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
    }

    fn retry_after(&self, headers: &HeaderMap) -> Option<Duration> {
        let secs = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
        Some(Duration::from_secs(secs).min(self.max_backoff))
    }
}

/// Authenticated client bound to one API base URL
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
    service: String,
}

impl HttpClient {
    /// Build a client sending `Bearer <api_key>` on every request
    pub fn new(
        service: &str,
        api_key: &str,
        base_url: &str,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing {} API key", service);

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).with_context(|| format!("invalid {} API key", service))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .with_context(|| format!("failed to build {} HTTP client", service))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
            service: service.to_string(),
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST `body` as JSON to `path` and decode the JSON reply, retrying per the policy
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.client.post(&url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<R>()
                            .await
                            .with_context(|| format!("failed to parse {} response from {}", self.service, url));
                    }

                    let delay = self
                        .policy
                        .retry_after(response.headers())
                        .unwrap_or_else(|| self.policy.backoff(attempt));
                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());

                    if RetryPolicy::is_retryable_status(status) && attempt < max_attempts {
                        tracing::warn!(
                            service = %self.service,
                            %status,
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            "request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        return Err(CodeQueryError::RateLimited {
                            service: self.service.clone(),
                            attempts: attempt,
                        }
                        .into());
                    }
                    return Err(CodeQueryError::Api {
                        service: self.service.clone(),
                        status: status.as_u16(),
                        body: text,
                    }
                    .into());
                }
                Err(err) => {
                    if RetryPolicy::is_retryable_error(&err) && attempt < max_attempts {
                        let delay = self.policy.backoff(attempt);
                        tracing::warn!(
                            service = %self.service,
                            error = %err,
                            attempt,
                            max_attempts,
                            "transport error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(anyhow::Error::new(err).context(format!(
                        "request to {} failed after {} attempt(s)",
                        url, attempt
                    )));
                }
            }
        }
    }
}
