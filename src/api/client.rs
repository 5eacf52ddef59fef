use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{ApiError, RetryPolicy};

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the service, e.g. `https://api.buildkite.com`.
    pub server_base_url: String,
    /// Bearer token sent with every request.
    pub access_token: String,
    /// Organization that owns the test suite.
    pub organization_slug: String,
    /// Client version, reported in the user agent.
    pub version: String,
    /// Retry behaviour for every request.
    pub retry_policy: RetryPolicy,
}

/// HTTP client for the coordination service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    organization_slug: String,
    retry_policy: RetryPolicy,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("test-splitter/{}", config.version))
            .build()?;

        Ok(Self {
            http,
            base_url: config.server_base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token,
            organization_slug: config.organization_slug,
            retry_policy: config.retry_policy,
        })
    }

    /// URL of `path` under the suite's API namespace.
    pub(super) fn suite_url(&self, suite_slug: &str, path: &str) -> String {
        format!(
            "{}/v2/analytics/organizations/{}/suites/{}/{}",
            self.base_url, self.organization_slug, suite_slug, path
        )
    }

    /// Send a request built by `build`, retrying retryable failures until the
    /// policy deadline.
    ///
    /// Returns the response for 2xx and 404 statuses; callers decide what a
    /// 404 means for their endpoint. 429, 5xx, timeouts and connection errors
    /// are retried. Any other status is returned as
    /// [`ApiError::InvalidRequest`] without retrying.
    pub(super) async fn send<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            let request = build(&self.http)
                .bearer_auth(&self.access_token)
                .timeout(self.retry_policy.request_timeout);

            let wait = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() || status == StatusCode::NOT_FOUND {
                        return Ok(response);
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        debug!(%status, attempt, "Retryable response from server");
                        retry_after(&response)
                            .unwrap_or_else(|| self.retry_policy.backoff_for(attempt))
                    } else {
                        let message = error_message(response).await;
                        return Err(ApiError::InvalidRequest { status, message });
                    }
                }
                Err(err) if is_retryable(&err) => {
                    debug!(error = %err, attempt, "Retryable transport error");
                    self.retry_policy.backoff_for(attempt)
                }
                Err(err) => return Err(ApiError::Http(err)),
            };

            if started.elapsed() + wait >= self.retry_policy.deadline {
                warn!(
                    attempts = attempt + 1,
                    deadline_secs = self.retry_policy.deadline.as_secs_f64(),
                    "Giving up on request after retry deadline"
                );
                return Err(ApiError::RetryTimeout);
            }

            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

/// Response body of a failing request, preferring the service's `message` field.
pub(super) async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => parsed.message,
        Err(_) if !body.trim().is_empty() => body,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    }
}

fn is_retryable(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
