//! Client for the test plan coordination service.
//!
//! The rest of the crate talks to the service through the [`PlanService`]
//! trait so plan resolution can be exercised without a network. [`ApiClient`]
//! is the HTTP implementation.

mod client;
mod metadata;
mod retry;
mod test_plan;
mod timings;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::plan::TestPlan;

pub use client::{ApiClient, ClientConfig};
pub use metadata::TestPlanMetadataParams;
pub use retry::RetryPolicy;
pub use test_plan::{TestPlanParams, TestPlanParamsTests};

/// Errors returned by the coordination service client.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Retryable failures kept happening until the retry deadline passed.
    ///
    /// Callers treat this as the signal to fall back to local planning.
    #[error("request did not succeed before the retry deadline")]
    RetryTimeout,

    /// The service rejected the request; retrying will not help.
    #[error("invalid request ({status}): {message}")]
    InvalidRequest { status: StatusCode, message: String },

    /// Transport error that is not worth retrying (e.g. a malformed URL).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether this error should send the caller down the fallback path.
    pub fn is_retry_timeout(&self) -> bool {
        matches!(self, ApiError::RetryTimeout)
    }
}

/// Operations the plan resolver and the run loop need from the
/// coordination service.
#[async_trait]
pub trait PlanService: Send + Sync {
    /// Fetch the cached plan for `identifier`. `Ok(None)` means no plan exists yet.
    async fn fetch_test_plan(
        &self,
        suite_slug: &str,
        identifier: &str,
    ) -> Result<Option<TestPlan>, ApiError>;

    /// Ask the service to compute and store a plan.
    async fn create_test_plan(
        &self,
        suite_slug: &str,
        params: &TestPlanParams,
    ) -> Result<TestPlan, ApiError>;

    /// Historical durations for the given files. Files without history are
    /// absent from the returned map.
    async fn fetch_files_timing(
        &self,
        suite_slug: &str,
        files: &[String],
    ) -> Result<HashMap<String, Duration>, ApiError>;

    /// Report the run's timeline and environment.
    async fn post_test_plan_metadata(
        &self,
        suite_slug: &str,
        params: &TestPlanMetadataParams,
    ) -> Result<(), ApiError>;
}

#[async_trait]
impl PlanService for ApiClient {
    async fn fetch_test_plan(
        &self,
        suite_slug: &str,
        identifier: &str,
    ) -> Result<Option<TestPlan>, ApiError> {
        ApiClient::fetch_test_plan(self, suite_slug, identifier).await
    }

    async fn create_test_plan(
        &self,
        suite_slug: &str,
        params: &TestPlanParams,
    ) -> Result<TestPlan, ApiError> {
        ApiClient::create_test_plan(self, suite_slug, params).await
    }

    async fn fetch_files_timing(
        &self,
        suite_slug: &str,
        files: &[String],
    ) -> Result<HashMap<String, Duration>, ApiError> {
        ApiClient::fetch_files_timing(self, suite_slug, files).await
    }

    async fn post_test_plan_metadata(
        &self,
        suite_slug: &str,
        params: &TestPlanMetadataParams,
    ) -> Result<(), ApiError> {
        ApiClient::post_test_plan_metadata(self, suite_slug, params).await
    }
}
