use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiClient, ApiError};
use crate::plan::{TestCase, TestPlan};

/// Test cases sent to the planner, split by granularity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlanParamsTests {
    /// Whole-file test cases.
    #[serde(default)]
    pub files: Vec<TestCase>,
    /// Individual examples from files that were split.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<TestCase>,
}

/// Body of the create-plan request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlanParams {
    pub identifier: String,
    pub parallelism: usize,
    pub branch: String,
    pub tests: TestPlanParamsTests,
}

impl ApiClient {
    /// Fetch the cached plan for `identifier`, or `None` if the service has
    /// not created one yet.
    pub async fn fetch_test_plan(
        &self,
        suite_slug: &str,
        identifier: &str,
    ) -> Result<Option<TestPlan>, ApiError> {
        let url = self.suite_url(suite_slug, "test_plan");
        debug!(%url, identifier, "Fetching test plan");

        let response = self
            .send(|http| http.get(&url).query(&[("identifier", identifier)]))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.bytes().await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// Ask the service to create a plan from `params`.
    ///
    /// The service may answer with an empty task list when it cannot compute
    /// a plan; that is returned as-is for the caller to handle.
    pub async fn create_test_plan(
        &self,
        suite_slug: &str,
        params: &TestPlanParams,
    ) -> Result<TestPlan, ApiError> {
        let url = self.suite_url(suite_slug, "test_plan");
        debug!(
            %url,
            files = params.tests.files.len(),
            examples = params.tests.examples.len(),
            "Creating test plan"
        );

        let response = self.send(|http| http.post(&url).json(params)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            let message = super::client::error_message(response).await;
            return Err(ApiError::InvalidRequest {
                status: StatusCode::NOT_FOUND,
                message,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
