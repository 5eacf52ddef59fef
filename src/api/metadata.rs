use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use super::{ApiClient, ApiError};
use crate::retry::TimelineEvent;

/// Run metadata reported once the node has finished.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestPlanMetadataParams {
    pub identifier: String,
    pub version: String,
    /// Non-secret configuration, keyed by environment variable name.
    pub env: BTreeMap<String, String>,
    pub timeline: Vec<TimelineEvent>,
}

impl ApiClient {
    pub async fn post_test_plan_metadata(
        &self,
        suite_slug: &str,
        params: &TestPlanMetadataParams,
    ) -> Result<(), ApiError> {
        let url = self.suite_url(suite_slug, "test_plan_metadata");
        debug!(%url, events = params.timeline.len(), "Posting test plan metadata");

        let response = self.send(|http| http.post(&url).json(params)).await?;
        if !response.status().is_success() {
            let status = response.status();
            let message = super::client::error_message(response).await;
            return Err(ApiError::InvalidRequest { status, message });
        }
        Ok(())
    }
}
