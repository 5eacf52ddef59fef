use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use super::{ApiClient, ApiError};

#[derive(Serialize)]
struct FilesTimingParams<'a> {
    paths: &'a [String],
}

impl ApiClient {
    /// Historical durations of `files`.
    ///
    /// The service only knows about files that have run before, so the map
    /// may contain fewer entries than requested. Durations are reported in
    /// milliseconds.
    pub async fn fetch_files_timing(
        &self,
        suite_slug: &str,
        files: &[String],
    ) -> Result<HashMap<String, Duration>, ApiError> {
        let url = self.suite_url(suite_slug, "test_files");
        debug!(%url, files = files.len(), "Fetching file timings");

        let params = FilesTimingParams { paths: files };
        let response = self.send(|http| http.post(&url).json(&params)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            let message = super::client::error_message(response).await;
            return Err(ApiError::InvalidRequest {
                status: StatusCode::NOT_FOUND,
                message,
            });
        }

        let body = response.bytes().await?;
        let millis: HashMap<String, u64> = serde_json::from_slice(&body)?;

        Ok(millis
            .into_iter()
            .map(|(path, ms)| (path, Duration::from_millis(ms)))
            .collect())
    }
}
