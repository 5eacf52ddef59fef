//! Decides the granularity of each test file and builds the create-plan
//! request.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use super::resolver::{PlanError, PlanRequest};
use super::TestCase;
use crate::api::{PlanService, TestPlanParams, TestPlanParamsTests};
use crate::runner::TestRunner;

/// Files split by historical duration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileClassification {
    /// Files at or above the slow threshold, in input order.
    pub slow: Vec<String>,
    /// Every other file, in input order.
    pub rest: Vec<String>,
}

/// Classify `files` against `threshold`.
///
/// Files missing from `timings` have no history and count as zero, so they
/// are never slow.
pub fn classify_files(
    files: &[String],
    timings: &HashMap<String, Duration>,
    threshold: Duration,
) -> FileClassification {
    let mut classification = FileClassification::default();
    for file in files {
        let duration = timings.get(file).copied().unwrap_or(Duration::ZERO);
        if duration >= threshold {
            classification.slow.push(file.clone());
        } else {
            classification.rest.push(file.clone());
        }
    }
    classification
}

/// Build the create-plan request for `files`.
///
/// With example splitting disabled every file is a whole-file unit and no
/// timings are fetched. Otherwise slow files are expanded into examples by
/// the runner's dry run. A runner that cannot enumerate examples leaves the
/// slow files as whole-file units.
pub async fn build_params(
    service: &dyn PlanService,
    request: &PlanRequest,
    files: &[String],
    runner: &dyn TestRunner,
) -> Result<TestPlanParams, PlanError> {
    let params = |files: Vec<TestCase>, examples: Vec<TestCase>| TestPlanParams {
        identifier: request.identifier.clone(),
        parallelism: request.parallelism,
        branch: request.branch.clone(),
        tests: TestPlanParamsTests { files, examples },
    };

    if !request.split_by_example {
        debug!("Splitting by file");
        return Ok(params(whole_files(files), Vec::new()));
    }

    debug!(files = files.len(), "Splitting by example, fetching timings");
    let timings = service
        .fetch_files_timing(&request.suite_slug, files)
        .await?;
    debug!(timings = timings.len(), "Got file timings");

    let FileClassification { slow, mut rest } =
        classify_files(files, &timings, request.slow_file_threshold);

    if slow.is_empty() {
        debug!("No slow files found");
        return Ok(params(whole_files(&rest), Vec::new()));
    }

    debug!(slow = slow.len(), "Getting examples for slow files");
    let examples = runner
        .get_examples(&slow)
        .await
        .map_err(PlanError::ExampleDiscovery)?;

    if examples.is_empty() {
        debug!(runner = runner.name(), "Runner returned no examples, keeping slow files whole");
        rest.extend(slow);
        return Ok(params(whole_files(&rest), Vec::new()));
    }

    debug!(examples = examples.len(), "Got examples within the slow files");
    Ok(params(whole_files(&rest), examples))
}

fn whole_files(files: &[String]) -> Vec<TestCase> {
    files.iter().map(TestCase::file).collect()
}
