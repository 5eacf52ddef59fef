//! Fetch-or-create protocol for the shared test plan.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::params::build_params;
use super::{create_fallback_plan, TestPlan};
use crate::api::{ApiError, PlanService};
use crate::runner::{RunnerError, TestRunner};

const FALLBACK_NOTICE: &str =
    "Could not fetch or create plan from server, using fallback mode. Your build may take longer than usual.";
const ERROR_PLAN_NOTICE: &str =
    "Error plan received, using fallback mode. Your build may take longer than usual.";

/// Inputs that identify the plan for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub suite_slug: String,
    pub identifier: String,
    pub parallelism: usize,
    pub branch: String,
    pub split_by_example: bool,
    pub slow_file_threshold: Duration,
}

/// Failures that stop plan resolution. A retry timeout never reaches the
/// caller of [`fetch_or_create_test_plan`]; it selects the fallback plan.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("coordination service error: {0}")]
    Coordination(#[from] ApiError),

    #[error("failed to get examples for slow files: {0}")]
    ExampleDiscovery(RunnerError),
}

impl PlanError {
    fn is_retry_timeout(&self) -> bool {
        matches!(self, PlanError::Coordination(err) if err.is_retry_timeout())
    }
}

/// Fetch the plan for `request.identifier`, creating it when absent.
///
/// Falls back to [`create_fallback_plan`] over `files` when the service
/// stays unavailable until its retry deadline, or when it answers with the
/// zero-task error plan. The returned plan always has at least one task.
pub async fn fetch_or_create_test_plan(
    service: &dyn PlanService,
    request: &PlanRequest,
    files: &[String],
    runner: &dyn TestRunner,
) -> Result<TestPlan, PlanError> {
    let fallback = || create_fallback_plan(files, request.parallelism);

    match resolve_remote(service, request, files, runner).await {
        Ok(plan) if plan.is_error_plan() => {
            println!("{ERROR_PLAN_NOTICE}");
            Ok(fallback())
        }
        Ok(plan) => {
            if let Some(experiment) = &plan.experiment {
                debug!(experiment, "Test plan experiment");
            }
            Ok(plan)
        }
        Err(err) if err.is_retry_timeout() => {
            println!("{FALLBACK_NOTICE}");
            Ok(fallback())
        }
        Err(err) => Err(err),
    }
}

async fn resolve_remote(
    service: &dyn PlanService,
    request: &PlanRequest,
    files: &[String],
    runner: &dyn TestRunner,
) -> Result<TestPlan, PlanError> {
    debug!(identifier = %request.identifier, "Fetching test plan");
    if let Some(plan) = service
        .fetch_test_plan(&request.suite_slug, &request.identifier)
        .await?
    {
        debug!(identifier = %request.identifier, "Test plan found");
        return Ok(plan);
    }

    debug!("No test plan found, creating a new plan");
    let params = build_params(service, request, files, runner).await?;
    let plan = service
        .create_test_plan(&request.suite_slug, &params)
        .await?;
    debug!(identifier = %request.identifier, tasks = plan.tasks.len(), "Test plan created");
    Ok(plan)
}
