//! In-memory [`PlanService`] and [`TestRunner`] shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::api::{ApiError, PlanService, TestPlanMetadataParams, TestPlanParams};
use crate::plan::{TestCase, TestPlan};
use crate::runner::{RunResult, RunnerError, TestRunner};

/// Scripted response for a fake service call.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Timeout,
    Rejected,
}

impl<T: Clone> Reply<T> {
    fn get(&self) -> Result<T, ApiError> {
        match self {
            Reply::Ok(value) => Ok(value.clone()),
            Reply::Timeout => Err(ApiError::RetryTimeout),
            Reply::Rejected => Err(ApiError::InvalidRequest {
                status: StatusCode::FORBIDDEN,
                message: "forbidden".to_string(),
            }),
        }
    }
}

pub struct FakeService {
    pub fetch: Reply<Option<TestPlan>>,
    pub create: Reply<TestPlan>,
    pub timings: Reply<HashMap<String, Duration>>,
    pub created_with: Mutex<Vec<TestPlanParams>>,
    pub timing_requests: Mutex<usize>,
    pub metadata: Mutex<Vec<TestPlanMetadataParams>>,
}

impl FakeService {
    pub fn new(fetch: Reply<Option<TestPlan>>, create: Reply<TestPlan>) -> Self {
        Self {
            fetch,
            create,
            timings: Reply::Ok(HashMap::new()),
            created_with: Mutex::new(Vec::new()),
            timing_requests: Mutex::new(0),
            metadata: Mutex::new(Vec::new()),
        }
    }

    pub fn with_timings(mut self, timings: Reply<HashMap<String, Duration>>) -> Self {
        self.timings = timings;
        self
    }
}

#[async_trait]
impl PlanService for FakeService {
    async fn fetch_test_plan(
        &self,
        _suite_slug: &str,
        _identifier: &str,
    ) -> Result<Option<TestPlan>, ApiError> {
        self.fetch.get()
    }

    async fn create_test_plan(
        &self,
        _suite_slug: &str,
        params: &TestPlanParams,
    ) -> Result<TestPlan, ApiError> {
        self.created_with.lock().unwrap().push(params.clone());
        self.create.get()
    }

    async fn fetch_files_timing(
        &self,
        _suite_slug: &str,
        _files: &[String],
    ) -> Result<HashMap<String, Duration>, ApiError> {
        *self.timing_requests.lock().unwrap() += 1;
        self.timings.get()
    }

    async fn post_test_plan_metadata(
        &self,
        _suite_slug: &str,
        params: &TestPlanMetadataParams,
    ) -> Result<(), ApiError> {
        self.metadata.lock().unwrap().push(params.clone());
        Ok(())
    }
}

/// Runner whose examples and run results are scripted per call.
pub struct FakeRunner {
    pub files: Vec<String>,
    pub examples: Result<Vec<TestCase>, String>,
    pub results: Mutex<Vec<Result<RunResult, RunnerError>>>,
    pub example_requests: Mutex<Vec<Vec<String>>>,
    pub runs: Mutex<Vec<(Vec<String>, bool)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::with_results(Vec::new())
    }

    /// Results are handed out in order, one per `run` call.
    pub fn with_results(results: Vec<Result<RunResult, RunnerError>>) -> Self {
        Self {
            files: Vec::new(),
            examples: Ok(Vec::new()),
            results: Mutex::new(results),
            example_requests: Mutex::new(Vec::new()),
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_files(mut self, files: &[&str]) -> Self {
        self.files = files.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_examples(mut self, examples: Result<Vec<TestCase>, String>) -> Self {
        self.examples = examples;
        self
    }

    pub fn runs(&self) -> Vec<(Vec<String>, bool)> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl TestRunner for FakeRunner {
    fn name(&self) -> &'static str {
        "Fake"
    }

    fn get_files(&self) -> Result<Vec<String>, RunnerError> {
        if self.files.is_empty() {
            return Err(RunnerError::NoFilesFound {
                pattern: "*".to_string(),
                exclude: String::new(),
            });
        }
        Ok(self.files.clone())
    }

    async fn get_examples(&self, files: &[String]) -> Result<Vec<TestCase>, RunnerError> {
        self.example_requests.lock().unwrap().push(files.to_vec());
        self.examples.clone().map_err(RunnerError::DryRun)
    }

    async fn run(
        &self,
        test_cases: &[String],
        retry: bool,
    ) -> Result<RunResult, RunnerError> {
        self.runs.lock().unwrap().push((test_cases.to_vec(), retry));
        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            return Ok(RunResult::passed());
        }
        results.remove(0)
    }
}
