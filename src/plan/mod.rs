//! Test plan types and the logic that produces a plan for a run.
//!
//! A [`TestPlan`] maps node indices to the [`Task`] each node executes. Plans
//! normally come from the coordination service; [`resolver`] decides when to
//! trust the remote plan and when to compute one locally with [`fallback`].

pub mod fallback;
pub mod params;
pub mod resolver;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use fallback::create_fallback_plan;
pub use params::{build_params, classify_files, FileClassification};
pub use resolver::{fetch_or_create_test_plan, PlanError, PlanRequest};

/// Format tag for a whole-file test case.
pub const FORMAT_FILE: &str = "file";

/// Format tag for a single example within a file.
pub const FORMAT_EXAMPLE: &str = "example";

/// A single executable test reference.
///
/// For whole-file granularity only `path` is set. Example-level cases
/// produced by a dry run also carry the framework's `identifier`, `name` and
/// `scope`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// File path, or the runnable example path for example-level cases.
    pub path: String,

    /// Either [`FORMAT_FILE`] or [`FORMAT_EXAMPLE`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Framework identifier of the example (e.g. `./spec/a_spec.rb[1:2]`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,

    /// Short description of the example.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Full description of the example including its enclosing groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Estimated duration hint from the planner, in microseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u64>,
}

impl TestCase {
    /// Create a whole-file test case.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: Some(FORMAT_FILE.to_string()),
            ..Self::default()
        }
    }
}

/// One node's assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Index of the node that owns this task.
    pub node_number: usize,
    /// Ordered test cases to execute.
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

/// The partition of all test cases across nodes for one run.
///
/// A plan with no tasks is the coordination service's way of saying it could
/// not compute a plan; see [`TestPlan::is_error_plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlan {
    /// Tasks keyed by node index rendered as a string.
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,

    /// Planner experiment tag, logged for debugging only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment: Option<String>,
}

impl TestPlan {
    /// Returns `true` for the `{"tasks": {}}` sentinel.
    pub fn is_error_plan(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The task assigned to `node_index`, if the plan has one.
    pub fn task_for_node(&self, node_index: usize) -> Option<&Task> {
        self.tasks.get(&node_index.to_string())
    }

    /// Paths of the tests assigned to `node_index`, in plan order.
    pub fn runnable_tests(&self, node_index: usize) -> Vec<String> {
        self.task_for_node(node_index)
            .map(|task| task.tests.iter().map(|t| t.path.clone()).collect())
            .unwrap_or_default()
    }
}
