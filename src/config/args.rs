use clap::Parser;

use crate::runner::RunnerKind;

/// Command-line arguments. Every option falls back to the environment
/// variable a CI step sets for it.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "test-splitter",
    about = "Split a test suite across parallel CI nodes and retry failing tests",
    version,
    long_about = None
)]
pub struct RunArgs {
    /// Coordination service base URL
    #[arg(long, env = "BUILDKITE_SPLITTER_BASE_URL", default_value = "https://api.buildkite.com")]
    pub base_url: String,

    /// API access token
    #[arg(long, env = "BUILDKITE_SPLITTER_API_ACCESS_TOKEN", hide_env_values = true, default_value = "")]
    pub access_token: String,

    /// Organization slug
    #[arg(long, env = "BUILDKITE_ORGANIZATION_SLUG", default_value = "")]
    pub organization_slug: String,

    /// Test suite slug
    #[arg(long, env = "BUILDKITE_SPLITTER_SUITE_SLUG", default_value = "")]
    pub suite_slug: String,

    /// Run identifier shared by every node (defaults to `<build id>/<step id>`)
    #[arg(long, env = "BUILDKITE_SPLITTER_IDENTIFIER")]
    pub identifier: Option<String>,

    #[arg(long, env = "BUILDKITE_BUILD_ID", hide = true)]
    pub build_id: Option<String>,

    #[arg(long, env = "BUILDKITE_STEP_ID", hide = true)]
    pub step_id: Option<String>,

    /// Number of parallel nodes
    #[arg(long, env = "BUILDKITE_PARALLEL_JOB_COUNT", default_value_t = 0)]
    pub parallelism: usize,

    /// Index of this node, starting at 0
    #[arg(long, env = "BUILDKITE_PARALLEL_JOB", default_value_t = 0)]
    pub node_index: usize,

    /// Branch being built
    #[arg(long, env = "BUILDKITE_BRANCH", default_value = "")]
    pub branch: String,

    /// How many times failing tests are retried
    #[arg(long, env = "BUILDKITE_SPLITTER_RETRY_COUNT", default_value_t = 0)]
    pub max_retries: usize,

    /// Test framework
    #[arg(long, env = "BUILDKITE_SPLITTER_TEST_RUNNER", value_enum, default_value_t = RunnerKind::Rspec)]
    pub test_runner: RunnerKind,

    /// Test command template
    #[arg(long, env = "BUILDKITE_SPLITTER_TEST_CMD")]
    pub test_command: Option<String>,

    /// Command template used for retries
    #[arg(long, env = "BUILDKITE_SPLITTER_RETRY_CMD")]
    pub retry_command: Option<String>,

    /// Glob selecting test files
    #[arg(long, env = "BUILDKITE_SPLITTER_TEST_FILE_PATTERN")]
    pub test_file_pattern: Option<String>,

    /// Glob excluding files or directories
    #[arg(long, env = "BUILDKITE_SPLITTER_TEST_FILE_EXCLUDE_PATTERN")]
    pub test_file_exclude_pattern: Option<String>,

    /// Where the test framework writes its JSON report
    #[arg(long, env = "BUILDKITE_SPLITTER_RESULT_PATH")]
    pub result_path: Option<String>,

    /// Split slow files into individual examples
    #[arg(long, env = "BUILDKITE_SPLITTER_SPLIT_BY_EXAMPLE")]
    pub split_by_example: bool,

    /// Duration in milliseconds at which a file counts as slow
    #[arg(long, env = "BUILDKITE_SPLITTER_SLOW_FILE_THRESHOLD", default_value_t = 180_000)]
    pub slow_file_threshold: u64,

    /// Seconds to keep retrying coordination requests before falling back
    #[arg(long, env = "BUILDKITE_SPLITTER_API_TIMEOUT", default_value_t = 60)]
    pub api_timeout: u64,

    /// Enable debug logging
    #[arg(long, env = "BUILDKITE_SPLITTER_DEBUG_ENABLED")]
    pub debug: bool,
}
