//! Test and suite results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Per-test lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Not started
    #[default]
    Pending,
    /// Attempt in progress
    Running,
    /// Final attempt passed
    Passed,
    /// Final attempt failed
    Failed,
    /// Not run
    Skipped,
}

impl TestStatus {
    /// Whether the test is finished
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Skipped)
    }
}

/// Outcome of one test, reflecting its final attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Test category
    pub category: Option<String>,
    /// Final status
    pub status: TestStatus,
    /// Whether the test passed
    pub passed: bool,
    /// Error of the final attempt
    pub error: Option<String>,
    /// Duration of the final attempt
    pub duration: Duration,
    /// Attempts made
    pub attempts: u32,
    /// Cost accrued over all attempts
    pub cost: Option<f64>,
    /// Recording of the final attempt
    pub video: Option<PathBuf>,
}

impl TestResult {
    /// Create a passing test result
    #[must_use]
    pub fn pass(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            category: None,
            status: TestStatus::Passed,
            passed: true,
            error: None,
            duration,
            attempts: 1,
            cost: None,
            video: None,
        }
    }

    /// Create a failing test result
    #[must_use]
    pub fn fail(name: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            error: Some(error.into()),
            status: TestStatus::Failed,
            passed: false,
            ..Self::pass(name, duration)
        }
    }

    /// Create a skipped test result
    #[must_use]
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Skipped,
            passed: false,
            attempts: 0,
            ..Self::pass(name, Duration::ZERO)
        }
    }

    /// Set category
    #[must_use]
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    /// Set attempt count
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set cost
    #[must_use]
    pub const fn with_cost(mut self, cost: Option<f64>) -> Self {
        self.cost = cost;
        self
    }

    /// Set recording path
    #[must_use]
    pub fn with_video(mut self, video: Option<PathBuf>) -> Self {
        self.video = video;
        self
    }
}

/// Aggregated results of one suite run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    /// Unique run id
    pub run_id: Uuid,
    /// Suite name
    pub suite_name: String,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Individual results in run order
    pub results: Vec<TestResult>,
    /// Total duration
    pub duration: Duration,
}

impl SuiteResult {
    /// Create empty results
    #[must_use]
    pub fn new(suite_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            suite_name: suite_name.into(),
            started_at: Utc::now(),
            results: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Add a test result
    pub fn add(&mut self, result: TestResult) {
        self.results.push(result);
    }

    /// Get number of passed tests
    #[must_use]
    pub fn passed(&self) -> usize {
        self.count(TestStatus::Passed)
    }

    /// Get number of failed tests
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(TestStatus::Failed)
    }

    /// Get number of skipped tests
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(TestStatus::Skipped)
    }

    fn count(&self, status: TestStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Get total number of tests
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Check if no test failed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    /// Sum of all test costs
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.results.iter().filter_map(|r| r.cost).sum()
    }

    /// Get failed tests
    #[must_use]
    pub fn failures(&self) -> Vec<&TestResult> {
        self.results
            .iter()
            .filter(|r| r.status == TestStatus::Failed)
            .collect()
    }

    /// Process exit code: 0 when nothing failed
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.all_passed())
    }

    /// Serialize as pretty JSON for report writers
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
