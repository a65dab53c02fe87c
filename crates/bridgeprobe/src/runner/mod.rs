//! Test lifecycle runner.
//!
//! ```text
//! connect ──► for each test:
//!               filter / skip / only
//!               ┌─► reset engine ─► start recorder ─► body (timeout) ─► stop recorder
//!               └── retry while failed and attempts remain
//!             aggregate ──► SuiteResult
//! ```

mod case;
mod collaborators;
mod context;
mod report;

pub use case::{TestCase, TestFn, TestSuite};
pub use collaborators::{Connector, CostMeter, Judge, Recorder, Verdict};
pub use context::TestContext;
pub use report::{SuiteResult, TestResult, TestStatus};

use crate::config::RunnerConfig;
use crate::result::{ProbeError, ProbeResult};
use chrono::Utc;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of a single attempt
struct Attempt {
    outcome: ProbeResult<()>,
    duration: Duration,
    cost: f64,
    video: Option<PathBuf>,
}

/// Runs suites against one connected application
pub struct Runner {
    config: RunnerConfig,
    connector: Arc<dyn Connector>,
    recorder: Option<Arc<dyn Recorder>>,
    judge: Option<Arc<dyn Judge>>,
    cost_meter: Option<Arc<dyn CostMeter>>,
    category: Option<String>,
    name_filter: Option<Regex>,
    list_selector: Option<String>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("has_recorder", &self.recorder.is_some())
            .field("has_judge", &self.judge.is_some())
            .field("has_cost_meter", &self.cost_meter.is_some())
            .field("category", &self.category)
            .field("name_filter", &self.name_filter.as_ref().map(Regex::as_str))
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Create a runner
    #[must_use]
    pub fn new(config: RunnerConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            recorder: None,
            judge: None,
            cost_meter: None,
            category: None,
            name_filter: None,
            list_selector: None,
        }
    }

    /// Record attempts when `video_dir` is configured
    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn Recorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Judge for hybrid mode
    #[must_use]
    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Meter read around every attempt
    #[must_use]
    pub fn with_cost_meter(mut self, meter: Arc<dyn CostMeter>) -> Self {
        self.cost_meter = Some(meter);
        self
    }

    /// Only run tests in `category`
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Only run tests whose name matches `pattern`
    pub fn with_name_filter(mut self, pattern: &str) -> ProbeResult<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| ProbeError::config(format!("invalid name filter '{pattern}': {e}")))?;
        self.name_filter = Some(regex);
        Ok(self)
    }

    /// Default container for `TestContext::list`
    #[must_use]
    pub fn with_list_selector(mut self, selector: impl Into<String>) -> Self {
        self.list_selector = Some(selector.into());
        self
    }

    /// Runner configuration
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn selected(&self, test: &TestCase, focused: bool) -> bool {
        if test.skip || (focused && !test.only) {
            return false;
        }
        if let Some(category) = &self.category {
            if test.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        self.name_filter
            .as_ref()
            .map_or(true, |regex| regex.is_match(&test.name))
    }

    /// Run every selected test of `suite`.
    ///
    /// Fails only when the connection cannot be established; test failures
    /// are reported in the returned [`SuiteResult`].
    pub async fn run(&self, suite: &TestSuite) -> ProbeResult<SuiteResult> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let run_id = Uuid::new_v4();
        info!(%run_id, suite = %suite.name, tests = suite.len(), "suite starting");

        let channel = self.connector.connect().await.map_err(|e| {
            error!(%run_id, error = %e, "connection failed, aborting suite");
            ProbeError::Channel(e)
        })?;

        let mut ctx = TestContext::new(channel, &self.config).with_judge(self.judge.clone());
        if let Some(selector) = &self.list_selector {
            ctx = ctx.with_list_selector(selector.clone());
        }

        let mut results = SuiteResult {
            run_id,
            suite_name: suite.name.clone(),
            started_at,
            results: Vec::with_capacity(suite.len()),
            duration: Duration::ZERO,
        };

        let focused = suite.has_only();
        for test in &suite.tests {
            if !self.selected(test, focused) {
                debug!(test = %test.name, "skipped");
                results.add(TestResult::skipped(&test.name).with_category(test.category.clone()));
                continue;
            }
            let result = self.run_test(test, &mut ctx).await;
            info!(
                test = %result.name,
                status = ?result.status,
                attempts = result.attempts,
                duration_ms = result.duration.as_millis() as u64,
                "test finished"
            );
            results.add(result);
        }

        if self.config.intercept_app_calls {
            if let Err(e) = ctx.ipc().detach_remote().await {
                warn!(error = %e, "could not remove interception shim");
            }
        }

        results.duration = clock.elapsed();
        info!(
            %run_id,
            passed = results.passed(),
            failed = results.failed(),
            skipped = results.skipped(),
            "suite finished"
        );
        Ok(results)
    }

    async fn run_test(&self, test: &TestCase, ctx: &mut TestContext) -> TestResult {
        let max_attempts = test.retries.unwrap_or(self.config.retries).saturating_add(1);
        let mut total_cost = 0.0;
        let mut metered = false;
        let mut attempts = 0;

        let last = loop {
            attempts += 1;
            let attempt = self.run_attempt(test, ctx).await;
            total_cost += attempt.cost;
            metered |= attempt.cost.abs() > f64::EPSILON || self.cost_meter.is_some();

            if let Err(e) = &attempt.outcome {
                if attempts < max_attempts {
                    warn!(test = %test.name, attempt = attempts, error = %e, "attempt failed, retrying");
                    continue;
                }
            }
            break attempt;
        };

        let result = match &last.outcome {
            Ok(()) => TestResult::pass(&test.name, last.duration),
            Err(e) => TestResult::fail(&test.name, e.to_string(), last.duration),
        };
        result
            .with_category(test.category.clone())
            .with_attempts(attempts)
            .with_cost(metered.then_some(total_cost))
            .with_video(last.video)
    }

    async fn run_attempt(&self, test: &TestCase, ctx: &mut TestContext) -> Attempt {
        ctx.begin_attempt(&test.name);
        if let Err(e) = ctx.ipc().sync_remote().await {
            warn!(test = %test.name, error = %e, "interception shim unavailable");
        }

        let recording = match (&self.recorder, &self.config.video_dir) {
            (Some(recorder), Some(dir)) => match recorder.start(&test.name, dir).await {
                Ok(()) => Some(recorder),
                Err(e) => {
                    warn!(test = %test.name, error = %e, "recording did not start");
                    None
                }
            },
            _ => None,
        };

        let meter_before = self.read_meter().await;
        let started = Instant::now();
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let outcome = match tokio::time::timeout(timeout, test.run(ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProbeError::timeout(
                self.config.timeout_ms,
                format!("test '{}'", test.name),
            )),
        };
        let duration = started.elapsed();
        let meter_after = self.read_meter().await;

        let video = match recording {
            Some(recorder) => match recorder.stop().await {
                Ok(path) => path,
                Err(e) => {
                    warn!(test = %test.name, error = %e, "recording did not stop cleanly");
                    None
                }
            },
            None => None,
        };

        let metered = match (meter_before, meter_after) {
            (Some(before), Some(after)) => (after - before).max(0.0),
            _ => 0.0,
        };
        ctx.add_cost(metered);

        Attempt {
            outcome,
            duration,
            cost: ctx.cost(),
            video,
        }
    }

    async fn read_meter(&self) -> Option<f64> {
        let meter = self.cost_meter.as_ref()?;
        match meter.spent().await {
            Ok(spent) => Some(spent),
            Err(e) => {
                warn!(error = %e, "cost meter unavailable");
                None
            }
        }
    }
}

/// Process exit code for a finished or aborted run
#[must_use]
pub fn exit_code(run: &ProbeResult<SuiteResult>) -> i32 {
    match run {
        Ok(suite) => suite.exit_code(),
        Err(_) => 2,
    }
}
