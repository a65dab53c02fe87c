//! Per-session state handed to test bodies.

use crate::channel::RemoteExecutionChannel;
use crate::config::{Mode, RunnerConfig};
use crate::ipc::{BridgeTarget, IpcEngine, RemoteBridge, RemoteEventSink, RemoteShim};
use crate::result::{ProbeError, ProbeResult};
use crate::runner::collaborators::{Judge, Verdict};
use crate::virtual_list::{ProbeOptions, VirtualListProbe};
use std::sync::Arc;
use tracing::info;

/// What a test body works with: the channel, the IPC engine and helpers.
///
/// One context lives for the whole suite; it is reset before every attempt.
pub struct TestContext {
    channel: Arc<dyn RemoteExecutionChannel>,
    ipc: IpcEngine,
    mode: Mode,
    judge: Option<Arc<dyn Judge>>,
    list_selector: Option<String>,
    test_name: String,
    logs: Vec<String>,
    cost: f64,
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("test_name", &self.test_name)
            .field("mode", &self.mode)
            .field("ipc", &self.ipc)
            .field("logs", &self.logs.len())
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

impl TestContext {
    /// Build the session over a connected channel
    #[must_use]
    pub fn new(channel: Arc<dyn RemoteExecutionChannel>, config: &RunnerConfig) -> Self {
        let target: BridgeTarget = config.bridge.clone();
        let mut ipc = IpcEngine::new().with_event_sink(Arc::new(RemoteEventSink::new(
            channel.clone(),
            target.clone(),
        )));
        if config.intercept_app_calls {
            ipc = ipc.with_shim(RemoteShim::new(channel.clone(), target.clone()));
        }
        ipc.install(Arc::new(RemoteBridge::new(channel.clone(), target)));

        Self {
            channel,
            ipc,
            mode: config.mode,
            judge: None,
            list_selector: None,
            test_name: String::new(),
            logs: Vec::new(),
            cost: 0.0,
        }
    }

    /// Allow [`TestContext::judge`] in hybrid mode
    #[must_use]
    pub fn with_judge(mut self, judge: Option<Arc<dyn Judge>>) -> Self {
        self.judge = judge;
        self
    }

    /// Default container for [`TestContext::list`]
    #[must_use]
    pub fn with_list_selector(mut self, selector: impl Into<String>) -> Self {
        self.list_selector = Some(selector.into());
        self
    }

    /// IPC engine of this session
    pub fn ipc(&mut self) -> &mut IpcEngine {
        &mut self.ipc
    }

    /// Raw channel of this session
    #[must_use]
    pub fn channel(&self) -> Arc<dyn RemoteExecutionChannel> {
        Arc::clone(&self.channel)
    }

    /// Probe for the default list container
    pub fn list(&self) -> ProbeResult<VirtualListProbe> {
        let selector = self.list_selector.as_deref().ok_or_else(|| {
            ProbeError::invalid_state("no default list selector configured; use list_for")
        })?;
        Ok(self.list_for(selector))
    }

    /// Probe for a specific container
    #[must_use]
    pub fn list_for(&self, selector: &str) -> VirtualListProbe {
        VirtualListProbe::new(self.channel(), ProbeOptions::new(selector))
    }

    /// Name of the running test
    #[must_use]
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Verdict mode
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Attach a note to the current attempt
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(test = %self.test_name, "{message}");
        self.logs.push(message);
    }

    /// Notes from the current attempt
    #[must_use]
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// Cost accrued in the current attempt
    #[must_use]
    pub const fn cost(&self) -> f64 {
        self.cost
    }

    /// Ask the judge; only available in hybrid mode
    pub async fn judge(&mut self, question: &str) -> ProbeResult<Verdict> {
        if self.mode != Mode::Hybrid {
            return Err(ProbeError::invalid_state(
                "judge is only available in hybrid mode",
            ));
        }
        let judge = self
            .judge
            .clone()
            .ok_or_else(|| ProbeError::invalid_state("no judge configured"))?;
        let verdict = judge.judge(question).await?;
        self.cost += verdict.cost;
        self.log(format!(
            "judge: {question} -> {} ({})",
            if verdict.passed { "pass" } else { "fail" },
            verdict.reasoning
        ));
        Ok(verdict)
    }

    /// Fail the test with `message`
    pub fn fail<T>(&self, message: impl Into<String>) -> ProbeResult<T> {
        Err(ProbeError::Failed {
            message: message.into(),
        })
    }

    pub(crate) fn begin_attempt(&mut self, test_name: &str) {
        self.test_name = test_name.to_string();
        self.ipc.reset();
        self.logs.clear();
        self.cost = 0.0;
    }

    pub(crate) fn add_cost(&mut self, cost: f64) {
        self.cost += cost;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::channel::RemoteFunction;
    use crate::testing::{FakeChannel, FakeJudge};
    use serde_json::json;

    fn context(mode: Mode) -> (Arc<FakeChannel>, TestContext) {
        let channel = Arc::new(FakeChannel::new());
        let config = RunnerConfig::new().with_mode(mode).with_app_interception(false);
        let ctx = TestContext::new(channel.clone(), &config);
        (channel, ctx)
    }

    #[tokio::test]
    async fn test_unmocked_calls_reach_the_page_bridge() {
        let (channel, mut ctx) = context(Mode::Deterministic);
        channel.respond(RemoteFunction::BridgeInvoke, json!({"ok": true, "value": 7}));
        assert_eq!(ctx.ipc().invoke("count", json!({})).await.unwrap(), json!(7));
        assert_eq!(channel.calls_to(RemoteFunction::BridgeInvoke).len(), 1);
    }

    #[tokio::test]
    async fn test_judge_requires_hybrid() {
        let (_, mut ctx) = context(Mode::Deterministic);
        let ctx_judge = Arc::new(FakeJudge::passing(0.1));
        ctx = ctx.with_judge(Some(ctx_judge));
        assert!(ctx.judge("is the tree visible?").await.is_err());
    }

    #[tokio::test]
    async fn test_judge_adds_cost() {
        let (_, ctx) = context(Mode::Hybrid);
        let mut ctx = ctx.with_judge(Some(Arc::new(FakeJudge::passing(0.25))));
        let verdict = ctx.judge("is the tree visible?").await.unwrap();
        assert!(verdict.passed);
        assert!((ctx.cost() - 0.25).abs() < 1e-9);
        assert_eq!(ctx.logs().len(), 1);
    }

    #[tokio::test]
    async fn test_begin_attempt_resets_state() {
        let (channel, mut ctx) = context(Mode::Deterministic);
        channel.respond(RemoteFunction::EmitEvent, json!({"delivered": true}));
        ctx.ipc().mock_response("x", json!(1));
        ctx.ipc().emit("e", json!(null)).await;
        ctx.log("note");
        ctx.begin_attempt("next");
        assert_eq!(ctx.ipc().mock_count(), 0);
        assert!(ctx.ipc().events(None).is_empty());
        assert!(ctx.logs().is_empty());
        assert_eq!(ctx.test_name(), "next");
    }

    #[test]
    fn test_list_needs_selector() {
        let (_, ctx) = context(Mode::Deterministic);
        assert!(ctx.list().is_err());
        let ctx = ctx.with_list_selector("#files");
        assert_eq!(ctx.list().unwrap().options().container, "#files");
    }

    #[test]
    fn test_fail_is_an_error() {
        let (_, ctx) = context(Mode::Deterministic);
        let err = ctx.fail::<()>("toolbar missing").unwrap_err();
        assert!(err.to_string().contains("toolbar missing"));
    }
}
