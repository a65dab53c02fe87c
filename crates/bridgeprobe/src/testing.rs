//! Scripted stand-ins for the application and the collaborators.
//!
//! Everything here runs in-process, so engine, probe and runner behavior can
//! be tested without a webview:
//!
//! - [`FakeChannel`] - canned JSON per remote function, with a call log
//! - [`SimulatedList`] - a channel that behaves like a virtualized container
//! - [`FakeBridge`] / [`FakeEventSink`] - the application's bridge surface
//! - [`StaticConnector`], [`FailingConnector`], [`FakeRecorder`],
//!   [`FakeJudge`], [`FakeCostMeter`] - runner collaborators

use crate::channel::{ChannelError, RemoteCall, RemoteExecutionChannel, RemoteFunction};
use crate::ipc::{Bridge, EventSink};
use crate::result::{ProbeError, ProbeResult};
use crate::runner::{Connector, CostMeter, Judge, Recorder, Verdict};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type ScriptFn = Arc<dyn Fn(&Value) -> Result<Value, ChannelError> + Send + Sync>;

// ============================================================================
// Channels
// ============================================================================

/// Channel answering from a script
#[derive(Default)]
pub struct FakeChannel {
    scripts: Mutex<HashMap<RemoteFunction, ScriptFn>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl std::fmt::Debug for FakeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeChannel")
            .field("calls", &lock(&self.calls).len())
            .finish_non_exhaustive()
    }
}

impl FakeChannel {
    /// Create a channel with no scripted responses
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `function` with `value`
    pub fn respond(&self, function: RemoteFunction, value: Value) {
        self.respond_with(function, move |_| Ok(value.clone()));
    }

    /// Answer `function` by running `script` on the call arguments
    pub fn respond_with<F>(&self, function: RemoteFunction, script: F)
    where
        F: Fn(&Value) -> Result<Value, ChannelError> + Send + Sync + 'static,
    {
        lock(&self.scripts).insert(function, Arc::new(script));
    }

    /// Always fail `function` with `error`
    pub fn fail(&self, function: RemoteFunction, error: ChannelError) {
        self.respond_with(function, move |_| Err(error.clone()));
    }

    /// Every call received, in order
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    /// Calls received for one function
    #[must_use]
    pub fn calls_to(&self, function: RemoteFunction) -> Vec<RemoteCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.function == function)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RemoteExecutionChannel for FakeChannel {
    async fn evaluate(&self, call: RemoteCall) -> Result<Value, ChannelError> {
        let script = lock(&self.scripts).get(&call.function).cloned();
        let function = call.function;
        let args = call.args.clone();
        lock(&self.calls).push(call);
        match script {
            Some(script) => script(&args),
            None => Err(ChannelError::evaluation(function, "no scripted response")),
        }
    }
}

#[derive(Debug)]
struct ListModel {
    scroll_top: f64,
}

/// Channel simulating a fixed-height virtualized list.
///
/// Renders the items intersecting the viewport plus an overscan on both
/// sides, each marked with `data-index` and `role="option"`. Without
/// indices only the role marker is rendered.
#[derive(Debug)]
pub struct SimulatedList {
    total: usize,
    item_height: f64,
    viewport_height: f64,
    overscan: usize,
    container: bool,
    frozen: bool,
    indexed: bool,
    total_marker: bool,
    selected: Vec<usize>,
    frames: Vec<f64>,
    model: Mutex<ListModel>,
}

impl SimulatedList {
    /// `total` items of `item_height` in a `viewport_height` container
    #[must_use]
    pub fn new(total: usize, item_height: f64, viewport_height: f64) -> Self {
        Self {
            total,
            item_height,
            viewport_height,
            overscan: 2,
            container: true,
            frozen: false,
            indexed: true,
            total_marker: false,
            selected: Vec::new(),
            frames: vec![16.0; 120],
            model: Mutex::new(ListModel { scroll_top: 0.0 }),
        }
    }

    /// Container absent from the page
    #[must_use]
    pub const fn without_container(mut self) -> Self {
        self.container = false;
        self
    }

    /// Ignore scroll requests
    #[must_use]
    pub const fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    /// Render items with only a role marker
    #[must_use]
    pub const fn without_indices(mut self) -> Self {
        self.indexed = false;
        self
    }

    /// Expose the count via `aria-rowcount`
    #[must_use]
    pub const fn with_total_marker(mut self) -> Self {
        self.total_marker = true;
        self
    }

    /// Mark items as `aria-selected`
    #[must_use]
    pub fn with_selected(mut self, indices: &[usize]) -> Self {
        self.selected = indices.to_vec();
        self
    }

    /// Frame deltas reported by a measured scroll
    #[must_use]
    pub fn with_frames(mut self, frames: Vec<f64>) -> Self {
        self.frames = frames;
        self
    }

    /// Rendered items on each side of the viewport
    #[must_use]
    pub const fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    /// Current scroll offset
    #[must_use]
    pub fn scroll_top(&self) -> f64 {
        lock(&self.model).scroll_top
    }

    fn max_scroll(&self) -> f64 {
        (self.total as f64 * self.item_height - self.viewport_height).max(0.0)
    }

    fn render_range(&self, scroll_top: f64) -> std::ops::Range<usize> {
        if self.total == 0 || self.item_height <= 0.0 {
            return 0..0;
        }
        let first = (scroll_top / self.item_height).floor() as usize;
        let last_visible = ((scroll_top + self.viewport_height) / self.item_height).ceil() as usize;
        let start = first.saturating_sub(self.overscan);
        let end = (last_visible + self.overscan).min(self.total);
        start.min(end)..end
    }

    fn bounds(&self, y: f64, height: f64) -> Value {
        json!({"x": 0.0, "y": y, "width": 300.0, "height": height})
    }

    fn sample(&self) -> Value {
        if !self.container {
            return json!({"found": false, "items": []});
        }
        let scroll_top = self.scroll_top();
        let items: Vec<Value> = self
            .render_range(scroll_top)
            .map(|i| {
                let mut attributes = json!({"role": "option"});
                if self.indexed {
                    attributes["data-index"] = json!(i.to_string());
                }
                if self.selected.contains(&i) {
                    attributes["aria-selected"] = json!("true");
                }
                json!({
                    "text": format!("Item {i}"),
                    "attributes": attributes,
                    "bounds": self.bounds(i as f64 * self.item_height - scroll_top, self.item_height),
                })
            })
            .collect();
        let mut attributes = json!({"role": "listbox"});
        if self.total_marker {
            attributes["aria-rowcount"] = json!(self.total.to_string());
        }
        json!({
            "found": true,
            "container": {
                "scrollTop": scroll_top,
                "scrollHeight": self.total as f64 * self.item_height,
                "clientHeight": self.viewport_height,
                "bounds": self.bounds(0.0, self.viewport_height),
                "attributes": attributes,
            },
            "items": items,
        })
    }

    fn scroll(&self, args: &Value) -> Value {
        if !self.container {
            return json!({"found": false, "scrollTop": 0.0});
        }
        let mut model = lock(&self.model);
        if !self.frozen {
            let requested = match args.get("by").and_then(Value::as_f64) {
                Some(by) => model.scroll_top + by,
                None => args
                    .get("top")
                    .and_then(Value::as_f64)
                    .unwrap_or(model.scroll_top),
            };
            model.scroll_top = requested.clamp(0.0, self.max_scroll());
        }
        json!({"found": true, "scrollTop": model.scroll_top})
    }

    fn measure(&self, args: &Value) -> Value {
        if !self.container {
            return json!({"found": false});
        }
        let distance = args.get("distance").and_then(Value::as_f64).unwrap_or(0.0);
        let duration = args.get("duration").and_then(Value::as_f64).unwrap_or(0.0);
        let mut model = lock(&self.model);
        let start = model.scroll_top;
        if !self.frozen {
            model.scroll_top = (start + distance).clamp(0.0, self.max_scroll());
        }
        json!({
            "found": true,
            "frameTimes": self.frames,
            "duration": duration,
            "distance": (model.scroll_top - start).abs(),
            "itemsRendered": self.render_range(model.scroll_top).len(),
        })
    }
}

#[async_trait]
impl RemoteExecutionChannel for SimulatedList {
    async fn evaluate(&self, call: RemoteCall) -> Result<Value, ChannelError> {
        match call.function {
            RemoteFunction::SampleWindow => Ok(self.sample()),
            RemoteFunction::ScrollContainer => Ok(self.scroll(&call.args)),
            RemoteFunction::MeasureScroll => Ok(self.measure(&call.args)),
            other => Err(ChannelError::evaluation(other, "not simulated")),
        }
    }
}

// ============================================================================
// Bridge surface
// ============================================================================

#[derive(Debug, Clone)]
enum Scripted {
    Respond(Value),
    Fail(String),
}

/// In-process bridge with canned outcomes per command
#[derive(Debug, Default)]
pub struct FakeBridge {
    outcomes: HashMap<String, Scripted>,
    unavailable: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeBridge {
    /// Bridge answering `null` to every command
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bridge whose entry point is missing
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Answer `command` with `value`
    #[must_use]
    pub fn respond(mut self, command: &str, value: Value) -> Self {
        self.outcomes
            .insert(command.to_string(), Scripted::Respond(value));
        self
    }

    /// Reject `command` with `message`
    #[must_use]
    pub fn fail(mut self, command: &str, message: &str) -> Self {
        self.outcomes
            .insert(command.to_string(), Scripted::Fail(message.to_string()));
        self
    }

    /// Commands received, in order
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl Bridge for FakeBridge {
    async fn invoke(&self, command: &str, _args: &Value) -> ProbeResult<Value> {
        if self.unavailable {
            return Err(ProbeError::BridgeUnavailable {
                command: command.to_string(),
            });
        }
        lock(&self.calls).push(command.to_string());
        match self.outcomes.get(command) {
            Some(Scripted::Respond(value)) => Ok(value.clone()),
            Some(Scripted::Fail(message)) => Err(ProbeError::Bridge {
                command: command.to_string(),
                message: message.clone(),
            }),
            None => Ok(Value::Null),
        }
    }
}

/// Event sink recording deliveries
#[derive(Debug, Default)]
pub struct FakeEventSink {
    failing: bool,
    delivered: Mutex<Vec<String>>,
}

impl FakeEventSink {
    /// Sink accepting every event
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink rejecting every event
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Names of delivered events
    #[must_use]
    pub fn delivered(&self) -> Vec<String> {
        lock(&self.delivered).clone()
    }
}

#[async_trait]
impl EventSink for FakeEventSink {
    async fn dispatch(&self, event: &str, _payload: &Value) -> ProbeResult<()> {
        if self.failing {
            return Err(ProbeError::invalid_state("event surface unavailable"));
        }
        lock(&self.delivered).push(event.to_string());
        Ok(())
    }
}

// ============================================================================
// Runner collaborators
// ============================================================================

/// Connector handing out an existing channel
pub struct StaticConnector {
    channel: Arc<dyn RemoteExecutionChannel>,
}

impl std::fmt::Debug for StaticConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticConnector").finish_non_exhaustive()
    }
}

impl StaticConnector {
    /// Always connect to `channel`
    #[must_use]
    pub fn new(channel: Arc<dyn RemoteExecutionChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteExecutionChannel>, ChannelError> {
        Ok(Arc::clone(&self.channel))
    }
}

/// Connector that never connects
#[derive(Debug, Clone)]
pub struct FailingConnector {
    message: String,
}

impl FailingConnector {
    /// Fail with `message`
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Connector for FailingConnector {
    async fn connect(&self) -> Result<Arc<dyn RemoteExecutionChannel>, ChannelError> {
        Err(ChannelError::Connect {
            endpoint: "fake://application".to_string(),
            message: self.message.clone(),
        })
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    started: Vec<String>,
    current: Option<PathBuf>,
}

/// Recorder producing `<dir>/<test>-<n>.webm` paths
#[derive(Debug, Default)]
pub struct FakeRecorder {
    failing: bool,
    state: Mutex<RecorderState>,
}

impl FakeRecorder {
    /// Working recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder whose start and stop always fail
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Tests whose recording started, one entry per attempt
    #[must_use]
    pub fn started(&self) -> Vec<String> {
        lock(&self.state).started.clone()
    }
}

#[async_trait]
impl Recorder for FakeRecorder {
    async fn start(&self, test_name: &str, dir: &Path) -> ProbeResult<()> {
        if self.failing {
            return Err(ProbeError::invalid_state("recording device busy"));
        }
        let mut state = lock(&self.state);
        state.started.push(test_name.to_string());
        let attempt = state
            .started
            .iter()
            .filter(|name| name.as_str() == test_name)
            .count();
        state.current = Some(dir.join(format!("{test_name}-{attempt}.webm")));
        Ok(())
    }

    async fn stop(&self) -> ProbeResult<Option<PathBuf>> {
        if self.failing {
            return Err(ProbeError::invalid_state("recording device busy"));
        }
        Ok(lock(&self.state).current.take())
    }
}

/// Judge returning a fixed verdict
#[derive(Debug, Default)]
pub struct FakeJudge {
    passed: bool,
    cost: f64,
    questions: Mutex<Vec<String>>,
}

impl FakeJudge {
    /// Judge that always passes at `cost` per question
    #[must_use]
    pub fn passing(cost: f64) -> Self {
        Self {
            passed: true,
            cost,
            ..Self::default()
        }
    }

    /// Judge that always fails at `cost` per question
    #[must_use]
    pub fn failing(cost: f64) -> Self {
        Self {
            passed: false,
            cost,
            ..Self::default()
        }
    }

    /// Questions asked, in order
    #[must_use]
    pub fn questions(&self) -> Vec<String> {
        lock(&self.questions).clone()
    }
}

#[async_trait]
impl Judge for FakeJudge {
    async fn judge(&self, question: &str) -> ProbeResult<Verdict> {
        lock(&self.questions).push(question.to_string());
        Ok(Verdict {
            passed: self.passed,
            reasoning: (if self.passed { "looks right" } else { "looks wrong" }).to_string(),
            cost: self.cost,
        })
    }
}

/// Meter whose total grows by `step` on every read
#[derive(Debug, Default)]
pub struct FakeCostMeter {
    step: f64,
    reads: Mutex<u32>,
}

impl FakeCostMeter {
    /// Meter growing by `step` per read
    #[must_use]
    pub fn per_read(step: f64) -> Self {
        Self {
            step,
            reads: Mutex::new(0),
        }
    }
}

#[async_trait]
impl CostMeter for FakeCostMeter {
    async fn spent(&self) -> ProbeResult<f64> {
        let mut reads = lock(&self.reads);
        *reads += 1;
        Ok(f64::from(*reads) * self.step)
    }
}
