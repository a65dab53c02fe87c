//! Probe driving a virtualized container through the channel.

use crate::channel::{evaluate_as, RemoteCall, RemoteExecutionChannel, RemoteFunction};
use crate::result::{ProbeError, ProbeResult};
use crate::virtual_list::performance::ScrollPerformanceSample;
use crate::virtual_list::schema::{RenderedWindow, DEFAULT_ITEM_SELECTOR};
use crate::virtual_list::state::{derive_state, VirtualItem, VirtualListState};
use crate::wait::{
    Deadline, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SCROLL_TIMEOUT_MS, DEFAULT_SEARCH_TIMEOUT_MS,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Logical items advanced per step while searching
pub const SEARCH_STRIDE_ITEMS: f64 = 20.0;

/// Which container to probe and how to recognize its items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOptions {
    /// CSS selector of the scroll container
    pub container: String,
    /// CSS selector of item elements, relative to the container
    pub item: String,
    /// Polling interval for convergence loops
    pub poll_interval_ms: u64,
}

impl ProbeOptions {
    /// Probe `container` with the default item schema
    #[must_use]
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            item: DEFAULT_ITEM_SELECTOR.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// Use a custom item selector
    #[must_use]
    pub fn with_item_selector(mut self, selector: impl Into<String>) -> Self {
        self.item = selector.into();
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }
}

/// Scroll animation style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollBehavior {
    /// Browser default
    #[default]
    Auto,
    /// Animated
    Smooth,
    /// Jump
    Instant,
}

/// Options for [`VirtualListProbe::scroll_to_index`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOptions {
    /// Scroll animation style
    pub behavior: ScrollBehavior,
    /// Convergence budget in milliseconds
    pub timeout_ms: u64,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            behavior: ScrollBehavior::Auto,
            timeout_ms: DEFAULT_SCROLL_TIMEOUT_MS,
        }
    }
}

impl ScrollOptions {
    /// Set scroll behavior
    #[must_use]
    pub const fn with_behavior(mut self, behavior: ScrollBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Options for [`VirtualListProbe::scroll_to_item`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Search budget in milliseconds
    pub timeout_ms: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_SEARCH_TIMEOUT_MS,
        }
    }
}

/// Options for [`VirtualListProbe::measure_scroll_performance`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasureOptions {
    /// Pixels to scroll
    pub scroll_distance: f64,
    /// Scroll duration in milliseconds
    pub duration_ms: u64,
}

impl Default for MeasureOptions {
    fn default() -> Self {
        Self {
            scroll_distance: 5000.0,
            duration_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrollReply {
    found: bool,
    #[serde(default)]
    scroll_top: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeasureReply {
    found: bool,
    #[serde(default)]
    frame_times: Vec<f64>,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    items_rendered: usize,
}

/// Reconstructs and drives a virtualized list or tree
#[derive(Clone)]
pub struct VirtualListProbe {
    channel: Arc<dyn RemoteExecutionChannel>,
    options: ProbeOptions,
}

impl std::fmt::Debug for VirtualListProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualListProbe")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl VirtualListProbe {
    /// Create a probe
    #[must_use]
    pub fn new(channel: Arc<dyn RemoteExecutionChannel>, options: ProbeOptions) -> Self {
        Self { channel, options }
    }

    /// Probe options in use
    #[must_use]
    pub const fn options(&self) -> &ProbeOptions {
        &self.options
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.options.poll_interval_ms)
    }

    fn container_missing(&self) -> ProbeError {
        ProbeError::not_found(format!("container '{}'", self.options.container))
    }

    /// Raw rendered window
    pub async fn sample(&self) -> ProbeResult<RenderedWindow> {
        let call = RemoteCall::new(
            RemoteFunction::SampleWindow,
            json!({ "container": self.options.container, "item": self.options.item }),
        );
        evaluate_as(self.channel.as_ref(), call).await
    }

    /// Sample and derive the current state
    pub async fn state(&self) -> ProbeResult<VirtualListState> {
        let window = self.sample().await?;
        match (window.found, window.container) {
            (true, Some(container)) => Ok(derive_state(&container, &window.items)),
            _ => Err(self.container_missing()),
        }
    }

    async fn scroll(&self, top: Option<f64>, by: Option<f64>, behavior: ScrollBehavior) -> ProbeResult<f64> {
        let call = RemoteCall::new(
            RemoteFunction::ScrollContainer,
            json!({
                "container": self.options.container,
                "top": top,
                "by": by,
                "behavior": behavior,
            }),
        );
        let reply: ScrollReply = evaluate_as(self.channel.as_ref(), call).await?;
        if !reply.found {
            return Err(self.container_missing());
        }
        Ok(reply.scroll_top)
    }

    /// Scroll until `index` is rendered.
    ///
    /// Returns `Ok(false)` when the list does not converge within the budget;
    /// a missed budget is not an error here.
    pub async fn scroll_to_index(&self, index: usize, options: ScrollOptions) -> ProbeResult<bool> {
        let before = self.state().await?;
        let target = index as f64 * before.avg_item_height;
        debug!(index, target, "scrolling to index");
        self.scroll(Some(target), None, options.behavior).await?;

        let deadline = Deadline::after(Duration::from_millis(options.timeout_ms));
        loop {
            let state = self.state().await?;
            if state.contains_index(index) {
                return Ok(true);
            }
            if deadline.expired() {
                warn!(
                    index,
                    start = state.start_index,
                    end = state.end_index,
                    timeout_ms = options.timeout_ms,
                    "list did not converge on index"
                );
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    /// Scroll forward until an item containing `text` is visible.
    ///
    /// The list is exhausted once a stride leaves the scroll offset where it
    /// was and the next sample renders nothing further. Positional indices
    /// repeat from window to window, so the window end alone is not progress.
    pub async fn scroll_to_item(&self, text: &str, options: SearchOptions) -> ProbeResult<VirtualItem> {
        let deadline = Deadline::after(Duration::from_millis(options.timeout_ms));
        let mut last_end: Option<usize> = None;
        let mut stalled = false;
        loop {
            let state = self.state().await?;
            if let Some(item) = state.find_visible(text) {
                return Ok(item.clone());
            }
            if stalled && last_end.is_some_and(|end| state.end_index <= end) {
                return Err(ProbeError::not_found(format!(
                    "item containing '{text}' (stopped at scroll offset {})",
                    state.scroll_top
                )));
            }
            if deadline.expired() {
                return Err(ProbeError::timeout(
                    deadline.budget_ms(),
                    format!("item containing '{text}'"),
                ));
            }
            last_end = Some(state.end_index);
            // never jump past more than one viewport, or short viewports skip items
            let stride = (SEARCH_STRIDE_ITEMS * state.avg_item_height)
                .min(state.client_height.max(state.avg_item_height));
            let scroll_top = self.scroll(None, Some(stride), ScrollBehavior::Instant).await?;
            stalled = scroll_top <= state.scroll_top;
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    /// Scroll to the first item and return the new state
    pub async fn scroll_to_top(&self) -> ProbeResult<VirtualListState> {
        self.scroll(Some(0.0), None, ScrollBehavior::Instant).await?;
        tokio::time::sleep(self.poll_interval()).await;
        self.state().await
    }

    /// Scroll to the end and return the new state
    pub async fn scroll_to_bottom(&self) -> ProbeResult<VirtualListState> {
        let state = self.state().await?;
        self.scroll(Some(state.scroll_height), None, ScrollBehavior::Instant)
            .await?;
        tokio::time::sleep(self.poll_interval()).await;
        self.state().await
    }

    /// Rendered item containing `text`, without scrolling
    pub async fn find_item(&self, text: &str) -> ProbeResult<Option<VirtualItem>> {
        Ok(self.state().await?.find_rendered(text).cloned())
    }

    /// Rendered item at `index`, without scrolling
    pub async fn item_at(&self, index: usize) -> ProbeResult<Option<VirtualItem>> {
        Ok(self.state().await?.item_at(index).cloned())
    }

    /// Run a timed scroll in the page and collect frame statistics.
    ///
    /// A zero duration is a configuration error, and a run that sampled no
    /// frames fails with `InvalidState` rather than reporting zeros.
    pub async fn measure_scroll_performance(
        &self,
        options: MeasureOptions,
    ) -> ProbeResult<ScrollPerformanceSample> {
        if options.duration_ms == 0 {
            return Err(ProbeError::config("scroll measurement duration must be greater than 0 ms"));
        }
        let call = RemoteCall::new(
            RemoteFunction::MeasureScroll,
            json!({
                "container": self.options.container,
                "item": self.options.item,
                "distance": options.scroll_distance,
                "duration": options.duration_ms,
            }),
        );
        let reply: MeasureReply = evaluate_as(self.channel.as_ref(), call).await?;
        if !reply.found {
            return Err(self.container_missing());
        }
        if reply.frame_times.is_empty() {
            return Err(ProbeError::invalid_state(format!(
                "no frames sampled while scrolling '{}' for {} ms",
                self.options.container, options.duration_ms
            )));
        }
        let sample = ScrollPerformanceSample::from_frames(
            &reply.frame_times,
            options.duration_ms,
            reply.duration,
            reply.distance,
            reply.items_rendered,
        );
        debug!(fps = sample.fps, dropped = sample.dropped_frames, "scroll measured");
        Ok(sample)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeChannel, SimulatedList};

    fn probe(list: &Arc<SimulatedList>) -> VirtualListProbe {
        VirtualListProbe::new(list.clone(), ProbeOptions::new("#list"))
    }

    mod state_tests {
        use super::*;

        #[tokio::test]
        async fn test_state_of_simulated_list() {
            let list = Arc::new(SimulatedList::new(1000, 40.0, 400.0));
            let state = probe(&list).state().await.unwrap();
            assert_eq!(state.start_index, 0);
            assert!(state.end_index >= 9);
            assert_eq!(state.total_count, 1000);
            assert!((state.avg_item_height - 40.0).abs() < 1e-9);
        }

        #[tokio::test]
        async fn test_missing_container_is_not_found() {
            let list = Arc::new(SimulatedList::new(10, 40.0, 400.0).without_container());
            let err = probe(&list).state().await.unwrap_err();
            assert!(err.is_not_found());
        }

        #[tokio::test]
        async fn test_item_lookup_without_scrolling() {
            let list = Arc::new(SimulatedList::new(100, 40.0, 400.0));
            let probe = probe(&list);
            assert_eq!(probe.item_at(3).await.unwrap().unwrap().text, "Item 3");
            assert!(probe.find_item("item 80").await.unwrap().is_none());
            assert!(list.scroll_top().abs() < 1e-9);
        }
    }

    mod scroll_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_scroll_to_index_converges() {
            let list = Arc::new(SimulatedList::new(1000, 40.0, 400.0));
            let probe = probe(&list);
            assert!(probe.scroll_to_index(500, ScrollOptions::default()).await.unwrap());
            let state = probe.state().await.unwrap();
            assert!(state.start_index <= 500 && 500 <= state.end_index);
        }

        #[tokio::test(start_paused = true)]
        async fn test_scroll_to_index_gives_up_quietly() {
            let list = Arc::new(SimulatedList::new(1000, 40.0, 400.0).frozen());
            let converged = probe(&list)
                .scroll_to_index(500, ScrollOptions::default().with_timeout(300))
                .await
                .unwrap();
            assert!(!converged);
        }

        #[tokio::test(start_paused = true)]
        async fn test_scroll_to_item_finds_far_item() {
            let list = Arc::new(SimulatedList::new(300, 40.0, 400.0));
            let item = probe(&list)
                .scroll_to_item("item 150", SearchOptions::default())
                .await
                .unwrap();
            assert_eq!(item.index, 150);
            assert!(item.visible);
        }

        #[tokio::test(start_paused = true)]
        async fn test_scroll_to_item_not_found_at_end() {
            let list = Arc::new(SimulatedList::new(60, 40.0, 400.0));
            let err = probe(&list)
                .scroll_to_item("missing", SearchOptions::default())
                .await
                .unwrap_err();
            assert!(err.is_not_found());
        }

        #[tokio::test(start_paused = true)]
        async fn test_scroll_to_item_walks_role_only_list() {
            let list = Arc::new(SimulatedList::new(200, 40.0, 400.0).without_indices());
            let item = probe(&list)
                .scroll_to_item("Item 150", SearchOptions::default())
                .await
                .unwrap();
            assert_eq!(item.text, "Item 150");
            assert!(item.visible);
            assert!(list.scroll_top() > 5000.0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_scroll_to_item_role_only_list_ends_not_found() {
            let list = Arc::new(SimulatedList::new(60, 40.0, 400.0).without_indices());
            let err = probe(&list)
                .scroll_to_item("missing", SearchOptions::default())
                .await
                .unwrap_err();
            assert!(err.is_not_found());
            assert!((list.scroll_top() - 2000.0).abs() < 1e-9);
        }

        #[tokio::test(start_paused = true)]
        async fn test_scroll_to_item_times_out() {
            let list = Arc::new(SimulatedList::new(100_000, 40.0, 400.0));
            let err = probe(&list)
                .scroll_to_item("missing", SearchOptions { timeout_ms: 500 })
                .await
                .unwrap_err();
            assert!(err.is_timeout());
        }

        #[tokio::test(start_paused = true)]
        async fn test_top_and_bottom() {
            let list = Arc::new(SimulatedList::new(200, 40.0, 400.0));
            let probe = probe(&list);
            let bottom = probe.scroll_to_bottom().await.unwrap();
            assert_eq!(bottom.end_index, 199);
            let top = probe.scroll_to_top().await.unwrap();
            assert_eq!(top.start_index, 0);
        }
    }

    mod measure_tests {
        use super::*;

        #[tokio::test]
        async fn test_measure_uses_page_frames() {
            let list = Arc::new(SimulatedList::new(1000, 40.0, 400.0).with_frames(vec![16.0; 100]));
            let sample = probe(&list)
                .measure_scroll_performance(MeasureOptions::default())
                .await
                .unwrap();
            assert!((sample.fps - 50.0).abs() < 1e-9);
            assert_eq!(sample.dropped_frames, 0);
        }

        #[tokio::test]
        async fn test_measure_without_frames_is_invalid_state() {
            let channel = Arc::new(FakeChannel::new());
            channel.respond(
                RemoteFunction::MeasureScroll,
                json!({"found": true, "frameTimes": [], "duration": 0.0, "distance": 0.0}),
            );
            let probe = VirtualListProbe::new(channel, ProbeOptions::new("#list"));
            let err = probe
                .measure_scroll_performance(MeasureOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, ProbeError::InvalidState { .. }));
            assert!(err.to_string().contains("no frames sampled"));
        }

        #[tokio::test]
        async fn test_measure_rejects_zero_duration() {
            let channel = Arc::new(FakeChannel::new());
            let probe = VirtualListProbe::new(channel.clone(), ProbeOptions::new("#list"));
            let err = probe
                .measure_scroll_performance(MeasureOptions {
                    scroll_distance: 1000.0,
                    duration_ms: 0,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, ProbeError::Config { .. }));
            assert!(channel.calls().is_empty());
        }

        #[tokio::test]
        async fn test_measure_without_container_is_not_found() {
            let channel = Arc::new(FakeChannel::new());
            channel.respond(RemoteFunction::MeasureScroll, json!({"found": false}));
            let probe = VirtualListProbe::new(channel, ProbeOptions::new("#gone"));
            let err = probe
                .measure_scroll_performance(MeasureOptions::default())
                .await
                .unwrap_err();
            assert!(err.is_not_found());
        }
    }
}
