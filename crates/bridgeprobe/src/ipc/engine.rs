//! IPC interception engine.
//!
//! Sits in front of the application's bridge and decides, per call, whether
//! a registered mock answers or the original bridge does. Every call made
//! while interception is active is recorded, including calls that fail.

use crate::ipc::assert::{self, InvokeExpectation};
use crate::ipc::mock::{args_match, MockConfig, MockEntry};
use crate::ipc::record::{EventRecord, InvokeRecord, Log, RecordOrigin};
use crate::ipc::remote::RemoteShim;
use crate::result::{ProbeError, ProbeResult};
use crate::wait::{SessionClock, WaitOptions};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// The application's bridge invocation entry point
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Invoke a named command
    async fn invoke(&self, command: &str, args: &Value) -> ProbeResult<Value>;
}

/// The application's event surface
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event
    async fn dispatch(&self, event: &str, payload: &Value) -> ProbeResult<()>;
}

/// Options for [`IpcEngine::wait_for_invoke`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeWaitOptions {
    /// Timeout and polling interval
    pub wait: WaitOptions,
    /// Only accept calls whose arguments contain these pairs
    pub match_args: Option<Value>,
}

impl InvokeWaitOptions {
    /// Set the timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.wait.timeout_ms = timeout_ms;
        self
    }

    /// Require matching arguments
    #[must_use]
    pub fn with_match_args(mut self, args: Value) -> Self {
        self.match_args = Some(args);
        self
    }
}

/// Intercepts, mocks and records bridge calls
pub struct IpcEngine {
    original: Option<Arc<dyn Bridge>>,
    installed: bool,
    sink: Option<Arc<dyn EventSink>>,
    shim: Option<RemoteShim>,
    shim_stale: bool,
    mocks: BTreeMap<String, MockEntry>,
    history: Log<InvokeRecord>,
    events: Log<EventRecord>,
    clock: SessionClock,
}

impl std::fmt::Debug for IpcEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcEngine")
            .field("installed", &self.installed)
            .field("has_original", &self.original.is_some())
            .field("has_shim", &self.shim.is_some())
            .field("mocks", &self.mocks.keys().collect::<Vec<_>>())
            .field("history_len", &self.history.len())
            .field("events_len", &self.events.len())
            .finish()
    }
}

impl Default for IpcEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IpcEngine {
    /// Create an engine with interception inactive
    #[must_use]
    pub fn new() -> Self {
        Self {
            original: None,
            installed: false,
            sink: None,
            shim: None,
            shim_stale: false,
            mocks: BTreeMap::new(),
            history: Log::new(),
            events: Log::new(),
            clock: SessionClock::start(),
        }
    }

    /// Deliver emitted events through `sink`
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Mirror the mock table into the application through `shim`
    #[must_use]
    pub fn with_shim(mut self, shim: RemoteShim) -> Self {
        self.shim = Some(shim);
        self.shim_stale = true;
        self
    }

    /// Use an existing clock, so records share a time base with other components
    #[must_use]
    pub const fn with_clock(mut self, clock: SessionClock) -> Self {
        self.clock = clock;
        self
    }

    /// Store `original` and activate interception.
    ///
    /// Returns `false` (and keeps the first original) if already installed.
    pub fn install(&mut self, original: Arc<dyn Bridge>) -> bool {
        if self.installed {
            return false;
        }
        self.original = Some(original);
        self.installed = true;
        debug!("ipc interception installed");
        true
    }

    /// Deactivate interception and hand the original back.
    ///
    /// The original stays reachable: uninstalled calls are delegated to it
    /// without being recorded.
    pub fn uninstall(&mut self) -> Option<Arc<dyn Bridge>> {
        if !self.installed {
            return None;
        }
        self.installed = false;
        debug!("ipc interception uninstalled");
        self.original.clone()
    }

    /// Whether interception is active
    #[must_use]
    pub const fn is_installed(&self) -> bool {
        self.installed
    }

    /// Session clock used for every record
    #[must_use]
    pub const fn clock(&self) -> SessionClock {
        self.clock
    }

    // ========================================================================
    // Mock table
    // ========================================================================

    /// Register (or replace) the mock for `command`
    pub fn mock(&mut self, command: impl Into<String>, config: MockConfig) {
        let command = command.into();
        if self.shim.is_some() && config.handler.is_some() {
            warn!(
                command = %command,
                "handler mock cannot be installed into the application; only local calls are substituted"
            );
        }
        self.mocks
            .insert(command.clone(), MockEntry::new(command, config));
        self.shim_stale = true;
    }

    /// Mock `command` with a canned response
    pub fn mock_response(&mut self, command: impl Into<String>, response: Value) {
        self.mock(command, MockConfig::response(response));
    }

    /// Mock `command` to fail with `message`
    pub fn mock_error(&mut self, command: impl Into<String>, message: impl Into<String>) {
        self.mock(command, MockConfig::error(message));
    }

    /// Mock `command` with a response used for one call only
    pub fn mock_once(&mut self, command: impl Into<String>, response: Value) {
        self.mock(command, MockConfig::response(response).once());
    }

    /// Remove the mock for `command`; no error if there is none
    pub fn unmock(&mut self, command: &str) {
        if self.mocks.remove(command).is_some() {
            self.shim_stale = true;
        }
    }

    /// Remove every mock
    pub fn clear_mocks(&mut self) {
        if !self.mocks.is_empty() {
            self.shim_stale = true;
        }
        self.mocks.clear();
    }

    /// Whether `command` has a live mock
    #[must_use]
    pub fn is_mocked(&self, command: &str) -> bool {
        self.mocks.contains_key(command)
    }

    /// Number of live mocks
    #[must_use]
    pub fn mock_count(&self) -> usize {
        self.mocks.len()
    }

    // ========================================================================
    // Invocation
    // ========================================================================

    /// Invoke a bridge command through the engine
    pub async fn invoke(&mut self, command: &str, args: Value) -> ProbeResult<Value> {
        if !self.installed {
            return match &self.original {
                Some(original) => original.invoke(command, &args).await,
                None => Err(ProbeError::BridgeUnavailable {
                    command: command.to_string(),
                }),
            };
        }

        let timestamp_ms = self.clock.now_ms();
        let started = Instant::now();

        let matched = self
            .mocks
            .get(command)
            .filter(|entry| entry.matches(&args))
            .cloned();

        let Some(entry) = matched else {
            let outcome = match &self.original {
                Some(original) => original.invoke(command, &args).await,
                None => Err(ProbeError::BridgeUnavailable {
                    command: command.to_string(),
                }),
            };
            debug!(command, ok = outcome.is_ok(), "delegated bridge call");
            let (response, error) = match &outcome {
                Ok(value) => (Some(value.clone()), None),
                Err(e) => (None, Some(e.bridge_message())),
            };
            self.history.push(InvokeRecord {
                command: command.to_string(),
                args,
                response,
                error,
                timestamp_ms,
                duration_ms: Some(elapsed_ms(started)),
                intercepted: false,
                origin: RecordOrigin::Local,
            });
            return outcome;
        };

        if let Some(delay) = entry.config.delay {
            tokio::time::sleep(delay).await;
        }
        let resolved = entry.resolve(args.clone()).await;
        debug!(command, ok = resolved.is_ok(), "mocked bridge call");

        let (response, error) = match &resolved {
            Ok(value) => (Some(value.clone()), None),
            Err(message) => (None, Some(message.clone())),
        };
        self.history.push(InvokeRecord {
            command: command.to_string(),
            args,
            response,
            error,
            timestamp_ms,
            duration_ms: Some(elapsed_ms(started)),
            intercepted: true,
            origin: RecordOrigin::Local,
        });

        if entry.config.once {
            self.mocks.remove(command);
            self.shim_stale = true;
        }

        resolved.map_err(|message| ProbeError::Mock {
            command: command.to_string(),
            message,
        })
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Recorded calls, optionally only those for `command`
    #[must_use]
    pub fn history(&self, command: Option<&str>) -> Vec<&InvokeRecord> {
        self.history
            .as_slice()
            .iter()
            .filter(|r| command.map_or(true, |c| r.command == c))
            .collect()
    }

    /// Every recorded call, in order
    #[must_use]
    pub fn records(&self) -> &[InvokeRecord] {
        self.history.as_slice()
    }

    /// Forget recorded calls
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Assert `command` was called, subject to `expectation`
    pub fn assert_invoked(&self, command: &str, expectation: InvokeExpectation) -> ProbeResult<()> {
        assert::assert_invoked(self.records(), command, expectation)
    }

    /// Assert some call to `command` had arguments partially matching `args`
    pub fn assert_invoked_with(&self, command: &str, args: &Value) -> ProbeResult<()> {
        assert::assert_invoked_with(self.records(), command, args)
    }

    /// Assert `command` was never called
    pub fn assert_not_invoked(&self, command: &str) -> ProbeResult<()> {
        assert::assert_not_invoked(self.records(), command)
    }

    /// Wait until a call to `command` shows up in the history.
    ///
    /// Earlier calls count. With a shim attached, the page's records are
    /// pulled in on every poll.
    pub async fn wait_for_invoke(
        &mut self,
        command: &str,
        options: InvokeWaitOptions,
    ) -> ProbeResult<InvokeRecord> {
        let deadline = options.wait.deadline();
        loop {
            if self.shim.is_some() {
                self.drain_remote_history().await?;
            }
            let found = self.history.as_slice().iter().find(|r| {
                r.command == command
                    && options
                        .match_args
                        .as_ref()
                        .map_or(true, |expected| args_match(expected, &r.args))
            });
            if let Some(record) = found {
                return Ok(record.clone());
            }
            if deadline.expired() {
                return Err(ProbeError::timeout(
                    deadline.budget_ms(),
                    format!("invoke of '{command}'"),
                ));
            }
            tokio::time::sleep(options.wait.poll_interval()).await;
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Record an event and try to deliver it to the application
    pub async fn emit(&mut self, event: &str, payload: Value) -> EventRecord {
        let timestamp_ms = self.clock.now_ms();
        let delivered = match &self.sink {
            Some(sink) => match sink.dispatch(event, &payload).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(event, error = %e, "event delivery failed");
                    false
                }
            },
            None => false,
        };
        self.events
            .push(EventRecord {
                event: event.to_string(),
                payload,
                timestamp_ms,
                delivered,
            })
            .clone()
    }

    /// Recorded events, optionally only those named `event`
    #[must_use]
    pub fn events(&self, event: Option<&str>) -> Vec<&EventRecord> {
        self.events
            .as_slice()
            .iter()
            .filter(|r| event.map_or(true, |e| r.event == e))
            .collect()
    }

    /// Forget recorded events
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    // ========================================================================
    // Remote shim
    // ========================================================================

    /// Push the current mock table to the application if it changed
    pub async fn sync_remote(&mut self) -> ProbeResult<()> {
        let Some(shim) = &self.shim else {
            return Ok(());
        };
        if !self.shim_stale {
            return Ok(());
        }
        let specs: Vec<_> = self.mocks.values().filter_map(MockEntry::to_remote).collect();
        let status = shim.install(&specs).await?;
        debug!(mocks = status.mocks, reused = status.reused, "shim synchronized");
        self.shim_stale = false;
        Ok(())
    }

    /// Pull calls the application made through the shim into the history.
    ///
    /// Returns how many records were added.
    pub async fn drain_remote_history(&mut self) -> ProbeResult<usize> {
        self.sync_remote().await?;
        let Some(shim) = &self.shim else {
            return Ok(0);
        };
        let records = shim.drain(self.clock.now_ms()).await?;
        let count = records.len();
        self.ingest_remote(records);
        Ok(count)
    }

    /// Append records captured outside the engine.
    ///
    /// A `once` mock consumed in the page is removed locally too.
    pub fn ingest_remote(&mut self, records: Vec<InvokeRecord>) {
        for mut record in records {
            record.origin = RecordOrigin::Remote;
            if record.intercepted {
                let consumed = self
                    .mocks
                    .get(&record.command)
                    .is_some_and(|entry| entry.config.once && entry.matches(&record.args));
                if consumed {
                    self.mocks.remove(&record.command);
                }
            }
            self.history.push(record);
        }
    }

    /// Remove the shim from the application
    pub async fn detach_remote(&mut self) -> ProbeResult<()> {
        if let Some(shim) = &self.shim {
            shim.uninstall().await?;
            self.shim_stale = true;
        }
        Ok(())
    }

    /// Clear mocks, history and events
    pub fn reset(&mut self) {
        self.clear_mocks();
        self.clear_history();
        self.clear_events();
        self.shim_stale = self.shim.is_some();
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
