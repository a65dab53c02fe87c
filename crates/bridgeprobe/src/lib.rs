//! Bridgeprobe: end-to-end verification for web-rendered desktop applications
//!
//! Bridgeprobe drives a running application through a single remote
//! execution channel and offers three capabilities on top of it:
//!
//! - **IPC interception** - mock, record, replay and assert calls across the
//!   frontend-to-backend command bridge
//! - **Virtualized list probing** - reconstruct the logical state of lists and
//!   trees that only render a window of their items
//! - **Test running** - retries, timeouts, recording and reporting
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     BRIDGEPROBE Architecture                    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌─────────────────────┐   │
//! │   │ Runner     │───►│ TestContext│───►│ IpcEngine           │   │
//! │   │ (retries,  │    │            │    │ VirtualListProbe    │   │
//! │   │  timeouts) │    └────────────┘    └──────────┬──────────┘   │
//! │   └────────────┘                                 │ RemoteCall   │
//! │                                      ┌───────────▼──────────┐   │
//! │                                      │ RemoteExecution      │   │
//! │                                      │ Channel (CDP / fake) │   │
//! │                                      └──────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Remote execution channel between the core and the application
pub mod channel;

/// Runner configuration (YAML file plus environment overrides)
pub mod config;

/// IPC interception, mocking, recording and replay
pub mod ipc;

/// Structured logging setup
pub mod logging;

mod result;

/// Test lifecycle runner
pub mod runner;

/// Scripted channels, bridges and collaborators for tests
pub mod testing;

/// Virtualized list and tree probing
pub mod virtual_list;

/// Polling, deadlines and the session clock
pub mod wait;

pub use channel::{evaluate_as, ChannelError, RemoteCall, RemoteExecutionChannel, RemoteFunction};
#[cfg(feature = "browser")]
pub use channel::{CdpChannel, CdpConnector};
pub use config::{Mode, RunnerConfig};
pub use ipc::{
    Bridge, BridgeTarget, EventRecord, EventSink, InvokeExpectation, InvokeRecord,
    InvokeWaitOptions, IpcCassette, IpcEngine, MockConfig,
};
pub use logging::{init_logging, LogFormat};
pub use result::{ProbeError, ProbeResult};
pub use runner::{
    exit_code, Runner, SuiteResult, TestCase, TestContext, TestResult, TestStatus, TestSuite,
};
pub use virtual_list::{
    ProbeOptions, ScrollPerformanceSample, VirtualItem, VirtualListProbe, VirtualListState,
};
pub use wait::WaitOptions;

/// Everything a test suite usually needs
pub mod prelude {
    pub use super::channel::*;
    pub use super::config::*;
    pub use super::ipc::*;
    pub use super::logging::*;
    pub use super::result::*;
    pub use super::runner::*;
    pub use super::virtual_list::*;
    pub use super::wait::*;
    pub use futures::FutureExt;
    pub use serde_json::json;
}
