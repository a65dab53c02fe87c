//! IPC interception, mocking, recording and replay.
//!
//! ```text
//! test body ──invoke──► IpcEngine ──► mock table ──► response / error
//!                           │               └─ miss ─► original Bridge
//!                           └──► history (InvokeRecord, append-only)
//! ```

mod assert;
mod engine;
mod mock;
mod record;
mod remote;
mod replay;

pub use assert::{assert_invoked, assert_invoked_with, assert_not_invoked, InvokeExpectation};
pub use engine::{Bridge, EventSink, InvokeWaitOptions, IpcEngine};
pub use mock::{args_match, ArgLookup, MockConfig, MockEntry, MockHandler};
pub use record::{EventRecord, InvokeRecord, RecordOrigin};
pub use remote::{
    BridgeTarget, RemoteBridge, RemoteEventSink, RemoteInstruction, RemoteMockSpec, RemoteShim,
    ShimStatus,
};
pub use replay::{CassetteEntry, IpcCassette, CASSETTE_FORMAT_VERSION};
