//! Remote side of the interception engine.
//!
//! - [`RemoteBridge`] calls the application's real bridge entry point.
//! - [`RemoteEventSink`] delivers emitted events to the application.
//! - [`RemoteShim`] installs a closed instruction set into the page so calls
//!   made by the application's own UI code are substituted and recorded.
//!
//! Mocks cross the channel as data ([`RemoteMockSpec`]); no closure or code
//! text is ever shipped.

use crate::channel::{evaluate_as, RemoteCall, RemoteExecutionChannel, RemoteFunction};
use crate::ipc::engine::{Bridge, EventSink};
use crate::ipc::record::{InvokeRecord, RecordOrigin};
use crate::result::{ProbeError, ProbeResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Paths of the application's bridge globals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTarget {
    /// Dotted path of the invocation entry point, relative to `window`
    pub invoke_path: String,
    /// Dotted path of the event emitter, relative to `window`
    pub emit_path: String,
}

impl Default for BridgeTarget {
    fn default() -> Self {
        Self {
            invoke_path: "__TAURI_INTERNALS__.invoke".to_string(),
            emit_path: "__TAURI__.event.emit".to_string(),
        }
    }
}

/// Closed instruction set interpreted by the in-page shim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteInstruction {
    /// Respond with a value
    Respond {
        /// Response value
        value: Value,
    },
    /// Respond with an error
    Reject {
        /// Error message
        message: String,
    },
    /// Wait, then run another instruction
    Delay {
        /// Delay in milliseconds
        ms: u64,
        /// Instruction to run afterwards
        then: Box<RemoteInstruction>,
    },
    /// Respond by looking one argument up in a table
    Lookup {
        /// Argument key
        arg: String,
        /// Responses keyed by argument value
        table: BTreeMap<String, Value>,
        /// Response when the key is absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<Value>,
    },
}

/// A mock entry in shippable form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMockSpec {
    /// Command name
    pub command: String,
    /// What to do when matched
    pub instruction: RemoteInstruction,
    /// Remove after first match
    pub once: bool,
    /// Partial-equality filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_args: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    unavailable: bool,
}

/// The application's real bridge, reached through the channel
#[derive(Clone)]
pub struct RemoteBridge {
    channel: Arc<dyn RemoteExecutionChannel>,
    target: BridgeTarget,
}

impl std::fmt::Debug for RemoteBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteBridge")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl RemoteBridge {
    /// Create a bridge over `channel`
    #[must_use]
    pub fn new(channel: Arc<dyn RemoteExecutionChannel>, target: BridgeTarget) -> Self {
        Self { channel, target }
    }
}

#[async_trait]
impl Bridge for RemoteBridge {
    async fn invoke(&self, command: &str, args: &Value) -> ProbeResult<Value> {
        let call = RemoteCall::new(
            RemoteFunction::BridgeInvoke,
            json!({ "path": self.target.invoke_path, "command": command, "args": args }),
        );
        let reply: BridgeReply = evaluate_as(self.channel.as_ref(), call).await?;
        if reply.unavailable {
            return Err(ProbeError::BridgeUnavailable {
                command: command.to_string(),
            });
        }
        if reply.ok {
            Ok(reply.value)
        } else {
            Err(ProbeError::Bridge {
                command: command.to_string(),
                message: reply.error.unwrap_or_default(),
            })
        }
    }
}

/// The application's event surface, reached through the channel
#[derive(Clone)]
pub struct RemoteEventSink {
    channel: Arc<dyn RemoteExecutionChannel>,
    target: BridgeTarget,
}

impl std::fmt::Debug for RemoteEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEventSink")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl RemoteEventSink {
    /// Create a sink over `channel`
    #[must_use]
    pub fn new(channel: Arc<dyn RemoteExecutionChannel>, target: BridgeTarget) -> Self {
        Self { channel, target }
    }
}

#[async_trait]
impl EventSink for RemoteEventSink {
    async fn dispatch(&self, event: &str, payload: &Value) -> ProbeResult<()> {
        let call = RemoteCall::new(
            RemoteFunction::EmitEvent,
            json!({ "path": self.target.emit_path, "event": event, "payload": payload }),
        );
        self.channel.evaluate(call).await?;
        Ok(())
    }
}

/// Outcome of installing the shim
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShimStatus {
    /// Whether the shim is now active
    pub installed: bool,
    /// Whether an already-installed shim had its table replaced
    #[serde(default)]
    pub reused: bool,
    /// Number of mocks in the installed table
    #[serde(default)]
    pub mocks: usize,
    /// Why installation failed
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShimRecord {
    command: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    response: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    intercepted: bool,
}

/// In-page interception shim
#[derive(Clone)]
pub struct RemoteShim {
    channel: Arc<dyn RemoteExecutionChannel>,
    target: BridgeTarget,
}

impl std::fmt::Debug for RemoteShim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteShim")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl RemoteShim {
    /// Create a shim handle over `channel`
    #[must_use]
    pub fn new(channel: Arc<dyn RemoteExecutionChannel>, target: BridgeTarget) -> Self {
        Self { channel, target }
    }

    /// Install the shim, or replace the mock table of an installed one
    pub async fn install(&self, mocks: &[RemoteMockSpec]) -> ProbeResult<ShimStatus> {
        let call = RemoteCall::new(
            RemoteFunction::InstallShim,
            json!({ "path": self.target.invoke_path, "mocks": mocks }),
        );
        let status: ShimStatus = evaluate_as(self.channel.as_ref(), call).await?;
        if !status.installed {
            return Err(ProbeError::invalid_state(format!(
                "interception shim not installed: {}",
                status.reason.as_deref().unwrap_or("unknown reason")
            )));
        }
        Ok(status)
    }

    /// Restore the original entry point
    pub async fn uninstall(&self) -> ProbeResult<()> {
        self.channel
            .evaluate(RemoteCall::bare(RemoteFunction::UninstallShim))
            .await?;
        Ok(())
    }

    /// Take the calls recorded in the page since the last drain.
    ///
    /// Records are stamped with `now_ms` on the session clock; the page's
    /// own clock is not comparable with it.
    pub async fn drain(&self, now_ms: u64) -> ProbeResult<Vec<InvokeRecord>> {
        let raw: Vec<ShimRecord> = evaluate_as(
            self.channel.as_ref(),
            RemoteCall::bare(RemoteFunction::DrainShimHistory),
        )
        .await?;
        Ok(raw
            .into_iter()
            .map(|r| InvokeRecord {
                command: r.command,
                args: r.args,
                response: if r.error.is_some() { None } else { r.response },
                error: r.error,
                timestamp_ms: now_ms,
                duration_ms: r.duration,
                intercepted: r.intercepted,
                origin: RecordOrigin::Remote,
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testing::FakeChannel;

    fn channel() -> Arc<FakeChannel> {
        Arc::new(FakeChannel::new())
    }

    #[test]
    fn test_instruction_wire_format() {
        let spec = RemoteMockSpec {
            command: "open_project".to_string(),
            instruction: RemoteInstruction::Delay {
                ms: 20,
                then: Box::new(RemoteInstruction::Respond {
                    value: json!({"files_count": 3}),
                }),
            },
            once: true,
            match_args: None,
        };
        let wire = serde_json::to_value(&spec).unwrap();
        assert_eq!(wire["instruction"]["op"], "delay");
        assert_eq!(wire["instruction"]["then"]["op"], "respond");
        assert!(wire.get("matchArgs").is_none());
        let back: RemoteMockSpec = serde_json::from_value(wire).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_lookup_fallback_absent_when_none() {
        let wire = serde_json::to_value(RemoteInstruction::Lookup {
            arg: "id".to_string(),
            table: BTreeMap::new(),
            fallback: None,
        })
        .unwrap();
        assert!(wire.get("fallback").is_none());
    }

    #[tokio::test]
    async fn test_remote_bridge_success() {
        let ch = channel();
        ch.respond(RemoteFunction::BridgeInvoke, json!({"ok": true, "value": [1, 2]}));
        let bridge = RemoteBridge::new(ch.clone(), BridgeTarget::default());
        let value = bridge.invoke("list", &json!({})).await.unwrap();
        assert_eq!(value, json!([1, 2]));

        let sent = ch.calls();
        assert_eq!(sent[0].args["command"], "list");
        assert_eq!(sent[0].args["path"], "__TAURI_INTERNALS__.invoke");
    }

    #[tokio::test]
    async fn test_remote_bridge_rejection() {
        let ch = channel();
        ch.respond(RemoteFunction::BridgeInvoke, json!({"ok": false, "error": "denied"}));
        let bridge = RemoteBridge::new(ch, BridgeTarget::default());
        let err = bridge.invoke("rm", &json!({})).await.unwrap_err();
        assert_eq!(err.bridge_message(), "denied");
    }

    #[tokio::test]
    async fn test_remote_bridge_unavailable() {
        let ch = channel();
        ch.respond(RemoteFunction::BridgeInvoke, json!({"ok": false, "unavailable": true}));
        let bridge = RemoteBridge::new(ch, BridgeTarget::default());
        let err = bridge.invoke("rm", &json!({})).await.unwrap_err();
        assert!(matches!(err, ProbeError::BridgeUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_shim_install_failure_is_reported() {
        let ch = channel();
        ch.respond(
            RemoteFunction::InstallShim,
            json!({"installed": false, "reason": "bridge entry point not found"}),
        );
        let shim = RemoteShim::new(ch, BridgeTarget::default());
        let err = shim.install(&[]).await.unwrap_err();
        assert!(err.to_string().contains("entry point not found"));
    }

    #[tokio::test]
    async fn test_shim_drain_maps_records() {
        let ch = channel();
        ch.respond(
            RemoteFunction::DrainShimHistory,
            json!([
                {"command": "open_project", "args": {"path": "/p"}, "response": {"files_count": 3},
                 "timestamp": 1_700_000_000_000_u64, "duration": 1.5, "intercepted": true},
                {"command": "save", "args": null, "error": "disk full", "intercepted": false}
            ]),
        );
        let shim = RemoteShim::new(ch, BridgeTarget::default());
        let records = shim.drain(42).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp_ms, 42);
        assert_eq!(records[0].origin, RecordOrigin::Remote);
        assert!(records[0].intercepted);
        assert_eq!(records[1].error.as_deref(), Some("disk full"));
        assert!(records[1].response.is_none());
    }
}
