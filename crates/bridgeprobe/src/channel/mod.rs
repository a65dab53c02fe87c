//! Remote Execution Channel
//!
//! The single boundary between the verification core and the running
//! application. A channel evaluates a [`RemoteCall`] (a fixed, named remote
//! function plus a JSON argument payload) and returns a JSON value.
//!
//! ```text
//! ┌──────────────┐   RemoteCall    ┌────────────────────┐
//! │ IpcEngine    │ ──────────────► │ RemoteExecution    │ ──► webview
//! │ ListProbe    │ ◄────────────── │ Channel (CDP, fake)│
//! └──────────────┘   JSON value    └────────────────────┘
//! ```
//!
//! Channels are strictly request/response. Callers never hold more than one
//! evaluation in flight.

#[cfg(feature = "browser")]
mod cdp;
mod scripts;

#[cfg(feature = "browser")]
pub use cdp::{CdpChannel, CdpConnector};

use crate::result::{ProbeError, ProbeResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Remote execution channel failures
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// Could not establish the session
    #[error("failed to connect to {endpoint}: {message}")]
    Connect {
        /// Endpoint that was dialled
        endpoint: String,
        /// Error message
        message: String,
    },

    /// The session went away
    #[error("disconnected: {message}")]
    Disconnected {
        /// Error message
        message: String,
    },

    /// The remote function threw or could not be run
    #[error("evaluation of {function} failed: {message}")]
    Evaluation {
        /// Remote function name
        function: String,
        /// Error message
        message: String,
    },

    /// The returned value did not have the expected shape
    #[error("could not decode result of {function}: {message}")]
    Decode {
        /// Remote function name
        function: String,
        /// Error message
        message: String,
    },
}

impl ChannelError {
    /// Create a disconnected error
    #[must_use]
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::Disconnected {
            message: message.into(),
        }
    }

    /// Create an evaluation error
    #[must_use]
    pub fn evaluation(function: RemoteFunction, message: impl Into<String>) -> Self {
        Self::Evaluation {
            function: function.name().to_string(),
            message: message.into(),
        }
    }
}

/// Fixed set of functions the core evaluates remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteFunction {
    /// Liveness check used during connection
    Ping,
    /// Call the application's real bridge entry point
    BridgeInvoke,
    /// Deliver an event through the application's event surface
    EmitEvent,
    /// Install (or refresh) the in-page interception shim
    InstallShim,
    /// Remove the in-page interception shim
    UninstallShim,
    /// Take and clear the shim's recorded calls
    DrainShimHistory,
    /// Sample the rendered window of a virtualized container
    SampleWindow,
    /// Scroll a container
    ScrollContainer,
    /// Time-boxed scroll with per-frame sampling
    MeasureScroll,
}

impl RemoteFunction {
    /// Stable name used in logs and errors
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::BridgeInvoke => "bridge_invoke",
            Self::EmitEvent => "emit_event",
            Self::InstallShim => "install_shim",
            Self::UninstallShim => "uninstall_shim",
            Self::DrainShimHistory => "drain_shim_history",
            Self::SampleWindow => "sample_window",
            Self::ScrollContainer => "scroll_container",
            Self::MeasureScroll => "measure_scroll",
        }
    }

    /// Function declaration run on the remote side
    #[must_use]
    pub const fn declaration(&self) -> &'static str {
        match self {
            Self::Ping => scripts::PING,
            Self::BridgeInvoke => scripts::BRIDGE_INVOKE,
            Self::EmitEvent => scripts::EMIT_EVENT,
            Self::InstallShim => scripts::INSTALL_SHIM,
            Self::UninstallShim => scripts::UNINSTALL_SHIM,
            Self::DrainShimHistory => scripts::DRAIN_SHIM_HISTORY,
            Self::SampleWindow => scripts::SAMPLE_WINDOW,
            Self::ScrollContainer => scripts::SCROLL_CONTAINER,
            Self::MeasureScroll => scripts::MEASURE_SCROLL,
        }
    }

    /// Whether the declaration returns a promise that must be awaited
    #[must_use]
    pub const fn is_async(&self) -> bool {
        matches!(
            self,
            Self::BridgeInvoke | Self::EmitEvent | Self::MeasureScroll
        )
    }
}

impl std::fmt::Display for RemoteFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A remote function reference plus its serializable argument payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCall {
    /// Function to run
    pub function: RemoteFunction,
    /// Argument object passed to the function
    pub args: Value,
}

impl RemoteCall {
    /// Create a call with a ready-made JSON payload
    #[must_use]
    pub const fn new(function: RemoteFunction, args: Value) -> Self {
        Self { function, args }
    }

    /// Create a call with no arguments
    #[must_use]
    pub const fn bare(function: RemoteFunction) -> Self {
        Self {
            function,
            args: Value::Null,
        }
    }

    /// Create a call by serializing a typed payload
    pub fn with_payload<T: Serialize>(function: RemoteFunction, payload: &T) -> ProbeResult<Self> {
        Ok(Self {
            function,
            args: serde_json::to_value(payload)?,
        })
    }
}

/// Evaluates remote calls against the live application.
///
/// # Implementations
///
/// - `CdpChannel` - Chrome DevTools Protocol via chromiumoxide (`browser` feature)
/// - `testing::FakeChannel` / `testing::SimulatedList` - scripted, for unit tests
#[async_trait]
pub trait RemoteExecutionChannel: Send + Sync {
    /// Evaluate one call and return its JSON result
    async fn evaluate(&self, call: RemoteCall) -> Result<Value, ChannelError>;
}

/// Evaluate a call and decode its result into `T`
pub async fn evaluate_as<T: DeserializeOwned>(
    channel: &dyn RemoteExecutionChannel,
    call: RemoteCall,
) -> ProbeResult<T> {
    let function = call.function;
    let value = channel.evaluate(call).await?;
    serde_json::from_value(value).map_err(|e| {
        ProbeError::Channel(ChannelError::Decode {
            function: function.name().to_string(),
            message: e.to_string(),
        })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::testing::FakeChannel;
    use serde_json::json;

    #[test]
    fn test_every_function_has_a_declaration() {
        let all = [
            RemoteFunction::Ping,
            RemoteFunction::BridgeInvoke,
            RemoteFunction::EmitEvent,
            RemoteFunction::InstallShim,
            RemoteFunction::UninstallShim,
            RemoteFunction::DrainShimHistory,
            RemoteFunction::SampleWindow,
            RemoteFunction::ScrollContainer,
            RemoteFunction::MeasureScroll,
        ];
        for function in all {
            assert!(function.declaration().contains("function"));
            assert!(!function.name().is_empty());
        }
    }

    #[test]
    fn test_async_declarations_are_marked() {
        assert!(RemoteFunction::MeasureScroll.is_async());
        assert!(RemoteFunction::MeasureScroll.declaration().contains("Promise"));
        assert!(!RemoteFunction::SampleWindow.is_async());
    }

    #[test]
    fn test_payload_is_structured() {
        #[derive(Serialize)]
        struct Payload<'a> {
            container: &'a str,
        }
        let call = RemoteCall::with_payload(
            RemoteFunction::SampleWindow,
            &Payload {
                container: "'); alert(1); ('",
            },
        )
        .unwrap();
        assert_eq!(call.args["container"], "'); alert(1); ('");
        assert!(!call.function.declaration().contains("alert"));
    }

    #[tokio::test]
    async fn test_evaluate_as_decodes() {
        let channel = FakeChannel::new();
        channel.respond(RemoteFunction::Ping, json!({"ready": "complete", "url": "tauri://localhost"}));

        #[derive(Deserialize)]
        struct Ping {
            ready: String,
        }
        let ping: Ping = evaluate_as(&channel, RemoteCall::bare(RemoteFunction::Ping))
            .await
            .unwrap();
        assert_eq!(ping.ready, "complete");
    }

    #[tokio::test]
    async fn test_evaluate_as_reports_decode_errors() {
        let channel = FakeChannel::new();
        channel.respond(RemoteFunction::Ping, json!(42));

        #[derive(Debug, Deserialize)]
        struct Ping {
            #[allow(dead_code)]
            ready: String,
        }
        let err = evaluate_as::<Ping>(&channel, RemoteCall::bare(RemoteFunction::Ping))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProbeError::Channel(ChannelError::Decode { .. })
        ));
    }
}
