//! External collaborators the runner drives but does not implement.

use crate::channel::{ChannelError, RemoteExecutionChannel};
use crate::result::ProbeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Establishes the suite's channel to the application
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and verify the session is usable
    async fn connect(&self) -> Result<Arc<dyn RemoteExecutionChannel>, ChannelError>;
}

/// Records each test attempt (screen video or similar)
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Start recording `test_name` into `dir`
    async fn start(&self, test_name: &str, dir: &Path) -> ProbeResult<()>;

    /// Stop recording; returns the artifact path, if one was produced
    async fn stop(&self) -> ProbeResult<Option<PathBuf>>;
}

/// Answer from a [`Judge`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the judge considers the check passed
    pub passed: bool,
    /// Free-form explanation
    pub reasoning: String,
    /// Opaque cost of producing the verdict
    pub cost: f64,
}

/// Fallback judgment for checks without a structured assertion
#[async_trait]
pub trait Judge: Send + Sync {
    /// Ask one question about the application's current state
    async fn judge(&self, question: &str) -> ProbeResult<Verdict>;
}

/// Reads a running cost total, e.g. from a billing endpoint
#[async_trait]
pub trait CostMeter: Send + Sync {
    /// Total spent so far
    async fn spent(&self) -> ProbeResult<f64>;
}
