//! Recorded bridge traffic, saved and replayed.
//!
//! A cassette is a JSON file holding the outcome of every call in a recorded
//! history. Replaying it registers one mock per command that hands out the
//! recorded outcomes for that command in their original order, each only to
//! a call whose arguments match the recorded ones.

use crate::ipc::engine::IpcEngine;
use crate::ipc::mock::{args_match, MockConfig};
use crate::ipc::record::InvokeRecord;
use crate::result::{ProbeError, ProbeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Version of the cassette format
pub const CASSETTE_FORMAT_VERSION: u32 = 1;

/// One recorded call outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CassetteEntry {
    /// Command name
    pub command: String,
    /// Arguments the call was made with
    pub args: Value,
    /// Recorded response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Recorded error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CassetteEntry {
    fn outcome(&self) -> Result<Value, String> {
        match &self.error {
            Some(message) => Err(message.clone()),
            None => Ok(self.response.clone().unwrap_or(Value::Null)),
        }
    }
}

/// Saved bridge traffic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpcCassette {
    /// Format version
    pub version: u32,
    /// When the traffic was captured
    pub recorded_at: DateTime<Utc>,
    /// Outcomes in call order
    pub entries: Vec<CassetteEntry>,
}

impl IpcCassette {
    /// Capture every call in `history`
    #[must_use]
    pub fn from_history(history: &[InvokeRecord]) -> Self {
        Self {
            version: CASSETTE_FORMAT_VERSION,
            recorded_at: Utc::now(),
            entries: history
                .iter()
                .map(|r| CassetteEntry {
                    command: r.command.clone(),
                    args: r.args.clone(),
                    response: r.response.clone(),
                    error: r.error.clone(),
                })
                .collect(),
        }
    }

    /// Number of recorded calls
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Save as pretty-printed JSON
    pub fn save(&self, path: &Path) -> ProbeResult<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, json)?;
        Ok(())
    }

    /// Load a cassette, rejecting unknown format versions
    pub fn load(path: &Path) -> ProbeResult<Self> {
        let json = fs::read_to_string(path)?;
        let cassette: Self = serde_json::from_str(&json)?;
        if cassette.version != CASSETTE_FORMAT_VERSION {
            return Err(ProbeError::invalid_state(format!(
                "unsupported cassette version {} (expected {CASSETTE_FORMAT_VERSION})",
                cassette.version
            )));
        }
        Ok(cassette)
    }

    /// Register the recorded outcomes as mocks on `engine`.
    ///
    /// Each call consumes the oldest unused outcome of its command whose
    /// recorded arguments match the call's (see [`args_match`]). A call that
    /// matches no remaining outcome fails without consuming anything, and a
    /// command fails once all its outcomes are used. Returns the number of
    /// commands mocked. Replay mocks are local: they are not installed into
    /// the application.
    pub fn replay_into(&self, engine: &mut IpcEngine) -> usize {
        let mut queues: BTreeMap<&str, VecDeque<(Value, Result<Value, String>)>> =
            BTreeMap::new();
        for entry in &self.entries {
            queues
                .entry(entry.command.as_str())
                .or_default()
                .push_back((entry.args.clone(), entry.outcome()));
        }

        let commands = queues.len();
        for (command, queue) in queues {
            let queue = Arc::new(Mutex::new(queue));
            let name = command.to_string();
            engine.mock(
                command,
                MockConfig::handler(move |args| {
                    let mut queue = queue.lock().unwrap_or_else(PoisonError::into_inner);
                    if queue.is_empty() {
                        return Err(format!("cassette exhausted for '{name}'"));
                    }
                    let position = queue
                        .iter()
                        .position(|(recorded, _)| args_match(recorded, &args))
                        .ok_or_else(|| format!("no recorded call of '{name}' matches {args}"))?;
                    queue.remove(position).map_or_else(
                        || Err(format!("cassette exhausted for '{name}'")),
                        |(_, outcome)| outcome,
                    )
                }),
            );
        }
        commands
    }
}
