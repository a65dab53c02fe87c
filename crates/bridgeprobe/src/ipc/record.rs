//! Call and event records.
//!
//! Both histories are append-only and ordered by non-decreasing
//! `timestamp_ms` on the session clock. Records are never mutated after
//! they are appended.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a call was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    /// Issued through the engine by the test body
    #[default]
    Local,
    /// Issued by the application's own UI code, captured by the in-page shim
    Remote,
}

/// One bridge call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRecord {
    /// Command name
    pub command: String,
    /// Call arguments
    pub args: Value,
    /// Response, when the call succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Error message, when the call failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds since session start at which the call began
    pub timestamp_ms: u64,
    /// How long the call took
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Whether a mock answered the call
    pub intercepted: bool,
    /// Where the call was observed
    #[serde(default)]
    pub origin: RecordOrigin,
}

impl InvokeRecord {
    /// Whether the call succeeded
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// One emitted event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event name
    pub event: String,
    /// Event payload
    pub payload: Value,
    /// Milliseconds since session start
    pub timestamp_ms: u64,
    /// Whether the application's event surface accepted the event
    pub delivered: bool,
}

/// Append-only log with a non-decreasing timestamp guarantee
#[derive(Debug, Clone, Default)]
pub(crate) struct Log<T> {
    entries: Vec<T>,
}

pub(crate) trait Stamped {
    fn timestamp_ms(&self) -> u64;
    fn set_timestamp_ms(&mut self, ms: u64);
}

impl Stamped for InvokeRecord {
    fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
    fn set_timestamp_ms(&mut self, ms: u64) {
        self.timestamp_ms = ms;
    }
}

impl Stamped for EventRecord {
    fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
    fn set_timestamp_ms(&mut self, ms: u64) {
        self.timestamp_ms = ms;
    }
}

impl<T: Stamped + Clone> Log<T> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append, clamping the timestamp so ordering never goes backwards
    pub(crate) fn push(&mut self, mut entry: T) -> &T {
        if let Some(last) = self.entries.last() {
            if entry.timestamp_ms() < last.timestamp_ms() {
                entry.set_timestamp_ms(last.timestamp_ms());
            }
        }
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        &self.entries
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
