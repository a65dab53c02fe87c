//! Log output setup.
//!
//! The crate itself only emits `tracing` events. Binaries and test harnesses
//! that want to see them call [`init_logging`] once.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}
