//! Runner configuration.
//!
//! Loaded from YAML, then overridden from the environment:
//!
//! ```yaml
//! mode: hybrid
//! timeout_ms: 30000
//! retries: 2
//! video_dir: target/videos
//! ```
//!
//! | variable                 | field        |
//! |--------------------------|--------------|
//! | `BRIDGEPROBE_MODE`       | `mode`       |
//! | `BRIDGEPROBE_TIMEOUT_MS` | `timeout_ms` |
//! | `BRIDGEPROBE_RETRIES`    | `retries`    |
//! | `BRIDGEPROBE_VIDEO_DIR`  | `video_dir`  |

use crate::ipc::BridgeTarget;
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default per-attempt timeout (30 seconds)
pub const DEFAULT_TEST_TIMEOUT_MS: u64 = 30_000;

/// Upper bound on retries
pub const MAX_RETRIES: u32 = 10;

/// How test bodies may reach a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Structured assertions only
    #[default]
    Deterministic,
    /// Structured assertions plus judge fallback
    Hybrid,
}

impl Mode {
    /// Lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl FromStr for Mode {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deterministic" => Ok(Self::Deterministic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ProbeError::config(format!(
                "unknown mode '{other}' (expected deterministic or hybrid)"
            ))),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Verdict mode
    pub mode: Mode,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Extra attempts after a failure
    pub retries: u32,
    /// Where recordings are written; recording is off when unset
    pub video_dir: Option<PathBuf>,
    /// Also substitute calls made by the application's own UI code
    pub intercept_app_calls: bool,
    /// Bridge globals in the application
    pub bridge: BridgeTarget,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Deterministic,
            timeout_ms: DEFAULT_TEST_TIMEOUT_MS,
            retries: 0,
            video_dir: None,
            intercept_app_calls: true,
            bridge: BridgeTarget::default(),
        }
    }
}

impl RunnerConfig {
    /// Create default config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set mode
    #[must_use]
    pub const fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set per-attempt timeout
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set retries
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Record each attempt into `dir`
    #[must_use]
    pub fn with_video_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.video_dir = Some(dir.into());
        self
    }

    /// Enable or disable the in-page shim
    #[must_use]
    pub const fn with_app_interception(mut self, enabled: bool) -> Self {
        self.intercept_app_calls = enabled;
        self
    }

    /// Set bridge globals
    #[must_use]
    pub fn with_bridge_target(mut self, bridge: BridgeTarget) -> Self {
        self.bridge = bridge;
        self
    }

    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| ProbeError::config(format!("invalid runner config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: &Path) -> ProbeResult<Self> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize as YAML
    pub fn to_yaml(&self) -> ProbeResult<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| ProbeError::config(format!("failed to serialize runner config: {e}")))
    }

    /// Apply `BRIDGEPROBE_*` overrides from the process environment
    pub fn with_env_overrides(self) -> ProbeResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `BRIDGEPROBE_*` overrides from `lookup`
    pub fn with_overrides_from<F>(mut self, lookup: F) -> ProbeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("BRIDGEPROBE_MODE") {
            self.mode = mode.parse()?;
        }
        if let Some(timeout) = lookup("BRIDGEPROBE_TIMEOUT_MS") {
            self.timeout_ms = parse_number("BRIDGEPROBE_TIMEOUT_MS", &timeout)?;
        }
        if let Some(retries) = lookup("BRIDGEPROBE_RETRIES") {
            self.retries = parse_number("BRIDGEPROBE_RETRIES", &retries)?;
        }
        if let Some(dir) = lookup("BRIDGEPROBE_VIDEO_DIR") {
            self.video_dir = if dir.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }
        self.validate()?;
        Ok(self)
    }

    /// Check value ranges
    pub fn validate(&self) -> ProbeResult<()> {
        if self.timeout_ms == 0 {
            return Err(ProbeError::config("timeout_ms must be greater than 0"));
        }
        if self.retries > MAX_RETRIES {
            return Err(ProbeError::config(format!(
                "retries must be at most {MAX_RETRIES}, got {}",
                self.retries
            )));
        }
        if self.bridge.invoke_path.trim().is_empty() {
            return Err(ProbeError::config("bridge.invoke_path must not be empty"));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> ProbeResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| ProbeError::config(format!("{key} must be a non-negative integer, got '{raw}'")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_uses_defaults() {
            let config = RunnerConfig::from_yaml_str("mode: hybrid\nretries: 2\n").unwrap();
            assert_eq!(config.mode, Mode::Hybrid);
            assert_eq!(config.retries, 2);
            assert_eq!(config.timeout_ms, DEFAULT_TEST_TIMEOUT_MS);
            assert!(config.intercept_app_calls);
            assert_eq!(config.bridge, BridgeTarget::default());
        }

        #[test]
        fn test_invalid_values_are_config_errors() {
            let err = RunnerConfig::from_yaml_str("timeout_ms: 0\n").unwrap_err();
            assert!(matches!(err, ProbeError::Config { .. }));
            let err = RunnerConfig::from_yaml_str("mode: chaotic\n").unwrap_err();
            assert!(matches!(err, ProbeError::Config { .. }));
        }

        #[test]
        fn test_file_round_trip() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("bridgeprobe.yaml");
            let config = RunnerConfig::new()
                .with_mode(Mode::Hybrid)
                .with_video_dir("videos")
                .with_retries(1);
            fs::write(&path, config.to_yaml().unwrap()).unwrap();
            assert_eq!(RunnerConfig::from_file(&path).unwrap(), config);
        }

        #[test]
        fn test_missing_file_is_io_error() {
            let err = RunnerConfig::from_file(Path::new("/nonexistent/bridgeprobe.yaml")).unwrap_err();
            assert!(matches!(err, ProbeError::Io(_)));
        }
    }

    mod env_tests {
        use super::*;

        #[test]
        fn test_overrides() {
            let config = RunnerConfig::new()
                .with_overrides_from(env(&[
                    ("BRIDGEPROBE_MODE", "HYBRID"),
                    ("BRIDGEPROBE_TIMEOUT_MS", "1500"),
                    ("BRIDGEPROBE_RETRIES", "3"),
                    ("BRIDGEPROBE_VIDEO_DIR", "/tmp/v"),
                ]))
                .unwrap();
            assert_eq!(config.mode, Mode::Hybrid);
            assert_eq!(config.timeout_ms, 1500);
            assert_eq!(config.retries, 3);
            assert_eq!(config.video_dir, Some(PathBuf::from("/tmp/v")));
        }

        #[test]
        fn test_empty_video_dir_disables_recording() {
            let config = RunnerConfig::new()
                .with_video_dir("v")
                .with_overrides_from(env(&[("BRIDGEPROBE_VIDEO_DIR", "")]))
                .unwrap();
            assert!(config.video_dir.is_none());
        }

        #[test]
        fn test_bad_numbers_are_rejected() {
            let err = RunnerConfig::new()
                .with_overrides_from(env(&[("BRIDGEPROBE_RETRIES", "-1")]))
                .unwrap_err();
            assert!(err.to_string().contains("BRIDGEPROBE_RETRIES"));
            assert!(RunnerConfig::new()
                .with_overrides_from(env(&[("BRIDGEPROBE_RETRIES", "99")]))
                .is_err());
        }
    }
}
