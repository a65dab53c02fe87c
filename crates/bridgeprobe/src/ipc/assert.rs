//! Assertions over call history.
//!
//! Pure functions: they read a slice of records and never touch the engine.

use crate::ipc::mock::args_match;
use crate::ipc::record::InvokeRecord;
use crate::result::{ProbeError, ProbeResult};
use serde_json::Value;

/// Count constraint for [`assert_invoked`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvokeExpectation {
    /// Exact number of calls
    pub times: Option<usize>,
    /// Minimum number of calls
    pub at_least: Option<usize>,
    /// Maximum number of calls
    pub at_most: Option<usize>,
}

impl InvokeExpectation {
    /// At least one call (the default when no constraint is set)
    #[must_use]
    pub const fn any() -> Self {
        Self {
            times: None,
            at_least: None,
            at_most: None,
        }
    }

    /// Exactly `n` calls
    #[must_use]
    pub const fn times(n: usize) -> Self {
        Self {
            times: Some(n),
            at_least: None,
            at_most: None,
        }
    }

    /// At least `n` calls
    #[must_use]
    pub const fn at_least(n: usize) -> Self {
        Self {
            times: None,
            at_least: Some(n),
            at_most: None,
        }
    }

    /// At most `n` calls
    #[must_use]
    pub const fn at_most(n: usize) -> Self {
        Self {
            times: None,
            at_least: None,
            at_most: Some(n),
        }
    }

    /// Also require at most `n` calls
    #[must_use]
    pub const fn and_at_most(mut self, n: usize) -> Self {
        self.at_most = Some(n);
        self
    }
}

fn count(history: &[InvokeRecord], command: &str) -> usize {
    history.iter().filter(|r| r.command == command).count()
}

/// Assert `command` was called, subject to `expectation`
pub fn assert_invoked(
    history: &[InvokeRecord],
    command: &str,
    expectation: InvokeExpectation,
) -> ProbeResult<()> {
    let actual = count(history, command);

    if let Some(times) = expectation.times {
        if actual != times {
            return Err(ProbeError::assertion(
                format!("'{command}' call count"),
                format!("exactly {times}"),
                actual,
            ));
        }
        return Ok(());
    }

    let unconstrained = expectation.at_least.is_none() && expectation.at_most.is_none();
    if unconstrained && actual == 0 {
        return Err(ProbeError::assertion(
            format!("'{command}' to be invoked"),
            "at least 1 call",
            "0 calls",
        ));
    }
    if let Some(min) = expectation.at_least {
        if actual < min {
            return Err(ProbeError::assertion(
                format!("'{command}' call count"),
                format!("at least {min}"),
                actual,
            ));
        }
    }
    if let Some(max) = expectation.at_most {
        if actual > max {
            return Err(ProbeError::assertion(
                format!("'{command}' call count"),
                format!("at most {max}"),
                actual,
            ));
        }
    }
    Ok(())
}

/// Assert some call to `command` had arguments partially matching `args`
pub fn assert_invoked_with(
    history: &[InvokeRecord],
    command: &str,
    args: &Value,
) -> ProbeResult<()> {
    let calls: Vec<&InvokeRecord> = history.iter().filter(|r| r.command == command).collect();
    if calls.iter().any(|r| args_match(args, &r.args)) {
        return Ok(());
    }
    let seen: Vec<&Value> = calls.iter().map(|r| &r.args).collect();
    Err(ProbeError::assertion(
        format!("'{command}' invoked with matching arguments"),
        args,
        serde_json::to_string(&seen).unwrap_or_else(|_| format!("{} calls", seen.len())),
    ))
}

/// Assert `command` was never called
pub fn assert_not_invoked(history: &[InvokeRecord], command: &str) -> ProbeResult<()> {
    let actual = count(history, command);
    if actual > 0 {
        return Err(ProbeError::assertion(
            format!("'{command}' not to be invoked"),
            "0 calls",
            format!("{actual} calls"),
        ));
    }
    Ok(())
}
