//! Mock entries and their resolution.

use crate::ipc::remote::{RemoteInstruction, RemoteMockSpec};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Handler producing a response from the call arguments
pub type MockHandler =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

/// Respond by looking one argument up in a table.
///
/// This is the only argument-dependent behavior that can be installed into
/// the application itself; arbitrary handlers stay local.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgLookup {
    /// Argument key whose value selects the response
    pub arg: String,
    /// Responses keyed by argument value (strings as-is, other values as JSON text)
    pub table: BTreeMap<String, Value>,
    /// Response when the value is not in the table
    pub fallback: Option<Value>,
}

impl ArgLookup {
    /// Create an empty lookup on `arg`
    #[must_use]
    pub fn on(arg: impl Into<String>) -> Self {
        Self {
            arg: arg.into(),
            table: BTreeMap::new(),
            fallback: None,
        }
    }

    /// Add a table entry
    #[must_use]
    pub fn entry(mut self, key: impl Into<String>, response: Value) -> Self {
        self.table.insert(key.into(), response);
        self
    }

    /// Set the fallback response
    #[must_use]
    pub fn fallback(mut self, response: Value) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Key used for a given argument value
    #[must_use]
    pub fn key_for(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn resolve(&self, args: &Value) -> Result<Value, String> {
        let raw = args.get(&self.arg).unwrap_or(&Value::Null);
        let key = Self::key_for(raw);
        self.table
            .get(&key)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| format!("no lookup entry for {}={}", self.arg, key))
    }
}

/// Substitute behavior for a bridge command
#[derive(Clone, Default)]
pub struct MockConfig {
    /// Canned response
    pub response: Option<Value>,
    /// Error message to fail with
    pub error: Option<String>,
    /// Handler computing the response from the arguments
    pub handler: Option<MockHandler>,
    /// Table lookup on one argument
    pub lookup: Option<ArgLookup>,
    /// Delay before resolving
    pub delay: Option<Duration>,
    /// Remove the entry after its first match
    pub once: bool,
    /// Partial-equality filter on the arguments
    pub match_args: Option<Value>,
}

impl fmt::Debug for MockConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConfig")
            .field("response", &self.response)
            .field("error", &self.error)
            .field("handler", &self.handler.as_ref().map(|_| "<fn>"))
            .field("lookup", &self.lookup)
            .field("delay", &self.delay)
            .field("once", &self.once)
            .field("match_args", &self.match_args)
            .finish()
    }
}

impl MockConfig {
    /// Respond with a canned value
    #[must_use]
    pub fn response(value: Value) -> Self {
        Self {
            response: Some(value),
            ..Self::default()
        }
    }

    /// Fail with a message
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Compute the response synchronously from the arguments
    #[must_use]
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self::handler_async(move |args| {
            let f = Arc::clone(&f);
            async move { f(args) }.boxed()
        })
    }

    /// Compute the response asynchronously from the arguments
    #[must_use]
    pub fn handler_async<F>(f: F) -> Self
    where
        F: Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Arc::new(f)),
            ..Self::default()
        }
    }

    /// Respond via an argument lookup table
    #[must_use]
    pub fn lookup(lookup: ArgLookup) -> Self {
        Self {
            lookup: Some(lookup),
            ..Self::default()
        }
    }

    /// Wait before resolving
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Wait `ms` milliseconds before resolving
    #[must_use]
    pub const fn with_delay_ms(self, ms: u64) -> Self {
        self.with_delay(Duration::from_millis(ms))
    }

    /// Single-use
    #[must_use]
    pub const fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Only match calls whose arguments contain these key/value pairs
    #[must_use]
    pub fn match_args(mut self, args: Value) -> Self {
        self.match_args = Some(args);
        self
    }
}

/// Partial deep equality.
///
/// When `expected` is an object every one of its keys must be present and
/// deep-equal in `actual`; extra keys in `actual` are ignored. Any other
/// `expected` value must equal `actual` exactly.
#[must_use]
pub fn args_match(expected: &Value, actual: &Value) -> bool {
    match expected {
        Value::Object(fields) => fields
            .iter()
            .all(|(key, value)| actual.get(key).is_some_and(|a| a == value)),
        other => other == actual,
    }
}

/// A registered mock, keyed by command
#[derive(Debug, Clone)]
pub struct MockEntry {
    /// Command this entry substitutes
    pub command: String,
    /// Configured behavior
    pub config: MockConfig,
}

impl MockEntry {
    /// Create an entry
    #[must_use]
    pub fn new(command: impl Into<String>, config: MockConfig) -> Self {
        Self {
            command: command.into(),
            config,
        }
    }

    /// Whether a call with `args` is substituted by this entry
    #[must_use]
    pub fn matches(&self, args: &Value) -> bool {
        self.config
            .match_args
            .as_ref()
            .map_or(true, |expected| args_match(expected, args))
    }

    /// Resolve a matched call: error > handler > lookup > response.
    ///
    /// The delay is applied by the caller so it can be observed in the
    /// recorded duration.
    pub async fn resolve(&self, args: Value) -> Result<Value, String> {
        let config = &self.config;
        if let Some(message) = &config.error {
            return Err(message.clone());
        }
        if let Some(handler) = &config.handler {
            return handler(args).await;
        }
        if let Some(lookup) = &config.lookup {
            return lookup.resolve(&args);
        }
        Ok(config.response.clone().unwrap_or(Value::Null))
    }

    /// Instruction-set form for the in-page shim; `None` for handler mocks
    #[must_use]
    pub fn to_remote(&self) -> Option<RemoteMockSpec> {
        let config = &self.config;
        let base = if let Some(message) = &config.error {
            RemoteInstruction::Reject {
                message: message.clone(),
            }
        } else if config.handler.is_some() {
            return None;
        } else if let Some(lookup) = &config.lookup {
            RemoteInstruction::Lookup {
                arg: lookup.arg.clone(),
                table: lookup.table.clone(),
                fallback: lookup.fallback.clone(),
            }
        } else {
            RemoteInstruction::Respond {
                value: config.response.clone().unwrap_or(Value::Null),
            }
        };
        let instruction = match config.delay {
            Some(delay) if !delay.is_zero() => RemoteInstruction::Delay {
                ms: delay.as_millis() as u64,
                then: Box::new(base),
            },
            _ => base,
        };
        Some(RemoteMockSpec {
            command: self.command.clone(),
            instruction,
            once: config.once,
            match_args: config.match_args.clone(),
        })
    }
}
