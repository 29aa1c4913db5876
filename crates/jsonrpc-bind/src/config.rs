//! Dispatcher configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do with by-name keys that match no declared parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownParamPolicy {
    /// Fail binding with invalid params.
    #[default]
    Reject,
    /// Drop the extra keys silently.
    Ignore,
}

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Policy for unknown keys in by-name params
    pub unknown_params: UnknownParamPolicy,
    /// Per-invocation time limit in milliseconds (none by default)
    pub call_timeout_ms: Option<u64>,
    /// Largest accepted batch; larger batches are rejected as a whole
    pub max_batch_size: Option<usize>,
    /// Nest the `source()` chain of internal errors into error `data`
    pub include_error_sources: bool,
}

impl DispatcherConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

/// Whole milliseconds for a timeout, rounded up and never below 1.
///
/// Saturates at `u64::MAX` for durations beyond the millisecond range.
pub(crate) fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos().div_ceil(1_000_000))
        .unwrap_or(u64::MAX)
        .max(1)
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            unknown_params: UnknownParamPolicy::Reject,
            call_timeout_ms: None,
            max_batch_size: None,
            include_error_sources: true,
        }
    }
}
