//! Hook for failures that cannot be reported to the caller.

use tracing::warn;

use crate::error::JsonRpcErrorObject;

/// A notification that failed. Notifications never get a response, so this
/// is the only place the failure surfaces.
#[derive(Debug, Clone, Copy)]
pub struct NotificationFailure<'a> {
    pub method: &'a str,
    pub error: &'a JsonRpcErrorObject,
}

/// Observer for out-of-band dispatch events
pub trait DispatchObserver: Send + Sync {
    fn notification_failed(&self, failure: &NotificationFailure<'_>);
}

/// Default observer: logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DispatchObserver for TracingObserver {
    fn notification_failed(&self, failure: &NotificationFailure<'_>) {
        warn!(
            method = failure.method,
            code = failure.error.code,
            "notification failed: {}",
            failure.error.message
        );
    }
}
