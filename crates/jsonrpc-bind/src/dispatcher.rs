//! Message dispatch: decode, route, bind, invoke, encode.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::{
    binder::{BindError, BoundArguments, ParameterBinder},
    cancellation::CancellationHandle,
    codec,
    config::{DispatcherConfig, UnknownParamPolicy, timeout_millis},
    error::{JsonRpcError, JsonRpcErrorObject},
    handler::{CallContext, MethodHandler},
    message::{JsonRpcMessage, ParsedMessage, Payload},
    notification::JsonRpcNotification,
    observer::{DispatchObserver, NotificationFailure, TracingObserver},
    params::{DeclarationError, MethodSignature},
    registry::{MethodRegistry, MethodTarget, MethodTargetBuilder},
    request::{JsonRpcRequest, RequestParams},
    response::JsonRpcReply,
    types::RequestId,
};

/// Last-resort body when a reply cannot be serialized.
const FALLBACK_INTERNAL_ERROR: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#;

/// Result of dispatching one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutput {
    /// Answer to a single request, or a payload-level error.
    Single(JsonRpcReply),
    /// Answers to the requests of a batch, in input order.
    Batch(Vec<JsonRpcReply>),
    /// Nothing to send back: a notification or an all-notification batch.
    NoResponse,
}

impl DispatchOutput {
    pub fn needs_response(&self) -> bool {
        !matches!(self, DispatchOutput::NoResponse)
    }

    pub fn replies(&self) -> &[JsonRpcReply] {
        match self {
            DispatchOutput::Single(reply) => std::slice::from_ref(reply),
            DispatchOutput::Batch(replies) => replies,
            DispatchOutput::NoResponse => &[],
        }
    }

    /// Wire text, or `None` when nothing must be written back.
    pub fn to_json_string(&self) -> Option<String> {
        let encoded = match self {
            DispatchOutput::Single(reply) => codec::encode_reply(reply),
            DispatchOutput::Batch(replies) => codec::encode_replies(replies),
            DispatchOutput::NoResponse => return None,
        };
        match encoded {
            Ok(text) => Some(text),
            Err(e) => {
                error!("Failed to serialize reply: {}", e);
                Some(FALLBACK_INTERNAL_ERROR.to_string())
            }
        }
    }
}

/// Per-call dispatch options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides the configured call timeout.
    pub timeout: Option<Duration>,
    /// Parent handle; each invocation runs under a child of it.
    pub cancellation: CancellationHandle,
}

impl CallOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationHandle) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Why an invocation did not run to completion.
enum Interrupted {
    TimedOut(Duration),
    Cancelled,
}

/// JSON-RPC dispatcher over a [`MethodRegistry`].
///
/// Stateless per message; concurrent calls share only the registry.
pub struct JsonRpcDispatcher {
    registry: Arc<MethodRegistry>,
    binder: ParameterBinder,
    config: DispatcherConfig,
    observer: Arc<dyn DispatchObserver>,
}

impl JsonRpcDispatcher {
    pub fn new(registry: Arc<MethodRegistry>, config: DispatcherConfig) -> Self {
        Self {
            registry,
            binder: ParameterBinder::new(config.unknown_params),
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Register a target after construction.
    pub fn register(&self, target: MethodTarget) -> Option<Arc<MethodTarget>> {
        self.registry.register(target)
    }

    /// Registered method names, in first-registration order.
    pub fn registered_methods(&self) -> Vec<String> {
        self.registry.registered_methods()
    }

    pub fn overloads(&self, name: &str) -> Vec<MethodSignature> {
        self.registry.overloads(name)
    }

    /// Handle one raw payload; `None` means nothing is written back.
    pub async fn handle(&self, payload: &[u8]) -> Option<String> {
        self.handle_with(payload, &CallOptions::default()).await
    }

    pub async fn handle_str(&self, payload: &str) -> Option<String> {
        self.handle(payload.as_bytes()).await
    }

    pub async fn handle_with(&self, payload: &[u8], options: &CallOptions) -> Option<String> {
        self.dispatch_bytes(payload, options).await.to_json_string()
    }

    pub async fn dispatch_bytes(&self, payload: &[u8], options: &CallOptions) -> DispatchOutput {
        match codec::decode_payload(payload) {
            Ok(payload) => self.dispatch(payload, options).await,
            Err(e) => {
                debug!(code = e.error.code, "rejected payload: {}", e.error.message);
                DispatchOutput::Single(e.into())
            }
        }
    }

    /// Dispatch an already-decoded payload.
    pub async fn dispatch(&self, payload: Payload, options: &CallOptions) -> DispatchOutput {
        match payload {
            Payload::Single(item) => match self.dispatch_item(item, options).await {
                Some(reply) => DispatchOutput::Single(reply),
                None => DispatchOutput::NoResponse,
            },
            Payload::Batch(items) => self.dispatch_batch(items, options).await,
        }
    }

    #[instrument(skip_all, fields(size = items.len()))]
    async fn dispatch_batch(&self, items: Vec<ParsedMessage>, options: &CallOptions) -> DispatchOutput {
        if let Some(max) = self.config.max_batch_size {
            if items.len() > max {
                warn!(max, "batch too large");
                return DispatchOutput::Single(
                    JsonRpcError::invalid_request_with_reason(
                        None,
                        &format!("batch of {} exceeds the limit of {}", items.len(), max),
                    )
                    .into(),
                );
            }
        }

        // Elements run concurrently; join_all keeps input order.
        let replies: Vec<JsonRpcReply> =
            join_all(items.into_iter().map(|item| self.dispatch_item(item, options)))
                .await
                .into_iter()
                .flatten()
                .collect();

        if replies.is_empty() {
            DispatchOutput::NoResponse
        } else {
            DispatchOutput::Batch(replies)
        }
    }

    async fn dispatch_item(&self, item: ParsedMessage, options: &CallOptions) -> Option<JsonRpcReply> {
        match item {
            Ok(message) => self.handle_message(message, options).await,
            Err(invalid) => Some(invalid.into()),
        }
    }

    /// Handle one validated message; notifications yield `None`.
    pub async fn handle_message(
        &self,
        message: JsonRpcMessage,
        options: &CallOptions,
    ) -> Option<JsonRpcReply> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request, options).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification, options).await;
                None
            }
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest, options: &CallOptions) -> JsonRpcReply {
        debug!(method = %request.method, id = %request.id, "dispatching request");
        match self
            .execute(&request.method, request.params.as_ref(), Some(&request.id), options)
            .await
        {
            Ok(result) => JsonRpcReply::success(request.id, result),
            Err(error) => JsonRpcReply::error(Some(request.id), error),
        }
    }

    /// Run a notification; failures go to the observer, never to the caller.
    pub async fn handle_notification(&self, notification: JsonRpcNotification, options: &CallOptions) {
        debug!(method = %notification.method, "dispatching notification");
        if let Err(error) = self
            .execute(&notification.method, notification.params.as_ref(), None, options)
            .await
        {
            self.observer.notification_failed(&NotificationFailure {
                method: &notification.method,
                error: &error,
            });
        }
    }

    /// Resolve, bind and invoke.
    async fn execute(
        &self,
        method: &str,
        params: Option<&RequestParams>,
        id: Option<&RequestId>,
        options: &CallOptions,
    ) -> Result<Value, JsonRpcErrorObject> {
        let candidates = self.registry.lookup(method).map_err(|_| {
            debug!(method, "method not found");
            JsonRpcErrorObject::method_not_found(method)
        })?;

        let mut failures = Vec::with_capacity(candidates.len());
        for target in candidates {
            match self.binder.bind(target.signature(), params) {
                Ok(args) => {
                    let ctx = CallContext::new(method, id.cloned(), options.cancellation.child());
                    return self.invoke(target.handler(), args, ctx, options).await;
                }
                Err(e) => {
                    debug!(method, overload = %target.overload_key(), "binding failed: {}", e);
                    failures.push(e);
                }
            }
        }
        Err(binding_failure(method, failures))
    }

    async fn invoke(
        &self,
        handler: &Arc<dyn MethodHandler>,
        args: BoundArguments,
        ctx: CallContext,
        options: &CallOptions,
    ) -> Result<Value, JsonRpcErrorObject> {
        let method = ctx.method().to_string();
        let cancellation = ctx.cancellation().clone();
        let call = AssertUnwindSafe(handler.call(args, ctx)).catch_unwind();
        let timeout = options.timeout.or_else(|| self.config.call_timeout());

        let guarded = async move {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .map_err(|_| Interrupted::TimedOut(limit)),
                None => Ok(call.await),
            }
        };
        let outcome = tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(Interrupted::Cancelled),
            outcome = guarded => outcome,
        };
        // Abandoned invocations observe cancellation through their handle.
        cancellation.cancel();

        match outcome {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => {
                let object = e.to_error_object(self.config.include_error_sources);
                debug!(method = %method, code = object.code, "method failed: {}", e);
                Err(object)
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!(method = %method, "method panicked: {}", message);
                Err(JsonRpcErrorObject::internal_error(None)
                    .with_data(json!({ "reason": "panic", "message": message })))
            }
            Err(Interrupted::TimedOut(limit)) => {
                let timeout_ms = timeout_millis(limit);
                warn!(method = %method, timeout_ms, "method timed out");
                Err(JsonRpcErrorObject::internal_error(None).with_data(json!({
                    "reason": "timeout",
                    "timeout_ms": timeout_ms,
                })))
            }
            Err(Interrupted::Cancelled) => {
                debug!(method = %method, "method cancelled");
                Err(JsonRpcErrorObject::internal_error(None)
                    .with_data(json!({ "reason": "cancelled" })))
            }
        }
    }
}

impl fmt::Debug for JsonRpcDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcDispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "method panicked".to_string()
    }
}

/// Error for a call no overload accepted.
///
/// A lone failure is reported as-is. When every overload lacked name
/// metadata the no-metadata error wins, so callers can tell it apart from
/// an ordinary mismatch.
fn binding_failure(method: &str, mut failures: Vec<BindError>) -> JsonRpcErrorObject {
    if failures.len() == 1 {
        if let Some(only) = failures.pop() {
            return only.to_error_object();
        }
    }
    if failures.iter().all(BindError::is_missing_metadata) {
        return BindError::NoParameterMetadata {
            method: method.to_string(),
        }
        .to_error_object();
    }
    JsonRpcErrorObject::invalid_params(&format!(
        "No overload of '{}' accepts the supplied parameters",
        method
    ))
    .with_data(json!({
        "reason": "no_matching_overload",
        "candidates": failures.iter().map(BindError::detail).collect::<Vec<_>>(),
    }))
}

/// Raised by [`DispatcherBuilder::build`] when declarations were rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid method declarations:\n{}", .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
pub struct DispatcherBuildError {
    pub errors: Vec<DeclarationError>,
}

/// Builder for [`JsonRpcDispatcher`]
///
/// Declaration errors are collected and reported together by [`build`](Self::build).
pub struct DispatcherBuilder {
    registry: Arc<MethodRegistry>,
    config: DispatcherConfig,
    observer: Option<Arc<dyn DispatchObserver>>,
    validation_errors: Vec<DeclarationError>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(MethodRegistry::new()),
            config: DispatcherConfig::default(),
            observer: None,
            validation_errors: Vec::new(),
        }
    }

    /// Share an existing registry instead of starting from an empty one.
    pub fn registry(mut self, registry: Arc<MethodRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn unknown_params(mut self, policy: UnknownParamPolicy) -> Self {
        self.config.unknown_params = policy;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout_ms = Some(timeout_millis(timeout));
        self
    }

    pub fn max_batch_size(mut self, max: usize) -> Self {
        self.config.max_batch_size = Some(max);
        self
    }

    pub fn include_error_sources(mut self, include: bool) -> Self {
        self.config.include_error_sources = include;
        self
    }

    pub fn observer<O: DispatchObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Register a declared method; invalid declarations fail `build`.
    pub fn method<H>(mut self, declaration: MethodTargetBuilder, handler: H) -> Self
    where
        H: MethodHandler + 'static,
    {
        match declaration.build(handler) {
            Ok(target) => {
                self.registry.register(target);
            }
            Err(e) => {
                warn!("Rejected method declaration: {}", e);
                self.validation_errors.push(e);
            }
        }
        self
    }

    pub fn target(self, target: MethodTarget) -> Self {
        self.registry.register(target);
        self
    }

    pub fn build(self) -> Result<JsonRpcDispatcher, DispatcherBuildError> {
        if !self.validation_errors.is_empty() {
            return Err(DispatcherBuildError {
                errors: self.validation_errors,
            });
        }
        let mut dispatcher = JsonRpcDispatcher::new(self.registry, self.config);
        if let Some(observer) = self.observer {
            dispatcher.observer = observer;
        }
        Ok(dispatcher)
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
