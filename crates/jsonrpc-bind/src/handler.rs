//! Invocable method targets.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    binder::BoundArguments,
    cancellation::CancellationHandle,
    error::{JsonRpcErrorObject, MethodError},
    types::RequestId,
};

/// What a running method can see about its own invocation.
#[derive(Debug, Clone)]
pub struct CallContext {
    method: String,
    id: Option<RequestId>,
    cancellation: CancellationHandle,
}

impl CallContext {
    pub fn new(method: impl Into<String>, id: Option<RequestId>, cancellation: CancellationHandle) -> Self {
        Self {
            method: method.into(),
            id,
            cancellation,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// `None` for notifications.
    pub fn id(&self) -> Option<&RequestId> {
        self.id.as_ref()
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Handle cancelled when the caller gives up on this invocation.
    pub fn cancellation(&self) -> &CancellationHandle {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Trait for the code behind one registered signature
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Run the method with arguments already bound to its signature.
    ///
    /// The returned value becomes the response `result`; errors are
    /// converted by the dispatcher.
    async fn call(&self, args: BoundArguments, ctx: CallContext) -> Result<Value, MethodError>;
}

/// A handler backed by a closure returning a boxed future
pub struct FunctionHandler<F>
where
    F: Fn(BoundArguments, CallContext) -> BoxFuture<'static, Result<Value, MethodError>> + Send + Sync,
{
    handler_fn: F,
}

impl<F> FunctionHandler<F>
where
    F: Fn(BoundArguments, CallContext) -> BoxFuture<'static, Result<Value, MethodError>> + Send + Sync,
{
    pub fn new(handler_fn: F) -> Self {
        Self { handler_fn }
    }
}

#[async_trait]
impl<F> MethodHandler for FunctionHandler<F>
where
    F: Fn(BoundArguments, CallContext) -> BoxFuture<'static, Result<Value, MethodError>> + Send + Sync,
{
    async fn call(&self, args: BoundArguments, ctx: CallContext) -> Result<Value, MethodError> {
        (self.handler_fn)(args, ctx).await
    }
}

/// A handler backed by an async closure with a typed, serializable result.
pub struct TypedHandler<F, Fut, T> {
    handler_fn: F,
    _marker: PhantomData<fn() -> (Fut, T)>,
}

/// Wrap an async closure as a [`MethodHandler`].
///
/// ```rust
/// use jsonrpc_bind::prelude::*;
///
/// let handler = handler_fn(|args: BoundArguments, _ctx: CallContext| async move {
///     let a: i64 = args.arg(0)?;
///     let b: i64 = args.arg(1)?;
///     Ok::<_, MethodError>(a + b)
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut, T>(handler_fn: F) -> TypedHandler<F, Fut, T>
where
    F: Fn(BoundArguments, CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, MethodError>> + Send,
    T: Serialize,
{
    TypedHandler {
        handler_fn,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, T> MethodHandler for TypedHandler<F, Fut, T>
where
    F: Fn(BoundArguments, CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, MethodError>> + Send,
    T: Serialize,
{
    async fn call(&self, args: BoundArguments, ctx: CallContext) -> Result<Value, MethodError> {
        let output = (self.handler_fn)(args, ctx).await?;
        serde_json::to_value(output).map_err(|e| {
            MethodError::Domain(
                JsonRpcErrorObject::internal_error(Some(
                    "Failed to convert the return value".to_string(),
                ))
                .with_data(json!({
                    "reason": "return_value_conversion",
                    "message": e.to_string(),
                })),
            )
        })
    }
}
