//! # JSON-RPC 2.0 Dispatch Engine
//!
//! A transport-agnostic JSON-RPC 2.0 engine: payload decoding, envelope
//! validation, method routing with overloads, and signature-aware parameter
//! binding. Bytes go in, bytes (or nothing) come out; framing and transport
//! are left to the host.
//!
//! ## Features
//! - Requests, notifications and batches per JSON-RPC 2.0
//! - By-position and by-name parameters bound against declared signatures
//! - Optional parameters with defaults, variadic tails, overloads
//! - Strict failure when by-name params meet a signature without names
//! - Panic capture, per-call timeouts and cooperative cancellation
//!
//! ```rust
//! use jsonrpc_bind::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let dispatcher = JsonRpcDispatcher::builder()
//!     .method(
//!         MethodTarget::builder("add")
//!             .param("a", ParamType::I64)
//!             .param("b", ParamType::I64),
//!         handler_fn(|args: BoundArguments, _ctx: CallContext| async move {
//!             Ok::<_, MethodError>(args.arg::<i64>(0)? + args.arg::<i64>(1)?)
//!         }),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let reply = dispatcher
//!     .handle_str(r#"{"jsonrpc":"2.0","method":"add","params":{"b":2,"a":1},"id":1}"#)
//!     .await;
//! assert_eq!(reply.as_deref(), Some(r#"{"jsonrpc":"2.0","id":1,"result":3}"#));
//! # }
//! ```

pub mod binder;
pub mod cancellation;
pub mod client;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod message;
pub mod notification;
pub mod observer;
pub mod params;
pub mod prelude;
pub mod registry;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use binder::{BindError, BindingResult, BoundArguments, ParameterBinder};
pub use cancellation::CancellationHandle;
pub use client::{ClientError, ParamStyle, RequestBuilder};
pub use codec::CodecError;
pub use config::{DispatcherConfig, UnknownParamPolicy};
pub use dispatcher::{CallOptions, DispatchOutput, DispatcherBuildError, DispatcherBuilder, JsonRpcDispatcher};
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, MethodError, ToJsonRpcError};
pub use handler::{CallContext, FunctionHandler, MethodHandler, handler_fn};
pub use message::{JsonRpcMessage, Payload};
pub use notification::JsonRpcNotification;
pub use observer::{DispatchObserver, NotificationFailure, TracingObserver};
pub use params::{CoercionError, DeclarationError, MethodSignature, OverloadKey, ParamType, ParameterSpec};
pub use registry::{MethodRegistry, MethodTarget, MethodTargetBuilder};
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcReply, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
