//! # JSON-RPC Prelude
//!
//! Convenient re-exports of the most commonly used types.
//!
//! ```rust
//! use jsonrpc_bind::prelude::*;
//! ```

// Message model
pub use crate::message::{JsonRpcMessage, Payload};
pub use crate::notification::JsonRpcNotification;
pub use crate::request::{JsonRpcRequest, RequestParams};
pub use crate::response::{JsonRpcReply, JsonRpcResponse};
pub use crate::types::{JsonRpcVersion, RequestId};

// Errors
pub use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, MethodError, ToJsonRpcError};

// Declaring and serving methods
pub use crate::binder::{BindError, BoundArguments};
pub use crate::cancellation::CancellationHandle;
pub use crate::config::{DispatcherConfig, UnknownParamPolicy};
pub use crate::dispatcher::{CallOptions, DispatchOutput, JsonRpcDispatcher};
pub use crate::handler::{CallContext, MethodHandler, handler_fn};
pub use crate::params::{MethodSignature, ParamType, ParameterSpec};
pub use crate::registry::{MethodRegistry, MethodTarget};

// Calling methods
pub use crate::client::{ParamStyle, RequestBuilder};

// Standard error codes
pub use crate::error_codes::*;
