//! Caller-side request construction from a method signature.

use std::sync::atomic::{AtomicI64, Ordering};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    notification::JsonRpcNotification,
    params::{CoercionError, MethodSignature},
    request::{JsonRpcRequest, RequestParams},
    types::RequestId,
};

/// How arguments are laid out in outgoing `params`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParamStyle {
    /// By name when every parameter has a name, positional otherwise.
    #[default]
    Named,
    Positional,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("method '{method}' takes {expected} argument(s), got {supplied}")]
    ArgumentCount {
        method: String,
        expected: String,
        supplied: usize,
    },

    #[error("invalid argument for parameter '{parameter}': {source}")]
    InvalidArgument {
        parameter: String,
        #[source]
        source: CoercionError,
    },
}

/// Builds requests and notifications for a known signature.
///
/// Ids are integers, increasing from 1 for each builder.
#[derive(Debug)]
pub struct RequestBuilder {
    style: ParamStyle,
    next_id: AtomicI64,
}

impl RequestBuilder {
    pub fn new(style: ParamStyle) -> Self {
        Self {
            style,
            next_id: AtomicI64::new(1),
        }
    }

    pub fn style(&self) -> ParamStyle {
        self.style
    }

    pub fn next_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// A request for `signature`, with `args` checked against it.
    pub fn request(&self, signature: &MethodSignature, args: Vec<Value>) -> Result<JsonRpcRequest, ClientError> {
        let params = self.params(signature, args)?;
        Ok(JsonRpcRequest::new(self.next_id(), signature.name.clone(), params))
    }

    pub fn notification(
        &self,
        signature: &MethodSignature,
        args: Vec<Value>,
    ) -> Result<JsonRpcNotification, ClientError> {
        let params = self.params(signature, args)?;
        Ok(JsonRpcNotification::new(signature.name.clone(), params))
    }

    /// A positional request without signature checks.
    pub fn request_for(&self, method: impl Into<String>, args: Vec<Value>) -> JsonRpcRequest {
        let params = (!args.is_empty()).then_some(RequestParams::Array(args));
        JsonRpcRequest::new(self.next_id(), method.into(), params)
    }

    /// Lay out `args` as `params`; `None` when there is nothing to send.
    ///
    /// Trailing optional parameters may be left out. Extra arguments go to
    /// the variadic tail.
    pub fn params(
        &self,
        signature: &MethodSignature,
        args: Vec<Value>,
    ) -> Result<Option<RequestParams>, ClientError> {
        let fixed = signature.params.len();
        let required = signature.required_count();
        if args.len() < required || (args.len() > fixed && signature.variadic.is_none()) {
            let expected = match (required, signature.variadic.is_some()) {
                (r, true) => format!("at least {}", r),
                (r, false) if r == fixed => r.to_string(),
                (r, false) => format!("{} to {}", r, fixed),
            };
            return Err(ClientError::ArgumentCount {
                method: signature.name.clone(),
                expected,
                supplied: args.len(),
            });
        }

        let mut checked = Vec::with_capacity(args.len());
        for (index, value) in args.into_iter().enumerate() {
            let (spec, label) = match signature.params.get(index) {
                Some(spec) => (spec, spec.label(index)),
                // Arity check above guarantees the tail exists here.
                None => match &signature.variadic {
                    Some(tail) => (tail, format!("{}[{}]", tail.label(fixed), index - fixed)),
                    None => continue,
                },
            };
            let value = spec
                .param_type
                .coerce(value)
                .map_err(|source| ClientError::InvalidArgument {
                    parameter: label,
                    source,
                })?;
            checked.push(value);
        }

        if checked.is_empty() {
            return Ok(None);
        }

        if self.style == ParamStyle::Named && signature.has_full_metadata() {
            let tail: Vec<Value> = checked.split_off(checked.len().min(fixed));
            let mut map = Map::new();
            for (spec, value) in signature.params.iter().zip(checked) {
                if let Some(name) = spec.name() {
                    map.insert(name.to_string(), value);
                }
            }
            if let Some(name) = signature.variadic.as_ref().and_then(|t| t.name()) {
                if !tail.is_empty() {
                    map.insert(name.to_string(), Value::Array(tail));
                }
            }
            return Ok(Some(RequestParams::Object(map)));
        }

        Ok(Some(RequestParams::Array(checked)))
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new(ParamStyle::default())
    }
}
