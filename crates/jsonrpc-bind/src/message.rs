//! Inbound message model and envelope validation.
//!
//! Works on already-parsed JSON trees; turning bytes into trees is the
//! codec's job.

use serde_json::Value;
use thiserror::Error;

use crate::{
    error::JsonRpcError, notification::JsonRpcNotification, request::JsonRpcRequest,
    request::RequestParams, types::RequestId,
};

/// A single inbound call: a request (answered) or a notification (not answered).
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Get the method name
    pub fn method(&self) -> &str {
        match self {
            JsonRpcMessage::Request(req) => &req.method,
            JsonRpcMessage::Notification(notif) => &notif.method,
        }
    }

    pub fn params(&self) -> Option<&RequestParams> {
        match self {
            JsonRpcMessage::Request(req) => req.params.as_ref(),
            JsonRpcMessage::Notification(notif) => notif.params.as_ref(),
        }
    }

    /// Check if this is a request (has ID)
    pub fn is_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(_))
    }

    /// Check if this is a notification (no ID)
    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Notification(_))
    }

    /// Get the request ID if this is a request
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(req) => Some(&req.id),
            JsonRpcMessage::Notification(_) => None,
        }
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(request: JsonRpcRequest) -> Self {
        Self::Request(request)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notification: JsonRpcNotification) -> Self {
        Self::Notification(notification)
    }
}

/// One element of an inbound payload: a valid message, or the error
/// response owed for an invalid one.
pub type ParsedMessage = Result<JsonRpcMessage, JsonRpcError>;

/// A whole inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Single(ParsedMessage),
    /// Non-empty; elements are validated independently, in array order.
    Batch(Vec<ParsedMessage>),
}

/// Why an envelope was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("message must be a JSON object")]
    NotAnObject,
    #[error("the \"jsonrpc\" member is missing")]
    MissingVersion,
    #[error("unsupported JSON-RPC version: {0}")]
    UnsupportedVersion(String),
    #[error("the \"method\" member is missing")]
    MissingMethod,
    #[error("the \"method\" member must be a string")]
    MethodNotString,
    #[error("the \"method\" member must not be empty")]
    EmptyMethod,
    #[error("the \"params\" member must be an array or an object")]
    ParamsNotStructured,
    #[error("the \"id\" member must be a string, a number or null")]
    InvalidIdType,
    #[error("a request id must be a string or an integer")]
    UnsupportedId,
}

/// Check the shape of one request/notification envelope.
///
/// Enforces: object; `"jsonrpc": "2.0"`; `method` present, a string and not
/// blank; `params` absent, null, array or object; `id` absent, string,
/// number or null.
pub fn validate_envelope(node: &Value) -> Result<(), EnvelopeError> {
    let obj = node.as_object().ok_or(EnvelopeError::NotAnObject)?;

    match obj.get("jsonrpc") {
        None => return Err(EnvelopeError::MissingVersion),
        Some(Value::String(v)) if v == crate::JSONRPC_VERSION => {}
        Some(other) => return Err(EnvelopeError::UnsupportedVersion(other.to_string())),
    }

    match obj.get("method") {
        None => return Err(EnvelopeError::MissingMethod),
        Some(Value::String(m)) if m.trim().is_empty() => return Err(EnvelopeError::EmptyMethod),
        Some(Value::String(_)) => {}
        Some(_) => return Err(EnvelopeError::MethodNotString),
    }

    match obj.get("params") {
        None | Some(Value::Null) | Some(Value::Array(_)) | Some(Value::Object(_)) => {}
        Some(_) => return Err(EnvelopeError::ParamsNotStructured),
    }

    match obj.get("id") {
        None | Some(Value::Null) | Some(Value::String(_)) | Some(Value::Number(_)) => Ok(()),
        Some(_) => Err(EnvelopeError::InvalidIdType),
    }
}

/// Best-effort id extraction for error responses to invalid envelopes.
fn recover_id(node: &Value) -> Option<RequestId> {
    node.get("id").and_then(RequestId::from_value)
}

fn invalid(node: &Value, error: EnvelopeError) -> JsonRpcError {
    JsonRpcError::invalid_request_with_reason(recover_id(node), &error.to_string())
}

/// Validate one envelope and build the typed message.
pub fn parse_message(node: Value) -> ParsedMessage {
    if let Err(e) = validate_envelope(&node) {
        return Err(invalid(&node, e));
    }

    // validate_envelope guarantees an object with a string method.
    let Value::Object(mut obj) = node else {
        return Err(JsonRpcError::invalid_request(None));
    };
    let method = match obj.remove("method") {
        Some(Value::String(method)) => method,
        _ => return Err(JsonRpcError::invalid_request(None)),
    };
    let params = obj.remove("params").and_then(RequestParams::from_value);

    match obj.remove("id") {
        None => Ok(JsonRpcMessage::Notification(JsonRpcNotification::new(
            method, params,
        ))),
        Some(id_value) => match RequestId::from_value(&id_value) {
            Some(id) => Ok(JsonRpcMessage::Request(JsonRpcRequest::new(
                id, method, params,
            ))),
            // Null and fractional ids cannot be echoed back either.
            None => Err(JsonRpcError::invalid_request_with_reason(
                None,
                &EnvelopeError::UnsupportedId.to_string(),
            )),
        },
    }
}

/// Classify a parsed JSON tree as a single message or a batch.
///
/// Fails with a parse error for scalars and with an invalid-request error for
/// an empty batch; both answer the whole payload with `id: null`.
pub fn parse_payload_value(tree: Value) -> Result<Payload, JsonRpcError> {
    match tree {
        Value::Object(_) => Ok(Payload::Single(parse_message(tree))),
        Value::Array(items) if items.is_empty() => Err(JsonRpcError::invalid_request_with_reason(
            None,
            "batch must not be empty",
        )),
        Value::Array(items) => Ok(Payload::Batch(
            items.into_iter().map(parse_message).collect(),
        )),
        _ => Err(JsonRpcError::parse_error()),
    }
}
