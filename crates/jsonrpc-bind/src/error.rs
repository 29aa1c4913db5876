use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use thiserror::Error;

use crate::types::RequestId;

/// JSON-RPC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError(i64), // -32099 to -32000
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::ParseError => crate::error_codes::PARSE_ERROR,
            JsonRpcErrorCode::InvalidRequest => crate::error_codes::INVALID_REQUEST,
            JsonRpcErrorCode::MethodNotFound => crate::error_codes::METHOD_NOT_FOUND,
            JsonRpcErrorCode::InvalidParams => crate::error_codes::INVALID_PARAMS,
            JsonRpcErrorCode::InternalError => crate::error_codes::INTERNAL_ERROR,
            JsonRpcErrorCode::ServerError(code) => *code,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::ServerError(_) => "Server error",
        }
    }

    /// Map a raw wire code back onto the taxonomy, if it belongs to it.
    pub fn from_code(code: i64) -> Option<Self> {
        use crate::error_codes::*;
        match code {
            PARSE_ERROR => Some(JsonRpcErrorCode::ParseError),
            INVALID_REQUEST => Some(JsonRpcErrorCode::InvalidRequest),
            METHOD_NOT_FOUND => Some(JsonRpcErrorCode::MethodNotFound),
            INVALID_PARAMS => Some(JsonRpcErrorCode::InvalidParams),
            INTERNAL_ERROR => Some(JsonRpcErrorCode::InternalError),
            SERVER_ERROR_START..=SERVER_ERROR_END => Some(JsonRpcErrorCode::ServerError(code)),
            _ => None,
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// JSON-RPC Error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, message: Option<String>, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            data,
        }
    }

    /// Build an application-defined error with an arbitrary code.
    pub fn custom(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn parse_error(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::ParseError, None, data)
    }

    pub fn invalid_request(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidRequest, None, data)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound,
            Some(format!("Method '{}' not found", method)),
            None,
        )
    }

    pub fn invalid_params(message: &str) -> Self {
        Self::new(
            JsonRpcErrorCode::InvalidParams,
            Some(message.to_string()),
            None,
        )
    }

    pub fn internal_error(message: Option<String>) -> Self {
        Self::new(JsonRpcErrorCode::InternalError, message, None)
    }

    /// Server-defined error. Codes outside -32099..=-32000 are a caller bug.
    pub fn server_error(code: i64, message: &str, data: Option<Value>) -> Self {
        debug_assert!(
            (crate::error_codes::SERVER_ERROR_START..=crate::error_codes::SERVER_ERROR_END)
                .contains(&code),
            "Server error code must be in range -32099 to -32000"
        );
        Self::new(
            JsonRpcErrorCode::ServerError(code),
            Some(message.to_string()),
            data,
        )
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn kind(&self) -> Option<JsonRpcErrorCode> {
        JsonRpcErrorCode::from_code(self.code)
    }
}

impl fmt::Display for JsonRpcErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// JSON-RPC Error response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: String,
    pub id: Option<RequestId>,
    pub error: JsonRpcErrorObject,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self {
            version: crate::JSONRPC_VERSION.to_string(),
            id,
            error,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(None, JsonRpcErrorObject::parse_error(None))
    }

    pub fn invalid_request(id: Option<RequestId>) -> Self {
        Self::new(id, JsonRpcErrorObject::invalid_request(None))
    }

    /// Invalid request carrying a human-readable reason in `data`.
    pub fn invalid_request_with_reason(id: Option<RequestId>, reason: &str) -> Self {
        Self::new(
            id,
            JsonRpcErrorObject::invalid_request(Some(json!({ "reason": reason }))),
        )
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JSON-RPC Error {}: {}",
            self.error.code, self.error.message
        )
    }
}

impl std::error::Error for JsonRpcError {}

/// Trait for domain errors that know their own wire representation
pub trait ToJsonRpcError: std::error::Error + Send + Sync + 'static {
    /// Convert this error to a JSON-RPC error object
    fn to_error_object(&self) -> JsonRpcErrorObject;
}

/// Failure reported by a registered method.
#[derive(Debug, Error)]
pub enum MethodError {
    /// Application-level error, sent to the caller verbatim.
    #[error("{0}")]
    Domain(JsonRpcErrorObject),

    /// Anything else; reported as an internal error.
    #[error("{0}")]
    Internal(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl MethodError {
    pub fn domain<E: ToJsonRpcError>(error: E) -> Self {
        Self::Domain(error.to_error_object())
    }

    pub fn internal<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::Internal(error.into())
    }

    /// Wire representation of this failure.
    pub fn to_error_object(&self, include_sources: bool) -> JsonRpcErrorObject {
        match self {
            MethodError::Domain(object) => object.clone(),
            MethodError::Internal(error) => JsonRpcErrorObject::internal_error(None)
                .with_data(error_data(error.as_ref(), include_sources)),
        }
    }
}

impl From<JsonRpcErrorObject> for MethodError {
    fn from(object: JsonRpcErrorObject) -> Self {
        Self::Domain(object)
    }
}

/// Describe an error as a JSON object suitable for an error `data` field.
///
/// The object always has a `message`; when `include_sources` is set, each
/// `source()` in the chain is nested under a `source` key.
pub fn error_data(error: &(dyn std::error::Error + 'static), include_sources: bool) -> Value {
    let mut object = Map::new();
    object.insert("message".to_string(), Value::String(error.to_string()));
    if include_sources {
        if let Some(source) = error.source() {
            object.insert("source".to_string(), error_data(source, true));
        }
    }
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        inner: std::io::Error,
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(JsonRpcErrorCode::ParseError.code(), -32700);
        assert_eq!(JsonRpcErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(
            JsonRpcErrorCode::from_code(-32010),
            Some(JsonRpcErrorCode::ServerError(-32010))
        );
        assert_eq!(JsonRpcErrorCode::from_code(1), None);
    }

    #[test]
    fn test_error_serialization() {
        let error = JsonRpcError::new(
            Some(RequestId::Number(1)),
            JsonRpcErrorObject::method_not_found("test"),
        );
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("Method 'test' not found"));
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn test_null_id_is_serialized() {
        let error = JsonRpcError::parse_error();
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], -32700);
    }

    #[test]
    fn test_error_data_walks_source_chain() {
        let error = Outer {
            inner: std::io::Error::other("disk on fire"),
        };

        let data = error_data(&error, true);
        assert_eq!(data["message"], "outer failure");
        assert_eq!(data["source"]["message"], "disk on fire");

        let shallow = error_data(&error, false);
        assert!(shallow.get("source").is_none());
    }

    #[test]
    fn test_method_error_domain_passthrough() {
        let object = JsonRpcErrorObject::custom(1, "Test error.", None);
        let error: MethodError = object.clone().into();
        assert_eq!(error.to_error_object(true), object);
    }

    #[test]
    fn test_method_error_internal_maps_to_internal_error() {
        let error = MethodError::internal("boom");
        let object = error.to_error_object(true);
        assert_eq!(object.code, -32603);
        assert_eq!(object.data.unwrap()["message"], "boom");
    }
}
