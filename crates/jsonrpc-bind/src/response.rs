use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{JsonRpcError, JsonRpcErrorObject};
use crate::types::{JsonRpcVersion, RequestId};

/// A successful JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    /// Always serialized, `null` for methods without a return value.
    pub result: Value,
}

impl JsonRpcResponse {
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            result,
        }
    }

    pub fn null(id: RequestId) -> Self {
        Self::new(id, Value::Null)
    }
}

impl<T> From<(RequestId, T)> for JsonRpcResponse
where
    T: Into<Value>,
{
    fn from((id, result): (RequestId, T)) -> Self {
        Self::new(id, result.into())
    }
}

/// Either a successful response or an error response, never both.
///
/// Serializes to the exact wire shape. Decoding goes through
/// [`crate::codec::decode_response`], which enforces the result/error
/// exclusivity that an untagged derive cannot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JsonRpcReply {
    /// Successful response with result field
    Response(JsonRpcResponse),
    /// Error response with error field
    Error(JsonRpcError),
}

impl JsonRpcReply {
    /// Create a success reply
    pub fn success(id: RequestId, result: Value) -> Self {
        Self::Response(JsonRpcResponse::new(id, result))
    }

    /// Create an error reply
    pub fn error(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self::Error(JsonRpcError::new(id, error))
    }

    /// Check if this is an error response
    pub fn is_error(&self) -> bool {
        matches!(self, JsonRpcReply::Error(_))
    }

    /// The originating request id; `None` when the request could not be identified.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcReply::Response(resp) => Some(&resp.id),
            JsonRpcReply::Error(err) => err.id.as_ref(),
        }
    }

    pub fn error_object(&self) -> Option<&JsonRpcErrorObject> {
        match self {
            JsonRpcReply::Response(_) => None,
            JsonRpcReply::Error(err) => Some(&err.error),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            JsonRpcReply::Response(resp) => Some(&resp.result),
            JsonRpcReply::Error(_) => None,
        }
    }

    /// Deserialize a success result into `T`, or surface the error object.
    ///
    /// A result that does not fit `T` is reported as an internal error
    /// describing the conversion failure.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, JsonRpcErrorObject> {
        match self {
            JsonRpcReply::Response(resp) => serde_json::from_value(resp.result).map_err(|e| {
                JsonRpcErrorObject::internal_error(Some(format!(
                    "Result does not match the expected type: {}",
                    e
                )))
            }),
            JsonRpcReply::Error(err) => Err(err.error),
        }
    }
}

impl From<JsonRpcResponse> for JsonRpcReply {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcError> for JsonRpcReply {
    fn from(error: JsonRpcError) -> Self {
        Self::Error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn test_null_result_is_serialized() {
        let response = JsonRpcResponse::null(RequestId::String("test".to_string()));
        let value = to_value(&response).unwrap();

        assert_eq!(value, json!({"jsonrpc": "2.0", "id": "test", "result": null}));
    }

    #[test]
    fn test_response_from_tuple() {
        let response: JsonRpcResponse = (RequestId::Number(1), json!({"test": true})).into();
        assert_eq!(response.id, RequestId::Number(1));
        assert_eq!(response.result["test"], true);
    }

    #[test]
    fn test_reply_shapes_are_exclusive() {
        let ok = JsonRpcReply::success(RequestId::Number(1), json!(3));
        let ok_value = to_value(&ok).unwrap();
        assert!(ok_value.get("result").is_some());
        assert!(ok_value.get("error").is_none());

        let err = JsonRpcReply::error(None, JsonRpcErrorObject::parse_error(None));
        let err_value = to_value(&err).unwrap();
        assert!(err_value.get("result").is_none());
        assert_eq!(err_value["id"], Value::Null);
        assert!(err.is_error());
        assert_eq!(err.id(), None);
    }

    #[test]
    fn test_into_result() {
        let ok = JsonRpcReply::success(RequestId::Number(1), json!(65));
        assert_eq!(ok.into_result::<i32>().unwrap(), 65);

        let mismatch = JsonRpcReply::success(RequestId::Number(1), json!("x"));
        assert_eq!(mismatch.into_result::<i32>().unwrap_err().code, -32603);

        let err = JsonRpcReply::error(
            Some(RequestId::Number(2)),
            JsonRpcErrorObject::custom(1, "Test error.", None),
        );
        let object = err.into_result::<Value>().unwrap_err();
        assert_eq!(object.code, 1);
        assert_eq!(object.message, "Test error.");
    }
}
