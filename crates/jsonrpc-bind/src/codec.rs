//! Text/byte boundary: JSON text in, message model out, and back.
//!
//! Scalar and structural JSON handling is delegated to `serde_json`; this
//! module only applies the JSON-RPC envelope rules on top.

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::{
    error::{JsonRpcError, JsonRpcErrorObject},
    message::{Payload, parse_payload_value},
    notification::JsonRpcNotification,
    request::JsonRpcRequest,
    response::{JsonRpcReply, JsonRpcResponse},
    types::RequestId,
};

/// Errors raised while encoding, or while decoding a response on the caller side.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CodecError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidResponse(reason.into())
    }
}

/// Decode an inbound payload from raw bytes.
///
/// Malformed JSON and scalar top-level values yield a parse error; an empty
/// batch yields an invalid-request error. Both are answered with `id: null`.
pub fn decode_payload(bytes: &[u8]) -> Result<Payload, JsonRpcError> {
    let tree: Value = serde_json::from_slice(bytes).map_err(|e| {
        JsonRpcError::new(
            None,
            JsonRpcErrorObject::parse_error(Some(json!({ "reason": e.to_string() }))),
        )
    })?;
    parse_payload_value(tree)
}

pub fn decode_payload_str(text: &str) -> Result<Payload, JsonRpcError> {
    decode_payload(text.as_bytes())
}

pub fn encode_reply(reply: &JsonRpcReply) -> Result<String, CodecError> {
    Ok(serde_json::to_string(reply)?)
}

/// Encode a batch answer as a JSON array.
pub fn encode_replies(replies: &[JsonRpcReply]) -> Result<String, CodecError> {
    Ok(serde_json::to_string(replies)?)
}

pub fn encode_request(request: &JsonRpcRequest) -> Result<String, CodecError> {
    encode(request)
}

pub fn encode_notification(notification: &JsonRpcNotification) -> Result<String, CodecError> {
    encode(notification)
}

fn encode<T: Serialize>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a single response object received from a server.
pub fn decode_response(text: &str) -> Result<JsonRpcReply, CodecError> {
    decode_response_value(serde_json::from_str(text)?)
}

/// Decode a batch answer (a JSON array of response objects).
pub fn decode_responses(text: &str) -> Result<Vec<JsonRpcReply>, CodecError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => items.into_iter().map(decode_response_value).collect(),
        _ => Err(CodecError::invalid("batch response must be an array")),
    }
}

/// Validate and convert one response tree.
///
/// Requires `"jsonrpc": "2.0"`, an `id` that is a string, an integer or null,
/// and exactly one of `result` / `error`.
pub fn decode_response_value(tree: Value) -> Result<JsonRpcReply, CodecError> {
    let Value::Object(mut obj) = tree else {
        return Err(CodecError::invalid("response must be a JSON object"));
    };

    match obj.get("jsonrpc") {
        Some(Value::String(v)) if v == crate::JSONRPC_VERSION => {}
        Some(_) => return Err(CodecError::invalid("jsonrpc must be \"2.0\"")),
        None => return Err(CodecError::invalid("jsonrpc member is missing")),
    }

    let id = match obj.remove("id") {
        None => return Err(CodecError::invalid("response must contain an id")),
        Some(Value::Null) => None,
        Some(value) => Some(
            RequestId::from_value(&value)
                .ok_or_else(|| CodecError::invalid("id must be a string, an integer or null"))?,
        ),
    };

    match (obj.remove("result"), obj.remove("error")) {
        (Some(_), Some(_)) => Err(CodecError::invalid(
            "response contains both result and error",
        )),
        (None, None) => Err(CodecError::invalid(
            "response contains neither result nor error",
        )),
        (Some(result), None) => {
            let id = id.ok_or_else(|| CodecError::invalid("a success response needs an id"))?;
            Ok(JsonRpcReply::Response(JsonRpcResponse::new(id, result)))
        }
        (None, Some(error @ Value::Object(_))) => {
            let error: JsonRpcErrorObject = serde_json::from_value(error)?;
            Ok(JsonRpcReply::Error(JsonRpcError::new(id, error)))
        }
        (None, Some(_)) => Err(CodecError::invalid("error must be an object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::JsonRpcMessage;

    #[test]
    fn test_decode_malformed_json() {
        let error = decode_payload(br#"{"jsonrpc": "2.0", "method": "test""#).unwrap_err();
        assert_eq!(error.error.code, -32700);
        assert_eq!(error.id, None);
        assert!(error.error.data.is_some());
    }

    #[test]
    fn test_decode_single_request() {
        let payload =
            decode_payload_str(r#"{"jsonrpc":"2.0","method":"sum","params":[1,2],"id":"r"}"#)
                .unwrap();
        let Payload::Single(Ok(JsonRpcMessage::Request(request))) = payload else {
            panic!("expected a single request");
        };
        assert_eq!(request.method, "sum");
        assert_eq!(request.id, RequestId::String("r".to_string()));
    }

    #[test]
    fn test_request_round_trip_preserves_fields() {
        let text = r#"{"id":7,"params":{"b":2,"a":1},"method":"add","jsonrpc":"2.0"}"#;
        let Payload::Single(Ok(JsonRpcMessage::Request(request))) =
            decode_payload_str(text).unwrap()
        else {
            panic!("expected a single request");
        };

        let encoded = encode_request(&request).unwrap();
        let original: Value = serde_json::from_str(text).unwrap();
        let round_tripped: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(original, round_tripped);
    }

    #[test]
    fn test_response_round_trip() {
        for text in [
            r#"{"jsonrpc":"2.0","id":1,"result":{"sum":3}}"#,
            r#"{"jsonrpc":"2.0","id":"x","result":null}"#,
            r#"{"jsonrpc":"2.0","id":18446744073709551615,"result":true}"#,
            r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#,
            r#"{"jsonrpc":"2.0","id":4,"error":{"code":-32602,"message":"Invalid params","data":{"k":1}}}"#,
        ] {
            let reply = decode_response(text).unwrap();
            let encoded = encode_reply(&reply).unwrap();
            let a: Value = serde_json::from_str(text).unwrap();
            let b: Value = serde_json::from_str(&encoded).unwrap();
            assert_eq!(a, b, "round trip changed {}", text);
        }
    }

    #[test]
    fn test_decode_response_rejects_bad_shapes() {
        for text in [
            r#"{"jsonrpc":"2.0","id":1,"result":1,"error":{"code":1,"message":"x"}}"#,
            r#"{"jsonrpc":"2.0","id":1}"#,
            r#"{"jsonrpc":"2.0","result":1}"#,
            r#"{"jsonrpc":"1.0","id":1,"result":1}"#,
            r#"{"jsonrpc":"2.0","id":[1],"result":1}"#,
            r#"{"jsonrpc":"2.0","id":1,"error":"nope"}"#,
            r#"[1]"#,
        ] {
            assert!(decode_response(text).is_err(), "accepted {}", text);
        }
    }

    #[test]
    fn test_decode_responses_batch() {
        let replies = decode_responses(
            r#"[{"jsonrpc":"2.0","id":1,"result":1},{"jsonrpc":"2.0","id":2,"error":{"code":-32601,"message":"Method not found"}}]"#,
        )
        .unwrap();
        assert_eq!(replies.len(), 2);
        assert!(!replies[0].is_error());
        assert!(replies[1].is_error());
    }
}
