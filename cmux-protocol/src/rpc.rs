//! v2 request/response envelopes
//!
//! Request: `{"id": <any>, "method": "<domain.action>", "params": {...}}`
//! Response: `{"id": <same>, "ok": true, "result": ...}` or
//! `{"id": <same>, "ok": false, "error": {"code", "message", "data"?}}`

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CommandError, ErrorCode};

/// A v2 request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Caller-chosen id, echoed verbatim
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default = "empty_params")]
    pub params: Value,
}

fn empty_params() -> Value {
    Value::Object(Map::new())
}

impl RpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Parse a v2 record
    ///
    /// On failure returns the error response to send, carrying the request
    /// id whenever one could be recovered.
    pub fn parse(line: &str) -> Result<Self, RpcResponse> {
        let value: Value = serde_json::from_str(line).map_err(|e| {
            RpcResponse::failure(
                Value::Null,
                CommandError::new(ErrorCode::ParseError, format!("Invalid JSON: {}", e)),
            )
        })?;

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let Value::Object(mut object) = value else {
            return Err(RpcResponse::failure(
                id,
                CommandError::new(ErrorCode::InvalidRequest, "Request must be a JSON object"),
            ));
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) if !method.is_empty() => method,
            _ => {
                return Err(RpcResponse::failure(
                    id,
                    CommandError::new(ErrorCode::InvalidRequest, "Missing method"),
                ))
            }
        };

        let params = match object.remove("params") {
            None | Some(Value::Null) => empty_params(),
            Some(params @ Value::Object(_)) => params,
            Some(_) => {
                return Err(RpcResponse::failure(
                    id,
                    CommandError::new(ErrorCode::InvalidRequest, "params must be an object"),
                ))
            }
        };

        Ok(Self { id, method, params })
    }

    /// Serialize as a single line
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Error object inside a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<CommandError> for RpcError {
    fn from(err: CommandError) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message,
            data: None,
        }
    }
}

/// A v2 response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Value,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: impl Into<RpcError>) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Convert to a `Result`, keeping the error object on failure
    pub fn into_result(self) -> Result<Value, RpcError> {
        if self.ok {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or(RpcError {
                code: "error".into(),
                message: "Unknown error".into(),
                data: None,
            }))
        }
    }

    /// Serialize as a single line
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"id":null,"ok":false,"error":{"code":"internal_error","message":"Failed to encode response"}}"#
                .to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_request_defaults_params() {
        let req = RpcRequest::parse(r#"{"id":7,"method":"system.ping"}"#).unwrap();
        assert_eq!(req.id, json!(7));
        assert_eq!(req.method, "system.ping");
        assert_eq!(req.params, json!({}));
    }

    #[test]
    fn test_parse_keeps_string_id() {
        let req = RpcRequest::parse(r#"{"id":"abc","method":"x","params":{"a":1}}"#).unwrap();
        assert_eq!(req.id, json!("abc"));
        assert_eq!(req.params["a"], json!(1));
    }

    #[test]
    fn test_parse_errors_carry_id() {
        let resp = RpcRequest::parse("{not json").unwrap_err();
        assert_eq!(resp.error.unwrap().code, "parse_error");
        assert_eq!(resp.id, Value::Null);

        let resp = RpcRequest::parse(r#"{"id":3}"#).unwrap_err();
        assert_eq!(resp.id, json!(3));
        assert_eq!(resp.error.unwrap().code, "invalid_request");

        let resp = RpcRequest::parse(r#"{"id":4,"method":"m","params":[1]}"#).unwrap_err();
        assert_eq!(resp.id, json!(4));
    }

    #[test]
    fn test_response_shape() {
        let ok = RpcResponse::success(json!(1), json!({"pong": true}));
        let line = ok.to_line();
        assert_eq!(line, r#"{"id":1,"ok":true,"result":{"pong":true}}"#);

        let err = RpcResponse::failure(json!(2), CommandError::auth_required());
        let value: Value = serde_json::from_str(&err.to_line()).unwrap();
        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["error"]["code"], json!("auth_required"));
        assert!(value.get("result").is_none());
        assert!(value["error"].get("data").is_none());
    }
}
