//! Core JSON-RPC 2.0 envelope types
//!
//! Requests carry at most one positional argument (`params: [argument]`).
//! Responses always serialize their `id`, and a success response keeps an
//! explicit `"result": null` so that methods without a result still produce
//! a well-formed envelope.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::JSONRPC_VERSION;
use crate::JsdError;

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub id: Value,
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<Value>>,
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Value,
    pub jsonrpc: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 Error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

// A present `"result": null` must stay distinguishable from a missing member.
fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcRequest {
    /// Create a new request with an optional single argument
    pub fn new(id: impl Into<Value>, method: impl Into<String>, argument: Option<Value>) -> Self {
        Self {
            id: id.into(),
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: argument.map(|arg| vec![arg]),
        }
    }

    /// The single positional argument, if any
    pub fn argument(&self) -> Option<&Value> {
        self.params.as_ref().and_then(|p| p.first())
    }
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(result: Value, id: Value) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(error: JsonRpcError, id: Value) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
        }
    }

    /// Create a parse error response; the id is unknown at this point
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::error(
            JsonRpcError::new(error_codes::PARSE_ERROR, "Parse error", Some(Value::String(detail.into()))),
            Value::Null,
        )
    }

    /// Create an invalid request error response
    pub fn invalid_request(detail: impl Into<String>, id: Value) -> Self {
        Self::error(
            JsonRpcError::new(error_codes::INVALID_REQUEST, "Invalid Request", Some(Value::String(detail.into()))),
            id,
        )
    }

    /// Create a method not found error response
    pub fn method_not_found(detail: impl Into<String>, id: Value) -> Self {
        Self::error(
            JsonRpcError::new(error_codes::METHOD_NOT_FOUND, "Method not found", Some(Value::String(detail.into()))),
            id,
        )
    }

    /// Create an invalid params error response
    pub fn invalid_params(data: Value, id: Value) -> Self {
        Self::error(
            JsonRpcError::new(error_codes::INVALID_PARAMS, "Invalid params", Some(data)),
            id,
        )
    }

    /// Create an internal error response
    pub fn internal_error(detail: impl Into<String>, id: Value) -> Self {
        Self::error(
            JsonRpcError::new(error_codes::INTERNAL_ERROR, "Internal error", Some(Value::String(detail.into()))),
            id,
        )
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }
}

/// Map a JSD error to the JSON-RPC error object a server would send.
/// Schema violations keep their structured detail in `data`.
impl From<&JsdError> for JsonRpcError {
    fn from(error: &JsdError) -> Self {
        let code = error.error_code();
        let message = match code {
            error_codes::PARSE_ERROR => "Parse error",
            error_codes::INVALID_REQUEST => "Invalid Request",
            error_codes::METHOD_NOT_FOUND => "Method not found",
            error_codes::INVALID_PARAMS => "Invalid params",
            _ => "Internal error",
        };

        let data = match error {
            JsdError::Validation { message, violation } => serde_json::json!({
                "description": message,
                "message": violation.message,
                "dataPath": violation.data_path,
                "schemaPath": violation.schema_path,
            }),
            JsdError::Rpc { data: Some(data), .. } => data.clone(),
            other => Value::String(other.user_message()),
        };

        JsonRpcError::new(code, message, Some(data))
    }
}
