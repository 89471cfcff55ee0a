//! JSON-RPC 2.0 envelopes and protocol validation
//!
//! The protocol is intentionally narrow: every request carries an id,
//! `params` is either absent or a one-element array, and batch requests
//! and notifications are not supported.

pub mod protocol;
pub mod validation;

pub use protocol::{error_codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use validation::{
    argument_schema_ref, result_schema_ref, validate_against_schema, validate_argument_shape,
    validate_method_exists, validate_request_envelope, validate_response_envelope,
    validate_result,
};

pub const JSONRPC_VERSION: &str = "2.0";

/// Content type used for every RPC POST and document response
pub const JSON_CONTENT_TYPE: &str = "application/json";
