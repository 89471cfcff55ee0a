//! Request dispatcher
//!
//! Runs the protocol checks in order (envelope, method, argument), stops at
//! the first failure, and otherwise hands the validated argument to the
//! bound handler. Every outcome is a well-formed JSON-RPC response; nothing
//! escapes `dispatch` as an error.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::definition::{DefinitionRegistry, DocumentSource};
use crate::jsonrpc::{
    validate_argument_shape, validate_method_exists, validate_request_envelope, JsonRpcError,
    JsonRpcResponse,
};
use crate::log_event;
use crate::service::Handler;
use crate::{JsdError, JsdResult};

const PARSE_ERROR_DETAIL: &str = "Invalid JSON was received by the server. An error occurred on the server while parsing the JSON text.";

/// Server-side engine: a loaded registry plus handler bindings
#[derive(Debug, Default)]
pub struct Dispatcher {
    registry: DefinitionRegistry,
}

impl Dispatcher {
    pub fn new(registry: DefinitionRegistry) -> Self {
        Self { registry }
    }

    /// Load a definition tree into a fresh dispatcher
    pub fn load(source: &dyn DocumentSource, root: impl AsRef<Path>) -> JsdResult<Self> {
        let mut registry = DefinitionRegistry::new();
        registry.load(source, root)?;
        Ok(Self::new(registry))
    }

    pub fn registry(&self) -> &DefinitionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DefinitionRegistry {
        &mut self.registry
    }

    /// Bind `handler` to `method` on `endpoint`
    pub fn register_handler(
        &mut self,
        endpoint: &str,
        method: &str,
        handler: Arc<dyn Handler>,
    ) -> JsdResult<()> {
        self.registry.register_handler(endpoint, method, handler)
    }

    /// Dispatch raw request text received for `endpoint`
    pub async fn dispatch(
        &self,
        endpoint: &str,
        content: &str,
        context: Option<Value>,
    ) -> JsonRpcResponse {
        self.dispatch_bytes(endpoint, content.as_bytes(), context).await
    }

    /// Dispatch a raw request body. Bytes that are not valid UTF-8 JSON
    /// are a parse error.
    #[instrument(skip(self, body, context))]
    pub async fn dispatch_bytes(
        &self,
        endpoint: &str,
        body: &[u8],
        context: Option<Value>,
    ) -> JsonRpcResponse {
        let request: Value = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                log_event!(endpoint = endpoint, debug, "Rejected unparseable request: {}", e);
                return JsonRpcResponse::parse_error(format!("{} {}", PARSE_ERROR_DETAIL, e));
            }
        };

        self.dispatch_value(endpoint, request, context).await
    }

    /// Dispatch an already parsed request
    pub async fn dispatch_value(
        &self,
        endpoint: &str,
        request: Value,
        context: Option<Value>,
    ) -> JsonRpcResponse {
        let id = request.get("id").cloned().unwrap_or(Value::Null);

        if let Err(e) = validate_request_envelope(&request) {
            log_event!(endpoint = endpoint, debug, "Invalid request: {}", e.user_message());
            return JsonRpcResponse::invalid_request(e.user_message(), id);
        }

        let entry = match self.registry.service(endpoint) {
            Some(entry) => entry,
            None => {
                return JsonRpcResponse::method_not_found(
                    format!("Endpoint '{}' not found.", endpoint),
                    id,
                );
            }
        };

        // The envelope check guarantees a string method.
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if let Err(e) = validate_method_exists(entry.definition(), method) {
            return JsonRpcResponse::method_not_found(e.user_message(), id);
        }

        let argument = match validate_argument_shape(
            entry.definition(),
            method,
            &request,
            self.registry.schemas(),
        ) {
            Ok(argument) => argument,
            Err(e) => {
                log_event!(request = id, debug, "Invalid params for {}: {}", method, e.user_message());
                return JsonRpcResponse::invalid_params(invalid_params_data(&e), id);
            }
        };

        debug!("Invoking {}#{}", endpoint, method);
        match entry.call_handler(method, argument, context).await {
            Ok(result) => JsonRpcResponse::success(result, id),
            Err(e) => {
                log_event!(request = id, warn, "Handler for {}#{} failed: {}", endpoint, method, e.user_message());
                JsonRpcResponse::internal_error(e.user_message(), id)
            }
        }
    }
}

fn invalid_params_data(error: &JsdError) -> Value {
    match error {
        JsdError::Validation { .. } => JsonRpcError::from(error).data.unwrap_or(Value::Null),
        other => Value::String(other.user_message()),
    }
}
