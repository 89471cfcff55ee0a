//! Suspending client
//!
//! Each call is an explicit state machine carried in its own
//! [`CallContext`]. A state transition either completes synchronously or
//! suspends on exactly one fetch (definition, schema or the RPC POST), so
//! any number of calls can be in flight on the same client without sharing
//! per-call state.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::shared::{ClientCore, SchemaFetch};
use super::transport::{AsyncHttpTransport, HttpResponse, ReqwestTransport};
use crate::jsonrpc::{JsonRpcRequest, JSON_CONTENT_TYPE};
use crate::schema::Schema;
use crate::service::ServiceEntry;
use crate::{JsdError, JsdResult};

/// Where a call currently is
#[derive(Debug)]
pub enum CallState {
    Start,
    DefinitionReady {
        entry: Arc<ServiceEntry>,
    },
    ArgumentValidated {
        entry: Arc<ServiceEntry>,
        request: JsonRpcRequest,
    },
    Posted {
        entry: Arc<ServiceEntry>,
        response: HttpResponse,
    },
    ResponseValidated {
        entry: Arc<ServiceEntry>,
        result: Option<Value>,
    },
    Done(Value),
}

impl CallState {
    pub fn name(&self) -> &'static str {
        match self {
            CallState::Start => "Start",
            CallState::DefinitionReady { .. } => "DefinitionReady",
            CallState::ArgumentValidated { .. } => "ArgumentValidated",
            CallState::Posted { .. } => "Posted",
            CallState::ResponseValidated { .. } => "ResponseValidated",
            CallState::Done(_) => "Done",
        }
    }
}

/// Inputs of one call, owned by that call alone
#[derive(Debug, Clone)]
pub struct CallContext {
    pub endpoint: String,
    pub method: String,
    pub argument: Option<Value>,
    pub validate_result: bool,
}

impl CallContext {
    pub fn new(
        endpoint: impl Into<String>,
        method: impl Into<String>,
        argument: Option<Value>,
        validate_result: bool,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            argument,
            validate_result,
        }
    }
}

/// Client whose network steps suspend instead of blocking
pub struct AsyncJsdClient {
    core: ClientCore,
    transport: Arc<dyn AsyncHttpTransport>,
}

impl AsyncJsdClient {
    /// Client over `reqwest`
    pub fn new(remote_root: impl Into<String>, timeout: Duration) -> Self {
        Self::with_transport(remote_root, timeout, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(
        remote_root: impl Into<String>,
        timeout: Duration,
        transport: Arc<dyn AsyncHttpTransport>,
    ) -> Self {
        Self {
            core: ClientCore::new(remote_root, timeout),
            transport,
        }
    }

    pub fn remote_root(&self) -> &str {
        self.core.remote_root()
    }

    pub fn timeout(&self) -> Duration {
        self.core.timeout()
    }

    /// Cached definition for `endpoint`, fetched on first use
    pub async fn load_definition(&self, endpoint: &str) -> JsdResult<Arc<ServiceEntry>> {
        if let Some(entry) = self.core.cached_service(endpoint) {
            return Ok(entry);
        }
        let response = self
            .transport
            .get(&self.core.url_for(endpoint), self.core.timeout())
            .await?;
        self.core.install_definition(endpoint, response)
    }

    /// Cached schema for `reference`, fetched on first use
    pub async fn load_schema(&self, reference: &str) -> JsdResult<Arc<Schema>> {
        if let Some(schema) = self.core.cached_schema(reference) {
            return Ok(schema);
        }
        let mut fetch = SchemaFetch::new(reference);
        while let Some(next) = fetch.next_missing() {
            let response = self
                .transport
                .get(&self.core.url_for(&next), self.core.timeout())
                .await?;
            self.core.add_fetched_schema(&mut fetch, &next, response)?;
        }
        self.core.install_schemas(fetch)
    }

    /// Call `method` on `endpoint` and return its result (`Value::Null`
    /// when the method returns nothing).
    pub async fn call(
        &self,
        endpoint: &str,
        method: &str,
        argument: Option<Value>,
        validate_result: bool,
    ) -> JsdResult<Value> {
        let context = CallContext::new(endpoint, method, argument, validate_result);
        self.run(context).await
    }

    /// Drive a call to completion
    pub async fn run(&self, context: CallContext) -> JsdResult<Value> {
        let mut state = CallState::Start;
        loop {
            state = match state {
                CallState::Done(result) => return Ok(result),
                other => {
                    trace!("{}#{} leaving {}", context.endpoint, context.method, other.name());
                    self.advance(&context, other).await?
                }
            };
        }
    }

    /// Start a call in the background. Exactly one of `on_success` or
    /// `on_error` runs when the call finishes.
    pub fn spawn_call<S, E>(
        self: &Arc<Self>,
        context: CallContext,
        on_success: S,
        on_error: E,
    ) -> JoinHandle<()>
    where
        S: FnOnce(Value) + Send + 'static,
        E: FnOnce(JsdError) + Send + 'static,
    {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            match client.run(context).await {
                Ok(result) => on_success(result),
                Err(error) => on_error(error),
            }
        })
    }

    /// Perform one transition
    async fn advance(&self, context: &CallContext, state: CallState) -> JsdResult<CallState> {
        let endpoint = context.endpoint.as_str();
        let method = context.method.as_str();

        match state {
            CallState::Start => {
                let entry = self.load_definition(endpoint).await?;
                self.core.check_method(&entry, endpoint, method)?;
                Ok(CallState::DefinitionReady { entry })
            }
            CallState::DefinitionReady { entry } => {
                let id = self.core.next_id();
                let param_schema = match (&context.argument, self.core.param_schema(&entry, method)?) {
                    (Some(_), Some(reference)) => {
                        self.load_schema(&reference).await?;
                        Some(reference)
                    }
                    _ => None,
                };
                let request = self.core.build_request(
                    id,
                    method,
                    context.argument.clone(),
                    param_schema.as_deref(),
                )?;
                Ok(CallState::ArgumentValidated { entry, request })
            }
            CallState::ArgumentValidated { entry, request } => {
                debug!("Calling {}#{} with id {}", endpoint, method, request.id);
                let body = serde_json::to_string(&request)?;
                let response = self
                    .transport
                    .post(
                        &self.core.url_for(endpoint),
                        &body,
                        JSON_CONTENT_TYPE,
                        self.core.timeout(),
                    )
                    .await?;
                Ok(CallState::Posted { entry, response })
            }
            CallState::Posted { entry, response } => {
                let result = self.core.read_response(endpoint, response)?;
                Ok(CallState::ResponseValidated { entry, result })
            }
            CallState::ResponseValidated { entry, result } => {
                if context.validate_result {
                    if let Some(reference) = self.core.result_schema(&entry, method, result.as_ref())? {
                        self.load_schema(&reference).await?;
                        if let Some(value) = &result {
                            self.core.validate_result(&reference, value)?;
                        }
                    }
                }
                Ok(CallState::Done(result.unwrap_or(Value::Null)))
            }
            CallState::Done(result) => Ok(CallState::Done(result)),
        }
    }
}
