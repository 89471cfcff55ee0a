//! State and steps shared by the blocking and suspending clients
//!
//! Everything here is synchronous. The two client variants differ only in
//! how they perform the fetches between these steps, so a given failure
//! produces the same diagnostic in both.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::ids::IdGenerator;
use super::transport::HttpResponse;
use crate::jsonrpc::{
    argument_schema_ref, result_schema_ref, validate_against_schema, validate_method_exists,
    validate_response_envelope, JsonRpcRequest, JsonRpcResponse,
};
use crate::schema::{parse_schema_text, referenced_schemas, Schema, SchemaCache};
use crate::service::ServiceEntry;
use crate::{JsdError, JsdResult};

/// Default timeout applied to every fetch and call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Schemas gathered for one `load_schema`: the requested one plus every
/// uncached schema it references, directly or transitively
#[derive(Debug)]
pub(crate) struct SchemaFetch {
    root: String,
    queue: Vec<String>,
    seen: HashSet<String>,
    fetched: Vec<(String, Value)>,
}

impl SchemaFetch {
    pub fn new(reference: &str) -> Self {
        Self {
            root: reference.to_string(),
            queue: vec![reference.to_string()],
            seen: HashSet::from([reference.to_string()]),
            fetched: Vec::new(),
        }
    }

    /// Next schema that still has to be fetched
    pub fn next_missing(&mut self) -> Option<String> {
        self.queue.pop()
    }
}

#[derive(Debug)]
pub(crate) struct ClientCore {
    remote_root: String,
    timeout: Duration,
    ids: IdGenerator,
    services: RwLock<HashMap<String, Arc<ServiceEntry>>>,
    schemas: SchemaCache,
}

impl ClientCore {
    pub fn new(remote_root: impl Into<String>, timeout: Duration) -> Self {
        let remote_root = remote_root.into().trim_end_matches('/').to_string();
        Self {
            remote_root,
            timeout,
            ids: IdGenerator::new(),
            services: RwLock::new(HashMap::new()),
            schemas: SchemaCache::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    /// Absolute URL of a logical path on the remote server
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.remote_root, path)
    }

    pub fn cached_service(&self, endpoint: &str) -> Option<Arc<ServiceEntry>> {
        let hit = self.services.read().get(endpoint).cloned();
        debug!(
            "Definition cache {} for '{}'",
            if hit.is_some() { "hit" } else { "miss" },
            endpoint
        );
        hit
    }

    pub fn cached_schema(&self, reference: &str) -> Option<Arc<Schema>> {
        self.schemas.get_schema(reference)
    }

    pub fn next_id(&self) -> u32 {
        self.ids.next_id()
    }

    /// Turn a fetched definition into a cached service entry
    pub fn install_definition(
        &self,
        endpoint: &str,
        response: HttpResponse,
    ) -> JsdResult<Arc<ServiceEntry>> {
        let body = self.check_status("Failed to load definition", endpoint, response)?;

        let document: Value = serde_json::from_str(&body).map_err(|e| {
            JsdError::load(
                format!("JSON parse exception in file '{}'. {}", endpoint, e),
                Some(endpoint.to_string()),
            )
        })?;

        let entry = ServiceEntry::from_document(document).map_err(|e| {
            let detail = match e {
                JsdError::Load { message, .. } => message,
                other => other.user_message(),
            };
            JsdError::load(
                format!("JSD validation exception in file '{}'. {}", endpoint, detail),
                Some(endpoint.to_string()),
            )
        })?;

        let mut services = self.services.write();
        let entry = services
            .entry(endpoint.to_string())
            .or_insert_with(|| Arc::new(entry))
            .clone();
        info!("Loaded definition '{}'", endpoint);
        Ok(entry)
    }

    /// Parse a fetched schema and queue the schemas it references that
    /// are not cached yet
    pub fn add_fetched_schema(
        &self,
        fetch: &mut SchemaFetch,
        reference: &str,
        response: HttpResponse,
    ) -> JsdResult<()> {
        let body = self.check_status("Failed to load schema", reference, response)?;
        let document = parse_schema_text(reference, &body)?;

        for target in referenced_schemas(&document) {
            if !self.schemas.contains(&target) && fetch.seen.insert(target.clone()) {
                debug!("Schema '{}' references '{}'", reference, target);
                fetch.queue.push(target);
            }
        }
        fetch.fetched.push((reference.to_string(), document));
        Ok(())
    }

    /// Compile and cache everything a finished fetch gathered. Returns the
    /// schema the fetch was started for.
    pub fn install_schemas(&self, fetch: SchemaFetch) -> JsdResult<Arc<Schema>> {
        let mut documents = self.schemas.documents();
        for (reference, document) in &fetch.fetched {
            documents.insert(reference.clone(), document.clone());
        }

        for (reference, document) in fetch.fetched {
            self.schemas.add_schema_with(&reference, document, &documents)?;
            info!("Loaded schema '{}'", reference);
        }

        self.schemas
            .get_schema(&fetch.root)
            .ok_or_else(|| JsdError::protocol(format!("Schema '{}' is not loaded.", fetch.root)))
    }

    pub fn check_method(&self, entry: &ServiceEntry, endpoint: &str, method: &str) -> JsdResult<()> {
        validate_method_exists(entry.definition(), method)
            .map(|_| ())
            .map_err(|_| {
                JsdError::protocol(format!(
                    "Method '{}' not found in endpoint '{}'.",
                    method, endpoint
                ))
            })
    }

    /// Schema the argument must be checked against, if the method takes one
    pub fn param_schema(&self, entry: &ServiceEntry, method: &str) -> JsdResult<Option<String>> {
        Ok(argument_schema_ref(entry.definition(), method)?.map(str::to_string))
    }

    /// Build the request envelope for call `id`. An argument must be a
    /// JSON object and, when `param_schema` is given, valid against it;
    /// that schema must already be cached.
    pub fn build_request(
        &self,
        id: u32,
        method: &str,
        argument: Option<Value>,
        param_schema: Option<&str>,
    ) -> JsdResult<JsonRpcRequest> {
        if let Some(arg) = &argument {
            if !arg.is_object() {
                return Err(JsdError::protocol("Expecting argument to be a JSON object."));
            }
            if let Some(reference) = param_schema {
                validate_against_schema(&self.schemas, reference, arg, "param")?;
            }
        }

        Ok(JsonRpcRequest::new(id, method, argument))
    }

    /// Check the HTTP outcome and envelope of a call. Returns the `result`
    /// member, or the remote `error` as [`JsdError::Rpc`].
    pub fn read_response(&self, endpoint: &str, response: HttpResponse) -> JsdResult<Option<Value>> {
        let body = self.check_status("Remote call failed", endpoint, response)?;

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            JsdError::protocol(format!("Failed to parse response from '{}'. {}", endpoint, e))
        })?;
        validate_response_envelope(&value)?;

        let response: JsonRpcResponse = serde_json::from_value(value)?;
        if let Some(error) = response.error {
            return Err(JsdError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        Ok(response.result)
    }

    /// Apply the declared result contract. Returns the schema the result
    /// still has to be validated against, if any.
    pub fn result_schema(
        &self,
        entry: &ServiceEntry,
        method: &str,
        result: Option<&Value>,
    ) -> JsdResult<Option<String>> {
        Ok(result_schema_ref(entry.definition(), method, result)?.map(str::to_string))
    }

    /// Validate a result against a cached schema
    pub fn validate_result(&self, reference: &str, result: &Value) -> JsdResult<()> {
        validate_against_schema(&self.schemas, reference, result, "result")
    }

    fn check_status(&self, what: &str, path: &str, response: HttpResponse) -> JsdResult<String> {
        if response.is_ok() {
            Ok(response.body)
        } else {
            Err(JsdError::http_status(
                format!("{} '{}'.", what, path),
                response.status,
                response.body,
            ))
        }
    }
}
