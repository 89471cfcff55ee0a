//! Blocking client
//!
//! Runs every step of a call on the caller's thread, fetching definitions
//! and schemas from the remote server the first time they are needed.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::shared::{ClientCore, SchemaFetch};
use super::transport::{HttpTransport, ReqwestBlockingTransport};
use crate::jsonrpc::JSON_CONTENT_TYPE;
use crate::schema::Schema;
use crate::service::ServiceEntry;
use crate::JsdResult;

/// Client that blocks the calling thread for each round trip
pub struct JsdClient {
    core: ClientCore,
    transport: Box<dyn HttpTransport>,
}

impl JsdClient {
    /// Client over `reqwest::blocking`; do not create inside an async runtime
    pub fn new(remote_root: impl Into<String>, timeout: Duration) -> JsdResult<Self> {
        Ok(Self::with_transport(
            remote_root,
            timeout,
            Box::new(ReqwestBlockingTransport::new()?),
        ))
    }

    pub fn with_transport(
        remote_root: impl Into<String>,
        timeout: Duration,
        transport: Box<dyn HttpTransport>,
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
    pub fn load_definition(&self, endpoint: &str) -> JsdResult<Arc<ServiceEntry>> {
        if let Some(entry) = self.core.cached_service(endpoint) {
            return Ok(entry);
        }
        let response = self
            .transport
            .get(&self.core.url_for(endpoint), self.core.timeout())?;
        self.core.install_definition(endpoint, response)
    }

    /// Cached schema for `reference`, fetched on first use
    pub fn load_schema(&self, reference: &str) -> JsdResult<Arc<Schema>> {
        if let Some(schema) = self.core.cached_schema(reference) {
            return Ok(schema);
        }
        let mut fetch = SchemaFetch::new(reference);
        while let Some(next) = fetch.next_missing() {
            let response = self
                .transport
                .get(&self.core.url_for(&next), self.core.timeout())?;
            self.core.add_fetched_schema(&mut fetch, &next, response)?;
        }
        self.core.install_schemas(fetch)
    }

    /// Call `method` on `endpoint` and return its result (`Value::Null`
    /// when the method returns nothing).
    pub fn call(
        &self,
        endpoint: &str,
        method: &str,
        argument: Option<Value>,
        validate_result: bool,
    ) -> JsdResult<Value> {
        let entry = self.load_definition(endpoint)?;
        self.core.check_method(&entry, endpoint, method)?;

        let id = self.core.next_id();
        let param_schema = match (&argument, self.core.param_schema(&entry, method)?) {
            (Some(_), Some(reference)) => {
                self.load_schema(&reference)?;
                Some(reference)
            }
            _ => None,
        };
        let request = self
            .core
            .build_request(id, method, argument, param_schema.as_deref())?;
        debug!("Calling {}#{} with id {}", endpoint, method, request.id);

        let body = serde_json::to_string(&request)?;
        let response = self.transport.post(
            &self.core.url_for(endpoint),
            &body,
            JSON_CONTENT_TYPE,
            self.core.timeout(),
        )?;
        let result = self.core.read_response(endpoint, response)?;

        if validate_result {
            if let Some(reference) = self.core.result_schema(&entry, method, result.as_ref())? {
                self.load_schema(&reference)?;
                if let Some(value) = &result {
                    self.core.validate_result(&reference, value)?;
                }
            }
        }

        Ok(result.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::{HttpResponse, MockHttpTransport};
    use crate::JsdError;
    use mockall::predicate::eq;
    use serde_json::json;

    const ROOT: &str = "http://jsd.test";

    fn definition() -> String {
        json!({
            "name": "lightSimple",
            "title": "Simple Light",
            "description": "Turns a light on and off.",
            "types": { "LightStatus": "/lighting/LightStatus.json" },
            "methods": {
                "getLightStatus": {
                    "title": "Get", "description": "Get status.",
                    "param": null, "result": "LightStatus"
                },
                "setLightStatus": {
                    "title": "Set", "description": "Set status.",
                    "param": "LightStatus", "result": null
                }
            }
        })
        .to_string()
    }

    fn schema() -> String {
        json!({
            "type": "object",
            "properties": { "status": { "type": "boolean" } },
            "required": ["status"]
        })
        .to_string()
    }

    fn expect_documents(mock: &mut MockHttpTransport) {
        mock.expect_get()
            .with(eq("http://jsd.test/lighting/lightSimple"), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(HttpResponse::new(200, definition())));
        mock.expect_get()
            .with(eq("http://jsd.test/lighting/LightStatus.json"), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(HttpResponse::new(200, schema())));
    }

    #[test]
    fn test_call_fetches_each_document_once() {
        let mut mock = MockHttpTransport::new();
        expect_documents(&mut mock);
        mock.expect_post()
            .times(2)
            .returning(|_, body, content_type, _| {
                assert_eq!(content_type, "application/json");
                let req: Value = serde_json::from_str(body).unwrap();
                Ok(HttpResponse::new(
                    200,
                    json!({ "id": req["id"], "jsonrpc": "2.0", "result": { "status": true } }).to_string(),
                ))
            });

        let client = JsdClient::with_transport(ROOT, Duration::from_secs(1), Box::new(mock));
        for _ in 0..2 {
            let result = client
                .call("/lighting/lightSimple", "getLightStatus", None, true)
                .unwrap();
            assert_eq!(result, json!({ "status": true }));
        }
    }

    #[test]
    fn test_invalid_argument_is_never_posted() {
        let mut mock = MockHttpTransport::new();
        expect_documents(&mut mock);
        mock.expect_post().times(0);

        let client = JsdClient::with_transport(ROOT, Duration::from_secs(1), Box::new(mock));
        let err = client
            .call("/lighting/lightSimple", "setLightStatus", Some(json!({ "status": "on" })), true)
            .unwrap_err();
        assert!(matches!(err, JsdError::Validation { .. }));
        assert!(err.user_message().contains("Schema validation error on param."));
    }

    #[test]
    fn test_rejected_argument_still_consumes_an_id() {
        let mut mock = MockHttpTransport::new();
        expect_documents(&mut mock);
        mock.expect_post().times(1).returning(|_, body, _, _| {
            let req: Value = serde_json::from_str(body).unwrap();
            assert_eq!(req["id"], json!(2));
            Ok(HttpResponse::new(200, json!({ "id": 2, "jsonrpc": "2.0", "result": null }).to_string()))
        });

        let client = JsdClient::with_transport(ROOT, Duration::from_secs(1), Box::new(mock));
        assert!(client
            .call("/lighting/lightSimple", "setLightStatus", Some(json!({ "status": "on" })), true)
            .is_err());
        client
            .call("/lighting/lightSimple", "setLightStatus", Some(json!({ "status": true })), true)
            .unwrap();
    }

    #[test]
    fn test_load_schema_fetches_referenced_schema() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get()
            .with(eq("http://jsd.test/lighting/Room.json"), mockall::predicate::always())
            .times(1)
            .returning(|_, _| {
                Ok(HttpResponse::new(
                    200,
                    json!({ "type": "object", "properties": { "main": { "$ref": "/lighting/LightStatus.json" } } })
                        .to_string(),
                ))
            });
        mock.expect_get()
            .with(eq("http://jsd.test/lighting/LightStatus.json"), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(HttpResponse::new(200, schema())));

        let client = JsdClient::with_transport(ROOT, Duration::from_secs(1), Box::new(mock));
        let room = client.load_schema("/lighting/Room.json").unwrap();
        assert!(room.validate(&json!({ "main": { "status": false } })).is_ok());
        assert!(room.validate(&json!({ "main": {} })).is_err());

        // Both are cached now
        client.load_schema("/lighting/LightStatus.json").unwrap();
        client.load_schema("/lighting/Room.json").unwrap();
    }

    #[test]
    fn test_unknown_method_fails_before_post() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get()
            .times(1)
            .returning(|_, _| Ok(HttpResponse::new(200, definition())));
        mock.expect_post().times(0);

        let client = JsdClient::with_transport(ROOT, Duration::from_secs(1), Box::new(mock));
        let err = client
            .call("/lighting/lightSimple", "toggle", None, true)
            .unwrap_err();
        assert_eq!(
            err.user_message(),
            "Method 'toggle' not found in endpoint '/lighting/lightSimple'."
        );
    }

    #[test]
    fn test_result_validation_can_be_skipped() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get()
            .with(eq("http://jsd.test/lighting/lightSimple"), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(HttpResponse::new(200, definition())));
        mock.expect_post().times(2).returning(|_, _, _, _| {
            Ok(HttpResponse::new(200, r#"{"id":1,"jsonrpc":"2.0","result":null}"#))
        });

        let client = JsdClient::with_transport(ROOT, Duration::from_secs(1), Box::new(mock));
        assert_eq!(
            client
                .call("/lighting/lightSimple", "getLightStatus", None, false)
                .unwrap(),
            Value::Null
        );

        let err = client
            .call("/lighting/lightSimple", "getLightStatus", None, true)
            .unwrap_err();
        assert!(err.user_message().contains("Result is missing or null"));
    }

    #[test]
    fn test_http_failure_is_transport_error() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get()
            .returning(|_, _| Ok(HttpResponse::new(404, "404 Not Found: /nope")));

        let client = JsdClient::with_transport(ROOT, Duration::from_secs(1), Box::new(mock));
        match client.call("/nope", "m", None, true) {
            Err(JsdError::Transport { status, .. }) => assert_eq!(status, Some(404)),
            other => panic!("Expected transport error, got {:?}", other),
        }
    }
}
