//! Service entries and handler bindings
//!
//! One [`ServiceEntry`] exists per loaded definition. On the server it also
//! carries the method-name to [`Handler`] table used by the dispatcher.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::definition::Definition;
use crate::{JsdError, JsdResult};

/// Capability implemented by anything that serves a method.
///
/// `argument` is the already-validated parameter (or `None` when the method
/// takes none) and `context` is the opaque value handed to the dispatcher
/// by its caller. The returned value becomes the JSON-RPC `result`; return
/// `Value::Null` for methods that declare no result.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, argument: Option<Value>, context: Option<Value>) -> anyhow::Result<Value>;
}

type HandlerFn =
    dyn Fn(Option<Value>, Option<Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;

/// Handler backed by a closure
pub struct FnHandler {
    func: Box<HandlerFn>,
}

#[async_trait]
impl Handler for FnHandler {
    async fn handle(&self, argument: Option<Value>, context: Option<Value>) -> anyhow::Result<Value> {
        (self.func)(argument, context).await
    }
}

/// Helper function to create a handler from an async closure
pub fn handler_fn<F, Fut>(func: F) -> Arc<dyn Handler>
where
    F: Fn(Option<Value>, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler {
        func: Box::new(move |argument, context| Box::pin(func(argument, context))),
    })
}

/// A loaded definition plus its handler bindings
pub struct ServiceEntry {
    definition: Definition,
    document: Value,
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl ServiceEntry {
    /// Create an entry from a validated definition and its source document
    pub fn new(definition: Definition, document: Value) -> Self {
        Self {
            definition,
            document,
            handlers: HashMap::new(),
        }
    }

    /// Validate and wrap a raw definition document
    pub fn from_document(document: Value) -> JsdResult<Self> {
        let definition = Definition::from_document(&document)?;
        Ok(Self::new(definition, document))
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    /// The definition document as it was loaded
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Bind a handler to a declared method, replacing any earlier binding
    pub fn set_handler(&mut self, method: &str, handler: Arc<dyn Handler>) -> JsdResult<()> {
        if !self.definition.has_method(method) {
            return Err(JsdError::protocol(format!(
                "Method name '{}' not found in service definition.",
                method
            )));
        }

        self.handlers.insert(method.to_string(), handler);
        debug!("Bound handler for method '{}'", method);
        Ok(())
    }

    pub fn has_handler(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Invoke the handler bound to `method`
    pub async fn call_handler(
        &self,
        method: &str,
        argument: Option<Value>,
        context: Option<Value>,
    ) -> JsdResult<Value> {
        let handler = self
            .handlers
            .get(method)
            .cloned()
            .ok_or_else(|| JsdError::handler(format!("Method '{}' is not implemented.", method)))?;

        handler
            .handle(argument, context)
            .await
            .map_err(|e| JsdError::handler(format!("{:#}", e)))
    }
}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bound: Vec<&String> = self.handlers.keys().collect();
        bound.sort();
        f.debug_struct("ServiceEntry")
            .field("definition", &self.definition)
            .field("handlers", &bound)
            .finish()
    }
}
