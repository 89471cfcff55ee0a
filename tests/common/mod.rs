#![allow(dead_code)]

use async_trait::async_trait;
use jsd::client::{AsyncHttpTransport, HttpResponse, HttpTransport};
use jsd::config::init_test_logging;
use jsd::definition::LocalFileSystem;
use jsd::handlers::{register_lighting_handlers, LightState};
use jsd::server::Dispatcher;
use jsd::JsdResult;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Prefix the loopback transports accept
pub const LOOPBACK_ROOT: &str = "http://loopback.test";

/// The definition tree shipped with the crate
pub fn shipped_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("jsd")
}

/// Dispatcher over the shipped tree with the lighting handlers bound
pub fn lighting_dispatcher() -> Arc<Dispatcher> {
    let _ = init_test_logging();
    let mut dispatcher =
        Dispatcher::load(&LocalFileSystem, shipped_root()).expect("shipped definitions load");
    register_lighting_handlers(&mut dispatcher, Arc::new(LightState::new()))
        .expect("lighting handlers register");
    Arc::new(dispatcher)
}

/// Serves GET and POST straight from a dispatcher, the same way the HTTP
/// front end does, without a socket in between
#[derive(Clone)]
pub struct Loopback {
    dispatcher: Arc<Dispatcher>,
}

impl Loopback {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    fn path<'a>(&self, url: &'a str) -> &'a str {
        url.strip_prefix(LOOPBACK_ROOT).unwrap_or(url)
    }

    fn get_path(&self, url: &str) -> HttpResponse {
        let path = self.path(url);
        let registry = self.dispatcher.registry();
        if let Some(entry) = registry.service(path) {
            HttpResponse::new(200, entry.document().to_string())
        } else if let Some(schema) = registry.schemas().get_schema(path) {
            HttpResponse::new(200, schema.document().to_string())
        } else {
            HttpResponse::new(404, format!("404 Not Found: {}", path))
        }
    }

    async fn post_path(&self, url: &str, body: &str) -> HttpResponse {
        let path = self.path(url);
        if !self.dispatcher.registry().has_service(path) {
            return HttpResponse::new(404, format!("404 Not Found: {}", path));
        }
        let response = self.dispatcher.dispatch(path, body, None).await;
        HttpResponse::new(200, serde_json::to_string(&response).expect("response serializes"))
    }
}

impl HttpTransport for Loopback {
    fn get(&self, url: &str, _timeout: Duration) -> JsdResult<HttpResponse> {
        Ok(self.get_path(url))
    }

    fn post(
        &self,
        url: &str,
        body: &str,
        _content_type: &str,
        _timeout: Duration,
    ) -> JsdResult<HttpResponse> {
        Ok(futures::executor::block_on(self.post_path(url, body)))
    }
}

#[async_trait]
impl AsyncHttpTransport for Loopback {
    async fn get(&self, url: &str, _timeout: Duration) -> JsdResult<HttpResponse> {
        tokio::task::yield_now().await;
        Ok(self.get_path(url))
    }

    async fn post(
        &self,
        url: &str,
        body: &str,
        _content_type: &str,
        _timeout: Duration,
    ) -> JsdResult<HttpResponse> {
        Ok(self.post_path(url, body).await)
    }
}
