//! HTTP transports used by the clients
//!
//! The clients only need GET and POST with a per-request timeout. Any
//! status other than 200 is left for the caller to judge; connection
//! failures and timeouts surface as [`JsdError::Transport`].

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, trace};

use crate::{JsdError, JsdResult, ResultExt};

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Blocking HTTP capability
#[cfg_attr(test, mockall::automock)]
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str, timeout: Duration) -> JsdResult<HttpResponse>;

    fn post(
        &self,
        url: &str,
        body: &str,
        content_type: &str,
        timeout: Duration,
    ) -> JsdResult<HttpResponse>;
}

/// Non-blocking HTTP capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AsyncHttpTransport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> JsdResult<HttpResponse>;

    async fn post(
        &self,
        url: &str,
        body: &str,
        content_type: &str,
        timeout: Duration,
    ) -> JsdResult<HttpResponse>;
}

/// Blocking transport over `reqwest::blocking`.
///
/// Must be created and used outside of an async runtime.
#[derive(Debug, Clone)]
pub struct ReqwestBlockingTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestBlockingTransport {
    pub fn new() -> JsdResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| JsdError::transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestBlockingTransport {
    fn get(&self, url: &str, timeout: Duration) -> JsdResult<HttpResponse> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .with_transport_context(url)?;
        let status = response.status().as_u16();
        let body = response.text().with_transport_context(url)?;
        trace!("GET {} -> {}", url, status);
        Ok(HttpResponse::new(status, body))
    }

    fn post(
        &self,
        url: &str,
        body: &str,
        content_type: &str,
        timeout: Duration,
    ) -> JsdResult<HttpResponse> {
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body.to_string())
            .timeout(timeout)
            .send()
            .with_transport_context(url)?;
        let status = response.status().as_u16();
        let body = response.text().with_transport_context(url)?;
        trace!("POST {} -> {}", url, status);
        Ok(HttpResponse::new(status, body))
    }
}

/// Async transport over `reqwest`
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AsyncHttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> JsdResult<HttpResponse> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .with_transport_context(url)?;
        let status = response.status().as_u16();
        let body = response.text().await.with_transport_context(url)?;
        trace!("GET {} -> {}", url, status);
        Ok(HttpResponse::new(status, body))
    }

    async fn post(
        &self,
        url: &str,
        body: &str,
        content_type: &str,
        timeout: Duration,
    ) -> JsdResult<HttpResponse> {
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body.to_string())
            .timeout(timeout)
            .send()
            .await
            .with_transport_context(url)?;
        let status = response.status().as_u16();
        let body = response.text().await.with_transport_context(url)?;
        trace!("POST {} -> {}", url, status);
        Ok(HttpResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_200_is_ok() {
        assert!(HttpResponse::new(200, "{}").is_ok());
        assert!(!HttpResponse::new(201, "").is_ok());
        assert!(!HttpResponse::new(404, "404 Not Found: /x").is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let transport = ReqwestTransport::new();
        let err = transport
            .get("http://127.0.0.1:1/nothing", Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::JsdError::Transport { .. }));
    }
}
