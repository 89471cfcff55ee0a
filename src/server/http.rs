//! HTTP front end for the dispatcher
//!
//! Endpoint paths double as resources: GET returns the service definition
//! (or a schema document, or a static file from the public directory) and
//! POST runs a JSON-RPC call against the service.
//!
//! The server:
//! - Listens on a TCP socket for incoming HTTP/1.1 connections
//! - Spawns a tokio task for each connection
//! - Passes the peer address to handlers as the call context

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use super::Dispatcher;
use crate::definition::{DocumentSource, LocalFileSystem};
use crate::jsonrpc::JSON_CONTENT_TYPE;
use crate::{JsdError, JsdResult};

type HttpResponse = Response<Full<Bytes>>;

/// HTTP server for a loaded dispatcher
pub struct JsdHttpServer {
    dispatcher: Arc<Dispatcher>,
    public_dir: PathBuf,
}

impl JsdHttpServer {
    /// Creates a new HTTP server serving static files from `public_dir`
    pub fn new(dispatcher: Arc<Dispatcher>, public_dir: impl Into<PathBuf>) -> Self {
        Self {
            dispatcher,
            public_dir: public_dir.into(),
        }
    }

    /// Bind `addr` and serve until the process stops
    pub async fn run(self, addr: SocketAddr) -> JsdResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| JsdError::transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serve connections accepted from an already bound listener
    pub async fn serve(self, listener: TcpListener) -> JsdResult<()> {
        let local = listener
            .local_addr()
            .map_err(|e| JsdError::transport(format!("Failed to get local address: {}", e)))?;
        info!("HTTP server listening on {}", local);

        let state = Arc::new(self);
        loop {
            let (stream, peer) = listener
                .accept()
                .await
                .map_err(|e| JsdError::transport(format!("Failed to accept connection: {}", e)))?;

            let io = TokioIo::new(stream);
            let state = state.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let state = state.clone();
                    async move { Ok::<_, Infallible>(state.handle_request(req, peer).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer, err);
                }
            });
        }
    }

    async fn handle_request(&self, req: Request<Incoming>, peer: SocketAddr) -> HttpResponse {
        let method = req.method().clone();
        let path = match req.uri().path() {
            "/" => "/index.html".to_string(),
            other => other.to_string(),
        };
        debug!("{} {} from {}", method, path, peer);

        match method {
            Method::GET => self.handle_get(&path),
            Method::POST => {
                if !self.dispatcher.registry().has_service(&path) {
                    return not_found(&path);
                }

                let body = match req.into_body().collect().await {
                    Ok(collected) => collected.to_bytes(),
                    Err(e) => {
                        warn!("Failed to read request body from {}: {}", peer, e);
                        return text_response(StatusCode::BAD_REQUEST, "Failed to read request body.");
                    }
                };
                let context = json!({ "remoteAddr": peer.to_string() });

                let response = self.dispatcher.dispatch_bytes(&path, &body, Some(context)).await;
                match serde_json::to_vec(&response) {
                    Ok(bytes) => json_response(bytes),
                    Err(e) => {
                        error!("Failed to serialize response for {}: {}", path, e);
                        text_response(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
                    }
                }
            }
            _ => text_response(StatusCode::METHOD_NOT_ALLOWED, "405 Method not allowed."),
        }
    }

    fn handle_get(&self, path: &str) -> HttpResponse {
        let registry = self.dispatcher.registry();

        if let Some(entry) = registry.service(path) {
            return json_response(entry.document().to_string().into_bytes());
        }

        if let Some(schema) = registry.schemas().get_schema(path) {
            return json_response(schema.document().to_string().into_bytes());
        }

        if let Some(file) = public_file(&self.public_dir, path) {
            if LocalFileSystem.exists(&file) && !LocalFileSystem.is_directory(&file) {
                match LocalFileSystem.read_binary(&file) {
                    Ok(bytes) => return file_response(&file, bytes),
                    Err(e) => warn!("Failed to read {}: {}", file.display(), e.user_message()),
                }
            }
        }

        info!("Couldn't find resource '{}'.", path);
        not_found(path)
    }
}

/// Map a request path under the public directory, refusing anything that
/// would climb out of it
fn public_file(public_dir: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(public_dir.join(relative))
}

fn content_type_for(file: &Path) -> &'static str {
    match file.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") | Some("jsd") => JSON_CONTENT_TYPE,
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn with_content_type(mut response: HttpResponse, content_type: &'static str) -> HttpResponse {
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_response(body: Vec<u8>) -> HttpResponse {
    with_content_type(Response::new(Full::new(Bytes::from(body))), JSON_CONTENT_TYPE)
}

fn file_response(file: &Path, body: Vec<u8>) -> HttpResponse {
    with_content_type(Response::new(Full::new(Bytes::from(body))), content_type_for(file))
}

fn text_response(status: StatusCode, text: impl Into<String>) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(text.into())));
    *response.status_mut() = status;
    with_content_type(response, "text/plain; charset=utf-8")
}

fn not_found(path: &str) -> HttpResponse {
    text_response(StatusCode::NOT_FOUND, format!("404 Not Found: {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_file_rejects_traversal() {
        let root = Path::new("/srv/public");
        assert_eq!(
            public_file(root, "/js/JsdClient.js"),
            Some(PathBuf::from("/srv/public/js/JsdClient.js"))
        );
        assert_eq!(public_file(root, "/../secret.txt"), None);
        assert_eq!(public_file(root, "/js/../../etc/passwd"), None);
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type_for(Path::new("a/b.json")), JSON_CONTENT_TYPE);
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn test_error_responses() {
        let resp = not_found("/missing");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = text_response(StatusCode::METHOD_NOT_ALLOWED, "405 Method not allowed.");
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
