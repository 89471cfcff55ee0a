//! JSD - JSON Service Definition engine
//!
//! Loads `.jsd` service definitions and their JSON Schemas, dispatches
//! JSON-RPC 2.0 requests to registered handlers, and drives a client that
//! lazily fetches and caches remote definitions while making calls.

use anyhow::Result;

pub mod cli;
pub mod client;
pub mod config;
pub mod definition;
pub mod handlers;
pub mod jsonrpc;
pub mod schema;
pub mod server;
pub mod service;

pub use client::{AsyncJsdClient, JsdClient};
pub use definition::{Definition, DefinitionRegistry, MethodSpec};
pub use schema::{SchemaCache, SchemaViolation};
pub use server::Dispatcher;
pub use service::{Handler, ServiceEntry};

/// Application-wide error types with context preservation
#[derive(Debug, thiserror::Error)]
pub enum JsdError {
    #[error("Load error: {message}")]
    Load { message: String, file: Option<String> },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        violation: SchemaViolation,
    },

    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    #[error("Handler error: {message}")]
    Handler { message: String },

    #[error("Remote error {code}: {message}")]
    Rpc {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl JsdError {
    /// Create a load error with optional file path
    pub fn load(message: impl Into<String>, file: Option<String>) -> Self {
        Self::Load {
            message: message.into(),
            file,
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a schema validation error
    pub fn validation(message: impl Into<String>, violation: SchemaViolation) -> Self {
        Self::Validation {
            message: message.into(),
            violation,
        }
    }

    /// Create a transport error without response details
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// Create a transport error for a non-200 HTTP response
    pub fn http_status(message: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: Some(status),
            body: Some(body.into()),
        }
    }

    /// Create a handler error
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Get error code for JSON-RPC responses
    pub fn error_code(&self) -> i32 {
        use jsonrpc::error_codes;

        match self {
            JsdError::Protocol { .. } => error_codes::INVALID_REQUEST,
            JsdError::Validation { .. } => error_codes::INVALID_PARAMS,
            JsdError::Serialization { .. } => error_codes::PARSE_ERROR,
            JsdError::Rpc { code, .. } => *code,
            JsdError::Load { .. }
            | JsdError::Transport { .. }
            | JsdError::Handler { .. }
            | JsdError::Configuration { .. }
            | JsdError::Io { .. } => error_codes::INTERNAL_ERROR,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            JsdError::Load { message, file } => {
                if let Some(f) = file {
                    format!("Failed to load '{}': {}", f, message)
                } else {
                    format!("Failed to load definitions: {}", message)
                }
            }
            JsdError::Protocol { message } => message.clone(),
            JsdError::Validation { message, violation } => {
                format!("{} {}", message, violation)
            }
            JsdError::Transport {
                message,
                status,
                body,
            } => match (status, body) {
                (Some(code), Some(body)) => {
                    format!("{} Server responded with status code {}. Content: {}", message, code, body)
                }
                (Some(code), None) => {
                    format!("{} Server responded with status code {}.", message, code)
                }
                _ => message.clone(),
            },
            JsdError::Handler { message } => message.clone(),
            JsdError::Rpc {
                code,
                message,
                data,
            } => {
                let data = data
                    .as_ref()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "null".to_string());
                format!(
                    "Returned object contains error. {{ code: {}, message: '{}', data: {} }}",
                    code, message, data
                )
            }
            JsdError::Configuration { message } => {
                format!("Configuration issue: {}", message)
            }
            JsdError::Io { source } => {
                format!("File system error: {}", source)
            }
            JsdError::Serialization { source } => {
                format!("Data format error: {}", source)
            }
        }
    }
}

/// Convenience type alias for Results
pub type JsdResult<T> = Result<T, JsdError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    fn with_file_context(self, file: &str) -> JsdResult<T>;
    fn with_transport_context(self, url: &str) -> JsdResult<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn with_file_context(self, file: &str) -> JsdResult<T> {
        self.map_err(|e| JsdError::load(format!("{}", e.into()), Some(file.to_string())))
    }

    fn with_transport_context(self, url: &str) -> JsdResult<T> {
        self.map_err(|e| {
            JsdError::transport(format!("Network failure for '{}': {}", url, e.into()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = JsdError::configuration("Invalid config");
        assert_eq!(err.error_code(), -32603);
        assert!(err.user_message().contains("Configuration issue"));
    }

    #[test]
    fn test_load_error_with_file() {
        let err = JsdError::load("Missing schema", Some("jsd/a.jsd".to_string()));
        assert!(err.user_message().contains("jsd/a.jsd"));
    }

    #[test]
    fn test_rpc_error_keeps_remote_code() {
        let err = JsdError::Rpc {
            code: -32601,
            message: "Method not found".to_string(),
            data: Some(serde_json::json!("nope")),
        };
        assert_eq!(err.error_code(), -32601);
        assert!(err.user_message().contains("code: -32601"));
    }

    #[test]
    fn test_result_extension() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));

        let jsd_result = result.with_file_context("jsd/lighting/lightSimple.jsd");

        if let Err(JsdError::Load { file, .. }) = jsd_result {
            assert_eq!(file, Some("jsd/lighting/lightSimple.jsd".to_string()));
        } else {
            panic!("Expected Load error");
        }
    }
}
