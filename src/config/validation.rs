//! Configuration validation for the JSD server and client

use anyhow::Result;
use std::net::SocketAddr;
use tracing::{info, warn, error};
use crate::config::settings::{ClientConfig, LoggingConfig, ServerConfig, Settings};

/// Comprehensive configuration validator
pub struct ConfigurationValidator {
    /// Whether to perform strict validation (fails on warnings)
    strict_mode: bool,
    /// Whether the server directories must exist
    check_server_paths: bool,
    /// List of validation warnings
    warnings: Vec<String>,
    /// List of validation errors
    errors: Vec<String>,
}

impl ConfigurationValidator {
    pub fn new(strict_mode: bool) -> Self {
        Self {
            strict_mode,
            check_server_paths: false,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Also require the definition root to exist, as `jsd serve` does
    pub fn for_server(mut self) -> Self {
        self.check_server_paths = true;
        self
    }

    /// Validate complete configuration
    pub fn validate_settings(&mut self, settings: &Settings) -> Result<()> {
        info!("Starting configuration validation");

        if let Err(errors) = validator::Validate::validate(settings) {
            self.errors.push(errors.to_string());
        }

        self.validate_server_config(&settings.server);
        self.validate_client_config(&settings.client);
        self.validate_logging_config(&settings.logging);

        self.print_validation_summary();

        if !self.errors.is_empty() {
            return Err(anyhow::anyhow!(
                "Configuration validation failed with {} errors",
                self.errors.len()
            ));
        }

        if self.strict_mode && !self.warnings.is_empty() {
            return Err(anyhow::anyhow!(
                "Configuration validation failed in strict mode with {} warnings",
                self.warnings.len()
            ));
        }

        info!("Configuration validation passed");
        Ok(())
    }

    fn validate_server_config(&mut self, server_config: &ServerConfig) {
        if server_config.bind_address.parse::<SocketAddr>().is_err() {
            self.errors.push(format!(
                "Invalid bind_address: {}. Expected host:port, e.g. 0.0.0.0:8080",
                server_config.bind_address
            ));
        }

        if self.check_server_paths {
            if !server_config.jsd_root.is_dir() {
                self.errors.push(format!(
                    "Definition root does not exist: {}",
                    server_config.jsd_root.display()
                ));
            }
            if !server_config.public_html.is_dir() {
                self.warnings.push(format!(
                    "Public directory does not exist: {}. Only definitions and schemas will be served",
                    server_config.public_html.display()
                ));
            }
        }
    }

    fn validate_client_config(&mut self, client_config: &ClientConfig) {
        let root = client_config.remote_root.as_str();
        if !(root.starts_with("http://") || root.starts_with("https://")) {
            self.errors.push(format!(
                "Invalid remote_root: {}. Must start with http:// or https://",
                root
            ));
        }

        if client_config.timeout_ms == 0 {
            self.errors.push("timeout_ms must be greater than 0".to_string());
        } else if client_config.timeout_ms > 60_000 {
            self.warnings.push(format!(
                "timeout_ms is very long ({}ms). Stalled calls will hang for a long time",
                client_config.timeout_ms
            ));
        }
    }

    fn validate_logging_config(&mut self, logging_config: &LoggingConfig) {
        match logging_config.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {},
            other => {
                self.warnings.push(format!("Non-standard log level: {}. Recommended: trace, debug, info, warn, error", other));
            }
        }
    }

    fn print_validation_summary(&self) {
        if !self.warnings.is_empty() {
            warn!("Configuration warnings ({}):", self.warnings.len());
            for (i, warning) in self.warnings.iter().enumerate() {
                warn!("  {}: {}", i + 1, warning);
            }
        }

        if !self.errors.is_empty() {
            error!("Configuration errors ({}):", self.errors.len());
            for (i, error) in self.errors.iter().enumerate() {
                error!("  {}: {}", i + 1, error);
            }
        }

        if self.warnings.is_empty() && self.errors.is_empty() {
            info!("Configuration validation completed successfully with no issues");
        } else {
            info!(
                "Configuration validation completed with {} warnings and {} errors",
                self.warnings.len(),
                self.errors.len()
            );
        }
    }

    /// Get validation warnings
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Get validation errors
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Quick validation function for use in main application
pub fn validate_configuration(settings: &Settings, strict: bool) -> Result<()> {
    let mut validator = ConfigurationValidator::new(strict);
    validator.validate_settings(settings)
}
