//! CLI command implementations.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::client::AsyncJsdClient;
use crate::config::validation::{validate_configuration, ConfigurationValidator};
use crate::config::Settings;
use crate::definition::LocalFileSystem;
use crate::handlers::{register_lighting_handlers, LightState, LIGHT_SIMPLE_ENDPOINT};
use crate::server::{Dispatcher, JsdHttpServer};

use super::utils::{load_call_argument, load_settings};

/// Inputs of `jsd call`
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub endpoint: String,
    pub method: String,
    pub arg_json: Option<String>,
    pub arg_file: Option<PathBuf>,
    pub remote_root: Option<String>,
    pub timeout_ms: Option<u64>,
    pub validate_result: bool,
}

/// Load the definition tree and serve it over HTTP
pub async fn serve(
    bind: Option<String>,
    root: Option<PathBuf>,
    public: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    info!("Loading configuration...");
    let mut settings = load_settings(config_path)?;
    if let Some(bind) = bind {
        settings.server.bind_address = bind;
    }
    if let Some(root) = root {
        settings.server.jsd_root = root;
    }
    if let Some(public) = public {
        settings.server.public_html = public;
    }

    ConfigurationValidator::new(false)
        .for_server()
        .validate_settings(&settings)?;

    let addr: SocketAddr = settings
        .server
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", settings.server.bind_address))?;

    let mut dispatcher = Dispatcher::load(&LocalFileSystem, &settings.server.jsd_root)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if dispatcher.registry().has_service(LIGHT_SIMPLE_ENDPOINT) {
        register_lighting_handlers(&mut dispatcher, Arc::new(LightState::new()))
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    }

    for endpoint in dispatcher.registry().endpoints() {
        info!("Serving {}", endpoint);
    }

    let server = JsdHttpServer::new(Arc::new(dispatcher), settings.server.public_html.clone());
    server
        .run(addr)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    info!("JSD server stopped");
    Ok(())
}

/// Load and cross-check a definition tree, printing what was found
pub async fn check(root: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let root = match root {
        Some(root) => root,
        None => load_settings(config_path)?.server.jsd_root,
    };

    let dispatcher = match Dispatcher::load(&LocalFileSystem, &root) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!("Definition check failed: {}", e.user_message());
            anyhow::bail!("{}", e.user_message());
        }
    };

    let registry = dispatcher.registry();
    println!("✓ Definitions in {} are valid", root.display());
    println!("  Services ({}):", registry.endpoints().len());
    for endpoint in registry.endpoints() {
        let methods = registry
            .service(&endpoint)
            .map(|entry| entry.definition().methods.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        println!("    {} [{}]", endpoint, methods.join(", "));
    }
    println!("  Schemas ({}):", registry.schemas().len());
    for reference in registry.schemas().references() {
        println!("    {}", reference);
    }

    Ok(())
}

/// Call a remote method and print its result
pub async fn call(options: CallOptions, config_path: Option<PathBuf>) -> Result<()> {
    let mut settings = load_settings(config_path)?;
    if let Some(remote_root) = options.remote_root {
        settings.client.remote_root = remote_root;
    }
    if let Some(timeout_ms) = options.timeout_ms {
        if timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be greater than 0");
        }
        settings.client.timeout_ms = timeout_ms;
    }

    let argument = load_call_argument(options.arg_file, options.arg_json)?;

    info!(
        "Calling {}#{} on {}",
        options.endpoint, options.method, settings.client.remote_root
    );

    let client = AsyncJsdClient::new(
        settings.client.remote_root.clone(),
        Duration::from_millis(settings.client.timeout_ms),
    );
    let result = client
        .call(
            &options.endpoint,
            &options.method,
            argument,
            options.validate_result,
        )
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let output = serde_json::to_string_pretty(&result)?;
    println!("{}", output);

    Ok(())
}

/// Initialize default configuration
pub async fn init(force: bool, config_path: Option<PathBuf>) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Settings::config_path);

    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    Settings::default().save(&config_path)?;

    println!("✓ Configuration initialized at {:?}", config_path);
    Ok(())
}

/// Manage configuration (show, validate)
pub async fn config_command(show: bool, validate: bool, config_path: Option<PathBuf>) -> Result<()> {
    if !show && !validate {
        warn!("Nothing to do. Use --show or --validate.");
    }

    if show {
        let settings = Settings::load_from(config_path.as_deref())?;
        println!("{}", settings.to_toml()?);
    }

    if validate {
        match Settings::load_from(config_path.as_deref()) {
            Ok(settings) => match validate_configuration(&settings, false) {
                Ok(()) => println!("✓ Configuration is valid"),
                Err(e) => error!("Configuration validation failed: {}", e),
            },
            Err(e) => error!("Failed to load configuration: {}", e),
        }
    }

    Ok(())
}

/// Show version information
pub async fn version() -> Result<()> {
    println!("JSD {}", env!("CARGO_PKG_VERSION"));
    println!("Built with Rust {}", rustc_version::version()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        init(false, Some(path.clone())).await.unwrap();
        assert!(path.exists());
        assert!(init(false, Some(path.clone())).await.is_err());
        assert!(init(true, Some(path)).await.is_ok());
    }

    #[tokio::test]
    async fn test_config_validate_reads_given_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[client]\nremote_root = \"ftp://nowhere\"\n").unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        assert!(validate_configuration(&settings, false).is_err());
        assert!(config_command(true, true, Some(path)).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_shipped_definitions() {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("jsd");
        assert!(check(Some(root), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        assert!(check(Some(dir.path().join("missing")), None).await.is_err());
    }
}
