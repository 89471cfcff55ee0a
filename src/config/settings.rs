use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};
use tracing::{debug, warn};
use validator::Validate;

/// Settings for `jsd serve` and `jsd call`, loaded from config.toml and
/// the environment. Command line flags are applied on top by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub client: ClientConfig,
    #[validate(nested)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    #[validate(length(min = 1, message = "bind_address cannot be empty"))]
    pub bind_address: String,
    pub jsd_root: PathBuf,
    pub public_html: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClientConfig {
    #[validate(length(min = 1, message = "remote_root cannot be empty"))]
    pub remote_root: String,
    #[validate(range(min = 1, message = "timeout_ms must be at least 1"))]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    #[validate(length(min = 1))]
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            jsd_root: PathBuf::from("jsd"),
            public_html: PathBuf::from("public_html"),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            remote_root: "http://localhost:8080".to_string(),
            timeout_ms: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            client: ClientConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Defaults, then the config file (if present), then `JSD_*` variables
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`Settings::load`] but reading `path` instead of the default location
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut settings = if path.exists() {
            debug!("Loading configuration from {}", path.display());
            Self::from_file(&path)?
        } else {
            debug!("No configuration file at {}, using defaults", path.display());
            Self::default()
        };

        settings.apply_overrides(|name| std::env::var(name).ok());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))
    }

    /// Apply `JSD_*` overrides looked up through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("JSD_BIND_ADDRESS") {
            self.server.bind_address = val;
        }

        if let Some(val) = lookup("JSD_ROOT") {
            self.server.jsd_root = PathBuf::from(val);
        }

        if let Some(val) = lookup("JSD_PUBLIC_HTML") {
            self.server.public_html = PathBuf::from(val);
        }

        if let Some(val) = lookup("JSD_REMOTE_ROOT") {
            self.client.remote_root = val;
        }

        if let Some(val) = lookup("JSD_TIMEOUT_MS") {
            match val.parse() {
                Ok(ms) => self.client.timeout_ms = ms,
                Err(_) => warn!("Ignoring JSD_TIMEOUT_MS={}: not a number", val),
            }
        }

        if let Some(val) = lookup("JSD_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    pub fn config_path() -> PathBuf {
        if let Ok(custom_path) = std::env::var("JSD_CONFIG_PATH") {
            PathBuf::from(custom_path)
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("jsd")
                .join("config.toml")
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.client.timeout_ms)
    }

    pub fn validate_settings(&self) -> Result<()> {
        if let Err(errors) = self.validate() {
            anyhow::bail!("Invalid configuration: {}", errors);
        }

        Ok(())
    }
}
