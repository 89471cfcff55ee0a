//! CLI utility functions.

use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

use crate::config::Settings;

/// Load a call argument from file or inline JSON. No source means the
/// call is made without an argument.
pub fn load_call_argument(
    arg_file: Option<PathBuf>,
    arg_json: Option<String>,
) -> Result<Option<Value>> {
    match (arg_file, arg_json) {
        (Some(path), None) => {
            if !path.exists() {
                anyhow::bail!("Argument file not found: {}", path.display());
            }
            let content = std::fs::read_to_string(&path)?;
            let argument: Value = serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse JSON from {}: {}", path.display(), e))?;
            Ok(Some(argument))
        }
        (None, Some(json_str)) => {
            let argument: Value = serde_json::from_str(&json_str)
                .map_err(|e| anyhow::anyhow!("Failed to parse inline JSON: {}", e))?;
            Ok(Some(argument))
        }
        (None, None) => Ok(None),
        (Some(_), Some(_)) => {
            anyhow::bail!("Cannot use both --arg-file and --arg-json");
        }
    }
}

/// Load settings with hierarchy (env > file > defaults); CLI flags are
/// applied by each command
pub fn load_settings(config_path: Option<PathBuf>) -> Result<Settings> {
    let settings = match config_path {
        Some(path) => {
            info!("Using custom config file: {}", path.display());
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Settings::load_from(Some(&path))?
        }
        None => Settings::load()?,
    };

    settings.validate_settings()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_load_call_argument_sources() {
        assert_eq!(load_call_argument(None, None).unwrap(), None);
        assert_eq!(
            load_call_argument(None, Some(r#"{"status":true}"#.to_string())).unwrap(),
            Some(json!({"status": true}))
        );
        assert!(load_call_argument(None, Some("{".to_string())).is_err());

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("arg.json");
        std::fs::write(&path, r#"{"status":false}"#).unwrap();
        assert_eq!(
            load_call_argument(Some(path.clone()), None).unwrap(),
            Some(json!({"status": false}))
        );
        assert!(load_call_argument(Some(path), Some("{}".to_string())).is_err());
        assert!(load_call_argument(Some(dir.path().join("missing.json")), None).is_err());
    }

    #[test]
    fn test_load_settings_requires_existing_file() {
        let dir = TempDir::new().unwrap();
        assert!(load_settings(Some(dir.path().join("nope.toml"))).is_err());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nbind_address = \"127.0.0.1:9000\"\n").unwrap();
        let settings = load_settings(Some(path)).unwrap();
        assert_eq!(settings.server.bind_address, "127.0.0.1:9000");
    }
}
