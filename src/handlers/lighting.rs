use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::server::Dispatcher;
use crate::service::Handler;
use crate::JsdResult;

/// Endpoint of the sample lighting service
pub const LIGHT_SIMPLE_ENDPOINT: &str = "/lighting/lightSimple";

/// Payload shared by `getLightStatus` and `setLightStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightStatus {
    pub status: bool,
}

/// State of the one simulated light
#[derive(Debug, Default)]
pub struct LightState {
    status: RwLock<bool>,
}

impl LightState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn status(&self) -> bool {
        *self.status.read().await
    }
}

/// Handler for `getLightStatus`
pub struct GetLightStatusHandler {
    state: Arc<LightState>,
}

#[async_trait]
impl Handler for GetLightStatusHandler {
    async fn handle(&self, _argument: Option<Value>, _context: Option<Value>) -> anyhow::Result<Value> {
        let status = self.state.status().await;
        info!("Returning light status {}", status);
        Ok(serde_json::to_value(LightStatus { status })?)
    }
}

/// Handler for `setLightStatus`
pub struct SetLightStatusHandler {
    state: Arc<LightState>,
}

#[async_trait]
impl Handler for SetLightStatusHandler {
    async fn handle(&self, argument: Option<Value>, _context: Option<Value>) -> anyhow::Result<Value> {
        let argument = argument.ok_or_else(|| anyhow::anyhow!("setLightStatus requires a LightStatus argument"))?;
        let requested: LightStatus = serde_json::from_value(argument)?;

        info!("Setting light status to {}", requested.status);
        *self.state.status.write().await = requested.status;
        Ok(Value::Null)
    }
}

/// Bind both lighting handlers to the loaded `lightSimple` service
pub fn register_lighting_handlers(dispatcher: &mut Dispatcher, state: Arc<LightState>) -> JsdResult<()> {
    dispatcher.register_handler(
        LIGHT_SIMPLE_ENDPOINT,
        "getLightStatus",
        Arc::new(GetLightStatusHandler { state: state.clone() }),
    )?;
    dispatcher.register_handler(
        LIGHT_SIMPLE_ENDPOINT,
        "setLightStatus",
        Arc::new(SetLightStatusHandler { state }),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_then_get() {
        let state = Arc::new(LightState::new());
        let get = GetLightStatusHandler { state: state.clone() };
        let set = SetLightStatusHandler { state: state.clone() };

        assert_eq!(get.handle(None, None).await.unwrap(), json!({ "status": false }));
        assert_eq!(set.handle(Some(json!({ "status": true })), None).await.unwrap(), Value::Null);
        assert_eq!(get.handle(None, None).await.unwrap(), json!({ "status": true }));
        assert!(state.status().await);
    }

    #[tokio::test]
    async fn test_set_without_argument_fails() {
        let set = SetLightStatusHandler { state: Arc::new(LightState::new()) };
        assert!(set.handle(None, None).await.is_err());
    }

    #[test]
    fn test_rejects_non_boolean_status() {
        let set = SetLightStatusHandler { state: Arc::new(LightState::new()) };
        let result = tokio_test::block_on(set.handle(Some(json!({ "status": "on" })), None));
        assert!(result.is_err());
    }
}
