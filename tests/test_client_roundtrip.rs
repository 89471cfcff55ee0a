mod common;

use jsd::client::{AsyncJsdClient, CallContext, JsdClient};
use jsd::JsdError;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use common::{lighting_dispatcher, Loopback, LOOPBACK_ROOT};

const LIGHT: &str = "/lighting/lightSimple";
const TIMEOUT: Duration = Duration::from_secs(1);

fn blocking_client() -> JsdClient {
    JsdClient::with_transport(LOOPBACK_ROOT, TIMEOUT, Box::new(Loopback::new(lighting_dispatcher())))
}

fn async_client() -> Arc<AsyncJsdClient> {
    Arc::new(AsyncJsdClient::with_transport(
        LOOPBACK_ROOT,
        TIMEOUT,
        Arc::new(Loopback::new(lighting_dispatcher())),
    ))
}

#[test]
fn test_blocking_round_trip() {
    let client = blocking_client();

    let set = client
        .call(LIGHT, "setLightStatus", Some(json!({ "status": true })), true)
        .unwrap();
    assert_eq!(set, Value::Null);

    let get = client.call(LIGHT, "getLightStatus", None, true).unwrap();
    assert_eq!(get, json!({ "status": true }));
}

#[tokio::test]
async fn test_suspending_round_trip() {
    let client = async_client();

    let set = client
        .call(LIGHT, "setLightStatus", Some(json!({ "status": true })), true)
        .await
        .unwrap();
    assert_eq!(set, Value::Null);

    let get = client.call(LIGHT, "getLightStatus", None, true).await.unwrap();
    assert_eq!(get, json!({ "status": true }));
}

#[tokio::test]
async fn test_continuations_report_result() {
    let client = async_client();
    let (tx, rx) = oneshot::channel();

    client
        .spawn_call(
            CallContext::new(LIGHT, "getLightStatus", None, true),
            move |result| {
                let _ = tx.send(Ok(result));
            },
            |error: JsdError| panic!("unexpected failure: {}", error.user_message()),
        )
        .await
        .unwrap();

    let result: Result<Value, String> = rx.await.unwrap();
    assert_eq!(result.unwrap(), json!({ "status": false }));
}

#[tokio::test]
async fn test_both_variants_report_the_same_diagnostics() {
    let cases: Vec<(&str, &str, Option<Value>)> = vec![
        (LIGHT, "toggle", None),
        (LIGHT, "setLightStatus", Some(json!({ "status": 1 }))),
        (LIGHT, "setLightStatus", Some(json!("on"))),
        ("/lighting/missing", "getLightStatus", None),
    ];

    let asynchronous = async_client();
    for (endpoint, method, argument) in cases {
        let blocking_message = {
            let argument = argument.clone();
            let endpoint = endpoint.to_string();
            let method = method.to_string();
            tokio::task::spawn_blocking(move || {
                blocking_client()
                    .call(&endpoint, &method, argument, true)
                    .unwrap_err()
                    .user_message()
            })
            .await
            .unwrap()
        };

        let async_message = asynchronous
            .call(endpoint, method, argument, true)
            .await
            .unwrap_err()
            .user_message();

        assert_eq!(blocking_message, async_message, "{} {}", endpoint, method);
    }
}

#[tokio::test]
async fn test_definitions_load_once_and_are_shared() {
    let client = async_client();
    let first = client.load_definition(LIGHT).await.unwrap();
    let second = client.load_definition(LIGHT).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let schema = client.load_schema("/lighting/LightStatus.json").await.unwrap();
    assert_eq!(schema.document()["required"], json!(["status"]));
}

#[tokio::test]
async fn test_concurrent_calls_complete_independently() {
    let client = async_client();
    let calls: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.call(LIGHT, "getLightStatus", None, true).await })
        })
        .collect();

    for call in calls {
        assert_eq!(call.await.unwrap().unwrap(), json!({ "status": false }));
    }
}
