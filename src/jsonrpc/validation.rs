//! Protocol validation
//!
//! Stateless checks over raw JSON envelopes and loaded definitions. Each
//! check returns the first problem it finds; callers decide which JSON-RPC
//! error code a failing stage maps to.

use serde_json::Value;

use super::JSONRPC_VERSION;
use crate::definition::{Definition, MethodSpec};
use crate::schema::SchemaCache;
use crate::{JsdError, JsdResult};

fn is_blank_string(value: &Value) -> bool {
    value.as_str().map(|s| s.trim().is_empty()).unwrap_or(false)
}

fn check_id(obj: &serde_json::Map<String, Value>, what: &str) -> JsdResult<()> {
    match obj.get("id") {
        None | Some(Value::Null) => Err(JsdError::protocol(format!(
            "Missing or blank id attribute in {}.",
            what
        ))),
        Some(id) if is_blank_string(id) => Err(JsdError::protocol(format!(
            "Missing or blank id attribute in {}.",
            what
        ))),
        Some(_) => Ok(()),
    }
}

fn check_version(obj: &serde_json::Map<String, Value>, what: &str) -> JsdResult<()> {
    match obj.get("jsonrpc") {
        None => Err(JsdError::protocol(format!(
            "Missing jsonrpc attribute in {}.",
            what
        ))),
        Some(Value::String(v)) if v == JSONRPC_VERSION => Ok(()),
        Some(_) => Err(JsdError::protocol("Only JSON-RPC version 2.0 supported.")),
    }
}

/// Check the request envelope: id, `jsonrpc: "2.0"` and a non-blank method
pub fn validate_request_envelope(request: &Value) -> JsdResult<()> {
    let obj = request
        .as_object()
        .ok_or_else(|| JsdError::protocol("JSON-RPC request is expected to be an object."))?;

    check_id(obj, "request")?;
    check_version(obj, "request")?;

    match obj.get("method") {
        None => Err(JsdError::protocol("Missing method attribute in request.")),
        Some(Value::String(m)) if m.trim().is_empty() => Err(JsdError::protocol(
            "JSON-RPC attribute method cannot be a blank string.",
        )),
        Some(Value::String(_)) => Ok(()),
        Some(_) => Err(JsdError::protocol(
            "JSON-RPC attribute method is expected to be a string.",
        )),
    }
}

/// Look up a declared method
pub fn validate_method_exists<'a>(definition: &'a Definition, method: &str) -> JsdResult<&'a MethodSpec> {
    definition.method(method).ok_or_else(|| {
        JsdError::protocol(format!(
            "Method '{}' not found in service definition.",
            method
        ))
    })
}

/// Check the request's `params` against the method declaration and return
/// the single argument, if one was supplied. When an argument is present
/// it is validated against the parameter schema, which must already be in
/// `schemas`.
pub fn validate_argument_shape(
    definition: &Definition,
    method: &str,
    request: &Value,
    schemas: &SchemaCache,
) -> JsdResult<Option<Value>> {
    let method_spec = validate_method_exists(definition, method)?;

    let params = match request.get("params") {
        None => None,
        Some(Value::Array(items)) if items.len() <= 1 => Some(items),
        Some(_) => {
            return Err(JsdError::protocol(
                "JSON-RPC attribute params is expected to be an array with 1 object.",
            ))
        }
    };
    let argument = params.and_then(|items| items.first()).cloned();

    match (&method_spec.param, &argument) {
        (Some(_), None) => Err(JsdError::protocol(format!(
            "Method '{}' expects a parameter but none provided.",
            method
        ))),
        (None, Some(_)) => Err(JsdError::protocol(format!(
            "Method '{}' expects no parameters but one was provided.",
            method
        ))),
        (None, None) => Ok(None),
        (Some(_), Some(arg)) => {
            let reference = argument_schema_ref(definition, method)?
                .ok_or_else(|| JsdError::protocol(format!("Method '{}' has no parameter type.", method)))?;
            validate_against_schema(schemas, reference, arg, "param")?;
            Ok(argument)
        }
    }
}

/// Check the response envelope: id, `jsonrpc: "2.0"` and exactly one of
/// `result` / `error`
pub fn validate_response_envelope(response: &Value) -> JsdResult<()> {
    let obj = response
        .as_object()
        .ok_or_else(|| JsdError::protocol("JSON-RPC response is expected to be an object."))?;

    check_id(obj, "response")?;
    check_version(obj, "response")?;

    match (obj.contains_key("result"), obj.contains_key("error")) {
        (true, true) => Err(JsdError::protocol(
            "JSON-RPC object should have result or error but not both.",
        )),
        (false, false) => Err(JsdError::protocol(
            "JSON-RPC object should have either result or error.",
        )),
        _ => Ok(()),
    }
}

/// Schema reference for a method's parameter type, `None` when the method
/// takes no argument
pub fn argument_schema_ref<'a>(definition: &'a Definition, method: &str) -> JsdResult<Option<&'a str>> {
    let method_spec = validate_method_exists(definition, method)?;
    type_schema_ref(definition, method_spec.param.as_deref())
}

/// Check a result against the declared result contract and return the
/// schema reference it still has to be validated against, if any.
pub fn result_schema_ref<'a>(
    definition: &'a Definition,
    method: &str,
    result: Option<&Value>,
) -> JsdResult<Option<&'a str>> {
    let method_spec = validate_method_exists(definition, method)?;
    let result = result.filter(|v| !v.is_null());

    match (&method_spec.result, result) {
        (Some(type_name), None) => Err(JsdError::protocol(format!(
            "Result is missing or null but definition expects return object of type '{}'.",
            type_name
        ))),
        (None, Some(actual)) => Err(JsdError::protocol(format!(
            "Schema definition expects result to be missing or null but found this: {}",
            actual
        ))),
        (None, None) => Ok(None),
        (Some(_), Some(_)) => type_schema_ref(definition, method_spec.result.as_deref()),
    }
}

/// Full result check against schemas that are already loaded
pub fn validate_result(
    definition: &Definition,
    method: &str,
    result: Option<&Value>,
    schemas: &SchemaCache,
) -> JsdResult<()> {
    if let Some(reference) = result_schema_ref(definition, method, result)? {
        if let Some(instance) = result {
            validate_against_schema(schemas, reference, instance, "result")?;
        }
    }
    Ok(())
}

/// Validate `instance` against the cached schema `reference`. `role` names
/// what is being validated ("param" or "result") in the error message.
pub fn validate_against_schema(
    schemas: &SchemaCache,
    reference: &str,
    instance: &Value,
    role: &str,
) -> JsdResult<()> {
    schemas.validate(instance, reference)?.map_err(|violation| {
        JsdError::validation(format!("Schema validation error on {}.", role), violation)
    })
}

fn type_schema_ref<'a>(definition: &'a Definition, type_name: Option<&str>) -> JsdResult<Option<&'a str>> {
    match type_name {
        None => Ok(None),
        Some(name) => definition.schema_ref(name).map(Some).ok_or_else(|| {
            JsdError::protocol(format!("Type '{}' is not declared in definition types.", name))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition() -> Definition {
        Definition::from_document(&json!({
            "name": "lightSimple",
            "title": "Simple Light",
            "description": "Turns a light on and off.",
            "types": { "LightStatus": "/lighting/LightStatus.json" },
            "methods": {
                "getLightStatus": {
                    "title": "Get", "description": "Get status.",
                    "param": null, "result": "LightStatus"
                },
                "setLightStatus": {
                    "title": "Set", "description": "Set status.",
                    "param": "LightStatus", "result": null
                }
            }
        }))
        .unwrap()
    }

    fn schemas() -> SchemaCache {
        let cache = SchemaCache::new();
        cache
            .add_schema(
                "/lighting/LightStatus.json",
                json!({
                    "type": "object",
                    "properties": { "status": { "type": "boolean" } },
                    "required": ["status"]
                }),
            )
            .unwrap();
        cache
    }

    #[test]
    fn test_request_envelope() {
        assert!(validate_request_envelope(&json!({"id": 1, "jsonrpc": "2.0", "method": "m"})).is_ok());
        assert!(validate_request_envelope(&json!({"id": "a", "jsonrpc": "2.0", "method": "m"})).is_ok());

        assert!(validate_request_envelope(&json!({"jsonrpc": "2.0", "method": "m"})).is_err());
        assert!(validate_request_envelope(&json!({"id": " ", "jsonrpc": "2.0", "method": "m"})).is_err());
        assert!(validate_request_envelope(&json!({"id": 1, "method": "m"})).is_err());
        assert!(validate_request_envelope(&json!({"id": 1, "jsonrpc": "1.0", "method": "m"})).is_err());
        assert!(validate_request_envelope(&json!({"id": 1, "jsonrpc": "2.0", "method": ""})).is_err());
        assert!(validate_request_envelope(&json!({"id": 1, "jsonrpc": "2.0"})).is_err());
        assert!(validate_request_envelope(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_argument_required_and_forbidden() {
        let def = definition();
        let cache = schemas();

        let missing = json!({"id": 1, "jsonrpc": "2.0", "method": "setLightStatus"});
        assert!(validate_argument_shape(&def, "setLightStatus", &missing, &cache).is_err());

        let extra = json!({"id": 1, "jsonrpc": "2.0", "method": "getLightStatus", "params": [{}]});
        assert!(validate_argument_shape(&def, "getLightStatus", &extra, &cache).is_err());

        let empty = json!({"id": 1, "jsonrpc": "2.0", "method": "getLightStatus", "params": []});
        assert_eq!(validate_argument_shape(&def, "getLightStatus", &empty, &cache).unwrap(), None);

        let two = json!({"id": 1, "jsonrpc": "2.0", "method": "setLightStatus", "params": [{}, {}]});
        assert!(validate_argument_shape(&def, "setLightStatus", &two, &cache).is_err());
    }

    #[test]
    fn test_argument_schema_violation() {
        let def = definition();
        let cache = schemas();
        let req = json!({"id": 1, "jsonrpc": "2.0", "method": "setLightStatus", "params": [{"status": 3}]});

        match validate_argument_shape(&def, "setLightStatus", &req, &cache) {
            Err(JsdError::Validation { violation, .. }) => assert_eq!(violation.data_path, "/status"),
            other => panic!("Expected validation error, got {:?}", other),
        }

        let ok = json!({"id": 1, "jsonrpc": "2.0", "method": "setLightStatus", "params": [{"status": true}]});
        assert_eq!(
            validate_argument_shape(&def, "setLightStatus", &ok, &cache).unwrap(),
            Some(json!({"status": true}))
        );
    }

    #[test]
    fn test_response_envelope() {
        assert!(validate_response_envelope(&json!({"id": 1, "jsonrpc": "2.0", "result": null})).is_ok());
        assert!(validate_response_envelope(
            &json!({"id": 1, "jsonrpc": "2.0", "error": {"code": 1, "message": "x"}})
        )
        .is_ok());
        assert!(validate_response_envelope(
            &json!({"id": 1, "jsonrpc": "2.0", "result": 1, "error": {"code": 1, "message": "x"}})
        )
        .is_err());
        assert!(validate_response_envelope(&json!({"id": 1, "jsonrpc": "2.0"})).is_err());
        assert!(validate_response_envelope(&json!({"jsonrpc": "2.0", "result": 1})).is_err());
    }

    #[test]
    fn test_result_contract() {
        let def = definition();
        let cache = schemas();

        assert!(validate_result(&def, "setLightStatus", None, &cache).is_ok());
        assert!(validate_result(&def, "setLightStatus", Some(&Value::Null), &cache).is_ok());
        assert!(validate_result(&def, "setLightStatus", Some(&json!({"status": true})), &cache).is_err());

        assert!(validate_result(&def, "getLightStatus", Some(&json!({"status": true})), &cache).is_ok());
        assert!(validate_result(&def, "getLightStatus", Some(&Value::Null), &cache).is_err());
        assert!(matches!(
            validate_result(&def, "getLightStatus", Some(&json!({"status": "on"})), &cache),
            Err(JsdError::Validation { .. })
        ));
    }

    #[test]
    fn test_schema_refs() {
        let def = definition();
        assert_eq!(
            argument_schema_ref(&def, "setLightStatus").unwrap(),
            Some("/lighting/LightStatus.json")
        );
        assert_eq!(argument_schema_ref(&def, "getLightStatus").unwrap(), None);
        assert!(argument_schema_ref(&def, "nope").is_err());
    }
}
