//! JSON Service Definition (JSD) documents
//!
//! A definition names a service, maps type names to schema references and
//! declares the methods the service offers. Syntax is checked on the raw
//! JSON document before it is turned into a typed [`Definition`], so the
//! same rules apply to definitions read from disk and fetched remotely.

pub mod registry;
pub mod source;

pub use registry::DefinitionRegistry;
pub use source::{DocumentSource, LocalFileSystem};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::schema::SCHEMA_SUFFIX;
use crate::{JsdError, JsdResult};

/// File suffix identifying service definition documents
pub const JSD_SUFFIX: &str = ".jsd";

/// A validated service definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    pub title: String,
    pub description: String,
    /// Type name to schema reference
    #[serde(default)]
    pub types: BTreeMap<String, String>,
    #[serde(default)]
    pub methods: BTreeMap<String, MethodSpec>,
}

/// A single method declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub title: String,
    pub description: String,
    /// Parameter type name, `None` when the method takes no argument
    pub param: Option<String>,
    /// Result type name, `None` when the method returns nothing
    pub result: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Definition {
    /// Validate the syntax of a raw definition document and convert it
    pub fn from_document(document: &Value) -> JsdResult<Self> {
        validate_jsd_syntax(document).map_err(|message| JsdError::load(message, None))?;
        Ok(serde_json::from_value(document.clone())?)
    }

    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.get(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Resolve a type name to its schema reference
    pub fn schema_ref(&self, type_name: &str) -> Option<&str> {
        self.types.get(type_name).map(String::as_str)
    }
}

/// Check whether a path names a service definition (case-insensitive)
pub fn is_definition_path(path: &str) -> bool {
    path.to_lowercase().ends_with(JSD_SUFFIX)
}

fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Checks that a method's `param`/`result` attribute is present and is
/// either null or a non-blank string.
fn nullable_type_ref(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Null) => true,
        Some(Value::String(s)) => !s.trim().is_empty(),
        _ => false,
    }
}

/// Validate a definition document's syntax. The error names the offending
/// field path.
pub fn validate_jsd_syntax(document: &Value) -> Result<(), String> {
    let obj = document
        .as_object()
        .ok_or_else(|| "JSD definition is expected to be an object.".to_string())?;

    for field in ["name", "title", "description"] {
        if non_blank_str(obj.get(field)).is_none() {
            return Err(format!(
                "JSD definition {} attribute is missing, not a string or blank.",
                field
            ));
        }
    }

    if let Some(types) = obj.get("types") {
        let types = types
            .as_object()
            .ok_or_else(|| "JSD definition types is expected to be an object.".to_string())?;

        for (key, value) in types {
            let valid = value
                .as_str()
                .map(|s| s.to_lowercase().ends_with(SCHEMA_SUFFIX))
                .unwrap_or(false);
            if !valid {
                return Err(format!(
                    "JSD definition type attribute '{}' should be a string ending in {}.",
                    key, SCHEMA_SUFFIX
                ));
            }
        }
    }

    if let Some(methods) = obj.get("methods") {
        let methods = methods
            .as_object()
            .ok_or_else(|| "JSD definition methods is expected to be an object.".to_string())?;

        for (name, props) in methods {
            let props = props.as_object().ok_or_else(|| {
                format!("JSD definition methods.{} is expected to be an object.", name)
            })?;

            for field in ["title", "description"] {
                if non_blank_str(props.get(field)).is_none() {
                    return Err(format!(
                        "JSD definition methods.{}.{} attribute is missing, not a string or is blank.",
                        name, field
                    ));
                }
            }

            for field in ["param", "result"] {
                if !nullable_type_ref(props.get(field)) {
                    return Err(format!(
                        "JSD definition methods.{}.{} attribute is missing, not a string/null or is blank.",
                        name, field
                    ));
                }
            }

            if let Some(errors) = props.get("errors") {
                let errors = errors.as_array().ok_or_else(|| {
                    format!("JSD definition methods.{}.errors is expected to be an array.", name)
                })?;

                for (i, err) in errors.iter().enumerate() {
                    if non_blank_str(Some(err)).is_none() {
                        return Err(format!(
                            "JSD definition methods.{}.errors[{}] attribute is not a string or is blank.",
                            name, i
                        ));
                    }
                }
            }
        }
    }

    Ok(())
}
