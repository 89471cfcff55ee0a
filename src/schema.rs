//! Schema cache
//!
//! Holds parsed JSON Schema documents keyed by their reference path
//! (for example `/lighting/LightStatus.json`). Each schema is compiled once
//! when inserted; entries are never replaced or evicted. A `$ref` naming
//! another schema by its logical path resolves against the documents the
//! schema is compiled with.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{JsdError, JsdResult};

/// File suffix identifying JSON Schema documents
pub const SCHEMA_SUFFIX: &str = ".json";

/// Details of the first schema violation reported by the validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaViolation {
    pub message: String,
    pub data_path: String,
    pub schema_path: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ message: '{}', dataPath: '{}', schemaPath: '{}' }}",
            self.message, self.data_path, self.schema_path
        )
    }
}

/// A cached schema: the original document plus its compiled validator
pub struct Schema {
    document: Value,
    validator: jsonschema::Validator,
}

impl Schema {
    /// Compile a schema document, resolving `$ref`s against `documents`
    pub fn compile(reference: &str, document: Value, documents: &SchemaDocuments) -> JsdResult<Self> {
        let validator = jsonschema::options()
            .with_retriever(documents.clone())
            .build(&document)
            .map_err(|e| {
                JsdError::load(
                    format!("Invalid JSON schema: {}", e),
                    Some(reference.to_string()),
                )
            })?;

        Ok(Self {
            document,
            validator,
        })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Validate an instance, returning the first violation if any
    pub fn validate(&self, instance: &Value) -> Result<(), SchemaViolation> {
        match self.validator.iter_errors(instance).next() {
            None => Ok(()),
            Some(error) => Err(SchemaViolation {
                message: error.to_string(),
                data_path: error.instance_path.to_string(),
                schema_path: error.schema_path.to_string(),
            }),
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

/// Raw schema documents that `$ref`s may point at, keyed by logical path
#[derive(Debug, Clone, Default)]
pub struct SchemaDocuments {
    documents: HashMap<String, Value>,
}

impl SchemaDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, document: Value) {
        self.documents.insert(reference.into(), document);
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.documents.contains_key(reference)
    }

    /// Schemas referenced by `document` that are not in this set
    pub fn missing_references(&self, document: &Value) -> Vec<String> {
        referenced_schemas(document)
            .into_iter()
            .filter(|reference| !self.contains(reference))
            .collect()
    }
}

impl jsonschema::Retrieve for SchemaDocuments {
    fn retrieve(
        &self,
        uri: &jsonschema::Uri<String>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let reference = uri.path().as_str();
        match self.documents.get(reference) {
            Some(document) => Ok(document.clone()),
            None => Err(format!("Schema '{}' is not loaded.", reference).into()),
        }
    }
}

/// Logical paths of the other schemas a document `$ref`s, fragments
/// removed. Local references (`#/definitions/..`) are not included.
pub fn referenced_schemas(document: &Value) -> Vec<String> {
    fn collect(value: &Value, found: &mut BTreeSet<String>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    match (key.as_str(), child) {
                        ("$ref", Value::String(target)) => {
                            let path = target.split('#').next().unwrap_or_default();
                            if path.starts_with('/') {
                                found.insert(path.to_string());
                            }
                        }
                        _ => collect(child, found),
                    }
                }
            }
            Value::Array(items) => items.iter().for_each(|item| collect(item, found)),
            _ => {}
        }
    }

    let mut found = BTreeSet::new();
    collect(document, &mut found);
    found.into_iter().collect()
}

/// Parse the text of a schema document
pub fn parse_schema_text(reference: &str, text: &str) -> JsdResult<Value> {
    serde_json::from_str(text).map_err(|e| {
        JsdError::load(
            format!("JSON parse exception in file '{}'. {}", reference, e),
            Some(reference.to_string()),
        )
    })
}

/// Insert-if-absent cache of compiled schemas
#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and insert a schema whose `$ref`s resolve against the
    /// schemas already cached. An existing entry for the same reference is
    /// kept and returned unchanged.
    pub fn add_schema(&self, reference: &str, document: Value) -> JsdResult<Arc<Schema>> {
        let mut documents = self.documents();
        documents.insert(reference, document.clone());
        self.add_schema_with(reference, document, &documents)
    }

    /// Compile and insert a schema whose `$ref`s resolve against `documents`
    pub fn add_schema_with(
        &self,
        reference: &str,
        document: Value,
        documents: &SchemaDocuments,
    ) -> JsdResult<Arc<Schema>> {
        if let Some(existing) = self.get_schema(reference) {
            debug!("Schema '{}' already cached", reference);
            return Ok(existing);
        }

        let compiled = Arc::new(Schema::compile(reference, document, documents)?);
        let mut schemas = self.schemas.write();
        let entry = schemas
            .entry(reference.to_string())
            .or_insert_with(|| compiled.clone())
            .clone();
        drop(schemas);

        info!("Added schema '{}'", reference);
        Ok(entry)
    }

    /// Parse a schema document from text and insert it
    pub fn add_schema_text(&self, reference: &str, text: &str) -> JsdResult<Arc<Schema>> {
        let document = parse_schema_text(reference, text)?;
        self.add_schema(reference, document)
    }

    /// Snapshot of every cached schema document
    pub fn documents(&self) -> SchemaDocuments {
        let schemas = self.schemas.read();
        let mut documents = SchemaDocuments::new();
        for (reference, schema) in schemas.iter() {
            documents.insert(reference.clone(), schema.document.clone());
        }
        documents
    }

    pub fn get_schema(&self, reference: &str) -> Option<Arc<Schema>> {
        self.schemas.read().get(reference).cloned()
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.schemas.read().contains_key(reference)
    }

    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }

    /// Sorted list of cached schema references
    pub fn references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self.schemas.read().keys().cloned().collect();
        refs.sort();
        refs
    }

    /// Validate an instance against a cached schema
    pub fn validate(&self, instance: &Value, reference: &str) -> JsdResult<Result<(), SchemaViolation>> {
        let schema = self.get_schema(reference).ok_or_else(|| {
            JsdError::protocol(format!("Schema '{}' is not loaded.", reference))
        })?;
        Ok(schema.validate(instance))
    }

    /// Move every entry of `other` into this cache (insert-if-absent)
    pub(crate) fn absorb(&self, other: SchemaCache) {
        let incoming = other.schemas.into_inner();
        let mut schemas = self.schemas.write();
        for (reference, schema) in incoming {
            schemas.entry(reference).or_insert(schema);
        }
    }
}

/// Check whether a path names a schema document (case-insensitive)
pub fn is_schema_path(path: &str) -> bool {
    path.to_lowercase().ends_with(SCHEMA_SUFFIX)
}
