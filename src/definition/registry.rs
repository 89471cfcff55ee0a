//! Definition registry
//!
//! Walks a document tree, registering every `.jsd` file as a service entry
//! and every `.json` file as a schema, then cross-checks that all type
//! references resolve. A load either succeeds completely or leaves the
//! registry exactly as it was.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::source::DocumentSource;
use super::{is_definition_path, Definition, JSD_SUFFIX};
use crate::schema::{is_schema_path, parse_schema_text, SchemaCache};
use crate::service::{Handler, ServiceEntry};
use crate::{JsdError, JsdResult};

/// Services and schemas loaded for one engine instance
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    services: HashMap<String, ServiceEntry>,
    schemas: SchemaCache,
}

/// Documents collected during a single load, before they are committed
#[derive(Default)]
struct Staging {
    services: HashMap<String, ServiceEntry>,
    /// Parsed schema documents as (logical path, file, document)
    schema_documents: Vec<(String, String, Value)>,
    schemas: SchemaCache,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every definition and schema below `root`.
    ///
    /// Keys are logical paths relative to `root` with a leading `/`;
    /// service keys drop the `.jsd` suffix, schema keys keep `.json`.
    pub fn load(&mut self, source: &dyn DocumentSource, root: impl AsRef<Path>) -> JsdResult<()> {
        let root = root.as_ref();
        info!("Loading definitions from {}", root.display());

        let mut staged = Staging::default();
        Self::load_path(source, root, "", &mut staged)?;

        self.compile_staged_schemas(&staged)?;
        self.validate_staged_references(&staged)?;

        let service_count = staged.services.len();
        let schema_count = staged.schemas.len();
        for (endpoint, entry) in staged.services {
            if self.services.contains_key(&endpoint) {
                warn!("Service '{}' already loaded, keeping existing entry", endpoint);
                continue;
            }
            self.services.insert(endpoint, entry);
        }
        self.schemas.absorb(staged.schemas);

        info!(
            "Loaded {} services and {} schemas from {}",
            service_count,
            schema_count,
            root.display()
        );
        Ok(())
    }

    fn load_path(
        source: &dyn DocumentSource,
        root: &Path,
        logical: &str,
        staged: &mut Staging,
    ) -> JsdResult<()> {
        let dir = physical_path(root, logical);
        let entries = source
            .list_entries(&dir)
            .map_err(|e| JsdError::load(e.user_message(), Some(dir.display().to_string())))?;

        for name in entries {
            let lpath = format!("{}/{}", logical, name);
            let fpath = physical_path(root, &lpath);
            debug!("Visiting {}", fpath.display());

            if source.is_directory(&fpath) {
                Self::load_path(source, root, &lpath, staged)?;
            } else if is_definition_path(&name) {
                let entry = Self::load_definition(source, &fpath)?;
                let endpoint = lpath[..lpath.len() - JSD_SUFFIX.len()].to_string();
                info!("Added service '{}'", endpoint);
                staged.services.insert(endpoint, entry);
            } else if is_schema_path(&name) {
                let file = fpath.display().to_string();
                let text = source
                    .read_text(&fpath)
                    .map_err(|e| JsdError::load(e.user_message(), Some(file.clone())))?;
                let document = parse_schema_text(&lpath, &text)
                    .map_err(|e| JsdError::load(load_detail(e), Some(file.clone())))?;
                staged.schema_documents.push((lpath, file, document));
            } else {
                warn!("Unidentified file '{}' found. Skipping file.", fpath.display());
            }
        }

        Ok(())
    }

    fn load_definition(source: &dyn DocumentSource, fpath: &Path) -> JsdResult<ServiceEntry> {
        let file = fpath.display().to_string();
        let text = source
            .read_text(fpath)
            .map_err(|e| JsdError::load(e.user_message(), Some(file.clone())))?;

        let document: Value = serde_json::from_str(&text).map_err(|e| {
            JsdError::load(
                format!("JSON parse exception in file '{}'. {}", file, e),
                Some(file.clone()),
            )
        })?;

        ServiceEntry::from_document(document).map_err(|e| {
            JsdError::load(
                format!("JSD validation exception in file '{}'. {}", file, load_detail(e)),
                Some(file.clone()),
            )
        })
    }

    /// Compile every staged schema once all of them are parsed, so `$ref`s
    /// between schemas of the same tree resolve regardless of walk order.
    fn compile_staged_schemas(&self, staged: &Staging) -> JsdResult<()> {
        let mut documents = self.schemas.documents();
        for (reference, _, document) in &staged.schema_documents {
            documents.insert(reference.clone(), document.clone());
        }

        for (reference, file, document) in &staged.schema_documents {
            let missing = documents.missing_references(document);
            if !missing.is_empty() {
                return Err(JsdError::load(
                    format!("Missing schema files: {}.", missing.join(", ")),
                    Some(file.clone()),
                ));
            }

            staged
                .schemas
                .add_schema_with(reference, document.clone(), &documents)
                .map_err(|e| JsdError::load(load_detail(e), Some(file.clone())))?;
        }
        Ok(())
    }

    fn validate_staged_references(&self, staged: &Staging) -> JsdResult<()> {
        let schema_known =
            |reference: &str| staged.schemas.contains(reference) || self.schemas.contains(reference);

        for (endpoint, entry) in &staged.services {
            validate_definition_references(endpoint, entry.definition(), &schema_known)?;
        }
        Ok(())
    }

    /// Re-run reference validation over everything currently loaded
    pub fn validate_references(&self) -> JsdResult<()> {
        let schema_known = |reference: &str| self.schemas.contains(reference);
        for (endpoint, entry) in &self.services {
            validate_definition_references(endpoint, entry.definition(), &schema_known)?;
        }
        Ok(())
    }

    /// Register a single service built in memory. Its references must
    /// resolve against the schemas already loaded; an existing entry for
    /// the same endpoint is kept.
    pub fn insert_service(&mut self, endpoint: &str, entry: ServiceEntry) -> JsdResult<()> {
        let schema_known = |reference: &str| self.schemas.contains(reference);
        validate_definition_references(endpoint, entry.definition(), &schema_known)?;

        if self.services.contains_key(endpoint) {
            warn!("Service '{}' already loaded, keeping existing entry", endpoint);
            return Ok(());
        }
        self.services.insert(endpoint.to_string(), entry);
        info!("Added service '{}'", endpoint);
        Ok(())
    }

    pub fn service(&self, endpoint: &str) -> Option<&ServiceEntry> {
        self.services.get(endpoint)
    }

    pub fn has_service(&self, endpoint: &str) -> bool {
        self.services.contains_key(endpoint)
    }

    /// Sorted list of loaded endpoints
    pub fn endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self.services.keys().cloned().collect();
        endpoints.sort();
        endpoints
    }

    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    /// Bind `handler` to `method` on the service at `endpoint`
    pub fn register_handler(
        &mut self,
        endpoint: &str,
        method: &str,
        handler: Arc<dyn Handler>,
    ) -> JsdResult<()> {
        let entry = self.services.get_mut(endpoint).ok_or_else(|| {
            JsdError::protocol(format!(
                "Couldn't find endpoint '{}' to register handler.",
                endpoint
            ))
        })?;
        entry.set_handler(method, handler)?;
        info!("Registered handler for {}#{}", endpoint, method);
        Ok(())
    }
}

/// Message of a load failure without its file prefix
fn load_detail(error: JsdError) -> String {
    match error {
        JsdError::Load { message, .. } => message,
        other => other.user_message(),
    }
}

fn physical_path(root: &Path, logical: &str) -> PathBuf {
    let trimmed = logical.trim_start_matches('/');
    if trimmed.is_empty() {
        root.to_path_buf()
    } else {
        root.join(trimmed)
    }
}

/// Check that every type maps to a known schema and every method's
/// param/result/errors name a declared type.
fn validate_definition_references(
    endpoint: &str,
    definition: &Definition,
    schema_known: &dyn Fn(&str) -> bool,
) -> JsdResult<()> {
    let fail = |message: String| JsdError::load(message, Some(endpoint.to_string()));

    for (type_name, reference) in &definition.types {
        if !schema_known(reference) {
            return Err(fail(format!(
                "Type '{}' referencing schema '{}' was not found.",
                type_name, reference
            )));
        }
    }

    for (method_name, method) in &definition.methods {
        if let Some(param) = &method.param {
            if !definition.types.contains_key(param) {
                return Err(fail(format!(
                    "Param type '{}' not found in method '{}'.",
                    param, method_name
                )));
            }
        }

        if let Some(result) = &method.result {
            if !definition.types.contains_key(result) {
                return Err(fail(format!(
                    "Result type '{}' not found in method '{}'.",
                    result, method_name
                )));
            }
        }

        for error in &method.errors {
            if !definition.types.contains_key(error) {
                return Err(fail(format!(
                    "Error type '{}' not found in method '{}'.",
                    error, method_name
                )));
            }
        }
    }

    Ok(())
}
