//! Document sources the registry loads from

use std::path::Path;

use crate::JsdResult;

/// Read-only access to a tree of definition and schema documents
pub trait DocumentSource: Send + Sync {
    /// Names of the entries directly inside `path`
    fn list_entries(&self, path: &Path) -> JsdResult<Vec<String>>;

    fn is_directory(&self, path: &Path) -> bool;

    fn read_text(&self, path: &Path) -> JsdResult<String>;

    fn exists(&self, path: &Path) -> bool;

    fn read_binary(&self, path: &Path) -> JsdResult<Vec<u8>>;
}

/// Local filesystem source
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl DocumentSource for LocalFileSystem {
    fn list_entries(&self, path: &Path) -> JsdResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        // read_dir order is platform dependent
        names.sort();
        Ok(names)
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_text(&self, path: &Path) -> JsdResult<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_binary(&self, path: &Path) -> JsdResult<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }
}
