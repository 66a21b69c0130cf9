use std::fs;
use std::path::{Path, PathBuf};

use super::ObjectStore;
use crate::errors::CoreEngineError;

/// `ObjectStore` sobre el sistema de ficheros local.
#[derive(Debug, Clone, Default)]
pub struct LocalObjectStore;

impl LocalObjectStore {
    pub fn new() -> Self {
        Self
    }

    fn path(uri: &str) -> PathBuf {
        PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
    }

    fn copy_dir(from: &Path, to: &Path) -> Result<usize, CoreEngineError> {
        fs::create_dir_all(to)?;
        let mut copied = 0;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            let target = to.join(entry.file_name());
            if entry.file_type()?.is_dir() {
                copied += Self::copy_dir(&entry.path(), &target)?;
            } else {
                fs::copy(entry.path(), &target)?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    fn subdirs(uri: &str) -> Result<Vec<String>, CoreEngineError> {
        let path = Self::path(uri);
        let mut names = Vec::new();
        for entry in fs::read_dir(&path).map_err(|e| CoreEngineError::Storage(format!("list {uri}: {e}")))? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

impl ObjectStore for LocalObjectStore {
    fn write_string(&self, uri: &str, contents: &str) -> Result<(), CoreEngineError> {
        let path = Self::path(uri);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).map_err(|e| CoreEngineError::Storage(format!("write {uri}: {e}")))
    }

    fn read_string(&self, uri: &str) -> Result<String, CoreEngineError> {
        fs::read_to_string(Self::path(uri)).map_err(|e| CoreEngineError::Storage(format!("read {uri}: {e}")))
    }

    fn exists(&self, uri: &str) -> bool {
        Self::path(uri).exists()
    }

    fn list_subdirs(&self, uri: &str) -> Result<Vec<String>, CoreEngineError> {
        Self::subdirs(uri)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<String>, CoreEngineError> {
        let local = pattern.strip_prefix("file://").unwrap_or(pattern);
        let paths = glob::glob(local).map_err(|e| CoreEngineError::Storage(format!("bad pattern {pattern}: {e}")))?;
        let mut out = Vec::new();
        for p in paths {
            let p = p.map_err(|e| CoreEngineError::Storage(e.to_string()))?;
            out.push(p.to_string_lossy().into_owned());
        }
        out.sort();
        Ok(out)
    }

    fn copy_tree(&self, from: &str, to: &str) -> Result<usize, CoreEngineError> {
        let src = Self::path(from);
        if !src.is_dir() {
            return Err(CoreEngineError::Storage(format!("copy source {from} is not a directory")));
        }
        Self::copy_dir(&src, &Self::path(to))
    }
}
