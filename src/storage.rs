//! Storage ports for the single-document state files (rule store, replay ledger).
//!
//! Each port owns exactly one document. Reads return `None` when nothing was
//! ever written; writes replace the whole document.

use crate::errors::FixError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub trait StoragePort: Send {
    fn read(&self) -> Result<Option<String>, FixError>;
    fn write(&self, contents: &str) -> Result<(), FixError>;
    /// Human readable location, used in log messages.
    fn describe(&self) -> String;
}

/// A JSON document on disk, replaced atomically on write.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoragePort for FileStorage {
    fn read(&self) -> Result<Option<String>, FixError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, contents: &str) -> Result<(), FixError> {
        write_atomic(&self.path, contents.as_bytes())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory document. Clones share the same cell, which lets tests play
/// two "processes" against one store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    cell: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            cell: Arc::new(Mutex::new(Some(contents.into()))),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.cell.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl StoragePort for MemoryStorage {
    fn read(&self) -> Result<Option<String>, FixError> {
        Ok(self.contents())
    }

    fn write(&self, contents: &str) -> Result<(), FixError> {
        *self.cell.lock().unwrap_or_else(|e| e.into_inner()) = Some(contents.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

/// Write to a sibling temp file, then rename over the target.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FixError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(bytes)?;
        file.flush()?;
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}
