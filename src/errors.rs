//! # Error Types
//!
//! Error handling for the layerfix engine.
//!
//! Ordinary transform failures (empty input, unparseable source, rejected
//! layer output, broken learned rules) are reported through result objects,
//! not through this type. `FixError` covers I/O, persistence and the
//! deliberately fail-closed integrity checks.

use std::fmt;
use std::path::PathBuf;

/// Error types that can occur during layerfix operations.
#[derive(Debug)]
pub enum FixError {
    /// Internal error with custom message
    Internal(String),
    /// I/O error reading/writing files
    Io(std::io::Error),
    /// Error walking directory trees during file discovery
    WalkDir(walkdir::Error),
    /// Error parsing YAML project configuration
    SerdeYaml(serde_yaml::Error),
    /// Error parsing or writing JSON data
    SerdeJson(serde_json::Error),
    /// Regular expression compilation error
    Regex(regex::Error),
    /// Glob pattern compilation error
    Glob(globset::Error),
    /// Requested file not found
    FileNotFound(PathBuf),
    /// A rule or rule candidate violates the rule invariants
    InvalidRule(String),
    /// A layer transformer failed
    Layer { layer_id: u8, message: String },
    /// The integrity baseline exists but cannot be parsed
    CorruptBaseline { path: PathBuf, reason: String },
}

impl fmt::Display for FixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixError::Internal(msg) => write!(f, "Internal error: {msg}"),
            FixError::Io(err) => write!(f, "IO error: {err}"),
            FixError::WalkDir(err) => write!(f, "Directory traversal error: {err}"),
            FixError::SerdeYaml(err) => write!(f, "YAML parsing error: {err}"),
            FixError::SerdeJson(err) => write!(f, "JSON error: {err}"),
            FixError::Regex(err) => write!(f, "Regex error: {err}"),
            FixError::Glob(err) => write!(f, "Glob error: {err}"),
            FixError::FileNotFound(path) => write!(f, "File not found: {}", path.display()),
            FixError::InvalidRule(msg) => write!(f, "Invalid rule: {msg}"),
            FixError::Layer { layer_id, message } => {
                write!(f, "Layer {layer_id} failed: {message}")
            }
            FixError::CorruptBaseline { path, reason } => write!(
                f,
                "Integrity baseline {} is corrupt: {reason}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for FixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FixError::Io(err) => Some(err),
            FixError::WalkDir(err) => Some(err),
            FixError::SerdeYaml(err) => Some(err),
            FixError::SerdeJson(err) => Some(err),
            FixError::Regex(err) => Some(err),
            FixError::Glob(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FixError {
    fn from(err: std::io::Error) -> Self {
        FixError::Io(err)
    }
}

impl From<walkdir::Error> for FixError {
    fn from(err: walkdir::Error) -> Self {
        FixError::WalkDir(err)
    }
}

impl From<serde_yaml::Error> for FixError {
    fn from(err: serde_yaml::Error) -> Self {
        FixError::SerdeYaml(err)
    }
}

impl From<serde_json::Error> for FixError {
    fn from(err: serde_json::Error) -> Self {
        FixError::SerdeJson(err)
    }
}

impl From<regex::Error> for FixError {
    fn from(err: regex::Error) -> Self {
        FixError::Regex(err)
    }
}

impl From<globset::Error> for FixError {
    fn from(err: globset::Error) -> Self {
        FixError::Glob(err)
    }
}
