//! # Integrity Baseline
//!
//! Content hashes of the project's source files, recorded before a run and
//! compared afterwards. Unlike the rule store, a baseline that cannot be read
//! is an error: a comparison against unknown data must not report "clean".

use crate::errors::FixError;
use crate::storage::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const BASELINE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigest {
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityBaseline {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Keyed by path relative to the project root, `/`-separated.
    pub files: BTreeMap<String, FileDigest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub modified: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.added.is_empty() && self.removed.is_empty()
    }
}

impl IntegrityBaseline {
    /// Hash `files` (absolute, or relative to the working directory).
    pub fn create(root: &Path, files: &[PathBuf]) -> Result<Self, FixError> {
        Ok(Self {
            version: BASELINE_VERSION,
            created_at: Utc::now(),
            files: digest_files(root, files)?,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), FixError> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())?;
        info!("Wrote integrity baseline for {} files to {}", self.files.len(), path.display());
        Ok(())
    }

    /// Load a baseline. A missing file is `FileNotFound`; anything unreadable
    /// is `CorruptBaseline`.
    pub fn load(path: &Path) -> Result<Self, FixError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FixError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(FixError::CorruptBaseline {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        let baseline: Self =
            serde_json::from_str(&content).map_err(|e| FixError::CorruptBaseline {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if baseline.version != BASELINE_VERSION {
            return Err(FixError::CorruptBaseline {
                path: path.to_path_buf(),
                reason: format!("unsupported version {}", baseline.version),
            });
        }
        Ok(baseline)
    }

    pub fn compare(&self, root: &Path, files: &[PathBuf]) -> Result<IntegrityReport, FixError> {
        let current = digest_files(root, files)?;
        let mut report = IntegrityReport::default();

        for (path, digest) in &current {
            match self.files.get(path) {
                Some(recorded) if recorded == digest => {}
                Some(_) => report.modified.push(path.clone()),
                None => report.added.push(path.clone()),
            }
        }
        report.removed = self
            .files
            .keys()
            .filter(|path| !current.contains_key(*path))
            .cloned()
            .collect();

        Ok(report)
    }
}

/// Load the baseline at `baseline_path` and compare it with `files`.
pub fn check(baseline_path: &Path, root: &Path, files: &[PathBuf]) -> Result<IntegrityReport, FixError> {
    IntegrityBaseline::load(baseline_path)?.compare(root, files)
}

fn digest_files(root: &Path, files: &[PathBuf]) -> Result<BTreeMap<String, FileDigest>, FixError> {
    let mut digests = BTreeMap::new();
    for file in files {
        let bytes = fs::read(file)?;
        let key = file
            .strip_prefix(root)
            .unwrap_or(file)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        digests.insert(
            key,
            FileDigest {
                sha256: format!("{:x}", Sha256::digest(&bytes)),
                size: bytes.len() as u64,
            },
        );
    }
    Ok(digests)
}
