//! # Project Runner
//!
//! Finds the files of a project and pushes each through the orchestrator with
//! bounded concurrency. Transformation itself is synchronous per file and runs
//! on the blocking pool; reads and writes are async.

use crate::config::{FixerConfig, is_state_path};
use crate::errors::FixError;
use crate::orchestrator::{Orchestrator, TransformOptions};
use crate::storage::write_atomic;
use crate::types::{Change, RunResult};
use futures::stream::{self, StreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// What happened to one file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub path: PathBuf,
    pub change_count: usize,
    pub changes: Vec<Change>,
    pub warnings: Vec<String>,
    pub modified: bool,
    pub written: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    fn failed(path: PathBuf, error: String) -> Self {
        Self {
            path,
            change_count: 0,
            changes: Vec::new(),
            warnings: Vec::new(),
            modified: false,
            written: false,
            skipped: false,
            error: Some(error),
        }
    }

    fn from_result(path: PathBuf, result: RunResult, written: bool) -> Self {
        Self {
            path,
            change_count: result.change_count,
            modified: result.is_modified(),
            changes: result.changes,
            warnings: result.warnings,
            written,
            skipped: result.skipped,
            error: result.error,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub files_scanned: usize,
    pub files_modified: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub total_changes: usize,
    pub dry_run: bool,
    pub outcomes: Vec<FileOutcome>,
}

impl RunSummary {
    fn from_outcomes(mut outcomes: Vec<FileOutcome>, dry_run: bool) -> Self {
        outcomes.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            files_scanned: outcomes.len(),
            files_modified: outcomes.iter().filter(|o| o.modified).count(),
            files_skipped: outcomes.iter().filter(|o| o.skipped).count(),
            files_failed: outcomes.iter().filter(|o| o.error.is_some()).count(),
            total_changes: outcomes.iter().map(|o| o.change_count).sum(),
            dry_run,
            outcomes,
        }
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, FixError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Files under `paths` (or the configured roots) that match the include globs
/// and none of the exclude globs, sorted.
pub fn discover_files(config: &FixerConfig, paths: &[PathBuf]) -> Result<Vec<PathBuf>, FixError> {
    let include = build_glob_set(&config.include)?;
    let exclude = build_glob_set(&config.exclude)?;
    let roots = if paths.is_empty() {
        config.root_directories.as_slice()
    } else {
        paths
    };

    let mut files = Vec::new();
    for root in roots {
        if !root.exists() {
            return Err(FixError::FileNotFound(root.clone()));
        }

        if root.is_file() {
            if !exclude.is_match(root) && !is_state_path(root, config) {
                files.push(root.clone());
            }
            continue;
        }

        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            !exclude.is_match(relative)
                && !exclude.is_match(entry.path())
                && !is_state_path(entry.path(), config)
        });

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if !include.is_match(relative) && !include.is_match(entry.path()) {
                continue;
            }
            if let Ok(metadata) = entry.metadata() {
                if metadata.len() > config.max_file_size {
                    tracing::event!(
                        tracing::Level::WARN,
                        file_path = ?entry.path(),
                        file_size_mb = metadata.len() / (1024 * 1024),
                        "Skipping large file"
                    );
                    continue;
                }
            }
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Transform every file, writing results back unless `options.dry_run`.
pub async fn run_files(
    orchestrator: Arc<Orchestrator>,
    files: Vec<PathBuf>,
    options: TransformOptions,
    max_concurrency: usize,
) -> RunSummary {
    let dry_run = options.dry_run;
    let outcomes: Vec<FileOutcome> = stream::iter(files)
        .map(|path| {
            let orchestrator = orchestrator.clone();
            let options = options.clone();
            async move { process_file(orchestrator, path, options).await }
        })
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await;

    RunSummary::from_outcomes(outcomes, dry_run)
}

async fn process_file(
    orchestrator: Arc<Orchestrator>,
    path: PathBuf,
    mut options: TransformOptions,
) -> FileOutcome {
    let code = match tokio::fs::read_to_string(&path).await {
        Ok(code) => code,
        Err(e) => {
            tracing::event!(
                tracing::Level::WARN,
                file_path = ?path,
                error = %e,
                "Error reading file"
            );
            return FileOutcome::failed(path, e.to_string());
        }
    };

    options.file_path = path.to_string_lossy().to_string();
    let dry_run = options.dry_run;
    let target = path.clone();

    let joined = tokio::task::spawn_blocking(move || {
        let result = orchestrator.transform(&code, &options);
        let written = if result.success && result.is_modified() && !dry_run {
            write_atomic(&target, result.code.as_bytes()).map(|_| true)
        } else {
            Ok(false)
        };
        (result, written)
    })
    .await;

    match joined {
        Ok((result, Ok(written))) => FileOutcome::from_result(path, result, written),
        Ok((result, Err(e))) => {
            tracing::event!(
                tracing::Level::WARN,
                file_path = ?path,
                error = %e,
                "Error writing file"
            );
            let mut outcome = FileOutcome::from_result(path, result, false);
            outcome.error = Some(e.to_string());
            outcome
        }
        Err(e) => FileOutcome::failed(path, format!("transform task failed: {e}")),
    }
}

/// Relative display form of `path` under `root`.
pub fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_respects_globs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".layerfix")).unwrap();
        fs::write(root.join("src/App.tsx"), "x").unwrap();
        fs::write(root.join("src/util.ts"), "x").unwrap();
        fs::write(root.join("src/readme.md"), "x").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(root.join(".layerfix/rules.json"), "[]").unwrap();

        let config = FixerConfig::for_project(root);
        let files = discover_files(&config, &[]).unwrap();

        assert_eq!(files, vec![root.join("src/App.tsx"), root.join("src/util.ts")]);
    }

    #[test]
    fn test_discover_skips_large_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.js"), "x".repeat(64)).unwrap();
        let mut config = FixerConfig::for_project(dir.path());
        config.max_file_size = 10;

        assert!(discover_files(&config, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_missing_path_is_error() {
        let dir = TempDir::new().unwrap();
        let config = FixerConfig::for_project(dir.path());
        let missing = dir.path().join("nope");
        assert!(matches!(
            discover_files(&config, &[missing]),
            Err(FixError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(Path::new("/a"), Path::new("/a/b/c.ts")), "b/c.ts");
    }
}
