//! # Transformation Log
//!
//! Durable, append-only record of every accepted layer transformation. The
//! active log is a JSON array rewritten atomically on each append. When it
//! grows past the size bound, or its oldest entry passes the age bound, it is
//! moved into a gzip archive next to it and a fresh log is started.
//!
//! Readers are tolerant: a truncated or corrupt tail is dropped and the valid
//! prefix is kept.

use crate::config::LogRotationConfig;
use crate::errors::FixError;
use crate::storage::write_atomic;
use chrono::{DateTime, Duration, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub type SharedTransformLogger = Arc<Mutex<TransformLogger>>;

const ARCHIVE_SUFFIX: &str = ".json.gz";

/// One accepted transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationLogEntry {
    pub timestamp: DateTime<Utc>,
    pub layer_id: u8,
    pub file_path: String,
    pub before: String,
    pub after: String,
    pub success: bool,
}

impl TransformationLogEntry {
    pub fn accepted(layer_id: u8, file_path: &str, before: &str, after: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            layer_id,
            file_path: file_path.to_string(),
            before: before.to_string(),
            after: after.to_string(),
            success: true,
        }
    }
}

/// Entries recovered from a log document, plus how many records were dropped.
#[derive(Debug, Default)]
pub struct ParsedLog {
    pub entries: Vec<TransformationLogEntry>,
    pub skipped: usize,
}

pub struct TransformLogger {
    path: PathBuf,
    rotation: LogRotationConfig,
    entries: Vec<TransformationLogEntry>,
    archived: Option<Vec<TransformationLogEntry>>,
    loaded: bool,
    skipped_on_load: usize,
}

impl TransformLogger {
    pub fn new(path: impl Into<PathBuf>, rotation: LogRotationConfig) -> Self {
        Self {
            path: path.into(),
            rotation,
            entries: Vec::new(),
            archived: None,
            loaded: false,
            skipped_on_load: 0,
        }
    }

    pub fn into_shared(self) -> SharedTransformLogger {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry and persist the active log, rotating first if needed.
    pub fn append(&mut self, entry: TransformationLogEntry) -> Result<(), FixError> {
        self.ensure_loaded();
        self.entries.push(entry);

        let json = serde_json::to_string_pretty(&self.entries)?;
        if self.needs_rotation(json.len() as u64) {
            self.rotate()?;
            return Ok(());
        }

        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }

    /// Archived entries (oldest first) followed by the active log.
    pub fn entries(&mut self) -> Vec<TransformationLogEntry> {
        self.ensure_loaded();
        if self.archived.is_none() {
            self.archived = Some(self.read_archives());
        }

        let mut all = self.archived.clone().unwrap_or_default();
        all.extend(self.entries.iter().cloned());
        all
    }

    /// Entries in the active (not yet rotated) log only.
    pub fn active_entries(&mut self) -> &[TransformationLogEntry] {
        self.ensure_loaded();
        &self.entries
    }

    /// Number of corrupt records dropped when the active log was read.
    pub fn skipped_on_load(&self) -> usize {
        self.skipped_on_load
    }

    /// Move the active log into a compressed archive and start a new one.
    pub fn rotate(&mut self) -> Result<(), FixError> {
        self.ensure_loaded();
        if self.entries.is_empty() {
            return Ok(());
        }

        let archive_path = self.archive_path(Utc::now());
        let json = serde_json::to_vec(&self.entries)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let compressed = encoder.finish()?;
        write_atomic(&archive_path, &compressed)?;

        let rotated = std::mem::take(&mut self.entries);
        if let Some(ref mut archived) = self.archived {
            archived.extend(rotated.iter().cloned());
        }
        write_atomic(&self.path, b"[]")?;

        info!(
            "Rotated {} log entries into {}",
            rotated.len(),
            archive_path.display()
        );
        self.prune_archives();
        Ok(())
    }

    /// Archive files, oldest first.
    pub fn archive_paths(&self) -> Vec<PathBuf> {
        let Some(dir) = self.path.parent() else {
            return Vec::new();
        };
        let prefix = self.archive_prefix();

        let mut paths: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(ARCHIVE_SUFFIX))
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        paths.sort();
        paths
    }

    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let parsed = parse_log(&content);
                if parsed.skipped > 0 {
                    warn!(
                        "Skipped {} corrupt entries in {}",
                        parsed.skipped,
                        self.path.display()
                    );
                }
                self.skipped_on_load = parsed.skipped;
                self.entries = parsed.entries;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to read {}: {}", self.path.display(), e),
        }
    }

    fn needs_rotation(&self, serialized_len: u64) -> bool {
        if serialized_len > self.rotation.max_bytes {
            return true;
        }
        let cutoff = Utc::now() - Duration::days(self.rotation.max_age_days);
        self.entries
            .first()
            .is_some_and(|oldest| oldest.timestamp < cutoff)
    }

    fn read_archives(&self) -> Vec<TransformationLogEntry> {
        let mut entries = Vec::new();
        for path in self.archive_paths() {
            match read_archive(&path) {
                Ok(parsed) => {
                    if parsed.skipped > 0 {
                        warn!(
                            "Skipped {} corrupt entries in {}",
                            parsed.skipped,
                            path.display()
                        );
                    }
                    entries.extend(parsed.entries);
                }
                Err(e) => warn!("Ignoring unreadable log archive {}: {}", path.display(), e),
            }
        }
        entries
    }

    fn prune_archives(&mut self) {
        let archives = self.archive_paths();
        let cutoff = Utc::now() - Duration::days(self.rotation.max_age_days);
        let excess = archives.len().saturating_sub(self.rotation.max_archives);

        let mut removed = false;
        for (index, path) in archives.iter().enumerate() {
            let expired = fs::metadata(path)
                .and_then(|m| m.modified())
                .map(|modified| DateTime::<Utc>::from(modified) < cutoff)
                .unwrap_or(false);

            if index < excess || expired {
                match fs::remove_file(path) {
                    Ok(()) => {
                        debug!("Removed log archive {}", path.display());
                        removed = true;
                    }
                    Err(e) => warn!("Failed to remove log archive {}: {}", path.display(), e),
                }
            }
        }

        if removed {
            self.archived = None;
        }
    }

    fn archive_prefix(&self) -> String {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("transformations");
        format!("{stem}-")
    }

    /// First unused archive name for `now`. The counter keeps rotations within
    /// the same millisecond apart and sorts them in rotation order.
    fn archive_path(&self, now: DateTime<Utc>) -> PathBuf {
        let stamp = now.format("%Y%m%dT%H%M%S%3f").to_string();
        let prefix = self.archive_prefix();
        let mut counter = 0u32;
        loop {
            let name = format!("{prefix}{stamp}-{counter:03}{ARCHIVE_SUFFIX}");
            let candidate = self.path.with_file_name(name);
            if !candidate.exists() {
                return candidate;
            }
            counter += 1;
        }
    }
}

fn read_archive(path: &Path) -> Result<ParsedLog, FixError> {
    let file = fs::File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut content = String::new();
    // A truncated archive still yields whatever was decompressed.
    if let Err(e) = decoder.read_to_string(&mut content) {
        if content.is_empty() {
            return Err(e.into());
        }
    }
    Ok(parse_log(&content))
}

/// Parse a log document: a JSON array, or newline-delimited JSON records.
/// Reading stops at the first record that is not valid JSON; records that are
/// valid JSON but not log entries are skipped individually.
pub fn parse_log(content: &str) -> ParsedLog {
    let mut parsed = ParsedLog::default();

    if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(content) {
        collect_entries(values, &mut parsed);
        return parsed;
    }

    let mut rest = content.trim_start();
    if let Some(stripped) = rest.strip_prefix('[') {
        rest = stripped;
    }

    let mut values = Vec::new();
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() || rest.starts_with(']') {
            break;
        }

        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<serde_json::Value>();
        match stream.next() {
            Some(Ok(value)) => {
                let offset = stream.byte_offset();
                values.push(value);
                rest = &rest[offset..];
            }
            _ => {
                parsed.skipped += 1;
                break;
            }
        }
    }

    collect_entries(values, &mut parsed);
    parsed
}

fn collect_entries(values: Vec<serde_json::Value>, parsed: &mut ParsedLog) {
    for value in values {
        match serde_json::from_value::<TransformationLogEntry>(value) {
            Ok(entry) => parsed.entries.push(entry),
            Err(_) => parsed.skipped += 1,
        }
    }
}
