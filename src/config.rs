use std::path::{Path, PathBuf};

/// Name of the per-project state directory holding rules and logs.
pub const STATE_DIR_NAME: &str = ".layerfix";

pub const RULES_FILE: &str = "rules.json";
pub const TRANSFORM_LOG_FILE: &str = "transformations.json";
pub const REPLAY_LEDGER_FILE: &str = "replay-ledger.json";
pub const BASELINE_FILE: &str = "baseline.json";

#[derive(Debug, Clone)]
pub struct FixerConfig {
    /// Maximum file size to process (in bytes)
    pub max_file_size: u64,
    /// Maximum number of files processed concurrently
    pub max_concurrency: usize,
    /// Project roots walked by `fix`
    pub root_directories: Vec<PathBuf>,
    /// Directory holding the rule store, transformation log and replay ledger
    pub state_directory: PathBuf,
    /// Maximum number of compiled rule patterns to cache
    pub regex_cache_size: usize,
    /// Layers to run; `None` runs every registered layer
    pub layers: Option<Vec<u8>>,
    /// Glob patterns of files to transform
    pub include: Vec<String>,
    /// Glob patterns of files never touched
    pub exclude: Vec<String>,
    /// Rotation bounds for the transformation log
    pub log_rotation: LogRotationConfig,
}

#[derive(Debug, Clone)]
pub struct LogRotationConfig {
    /// Rotate once the active log exceeds this many bytes
    pub max_bytes: u64,
    /// Rotate once the oldest active entry is older than this many days
    pub max_age_days: i64,
    /// Number of compressed archives kept
    pub max_archives: usize,
}

impl Default for LogRotationConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024, // 5MB
            max_age_days: 30,
            max_archives: 5,
        }
    }
}

impl Default for FixerConfig {
    fn default() -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            max_file_size: 10 * 1024 * 1024, // 10MB
            max_concurrency: 8,
            state_directory: root.join(STATE_DIR_NAME),
            root_directories: vec![root],
            regex_cache_size: 256,
            layers: None,
            include: default_include(),
            exclude: default_exclude(),
            log_rotation: LogRotationConfig::default(),
        }
    }
}

impl FixerConfig {
    /// Config rooted at `root`, keeping its state under `root/.layerfix`.
    pub fn for_project(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            state_directory: root.join(STATE_DIR_NAME),
            root_directories: vec![root],
            ..Default::default()
        }
    }

    pub fn rules_path(&self) -> PathBuf {
        self.state_directory.join(RULES_FILE)
    }

    pub fn transform_log_path(&self) -> PathBuf {
        self.state_directory.join(TRANSFORM_LOG_FILE)
    }

    pub fn replay_ledger_path(&self) -> PathBuf {
        self.state_directory.join(REPLAY_LEDGER_FILE)
    }

    pub fn baseline_path(&self) -> PathBuf {
        self.state_directory.join(BASELINE_FILE)
    }
}

/// Global fallback state directory (`~/.layerfix`), used when no project root is known.
pub fn global_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STATE_DIR_NAME)
}

pub fn default_include() -> Vec<String> {
    vec!["**/*.{js,jsx,ts,tsx}".to_string()]
}

pub fn default_exclude() -> Vec<String> {
    [
        "**/node_modules/**",
        "**/.next/**",
        "**/dist/**",
        "**/build/**",
        "**/.layerfix/**",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Whether a path lies inside the state directory (never transformed).
pub fn is_state_path(path: &Path, config: &FixerConfig) -> bool {
    path.starts_with(&config.state_directory)
}
