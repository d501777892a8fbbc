//! # Project Configuration (layerfix.yml)
//!
//! Optional per-project settings, discovered by walking up from the project
//! root. Values present in the file override the built-in defaults; command
//! line flags override both.

use crate::config::FixerConfig;
use crate::errors::FixError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAMES: &[&str] = &["layerfix.yml", "layerfix.yaml"];

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Layer ids to run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Vec<u8>>,

    /// Glob patterns of files to transform
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    /// Glob patterns of files to leave alone
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// State directory, relative to the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

impl ProjectConfig {
    pub fn from_file(path: &Path) -> Result<Self, FixError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FixError::Internal(format!("Failed to read {}: {e}", path.display())))?;

        let mut config = Self::from_yaml(&content)?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, FixError> {
        // An empty file is a valid, empty configuration
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(FixError::from)
    }

    /// Find the nearest config file at or above `start_dir`.
    pub fn discover(start_dir: &Path) -> Result<Option<(PathBuf, Self)>, FixError> {
        let mut current = start_dir;

        loop {
            for name in CONFIG_FILE_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    let config = Self::from_file(&config_path)?;
                    return Ok(Some((config_path, config)));
                }
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Ok(None)
    }

    fn resolve_paths(&mut self, config_dir: &Path) {
        if let Some(state_dir) = &self.state_dir {
            if state_dir.is_relative() {
                self.state_dir = Some(config_dir.join(state_dir));
            }
        }
    }

    /// Overlay the values this file sets onto `config`.
    pub fn apply_to(&self, config: &mut FixerConfig) -> Result<(), FixError> {
        if let Some(layers) = &self.layers {
            validate_layers(layers)?;
            config.layers = Some(layers.clone());
        }
        if !self.include.is_empty() {
            config.include = self.include.clone();
        }
        if !self.exclude.is_empty() {
            config.exclude = self.exclude.clone();
        }
        if let Some(state_dir) = &self.state_dir {
            config.state_directory = state_dir.clone();
        }
        if let Some(max_file_size) = self.max_file_size {
            config.max_file_size = max_file_size;
        }
        if let Some(max_concurrency) = self.max_concurrency {
            if max_concurrency == 0 {
                return Err(FixError::Internal(
                    "maxConcurrency must be at least 1".to_string(),
                ));
            }
            config.max_concurrency = max_concurrency;
        }
        Ok(())
    }
}

/// Layer ids are 1 through 7.
pub fn validate_layers(layers: &[u8]) -> Result<(), FixError> {
    match layers.iter().find(|id| !(1..=7).contains(*id)) {
        Some(id) => Err(FixError::Internal(format!("Unknown layer id {id}"))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
layers: [2, 5, 7]
include:
  - "src/**/*.tsx"
exclude:
  - "**/generated/**"
stateDir: .cache/layerfix
maxFileSize: 2048
maxConcurrency: 4
"#;

        let config = ProjectConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.layers, Some(vec![2, 5, 7]));
        assert_eq!(config.include, vec!["src/**/*.tsx".to_string()]);
        assert_eq!(config.state_dir, Some(PathBuf::from(".cache/layerfix")));
        assert_eq!(config.max_concurrency, Some(4));
    }

    #[test]
    fn test_empty_config() {
        assert_eq!(ProjectConfig::from_yaml("").unwrap(), ProjectConfig::default());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(ProjectConfig::from_yaml("layers: [oops").is_err());
    }

    #[test]
    fn test_discover_walks_up() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("apps/web/src");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp_dir.path().join("layerfix.yml"), "stateDir: state\n").unwrap();

        let (path, config) = ProjectConfig::discover(&nested).unwrap().unwrap();
        assert_eq!(path, temp_dir.path().join("layerfix.yml"));
        assert_eq!(config.state_dir, Some(temp_dir.path().join("state")));
    }

    #[test]
    fn test_apply_overrides_only_set_values() {
        let mut config = FixerConfig::for_project("/tmp/app");
        let project = ProjectConfig {
            layers: Some(vec![2, 7]),
            max_concurrency: Some(2),
            ..Default::default()
        };

        project.apply_to(&mut config).unwrap();

        assert_eq!(config.layers, Some(vec![2, 7]));
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.include, crate::config::default_include());
    }

    #[test]
    fn test_rejects_unknown_layers() {
        let mut config = FixerConfig::for_project("/tmp/app");
        let project = ProjectConfig {
            layers: Some(vec![2, 9]),
            ..Default::default()
        };
        assert!(project.apply_to(&mut config).is_err());
    }
}
