/// Configuration system for repo-miner
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, MinerError};
use crate::scm::GitSettings;
use crate::scm::git::{DEFAULT_MAX_DIFF_SIZE, DEFAULT_MAX_FILES};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MinerConfig {
    /// Git backend configuration
    #[serde(default)]
    pub git: GitConfig,

    /// Mining run configuration
    #[serde(default)]
    pub mining: MiningSection,
}

/// Git backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Commits changing more files than this are skipped
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Per-file diffs longer than this are replaced by a sentinel
    #[serde(default = "default_max_diff_size")]
    pub max_diff_size: usize,

    /// Lines of context around each diff hunk
    #[serde(default)]
    pub diff_context: Option<u32>,

    /// Skip the (slow) branch containment lookup
    #[serde(default)]
    pub omit_branches: bool,

    /// Only walk the first-parent chain of HEAD
    #[serde(default)]
    pub first_parent_only: bool,
}

/// Mining run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningSection {
    /// Worker threads per repository
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Keep the backend's newest-first order instead of mining oldest-first
    #[serde(default)]
    pub reverse_order: bool,
}

fn default_max_files() -> usize {
    DEFAULT_MAX_FILES
}

fn default_max_diff_size() -> usize {
    DEFAULT_MAX_DIFF_SIZE
}

fn default_threads() -> usize {
    1
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_diff_size: default_max_diff_size(),
            diff_context: None,
            omit_branches: false,
            first_parent_only: false,
        }
    }
}

impl Default for MiningSection {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            reverse_order: false,
        }
    }
}

impl MinerConfig {
    /// Load and validate configuration from file
    pub fn from_file(path: &Path) -> Result<Self, MinerError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without validating it
    fn read_file(path: &Path) -> Result<Self, MinerError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)).into())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), MinerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), MinerError> {
        let positive = [
            ("git.max_files", self.git.max_files),
            ("git.max_diff_size", self.git.max_diff_size),
            ("mining.threads", self.mining.threads),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "must be greater than 0".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Unparsable values are ignored and logged.
    pub fn apply_env_overrides_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = parsed(&lookup, "REPO_MINER_MAX_FILES") {
            self.git.max_files = value;
        }

        if let Some(value) = parsed(&lookup, "REPO_MINER_MAX_DIFF") {
            self.git.max_diff_size = value;
        }

        if let Some(value) = parsed(&lookup, "REPO_MINER_DIFF_CONTEXT") {
            self.git.diff_context = Some(value);
        }

        if let Some(value) = parsed(&lookup, "REPO_MINER_THREADS") {
            self.mining.threads = value;
        }
    }

    /// Merge the file (explicit or default) with the environment
    ///
    /// The result is not validated; call [`MinerConfig::validate`] once any
    /// command line overrides are applied on top.
    pub fn load(path: Option<&Path>) -> Result<Self, MinerError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`MinerConfig::load`] with an arbitrary variable lookup
    pub fn load_with(
        path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, MinerError> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = crate::paths::PlatformPaths::default_config_path();
                default.exists().then_some(default)
            }
        };
        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading config from: {}", path.display());
                Self::read_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides_with(lookup);
        Ok(config)
    }

    /// Backend settings derived from the `[git]` table
    pub fn git_settings(&self) -> GitSettings {
        GitSettings {
            max_files: self.git.max_files,
            max_diff_size: self.git.max_diff_size,
            diff_context: self.git.diff_context,
            omit_branches: self.git.omit_branches,
            first_parent_only: self.git.first_parent_only,
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid number", key, raw);
            None
        }
    }
}
