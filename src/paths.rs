/// Centralized platform-specific path computation
///
/// Config lives under the XDG config directory on Unix-like systems; remote
/// clones go below the system temp directory.
use std::path::PathBuf;

const PROJECT_DIR: &str = "repo-miner";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get the appropriate config directory for the current platform
    ///
    /// - Windows: %APPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_CONFIG_HOME or ~/.config
    pub fn config_dir() -> PathBuf {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns: {config_dir}/repo-miner
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(PROJECT_DIR)
    }

    /// Returns: {config_dir}/repo-miner/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }

    /// Directory remote repositories are cloned into
    ///
    /// Returns: {temp_dir}/repo-miner
    pub fn clone_root() -> PathBuf {
        std::env::temp_dir().join(PROJECT_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_not_empty() {
        let dir = PlatformPaths::config_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_project_config_dir_is_subdirectory() {
        let base = PlatformPaths::config_dir();
        let project = PlatformPaths::project_config_dir();
        assert!(project.starts_with(&base));
        assert!(project.ends_with("repo-miner"));
    }

    #[test]
    fn test_default_config_path() {
        let path = PlatformPaths::default_config_path();
        assert!(path.to_string_lossy().contains("repo-miner"));
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_clone_root_under_temp() {
        let root = PlatformPaths::clone_root();
        assert!(root.starts_with(std::env::temp_dir()));
        assert!(root.ends_with("repo-miner"));
    }
}
