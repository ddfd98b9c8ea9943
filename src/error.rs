/// Centralized error types for repo-miner using thiserror
///
/// Per-commit failures are isolated by the miner; only [`ResourceExhausted`]
/// is allowed to take the whole process down.
use thiserror::Error;

/// Main error type for a mining run
#[derive(Error, Debug)]
pub enum MinerError {
    #[error("SCM error: {0}")]
    Scm(#[from] ScmError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Mining aborted, commit {commit} in {repo} exhausted resources: {reason}")]
    ResourceExhausted {
        commit: String,
        repo: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised by a version-control backend
#[derive(Error, Debug)]
pub enum ScmError {
    #[error("Git repository not found at: {0}")]
    RepoNotFound(String),

    #[error("Failed to open git repository '{path}': {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    #[error("Commit {id} too big ({files} files changed, limit is {max})")]
    CommitTooLarge { id: String, files: usize, max: usize },

    #[error("Failed to clone '{url}': {reason}")]
    CloneFailed { url: String, reason: String },

    #[error("Blame of '{file}' at {commit} failed: {reason}")]
    BlameFailed {
        file: String,
        commit: String,
        reason: String,
    },

    #[error(transparent)]
    ResourceExhausted(#[from] ResourceExhausted),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors raised by output sinks
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to open '{path}': {reason}")]
    OpenFailed { path: String, reason: String },

    #[error("Row has {actual} columns but the header declares {expected}")]
    ColumnMismatch { expected: usize, actual: usize },

    #[error("Write after close")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Marker for out-of-memory class failures.
///
/// Backends and visitors return (or wrap) this to request a fail-fast abort
/// of the whole mining process. It is never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("resource exhausted: {0}")]
pub struct ResourceExhausted(pub String);

impl ResourceExhausted {
    /// Search an error chain for a resource exhaustion marker
    pub fn find_in(err: &anyhow::Error) -> Option<&ResourceExhausted> {
        err.chain().find_map(|cause| {
            cause.downcast_ref::<ResourceExhausted>().or_else(|| {
                match cause.downcast_ref::<ScmError>() {
                    Some(ScmError::ResourceExhausted(inner)) => Some(inner),
                    _ => None,
                }
            })
        })
    }
}

impl From<anyhow::Error> for MinerError {
    fn from(err: anyhow::Error) -> Self {
        MinerError::Other(format!("{:#}", err))
    }
}

impl MinerError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        MinerError::Other(msg.into())
    }

    /// Configuration problems are detected before any mining starts
    pub fn is_config_error(&self) -> bool {
        matches!(self, MinerError::Config(_))
    }
}

impl ScmError {
    /// True for failures that only affect the requested commit
    pub fn is_per_commit(&self) -> bool {
        matches!(
            self,
            ScmError::CommitNotFound(_) | ScmError::CommitTooLarge { .. }
        )
    }
}
