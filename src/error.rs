/// Centralized error types for file-history using thiserror
///
/// Provides domain-specific error types for better error handling and user-facing messages.
use thiserror::Error;

/// Main error type for the history pipelines
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors that end a commit-history fetch or a single download
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} answered with status {status}: {body}")]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("Rate limit still active after {attempts} retries ({waited_secs}s waited) for {url}")]
    RateLimitExhausted {
        url: String,
        attempts: u32,
        waited_secs: u64,
    },

    #[error("Project '{0}' could not be resolved")]
    ProjectNotFound(String),

    #[error("Since commit {0} was not found in the history")]
    SinceCommitNotFound(String),

    #[error("Failed to persist commit {hash}: {reason}")]
    Sink { hash: String, reason: String },
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

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Empty {0}")]
    Empty(String),

    #[error("Invalid file path: {0}")]
    InvalidFilePath(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

/// Errors related to persisted commit lists and snapshots
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to write '{path}': {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("Failed to create directory: {0}")]
    DirectoryCreationFailed(String),
}

impl From<anyhow::Error> for HistoryError {
    fn from(err: anyhow::Error) -> Self {
        HistoryError::Other(format!("{:#}", err))
    }
}

impl HistoryError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        HistoryError::Other(msg.into())
    }

    /// Check if this is a user error (bad input or configuration) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            HistoryError::Validation(_)
                | HistoryError::Config(ConfigError::InvalidValue { .. })
                | HistoryError::Fetch(FetchError::ProjectNotFound(_))
                | HistoryError::Fetch(FetchError::SinceCommitNotFound(_))
        )
    }

    /// Check if running the same operation again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            HistoryError::Fetch(err) => err.is_retryable(),
            HistoryError::Io(_) => true,
            _ => false,
        }
    }
}

impl FetchError {
    /// Transient failures: network trouble, server errors, exhausted rate limit
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } | FetchError::RateLimitExhausted { .. } => true,
            FetchError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
