/// Configuration system for file-history
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, HistoryError, ValidationError};
use crate::types::{Provider, RepoRef};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Which repository and file to follow
    #[serde(default)]
    pub repository: RepositoryConfig,

    /// HTTP endpoints and transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Rate-limit retry bounds
    #[serde(default)]
    pub retry: RetryConfig,

    /// Where results are written
    #[serde(default)]
    pub output: OutputConfig,
}

/// Tracked repository and file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Hosting provider: "github" or "gitlab"
    #[serde(default = "default_provider")]
    pub provider: Provider,

    /// Repository owner (user, organisation or group)
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Repository name
    #[serde(default = "default_repo_name")]
    pub name: String,

    /// Path of the tracked file inside the repository
    #[serde(default = "default_file_path")]
    pub file_path: String,

    /// GitHub: commit the listing starts from. GitLab: first commit kept.
    #[serde(default)]
    pub since_commit: Option<String>,
}

/// HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// API base URL; provider default when unset
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Raw content base URL; provider default when unset
    #[serde(default)]
    pub raw_base_url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Rate-limit retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries allowed for one rate-limited request
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait when the provider gives no usable reset time
    #[serde(default = "default_fallback_wait_secs")]
    pub fallback_wait_secs: u64,

    /// Extra seconds added after a known reset time
    #[serde(default = "default_reset_margin_secs")]
    pub reset_margin_secs: u64,

    /// Cap on the total time spent waiting for one request
    #[serde(default = "default_max_total_wait_secs")]
    pub max_total_wait_secs: u64,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root under which `{repo}/{file_stem}/` is created
    #[serde(default = "default_output_root")]
    pub root: PathBuf,
}

// Default value functions
fn default_provider() -> Provider {
    Provider::GitHub
}

fn default_owner() -> String {
    "pnggroup".to_string()
}

fn default_repo_name() -> String {
    "libpng".to_string()
}

fn default_file_path() -> String {
    "pngrutil.c".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("file-history/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_attempts() -> u32 {
    5
}

fn default_fallback_wait_secs() -> u64 {
    60
}

fn default_reset_margin_secs() -> u64 {
    5
}

fn default_max_total_wait_secs() -> u64 {
    3600
}

fn default_output_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            owner: default_owner(),
            name: default_repo_name(),
            file_path: default_file_path(),
            since_commit: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            raw_base_url: None,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            fallback_wait_secs: default_fallback_wait_secs(),
            reset_margin_secs: default_reset_margin_secs(),
            max_total_wait_secs: default_max_total_wait_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
        }
    }
}

impl HttpConfig {
    /// API base for `provider`, without a trailing slash
    pub fn api_base(&self, provider: Provider) -> String {
        non_empty(&self.api_base_url)
            .unwrap_or(provider.default_api_base())
            .trim_end_matches('/')
            .to_string()
    }

    /// Raw content base for `provider`, without a trailing slash
    pub fn raw_base(&self, provider: Provider) -> String {
        non_empty(&self.raw_base_url)
            .unwrap_or(provider.default_raw_base())
            .trim_end_matches('/')
            .to_string()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl RepositoryConfig {
    pub fn repo(&self) -> RepoRef {
        RepoRef::new(self.owner.clone(), self.name.clone())
    }

    /// Configured since commit, ignoring blank values
    pub fn since(&self) -> Option<&str> {
        non_empty(&self.since_commit)
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, HistoryError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, HistoryError> {
        if path.exists() {
            tracing::info!("Loading config from: {}", path.display());
            Self::from_file(path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
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
    pub fn validate(&self) -> Result<(), HistoryError> {
        let required = [
            ("repository.owner", &self.repository.owner),
            ("repository.name", &self.repository.name),
            ("repository.file_path", &self.repository.file_path),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::Empty(key.to_string()).into());
            }
        }

        if self.repository.file_path.ends_with('/') {
            return Err(ValidationError::InvalidFilePath(format!(
                "'{}' names a directory",
                self.repository.file_path
            ))
            .into());
        }

        if self.http.timeout_secs == 0 {
            return Err(invalid("http.timeout_secs", "must be greater than 0"));
        }

        if self.retry.fallback_wait_secs == 0 {
            return Err(invalid("retry.fallback_wait_secs", "must be greater than 0"));
        }

        if self.retry.max_total_wait_secs < self.retry.fallback_wait_secs {
            return Err(invalid(
                "retry.max_total_wait_secs",
                &format!(
                    "must be at least retry.fallback_wait_secs ({})",
                    self.retry.fallback_wait_secs
                ),
            ));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("FILE_HISTORY_PROVIDER") {
            match provider.parse() {
                Ok(provider) => self.repository.provider = provider,
                Err(e) => tracing::warn!("Ignoring FILE_HISTORY_PROVIDER: {}", e),
            }
        }

        if let Ok(owner) = std::env::var("FILE_HISTORY_OWNER") {
            self.repository.owner = owner;
        }

        if let Ok(name) = std::env::var("FILE_HISTORY_REPO") {
            self.repository.name = name;
        }

        if let Ok(path) = std::env::var("FILE_HISTORY_PATH") {
            self.repository.file_path = path;
        }

        if let Ok(since) = std::env::var("FILE_HISTORY_SINCE") {
            self.repository.since_commit = Some(since);
        }

        if let Ok(root) = std::env::var("FILE_HISTORY_OUTPUT") {
            self.output.root = PathBuf::from(root);
        }

        if let Ok(timeout) = std::env::var("FILE_HISTORY_TIMEOUT_SECS")
            && let Ok(secs) = timeout.parse()
        {
            self.http.timeout_secs = secs;
        }
    }

    /// Load from `path` (or the default location), then apply environment overrides
    pub fn new(path: Option<&Path>) -> Result<Self, HistoryError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::load_or_default(&crate::paths::PlatformPaths::default_config_path())?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

fn invalid(key: &str, reason: &str) -> HistoryError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Serialises tests that write or read `FILE_HISTORY_*` variables
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
