use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{FetchError, ValidationError};

/// Hosting provider of the tracked repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[value(name = "github")]
    GitHub,
    #[value(name = "gitlab")]
    GitLab,
}

impl Provider {
    /// Default REST API base for the public instance
    pub fn default_api_base(&self) -> &'static str {
        match self {
            Provider::GitHub => "https://api.github.com",
            Provider::GitLab => "https://gitlab.com",
        }
    }

    /// Default raw content base for the public instance
    pub fn default_raw_base(&self) -> &'static str {
        match self {
            Provider::GitHub => "https://raw.githubusercontent.com",
            Provider::GitLab => "https://gitlab.com",
        }
    }

    /// File name of the plain-text hash list written by this provider's fetcher
    pub fn hash_list_name(&self) -> &'static str {
        match self {
            Provider::GitHub => "commits_hashes.txt",
            Provider::GitLab => "commits.txt",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::GitHub => write!(f, "github"),
            Provider::GitLab => write!(f, "gitlab"),
        }
    }
}

impl FromStr for Provider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Provider::GitHub),
            "gitlab" => Ok(Provider::GitLab),
            other => Err(ValidationError::UnknownProvider(other.to_string())),
        }
    }
}

/// `owner/name` pair identifying a hosted repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One commit touching the tracked file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full commit SHA
    #[serde(rename = "commit_hash")]
    pub hash: String,
    /// Commit message (subject and body)
    #[serde(rename = "commit_message")]
    pub message: String,
    /// Committer time with the offset reported by the provider
    ///
    /// Stored as a parsed instant, so `commit_time` is written in one RFC 3339
    /// form for both providers: a `Z` suffix becomes `+00:00` and zero
    /// fractional seconds are omitted. The instant and its offset are kept.
    #[serde(rename = "commit_time")]
    pub timestamp: DateTime<FixedOffset>,
}

/// Result of a fetch run
///
/// `Partial` still carries everything accumulated before the run stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Complete(T),
    Partial(T, FetchError),
}

impl<T> FetchOutcome<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, FetchOutcome::Complete(_))
    }

    /// Accumulated value regardless of how the run ended
    pub fn value(&self) -> &T {
        match self {
            FetchOutcome::Complete(value) | FetchOutcome::Partial(value, _) => value,
        }
    }

    pub fn reason(&self) -> Option<&FetchError> {
        match self {
            FetchOutcome::Complete(_) => None,
            FetchOutcome::Partial(_, reason) => Some(reason),
        }
    }

    pub fn into_parts(self) -> (T, Option<FetchError>) {
        match self {
            FetchOutcome::Complete(value) => (value, None),
            FetchOutcome::Partial(value, reason) => (value, Some(reason)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Complete(value) => FetchOutcome::Complete(f(value)),
            FetchOutcome::Partial(value, reason) => FetchOutcome::Partial(f(value), reason),
        }
    }
}

/// Summary of a fetch run as reported by the client
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub provider: Provider,
    pub repository: String,
    pub file_path: String,
    /// Number of commits persisted
    pub commits: usize,
    pub records_file: PathBuf,
    pub hash_file: PathBuf,
    /// Why the run stopped early, if it did
    pub incomplete_reason: Option<String>,
    pub duration_ms: u64,
}

/// Summary of a snapshot download batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    /// Files written, in hash-list order
    pub saved: Vec<PathBuf>,
    /// (commit hash, reason) for every skipped hash
    pub failed: Vec<(String, String)>,
}

impl DownloadReport {
    pub fn attempted(&self) -> usize {
        self.saved.len() + self.failed.len()
    }
}
