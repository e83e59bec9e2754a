//! # file-history - Commit History and Revisions of a Single File
//!
//! Collects the list of commits that touched one file in a GitHub or GitLab
//! repository, persists it locally and downloads the file as it existed at
//! each of those commits.
//!
//! ## Overview
//!
//! Both providers are queried through their REST APIs. GitHub is walked by
//! following `Link: rel="next"` headers, GitLab by explicit page numbers
//! until an empty page. Rate limiting (HTTP 429) is waited out using the
//! provider's reset header, falling back to a fixed wait when the header is
//! missing. Every other failure stops the walk and the partial history is
//! kept and reported.
//!
//! ## Output Layout
//!
//! ```text
//! {output_root}/{repo}/{file_stem}/
//! ├── commits.json            records, newest first
//! ├── commits_hashes.txt      one hash per line (commits.txt on GitLab)
//! └── downloads/
//!     └── {file_stem}-{hash}{ext}
//! ```
//!
//! ## Modules
//!
//! - [`client`]: High-level entry points tying everything together
//! - [`provider`]: GitHub and GitLab history fetchers
//! - [`download`]: Raw revision downloader
//! - [`retry`]: Rate-limit aware request loop and clock abstraction
//! - [`http`]: Blocking HTTP transport
//! - [`store`]: Commit record and hash list persistence
//! - [`config`]: Configuration with environment variable support
//! - [`cli`]: Command-line surface of the binary
//! - [`types`]: Records, outcomes and reports
//! - [`error`]: Error types
//! - [`paths`]: Config location and output layout
//!
//! ## Usage Example
//!
//! ```no_run
//! use file_history::{Config, HistoryClient, Provider};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut config = Config::default();
//!     config.repository.provider = Provider::GitLab;
//!     config.repository.owner = "libtiff".into();
//!     config.repository.name = "libtiff".into();
//!     config.repository.file_path = "libtiff/tif_dirwrite.c".into();
//!
//!     let client = HistoryClient::new(config);
//!     client.fetch_history()?;
//!     client.download_snapshots()?;
//!     Ok(())
//! }
//! ```

/// Command-line parsing and command execution
pub mod cli;

/// Main client interface for using file-history as a library
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Download of a file at given commits
pub mod download;

/// Error types and utilities
pub mod error;

/// Blocking HTTP transport
pub mod http;

/// Path computation for config and output files
pub mod paths;

/// History fetchers for each hosting provider
pub mod provider;

/// Rate-limit handling
pub mod retry;

/// Persistence of fetched commits
pub mod store;

#[cfg(test)]
mod testing;

/// Shared records, outcomes and reports
pub mod types;

pub use client::HistoryClient;
pub use config::Config;
pub use error::{FetchError, HistoryError};
pub use types::{CommitRecord, DownloadReport, FetchOutcome, FetchReport, Provider, RepoRef};
