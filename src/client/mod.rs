//! Core library client for file-history
//!
//! Wires configuration, transport, fetchers, the commit store and the
//! snapshot downloader together behind two entry points.

use crate::config::Config;
use crate::download::SnapshotDownloader;
use crate::error::HistoryError;
use crate::http::{HttpClient, UreqClient};
use crate::paths::OutputLayout;
use crate::provider::{GitHubFetcher, GitLabFetcher, HistorySource};
use crate::retry::{Clock, RetryPolicy, SystemClock};
use crate::store::CommitStore;
use crate::types::{DownloadReport, FetchOutcome, FetchReport, Provider};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main client for fetching a file's history and its revisions
///
/// # Example
///
/// ```no_run
/// use file_history::{Config, HistoryClient};
///
/// fn main() -> anyhow::Result<()> {
///     let client = HistoryClient::new(Config::new(None)?);
///
///     let outcome = client.fetch_history()?;
///     println!("{} commits", outcome.value().commits);
///
///     let report = client.download_snapshots()?;
///     println!("{} revisions saved", report.saved.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct HistoryClient {
    pub(crate) config: Arc<Config>,
    pub(crate) http: Arc<dyn HttpClient>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl HistoryClient {
    /// Create a client using `ureq` and the system clock
    pub fn new(config: Config) -> Self {
        let http = UreqClient::new(
            Duration::from_secs(config.http.timeout_secs),
            &config.http.user_agent,
        );
        Self::with_transport(config, Arc::new(http), Arc::new(SystemClock))
    }

    /// Create a client with a custom transport and clock
    pub fn with_transport(config: Config, http: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            http,
            clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Output layout for the configured repository and file
    pub fn layout(&self) -> OutputLayout {
        let repo = &self.config.repository;
        OutputLayout::new(
            &self.config.output.root,
            &repo.name,
            &repo.file_path,
            repo.provider,
        )
    }

    fn policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.config.retry)
    }

    fn source(&self) -> Box<dyn HistorySource> {
        let provider = self.config.repository.provider;
        let api_base = self.config.http.api_base(provider);
        match provider {
            Provider::GitHub => Box::new(GitHubFetcher::new(
                self.http.clone(),
                self.clock.clone(),
                self.policy(),
                api_base,
            )),
            Provider::GitLab => Box::new(GitLabFetcher::new(
                self.http.clone(),
                self.clock.clone(),
                self.policy(),
                api_base,
            )),
        }
    }

    /// Fetch the commit history and persist it
    ///
    /// The hash list is streamed while fetching and the JSON records are
    /// written afterwards, in both cases replacing the previous run. A run
    /// that stopped early after admitting commits still persists them and
    /// comes back as [`FetchOutcome::Partial`]. A run that stopped before
    /// admitting anything leaves the previous output untouched. `Err` is
    /// reserved for local I/O failures.
    pub fn fetch_history(&self) -> Result<FetchOutcome<FetchReport>, HistoryError> {
        let start_time = Instant::now();
        let repo_config = &self.config.repository;
        let repo = repo_config.repo();

        tracing::info!(
            "Fetching history of {} in {} ({})",
            repo_config.file_path,
            repo,
            repo_config.provider
        );

        let store = CommitStore::new(self.layout());
        let mut hash_list = store.pending_hash_list();
        let hash_file = hash_list.path().to_path_buf();

        let outcome = self.source().fetch_history(
            &repo,
            &repo_config.file_path,
            repo_config.since(),
            &mut hash_list,
        );

        let records_file = if outcome.is_complete() || hash_list.is_open() {
            let records = hash_list.finish()?;
            let records_file = store.save_records(&records)?;
            tracing::info!("Commit hashes have been saved to {}", hash_file.display());
            records_file
        } else {
            tracing::warn!(
                "No commits fetched, keeping previous output in {}",
                store.layout().dir().display()
            );
            store.layout().records_file()
        };

        if let Some(reason) = outcome.reason() {
            tracing::warn!("History is incomplete: {}", reason);
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let incomplete_reason = outcome.reason().map(|r| r.to_string());

        Ok(outcome.map(|commits| FetchReport {
            provider: repo_config.provider,
            repository: repo.to_string(),
            file_path: repo_config.file_path.clone(),
            commits,
            records_file,
            hash_file,
            incomplete_reason,
            duration_ms,
        }))
    }

    /// Download the tracked file at every commit of the persisted hash list
    pub fn download_snapshots(&self) -> Result<DownloadReport, HistoryError> {
        let layout = self.layout();
        let hashes = CommitStore::new(layout.clone()).load_hashes()?;

        if hashes.is_empty() {
            tracing::info!("No commit hashes found in {}", layout.hash_file().display());
            return Ok(DownloadReport::default());
        }

        let repo_config = &self.config.repository;
        let downloader = SnapshotDownloader::new(
            self.http.clone(),
            self.clock.clone(),
            self.policy(),
            repo_config.provider,
            self.config.http.raw_base(repo_config.provider),
            repo_config.repo(),
            repo_config.file_path.clone(),
            layout.downloads_dir(),
        );

        tracing::info!(
            "Downloading {} revisions of {} into {}",
            hashes.len(),
            repo_config.file_path,
            downloader.dest().display()
        );
        Ok(downloader.download_all(&hashes))
    }
}
