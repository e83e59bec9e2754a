//! Download of a tracked file as it existed at given commits
//!
//! Each hash is fetched from the provider's raw content endpoint and written
//! as `{basename}-{hash}{ext}`. A failed hash is logged and skipped; it never
//! stops the batch.

use crate::error::{HistoryError, StoreError};
use crate::http::HttpClient;
use crate::paths::split_file_name;
use crate::provider::status_error;
use crate::retry::{Clock, RateLimitSignal, RateLimitedClient, RetryPolicy};
use crate::types::{DownloadReport, Provider, RepoRef};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Local file name for `file_path` at `commit_hash`
///
/// `("dir/file.c", "abcd123")` gives `file-abcd123.c`.
pub fn snapshot_file_name(file_path: &str, commit_hash: &str) -> String {
    let (stem, ext) = split_file_name(file_path);
    format!("{}-{}{}", stem, commit_hash, ext)
}

/// Fetches raw revisions of one file into a destination directory
pub struct SnapshotDownloader {
    client: RateLimitedClient,
    provider: Provider,
    raw_base: String,
    repo: RepoRef,
    file_path: String,
    dest: PathBuf,
}

impl SnapshotDownloader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        provider: Provider,
        raw_base: impl Into<String>,
        repo: RepoRef,
        file_path: impl Into<String>,
        dest: impl Into<PathBuf>,
    ) -> Self {
        let signal = match provider {
            Provider::GitHub => RateLimitSignal::GITHUB,
            Provider::GitLab => RateLimitSignal::GITLAB,
        };
        Self {
            client: RateLimitedClient::new(http, clock, policy, signal),
            provider,
            raw_base: raw_base.into().trim_end_matches('/').to_string(),
            repo,
            file_path: file_path.into().trim_start_matches('/').to_string(),
            dest: dest.into(),
        }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Raw content URL of the tracked file at `commit_hash`
    pub fn raw_url(&self, commit_hash: &str) -> String {
        match self.provider {
            Provider::GitHub => format!(
                "{}/{}/{}/{}/{}",
                self.raw_base, self.repo.owner, self.repo.name, commit_hash, self.file_path
            ),
            Provider::GitLab => format!(
                "{}/{}/{}/-/raw/{}/{}",
                self.raw_base, self.repo.owner, self.repo.name, commit_hash, self.file_path
            ),
        }
    }

    /// Download one revision, returning the written path
    pub fn download(&self, commit_hash: &str) -> Result<PathBuf, HistoryError> {
        let url = self.raw_url(commit_hash);
        tracing::debug!("Downloading from: {}", url);

        let response = self.client.get(&url, &[])?;
        if response.status != 200 {
            return Err(status_error(&url, &response).into());
        }

        if !self.dest.exists() {
            fs::create_dir_all(&self.dest).map_err(|e| {
                StoreError::DirectoryCreationFailed(format!("{}: {}", self.dest.display(), e))
            })?;
            tracing::info!("Created directory: {}", self.dest.display());
        }

        let target = self
            .dest
            .join(snapshot_file_name(&self.file_path, commit_hash));
        fs::write(&target, &response.body).map_err(|e| StoreError::WriteFailed {
            path: target.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            "Downloaded {} from commit {} ({} bytes)",
            target.display(),
            commit_hash,
            response.body.len()
        );
        Ok(target)
    }

    /// Download every hash in order; failures are recorded and skipped
    pub fn download_all(&self, commit_hashes: &[String]) -> DownloadReport {
        let mut report = DownloadReport::default();

        for commit_hash in commit_hashes {
            match self.download(commit_hash) {
                Ok(path) => report.saved.push(path),
                Err(e) => {
                    tracing::warn!("Failed to download file for commit {}: {}", commit_hash, e);
                    report.failed.push((commit_hash.clone(), e.to_string()));
                }
            }
        }

        tracing::info!(
            "Downloaded {} of {} revisions to {}",
            report.saved.len(),
            report.attempted(),
            self.dest.display()
        );
        report
    }
}
