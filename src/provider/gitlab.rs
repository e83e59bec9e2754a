use super::{HistorySource, SinceFilter, get_json, status_error};
use crate::error::FetchError;
use crate::http::{HttpClient, encode_component};
use crate::retry::{Clock, RateLimitSignal, RateLimitedClient, RetryPolicy};
use crate::store::CommitSink;
use crate::types::{CommitRecord, FetchOutcome, RepoRef};
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::sync::Arc;

/// Commits requested per page
pub const PER_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
struct ApiProject {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    id: String,
    message: String,
    created_at: DateTime<FixedOffset>,
}

impl From<ApiCommit> for CommitRecord {
    fn from(api: ApiCommit) -> Self {
        CommitRecord {
            hash: api.id,
            message: api.message,
            timestamp: api.created_at,
        }
    }
}

/// Lists the commits touching a path through the GitLab REST API
pub struct GitLabFetcher {
    client: RateLimitedClient,
    api_base: String,
    per_page: u32,
}

impl GitLabFetcher {
    pub fn new(
        http: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: RateLimitedClient::new(http, clock, policy, RateLimitSignal::GITLAB),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            per_page: PER_PAGE,
        }
    }

    /// Override the page size (tests use small pages)
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn project_url(&self, repo: &RepoRef) -> String {
        format!(
            "{}/api/v4/projects/{}",
            self.api_base,
            encode_component(&repo.to_string())
        )
    }

    pub fn commits_url(&self, project_id: u64, file_path: &str, page: u32) -> String {
        format!(
            "{}/api/v4/projects/{}/repository/commits?path={}&page={}&per_page={}",
            self.api_base,
            project_id,
            encode_component(file_path),
            page,
            self.per_page
        )
    }

    /// Resolve `owner/name` to GitLab's numeric project id
    pub fn resolve_project_id(&self, repo: &RepoRef) -> Result<u64, FetchError> {
        let url = self.project_url(repo);
        let response = self.client.get(&url, &[])?;

        if response.status == 404 {
            tracing::error!("Project {} not found", repo);
            return Err(FetchError::ProjectNotFound(repo.to_string()));
        }
        if !response.is_success() {
            return Err(status_error(&url, &response));
        }

        let project: ApiProject =
            serde_json::from_slice(&response.body).map_err(|e| FetchError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!("Resolved {} to project id {}", repo, project.id);
        Ok(project.id)
    }

    /// Page through the history of `file_path` and stream admitted commits into `sink`
    ///
    /// Commits before `since` (in provider order) are skipped; `since` itself
    /// and everything after it are written. Without `since` every commit is
    /// written. Returns how many commits the sink accepted.
    pub fn fetch_commits_since(
        &self,
        project_id: u64,
        since: Option<&str>,
        file_path: &str,
        sink: &mut dyn CommitSink,
    ) -> FetchOutcome<usize> {
        let mut filter = SinceFilter::new(since);
        let mut written = 0usize;
        let mut page = 1u32;

        loop {
            let url = self.commits_url(project_id, file_path, page);
            let commits = match get_json::<Vec<ApiCommit>>(&self.client, &url, &[]) {
                Ok((commits, _)) => commits,
                Err(e) => return FetchOutcome::Partial(written, e),
            };

            if commits.is_empty() {
                tracing::info!("No more commits found");
                break;
            }

            tracing::debug!("Page {} returned {} commits", page, commits.len());

            for commit in commits {
                if !filter.admit(&commit.id) {
                    continue;
                }

                let record = CommitRecord::from(commit);
                tracing::debug!(
                    "Commit {} at {}: {}",
                    record.hash,
                    record.timestamp,
                    record.message.lines().next().unwrap_or("")
                );

                if let Err(e) = sink.accept(&record) {
                    return FetchOutcome::Partial(
                        written,
                        FetchError::Sink {
                            hash: record.hash,
                            reason: format!("{:#}", e),
                        },
                    );
                }
                written += 1;
            }

            page += 1;
        }

        match filter.target() {
            Some(target) if !filter.found() => {
                tracing::warn!("Since commit {} never appeared in the history", target);
                FetchOutcome::Partial(written, FetchError::SinceCommitNotFound(target.to_string()))
            }
            _ => {
                tracing::info!("Saved {} commits", written);
                FetchOutcome::Complete(written)
            }
        }
    }
}

impl HistorySource for GitLabFetcher {
    fn fetch_history(
        &self,
        repo: &RepoRef,
        file_path: &str,
        since: Option<&str>,
        sink: &mut dyn CommitSink,
    ) -> FetchOutcome<usize> {
        match self.resolve_project_id(repo) {
            Ok(project_id) => self.fetch_commits_since(project_id, since, file_path, sink),
            Err(e) => FetchOutcome::Partial(0, e),
        }
    }
}
