use super::{HistorySource, get_json};
use crate::error::FetchError;
use crate::http::{HttpClient, encode_component};
use crate::retry::{Clock, RateLimitSignal, RateLimitedClient, RetryPolicy};
use crate::store::CommitSink;
use crate::types::{CommitRecord, FetchOutcome, RepoRef};
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};

const ACCEPT: &str = "application/vnd.github.v3+json";

/// One `<url>; param; param` entry of a Link header
static LINK_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]*)>([^<]*)").unwrap());

/// `rel="next"`, `rel=next` or `rel="next last"`
static REL_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\brel\s*=\s*"?([^";,]*)"?"#).unwrap());

#[derive(Debug, Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitDetail,
}

#[derive(Debug, Deserialize)]
struct ApiCommitDetail {
    message: String,
    committer: ApiSignature,
}

#[derive(Debug, Deserialize)]
struct ApiSignature {
    date: DateTime<FixedOffset>,
}

impl From<ApiCommit> for CommitRecord {
    fn from(api: ApiCommit) -> Self {
        CommitRecord {
            hash: api.sha,
            message: api.commit.message,
            timestamp: api.commit.committer.date,
        }
    }
}

/// Extract the URL tagged `rel="next"` from a Link header
pub fn parse_next_link(header: &str) -> Option<String> {
    LINK_ENTRY.captures_iter(header).find_map(|entry| {
        let params = entry.get(2).map_or("", |m| m.as_str());
        let is_next = REL_PARAM
            .captures_iter(params)
            .any(|rel| rel[1].split_whitespace().any(|r| r.eq_ignore_ascii_case("next")));
        is_next.then(|| entry[1].trim().to_string())
    })
}

/// Lists the commits touching a path through the GitHub REST API
pub struct GitHubFetcher {
    client: RateLimitedClient,
    api_base: String,
}

impl GitHubFetcher {
    pub fn new(
        http: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: RateLimitedClient::new(http, clock, policy, RateLimitSignal::GITHUB),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// First page of `GET /repos/{owner}/{repo}/commits?path=..&sha=..`
    pub fn commits_url(&self, repo: &RepoRef, file_path: &str, since: Option<&str>) -> String {
        let mut url = format!(
            "{}/repos/{}/{}/commits?path={}",
            self.api_base,
            repo.owner,
            repo.name,
            encode_component(file_path)
        );
        if let Some(sha) = since {
            url.push_str("&sha=");
            url.push_str(&encode_component(sha));
        }
        url
    }

    /// Follow Link-header pagination from `start_url` until exhausted
    ///
    /// A rate-limited page is retried in place. Any other failure stops the
    /// walk and returns the records gathered so far as `Partial`.
    pub fn fetch_commits(&self, start_url: &str) -> FetchOutcome<Vec<CommitRecord>> {
        let headers = [("Accept", ACCEPT)];
        let mut records = Vec::new();
        let mut cursor = Some(start_url.to_string());
        let mut pages = 0usize;

        while let Some(url) = cursor.take() {
            let (page, response) = match get_json::<Vec<ApiCommit>>(&self.client, &url, &headers)
            {
                Ok(result) => result,
                Err(e) => return FetchOutcome::Partial(records, e),
            };

            if page.is_empty() {
                tracing::info!("No more commits found");
                break;
            }

            pages += 1;
            tracing::debug!("Page {} returned {} commits", pages, page.len());
            records.extend(page.into_iter().map(CommitRecord::from));

            cursor = response.header("link").and_then(parse_next_link);
        }

        tracing::info!("Fetched {} commits over {} pages", records.len(), pages);
        FetchOutcome::Complete(records)
    }
}

impl HistorySource for GitHubFetcher {
    fn fetch_history(
        &self,
        repo: &RepoRef,
        file_path: &str,
        since: Option<&str>,
        sink: &mut dyn CommitSink,
    ) -> FetchOutcome<usize> {
        let url = self.commits_url(repo, file_path, since);
        tracing::info!("Commits URL: {}", url);

        let (records, reason) = self.fetch_commits(&url).into_parts();

        for (written, record) in records.iter().enumerate() {
            if let Err(e) = sink.accept(record) {
                return FetchOutcome::Partial(
                    written,
                    FetchError::Sink {
                        hash: record.hash.clone(),
                        reason: format!("{:#}", e),
                    },
                );
            }
        }

        match reason {
            None => FetchOutcome::Complete(records.len()),
            Some(reason) => FetchOutcome::Partial(records.len(), reason),
        }
    }
}
