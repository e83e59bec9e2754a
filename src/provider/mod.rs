//! Commit-history fetchers for the supported hosting providers
//!
//! Both fetchers page through the provider's "list commits for a path"
//! endpoint, wait out rate limiting through [`RateLimitedClient`], and stop
//! at the first hard failure, reporting it through [`FetchOutcome::Partial`].

/// GitHub REST v3 fetcher (Link header pagination)
pub mod github;
/// GitLab REST v4 fetcher (page number pagination, since-commit scan)
pub mod gitlab;

pub use github::GitHubFetcher;
pub use gitlab::GitLabFetcher;

use crate::error::FetchError;
use crate::http::HttpResponse;
use crate::retry::RateLimitedClient;
use crate::store::CommitSink;
use crate::types::{FetchOutcome, RepoRef};

/// Longest response body quoted in logs and errors
const MAX_BODY_IN_ERROR: usize = 512;

/// Source of the commits touching one file
pub trait HistorySource {
    /// Feed every admitted commit, in provider order, into `sink`
    ///
    /// The returned count is the number of commits accepted by the sink.
    fn fetch_history(
        &self,
        repo: &RepoRef,
        file_path: &str,
        since: Option<&str>,
        sink: &mut dyn CommitSink,
    ) -> FetchOutcome<usize>;
}

/// Since-commit scan state
///
/// Rejects every hash until the target shows up, then admits the target and
/// everything after it. Without a target everything is admitted.
#[derive(Debug, Clone)]
pub struct SinceFilter<'a> {
    target: Option<&'a str>,
    found: bool,
}

impl<'a> SinceFilter<'a> {
    pub fn new(target: Option<&'a str>) -> Self {
        Self {
            target,
            found: target.is_none(),
        }
    }

    pub fn admit(&mut self, hash: &str) -> bool {
        if !self.found && self.target == Some(hash) {
            tracing::info!("Found since commit {}, saving subsequent commits", hash);
            self.found = true;
        }
        self.found
    }

    pub fn found(&self) -> bool {
        self.found
    }

    pub fn target(&self) -> Option<&'a str> {
        self.target
    }
}

/// Error for a response that is neither success nor rate limiting
pub(crate) fn status_error(url: &str, response: &HttpResponse) -> FetchError {
    let mut body = response.text();
    if body.len() > MAX_BODY_IN_ERROR {
        let mut cut = MAX_BODY_IN_ERROR;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }

    tracing::error!(
        "Failed to retrieve page: {} (status {}): {}",
        url,
        response.status,
        body
    );

    FetchError::HttpStatus {
        url: url.to_string(),
        status: response.status,
        body,
    }
}

/// GET `url` and decode a JSON body, mapping every failure to a [`FetchError`]
pub(crate) fn get_json<T: serde::de::DeserializeOwned>(
    client: &RateLimitedClient,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<(T, HttpResponse), FetchError> {
    let response = client.get(url, headers)?;
    if !response.is_success() {
        return Err(status_error(url, &response));
    }

    let value = serde_json::from_slice(&response.body).map_err(|e| FetchError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok((value, response))
}
