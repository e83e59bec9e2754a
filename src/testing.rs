//! In-memory doubles for [`HttpClient`] and [`Clock`]
//!
//! Drive pagination and rate limiting deterministically in unit tests.

use crate::error::FetchError;
use crate::http::{HttpClient, HttpResponse};
use crate::retry::Clock;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Answers requests from a queue of (expected URL, response) pairs
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<(String, Result<HttpResponse, String>)>>,
    requests: Mutex<Vec<String>>,
    headers: Mutex<Vec<Vec<(String, String)>>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next request, which must target `url`
    pub fn push(&self, url: &str, response: HttpResponse) {
        lock(&self.script).push_back((url.to_string(), Ok(response)));
    }

    /// Queue a transport failure for the next request
    pub fn push_error(&self, url: &str, reason: &str) {
        lock(&self.script).push_back((url.to_string(), Err(reason.to_string())));
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }

    /// Headers sent with each request, in order
    pub fn sent_headers(&self) -> Vec<Vec<(String, String)>> {
        lock(&self.headers).clone()
    }

    /// Scripted responses not consumed yet
    pub fn remaining(&self) -> usize {
        lock(&self.script).len()
    }
}

impl HttpClient for ScriptedClient {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, FetchError> {
        lock(&self.requests).push(url.to_string());
        lock(&self.headers).push(
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );

        let unscripted = |reason: String| FetchError::Transport {
            url: url.to_string(),
            reason,
        };

        match lock(&self.script).pop_front() {
            Some((expected, _)) if expected != url => Err(unscripted(format!(
                "unscripted request, expected {}",
                expected
            ))),
            Some((_, Ok(response))) => Ok(response),
            Some((_, Err(reason))) => Err(unscripted(reason)),
            None => Err(unscripted("script exhausted".to_string())),
        }
    }
}

/// Clock whose time only moves when something sleeps on it
pub struct ManualClock {
    now: Mutex<i64>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(now_unix: i64) -> Self {
        Self {
            now: Mutex::new(now_unix),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Every sleep requested so far
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        *lock(&self.now)
    }

    fn sleep(&self, duration: Duration) {
        *lock(&self.now) += duration.as_secs() as i64;
        lock(&self.sleeps).push(duration);
    }
}
