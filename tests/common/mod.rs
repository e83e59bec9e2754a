//! Scripted transport and manual clock for the integration tests
use file_history::FetchError;
use file_history::http::{HttpClient, HttpResponse};
use file_history::retry::Clock;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Answers each request with the next queued response for that exact URL
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<(String, HttpResponse)>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, url: &str, response: HttpResponse) {
        self.script
            .lock()
            .unwrap()
            .push_back((url.to_string(), response));
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl HttpClient for ScriptedClient {
    fn get(&self, url: &str, _headers: &[(&str, &str)]) -> Result<HttpResponse, FetchError> {
        match self.script.lock().unwrap().pop_front() {
            Some((expected, response)) if expected == url => Ok(response),
            other => Err(FetchError::Transport {
                url: url.to_string(),
                reason: format!(
                    "unscripted request, expected {:?}",
                    other.map(|(expected, _)| expected)
                ),
            }),
        }
    }
}

/// Clock that advances only when slept on
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

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        *self.now.lock().unwrap() += duration.as_secs() as i64;
        self.sleeps.lock().unwrap().push(duration);
    }
}
