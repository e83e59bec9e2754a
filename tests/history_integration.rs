/// End-to-end runs of the history client against scripted provider responses
mod common;

use anyhow::Result;
use common::{ManualClock, ScriptedClient};
use file_history::config::Config;
use file_history::http::HttpResponse;
use file_history::{FetchError, HistoryClient, Provider};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn github_commit(sha: &str, message: &str, date: &str) -> String {
    format!(
        r#"{{"sha":"{sha}","commit":{{"message":"{message}","author":{{"name":"dev"}},"committer":{{"name":"dev","date":"{date}"}}}},"html_url":"x"}}"#
    )
}

fn gitlab_commit(id: &str, created_at: &str) -> String {
    format!(r#"{{"id":"{id}","short_id":"x","title":"t","message":"msg {id}","created_at":"{created_at}"}}"#)
}

#[test]
fn test_github_paginated_history_with_rate_limit_then_download() -> Result<()> {
    let root = TempDir::new()?;
    let http = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(1_000));

    let first = "https://api.github.com/repos/pnggroup/libpng/commits?path=pngrutil.c";
    let second = "https://api.github.com/repositories/1/commits?path=pngrutil.c&page=2";

    http.push(
        first,
        HttpResponse::new(200)
            .with_header(
                "Link",
                format!(r#"<{second}>; rel="next", <{second}>; rel="last""#),
            )
            .with_body(format!(
                "[{},{}]",
                github_commit("c3", "third", "2024-03-01T00:00:00Z"),
                github_commit("c2", "second", "2024-02-01T00:00:00+02:00")
            )),
    );
    http.push(
        second,
        HttpResponse::new(429).with_header("X-RateLimit-Reset", "1040"),
    );
    http.push(
        second,
        HttpResponse::new(200).with_body(format!(
            "[{}]",
            github_commit("c1", "first", "2024-01-01T00:00:00Z")
        )),
    );
    for hash in ["c3", "c2", "c1"] {
        http.push(
            &format!("https://raw.githubusercontent.com/pnggroup/libpng/{hash}/pngrutil.c"),
            HttpResponse::new(200).with_body(format!("/* {hash} */")),
        );
    }

    let mut config = Config::default();
    config.output.root = root.path().to_path_buf();
    let client = HistoryClient::with_transport(config, http.clone(), clock.clone());

    let outcome = client.fetch_history()?;
    assert!(outcome.is_complete());
    assert_eq!(outcome.value().commits, 3);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(45)]);

    let dir = root.path().join("libpng").join("pngrutil");
    assert_eq!(
        fs::read_to_string(dir.join("commits_hashes.txt"))?,
        "c3\nc2\nc1\n"
    );

    let records: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join("commits.json"))?)?;
    assert_eq!(records[1]["commit_hash"], "c2");
    assert_eq!(records[1]["commit_message"], "second");
    assert_eq!(records[1]["commit_time"], "2024-02-01T00:00:00+02:00");

    let report = client.download_snapshots()?;
    assert_eq!(report.saved.len(), 3);
    assert!(report.failed.is_empty());
    assert_eq!(
        fs::read_to_string(dir.join("downloads").join("pngrutil-c1.c"))?,
        "/* c1 */"
    );
    assert_eq!(http.remaining(), 0);

    Ok(())
}

#[test]
fn test_github_since_commit_is_passed_as_sha() -> Result<()> {
    let root = TempDir::new()?;
    let http = Arc::new(ScriptedClient::new());
    http.push(
        "https://api.github.com/repos/pnggroup/libpng/commits?path=pngrutil.c&sha=abc123",
        HttpResponse::new(200).with_body("[]"),
    );

    let mut config = Config::default();
    config.repository.since_commit = Some("abc123".to_string());
    config.output.root = root.path().to_path_buf();
    let client = HistoryClient::with_transport(config, http.clone(), Arc::new(ManualClock::new(0)));

    let outcome = client.fetch_history()?;
    assert!(outcome.is_complete());
    assert_eq!(outcome.value().commits, 0);

    // An empty history still leaves empty output files behind
    assert_eq!(fs::read_to_string(&outcome.value().hash_file)?, "");
    assert_eq!(fs::read_to_string(&outcome.value().records_file)?.trim(), "[]");
    Ok(())
}

#[test]
fn test_gitlab_unknown_since_commit_is_reported() -> Result<()> {
    let root = TempDir::new()?;
    let http = Arc::new(ScriptedClient::new());
    let commits = |page: u32| {
        format!(
            "https://gitlab.com/api/v4/projects/42/repository/commits?path=libtiff%2Ftif_dirwrite.c&page={page}&per_page=100"
        )
    };

    http.push(
        "https://gitlab.com/api/v4/projects/libtiff%2Flibtiff",
        HttpResponse::new(200).with_body(r#"{"id":42,"name":"libtiff"}"#),
    );
    http.push(
        &commits(1),
        HttpResponse::new(200).with_body(format!(
            "[{},{}]",
            gitlab_commit("aaa", "2021-01-02T00:00:00.000+01:00"),
            gitlab_commit("bbb", "2021-01-01T00:00:00.000+01:00")
        )),
    );
    http.push(&commits(2), HttpResponse::new(200).with_body("[]"));

    let mut config = Config::default();
    config.repository.provider = Provider::GitLab;
    config.repository.owner = "libtiff".to_string();
    config.repository.name = "libtiff".to_string();
    config.repository.file_path = "libtiff/tif_dirwrite.c".to_string();
    config.repository.since_commit = Some("zzz".to_string());
    config.output.root = root.path().to_path_buf();
    let client = HistoryClient::with_transport(config, http, Arc::new(ManualClock::new(0)));

    let outcome = client.fetch_history()?;
    assert_eq!(
        outcome.reason(),
        Some(&FetchError::SinceCommitNotFound("zzz".to_string()))
    );
    assert_eq!(outcome.value().commits, 0);

    // Nothing was admitted, so nothing was written
    let hash_file = root.path().join("libtiff").join("tif_dirwrite").join("commits.txt");
    assert!(!hash_file.exists());
    Ok(())
}

#[test]
fn test_rate_limit_exhaustion_stops_fetch() -> Result<()> {
    let root = TempDir::new()?;
    let http = Arc::new(ScriptedClient::new());
    let clock = Arc::new(ManualClock::new(0));
    let url = "https://api.github.com/repos/pnggroup/libpng/commits?path=pngrutil.c";
    // The first request plus two retries
    for _ in 0..3 {
        http.push(url, HttpResponse::new(429));
    }

    let mut config = Config::default();
    config.retry.max_attempts = 2;
    config.output.root = root.path().to_path_buf();
    let client = HistoryClient::with_transport(config, http, clock.clone());

    let outcome = client.fetch_history()?;
    assert!(matches!(
        outcome.reason(),
        Some(FetchError::RateLimitExhausted { .. })
    ));
    assert_eq!(outcome.value().commits, 0);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(60); 2]);
    Ok(())
}

#[test]
fn test_config_file_drives_client() -> Result<()> {
    let root = TempDir::new()?;
    let config_path = root.path().join("file-history.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[repository]
provider = "gitlab"
owner = "group"
name = "proj"
file_path = "src/main.c"

[http]
api_base_url = "https://git.example.com"
raw_base_url = "https://git.example.com"

[output]
root = "{}"
"#,
            root.path().display()
        ),
    )?;

    let config = Config::from_file(&config_path)?;
    config.validate()?;
    let http = Arc::new(ScriptedClient::new());
    fs::create_dir_all(root.path().join("proj").join("main"))?;
    fs::write(root.path().join("proj").join("main").join("commits.txt"), "h1\n")?;
    http.push(
        "https://git.example.com/group/proj/-/raw/h1/src/main.c",
        HttpResponse::new(200).with_body("int main(void);"),
    );

    let client = HistoryClient::with_transport(config, http, Arc::new(ManualClock::new(0)));
    let report = client.download_snapshots()?;

    assert_eq!(report.saved.len(), 1);
    assert!(report.saved[0].ends_with("proj/main/downloads/main-h1.c"));
    Ok(())
}
