//! Command-line surface of the `file-history` binary

use crate::client::HistoryClient;
use crate::config::Config;
use crate::error::HistoryError;
use crate::paths::PlatformPaths;
use crate::types::{FetchOutcome, FetchReport, Provider};
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// Collect the commit history of one file on GitHub or GitLab and download every revision
#[derive(Debug, Parser)]
#[command(name = "file-history", version, long_version = LONG_VERSION, about)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "FILE_HISTORY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the tracked repository and output location
#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    /// Hosting provider
    #[arg(long, global = true, value_enum)]
    pub provider: Option<Provider>,

    /// Repository owner or group
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Repository name
    #[arg(long, global = true)]
    pub repo: Option<String>,

    /// Path of the tracked file inside the repository
    #[arg(long, global = true)]
    pub path: Option<String>,

    /// Commit to start from (GitHub) or keep onwards from (GitLab)
    #[arg(long, global = true)]
    pub since: Option<String>,

    /// Output root directory
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

impl TargetArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(provider) = self.provider {
            config.repository.provider = provider;
        }
        if let Some(owner) = &self.owner {
            config.repository.owner = owner.clone();
        }
        if let Some(repo) = &self.repo {
            config.repository.name = repo.clone();
        }
        if let Some(path) = &self.path {
            config.repository.file_path = path.clone();
        }
        if let Some(since) = &self.since {
            config.repository.since_commit = Some(since.clone());
        }
        if let Some(output) = &self.output {
            config.output.root = output.clone();
        }
        if let Some(timeout) = self.timeout {
            config.http.timeout_secs = timeout;
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the commit history and save commits.json and the hash list
    Fetch,
    /// Download the file at every commit of the saved hash list
    Download,
    /// Fetch, then download
    Run,
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Write the effective configuration to the config file
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration as TOML
    Show,
}

impl Cli {
    /// Apply the config file, then the environment, then command-line flags, and validate
    pub fn load_config(&self) -> Result<Config, HistoryError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::load_or_default(&PlatformPaths::default_config_path())?,
        };
        config.apply_env_overrides();
        self.target.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(PlatformPaths::default_config_path)
    }

    /// Default `tracing` filter directive for this invocation
    pub fn log_directive(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

/// Execute the parsed command
pub async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return run_config(&cli, action);
    }

    let config = cli.load_config()?;
    let client = HistoryClient::new(config);

    match cli.command {
        Command::Fetch => fetch(client).await,
        Command::Download => download(client).await,
        Command::Run => {
            // A partial history is still worth downloading
            let fetched = fetch(client.clone()).await;
            download(client).await?;
            fetched
        }
        Command::Config { .. } => Ok(()),
    }
}

async fn fetch(client: HistoryClient) -> Result<()> {
    let outcome = tokio::task::spawn_blocking(move || client.fetch_history())
        .await
        .context("Failed to spawn blocking task for history fetch")??;

    log_fetch_report(&outcome);
    match outcome {
        FetchOutcome::Complete(_) => Ok(()),
        FetchOutcome::Partial(report, reason) => {
            bail!(
                "history of {} is incomplete ({} commits saved): {}",
                report.file_path,
                report.commits,
                reason
            )
        }
    }
}

async fn download(client: HistoryClient) -> Result<()> {
    let report = tokio::task::spawn_blocking(move || client.download_snapshots())
        .await
        .context("Failed to spawn blocking task for snapshot download")??;

    if !report.failed.is_empty() {
        tracing::warn!(
            "{} of {} revisions could not be downloaded",
            report.failed.len(),
            report.attempted()
        );
    }
    Ok(())
}

fn log_fetch_report(outcome: &FetchOutcome<FetchReport>) {
    let report = outcome.value();
    tracing::info!(
        "{}: {} commits of {} saved to {} in {}ms",
        report.repository,
        report.commits,
        report.file_path,
        report.records_file.display(),
        report.duration_ms
    );
}

fn run_config(cli: &Cli, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = cli.load_config()?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{}", rendered);
            Ok(())
        }
        ConfigAction::Init { force } => {
            let path = cli.config_path();
            if path.exists() && !force {
                bail!(
                    "{} already exists, pass --force to replace it",
                    path.display()
                );
            }

            let mut config = Config::default();
            config.apply_env_overrides();
            cli.target.apply(&mut config);
            config.validate()?;
            config.save(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch_with_overrides() {
        let cli = Cli::try_parse_from([
            "file-history",
            "fetch",
            "--provider",
            "gitlab",
            "--owner",
            "libtiff",
            "--repo",
            "libtiff",
            "--path",
            "libtiff/tif_dirwrite.c",
            "--since",
            "802d3cbf",
            "-o",
            "/tmp/out",
        ])
        .unwrap();

        assert!(matches!(cli.command, Command::Fetch));
        let mut config = Config::default();
        cli.target.apply(&mut config);

        assert_eq!(config.repository.provider, Provider::GitLab);
        assert_eq!(config.repository.owner, "libtiff");
        assert_eq!(config.repository.file_path, "libtiff/tif_dirwrite.c");
        assert_eq!(config.repository.since(), Some("802d3cbf"));
        assert_eq!(config.output.root, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_flags_before_subcommand() {
        let cli = Cli::try_parse_from(["file-history", "--verbose", "--timeout", "5", "run"])
            .unwrap();
        assert!(matches!(cli.command, Command::Run));
        assert_eq!(cli.log_directive(), "debug");
        assert_eq!(cli.target.timeout, Some(5));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(Cli::try_parse_from(["file-history", "fetch", "--provider", "svn"]).is_err());
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let cli = Cli::try_parse_from(["file-history", "download"]).unwrap();
        let mut config = Config::default();
        cli.target.apply(&mut config);
        assert_eq!(config.repository.owner, "pnggroup");
        assert_eq!(cli.log_directive(), "info");
    }

    #[test]
    fn test_config_init_subcommand() {
        let cli = Cli::try_parse_from([
            "file-history",
            "config",
            "init",
            "--force",
            "--config",
            "/tmp/fh.toml",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::Init { force: true }
            }
        ));
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/fh.toml"));
    }

    #[tokio::test]
    async fn test_config_init_then_show() {
        let _env = crate::config::ENV_LOCK
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let path_arg = path.to_str().unwrap();
        let parse = |args: &[&str]| {
            let mut argv = vec!["file-history", "--config", path_arg];
            argv.extend_from_slice(args);
            Cli::try_parse_from(argv).unwrap()
        };

        run(parse(&["config", "init", "--owner", "madler"]))
            .await
            .unwrap();
        assert!(path.exists());

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.repository.owner, "madler");

        // Existing file is kept unless forced
        assert!(run(parse(&["config", "init"])).await.is_err());
        run(parse(&["config", "init", "--force"])).await.unwrap();

        run(parse(&["config", "show"])).await.unwrap();
    }
}
