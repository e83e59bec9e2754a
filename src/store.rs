//! Persistence of fetched commit histories
//!
//! A history is kept twice: as a JSON array of [`CommitRecord`] and as a
//! plain hash list (one hash per line) that the snapshot downloader replays.

use crate::paths::OutputLayout;
use crate::types::CommitRecord;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

/// Receives commits as a fetcher admits them
pub trait CommitSink {
    fn accept(&mut self, record: &CommitRecord) -> Result<()>;
}

impl CommitSink for Vec<CommitRecord> {
    fn accept(&mut self, record: &CommitRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Streams hashes to a list file, one flushed line per commit
///
/// An interrupted run leaves a valid prefix of the history on disk. The
/// accepted records are kept as well so the JSON file can be written at the end.
pub struct HashListWriter {
    path: PathBuf,
    writer: LineWriter<File>,
    records: Vec<CommitRecord>,
}

impl HashListWriter {
    /// Create (or truncate) the hash list at `path`
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create history directory")?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create hash list {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: LineWriter::new(file),
            records: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far
    pub fn records(&self) -> &[CommitRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CommitRecord> {
        self.records
    }
}

impl CommitSink for HashListWriter {
    fn accept(&mut self, record: &CommitRecord) -> Result<()> {
        writeln!(self.writer, "{}", record.hash)
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        self.records.push(record.clone());
        Ok(())
    }
}

/// Hash list that is only created once the first commit arrives
///
/// Until then the previous run's file stays untouched, so a fetch that fails
/// before admitting anything cannot wipe an earlier history.
pub struct PendingHashList {
    path: PathBuf,
    writer: Option<HashListWriter>,
}

impl PendingHashList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file has been created (and truncated) by this run
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Make sure the list exists, empty if nothing was admitted, and return the records
    pub fn finish(self) -> Result<Vec<CommitRecord>> {
        match self.writer {
            Some(writer) => Ok(writer.into_records()),
            None => Ok(HashListWriter::create(&self.path)?.into_records()),
        }
    }
}

impl CommitSink for PendingHashList {
    fn accept(&mut self, record: &CommitRecord) -> Result<()> {
        let mut writer = match self.writer.take() {
            Some(writer) => writer,
            None => HashListWriter::create(&self.path)?,
        };
        let result = writer.accept(record);
        self.writer = Some(writer);
        result
    }
}

/// Reads and writes the files of one tracked file's history
#[derive(Debug, Clone)]
pub struct CommitStore {
    layout: OutputLayout,
}

impl CommitStore {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Write the JSON records file, replacing any previous run
    pub fn save_records(&self, records: &[CommitRecord]) -> Result<PathBuf> {
        let path = self.layout.records_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create history directory")?;
        }

        let content =
            serde_json::to_string_pretty(records).context("Failed to serialize commits")?;
        fs::write(&path, content).context("Failed to write commits file")?;

        tracing::info!("Commits have been saved to {}", path.display());
        Ok(path)
    }

    /// Write the hash list in one go, replacing any previous run
    pub fn save_hashes(&self, records: &[CommitRecord]) -> Result<PathBuf> {
        let mut writer = self.hash_writer()?;
        for record in records {
            writer.accept(record)?;
        }

        tracing::info!("Commit hashes have been saved to {}", writer.path().display());
        Ok(writer.path().to_path_buf())
    }

    /// Streaming writer over the hash list
    pub fn hash_writer(&self) -> Result<HashListWriter> {
        HashListWriter::create(&self.layout.hash_file())
    }

    /// Hash list writer that leaves the previous file alone until a commit arrives
    pub fn pending_hash_list(&self) -> PendingHashList {
        PendingHashList::new(self.layout.hash_file())
    }

    /// Load the JSON records file
    pub fn load_records(&self) -> Result<Vec<CommitRecord>> {
        let path = self.layout.records_file();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse commits file")
    }

    /// Load the hash list
    ///
    /// A missing file means nothing was fetched yet and yields an empty list.
    pub fn load_hashes(&self) -> Result<Vec<String>> {
        load_hashes(&self.layout.hash_file())
    }
}

/// Read a hash list file, skipping blank lines
pub fn load_hashes(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        tracing::info!("No hash list at {}, nothing to do", path.display());
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read hash list {}", path.display()))?;

    let hashes: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    tracing::debug!("Loaded {} commit hashes from {}", hashes.len(), path.display());
    Ok(hashes)
}
