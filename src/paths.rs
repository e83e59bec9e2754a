/// Centralized path computation
///
/// Platform config location plus the on-disk layout of fetched histories and
/// downloaded snapshots.
use crate::types::Provider;
use std::path::{Path, PathBuf};

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get default project-specific config directory
    ///
    /// Returns: {config_dir}/file-history, falling back to `.` when the
    /// platform has no config directory
    pub fn project_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("file-history")
    }

    /// Get default config file path
    ///
    /// Returns: {config_dir}/file-history/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }
}

/// Split the last segment of a repository path into (stem, extension)
///
/// The extension keeps its leading dot and is empty when there is none.
/// `dir/file.c` gives `("file", ".c")`, `.gitignore` gives `(".gitignore", "")`.
pub fn split_file_name(file_path: &str) -> (String, String) {
    let base = file_path.rsplit('/').next().unwrap_or(file_path);
    let path = Path::new(base);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| base.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, ext)
}

/// Files and directories used for one tracked (repository, file) pair
///
/// ```text
/// {root}/{repo_name}/{file_stem}/commits.json
/// {root}/{repo_name}/{file_stem}/commits_hashes.txt   (GitHub)
/// {root}/{repo_name}/{file_stem}/commits.txt          (GitLab)
/// {root}/{repo_name}/{file_stem}/downloads/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    dir: PathBuf,
    provider: Provider,
}

impl OutputLayout {
    pub fn new(root: &Path, repo_name: &str, file_path: &str, provider: Provider) -> Self {
        let (stem, _) = split_file_name(file_path);
        Self {
            dir: root.join(repo_name).join(stem),
            provider,
        }
    }

    /// Directory holding everything for this tracked file
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// JSON array of commit records
    pub fn records_file(&self) -> PathBuf {
        self.dir.join("commits.json")
    }

    /// One commit hash per line
    pub fn hash_file(&self) -> PathBuf {
        self.dir.join(self.provider.hash_list_name())
    }

    /// Destination of downloaded snapshots
    pub fn downloads_dir(&self) -> PathBuf {
        self.dir.join("downloads")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        let path = PlatformPaths::default_config_path();
        assert!(path.ends_with("file-history/config.toml"));
    }

    #[test]
    fn test_split_file_name() {
        assert_eq!(
            split_file_name("dir/file.c"),
            ("file".to_string(), ".c".to_string())
        );
        assert_eq!(
            split_file_name("pngrutil.c"),
            ("pngrutil".to_string(), ".c".to_string())
        );
        assert_eq!(
            split_file_name("a/b/archive.tar.gz"),
            ("archive.tar".to_string(), ".gz".to_string())
        );
        assert_eq!(
            split_file_name("Makefile"),
            ("Makefile".to_string(), String::new())
        );
        assert_eq!(
            split_file_name("conf/.gitignore"),
            (".gitignore".to_string(), String::new())
        );
    }

    #[test]
    fn test_github_layout() {
        let layout = OutputLayout::new(Path::new("out"), "libpng", "pngrutil.c", Provider::GitHub);
        assert_eq!(layout.dir(), Path::new("out/libpng/pngrutil"));
        assert_eq!(
            layout.records_file(),
            PathBuf::from("out/libpng/pngrutil/commits.json")
        );
        assert_eq!(
            layout.hash_file(),
            PathBuf::from("out/libpng/pngrutil/commits_hashes.txt")
        );
        assert_eq!(
            layout.downloads_dir(),
            PathBuf::from("out/libpng/pngrutil/downloads")
        );
    }

    #[test]
    fn test_gitlab_layout() {
        let layout = OutputLayout::new(
            Path::new("."),
            "libtiff",
            "libtiff/tif_dirwrite.c",
            Provider::GitLab,
        );
        assert_eq!(
            layout.hash_file(),
            PathBuf::from("./libtiff/tif_dirwrite/commits.txt")
        );
    }
}
