//! MK-010: Build-output store, where per-commit build data lives.
//!
//! The planner only asks two questions of a store: what the build-data
//! directory is called, and whether output exists for a given commit.

use std::path::PathBuf;

/// Name of the directory (under the store root) holding per-commit build data.
pub const BUILD_DATA_DIR_NAME: &str = ".mkplan-cache";

/// A persistent store of build outputs, keyed by commit.
pub trait BuildStore {
    /// Name of the build-data directory under the root.
    fn data_dir_name(&self) -> &str {
        BUILD_DATA_DIR_NAME
    }

    /// Whether build output has been stored for `commit`.
    fn build_data_exists(&self, commit: &str) -> Result<bool, String>;
}

/// Derive the per-commit build-data directory (slash-separated, relative to
/// the store root). Rule targets live underneath it.
pub fn build_data_dir(store: &dyn BuildStore, commit: &str) -> String {
    format!("{}/{}", store.data_dir_name(), commit)
}

/// A build store on the local filesystem:
/// `<root>/<BUILD_DATA_DIR_NAME>/<commit>/...`.
#[derive(Debug, Clone)]
pub struct LocalBuildStore {
    root: PathBuf,
}

impl LocalBuildStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute path of a commit's build-data directory.
    pub fn commit_path(&self, commit: &str) -> PathBuf {
        self.root.join(BUILD_DATA_DIR_NAME).join(commit)
    }
}

impl BuildStore for LocalBuildStore {
    fn build_data_exists(&self, commit: &str) -> Result<bool, String> {
        if commit.is_empty() || commit.contains('/') || commit == "." || commit == ".." {
            return Err(format!("invalid commit id: {:?}", commit));
        }
        let path = self.commit_path(commit);
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(format!("cannot stat {}: {}", path.display(), e)),
        }
    }
}
