//! MK-012: Git adapter.

use super::{parse_lines, run_checked, Vcs, MAX_REVISIONS};
use crate::core::types::VcsKind;
use std::path::{Path, PathBuf};

/// A git working copy.
#[derive(Debug, Clone)]
pub struct GitRepo {
    dir: PathBuf,
}

impl GitRepo {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

impl Vcs for GitRepo {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn revisions(&self) -> Result<Vec<String>, String> {
        let max = format!("--max-count={}", MAX_REVISIONS);
        let out = run_checked("git", &self.dir, &["rev-list", &max, "HEAD"])?;
        Ok(parse_lines(&out))
    }

    fn changed_files(&self, since: &str) -> Result<Vec<String>, String> {
        let out = run_checked("git", &self.dir, &["diff", "--name-only", since, "HEAD"])?;
        Ok(parse_lines(&out))
    }

    fn head(&self) -> Result<String, String> {
        let out = run_checked("git", &self.dir, &["rev-parse", "HEAD"])?;
        parse_lines(&out)
            .into_iter()
            .next()
            .ok_or_else(|| "git rev-parse HEAD printed nothing".to_string())
    }
}
