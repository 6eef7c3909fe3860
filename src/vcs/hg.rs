//! MK-013: Mercurial adapter.

use super::{parse_lines, run_checked, Vcs, MAX_REVISIONS};
use crate::core::types::VcsKind;
use std::path::{Path, PathBuf};

/// A Mercurial working copy.
#[derive(Debug, Clone)]
pub struct HgRepo {
    dir: PathBuf,
}

impl HgRepo {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

impl Vcs for HgRepo {
    fn kind(&self) -> VcsKind {
        VcsKind::Hg
    }

    fn revisions(&self) -> Result<Vec<String>, String> {
        let limit = MAX_REVISIONS.to_string();
        let out = run_checked(
            "hg",
            &self.dir,
            &["log", "-r", "reverse(::.)", "-l", &limit, "--template", "{node}\\n"],
        )?;
        Ok(parse_lines(&out))
    }

    fn changed_files(&self, since: &str) -> Result<Vec<String>, String> {
        let out = run_checked(
            "hg",
            &self.dir,
            &["status", "--rev", since, "--rev", ".", "--no-status"],
        )?;
        Ok(parse_lines(&out))
    }

    fn head(&self) -> Result<String, String> {
        let out = run_checked("hg", &self.dir, &["log", "-r", ".", "--template", "{node}"])?;
        parse_lines(&out)
            .into_iter()
            .next()
            .ok_or_else(|| "hg log -r . printed nothing".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mk013_kind() {
        let repo = HgRepo::new(Path::new("/nonexistent"));
        assert_eq!(repo.kind(), VcsKind::Hg);
    }

    #[test]
    fn test_mk013_missing_repo_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = HgRepo::new(tmp.path());
        // Either hg is missing (spawn error) or the dir is not a repo.
        assert!(repo.revisions().is_err());
        assert!(repo.head().is_err());
    }
}
