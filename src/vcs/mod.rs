//! MK-011: Version-control abstraction for revision listing and file diffs.
//!
//! The planner needs an ordered revision list (most recent first) and the
//! set of files changed since a prior revision. Git and Mercurial are
//! supported by shelling out to their binaries.

pub mod git;
pub mod hg;

use crate::core::types::VcsKind;
use std::path::Path;
use std::process::{Command, Stdio};

/// Upper bound on how many revisions are scanned for reusable build data.
pub const MAX_REVISIONS: usize = 50;

/// A version-control facility for one repository.
pub trait Vcs {
    fn kind(&self) -> VcsKind;

    /// Known revisions, most recent first. The first entry is the commit
    /// currently checked out.
    fn revisions(&self) -> Result<Vec<String>, String>;

    /// Files changed between `since` and the current commit.
    fn changed_files(&self, since: &str) -> Result<Vec<String>, String>;

    /// The commit currently checked out.
    fn head(&self) -> Result<String, String>;
}

/// Open the repository at `dir` with the given VCS.
pub fn open(kind: VcsKind, dir: &Path) -> Box<dyn Vcs> {
    match kind {
        VcsKind::Git => Box::new(git::GitRepo::new(dir)),
        VcsKind::Hg => Box::new(hg::HgRepo::new(dir)),
    }
}

/// Output from running a VCS command.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `program args...` in `dir`, capturing output.
pub fn run(program: &str, dir: &Path, args: &[&str]) -> Result<CmdOutput, String> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| format!("failed to spawn {}: {}", program, e))?;

    Ok(CmdOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Run a command and return its stdout, failing on non-zero exit.
pub fn run_checked(program: &str, dir: &Path, args: &[&str]) -> Result<String, String> {
    let out = run(program, dir, args)?;
    if !out.success() {
        return Err(format!(
            "{} {} exited with {}: {}",
            program,
            args.join(" "),
            out.exit_code,
            out.stderr.trim()
        ));
    }
    Ok(out.stdout)
}

/// Split command output into non-empty trimmed lines.
pub fn parse_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
