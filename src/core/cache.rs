//! MK-003: Cache rewriting. Swap recomputation for copies of prior output.
//!
//! For each batch of freshly generated rules, find the most recent prior
//! revision that has build data in the store, then replace every rule whose
//! source unit names a cached revision with a [`CachedRule`] that copies the
//! artifact built at that revision. Targets and prerequisites are never
//! touched, so the dependency graph keeps its shape.
//!
//! Lookup failures degrade to "no rewriting" for the batch; they are logged,
//! never returned.

use super::types::{CachedRule, Rule, REVISION_LEN};
use crate::store::BuildStore;
use crate::vcs::Vcs;
use tracing::{debug, warn};

/// A rule target split into path segments, with the index of the segment
/// that names a commit (if the target lives inside a per-commit build-data
/// directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPath {
    segments: Vec<String>,
    commit_segment: Option<usize>,
}

impl TargetPath {
    /// Classify `target` relative to the build-data directory `data_dir`
    /// (e.g. `.mkplan-cache/<commit>`).
    ///
    /// A target is inside a per-commit directory, with the commit at segment
    /// 1, when it has more than two segments, when its first two segments are
    /// `data_dir`, or when its second segment is revision-width.
    pub fn parse(target: &str, data_dir: &str) -> Self {
        let segments: Vec<String> = target.split('/').map(str::to_string).collect();
        let in_commit_dir = segments.len() > 2
            || (segments.len() == 2
                && (segments.join("/") == data_dir || segments[1].len() == REVISION_LEN));
        Self {
            commit_segment: if in_commit_dir { Some(1) } else { None },
            segments,
        }
    }

    /// The same artifact as built at `rev`.
    ///
    /// Inside a per-commit directory the commit segment is swapped for `rev`;
    /// otherwise the path is taken relative to the sibling checkout
    /// `../<rev>`.
    pub fn at_revision(&self, rev: &str) -> String {
        match self.commit_segment {
            Some(i) => {
                let mut segments = self.segments.clone();
                segments[i] = rev.to_string();
                segments.join("/")
            }
            None => {
                let mut segments = vec!["..".to_string(), rev.to_string()];
                segments.extend(self.segments.iter().cloned());
                segments.join("/")
            }
        }
    }
}

/// Path of the artifact for `target` as built at `rev`.
pub fn cached_artifact_path(target: &str, rev: &str, data_dir: &str) -> String {
    TargetPath::parse(target, data_dir).at_revision(rev)
}

/// A prior revision whose build output can be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorRevision {
    pub rev: String,
    /// Files changed between `rev` and the current commit.
    pub changed_files: Vec<String>,
}

/// What happened to one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub prior: Option<PriorRevision>,
    pub substituted: usize,
}

/// Find the most recent revision (skipping the current one) that has build
/// data in `store`, along with the files changed since.
///
/// `Ok(None)` means no candidate has build data. Errors come from revision
/// listing or diffing; a failed existence check only disqualifies that
/// candidate.
pub fn find_prior_revision(
    vcs: &dyn Vcs,
    store: &dyn BuildStore,
) -> Result<Option<PriorRevision>, String> {
    let revs = vcs
        .revisions()
        .map_err(|e| format!("error listing revisions: {}", e))?;

    for rev in revs.iter().skip(1) {
        match store.build_data_exists(rev) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                debug!(rev = %rev, error = %e, "build data check failed, skipping revision");
                continue;
            }
        }
        let changed_files = vcs
            .changed_files(rev)
            .map_err(|e| format!("error retrieving changed files since {}: {}", rev, e))?;
        return Ok(Some(PriorRevision {
            rev: rev.clone(),
            changed_files,
        }));
    }

    Ok(None)
}

/// Replace every rule whose source unit has a cached revision with a
/// copy-from-cache rule. Returns the batch and the number of substitutions.
pub fn substitute_cached(rules: Vec<Rule>, data_dir: &str) -> (Vec<Rule>, usize) {
    let mut substituted = 0;
    let rules = rules
        .into_iter()
        .map(|rule| {
            let Some(unit) = rule.source_unit() else {
                return rule;
            };
            let Some(rev) = unit.cached_rev() else {
                return rule;
            };
            let cached_path = cached_artifact_path(rule.target(), rev, data_dir);
            debug!(rule = rule.target(), cached = %cached_path, "reusing cached artifact");
            substituted += 1;
            Rule::Cached(CachedRule {
                cached_path,
                target: rule.target().to_string(),
                prereqs: rule.prereqs().to_vec(),
                unit: unit.clone(),
            })
        })
        .collect();
    (rules, substituted)
}

/// Rewrite one batch against the store. The batch comes back unmodified when
/// no prior revision is usable.
pub fn rewrite_batch(
    rules: Vec<Rule>,
    vcs: &dyn Vcs,
    store: &dyn BuildStore,
    data_dir: &str,
) -> (Vec<Rule>, RewriteOutcome) {
    let prior = match find_prior_revision(vcs, store) {
        Ok(Some(prior)) => prior,
        Ok(None) => {
            debug!(vcs = %vcs.kind(), "no prior revision with build data");
            return (rules, RewriteOutcome::default());
        }
        Err(e) => {
            warn!(error = %e, "rebuilding from scratch");
            return (rules, RewriteOutcome::default());
        }
    };

    // Eligibility is decided by each unit's cached revision alone; the
    // changed-file set is reported but not consulted.
    debug!(
        prior = %prior.rev,
        changed = prior.changed_files.len(),
        "found prior build"
    );
    let (rules, substituted) = substitute_cached(rules, data_dir);
    (
        rules,
        RewriteOutcome {
            prior: Some(prior),
            substituted,
        },
    )
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::core::types::VcsKind;
    use std::cell::Cell;
    use std::collections::HashSet;

    /// In-memory VCS with a scripted revision list and diff.
    pub struct FakeVcs {
        pub revs: Result<Vec<String>, String>,
        pub diff: Result<Vec<String>, String>,
        pub diff_calls: Cell<usize>,
    }

    impl FakeVcs {
        pub fn with_revs(revs: &[&str]) -> Self {
            Self {
                revs: Ok(revs.iter().map(|r| r.to_string()).collect()),
                diff: Ok(vec!["changed.go".to_string()]),
                diff_calls: Cell::new(0),
            }
        }
    }

    impl Vcs for FakeVcs {
        fn kind(&self) -> VcsKind {
            VcsKind::Git
        }

        fn revisions(&self) -> Result<Vec<String>, String> {
            self.revs.clone()
        }

        fn changed_files(&self, _since: &str) -> Result<Vec<String>, String> {
            self.diff_calls.set(self.diff_calls.get() + 1);
            self.diff.clone()
        }

        fn head(&self) -> Result<String, String> {
            self.revs
                .clone()?
                .into_iter()
                .next()
                .ok_or_else(|| "empty".to_string())
        }
    }

    /// In-memory store that has build data for a fixed set of commits.
    pub struct FakeStore {
        pub built: HashSet<String>,
        pub broken: HashSet<String>,
    }

    impl FakeStore {
        pub fn with_built(built: &[&str]) -> Self {
            Self {
                built: built.iter().map(|r| r.to_string()).collect(),
                broken: HashSet::new(),
            }
        }
    }

    impl BuildStore for FakeStore {
        fn build_data_exists(&self, commit: &str) -> Result<bool, String> {
            if self.broken.contains(commit) {
                return Err(format!("store unavailable for {}", commit));
            }
            Ok(self.built.contains(commit))
        }
    }
}
