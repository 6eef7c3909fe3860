//! MK-005: Tree config parsing and validation.
//!
//! Parses a tree YAML file and validates structural constraints:
//! - Version must be "1.0"
//! - Unit names are non-empty and unique, also once sanitized into output
//!   directories
//! - Cached revisions, when set, are full-width hex commit ids
//! - Ops requested by units have a toolchain; pinned toolchains exist and
//!   perform that op
//! - Toolchain `after` references name toolchains declared earlier
//! - Toolchains performing different ops use different suffixes, so no two
//!   ops write the same file

use super::types::*;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn error(message: String) -> ValidationError {
    ValidationError { message }
}

/// Parse a tree config file from disk.
pub fn parse_tree_file(path: &Path) -> Result<TreeConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_tree(&content)
}

/// Parse a tree config from a string.
pub fn parse_tree(yaml: &str) -> Result<TreeConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Whether `rev` looks like a full git/hg commit id.
pub fn is_full_revision(rev: &str) -> bool {
    rev.len() == REVISION_LEN && rev.chars().all(|c| c.is_ascii_hexdigit())
}

/// Validate a parsed tree. Returns a list of errors (empty = valid).
pub fn validate_tree(tree: &TreeConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if tree.version != "1.0" {
        errors.push(error(format!(
            "version must be \"1.0\", got \"{}\"",
            tree.version
        )));
    }

    let mut seen = HashSet::new();
    let mut output_dirs: HashMap<String, &str> = HashMap::new();
    for unit in &tree.source_units {
        if unit.name.is_empty() {
            errors.push(error("source unit name must not be empty".to_string()));
        } else if !seen.insert(unit.name.as_str()) {
            errors.push(error(format!("duplicate source unit '{}'", unit.name)));
        } else if let Some(other) = output_dirs.insert(unit.output_dir(), unit.name.as_str()) {
            errors.push(error(format!(
                "source units '{}' and '{}' share output directory '{}'",
                other,
                unit.name,
                unit.output_dir()
            )));
        }

        if let Some(rev) = unit.cached_rev() {
            if !is_full_revision(rev) {
                errors.push(error(format!(
                    "unit '{}' has cached_rev '{}', expected a {}-char hex commit id",
                    unit.name, rev, REVISION_LEN
                )));
            }
        }

        for (op, pinned) in &unit.ops {
            match pinned {
                Some(name) => match tree.toolchains.get(name) {
                    None => errors.push(error(format!(
                        "unit '{}' pins op '{}' to unknown toolchain '{}'",
                        unit.name, op, name
                    ))),
                    Some(decl) if &decl.op != op => errors.push(error(format!(
                        "unit '{}' pins op '{}' to toolchain '{}', which performs '{}'",
                        unit.name, op, name, decl.op
                    ))),
                    Some(_) => {}
                },
                None => {
                    if !tree.toolchains.values().any(|d| &d.op == op) {
                        errors.push(error(format!(
                            "unit '{}' requests op '{}' but no toolchain performs it",
                            unit.name, op
                        )));
                    }
                }
            }
        }
    }

    let mut suffixes: HashMap<&str, (&str, &str)> = HashMap::new();
    for (index, (name, decl)) in tree.toolchains.iter().enumerate() {
        if decl.op.is_empty() {
            errors.push(error(format!("toolchain '{}' has no op", name)));
        }
        if decl.suffix.is_empty() {
            errors.push(error(format!("toolchain '{}' has no suffix", name)));
        } else {
            match suffixes.get(decl.suffix.as_str()) {
                Some((other, op)) if *op != decl.op => errors.push(error(format!(
                    "toolchains '{}' and '{}' share suffix '{}'",
                    other, name, decl.suffix
                ))),
                Some(_) => {}
                None => {
                    suffixes.insert(decl.suffix.as_str(), (name.as_str(), decl.op.as_str()));
                }
            }
        }
        for dep in &decl.after {
            if dep == name {
                errors.push(error(format!("toolchain '{}' runs after itself", name)));
                continue;
            }
            match tree.toolchains.get_index_of(dep) {
                None => errors.push(error(format!(
                    "toolchain '{}' runs after unknown toolchain '{}'",
                    name, dep
                ))),
                Some(i) if i > index => errors.push(error(format!(
                    "toolchain '{}' runs after '{}', which is declared later",
                    name, dep
                ))),
                Some(_) => {}
            }
        }
    }

    errors
}
