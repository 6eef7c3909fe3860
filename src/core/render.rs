//! MK-006: Plan rendering.
//!
//! Makefile output is consumed by a make-compatible engine; JSON output is
//! for tooling that wants the rule list with source units attached.

use super::types::{Plan, Rule};
use std::fmt::Write;

/// Render a plan as a Makefile.
///
/// Each rule becomes `target: prereq...` followed by tab-indented recipe
/// lines. A multi-line recipe is split into one recipe line per line.
pub fn to_makefile(plan: &Plan) -> String {
    let mut out = String::new();
    for (i, rule) in plan.rules.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_rule(&mut out, rule);
    }
    out
}

fn write_rule(out: &mut String, rule: &Rule) {
    // Writing to a String cannot fail.
    let _ = write!(out, "{}:", rule.target());
    for prereq in rule.prereqs() {
        let _ = write!(out, " {}", prereq);
    }
    out.push('\n');
    for recipe in rule.recipes() {
        for line in recipe.lines().filter(|l| !l.trim().is_empty()) {
            let _ = writeln!(out, "\t{}", line);
        }
    }
}

/// Render a plan as pretty-printed JSON.
pub fn to_json(plan: &Plan) -> Result<String, String> {
    serde_json::to_string_pretty(plan).map_err(|e| format!("JSON encode error: {}", e))
}
