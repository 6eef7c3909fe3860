//! MK-001: Core types for source units, rules, plans, options and tree config.
//!
//! Rules are a closed enum over the two variants the planner produces: a
//! basic rule emitted by a rule maker, and a cached-copy rule substituted by
//! the cache rewriter. Both expose the same target/prereqs/recipes surface;
//! the optional source unit is what gates cache eligibility.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target name of the umbrella rule prepended to every plan.
pub const ALL_TARGET: &str = "all";

/// Target name of the marker rule appended to every plan.
pub const DELETE_ON_ERROR_TARGET: &str = ".DELETE_ON_ERROR";

/// Width of the revision identifiers produced by git and hg.
pub const REVISION_LEN: usize = 40;

// ============================================================================
// Tree configuration
// ============================================================================

/// Root configuration: the source tree to plan for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Schema version (must be "1.0")
    #[serde(default = "default_version")]
    pub version: String,

    /// Analyzable source units, in declaration order
    #[serde(default)]
    pub source_units: Vec<SourceUnit>,

    /// Declarative toolchains (order-preserving; order = registration order)
    #[serde(default)]
    pub toolchains: IndexMap<String, ToolchainDecl>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// A discrete analyzable grouping of source files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Unit name (unique within a tree)
    pub name: String,

    /// Unit type (e.g. "GoPackage", "CommonJSPackage")
    #[serde(rename = "type", default)]
    pub unit_type: String,

    /// Directory containing the unit, relative to the repo root
    #[serde(default)]
    pub dir: Option<String>,

    /// Source files belonging to the unit
    #[serde(default)]
    pub files: Vec<String>,

    /// Names of units this unit depends on (informational)
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Ops to run on this unit, optionally pinned to a toolchain
    #[serde(default)]
    pub ops: IndexMap<String, Option<String>>,

    /// Commit at which this unit's output is still valid
    #[serde(default)]
    pub cached_rev: Option<String>,
}

impl SourceUnit {
    /// The reusable prior revision, if any. An empty string counts as none.
    pub fn cached_rev(&self) -> Option<&str> {
        self.cached_rev.as_deref().filter(|r| !r.is_empty())
    }

    /// Relative directory holding this unit's outputs: the unit name with
    /// empty, `.` and `..` segments dropped and the rest sanitized.
    pub fn output_dir(&self) -> String {
        let segments: Vec<String> = self
            .name
            .split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .map(sanitize_segment)
            .collect();
        if segments.is_empty() {
            "_".to_string()
        } else {
            segments.join("/")
        }
    }

    /// File stem of this unit's outputs: the sanitized unit type, or `unit`.
    pub fn output_stem(&self) -> String {
        if self.unit_type.is_empty() {
            "unit".to_string()
        } else {
            sanitize_segment(&self.unit_type)
        }
    }
}

fn sanitize_segment(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A toolchain declared in the tree config, turned into a command rule maker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainDecl {
    /// Op this toolchain performs (e.g. "graph")
    pub op: String,

    /// Recipe template; supports `{{unit.name}}`, `{{unit.type}}`,
    /// `{{unit.dir}}`, `{{target}}`, `{{prereqs}}`, `{{exec_opt}}`
    pub command: String,

    /// Output file suffix (e.g. "graph.json")
    pub suffix: String,

    /// Toolchains whose outputs for the same unit become prerequisites
    #[serde(default)]
    pub after: Vec<String>,
}

// ============================================================================
// Options
// ============================================================================

/// Planner options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Opaque setting passed through to rule makers unchanged
    pub toolchain_exec_opt: String,

    /// When true, every rule is rebuilt instead of only the ones associated
    /// with changed source units.
    pub no_cache: bool,
}

// ============================================================================
// Rules
// ============================================================================

/// A rule as produced by a rule maker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicRule {
    pub target: String,
    #[serde(default)]
    pub prereqs: Vec<String>,
    #[serde(default)]
    pub recipes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<SourceUnit>,
}

impl BasicRule {
    /// A rule with no prerequisites, recipes, or source unit.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            prereqs: Vec::new(),
            recipes: Vec::new(),
            unit: None,
        }
    }

    pub fn with_prereqs(mut self, prereqs: Vec<String>) -> Self {
        self.prereqs = prereqs;
        self
    }

    pub fn with_recipes(mut self, recipes: Vec<String>) -> Self {
        self.recipes = recipes;
        self
    }

    pub fn with_unit(mut self, unit: SourceUnit) -> Self {
        self.unit = Some(unit);
        self
    }
}

/// A rule that creates its target as a copy of an artifact from a prior
/// build. Meant for outputs whose source unit hasn't changed between commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRule {
    pub cached_path: String,
    pub target: String,
    #[serde(default)]
    pub prereqs: Vec<String>,
    pub unit: SourceUnit,
}

impl CachedRule {
    /// The single copy step. `cp` rather than `ln -s` so a missing cached
    /// artifact fails the recipe instead of leaving a dangling link.
    pub fn recipe(&self) -> String {
        format!("cp {} {}", self.cached_path, self.target)
    }
}

/// A build rule: target, ordered prerequisites, ordered recipe commands.
///
/// Serialized flat, with `recipes` always present so consumers never need
/// to know how a cached copy is performed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    Basic(BasicRule),
    Cached(CachedRule),
}

impl Rule {
    pub fn target(&self) -> &str {
        match self {
            Self::Basic(r) => &r.target,
            Self::Cached(r) => &r.target,
        }
    }

    pub fn prereqs(&self) -> &[String] {
        match self {
            Self::Basic(r) => &r.prereqs,
            Self::Cached(r) => &r.prereqs,
        }
    }

    pub fn recipes(&self) -> Vec<String> {
        match self {
            Self::Basic(r) => r.recipes.clone(),
            Self::Cached(r) => vec![r.recipe()],
        }
    }

    /// The source unit this rule was generated for, if any.
    pub fn source_unit(&self) -> Option<&SourceUnit> {
        match self {
            Self::Basic(r) => r.unit.as_ref(),
            Self::Cached(r) => Some(&r.unit),
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

#[derive(Serialize)]
struct RuleView<'a> {
    kind: &'static str,
    target: &'a str,
    prereqs: &'a [String],
    recipes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cached_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<&'a SourceUnit>,
}

impl Serialize for Rule {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (kind, cached_path) = match self {
            Self::Basic(_) => ("basic", None),
            Self::Cached(r) => ("cached", Some(r.cached_path.as_str())),
        };
        RuleView {
            kind,
            target: self.target(),
            prereqs: self.prereqs(),
            recipes: self.recipes(),
            cached_path,
            unit: self.source_unit(),
        }
        .serialize(serializer)
    }
}

impl From<BasicRule> for Rule {
    fn from(r: BasicRule) -> Self {
        Self::Basic(r)
    }
}

impl From<CachedRule> for Rule {
    fn from(r: CachedRule) -> Self {
        Self::Cached(r)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.target())?;
        for p in self.prereqs() {
            write!(f, " {}", p)?;
        }
        Ok(())
    }
}

// ============================================================================
// Plan
// ============================================================================

/// Full build plan: umbrella rule, real rules, delete-on-error marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub rules: Vec<Rule>,
}

impl Plan {
    /// Targets of every rule, in plan order.
    pub fn targets(&self) -> Vec<&str> {
        self.rules.iter().map(Rule::target).collect()
    }

    /// Number of cached-copy rules in the plan.
    pub fn cached_count(&self) -> usize {
        self.rules.iter().filter(|r| r.is_cached()).count()
    }
}

// ============================================================================
// VCS kind
// ============================================================================

/// Version-control system backing the repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VcsKind {
    #[default]
    Git,
    Hg,
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Hg => write!(f, "hg"),
        }
    }
}

impl std::str::FromStr for VcsKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(Self::Git),
            "hg" => Ok(Self::Hg),
            other => Err(format!("unknown VCS type: {}", other)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
