//! MK-017: CLI subcommands: validate, plan, makers.

use crate::core::planner::{self, PlanConfig};
use crate::core::registry::RuleMakerRegistry;
use crate::core::{parser, render, types};
use crate::makers;
use crate::store::LocalBuildStore;
use crate::vcs::{self, Vcs};
use clap::{Args, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a tree config without touching the repository
    Validate {
        /// Path to the tree config
        #[arg(short, long, default_value = "mkplan.yaml")]
        file: PathBuf,
    },

    /// Assemble the build plan for a commit
    Plan(PlanArgs),

    /// List registered rule makers in invocation order
    Makers {
        /// Path to the tree config
        #[arg(short, long, default_value = "mkplan.yaml")]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Path to the tree config
    #[arg(short, long, default_value = "mkplan.yaml")]
    pub file: PathBuf,

    /// Commit to plan for (default: repository head). Caching only applies
    /// when this is the checked-out head
    #[arg(long)]
    pub commit: Option<String>,

    /// Build store root
    #[arg(long, default_value = ".")]
    pub store: PathBuf,

    /// Version control system of the repository
    #[arg(long, default_value = "git")]
    pub vcs: types::VcsKind,

    /// Repository working copy
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Never reuse outputs from prior builds
    #[arg(long)]
    pub no_cache: bool,

    /// Extra option passed through to toolchain commands
    #[arg(long, default_value = "")]
    pub exec_opt: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Make)]
    pub format: Format,

    /// Write the plan here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Plan output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Make,
    Json,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Plan(args) => cmd_plan(&args),
        Commands::Makers { file } => cmd_makers(&file),
    }
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let tree = parser::parse_tree_file(file)?;
    let errors = parser::validate_tree(&tree);

    if errors.is_empty() {
        println!(
            "OK: {} ({} source units, {} toolchains)",
            file.display(),
            tree.source_units.len(),
            tree.toolchains.len()
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

fn cmd_plan(args: &PlanArgs) -> Result<(), String> {
    let text = build_plan_text(args)?;
    match &args.output {
        Some(path) => std::fs::write(path, &text)
            .map_err(|e| format!("cannot write {}: {}", path.display(), e)),
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}

/// Assemble and render the plan described by `args`.
fn build_plan_text(args: &PlanArgs) -> Result<String, String> {
    let tree = parse_and_validate(&args.file)?;
    let registry = build_registry(&tree)?;
    let store = LocalBuildStore::new(&args.store);
    let repo = vcs::open(args.vcs, &args.repo);

    let (commit, no_cache) =
        resolve_commit(args.commit.as_deref(), repo.as_ref(), args.no_cache)?;

    let options = types::Options {
        toolchain_exec_opt: args.exec_opt.clone(),
        no_cache,
    };

    let plan = planner::create_plan(&PlanConfig {
        registry: &registry,
        store: &store,
        vcs: repo.as_ref(),
        commit_id: &commit,
        tree: &tree,
        options: &options,
    })
    .map_err(|e| e.to_string())?;

    match args.format {
        Format::Make => Ok(render::to_makefile(&plan)),
        Format::Json => render::to_json(&plan),
    }
}

/// Pick the commit to plan and whether caching stays off.
///
/// Prior revisions are found by walking back from the checked-out head, so a
/// commit other than head is planned without cache. When head can't be read
/// the rewriter degrades on its own.
fn resolve_commit(
    requested: Option<&str>,
    repo: &dyn Vcs,
    no_cache: bool,
) -> Result<(String, bool), String> {
    let Some(commit) = requested else {
        let head = repo
            .head()
            .map_err(|e| format!("cannot determine head commit: {}", e))?;
        return Ok((head, no_cache));
    };
    if no_cache {
        return Ok((commit.to_string(), true));
    }
    match repo.head() {
        Ok(head) if head != commit => {
            warn!(
                commit,
                head = %head,
                "commit is not checked out, planning without cache"
            );
            Ok((commit.to_string(), true))
        }
        _ => Ok((commit.to_string(), false)),
    }
}

fn cmd_makers(file: &Path) -> Result<(), String> {
    let tree = parse_and_validate(file)?;
    let registry = build_registry(&tree)?;
    for (i, name) in registry.names().iter().enumerate() {
        println!("{:>3}. {}", i + 1, name);
    }
    Ok(())
}

/// Parse and validate a tree config file, returning errors if invalid.
fn parse_and_validate(file: &Path) -> Result<types::TreeConfig, String> {
    let tree = parser::parse_tree_file(file)?;
    let errors = parser::validate_tree(&tree);
    if errors.is_empty() {
        return Ok(tree);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

fn build_registry(tree: &types::TreeConfig) -> Result<RuleMakerRegistry, String> {
    let mut registry = RuleMakerRegistry::new();
    makers::register_toolchains(tree, &mut registry).map_err(|e| e.to_string())?;
    Ok(registry)
}
