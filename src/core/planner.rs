//! MK-004: Plan assembly. Run every rule maker, rewrite for cache, frame.
//!
//! Makers run strictly in registration order; each sees the rules produced
//! by the makers before it. The assembled plan is:
//!
//! ```text
//! all: <every real target, in production order>
//! <maker 1 rules> <maker 2 rules> ...
//! .DELETE_ON_ERROR:
//! ```

use super::cache;
use super::registry::RuleMakerRegistry;
use super::types::*;
use crate::store::{self, BuildStore};
use crate::vcs::Vcs;
use tracing::{debug, info};

/// Assembly failure. Always fatal: no partial plan is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("rule maker {maker}: {message}")]
    RuleMaker { maker: String, message: String },
}

/// Everything needed to assemble a plan for one commit.
pub struct PlanConfig<'a> {
    pub registry: &'a RuleMakerRegistry,
    pub store: &'a dyn BuildStore,
    pub vcs: &'a dyn Vcs,
    pub commit_id: &'a str,
    pub tree: &'a TreeConfig,
    pub options: &'a Options,
}

/// Assemble the ordered build plan for `cfg.commit_id`.
pub fn create_plan(cfg: &PlanConfig) -> Result<Plan, PlanError> {
    let data_dir = store::build_data_dir(cfg.store, cfg.commit_id);

    let mut all_rules: Vec<Rule> = Vec::new();
    for (name, maker) in cfg.registry.iter() {
        let rules = maker
            .make_rules(cfg.tree, &data_dir, &all_rules, cfg.options)
            .map_err(|message| PlanError::RuleMaker {
                maker: name.to_string(),
                message,
            })?;
        debug!(maker = name, rules = rules.len(), "rule maker finished");

        let rules = if cfg.options.no_cache {
            rules
        } else {
            let (rules, outcome) = cache::rewrite_batch(rules, cfg.vcs, cfg.store, &data_dir);
            if outcome.substituted > 0 {
                debug!(
                    maker = name,
                    substituted = outcome.substituted,
                    "replaced rules with cached copies"
                );
            }
            rules
        };
        all_rules.extend(rules);
    }

    let plan = frame_rules(all_rules);
    info!(
        commit = cfg.commit_id,
        rules = plan.rules.len(),
        cached = plan.cached_count(),
        "plan assembled"
    );
    Ok(plan)
}

/// Prepend the umbrella `all` rule and append the `.DELETE_ON_ERROR` marker.
///
/// The marker tells the executing engine to delete a target whose recipe
/// failed, so recipes may write straight to `$@` without a half-written file
/// later passing for a valid input.
pub fn frame_rules(rules: Vec<Rule>) -> Plan {
    let all_targets: Vec<String> = rules.iter().map(|r| r.target().to_string()).collect();

    let mut framed = Vec::with_capacity(rules.len() + 2);
    framed.push(Rule::Basic(BasicRule::new(ALL_TARGET).with_prereqs(all_targets)));
    framed.extend(rules);
    framed.push(Rule::Basic(BasicRule::new(DELETE_ON_ERROR_TARGET)));

    Plan { rules: framed }
}
