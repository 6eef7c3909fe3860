//! Rule makers: turn a tree config into build rules.
//!
//! Language toolchains plug in through [`RuleMaker`]; this module only
//! carries the declarative command maker driven by the tree config.

pub mod command;

use crate::core::registry::{RegistryError, RuleMakerRegistry};
use crate::core::types::TreeConfig;
use command::CommandMaker;

/// Register one [`CommandMaker`] per declared toolchain, in declaration order.
pub fn register_toolchains(
    tree: &TreeConfig,
    registry: &mut RuleMakerRegistry,
) -> Result<(), RegistryError> {
    for (name, decl) in &tree.toolchains {
        registry.try_register(name, Some(Box::new(CommandMaker::new(name, decl.clone()))))?;
    }
    Ok(())
}
