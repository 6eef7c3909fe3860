//! MK-002: Rule-maker registry.
//!
//! An explicit, order-preserving table of named rule makers. It is built once
//! during wiring and then lent immutably to the planner, so registration can
//! never race with plan assembly.

use super::types::{Options, Rule, TreeConfig};
use indexmap::IndexMap;

/// A function that creates build rules for a repository.
///
/// `existing` holds every rule produced by makers registered earlier, so a
/// maker may depend on outputs of the ones before it.
pub trait RuleMaker {
    fn make_rules(
        &self,
        tree: &TreeConfig,
        data_dir: &str,
        existing: &[Rule],
        opt: &Options,
    ) -> Result<Vec<Rule>, String>;
}

impl<F> RuleMaker for F
where
    F: Fn(&TreeConfig, &str, &[Rule], &Options) -> Result<Vec<Rule>, String>,
{
    fn make_rules(
        &self,
        tree: &TreeConfig,
        data_dir: &str,
        existing: &[Rule],
        opt: &Options,
    ) -> Result<Vec<Rule>, String> {
        self(tree, data_dir, existing, opt)
    }
}

/// Registry misuse. Always a wiring defect, never a runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("rule maker name must not be empty")]
    EmptyName,

    #[error("register called twice for rule maker {0}")]
    Duplicate(String),

    #[error("rule maker {0} is absent")]
    MissingMaker(String),
}

/// Named rule makers in registration order.
#[derive(Default)]
pub struct RuleMakerRegistry {
    makers: IndexMap<String, Box<dyn RuleMaker>>,
}

impl RuleMakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule maker under `name`.
    ///
    /// # Panics
    ///
    /// If `name` is empty or already registered.
    pub fn register<M: RuleMaker + 'static>(&mut self, name: &str, maker: M) {
        if let Err(e) = self.try_register(name, Some(Box::new(maker))) {
            panic!("mkplan: {}", e);
        }
    }

    /// Fallible twin of [`register`](Self::register). `None` models an
    /// absent maker.
    pub fn try_register(
        &mut self,
        name: &str,
        maker: Option<Box<dyn RuleMaker>>,
    ) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.makers.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        let maker = maker.ok_or_else(|| RegistryError::MissingMaker(name.to_string()))?;
        self.makers.insert(name.to_string(), maker);
        Ok(())
    }

    /// Makers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn RuleMaker)> {
        self.makers.iter().map(|(n, m)| (n.as_str(), m.as_ref()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.makers.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn RuleMaker> {
        self.makers.get(name).map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.makers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.makers.is_empty()
    }
}

impl std::fmt::Debug for RuleMakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleMakerRegistry")
            .field("makers", &self.names())
            .finish()
    }
}
