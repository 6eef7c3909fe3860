//! Core planning logic: types, registry, cache rewriting, assembly, rendering.

pub mod cache;
pub mod parser;
pub mod planner;
pub mod registry;
pub mod render;
pub mod types;
