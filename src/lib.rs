//! mkplan: incremental build-plan assembler.
//!
//! Rule makers turn a tree of source units into build rules. Rules whose
//! unit is unchanged since a prior build are rewritten into copies of that
//! build's output. The result is a make-compatible plan.

pub mod cli;
pub mod core;
pub mod makers;
pub mod store;
pub mod vcs;
