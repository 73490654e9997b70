//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod inspect;
pub mod load;
