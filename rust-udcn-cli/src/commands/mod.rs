//! Subcommand implementations.

pub mod disk;
pub mod simulate;
