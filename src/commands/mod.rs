//! CLI command implementations.

pub mod count;
pub mod stats;
pub mod update;
