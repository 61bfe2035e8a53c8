//! CLI command implementations.

pub mod migrate;
pub mod revalidate;
pub mod sign;
