//! CLI command implementations.

pub mod admin;
pub mod products;
pub mod seed;
