//! Bazaar Core - Shared domain types.
//!
//! This crate provides the types used across all Bazaar components:
//! - `backend` - Document store and auth provider adapters
//! - `storefront` - Shopper-facing cart, catalog and checkout API
//! - `admin` - Catalog management panel
//! - `cli` - Seeding and account bootstrap tools
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! backend clients, no HTTP. Everything durable lives in the hosted
//! backend; these types describe the documents stored there.
//!
//! # Modules
//!
//! - [`types`] - IDs, emails, money, statuses, products, cart lines and orders

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
