//! Checkout Core - Shared types library.
//!
//! This crate provides the types shared by every checkout component:
//! - `server` - Checkout, webhook, sync and revalidation HTTP service
//! - `cli` - Operator tooling (migrations, webhook signing, revalidation)
//! - `integration-tests` - End-to-end tests against in-process fakes
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, emails, addresses and sync snapshots

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
