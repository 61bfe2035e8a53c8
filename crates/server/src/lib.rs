//! Checkout server library.
//!
//! Turns storefront carts into payment provider checkout sessions, turns
//! completed payments into commerce backend orders, keeps carts and
//! wishlists in sync across devices, and tells the rendering layer when
//! catalog pages go stale.
//!
//! The binary in `main.rs` wires real clients into [`state::AppState`];
//! tests wire in-process fakes through the same traits.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod best_effort;
pub mod commerce;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod payments;
pub mod routes;
pub mod services;
pub mod signature;
pub mod state;
pub mod store;
pub mod translate;
pub mod webhooks;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
