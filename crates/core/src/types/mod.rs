//! Core types for the checkout service.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod email;
pub mod id;
pub mod price;
pub mod snapshot;

pub use address::Address;
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Money, MoneyError};
pub use snapshot::{
    CartLine, CartSnapshot, Snapshot, SnapshotError, SnapshotKind, WishlistItem,
    WishlistSnapshot,
};
