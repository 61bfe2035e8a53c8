//! Business logic between the HTTP layer and the external clients.
//!
//! Services hold `Arc<dyn ...>` handles on the clients they need and no
//! other state, so they are cheap to clone into [`AppState`](crate::state::AppState).

pub mod checkout;
pub mod reconciler;
pub mod revalidation;
pub mod sync;

pub use checkout::{CheckoutError, CheckoutItem, CheckoutRequest, CheckoutResponse, CheckoutService};
pub use reconciler::{OrderReconciler, ReconcileError, ReconcileOutcome, SkipReason};
pub use revalidation::{HttpRevalidator, RevalidationError, RevalidationService, Revalidator};
pub use sync::{SyncError, SyncService};
