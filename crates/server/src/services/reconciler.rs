//! Payment → order reconciliation.
//!
//! Runs once per completed checkout delivery. The webhook payload is only
//! trusted for the session id: payment status, metadata and line items are
//! re-fetched from the payment provider before anything is written to the
//! commerce backend. Order creation carries an idempotency key derived from
//! the session id, so duplicate deliveries converge on one order.

use std::sync::Arc;

use checkout_core::{Address, CustomerId, OrderId};
use thiserror::Error;
use tracing::instrument;

use crate::commerce::{CommerceBackend, CommerceError, CouponLine, MetaData, NewOrder, OrderLine};
use crate::payments::{CheckoutSession, PaymentError, PaymentProvider, PaymentStatus};
use crate::services::checkout::{META_BILLING, META_COUPON_CODE, META_SHIPPING, META_USER_ID};
use crate::translate::{self, META_SESSION_ID};

/// Order metadata key for the payment intent.
pub const META_PAYMENT_INTENT: &str = "_stripe_payment_intent";

const PAYMENT_METHOD: &str = "stripe";
const PAYMENT_METHOD_TITLE: &str = "Credit Card (Stripe)";

/// What reconciling a session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// An order exists for the session (created now or by an earlier
    /// delivery with the same idempotency key).
    Created { order_id: OrderId },
    /// No order was written.
    Skipped(SkipReason),
}

/// Why no order was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The session is not paid yet; a later event completes it.
    NotPaid(PaymentStatus),
    /// No line item could be mapped back to a product.
    NoValidLines { dropped: usize },
}

/// Errors that can occur while reconciling.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Payment provider error: {0}")]
    Payments(#[from] PaymentError),

    #[error("Commerce backend error: {0}")]
    Commerce(#[from] CommerceError),
}

/// Idempotency key of the order for `session_id`.
#[must_use]
pub fn idempotency_key(session_id: &str) -> String {
    format!("checkout-{session_id}")
}

/// Turns paid checkout sessions into commerce orders.
#[derive(Clone)]
pub struct OrderReconciler {
    payments: Arc<dyn PaymentProvider>,
    commerce: Arc<dyn CommerceBackend>,
}

impl OrderReconciler {
    #[must_use]
    pub fn new(payments: Arc<dyn PaymentProvider>, commerce: Arc<dyn CommerceBackend>) -> Self {
        Self { payments, commerce }
    }

    /// Reconcile the session with id `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] if re-fetching the session or creating
    /// the order fails. Callers surface this as a failed delivery so the
    /// provider re-delivers.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, session_id: &str) -> Result<ReconcileOutcome, ReconcileError> {
        let session = self.payments.retrieve_session(session_id).await?;
        if !session.payment_status.is_settled() {
            tracing::info!(
                payment_status = ?session.payment_status,
                "session not paid yet, skipping order"
            );
            return Ok(ReconcileOutcome::Skipped(SkipReason::NotPaid(
                session.payment_status,
            )));
        }

        let items = self.payments.list_line_items(session_id).await?;
        let translated = translate::to_order_lines(&items, session_id);
        if translated.lines.is_empty() {
            tracing::warn!(
                dropped = translated.dropped,
                "data integrity: no line item maps to a product, order not created"
            );
            return Ok(ReconcileOutcome::Skipped(SkipReason::NoValidLines {
                dropped: translated.dropped,
            }));
        }
        if translated.dropped > 0 {
            tracing::warn!(
                dropped = translated.dropped,
                kept = translated.lines.len(),
                "data integrity: creating partial order"
            );
        }

        let order = build_order(&session, translated.lines);
        let created = self
            .commerce
            .create_order(&order, &idempotency_key(session_id))
            .await?;

        tracing::info!(order_id = %created.id, "order reconciled");
        Ok(ReconcileOutcome::Created {
            order_id: created.id,
        })
    }
}

impl std::fmt::Debug for OrderReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderReconciler").finish_non_exhaustive()
    }
}

/// Commerce order for a paid session.
///
/// Addresses that fail to parse become empty addresses. The billing email
/// prefers what the customer confirmed on the hosted page.
#[must_use]
pub fn build_order(session: &CheckoutSession, lines: Vec<OrderLine>) -> NewOrder {
    let address = |key: &str| {
        session
            .metadata_value(key)
            .and_then(Address::from_metadata)
            .unwrap_or_default()
    };

    let billing = address(META_BILLING);
    let billing_email = session.captured_email().or_else(|| billing.email.clone());
    let billing = billing.with_email(billing_email);

    let customer_id = session
        .metadata_value(META_USER_ID)
        .and_then(|raw| raw.parse::<CustomerId>().ok())
        .filter(CustomerId::is_valid);

    let coupon_lines = session
        .metadata_value(META_COUPON_CODE)
        .map(|code| {
            vec![CouponLine {
                code: code.trim().to_string(),
            }]
        })
        .unwrap_or_default();

    let mut meta_data = vec![MetaData::new(META_SESSION_ID, session.id.clone())];
    if let Some(intent) = &session.payment_intent {
        meta_data.push(MetaData::new(META_PAYMENT_INTENT, intent.clone()));
    }

    NewOrder {
        payment_method: PAYMENT_METHOD.to_string(),
        payment_method_title: PAYMENT_METHOD_TITLE.to_string(),
        set_paid: true,
        transaction_id: session.payment_intent.clone(),
        customer_id,
        billing,
        shipping: address(META_SHIPPING),
        line_items: lines,
        coupon_lines,
        meta_data,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use checkout_core::{Email, ProductId};

    use super::*;
    use crate::payments::CustomerDetails;
    use crate::testing::{FakeCommerce, FakePayments, line_item, paid_session};

    fn reconciler() -> (OrderReconciler, Arc<FakePayments>, Arc<FakeCommerce>) {
        let payments = Arc::new(FakePayments::new());
        let commerce = Arc::new(FakeCommerce::new());
        let reconciler = OrderReconciler::new(payments.clone(), commerce.clone());
        (reconciler, payments, commerce)
    }

    const BILLING: &str = r#"{"first_name":"Ada","last_name":"Lovelace","email":"ada@example.com","country":"US"}"#;

    #[tokio::test]
    async fn test_paid_session_creates_order() {
        let (reconciler, payments, commerce) = reconciler();
        payments.serve(
            paid_session(
                "cs_1",
                &[
                    ("user_id", "17"),
                    ("coupon_code", "SUMMER10"),
                    ("billing", BILLING),
                    ("shipping", BILLING),
                ],
            ),
            vec![
                line_item("a", 2, &[("product_id", "11"), ("variation_id", "110")]),
                line_item("b", 1, &[("product_id", "12")]),
            ],
        );

        let outcome = reconciler.reconcile("cs_1").await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Created { .. }));

        let orders = commerce.orders();
        assert_eq!(orders.len(), 1);
        let (key, order) = &orders[0];
        assert_eq!(key, "checkout-cs_1");
        assert_eq!(order.line_items.len(), 2);
        assert_eq!(order.line_items[0].product_id, ProductId::new(11));
        assert_eq!(order.customer_id, Some(CustomerId::new(17)));
        assert_eq!(order.coupon_lines, vec![CouponLine { code: "SUMMER10".to_string() }]);
        assert_eq!(order.transaction_id.as_deref(), Some("pi_test_1"));
        assert_eq!(order.shipping.first_name, "Ada");
        assert!(order.set_paid);
    }

    #[tokio::test]
    async fn test_unrecoverable_metadata_creates_no_order() {
        let (reconciler, payments, commerce) = reconciler();
        payments.serve(
            paid_session("cs_2", &[]),
            vec![
                line_item("a", 1, &[]),
                line_item("b", 1, &[("product_id", "not-a-number")]),
            ],
        );

        let outcome = reconciler.reconcile("cs_2").await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Skipped(SkipReason::NoValidLines { dropped: 2 })
        );
        assert!(commerce.orders().is_empty());
    }

    #[tokio::test]
    async fn test_unpaid_session_is_skipped() {
        let (reconciler, payments, commerce) = reconciler();
        let mut session = paid_session("cs_3", &[]);
        session.payment_status = PaymentStatus::Unpaid;
        payments.serve(session, vec![line_item("a", 1, &[("product_id", "1")])]);

        let outcome = reconciler.reconcile("cs_3").await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Skipped(SkipReason::NotPaid(PaymentStatus::Unpaid))
        );
        assert!(commerce.orders().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_delivery_converges_on_one_order() {
        let (reconciler, payments, commerce) = reconciler();
        payments.serve(
            paid_session("cs_4", &[]),
            vec![line_item("a", 1, &[("product_id", "1")])],
        );

        let first = reconciler.reconcile("cs_4").await.unwrap();
        let second = reconciler.reconcile("cs_4").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(commerce.orders().len(), 1);
    }

    #[tokio::test]
    async fn test_upstream_failures_propagate() {
        let (reconciler, payments, commerce) = reconciler();
        payments.serve(
            paid_session("cs_5", &[]),
            vec![line_item("a", 1, &[("product_id", "1")])],
        );

        commerce.set_failing(true);
        let err = reconciler.reconcile("cs_5").await.unwrap_err();
        assert!(matches!(err, ReconcileError::Commerce(_)));

        let err = reconciler.reconcile("cs_other").await.unwrap_err();
        assert!(matches!(err, ReconcileError::Payments(PaymentError::NotFound(_))));
    }

    #[test]
    fn test_build_order_prefers_captured_email() {
        let mut session = paid_session("cs_6", &[("billing", BILLING)]);
        session.customer_details = Some(CustomerDetails {
            email: Some("confirmed@example.com".to_string()),
            ..CustomerDetails::default()
        });

        let order = build_order(&session, vec![]);
        assert_eq!(
            order.billing.email,
            Some(Email::parse("confirmed@example.com").unwrap())
        );
        assert_eq!(order.billing.first_name, "Ada");
    }

    #[test]
    fn test_build_order_degrades_bad_metadata() {
        let session = paid_session(
            "cs_7",
            &[("billing", "{not json"), ("user_id", "user-abc")],
        );
        let order = build_order(&session, vec![]);

        assert_eq!(order.shipping, Address::default());
        assert_eq!(order.billing.first_name, "");
        assert_eq!(order.customer_id, None);
        assert!(order.coupon_lines.is_empty());
        assert_eq!(
            order.meta_data,
            vec![
                MetaData::new(META_SESSION_ID, "cs_7"),
                MetaData::new(META_PAYMENT_INTENT, "pi_test_1"),
            ]
        );
    }
}
