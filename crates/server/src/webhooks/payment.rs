//! Payment provider events.

use crate::payments::PaymentEvent;
use crate::services::{OrderReconciler, ReconcileOutcome, SkipReason};

use super::WebhookError;

/// Event types this service acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventKind {
    /// `checkout.session.completed`
    CheckoutCompleted,
    /// `checkout.session.async_payment_succeeded`
    AsyncPaymentSucceeded,
    /// `checkout.session.expired`
    CheckoutExpired,
    /// `payment_intent.succeeded`
    PaymentSucceeded,
    /// `payment_intent.payment_failed`
    PaymentFailed,
    /// Anything else.
    Other,
}

impl PaymentEventKind {
    #[must_use]
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" => Self::CheckoutCompleted,
            "checkout.session.async_payment_succeeded" => Self::AsyncPaymentSucceeded,
            "checkout.session.expired" => Self::CheckoutExpired,
            "payment_intent.succeeded" => Self::PaymentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentFailed,
            _ => Self::Other,
        }
    }
}

pub(super) fn parse(body: &[u8]) -> Result<PaymentEvent, WebhookError> {
    serde_json::from_slice(body).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
}

pub(super) async fn handle(
    reconciler: &OrderReconciler,
    event: &PaymentEvent,
) -> Result<(), WebhookError> {
    match PaymentEventKind::parse(&event.event_type) {
        PaymentEventKind::CheckoutCompleted | PaymentEventKind::AsyncPaymentSucceeded => {
            let session_id = event.object_id().ok_or_else(|| {
                WebhookError::MalformedPayload("checkout event without session id".to_string())
            })?;
            match reconciler.reconcile(session_id).await? {
                ReconcileOutcome::Created { order_id } => {
                    tracing::info!(event_id = %event.id, session_id, %order_id, "checkout reconciled");
                }
                ReconcileOutcome::Skipped(SkipReason::NotPaid(status)) => {
                    tracing::info!(event_id = %event.id, session_id, ?status, "awaiting payment");
                }
                ReconcileOutcome::Skipped(SkipReason::NoValidLines { dropped }) => {
                    tracing::warn!(
                        event_id = %event.id,
                        session_id,
                        dropped,
                        "checkout acknowledged without order"
                    );
                }
            }
        }
        PaymentEventKind::CheckoutExpired => {
            tracing::info!(event_id = %event.id, session_id = event.object_id(), "checkout session expired");
        }
        PaymentEventKind::PaymentSucceeded => {
            tracing::info!(event_id = %event.id, payment_intent = event.object_id(), "payment succeeded");
        }
        PaymentEventKind::PaymentFailed => {
            tracing::warn!(
                event_id = %event.id,
                payment_intent = event.object_id(),
                reason = event.last_payment_error().unwrap_or("unknown"),
                "payment failed"
            );
        }
        PaymentEventKind::Other => {
            tracing::debug!(event_id = %event.id, event_type = %event.event_type, "ignoring event");
        }
    }
    Ok(())
}
