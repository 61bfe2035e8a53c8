//! Webhook ingestion.
//!
//! Every delivery walks the same state machine:
//!
//! ```text
//! received ──verify──▶ verified ──route──▶ dispatched ──▶ handled
//!     │                    │                    └───────▶ handler_failed
//!     └────────────────────┴──▶ rejected
//! ```
//!
//! The raw body is never parsed before its signature is checked. Unknown
//! event types are handled trivially. Handlers are idempotent and nothing
//! here deduplicates by event id; a failed handler surfaces as a 500 and
//! the sender's own retry is the recovery path.

mod commerce;
mod payment;

pub use commerce::{CommerceHeaders, CommerceTopic, DELIVERY_ID_HEADER, TOPIC_HEADER};
pub use payment::PaymentEventKind;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::services::{OrderReconciler, ReconcileError, RevalidationService};
use crate::signature::{SignatureError, WebhookVerifier};

/// Where a delivery came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Payments,
    Commerce,
}

impl Source {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Payments => "payments",
            Self::Commerce => "commerce",
        }
    }
}

/// Lifecycle of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Received,
    Verified,
    Dispatched,
    Handled,
    HandlerFailed,
    Rejected,
}

impl DeliveryState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Verified => "verified",
            Self::Dispatched => "dispatched",
            Self::Handled => "handled",
            Self::HandlerFailed => "handler_failed",
            Self::Rejected => "rejected",
        }
    }

    /// Whether `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::Verified | Self::Rejected)
                | (Self::Verified, Self::Dispatched | Self::Rejected)
                | (Self::Dispatched, Self::Handled | Self::HandlerFailed)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Handled | Self::HandlerFailed | Self::Rejected)
    }
}

/// One webhook delivery and where it is in its lifecycle.
#[derive(Debug, Clone)]
pub struct Delivery {
    source: Source,
    event_id: Option<String>,
    event_type: Option<String>,
    received_at: DateTime<Utc>,
    state: DeliveryState,
}

impl Delivery {
    fn new(source: Source, received_at: DateTime<Utc>) -> Self {
        tracing::debug!(source = source.as_str(), "webhook received");
        Self {
            source,
            event_id: None,
            event_type: None,
            received_at,
            state: DeliveryState::Received,
        }
    }

    fn identify(&mut self, event_id: Option<String>, event_type: impl Into<String>) {
        self.event_id = event_id;
        self.event_type = Some(event_type.into());
    }

    fn advance(&mut self, next: DeliveryState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal delivery transition {:?} -> {next:?}",
            self.state
        );
        let event_id = self.event_id.as_deref().unwrap_or("-");
        let event_type = self.event_type.as_deref().unwrap_or("-");
        match next {
            DeliveryState::Rejected | DeliveryState::HandlerFailed => tracing::warn!(
                source = self.source.as_str(),
                event_id,
                event_type,
                from = self.state.as_str(),
                to = next.as_str(),
                "webhook transition"
            ),
            _ => tracing::info!(
                source = self.source.as_str(),
                event_id,
                event_type,
                from = self.state.as_str(),
                to = next.as_str(),
                "webhook transition"
            ),
        }
        self.state = next;
    }

    /// Reject the delivery and hand back `error`.
    fn reject(&mut self, error: WebhookError) -> WebhookError {
        self.advance(DeliveryState::Rejected);
        error
    }

    #[must_use]
    pub const fn source(&self) -> Source {
        self.source
    }

    #[must_use]
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    #[must_use]
    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    #[must_use]
    pub const fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    #[must_use]
    pub const fn state(&self) -> DeliveryState {
        self.state
    }
}

/// Errors that end a delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature verification failed.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The verified body is not a payload we understand.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Commerce delivery without a topic header.
    #[error("Missing webhook topic")]
    MissingTopic,

    /// Reconciliation failed upstream.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// Verifies and routes webhook deliveries.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    payment_verifier: WebhookVerifier,
    commerce_verifier: WebhookVerifier,
    reconciler: OrderReconciler,
    revalidation: RevalidationService,
}

impl WebhookDispatcher {
    #[must_use]
    pub const fn new(
        payment_verifier: WebhookVerifier,
        commerce_verifier: WebhookVerifier,
        reconciler: OrderReconciler,
        revalidation: RevalidationService,
    ) -> Self {
        Self {
            payment_verifier,
            commerce_verifier,
            reconciler,
            revalidation,
        }
    }

    /// Handle a payment provider delivery.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError`] if the delivery is rejected or its handler
    /// fails. The delivery's final state is logged either way.
    pub async fn handle_payment(
        &self,
        signature: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Delivery, WebhookError> {
        let mut delivery = Delivery::new(Source::Payments, now);

        if let Err(e) = self.payment_verifier.verify(signature, body, now) {
            return Err(delivery.reject(e.into()));
        }
        delivery.advance(DeliveryState::Verified);

        let event = match payment::parse(body) {
            Ok(event) => event,
            Err(e) => return Err(delivery.reject(e)),
        };
        delivery.identify(Some(event.id.clone()), event.event_type.clone());
        delivery.advance(DeliveryState::Dispatched);

        let result = payment::handle(&self.reconciler, &event).await;
        finish(delivery, result)
    }

    /// Handle a commerce backend delivery.
    ///
    /// The backend's registration ping carries neither topic nor signature
    /// and is acknowledged without verification; it triggers nothing.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError`] if the delivery is rejected or its handler
    /// fails.
    pub async fn handle_commerce(
        &self,
        headers: CommerceHeaders<'_>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Delivery, WebhookError> {
        let mut delivery = Delivery::new(Source::Commerce, now);
        let delivery_id = headers.delivery_id.map(ToString::to_string);

        let topic = headers.topic.map(str::trim).filter(|t| !t.is_empty());
        match topic {
            Some(topic) => delivery.identify(delivery_id, topic),
            None if commerce::is_ping(body) => delivery.identify(delivery_id, "ping"),
            None => return Err(delivery.reject(WebhookError::MissingTopic)),
        }

        // Pings are signed like any other delivery.
        if let Err(e) = self.commerce_verifier.verify(headers.signature, body, now) {
            return Err(delivery.reject(e.into()));
        }
        delivery.advance(DeliveryState::Verified);

        let Some(topic) = topic else {
            delivery.advance(DeliveryState::Dispatched);
            delivery.advance(DeliveryState::Handled);
            return Ok(delivery);
        };

        let topic = CommerceTopic::parse(topic);
        let payload = match commerce::parse(&topic, body) {
            Ok(payload) => payload,
            Err(e) => return Err(delivery.reject(e)),
        };
        delivery.advance(DeliveryState::Dispatched);

        commerce::handle(&self.revalidation, &topic, payload).await;
        finish(delivery, Ok(()))
    }
}

fn finish(mut delivery: Delivery, result: Result<(), WebhookError>) -> Result<Delivery, WebhookError> {
    match result {
        Ok(()) => {
            delivery.advance(DeliveryState::Handled);
            Ok(delivery)
        }
        Err(e) => {
            tracing::error!(error = %e, "webhook handler failed");
            delivery.advance(DeliveryState::HandlerFailed);
            Err(e)
        }
    }
}
