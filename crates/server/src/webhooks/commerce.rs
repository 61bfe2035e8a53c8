//! Commerce backend webhooks.
//!
//! The topic travels in `X-WC-Webhook-Topic` as `resource.event`. Product
//! changes invalidate rendered pages; order events are informational since
//! the orders were written by this service in the first place.

use crate::commerce::{OrderPayload, ProductPayload};
use crate::services::RevalidationService;

use super::WebhookError;

/// Header carrying the topic.
pub const TOPIC_HEADER: &str = "x-wc-webhook-topic";
/// Header carrying the backend's delivery id.
pub const DELIVERY_ID_HEADER: &str = "x-wc-webhook-delivery-id";

/// Headers of a commerce delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommerceHeaders<'a> {
    pub topic: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub delivery_id: Option<&'a str>,
}

/// Webhook topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommerceTopic {
    OrderCreated,
    OrderUpdated,
    OrderDeleted,
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    Other(String),
}

impl CommerceTopic {
    #[must_use]
    pub fn parse(topic: &str) -> Self {
        match topic {
            "order.created" => Self::OrderCreated,
            "order.updated" => Self::OrderUpdated,
            "order.deleted" => Self::OrderDeleted,
            "product.created" => Self::ProductCreated,
            "product.updated" => Self::ProductUpdated,
            "product.deleted" => Self::ProductDeleted,
            other => Self::Other(other.to_string()),
        }
    }

    const fn is_product(&self) -> bool {
        matches!(
            self,
            Self::ProductCreated | Self::ProductUpdated | Self::ProductDeleted
        )
    }

    const fn is_order(&self) -> bool {
        matches!(
            self,
            Self::OrderCreated | Self::OrderUpdated | Self::OrderDeleted
        )
    }
}

/// Registration pings are form-encoded `webhook_id=<n>`.
pub(super) fn is_ping(body: &[u8]) -> bool {
    body.starts_with(b"webhook_id=")
}

pub(super) enum Payload {
    Product(ProductPayload),
    Order(OrderPayload),
    Ignored,
}

pub(super) fn parse(topic: &CommerceTopic, body: &[u8]) -> Result<Payload, WebhookError> {
    let malformed = |e: serde_json::Error| WebhookError::MalformedPayload(e.to_string());
    if topic.is_product() {
        return serde_json::from_slice(body).map(Payload::Product).map_err(malformed);
    }
    if topic.is_order() {
        return serde_json::from_slice(body).map(Payload::Order).map_err(malformed);
    }
    Ok(Payload::Ignored)
}

pub(super) async fn handle(revalidation: &RevalidationService, topic: &CommerceTopic, payload: Payload) {
    match (topic, payload) {
        (CommerceTopic::ProductDeleted, Payload::Product(product)) => {
            tracing::info!(product_id = %product.id, "product deleted");
            // Outcome already logged.
            let _ = revalidation.product_deleted().await;
        }
        (_, Payload::Product(product)) => {
            tracing::info!(
                product_id = %product.id,
                slug = product.slug.as_deref(),
                status = product.status.as_deref(),
                "product changed"
            );
            let _ = revalidation.product_changed(product.slug.as_deref()).await;
        }
        (_, Payload::Order(order)) => {
            tracing::info!(
                ?topic,
                order_id = %order.id,
                status = order.status.as_deref(),
                "order event"
            );
        }
        (_, Payload::Ignored) => {
            tracing::debug!(?topic, "ignoring topic");
        }
    }
}
