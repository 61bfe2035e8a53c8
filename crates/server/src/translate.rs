//! Translation between storefront, payment provider and commerce line items.
//!
//! Pure functions only. Product identity crosses the payment provider as
//! string metadata on the provider product (`product_id`, `variation_id`,
//! `sku`) and is recovered from the expanded line items when the order is
//! reconciled.

use std::collections::BTreeMap;

use checkout_core::{CurrencyCode, Money, MoneyError, ProductId, VariationId};

use crate::commerce::{MetaData, OrderLine};
use crate::payments::{LineItemRequest, SessionLineItem};
use crate::services::checkout::CheckoutItem;

/// Provider product metadata key for the commerce product id.
pub const META_PRODUCT_ID: &str = "product_id";
/// Provider product metadata key for the commerce variation id.
pub const META_VARIATION_ID: &str = "variation_id";
/// Provider product metadata key for the SKU.
pub const META_SKU: &str = "sku";

/// Order line metadata: provider price id.
pub const META_PRICE_ID: &str = "_stripe_price_id";
/// Order line and order metadata: provider session id.
pub const META_SESSION_ID: &str = "_stripe_session_id";

/// Storefront item → provider line item.
///
/// # Errors
///
/// Returns [`MoneyError::Overflow`] if the unit price does not fit in minor
/// units.
pub fn to_provider_line(
    item: &CheckoutItem,
    currency: CurrencyCode,
) -> Result<LineItemRequest, MoneyError> {
    let unit_amount = Money::new(item.unit_price, currency).to_minor_units()?;

    let mut product_metadata = BTreeMap::new();
    product_metadata.insert(META_PRODUCT_ID.to_string(), item.product_id.to_string());
    if let Some(variation_id) = item.variation_id.filter(VariationId::is_valid) {
        product_metadata.insert(META_VARIATION_ID.to_string(), variation_id.to_string());
    }
    if let Some(sku) = item.sku.as_deref().filter(|s| !s.trim().is_empty()) {
        product_metadata.insert(META_SKU.to_string(), sku.trim().to_string());
    }

    Ok(LineItemRequest {
        name: item.name.clone(),
        quantity: item.quantity,
        unit_amount,
        images: item.image.iter().cloned().collect(),
        product_metadata,
    })
}

/// Provider line item → commerce order line.
///
/// Returns `None` when the product identity cannot be recovered: no
/// expanded product, no `product_id`, an unparsable id, or an id ≤ 0. A
/// missing or zero quantity is treated the same way.
#[must_use]
pub fn to_order_line(item: &SessionLineItem, session_id: &str) -> Option<OrderLine> {
    let price = item.price.as_ref()?;
    let metadata = price.product.metadata()?;

    let product_id = metadata
        .get(META_PRODUCT_ID)?
        .parse::<ProductId>()
        .ok()
        .filter(ProductId::is_valid)?;
    let variation_id = metadata
        .get(META_VARIATION_ID)
        .and_then(|raw| raw.parse::<VariationId>().ok())
        .filter(VariationId::is_valid);
    let quantity = item.quantity.filter(|q| *q > 0)?;
    let sku = metadata
        .get(META_SKU)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Some(OrderLine {
        product_id,
        variation_id,
        quantity,
        sku,
        meta_data: vec![
            MetaData::new(META_PRICE_ID, price.id.clone()),
            MetaData::new(META_SESSION_ID, session_id),
        ],
    })
}

/// Result of translating a whole session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedLines {
    pub lines: Vec<OrderLine>,
    /// Provider lines that could not be mapped back to a product.
    pub dropped: usize,
}

/// Translate every line of a session, keeping the ones that map back to a
/// product.
#[must_use]
pub fn to_order_lines(items: &[SessionLineItem], session_id: &str) -> TranslatedLines {
    let mut lines = Vec::with_capacity(items.len());
    let mut dropped = 0;

    for item in items {
        if let Some(line) = to_order_line(item, session_id) {
            lines.push(line);
        } else {
            dropped += 1;
            tracing::warn!(
                session_id,
                line_item_id = %item.id,
                description = item.description.as_deref().unwrap_or_default(),
                "dropping line item without recoverable product identity"
            );
        }
    }

    TranslatedLines { lines, dropped }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::payments::{ExpandableProduct, Price, Product};

    fn item(product: i64, variation: Option<i64>, quantity: u32, cents: i64) -> CheckoutItem {
        CheckoutItem {
            product_id: ProductId::new(product),
            variation_id: variation.map(VariationId::new),
            sku: Some("SKU-1".to_string()),
            name: "Linen Tee".to_string(),
            quantity,
            unit_price: Decimal::new(cents, 2),
            image: None,
        }
    }

    /// What the provider hands back for a line we created.
    fn echoed(line: &LineItemRequest, id: &str) -> SessionLineItem {
        SessionLineItem {
            id: id.to_string(),
            description: Some(line.name.clone()),
            quantity: Some(line.quantity),
            amount_total: Some(line.unit_amount * i64::from(line.quantity)),
            price: Some(Price {
                id: format!("price_{id}"),
                unit_amount: Some(line.unit_amount),
                product: ExpandableProduct::Expanded(Product {
                    id: format!("prod_{id}"),
                    name: Some(line.name.clone()),
                    metadata: line.product_metadata.clone(),
                }),
            }),
        }
    }

    fn with_metadata(pairs: &[(&str, &str)]) -> SessionLineItem {
        SessionLineItem {
            id: "li_x".to_string(),
            description: None,
            quantity: Some(1),
            amount_total: None,
            price: Some(Price {
                id: "price_x".to_string(),
                unit_amount: Some(100),
                product: ExpandableProduct::Expanded(Product {
                    id: "prod_x".to_string(),
                    name: None,
                    metadata: pairs
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect(),
                }),
            }),
        }
    }

    #[test]
    fn test_forward_single_item() {
        let line = to_provider_line(&item(1, None, 2, 4599), CurrencyCode::USD).unwrap();
        assert_eq!(line.unit_amount, 4599);
        assert_eq!(line.quantity, 2);
        assert_eq!(line.product_metadata[META_PRODUCT_ID], "1");
        assert_eq!(line.product_metadata[META_SKU], "SKU-1");
        assert!(!line.product_metadata.contains_key(META_VARIATION_ID));
    }

    #[test]
    fn test_round_trip_preserves_identity() {
        let original = item(17, Some(170), 3, 1250);
        let forward = to_provider_line(&original, CurrencyCode::USD).unwrap();
        let back = to_order_line(&echoed(&forward, "1"), "cs_1").unwrap();

        assert_eq!(back.product_id, original.product_id);
        assert_eq!(back.variation_id, original.variation_id);
        assert_eq!(back.quantity, original.quantity);
        assert_eq!(back.sku.as_deref(), Some("SKU-1"));
        assert_eq!(
            back.meta_data,
            vec![
                MetaData::new(META_PRICE_ID, "price_1"),
                MetaData::new(META_SESSION_ID, "cs_1"),
            ]
        );
    }

    #[test]
    fn test_reverse_drops_unrecoverable_products() {
        assert!(to_order_line(&with_metadata(&[]), "cs").is_none());
        assert!(to_order_line(&with_metadata(&[("product_id", "abc")]), "cs").is_none());
        assert!(to_order_line(&with_metadata(&[("product_id", "0")]), "cs").is_none());
        assert!(to_order_line(&with_metadata(&[("product_id", "-4")]), "cs").is_none());
        assert!(to_order_line(&with_metadata(&[("product_id", "4")]), "cs").is_some());
    }

    #[test]
    fn test_reverse_ignores_bad_variation() {
        for raw in ["0", "-1", "x"] {
            let line =
                to_order_line(&with_metadata(&[("product_id", "4"), ("variation_id", raw)]), "cs")
                    .unwrap();
            assert_eq!(line.variation_id, None);
        }
    }

    #[test]
    fn test_reverse_requires_expanded_product() {
        let mut line = with_metadata(&[("product_id", "4")]);
        line.price.as_mut().unwrap().product = ExpandableProduct::Id("prod_x".to_string());
        assert!(to_order_line(&line, "cs").is_none());

        line.price = None;
        assert!(to_order_line(&line, "cs").is_none());
    }

    #[test]
    fn test_batch_counts_dropped() {
        let items = vec![
            with_metadata(&[("product_id", "4")]),
            with_metadata(&[]),
            with_metadata(&[("product_id", "5")]),
        ];
        let translated = to_order_lines(&items, "cs_9");
        assert_eq!(translated.lines.len(), 2);
        assert_eq!(translated.dropped, 1);
    }
}
