//! Checkout session creation.
//!
//! Validates a storefront cart, converts it into payment provider line
//! items and opens a hosted checkout session. Everything the order will
//! later need but the provider does not model (user, coupon, addresses)
//! travels in the session metadata and is read back by the reconciler.

use std::collections::BTreeMap;
use std::sync::Arc;

use checkout_core::{
    Address, CurrencyCode, Email, MoneyError, ProductId, UserId, VariationId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::best_effort::BestEffort;
use crate::commerce::{CommerceBackend, Coupon};
use crate::config::CheckoutConfig;
use crate::payments::{CreateSessionRequest, PaymentError, PaymentProvider};
use crate::translate;

/// Session metadata key for the originating user.
pub const META_USER_ID: &str = "user_id";
/// Session metadata key for the coupon code.
pub const META_COUPON_CODE: &str = "coupon_code";
/// Session metadata key for the JSON billing address.
pub const META_BILLING: &str = "billing";
/// Session metadata key for the JSON shipping address.
pub const META_SHIPPING: &str = "shipping";

/// Placeholder the provider replaces with the session id on redirect.
const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// One storefront cart item submitted for checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub variation_id: Option<VariationId>,
    #[serde(default)]
    pub sku: Option<String>,
    pub name: String,
    pub quantity: u32,
    /// Unit price in the store currency's standard unit.
    pub unit_price: Decimal,
    #[serde(default)]
    pub image: Option<String>,
}

/// Body of `POST /api/checkout/session`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<CheckoutItem>,
    #[serde(default)]
    pub billing: Option<Address>,
    #[serde(default)]
    pub shipping: Option<Address>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

/// Where to send the customer next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub redirect_url: String,
}

/// Errors that can occur when creating a checkout session.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Missing {0} address")]
    MissingAddress(&'static str),

    #[error("Invalid item {index}: {reason}")]
    InvalidItem { index: usize, reason: String },

    #[error("Billing address must include a valid email")]
    MissingEmail,

    #[error("Invalid redirect URL: {0}")]
    InvalidRedirectUrl(String),

    #[error("Payment provider error: {0}")]
    Payments(#[from] PaymentError),
}

/// Builds and opens checkout sessions.
#[derive(Clone)]
pub struct CheckoutService {
    payments: Arc<dyn PaymentProvider>,
    commerce: Arc<dyn CommerceBackend>,
    currency: CurrencyCode,
    base_url: String,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        payments: Arc<dyn PaymentProvider>,
        commerce: Arc<dyn CommerceBackend>,
        config: &CheckoutConfig,
    ) -> Self {
        Self {
            payments,
            commerce,
            currency: config.currency,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Validate the cart and open a hosted checkout session.
    ///
    /// Nothing is sent to the payment provider unless validation passes.
    ///
    /// # Errors
    ///
    /// Returns a validation variant of [`CheckoutError`] for a bad cart, or
    /// [`CheckoutError::Payments`] if the provider call fails.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn create_session(
        &self,
        request: &CheckoutRequest,
        user_id: Option<&UserId>,
    ) -> Result<CheckoutResponse, CheckoutError> {
        let session_request = self.build_session_request(request, user_id)?;

        if let Some(code) = session_request.metadata.get(META_COUPON_CODE) {
            // Outcome is logged either way; the code is carried regardless.
            let _ = self.check_coupon(code).await;
        }

        let created = self
            .payments
            .create_checkout_session(&session_request)
            .await?;
        let redirect_url = created.url.ok_or_else(|| {
            PaymentError::Parse(format!("session {} has no redirect URL", created.id))
        })?;

        tracing::info!(
            session_id = %created.id,
            amount_total = session_request.amount_total(),
            "checkout session created"
        );

        Ok(CheckoutResponse {
            session_id: created.id,
            redirect_url,
        })
    }

    /// Validate a cart and build the provider request for it.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure, checked in this order: empty
    /// cart, missing addresses, invalid items, missing billing email,
    /// redirect URLs outside the storefront.
    pub fn build_session_request(
        &self,
        request: &CheckoutRequest,
        user_id: Option<&UserId>,
    ) -> Result<CreateSessionRequest, CheckoutError> {
        if request.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let billing = request
            .billing
            .as_ref()
            .ok_or(CheckoutError::MissingAddress("billing"))?;
        let shipping = request
            .shipping
            .as_ref()
            .ok_or(CheckoutError::MissingAddress("shipping"))?;

        let line_items = request
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                validate_item(item).map_err(|reason| CheckoutError::InvalidItem {
                    index,
                    reason: reason.to_string(),
                })?;
                translate::to_provider_line(item, self.currency).map_err(|e| {
                    CheckoutError::InvalidItem {
                        index,
                        reason: money_reason(&e),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let email: Email = billing.email.clone().ok_or(CheckoutError::MissingEmail)?;

        let success_url = self.redirect_url(
            request.success_url.as_deref(),
            format!(
                "{}/checkout/success?session_id={SESSION_ID_PLACEHOLDER}",
                self.base_url
            ),
        )?;
        let cancel_url =
            self.redirect_url(request.cancel_url.as_deref(), format!("{}/cart", self.base_url))?;

        let mut metadata = BTreeMap::new();
        if let Some(user_id) = user_id {
            metadata.insert(META_USER_ID.to_string(), user_id.to_string());
        }
        if let Some(code) = request
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            metadata.insert(META_COUPON_CODE.to_string(), code.to_string());
        }
        metadata.insert(META_BILLING.to_string(), billing.to_metadata());
        metadata.insert(META_SHIPPING.to_string(), shipping.to_metadata());

        Ok(CreateSessionRequest {
            currency: self.currency,
            line_items,
            success_url,
            cancel_url,
            customer_email: Some(email),
            client_reference_id: user_id.map(ToString::to_string),
            metadata,
        })
    }

    /// Look the coupon up on the commerce backend.
    ///
    /// Unknown or unusable coupons are logged; the backend applies the
    /// final validation when the order is created.
    pub async fn check_coupon(&self, code: &str) -> BestEffort<Option<Coupon>> {
        let outcome =
            BestEffort::from_result("coupon_lookup", self.commerce.find_coupon(code).await);
        match &outcome {
            BestEffort::Done(Some(coupon)) if !coupon.is_usable() => {
                tracing::warn!(code, "coupon is expired or exhausted");
            }
            BestEffort::Done(None) => tracing::warn!(code, "coupon not found"),
            _ => {}
        }
        outcome
    }

    /// An override must stay on the storefront's origin.
    fn redirect_url(&self, requested: Option<&str>, default: String) -> Result<String, CheckoutError> {
        let Some(requested) = requested.map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(default);
        };

        let invalid = || CheckoutError::InvalidRedirectUrl(requested.to_string());
        let base = Url::parse(&self.base_url).map_err(|_| invalid())?;
        let url = Url::parse(requested).map_err(|_| invalid())?;
        if url.origin() != base.origin() {
            return Err(invalid());
        }
        Ok(requested.to_string())
    }
}

impl std::fmt::Debug for CheckoutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutService")
            .field("currency", &self.currency)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

fn validate_item(item: &CheckoutItem) -> Result<(), &'static str> {
    if !item.product_id.is_valid() {
        return Err("product id must be positive");
    }
    if item.quantity == 0 {
        return Err("quantity must be at least 1");
    }
    if item.unit_price <= Decimal::ZERO {
        return Err("unit price must be positive");
    }
    if item.name.trim().is_empty() {
        return Err("name is required");
    }
    Ok(())
}

fn money_reason(error: &MoneyError) -> String {
    match error {
        MoneyError::Overflow(_) => "unit price is out of range".to_string(),
        MoneyError::UnsupportedCurrency(code) => format!("unsupported currency {code}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use checkout_core::Money;

    use super::*;
    use crate::testing::{FakeCommerce, FakePayments, coupon, sample_config};

    fn service() -> (CheckoutService, Arc<FakePayments>, Arc<FakeCommerce>) {
        let payments = Arc::new(FakePayments::new());
        let commerce = Arc::new(FakeCommerce::new());
        let service = CheckoutService::new(payments.clone(), commerce.clone(), &sample_config());
        (service, payments, commerce)
    }

    fn item(product: i64, quantity: u32, cents: i64) -> CheckoutItem {
        CheckoutItem {
            product_id: ProductId::new(product),
            variation_id: None,
            sku: None,
            name: format!("Product {product}"),
            quantity,
            unit_price: Decimal::new(cents, 2),
            image: None,
        }
    }

    fn address() -> Address {
        Address {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            address_1: "1 Main St".to_string(),
            city: "Portland".to_string(),
            postcode: "97201".to_string(),
            country: "US".to_string(),
            email: Some(Email::parse("ada@example.com").unwrap()),
            ..Address::default()
        }
    }

    fn request(items: Vec<CheckoutItem>) -> CheckoutRequest {
        CheckoutRequest {
            items,
            billing: Some(address()),
            shipping: Some(address().with_email(None)),
            ..CheckoutRequest::default()
        }
    }

    #[test]
    fn test_single_item_line() {
        let (service, _, _) = service();
        let built = service
            .build_session_request(&request(vec![item(1, 2, 4599)]), None)
            .unwrap();

        assert_eq!(built.line_items.len(), 1);
        assert_eq!(built.line_items[0].unit_amount, 4599);
        assert_eq!(built.line_items[0].quantity, 2);
    }

    #[test]
    fn test_line_amounts_sum_to_cart_total() {
        let (service, _, _) = service();
        let items = vec![item(1, 2, 4599), item(2, 1, 1), item(3, 7, 1250)];
        let cart_total: Decimal = items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();

        let built = service.build_session_request(&request(items), None).unwrap();

        assert_eq!(built.line_items.len(), 3);
        assert_eq!(
            built.amount_total(),
            Some(
                Money::new(cart_total, CurrencyCode::USD)
                    .to_minor_units()
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_metadata_carries_context() {
        let (service, _, _) = service();
        let user = UserId::parse("42").unwrap();
        let mut req = request(vec![item(1, 1, 100)]);
        req.coupon_code = Some("  SUMMER10 ".to_string());

        let built = service.build_session_request(&req, Some(&user)).unwrap();

        assert_eq!(built.metadata[META_USER_ID], "42");
        assert_eq!(built.metadata[META_COUPON_CODE], "SUMMER10");
        assert_eq!(
            Address::from_metadata(&built.metadata[META_BILLING]),
            Some(address())
        );
        assert_eq!(built.client_reference_id.as_deref(), Some("42"));
        assert_eq!(
            built.customer_email.as_ref().map(Email::as_str),
            Some("ada@example.com")
        );
        assert_eq!(
            built.success_url,
            "https://shop.test/checkout/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(built.cancel_url, "https://shop.test/cart");
    }

    #[test]
    fn test_validation_errors() {
        let (service, _, _) = service();

        let err = service.build_session_request(&request(vec![]), None).unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));

        let mut req = request(vec![item(1, 1, 100)]);
        req.shipping = None;
        let err = service.build_session_request(&req, None).unwrap_err();
        assert!(matches!(err, CheckoutError::MissingAddress("shipping")));

        for bad in [item(1, 0, 100), item(1, 1, 0), item(1, 1, -5), item(0, 1, 100)] {
            let err = service
                .build_session_request(&request(vec![item(9, 1, 100), bad]), None)
                .unwrap_err();
            assert!(matches!(err, CheckoutError::InvalidItem { index: 1, .. }));
        }

        let mut req = request(vec![item(1, 1, 100)]);
        req.billing = Some(address().with_email(None));
        let err = service.build_session_request(&req, None).unwrap_err();
        assert!(matches!(err, CheckoutError::MissingEmail));
    }

    #[test]
    fn test_redirect_overrides_must_stay_on_storefront() {
        let (service, _, _) = service();

        let mut req = request(vec![item(1, 1, 100)]);
        req.success_url = Some("https://shop.test/thanks".to_string());
        let built = service.build_session_request(&req, None).unwrap();
        assert_eq!(built.success_url, "https://shop.test/thanks");

        req.cancel_url = Some("https://evil.test/cart".to_string());
        let err = service.build_session_request(&req, None).unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidRedirectUrl(_)));
    }

    #[tokio::test]
    async fn test_empty_cart_never_calls_provider() {
        let (service, payments, _) = service();
        let err = service
            .create_session(&request(vec![]), None)
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::EmptyCart));
        assert!(payments.created_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_create_session_returns_redirect() {
        let (service, payments, _) = service();
        let response = service
            .create_session(&request(vec![item(1, 2, 4599)]), None)
            .await
            .unwrap();

        assert_eq!(response.session_id, "cs_test_1");
        assert!(response.redirect_url.contains("cs_test_1"));
        assert_eq!(payments.created_sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_coupon_failure_does_not_block_checkout() {
        let (service, payments, commerce) = service();
        commerce.set_failing(true);

        let mut req = request(vec![item(1, 1, 100)]);
        req.coupon_code = Some("SUMMER10".to_string());
        service.create_session(&req, None).await.unwrap();

        let created = payments.created_sessions();
        assert_eq!(created[0].metadata[META_COUPON_CODE], "SUMMER10");
    }

    #[tokio::test]
    async fn test_check_coupon() {
        let (service, _, commerce) = service();
        commerce.add_coupon(coupon("summer10"));

        assert!(matches!(
            service.check_coupon("SUMMER10").await,
            BestEffort::Done(Some(_))
        ));
        assert!(matches!(
            service.check_coupon("nope").await,
            BestEffort::Done(None)
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_surfaces() {
        let (service, payments, _) = service();
        payments.set_failing(true);

        let err = service
            .create_session(&request(vec![item(1, 1, 100)]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Payments(_)));
    }
}
