//! In-process fakes of every external system.
//!
//! Compiled for this crate's unit tests and, through the `test-support`
//! feature, for the integration-tests crate. Each fake records what it was
//! asked to do so tests can assert on calls that did or did not happen.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use checkout_core::{CurrencyCode, OrderId};
use secrecy::SecretString;

use crate::commerce::{CommerceBackend, CommerceError, Coupon, CreatedOrder, NewOrder};
use crate::config::{CheckoutConfig, CommerceConfig, LogFormat, RevalidationConfig, StripeConfig};
use crate::payments::{
    CheckoutSession, CreateSessionRequest, CreatedSession, ExpandableProduct, PaymentError,
    PaymentProvider, PaymentStatus, Price, Product, SessionLineItem,
};
use crate::services::revalidation::{RevalidationError, Revalidator};
use crate::state::{AppState, Clients};
use crate::store::MemoryStore;

/// Payment webhook secret used by [`sample_config`].
pub const PAYMENT_WEBHOOK_SECRET: &str = "whsec_super_secret_value";
/// Revalidation secret used by [`sample_config`].
pub const REVALIDATE_SECRET: &str = "rv_super_secret_value";

/// A complete configuration pointing at unroutable test hosts.
#[must_use]
pub fn sample_config() -> CheckoutConfig {
    CheckoutConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 3002,
        base_url: "https://shop.test".to_string(),
        database_url: None,
        currency: CurrencyCode::USD,
        http_timeout: Duration::from_secs(5),
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_super_secret_value"),
            webhook_secret: Some(SecretString::from(PAYMENT_WEBHOOK_SECRET)),
            api_base: "https://api.stripe.com".to_string(),
        },
        commerce: CommerceConfig {
            base_url: "https://backend.test".to_string(),
            consumer_key: "ck_public".to_string(),
            consumer_secret: SecretString::from("cs_super_secret_value"),
            webhook_secret: None,
        },
        revalidation: RevalidationConfig {
            url: "https://render.test/api/revalidate".to_string(),
            secret: SecretString::from(REVALIDATE_SECRET),
            listing_path: "/shop".to_string(),
            product_prefix: "/product".to_string(),
        },
        log_format: LogFormat::Text,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.1,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Payment provider
// =============================================================================

/// Payment provider fake serving one session and its line items.
#[derive(Debug, Default)]
pub struct FakePayments {
    session: Mutex<Option<CheckoutSession>>,
    line_items: Mutex<Vec<SessionLineItem>>,
    created: Mutex<Vec<CreateSessionRequest>>,
    retrieved: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl FakePayments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `session` and `line_items` from the retrieval endpoints.
    pub fn serve(&self, session: CheckoutSession, line_items: Vec<SessionLineItem>) {
        *lock(&self.session) = Some(session);
        *lock(&self.line_items) = line_items;
    }

    /// Make every call fail with an API error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Session creation requests received so far.
    #[must_use]
    pub fn created_sessions(&self) -> Vec<CreateSessionRequest> {
        lock(&self.created).clone()
    }

    /// Session ids looked up so far.
    #[must_use]
    pub fn retrieved_sessions(&self) -> Vec<String> {
        lock(&self.retrieved).clone()
    }

    fn check(&self) -> Result<(), PaymentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Api {
                status: 500,
                message: "api_error: simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreatedSession, PaymentError> {
        self.check()?;
        let mut created = lock(&self.created);
        created.push(request.clone());
        let id = format!("cs_test_{}", created.len());
        Ok(CreatedSession {
            url: Some(format!("https://checkout.stripe.test/c/pay/{id}")),
            id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, PaymentError> {
        self.check()?;
        lock(&self.retrieved).push(session_id.to_string());
        lock(&self.session)
            .clone()
            .filter(|session| session.id == session_id)
            .ok_or_else(|| PaymentError::NotFound(format!("No such checkout session: {session_id}")))
    }

    async fn list_line_items(
        &self,
        session_id: &str,
    ) -> Result<Vec<SessionLineItem>, PaymentError> {
        self.check()?;
        let served = lock(&self.session)
            .as_ref()
            .is_some_and(|session| session.id == session_id);
        if !served {
            return Err(PaymentError::NotFound(format!(
                "No such checkout session: {session_id}"
            )));
        }
        Ok(lock(&self.line_items).clone())
    }
}

/// A paid session carrying `metadata`.
#[must_use]
pub fn paid_session(id: &str, metadata: &[(&str, &str)]) -> CheckoutSession {
    CheckoutSession {
        id: id.to_string(),
        payment_status: PaymentStatus::Paid,
        status: Some("complete".to_string()),
        payment_intent: Some("pi_test_1".to_string()),
        customer_email: Some("buyer@example.com".to_string()),
        customer_details: None,
        client_reference_id: None,
        amount_total: None,
        currency: Some("usd".to_string()),
        metadata: metadata
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    }
}

/// A line item whose expanded product carries `metadata`.
#[must_use]
pub fn line_item(id: &str, quantity: u32, metadata: &[(&str, &str)]) -> SessionLineItem {
    SessionLineItem {
        id: id.to_string(),
        description: Some(format!("Item {id}")),
        quantity: Some(quantity),
        amount_total: None,
        price: Some(Price {
            id: format!("price_{id}"),
            unit_amount: Some(1000),
            product: ExpandableProduct::Expanded(Product {
                id: format!("prod_{id}"),
                name: None,
                metadata: metadata
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
            }),
        }),
    }
}

// =============================================================================
// Commerce backend
// =============================================================================

/// Commerce backend fake honouring idempotency keys.
#[derive(Debug)]
pub struct FakeCommerce {
    coupons: Mutex<Vec<Coupon>>,
    orders: Mutex<Vec<(String, NewOrder, OrderId)>>,
    next_order_id: AtomicI64,
    failing: AtomicBool,
}

impl Default for FakeCommerce {
    fn default() -> Self {
        Self {
            coupons: Mutex::default(),
            orders: Mutex::default(),
            next_order_id: AtomicI64::new(1001),
            failing: AtomicBool::new(false),
        }
    }
}

impl FakeCommerce {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_coupon(&self, coupon: Coupon) {
        lock(&self.coupons).push(coupon);
    }

    /// Make every call fail with an API error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Distinct orders created, with their idempotency keys.
    #[must_use]
    pub fn orders(&self) -> Vec<(String, NewOrder)> {
        lock(&self.orders)
            .iter()
            .map(|(key, order, _)| (key.clone(), order.clone()))
            .collect()
    }

    fn check(&self) -> Result<(), CommerceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CommerceError::Api {
                status: 503,
                message: "unavailable: simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CommerceBackend for FakeCommerce {
    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, CommerceError> {
        self.check()?;
        let wanted = code.to_lowercase();
        Ok(lock(&self.coupons)
            .iter()
            .find(|coupon| coupon.code.to_lowercase() == wanted)
            .cloned())
    }

    async fn create_order(
        &self,
        order: &NewOrder,
        idempotency_key: &str,
    ) -> Result<CreatedOrder, CommerceError> {
        self.check()?;
        let mut orders = lock(&self.orders);
        let id = if let Some((_, _, id)) = orders.iter().find(|(key, _, _)| key == idempotency_key)
        {
            *id
        } else {
            let id = OrderId::new(self.next_order_id.fetch_add(1, Ordering::SeqCst));
            orders.push((idempotency_key.to_string(), order.clone(), id));
            id
        };
        Ok(CreatedOrder {
            id,
            number: Some(id.to_string()),
            status: Some("processing".to_string()),
        })
    }
}

/// A usable percent coupon.
#[must_use]
pub fn coupon(code: &str) -> Coupon {
    Coupon {
        id: 7,
        code: code.to_string(),
        discount_type: "percent".to_string(),
        amount: rust_decimal::Decimal::new(10, 0),
        date_expires_gmt: None,
        usage_limit: None,
        usage_count: 0,
    }
}

// =============================================================================
// Rendering layer
// =============================================================================

/// Rendering layer fake recording every revalidated path.
#[derive(Debug, Default)]
pub struct FakeRevalidator {
    paths: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl FakeRevalidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Paths successfully revalidated, in order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        lock(&self.paths).clone()
    }
}

#[async_trait]
impl Revalidator for FakeRevalidator {
    async fn revalidate(&self, path: &str) -> Result<(), RevalidationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RevalidationError::Rejected {
                status: 500,
                message: "simulated outage".to_string(),
            });
        }
        lock(&self.paths).push(path.to_string());
        Ok(())
    }
}

// =============================================================================
// Application state
// =============================================================================

/// Application state wired to fakes, with handles on each fake.
#[derive(Debug, Clone)]
pub struct Harness {
    pub state: AppState,
    pub payments: Arc<FakePayments>,
    pub commerce: Arc<FakeCommerce>,
    pub store: Arc<MemoryStore>,
    pub revalidator: Arc<FakeRevalidator>,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(sample_config())
    }

    #[must_use]
    pub fn with_config(config: CheckoutConfig) -> Self {
        let payments = Arc::new(FakePayments::new());
        let commerce = Arc::new(FakeCommerce::new());
        let store = Arc::new(MemoryStore::new());
        let revalidator = Arc::new(FakeRevalidator::new());

        let state = AppState::new(
            config,
            Clients {
                payments: payments.clone(),
                commerce: commerce.clone(),
                store: store.clone(),
                revalidator: revalidator.clone(),
            },
        );

        Self {
            state,
            payments,
            commerce,
            store,
            revalidator,
        }
    }

    /// The API router bound to this harness's state.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        crate::routes::routes().with_state(self.state.clone())
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
