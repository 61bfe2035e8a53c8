//! Application state shared across handlers.

use std::sync::Arc;

use crate::commerce::CommerceBackend;
use crate::config::CheckoutConfig;
use crate::payments::PaymentProvider;
use crate::services::{
    CheckoutService, OrderReconciler, RevalidationService, Revalidator, SyncService,
};
use crate::signature::{Scheme, WebhookVerifier};
use crate::store::DocumentStore;
use crate::webhooks::WebhookDispatcher;

/// External systems the service talks to.
///
/// `main` passes the real clients; tests pass fakes.
pub struct Clients {
    pub payments: Arc<dyn PaymentProvider>,
    pub commerce: Arc<dyn CommerceBackend>,
    pub store: Arc<dyn DocumentStore>,
    pub revalidator: Arc<dyn Revalidator>,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the configuration and the services built on the injected clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: CheckoutConfig,
    commerce: Arc<dyn CommerceBackend>,
    store: Arc<dyn DocumentStore>,
    checkout: CheckoutService,
    webhooks: WebhookDispatcher,
    sync: SyncService,
    revalidation: RevalidationService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Checkout server configuration
    /// * `clients` - Payment provider, commerce backend, document store and
    ///   rendering layer clients
    #[must_use]
    pub fn new(config: CheckoutConfig, clients: Clients) -> Self {
        let Clients {
            payments,
            commerce,
            store,
            revalidator,
        } = clients;

        let checkout = CheckoutService::new(payments.clone(), commerce.clone(), &config);
        let revalidation = RevalidationService::new(revalidator, &config.revalidation);
        let webhooks = WebhookDispatcher::new(
            WebhookVerifier::new(Scheme::Payment, config.stripe.webhook_secret.clone()),
            WebhookVerifier::new(Scheme::Commerce, config.commerce.webhook_secret.clone()),
            OrderReconciler::new(payments, commerce.clone()),
            revalidation.clone(),
        );
        let sync = SyncService::new(store.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                commerce,
                store,
                checkout,
                webhooks,
                sync,
                revalidation,
            }),
        }
    }

    /// Get a reference to the checkout configuration.
    #[must_use]
    pub fn config(&self) -> &CheckoutConfig {
        &self.inner.config
    }

    /// Get a reference to the commerce backend client.
    #[must_use]
    pub fn commerce(&self) -> &dyn CommerceBackend {
        self.inner.commerce.as_ref()
    }

    /// Get a reference to the document store.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    #[must_use]
    pub fn webhooks(&self) -> &WebhookDispatcher {
        &self.inner.webhooks
    }

    #[must_use]
    pub fn sync(&self) -> &SyncService {
        &self.inner.sync
    }

    #[must_use]
    pub fn revalidation(&self) -> &RevalidationService {
        &self.inner.revalidation
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
