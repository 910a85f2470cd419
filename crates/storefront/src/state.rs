//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::Repositories;
use crate::payments::Payments;
use crate::services::{
    CatalogService, CheckoutService, CustomerDirectory, OrderEngine, OrderNotifier,
    SubscriptionLedger, WebhookService,
};

/// Application state shared across all handlers.
///
/// Cheap to clone. Services are built per request from borrowed parts of it.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    repos: Repositories,
    payments: Payments,
    notifier: Option<Arc<dyn OrderNotifier>>,
    /// Present when backed by `PostgreSQL`; used by the readiness check.
    pool: Option<PgPool>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `repos` - Repositories (`PostgreSQL` or in-memory)
    /// * `payments` - Both payment adapters
    /// * `notifier` - Order confirmation sender, `None` when email is off
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        repos: Repositories,
        payments: Payments,
        notifier: Option<Arc<dyn OrderNotifier>>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                repos,
                payments,
                notifier,
                pool: None,
            }),
        }
    }

    /// State backed by a `PostgreSQL` pool.
    #[must_use]
    pub fn with_pool(
        config: StorefrontConfig,
        pool: PgPool,
        payments: Payments,
        notifier: Option<Arc<dyn OrderNotifier>>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                repos: Repositories::postgres(pool.clone()),
                payments,
                notifier,
                pool: Some(pool),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn repos(&self) -> &Repositories {
        &self.inner.repos
    }

    #[must_use]
    pub fn payments(&self) -> &Payments {
        &self.inner.payments
    }

    #[must_use]
    pub fn notifier(&self) -> Option<&dyn OrderNotifier> {
        self.inner.notifier.as_deref()
    }

    /// Get a reference to the database connection pool, if any.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    // =========================================================================
    // Per-request services
    // =========================================================================

    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self.repos())
    }

    #[must_use]
    pub fn customers(&self) -> CustomerDirectory<'_> {
        CustomerDirectory::new(self.repos())
    }

    #[must_use]
    pub fn ledger(&self) -> SubscriptionLedger<'_> {
        SubscriptionLedger::new(self.repos())
    }

    #[must_use]
    pub fn orders(&self) -> OrderEngine<'_> {
        OrderEngine::new(
            self.repos(),
            self.config().price_policy,
            self.config().default_currency,
        )
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(self.repos(), self.payments(), self.config())
    }

    #[must_use]
    pub fn webhooks(&self) -> WebhookService<'_> {
        WebhookService::new(self.repos(), self.payments(), self.notifier(), self.config())
    }
}
