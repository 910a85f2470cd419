//! Persistence for the storefront.
//!
//! # Database: `streetmerch`
//!
//! ## Tables
//!
//! - `catalog_items` - Purchasable items and their inventory counters
//! - `orders` - Orders with line snapshots, payment correlation and fulfilment
//! - `subscriptions` - One row per provider subscription object
//! - `customers` - Customers created on first verified sign-in
//!
//! Every repository is a trait so the services can run against either
//! [`PgStore`] or the in-process [`MemoryStore`] used by tests and local demos.
//!
//! Inventory and order status are only ever changed with atomic writes
//! keyed by primary id (or by provider reference for webhook transitions).
//! A paid order moves its status and its stock in one transaction. Nothing
//! here reads a counter and writes it back later.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p streetmerch-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use streetmerch_core::{
    CatalogItemId, CustomerId, Email, OrderId, OrderStatus, PaymentProvider, SubscriptionStatus,
};

use crate::models::{
    CatalogFilter, CatalogItem, CatalogItemUpdate, Customer, NewCatalogItem, NewCustomer,
    NewOrder, Order, ProviderTransition, StatusUpdate, SubscriptionRecord, SubscriptionUpsert,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Catalog store.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Active items matching `filter`, in no particular order.
    async fn list(&self, filter: CatalogFilter) -> Result<Vec<CatalogItem>, RepositoryError>;

    /// Any item by id, active or not.
    async fn get(&self, id: CatalogItemId) -> Result<Option<CatalogItem>, RepositoryError>;

    async fn create(&self, item: NewCatalogItem) -> Result<CatalogItem, RepositoryError>;

    async fn update(
        &self,
        id: CatalogItemId,
        update: CatalogItemUpdate,
    ) -> Result<Option<CatalogItem>, RepositoryError>;
}

/// Order store.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a new order in `pending`.
    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Orders owned by a customer, newest first.
    async fn list_for_customer(&self, customer_id: CustomerId)
    -> Result<Vec<Order>, RepositoryError>;

    /// Move the order carrying `(provider, reference)` from `pending` to
    /// `paid` and take every line out of inventory, floored at zero.
    ///
    /// The status compare-and-set and the decrements commit as one unit. On
    /// error nothing is written, so a redelivered webhook finds the order
    /// still `pending`. Only one caller can ever observe
    /// [`ProviderTransition::Transitioned`] for a given order.
    async fn settle_paid_by_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
        charge_id: Option<&str>,
    ) -> Result<ProviderTransition, RepositoryError>;

    /// Move the order carrying `(provider, reference)` from `pending` to
    /// `cancelled`. Compare-and-set, like the paid transition.
    async fn cancel_by_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<ProviderTransition, RepositoryError>;

    /// Apply an operator edit if the order is still in `expected`.
    ///
    /// Returns `None` when the order's status moved in the meantime.
    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: &StatusUpdate,
    ) -> Result<Option<Order>, RepositoryError>;
}

/// Subscription ledger store.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert or patch by `(provider, subscription_id)` in one statement.
    async fn upsert(
        &self,
        upsert: SubscriptionUpsert,
    ) -> Result<SubscriptionRecord, RepositoryError>;

    /// Patch the status of an existing record. `None` if no record matches.
    async fn set_status(
        &self,
        provider: PaymentProvider,
        subscription_id: &str,
        status: &SubscriptionStatus,
    ) -> Result<Option<SubscriptionRecord>, RepositoryError>;

    /// Records linked to `customer_id` or carrying `email`.
    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
        email: &Email,
    ) -> Result<Vec<SubscriptionRecord>, RepositoryError>;

    /// Attach unlinked records carrying `email` to `customer_id`.
    /// Returns how many records were linked.
    async fn link_email(
        &self,
        email: &Email,
        customer_id: CustomerId,
    ) -> Result<u64, RepositoryError>;
}

/// Customer directory store.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError>;

    async fn find_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError>;

    /// Returns `RepositoryError::Conflict` if the email is taken.
    async fn create(&self, customer: NewCustomer) -> Result<Customer, RepositoryError>;

    async fn update_name(
        &self,
        id: CustomerId,
        name: &str,
    ) -> Result<Option<Customer>, RepositoryError>;

    async fn set_provider_customer_id(
        &self,
        id: CustomerId,
        provider_customer_id: &str,
    ) -> Result<(), RepositoryError>;
}

/// The four repositories, shared by the services.
#[derive(Clone)]
pub struct Repositories {
    pub catalog: Arc<dyn CatalogRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub customers: Arc<dyn CustomerRepository>,
}

impl Repositories {
    /// Repositories backed by `PostgreSQL`.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            catalog: store.clone(),
            orders: store.clone(),
            subscriptions: store.clone(),
            customers: store,
        }
    }

    /// Repositories backed by a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(MemoryStore::new()))
    }

    /// Repositories sharing an existing in-memory store (tests seed it directly).
    #[must_use]
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            catalog: store.clone(),
            orders: store.clone(),
            subscriptions: store.clone(),
            customers: store,
        }
    }
}
