//! `PostgreSQL` implementation of the repository traits.
//!
//! Queries are checked at runtime (`query_as` with `FromRow` rows) and rows
//! are parsed into domain types here. Enum-like columns are stored as TEXT;
//! line snapshots and shipping addresses as JSONB, read back through a
//! `::text` cast and decoded with `serde_json`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use streetmerch_core::{
    CatalogCategory, CatalogItemId, CurrencyCode, CustomerId, CustomerRole, Email, OrderId,
    OrderStatus, PaymentProvider, SubscriptionRecordId, SubscriptionStatus,
};

use super::{
    CatalogRepository, CustomerRepository, OrderRepository, RepositoryError,
    SubscriptionRepository,
};
use crate::models::{
    CatalogFilter, CatalogItem, CatalogItemUpdate, Customer, LineSnapshot, NewCatalogItem,
    NewCustomer, NewOrder, Order, PaymentInfo, ProviderTransition, ShippingAddress, StatusUpdate,
    SubscriptionRecord, SubscriptionUpsert,
};

const CATALOG_COLUMNS: &str = "id, name, description, price, image_url, category, sizes, \
     inventory, active, featured, exclusive, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, customer_id, guest_email, lines::text AS lines, status, total, \
     currency, shipping_address::text AS shipping_address, payment_provider, payment_reference, \
     charge_id, tracking_number, admin_note, created_at, updated_at";

const SUBSCRIPTION_COLUMNS: &str = "id, provider, subscription_id, provider_customer_id, plan_id, \
     status, cancel_at_period_end, customer_id, email, created_at, updated_at";

const CUSTOMER_COLUMNS: &str =
    "id, subject, name, email, social_handle, role, provider_customer_id, created_at";

/// Repository implementation backed by a connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The order for a provider reference that did not move: already
    /// settled, or unknown.
    async fn find_by_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<ProviderTransition, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE payment_provider = $1 AND payment_reference = $2"
        );
        let existing: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(provider.as_str())
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        match existing {
            Some(row) => Ok(ProviderTransition::Unchanged(Order::try_from(row)?)),
            None => Ok(ProviderTransition::NotFound),
        }
    }
}

fn corrupt(what: &str, e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("invalid {what} in database: {e}"))
}

fn map_unique_violation(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

fn parse_email(raw: Option<String>) -> Result<Option<Email>, RepositoryError> {
    raw.map(|e| Email::parse(&e).map_err(|err| corrupt("email", err)))
        .transpose()
}

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct CatalogRow {
    id: i32,
    name: String,
    description: Option<String>,
    price: Decimal,
    image_url: Option<String>,
    category: String,
    sizes: Vec<String>,
    inventory: i32,
    active: bool,
    featured: bool,
    exclusive: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CatalogRow> for CatalogItem {
    type Error = RepositoryError;

    fn try_from(r: CatalogRow) -> Result<Self, Self::Error> {
        let category: CatalogCategory = r.category.parse().map_err(|e| corrupt("category", e))?;
        Ok(Self {
            id: CatalogItemId::new(r.id),
            name: r.name,
            description: r.description,
            price: r.price,
            image_url: r.image_url,
            category,
            sizes: r.sizes,
            inventory: r.inventory,
            active: r.active,
            featured: r.featured,
            exclusive: r.exclusive,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Option<i32>,
    guest_email: Option<String>,
    lines: String,
    status: String,
    total: Decimal,
    currency: String,
    shipping_address: Option<String>,
    payment_provider: String,
    payment_reference: String,
    charge_id: Option<String>,
    tracking_number: Option<String>,
    admin_note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        let lines: Vec<LineSnapshot> =
            serde_json::from_str(&r.lines).map_err(|e| corrupt("order lines", e))?;
        let shipping_address: Option<ShippingAddress> = r
            .shipping_address
            .map(|s| serde_json::from_str(&s).map_err(|e| corrupt("shipping address", e)))
            .transpose()?;
        let provider: PaymentProvider = r
            .payment_provider
            .parse()
            .map_err(|e| corrupt("payment provider", e))?;

        Ok(Self {
            id: OrderId::from_uuid(r.id),
            customer_id: r.customer_id.map(CustomerId::new),
            guest_email: parse_email(r.guest_email)?,
            lines,
            status: r.status.parse().map_err(|e| corrupt("order status", e))?,
            total: r.total,
            currency: r.currency.parse().map_err(|e| corrupt("currency", e))?,
            shipping_address,
            payment: Some(PaymentInfo {
                provider,
                reference: r.payment_reference,
                charge_id: r.charge_id,
            }),
            tracking_number: r.tracking_number,
            admin_note: r.admin_note,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: i32,
    provider: String,
    subscription_id: String,
    provider_customer_id: Option<String>,
    plan_id: Option<String>,
    status: String,
    cancel_at_period_end: bool,
    customer_id: Option<i32>,
    email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionRecord {
    type Error = RepositoryError;

    fn try_from(r: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SubscriptionRecordId::new(r.id),
            provider: r.provider.parse().map_err(|e| corrupt("provider", e))?,
            subscription_id: r.subscription_id,
            provider_customer_id: r.provider_customer_id,
            plan_id: r.plan_id,
            status: SubscriptionStatus::new(r.status),
            cancel_at_period_end: r.cancel_at_period_end,
            customer_id: r.customer_id.map(CustomerId::new),
            email: parse_email(r.email)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    subject: String,
    name: String,
    email: String,
    social_handle: Option<String>,
    role: String,
    provider_customer_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = RepositoryError;

    fn try_from(r: CustomerRow) -> Result<Self, Self::Error> {
        let role: CustomerRole = r.role.parse().map_err(|e| corrupt("role", e))?;
        Ok(Self {
            id: CustomerId::new(r.id),
            subject: r.subject,
            name: r.name,
            email: Email::parse(&r.email).map_err(|e| corrupt("email", e))?,
            social_handle: r.social_handle,
            role,
            provider_customer_id: r.provider_customer_id,
            created_at: r.created_at,
        })
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[async_trait]
impl CatalogRepository for PgStore {
    async fn list(&self, filter: CatalogFilter) -> Result<Vec<CatalogItem>, RepositoryError> {
        let sql = format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_items
             WHERE active
               AND ($1::text IS NULL OR category = $1)
               AND (NOT $2 OR featured)"
        );
        let rows: Vec<CatalogRow> = sqlx::query_as(&sql)
            .bind(filter.category.map(|c| c.as_str()))
            .bind(filter.featured_only)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(CatalogItem::try_from).collect()
    }

    async fn get(&self, id: CatalogItemId) -> Result<Option<CatalogItem>, RepositoryError> {
        let sql = format!("SELECT {CATALOG_COLUMNS} FROM catalog_items WHERE id = $1");
        let row: Option<CatalogRow> = sqlx::query_as(&sql)
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await?;
        row.map(CatalogItem::try_from).transpose()
    }

    async fn create(&self, item: NewCatalogItem) -> Result<CatalogItem, RepositoryError> {
        let sql = format!(
            "INSERT INTO catalog_items
                (name, description, price, image_url, category, sizes, inventory, featured, exclusive)
             VALUES ($1, $2, $3, $4, $5, $6, GREATEST($7, 0), $8, $9)
             RETURNING {CATALOG_COLUMNS}"
        );
        let row: CatalogRow = sqlx::query_as(&sql)
            .bind(&item.name)
            .bind(&item.description)
            .bind(item.price)
            .bind(&item.image_url)
            .bind(item.category.as_str())
            .bind(&item.sizes)
            .bind(item.inventory)
            .bind(item.featured)
            .bind(item.exclusive)
            .fetch_one(&self.pool)
            .await?;
        CatalogItem::try_from(row)
    }

    async fn update(
        &self,
        id: CatalogItemId,
        update: CatalogItemUpdate,
    ) -> Result<Option<CatalogItem>, RepositoryError> {
        let sql = format!(
            "UPDATE catalog_items SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                image_url = COALESCE($5, image_url),
                category = COALESCE($6, category),
                sizes = COALESCE($7, sizes),
                inventory = GREATEST(COALESCE($8, inventory), 0),
                active = COALESCE($9, active),
                featured = COALESCE($10, featured),
                exclusive = COALESCE($11, exclusive),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {CATALOG_COLUMNS}"
        );
        let row: Option<CatalogRow> = sqlx::query_as(&sql)
            .bind(id.as_i32())
            .bind(&update.name)
            .bind(&update.description)
            .bind(update.price)
            .bind(&update.image_url)
            .bind(update.category.map(|c| c.as_str()))
            .bind(&update.sizes)
            .bind(update.inventory)
            .bind(update.active)
            .bind(update.featured)
            .bind(update.exclusive)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CatalogItem::try_from).transpose()
    }
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let lines = serde_json::to_string(&order.lines)
            .map_err(|e| RepositoryError::DataCorruption(format!("unserializable lines: {e}")))?;
        let shipping_address = order
            .shipping_address
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("unserializable address: {e}")))?;

        let sql = format!(
            "INSERT INTO orders
                (id, customer_id, guest_email, lines, status, total, currency,
                 shipping_address, payment_provider, payment_reference)
             VALUES ($1, $2, $3, $4::jsonb, $5, $6, $7, $8::jsonb, $9, $10)
             RETURNING {ORDER_COLUMNS}"
        );
        let row: OrderRow = sqlx::query_as(&sql)
            .bind(OrderId::generate().as_uuid())
            .bind(order.customer_id.map(|c| c.as_i32()))
            .bind(order.guest_email.as_ref().map(Email::as_str))
            .bind(lines)
            .bind(OrderStatus::Pending.as_str())
            .bind(order.total)
            .bind(order.currency.code())
            .bind(shipping_address)
            .bind(order.payment.provider.as_str())
            .bind(&order.payment.reference)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "payment reference already used"))?;
        Order::try_from(row)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE customer_id = $1
             ORDER BY created_at DESC"
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(customer_id.as_i32())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn settle_paid_by_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
        charge_id: Option<&str>,
    ) -> Result<ProviderTransition, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE orders
             SET status = 'paid', charge_id = COALESCE($3, charge_id), updated_at = NOW()
             WHERE payment_provider = $1 AND payment_reference = $2 AND status = 'pending'
             RETURNING {ORDER_COLUMNS}"
        );
        let moved: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(provider.as_str())
            .bind(reference)
            .bind(charge_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = moved else {
            tx.rollback().await?;
            return self.find_by_reference(provider, reference).await;
        };
        let order = Order::try_from(row)?;

        for line in &order.lines {
            let quantity = i32::try_from(line.quantity).unwrap_or(i32::MAX);
            let updated = sqlx::query(
                "UPDATE catalog_items
                 SET inventory = GREATEST(inventory - $2, 0), updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(line.item_id.as_i32())
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                warn!(item_id = %line.item_id, order_id = %order.id, "Paid line refers to a missing item");
            }
        }

        // Dropping the transaction before this point rolls everything back.
        tx.commit().await?;
        Ok(ProviderTransition::Transitioned(order))
    }

    async fn cancel_by_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<ProviderTransition, RepositoryError> {
        let sql = format!(
            "UPDATE orders
             SET status = 'cancelled', updated_at = NOW()
             WHERE payment_provider = $1 AND payment_reference = $2 AND status = 'pending'
             RETURNING {ORDER_COLUMNS}"
        );
        let moved: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(provider.as_str())
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        match moved {
            Some(row) => Ok(ProviderTransition::Transitioned(Order::try_from(row)?)),
            None => self.find_by_reference(provider, reference).await,
        }
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: &StatusUpdate,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "UPDATE orders
             SET status = $3,
                 tracking_number = COALESCE($4, tracking_number),
                 admin_note = COALESCE($5, admin_note),
                 updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {ORDER_COLUMNS}"
        );
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(expected.as_str())
            .bind(update.status.as_str())
            .bind(&update.tracking_number)
            .bind(&update.admin_note)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Order::try_from).transpose()
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

#[async_trait]
impl SubscriptionRepository for PgStore {
    async fn upsert(
        &self,
        upsert: SubscriptionUpsert,
    ) -> Result<SubscriptionRecord, RepositoryError> {
        let sql = format!(
            "INSERT INTO subscriptions
                (provider, subscription_id, provider_customer_id, plan_id, status,
                 cancel_at_period_end, customer_id, email)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (provider, subscription_id) DO UPDATE SET
                status = EXCLUDED.status,
                cancel_at_period_end = EXCLUDED.cancel_at_period_end,
                provider_customer_id = COALESCE(subscriptions.provider_customer_id, EXCLUDED.provider_customer_id),
                plan_id = COALESCE(subscriptions.plan_id, EXCLUDED.plan_id),
                customer_id = COALESCE(subscriptions.customer_id, EXCLUDED.customer_id),
                email = COALESCE(subscriptions.email, EXCLUDED.email),
                updated_at = NOW()
             RETURNING {SUBSCRIPTION_COLUMNS}"
        );
        let row: SubscriptionRow = sqlx::query_as(&sql)
            .bind(upsert.provider.as_str())
            .bind(&upsert.subscription_id)
            .bind(&upsert.provider_customer_id)
            .bind(&upsert.plan_id)
            .bind(upsert.status.as_str())
            .bind(upsert.cancel_at_period_end)
            .bind(upsert.customer_id.map(|c| c.as_i32()))
            .bind(upsert.email.as_ref().map(Email::as_str))
            .fetch_one(&self.pool)
            .await?;
        SubscriptionRecord::try_from(row)
    }

    async fn set_status(
        &self,
        provider: PaymentProvider,
        subscription_id: &str,
        status: &SubscriptionStatus,
    ) -> Result<Option<SubscriptionRecord>, RepositoryError> {
        let sql = format!(
            "UPDATE subscriptions SET status = $3, updated_at = NOW()
             WHERE provider = $1 AND subscription_id = $2
             RETURNING {SUBSCRIPTION_COLUMNS}"
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(provider.as_str())
            .bind(subscription_id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(SubscriptionRecord::try_from).transpose()
    }

    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
        email: &Email,
    ) -> Result<Vec<SubscriptionRecord>, RepositoryError> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
             WHERE customer_id = $1 OR email = $2"
        );
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&sql)
            .bind(customer_id.as_i32())
            .bind(email.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(SubscriptionRecord::try_from).collect()
    }

    async fn link_email(
        &self,
        email: &Email,
        customer_id: CustomerId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE subscriptions SET customer_id = $2, updated_at = NOW()
             WHERE email = $1 AND customer_id IS NULL",
        )
        .bind(email.as_str())
        .bind(customer_id.as_i32())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Customers
// =============================================================================

#[async_trait]
impl CustomerRepository for PgStore {
    async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1");
        let row: Option<CustomerRow> = sqlx::query_as(&sql)
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Customer::try_from).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE email = $1");
        let row: Option<CustomerRow> = sqlx::query_as(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Customer::try_from).transpose()
    }

    async fn create(&self, customer: NewCustomer) -> Result<Customer, RepositoryError> {
        let sql = format!(
            "INSERT INTO customers (subject, name, email, role)
             VALUES ($1, $2, $3, $4)
             RETURNING {CUSTOMER_COLUMNS}"
        );
        let row: CustomerRow = sqlx::query_as(&sql)
            .bind(&customer.subject)
            .bind(&customer.name)
            .bind(customer.email.as_str())
            .bind(customer.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "email already exists"))?;
        Customer::try_from(row)
    }

    async fn update_name(
        &self,
        id: CustomerId,
        name: &str,
    ) -> Result<Option<Customer>, RepositoryError> {
        let sql = format!(
            "UPDATE customers SET name = $2 WHERE id = $1 RETURNING {CUSTOMER_COLUMNS}"
        );
        let row: Option<CustomerRow> = sqlx::query_as(&sql)
            .bind(id.as_i32())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Customer::try_from).transpose()
    }

    async fn set_provider_customer_id(
        &self,
        id: CustomerId,
        provider_customer_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE customers SET provider_customer_id = $2 WHERE id = $1")
            .bind(id.as_i32())
            .bind(provider_customer_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order_row(lines: &str) -> OrderRow {
        let now = Utc::now();
        OrderRow {
            id: Uuid::new_v4(),
            customer_id: Some(3),
            guest_email: None,
            lines: lines.to_string(),
            status: "paid".to_string(),
            total: Decimal::new(5000, 2),
            currency: "GHS".to_string(),
            shipping_address: None,
            payment_provider: "paystack".to_string(),
            payment_reference: "ref_123".to_string(),
            charge_id: Some("4099260516".to_string()),
            tracking_number: None,
            admin_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_order_row_parses() {
        let row = order_row(
            r#"[{"item_id":1,"name":"Cap","unit_price":"50.00","quantity":1,"variant":null,"image_url":null}]"#,
        );
        let order = Order::try_from(row).unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.currency, CurrencyCode::GHS);
        assert_eq!(order.provider(), Some(PaymentProvider::Paystack));
        assert_eq!(order.lines.len(), 1);
    }

    #[test]
    fn test_order_row_with_bad_lines_is_corruption() {
        let err = Order::try_from(order_row("{not json")).unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }

    #[test]
    fn test_order_row_with_unknown_status_is_corruption() {
        let mut row = order_row("[]");
        row.status = "lost_in_transit".to_string();
        let err = Order::try_from(row).unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }
}
