//! In-process store used by tests and local demos.
//!
//! A single mutex guards all tables, so every method is atomic with respect
//! to every other, which is the same guarantee the single-statement
//! `PostgreSQL` queries give.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use streetmerch_core::{
    CatalogItemId, CustomerId, Email, OrderId, OrderStatus, PaymentProvider, SubscriptionRecordId,
    SubscriptionStatus,
};

use super::{
    CatalogRepository, CustomerRepository, OrderRepository, RepositoryError,
    SubscriptionRepository,
};
use crate::models::{
    CatalogFilter, CatalogItem, CatalogItemUpdate, Customer, NewCatalogItem, NewCustomer,
    NewOrder, Order, ProviderTransition, StatusUpdate, SubscriptionRecord, SubscriptionUpsert,
};

#[derive(Default)]
struct Tables {
    catalog: BTreeMap<CatalogItemId, CatalogItem>,
    orders: Vec<Order>,
    subscriptions: Vec<SubscriptionRecord>,
    customers: Vec<Customer>,
    inventory_faults: BTreeSet<CatalogItemId>,
    next_id: i32,
}

impl Tables {
    const fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Mutex-guarded implementation of every repository trait.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of orders stored, for assertions.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }

    /// Make the next paid settlement touching `item` fail as a database
    /// error would, before anything is written.
    pub fn fail_next_inventory_write(&self, item: CatalogItemId) {
        self.lock().inventory_faults.insert(item);
    }

    /// Number of subscription records stored, for assertions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.lock().subscriptions.len()
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn list(&self, filter: CatalogFilter) -> Result<Vec<CatalogItem>, RepositoryError> {
        Ok(self
            .lock()
            .catalog
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }

    async fn get(&self, id: CatalogItemId) -> Result<Option<CatalogItem>, RepositoryError> {
        Ok(self.lock().catalog.get(&id).cloned())
    }

    async fn create(&self, item: NewCatalogItem) -> Result<CatalogItem, RepositoryError> {
        let mut tables = self.lock();
        let id = CatalogItemId::new(tables.next_id());
        let now = Utc::now();
        let item = CatalogItem {
            id,
            name: item.name,
            description: item.description,
            price: item.price,
            image_url: item.image_url,
            category: item.category,
            sizes: item.sizes,
            inventory: item.inventory.max(0),
            active: true,
            featured: item.featured,
            exclusive: item.exclusive,
            created_at: now,
            updated_at: now,
        };
        tables.catalog.insert(id, item.clone());
        Ok(item)
    }

    async fn update(
        &self,
        id: CatalogItemId,
        update: CatalogItemUpdate,
    ) -> Result<Option<CatalogItem>, RepositoryError> {
        let mut tables = self.lock();
        let Some(item) = tables.catalog.get_mut(&id) else {
            return Ok(None);
        };
        update.apply_to(item);
        item.inventory = item.inventory.max(0);
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tables = self.lock();
        let reference_taken = tables
            .orders
            .iter()
            .any(|o| o.carries_reference(order.payment.provider, &order.payment.reference));
        if reference_taken {
            return Err(RepositoryError::Conflict(
                "payment reference already used".to_owned(),
            ));
        }

        let now = Utc::now();
        let order = Order {
            id: OrderId::generate(),
            customer_id: order.customer_id,
            guest_email: order.guest_email,
            lines: order.lines,
            status: OrderStatus::Pending,
            total: order.total,
            currency: order.currency,
            shipping_address: order.shipping_address,
            payment: Some(order.payment),
            tracking_number: None,
            admin_note: None,
            created_at: now,
            updated_at: now,
        };
        tables.orders.push(order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.lock().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .lock()
            .orders
            .iter()
            .filter(|o| o.customer_id == Some(customer_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn settle_paid_by_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
        charge_id: Option<&str>,
    ) -> Result<ProviderTransition, RepositoryError> {
        let mut guard = self.lock();
        let tables = &mut *guard;
        let Some(order) = tables
            .orders
            .iter_mut()
            .find(|o| o.carries_reference(provider, reference))
        else {
            return Ok(ProviderTransition::NotFound);
        };
        if !order.status.allows_provider_transition(OrderStatus::Paid) {
            return Ok(ProviderTransition::Unchanged(order.clone()));
        }

        // Fail before the first write so the whole settlement is discarded.
        if let Some(line) = order
            .lines
            .iter()
            .find(|l| tables.inventory_faults.contains(&l.item_id))
        {
            tables.inventory_faults.remove(&line.item_id);
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }

        let now = Utc::now();
        for line in &order.lines {
            if let Some(item) = tables.catalog.get_mut(&line.item_id) {
                let quantity = i32::try_from(line.quantity).unwrap_or(i32::MAX);
                item.inventory = item.inventory.saturating_sub(quantity).max(0);
                item.updated_at = now;
            }
        }
        order.status = OrderStatus::Paid;
        if let (Some(payment), Some(charge_id)) = (order.payment.as_mut(), charge_id) {
            payment.charge_id = Some(charge_id.to_owned());
        }
        order.updated_at = now;
        Ok(ProviderTransition::Transitioned(order.clone()))
    }

    async fn cancel_by_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<ProviderTransition, RepositoryError> {
        let mut tables = self.lock();
        let Some(order) = tables
            .orders
            .iter_mut()
            .find(|o| o.carries_reference(provider, reference))
        else {
            return Ok(ProviderTransition::NotFound);
        };
        if !order.status.allows_provider_transition(OrderStatus::Cancelled) {
            return Ok(ProviderTransition::Unchanged(order.clone()));
        }

        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        Ok(ProviderTransition::Transitioned(order.clone()))
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: &StatusUpdate,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tables = self.lock();
        let Some(order) = tables
            .orders
            .iter_mut()
            .find(|o| o.id == id && o.status == expected)
        else {
            return Ok(None);
        };

        order.status = update.status;
        if update.tracking_number.is_some() {
            order.tracking_number.clone_from(&update.tracking_number);
        }
        if update.admin_note.is_some() {
            order.admin_note.clone_from(&update.admin_note);
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn upsert(
        &self,
        upsert: SubscriptionUpsert,
    ) -> Result<SubscriptionRecord, RepositoryError> {
        let mut tables = self.lock();
        let now = Utc::now();

        if let Some(record) = tables.subscriptions.iter_mut().find(|r| {
            r.provider == upsert.provider && r.subscription_id == upsert.subscription_id
        }) {
            record.status = upsert.status;
            record.cancel_at_period_end = upsert.cancel_at_period_end;
            if record.provider_customer_id.is_none() {
                record.provider_customer_id = upsert.provider_customer_id;
            }
            if record.plan_id.is_none() {
                record.plan_id = upsert.plan_id;
            }
            if record.customer_id.is_none() {
                record.customer_id = upsert.customer_id;
            }
            if record.email.is_none() {
                record.email = upsert.email;
            }
            record.updated_at = now;
            return Ok(record.clone());
        }

        let record = SubscriptionRecord {
            id: SubscriptionRecordId::new(tables.next_id()),
            provider: upsert.provider,
            subscription_id: upsert.subscription_id,
            provider_customer_id: upsert.provider_customer_id,
            plan_id: upsert.plan_id,
            status: upsert.status,
            cancel_at_period_end: upsert.cancel_at_period_end,
            customer_id: upsert.customer_id,
            email: upsert.email,
            created_at: now,
            updated_at: now,
        };
        tables.subscriptions.push(record.clone());
        Ok(record)
    }

    async fn set_status(
        &self,
        provider: PaymentProvider,
        subscription_id: &str,
        status: &SubscriptionStatus,
    ) -> Result<Option<SubscriptionRecord>, RepositoryError> {
        let mut tables = self.lock();
        let Some(record) = tables
            .subscriptions
            .iter_mut()
            .find(|r| r.provider == provider && r.subscription_id == subscription_id)
        else {
            return Ok(None);
        };
        record.status = status.clone();
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
        email: &Email,
    ) -> Result<Vec<SubscriptionRecord>, RepositoryError> {
        Ok(self
            .lock()
            .subscriptions
            .iter()
            .filter(|r| r.customer_id == Some(customer_id) || r.email.as_ref() == Some(email))
            .cloned()
            .collect())
    }

    async fn link_email(
        &self,
        email: &Email,
        customer_id: CustomerId,
    ) -> Result<u64, RepositoryError> {
        let mut linked = 0;
        for record in &mut self.lock().subscriptions {
            if record.customer_id.is_none() && record.email.as_ref() == Some(email) {
                record.customer_id = Some(customer_id);
                linked += 1;
            }
        }
        Ok(linked)
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn get(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        Ok(self.lock().customers.iter().find(|c| c.id == id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError> {
        Ok(self
            .lock()
            .customers
            .iter()
            .find(|c| &c.email == email)
            .cloned())
    }

    async fn create(&self, customer: NewCustomer) -> Result<Customer, RepositoryError> {
        let mut tables = self.lock();
        if tables.customers.iter().any(|c| c.email == customer.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let customer = Customer {
            id: CustomerId::new(tables.next_id()),
            subject: customer.subject,
            name: customer.name,
            email: customer.email,
            social_handle: None,
            role: customer.role,
            provider_customer_id: None,
            created_at: Utc::now(),
        };
        tables.customers.push(customer.clone());
        Ok(customer)
    }

    async fn update_name(
        &self,
        id: CustomerId,
        name: &str,
    ) -> Result<Option<Customer>, RepositoryError> {
        let mut tables = self.lock();
        let Some(customer) = tables.customers.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        name.clone_into(&mut customer.name);
        Ok(Some(customer.clone()))
    }

    async fn set_provider_customer_id(
        &self,
        id: CustomerId,
        provider_customer_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.lock();
        let customer = tables
            .customers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        customer.provider_customer_id = Some(provider_customer_id.to_owned());
        Ok(())
    }
}
