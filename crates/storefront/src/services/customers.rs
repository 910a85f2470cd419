//! Customer directory.
//!
//! Customers are created lazily the first time a verified identity reaches
//! the storefront. There is no sign-up flow of our own.

use tracing::{info, instrument};

use streetmerch_core::CustomerRole;

use crate::db::{CustomerRepository, Repositories, RepositoryError, SubscriptionRepository};
use crate::models::customer::DEFAULT_DISPLAY_NAME;
use crate::models::{Customer, Identity, NewCustomer};

use super::CommerceError;

/// Lookups and lazy creation of customers.
pub struct CustomerDirectory<'a> {
    customers: &'a dyn CustomerRepository,
    subscriptions: &'a dyn SubscriptionRepository,
}

impl<'a> CustomerDirectory<'a> {
    #[must_use]
    pub fn new(repos: &'a Repositories) -> Self {
        Self {
            customers: repos.customers.as_ref(),
            subscriptions: repos.subscriptions.as_ref(),
        }
    }

    /// Return the customer for a verified identity, creating it on first
    /// sign-in.
    ///
    /// A changed display name is written back, and subscription records that
    /// arrived by webhook before the customer existed are linked by email.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Repository` on database failure.
    #[instrument(skip(self, identity), fields(email = %identity.email))]
    pub async fn ensure(&self, identity: &Identity) -> Result<Customer, CommerceError> {
        let customer = match self.customers.find_by_email(&identity.email).await? {
            Some(existing) => self.refresh_name(existing, identity).await?,
            None => self.create(identity).await?,
        };

        let linked = self
            .subscriptions
            .link_email(&customer.email, customer.id)
            .await?;
        if linked > 0 {
            info!(customer_id = %customer.id, linked, "Linked subscription records by email");
        }

        Ok(customer)
    }

    async fn refresh_name(
        &self,
        customer: Customer,
        identity: &Identity,
    ) -> Result<Customer, CommerceError> {
        let Some(name) = identity.name.as_deref().map(str::trim) else {
            return Ok(customer);
        };
        if name.is_empty() || name == customer.name {
            return Ok(customer);
        }

        Ok(self
            .customers
            .update_name(customer.id, name)
            .await?
            .unwrap_or(customer))
    }

    async fn create(&self, identity: &Identity) -> Result<Customer, CommerceError> {
        let name = identity
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME);

        let new = NewCustomer {
            subject: identity.subject.clone(),
            name: name.to_owned(),
            email: identity.email.clone(),
            role: CustomerRole::Customer,
        };

        match self.customers.create(new).await {
            Ok(customer) => {
                info!(customer_id = %customer.id, "Customer created on first sign-in");
                Ok(customer)
            }
            // Two first requests raced; the other one won.
            Err(RepositoryError::Conflict(_)) => self
                .customers
                .find_by_email(&identity.email)
                .await?
                .ok_or_else(|| CommerceError::NotFound("Customer".to_owned())),
            Err(e) => Err(e.into()),
        }
    }
}
