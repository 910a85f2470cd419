//! Customer domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use streetmerch_core::{CustomerId, CustomerRole, Email};

/// Display name used when the identity provider does not report one.
pub const DEFAULT_DISPLAY_NAME: &str = "Unknown";

/// A customer known to the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    /// Subject id issued by the identity provider.
    pub subject: String,
    pub name: String,
    /// Unique, lowercase.
    pub email: Email,
    pub social_handle: Option<String>,
    pub role: CustomerRole,
    /// Card-network customer id, used to open the billing portal.
    pub provider_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a first sign-in.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub subject: String,
    pub name: String,
    pub email: Email,
    pub role: CustomerRole,
}
