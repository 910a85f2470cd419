//! Domain models for the storefront.
//!
//! These types represent validated domain objects separate from database row
//! types. Rows are parsed into them in `crate::db`, and any value that fails
//! to parse is reported as data corruption rather than silently dropped.

pub mod catalog;
pub mod customer;
pub mod identity;
pub mod order;
pub mod subscription;

pub use catalog::{CatalogFilter, CatalogItem, CatalogItemUpdate, NewCatalogItem};
pub use customer::{Customer, NewCustomer};
pub use identity::Identity;
pub use order::{
    LineSnapshot, NewOrder, Order, PaymentInfo, ProviderTransition, ShippingAddress, StatusUpdate,
};
pub use subscription::{SubscriptionRecord, SubscriptionUpsert};
