//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `catalog` - Catalog reads and admin writes
//! - `customers` - Customer directory (lazy creation on first sign-in)
//! - `orders` - Order engine: cart validation, pending orders, payment transitions
//! - `subscriptions` - Subscription ledger and entitlement
//! - `checkout` - Hosted checkout and portal sessions across both providers
//! - `notifications` - Best-effort order confirmation email
//! - `webhooks` - Applies verified provider events to orders and the ledger
//!
//! Services borrow the repositories for the length of one request. They are
//! cheap to build, so handlers construct them on demand.

pub mod catalog;
pub mod checkout;
pub mod customers;
mod error;
pub mod notifications;
pub mod orders;
pub mod subscriptions;
pub mod webhooks;

pub use catalog::CatalogService;
pub use checkout::{CheckoutRequest, CheckoutResponse, CheckoutService};
pub use customers::CustomerDirectory;
pub use error::CommerceError;
pub use notifications::{
    EmailNotifier, NotificationDispatcher, NotificationError, OrderConfirmation, OrderNotifier,
};
pub use orders::{CartLine, OrderEngine, PendingOrder};
pub use subscriptions::{MembershipStatus, SubscriptionLedger};
pub use webhooks::WebhookService;
