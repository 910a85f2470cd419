//! Core types for Streetmerch.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod catalog;
pub mod email;
pub mod id;
pub mod price;
pub mod provider;
pub mod status;

pub use catalog::CatalogCategory;
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Money, UnknownCurrency, round_cents, to_minor_units};
pub use provider::{BillingCycle, PaymentProvider, UnknownProvider};
pub use status::*;
