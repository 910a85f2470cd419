//! Commerce error taxonomy shared by the order engine, ledger and adapters.

use thiserror::Error;

use streetmerch_core::{OrderStatus, PaymentProvider};

use crate::db::RepositoryError;

/// Errors raised by the commerce services.
///
/// Business-rule rejections carry the offending item's name because the
/// storefront shows them to the shopper verbatim.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Malformed or missing input.
    #[error("{0}")]
    Validation(String),

    /// A referenced item, order or subscription does not exist.
    #[error("{0} not found")]
    NotFound(String),

    #[error("{name} is no longer available")]
    ItemUnavailable { name: String },

    #[error("Only {available} of {name} left in stock")]
    InsufficientInventory { name: String, available: i32 },

    #[error("{name} is reserved for members. Sign in to buy it.")]
    ExclusiveAccessDenied { name: String },

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The record changed between read and write.
    #[error("{0}")]
    Conflict(String),

    /// Deployment fault. The message says what to set.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// The remote provider rejected or failed the request.
    #[error("{provider} error: {message}")]
    PaymentProvider {
        provider: PaymentProvider,
        message: String,
    },

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl CommerceError {
    pub(crate) fn provider(provider: PaymentProvider, message: impl Into<String>) -> Self {
        Self::PaymentProvider {
            provider,
            message: message.into(),
        }
    }

    pub(crate) fn missing_env(key: &str, what: &str) -> Self {
        Self::Configuration(format!(
            "{what} is not configured. Set {key} in the storefront environment and restart."
        ))
    }
}
