//! Streetmerch Core - Shared domain types.
//!
//! This crate provides the types used across all Streetmerch components:
//! - `storefront` - Order engine, payment adapters and HTTP surface
//! - `cli` - Command-line tools for migrations and operator tasks
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. The order state machine and the subscription
//! entitlement predicate live here so every component agrees on them.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, money, emails, statuses and provider tags

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
