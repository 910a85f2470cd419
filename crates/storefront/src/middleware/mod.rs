//! HTTP middleware and extractors for the storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (record id in span, Sentry scope and response)
//! 4. CORS
//!
//! Identity is not middleware. Handlers opt in with [`RequireIdentity`],
//! [`OptionalIdentity`] or [`RequireAdmin`].

pub mod auth;
pub mod request_id;

pub use auth::{AdminAccess, OptionalIdentity, RequireAdmin, RequireIdentity};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
