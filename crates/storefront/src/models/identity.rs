//! Verified identity handed to the storefront by the identity provider.

use streetmerch_core::Email;

/// A signed-in caller. The storefront trusts this without re-verifying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub email: Email,
    pub name: Option<String>,
}
