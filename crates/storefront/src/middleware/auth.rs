//! Identity and admin extractors.
//!
//! The storefront sits behind an identity provider that has already verified
//! the caller. It forwards the result as trusted headers:
//!
//! - `x-auth-subject` - stable subject id
//! - `x-auth-email` - verified email
//! - `x-auth-name` - display name, optional
//!
//! Content-management routes additionally need the shared admin password in
//! `x-admin-password`.

use axum::{extract::FromRequestParts, http::request::Parts};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;

use streetmerch_core::Email;

use crate::error::{AppError, set_sentry_user};
use crate::models::Identity;
use crate::state::AppState;

pub const SUBJECT_HEADER: &str = "x-auth-subject";
pub const EMAIL_HEADER: &str = "x-auth-email";
pub const NAME_HEADER: &str = "x-auth-name";
pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Read the forwarded identity. A subject without a usable email is treated
/// as anonymous.
fn identity_from_parts(parts: &Parts) -> Option<Identity> {
    let subject = header(parts, SUBJECT_HEADER)?;
    let email = Email::parse(header(parts, EMAIL_HEADER)?).ok()?;
    Some(Identity {
        subject: subject.to_owned(),
        email,
        name: header(parts, NAME_HEADER).map(str::to_owned),
    })
}

/// Extractor that requires a verified identity.
///
/// # Example
///
/// ```rust,ignore
/// async fn my_orders(RequireIdentity(identity): RequireIdentity) -> impl IntoResponse {
///     format!("Orders for {}", identity.email)
/// }
/// ```
pub struct RequireIdentity(pub Identity);

impl<S> FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity_from_parts(parts)
            .ok_or_else(|| AppError::Unauthorized("Sign in to continue".to_owned()))?;
        set_sentry_user(&identity.subject, Some(identity.email.as_str()));
        Ok(Self(identity))
    }
}

/// Extractor that optionally gets the verified identity.
///
/// Unlike `RequireIdentity`, this does not reject anonymous shoppers.
pub struct OptionalIdentity(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = identity_from_parts(parts);
        if let Some(identity) = &identity {
            set_sentry_user(&identity.subject, Some(identity.email.as_str()));
        }
        Ok(Self(identity))
    }
}

/// Extractor for content-management routes.
///
/// Passes when `x-admin-password` matches `ADMIN_PASSWORD` and, if
/// `ADMIN_EMAIL` is set, the forwarded identity carries that email.
/// With no admin password configured every admin request is refused.
pub struct RequireAdmin;

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        check_admin(parts, state)
            .inspect_err(|e| tracing::warn!(error = %e, "Admin request refused"))?;
        Ok(Self)
    }
}

/// Extractor that reports whether the request passes the admin gate,
/// without rejecting it. Used where admins and owners share a route.
pub struct AdminAccess(pub bool);

impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let attempted = header(parts, ADMIN_PASSWORD_HEADER).is_some();
        Ok(Self(attempted && check_admin(parts, state).is_ok()))
    }
}

fn check_admin(parts: &Parts, state: &AppState) -> Result<(), AppError> {
    let admin = &state.config().admin;
    let Some(expected) = admin.password.as_ref() else {
        return Err(AppError::Forbidden(
            "Admin access is disabled. Set ADMIN_PASSWORD to enable it.".to_owned(),
        ));
    };

    let supplied = header(parts, ADMIN_PASSWORD_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Admin password required".to_owned()))?;
    if !constant_time_eq(supplied.as_bytes(), expected.expose_secret().as_bytes()) {
        return Err(AppError::Unauthorized("Invalid admin password".to_owned()));
    }

    if let Some(admin_email) = admin.email.as_deref() {
        let is_admin = identity_from_parts(parts)
            .is_some_and(|identity| identity.email.as_str() == admin_email);
        if !is_admin {
            return Err(AppError::Forbidden("Not an admin".to_owned()));
        }
    }
    Ok(())
}

/// Compare two secrets without leaking where they differ.
///
/// Both sides are keyed through HMAC so the comparison runs over equal-length
/// tags regardless of the input lengths.
fn constant_time_eq(supplied: &[u8], expected: &[u8]) -> bool {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(expected) else {
        return false;
    };
    mac.update(expected);
    let tag = mac.finalize().into_bytes();

    let Ok(mut check) = Hmac::<Sha256>::new_from_slice(expected) else {
        return false;
    };
    check.update(supplied);
    check.verify_slice(&tag).is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_identity_from_headers() {
        let identity = identity_from_parts(&parts(&[
            (SUBJECT_HEADER, "auth0|abc"),
            (EMAIL_HEADER, "Kofi@Example.com"),
            (NAME_HEADER, "Kofi"),
        ]))
        .unwrap();
        assert_eq!(identity.subject, "auth0|abc");
        assert_eq!(identity.email.as_str(), "kofi@example.com");
        assert_eq!(identity.name.as_deref(), Some("Kofi"));
    }

    #[test]
    fn test_identity_needs_subject_and_valid_email() {
        assert!(identity_from_parts(&parts(&[(EMAIL_HEADER, "a@example.com")])).is_none());
        assert!(
            identity_from_parts(&parts(&[(SUBJECT_HEADER, "s"), (EMAIL_HEADER, "nope")]))
                .is_none()
        );
        assert!(
            identity_from_parts(&parts(&[(SUBJECT_HEADER, "  "), (EMAIL_HEADER, "a@b.co")]))
                .is_none()
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"correct horse", b"correct horse"));
        assert!(!constant_time_eq(b"correct hors", b"correct horse"));
        assert!(!constant_time_eq(b"", b"correct horse"));
        assert!(!constant_time_eq(b"correct horse battery", b"correct horse"));
    }
}
