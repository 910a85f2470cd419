//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server faults to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; the body is always `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::CommerceError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Domain failure from a service.
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    /// No verified identity on a route that needs one.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Identity present but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        Self::Commerce(CommerceError::Repository(err))
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Commerce(err) => match err {
                CommerceError::Validation(_)
                | CommerceError::InvalidSignature
                | CommerceError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
                CommerceError::NotFound(_) => StatusCode::NOT_FOUND,
                CommerceError::ItemUnavailable { .. }
                | CommerceError::InsufficientInventory { .. }
                | CommerceError::InvalidTransition { .. }
                | CommerceError::Conflict(_) => StatusCode::CONFLICT,
                CommerceError::ExclusiveAccessDenied { .. } => StatusCode::FORBIDDEN,
                CommerceError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
                CommerceError::PaymentProvider { .. } => StatusCode::BAD_GATEWAY,
                CommerceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::Internal(_)
                | Self::Commerce(
                    CommerceError::Repository(_)
                        | CommerceError::Configuration(_)
                        | CommerceError::PaymentProvider { .. }
                )
        )
    }

    /// Message safe to show the caller.
    fn public_message(&self) -> String {
        match self {
            Self::Internal(_) | Self::Commerce(CommerceError::Repository(_)) => {
                "Internal server error".to_string()
            }
            // Configuration and provider messages are actionable for the
            // operator and carry no secrets.
            Self::Commerce(err) => err.to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                status = status.as_u16(),
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the signed-in caller.
pub fn set_sentry_user(subject: &str, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(subject.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for a commerce action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Opened checkout", Some(&[("provider", "stripe")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use streetmerch_core::{OrderStatus, PaymentProvider};

    use super::*;

    fn status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_commerce_status_codes() {
        assert_eq!(
            status(CommerceError::Validation("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(CommerceError::NotFound("Order".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(CommerceError::InsufficientInventory {
                name: "Cap".into(),
                available: 1
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(CommerceError::ExclusiveAccessDenied { name: "Drop".into() }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(CommerceError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(CommerceError::InvalidSignature),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(CommerceError::Configuration("set X".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(CommerceError::PaymentProvider {
                provider: PaymentProvider::Paystack,
                message: "declined".into()
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_app_status_codes() {
        assert_eq!(
            status(AppError::Unauthorized("sign in".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(AppError::Forbidden("admin".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_business_message_is_shown_verbatim() {
        let response = AppError::from(CommerceError::ItemUnavailable {
            name: "Box Logo Hoodie".into(),
        })
        .into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Box Logo Hoodie is no longer available");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let response = AppError::Internal("pool exhausted at 10.0.0.4".into()).into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Internal server error");
    }
}
