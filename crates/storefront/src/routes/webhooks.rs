//! Provider webhook endpoint.
//!
//! The body is taken as raw bytes. Signatures are computed over the exact
//! bytes the provider sent, so it must not pass through a JSON extractor
//! first.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};

use crate::error::Result;
use crate::payments::WebhookAck;
use crate::state::AppState;

use super::parse_provider;

/// POST /webhooks/{provider}
///
/// 200 with `{received: true, ...}` for every handled or ignored event, 400
/// for a bad signature or an unreadable verified body.
pub async fn receive(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let provider = parse_provider(&provider)?;
    let signature = headers
        .get(state.payments().adapter(provider).signature_header())
        .and_then(|v| v.to_str().ok());

    let ack = state.webhooks().handle(provider, &body, signature).await?;
    Ok(Json(ack))
}
