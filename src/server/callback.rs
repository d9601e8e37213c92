//! Hub callback endpoint handlers.
//!
//! One route, two verbs:
//!
//! - `GET` is the hub's verification handshake: echo `hub.challenge` back
//!   verbatim. No side effects, idempotent, safe to call arbitrarily often.
//! - `POST` is a feed-update notification: parse the Atom payload, claim each
//!   entry, detach the downstream actions, and acknowledge promptly. The hub
//!   only needs delivery acknowledgment; per-entry outcomes are visible in
//!   logs, not in the response.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::feed::{FeedError, parse_notification};
use crate::pipeline::{Alerter, Retriever};
use crate::store::StoreError;

/// Fixed acknowledgment body for accepted notifications.
const ACK_BODY: &str = "OK";

/// Errors that can occur when processing a notification callback.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// Payload is not a well-formed Atom document.
    #[error(transparent)]
    Malformed(#[from] FeedError),

    /// A claim could not be persisted; the hub should redeliver.
    #[error("claim persistence failure: {0}")]
    Claim(#[from] StoreError),
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        let status = match &self {
            // A structurally broken payload will be just as broken on
            // redelivery; tell the hub not to bother.
            CallbackError::Malformed(_) => StatusCode::BAD_REQUEST,
            CallbackError::Claim(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Query parameters of the hub's verification handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,

    #[serde(rename = "hub.mode")]
    mode: Option<String>,

    #[serde(rename = "hub.topic")]
    topic: Option<String>,

    // Kept as a string: this value is only logged, and a hub sending a
    // non-numeric lease must not be able to fail the handshake.
    #[serde(rename = "hub.lease_seconds")]
    lease_seconds: Option<String>,
}

/// Handshake handler.
///
/// Echoes the verification token back in the response body with status 200.
/// A request without a challenge gets an empty 200, matching the hub's
/// expectation that the body is exactly the token it sent.
pub async fn verify_handler(Query(params): Query<VerifyParams>) -> (StatusCode, String) {
    info!(
        mode = params.mode.as_deref().unwrap_or("-"),
        topic = params.topic.as_deref().unwrap_or("-"),
        lease_seconds = params.lease_seconds.as_deref().unwrap_or("-"),
        "Hub verification handshake"
    );

    (StatusCode::OK, params.challenge.unwrap_or_default())
}

/// Notification handler.
///
/// # Request
///
/// - Method: POST
/// - Body: Atom feed-update document; each entry carries `yt:videoId`
///
/// # Response
///
/// - 200 `OK`: payload parsed; fresh entries claimed and their actions
///   detached (already-seen entries skipped silently)
/// - 400: payload is not well-formed (dedup state untouched)
/// - 500: a claim failed to persist; the affected entries stay unclaimed and
///   the hub is invited to redeliver
pub async fn notify_handler<A, R>(
    State(app_state): State<AppState<A, R>>,
    body: Bytes,
) -> Result<(StatusCode, &'static str), CallbackError>
where
    A: Alerter + Send + Sync + 'static,
    R: Retriever + Send + Sync + 'static,
{
    let entries = parse_notification(&body)?;

    debug!(entries = entries.len(), "Received notification payload");

    if entries.is_empty() {
        return Ok((StatusCode::OK, ACK_BODY));
    }

    let outcome = app_state.pipeline().claim_batch(entries).await;

    info!(
        claimed = outcome.claimed.len(),
        duplicates = outcome.duplicates,
        "Notification claims resolved"
    );

    // Downstream actions run detached: the hub treats slow responses as
    // delivery failures, and redeliveries are absorbed by the claim gate.
    app_state.pipeline().spawn_actions(outcome.claimed);

    if let Some(e) = outcome.first_error {
        warn!(error = %e, "Reporting callback as failed so the hub redelivers");
        return Err(e.into());
    }

    Ok((StatusCode::OK, ACK_BODY))
}
