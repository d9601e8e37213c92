//! Liveness endpoint.
//!
//! Answers 200 whenever the process is up and serving. It deliberately
//! checks nothing downstream (hub, Telegram, disk): a degraded dependency
//! must not make an orchestrator restart-loop the subscriber.

use axum::http::StatusCode;

/// Returns 200 with a fixed `OK` body.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
