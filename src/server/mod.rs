//! HTTP server for the hub callback.
//!
//! This module implements the HTTP surface the hub talks to:
//!
//! - `GET /youtube/callback` - subscription verification handshake
//! - `POST /youtube/callback` - feed-update notification deliveries
//! - `GET /health` - liveness probe
//!
//! The handlers own no state of their own; everything flows through the
//! injected [`Pipeline`], so tests can substitute the alert transport and
//! retrieval engine wholesale.

pub mod callback;
pub mod health;

pub use callback::{notify_handler, verify_handler};
pub use health::health_handler;

use axum::Router;
use axum::routing::get;

use crate::pipeline::{Alerter, Pipeline, Retriever};

/// Shared application state, passed to handlers via Axum's `State` extractor.
pub struct AppState<A, R> {
    pipeline: Pipeline<A, R>,
}

impl<A, R> Clone for AppState<A, R> {
    fn clone(&self) -> Self {
        AppState {
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<A, R> AppState<A, R> {
    /// Creates a new `AppState` around the dispatch pipeline.
    pub fn new(pipeline: Pipeline<A, R>) -> Self {
        AppState { pipeline }
    }

    /// Returns the dispatch pipeline.
    pub fn pipeline(&self) -> &Pipeline<A, R> {
        &self.pipeline
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<A, R>(app_state: AppState<A, R>) -> Router
where
    A: Alerter + Send + Sync + 'static,
    R: Retriever + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/youtube/callback",
            get(verify_handler).post(notify_handler::<A, R>),
        )
        .route("/health", get(health_handler))
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::store::SeenStore;
    use crate::types::VideoId;

    /// Records alert/retrieval invocations so tests can observe the detached
    /// actions.
    #[derive(Default)]
    struct ActionLog {
        events: Mutex<Vec<String>>,
    }

    impl ActionLog {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    struct RecordingAlerter {
        log: Arc<ActionLog>,
    }

    impl Alerter for RecordingAlerter {
        type Error = Infallible;

        async fn notify(&self, message: &str) -> Result<(), Self::Error> {
            self.log
                .events
                .lock()
                .unwrap()
                .push(format!("alert: {message}"));
            Ok(())
        }
    }

    struct RecordingRetriever {
        log: Arc<ActionLog>,
    }

    impl Retriever for RecordingRetriever {
        type Error = Infallible;

        async fn retrieve(&self, id: &VideoId) -> Result<(), Self::Error> {
            self.log
                .events
                .lock()
                .unwrap()
                .push(format!("retrieve: {id}"));
            Ok(())
        }
    }

    type TestState = AppState<RecordingAlerter, RecordingRetriever>;

    fn test_app_state() -> (TestState, Arc<SeenStore>, Arc<ActionLog>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(SeenStore::load(dir.path().join("seen.json")).unwrap());
        let log = Arc::new(ActionLog::default());

        let pipeline = Pipeline::new(
            Arc::clone(&store),
            Arc::new(RecordingAlerter {
                log: Arc::clone(&log),
            }),
            Arc::new(RecordingRetriever {
                log: Arc::clone(&log),
            }),
        );

        (AppState::new(pipeline), store, log, dir)
    }

    /// Waits for the detached action task to record `n` events.
    async fn wait_for_events(log: &ActionLog, n: usize) {
        for _ in 0..200 {
            if log.events().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "timed out waiting for {n} events; got {:?}",
            log.events()
        );
    }

    fn single_entry_payload(video_id: &str, title: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns="http://www.w3.org/2005/Atom">
  <title>YouTube video feed</title>
  <updated>2024-03-09T19:05:24+00:00</updated>
  <entry>
    <id>yt:video:{video_id}</id>
    <yt:videoId>{video_id}</yt:videoId>
    <title>{title}</title>
    <published>2024-03-06T21:40:57+00:00</published>
    <updated>2024-03-09T19:05:24+00:00</updated>
  </entry>
</feed>"#
        )
    }

    fn notify_request(payload: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/youtube/callback")
            .header("content-type", "application/atom+xml")
            .body(payload.into())
            .unwrap()
    }

    // Handshake

    #[tokio::test]
    async fn handshake_echoes_challenge_verbatim() {
        let (state, _store, _log, _dir) = test_app_state();
        let app = build_router(state);

        let request = Request::builder()
            .uri("/youtube/callback?hub.challenge=abc123&hub.mode=subscribe&hub.topic=t&hub.lease_seconds=432000")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"abc123");
    }

    #[tokio::test]
    async fn handshake_without_challenge_is_empty_200() {
        let (state, _store, _log, _dir) = test_app_state();
        let app = build_router(state);

        let request = Request::builder()
            .uri("/youtube/callback?hub.mode=unsubscribe")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn handshake_tolerates_non_numeric_lease_seconds() {
        let (state, _store, _log, _dir) = test_app_state();
        let app = build_router(state);

        let request = Request::builder()
            .uri("/youtube/callback?hub.challenge=abc123&hub.mode=subscribe&hub.lease_seconds=soon")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"abc123");
    }

    // Notifications

    #[tokio::test]
    async fn notification_claims_and_dispatches_new_entry() {
        let (state, store, log, _dir) = test_app_state();
        let app = build_router(state);

        let response = app
            .oneshot(notify_request(single_entry_payload("vid-1", "Hello")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");

        // The claim is resolved before the response.
        assert!(store.contains(&VideoId::new("vid-1")).await);

        // Alert then retrieval, detached from the response.
        wait_for_events(&log, 2).await;
        let events = log.events();
        assert!(events[0].starts_with("alert: "));
        assert!(events[0].contains("https://www.youtube.com/shorts/vid-1"));
        assert_eq!(events[1], "retrieve: vid-1");
    }

    #[tokio::test]
    async fn redelivered_notification_is_acknowledged_without_redispatch() {
        let (state, _store, log, _dir) = test_app_state();

        let payload = single_entry_payload("vid-1", "Hello");

        let app = build_router(state.clone());
        let first = app.oneshot(notify_request(payload.clone())).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        wait_for_events(&log, 2).await;

        let app = build_router(state);
        let second = app.oneshot(notify_request(payload)).await.unwrap();
        assert_eq!(second.status(), StatusCode::OK);

        // Give any (incorrect) redispatch a chance to land.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(log.events().len(), 2, "one alert + one retrieval total");
    }

    #[tokio::test]
    async fn malformed_payload_returns_400_and_touches_nothing() {
        let (state, store, log, _dir) = test_app_state();
        let app = build_router(state);

        let response = app
            .oneshot(notify_request("this is not xml"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.is_empty().await);
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn claim_persistence_failure_returns_500_and_leaves_entry_claimable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seen");
        let store = Arc::new(SeenStore::load(&path).unwrap());
        let log = Arc::new(ActionLog::default());

        let pipeline = Pipeline::new(
            Arc::clone(&store),
            Arc::new(RecordingAlerter {
                log: Arc::clone(&log),
            }),
            Arc::new(RecordingRetriever {
                log: Arc::clone(&log),
            }),
        );
        let state = AppState::new(pipeline);

        // Occupy the seen file's path with a directory so persists fail.
        std::fs::create_dir(&path).unwrap();

        let app = build_router(state.clone());
        let response = app
            .oneshot(notify_request(single_entry_payload("vid-1", "Hello")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            !store.contains(&VideoId::new("vid-1")).await,
            "a claim that did not persist must not stick"
        );

        // The hub redelivers after the fault clears; normal path resumes.
        std::fs::remove_dir(&path).unwrap();
        let app = build_router(state);
        let retry = app
            .oneshot(notify_request(single_entry_payload("vid-1", "Hello")))
            .await
            .unwrap();

        assert_eq!(retry.status(), StatusCode::OK);
        assert!(store.contains(&VideoId::new("vid-1")).await);
        wait_for_events(&log, 2).await;
    }

    #[tokio::test]
    async fn empty_feed_is_acknowledged_with_no_actions() {
        let (state, store, log, _dir) = test_app_state();
        let app = build_router(state);

        let payload = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Quiet feed</title>
  <updated>2024-03-09T19:05:24+00:00</updated>
</feed>"#;

        let response = app.oneshot(notify_request(payload)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(store.is_empty().await);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn entry_without_video_id_does_not_poison_siblings() {
        let (state, store, log, _dir) = test_app_state();
        let app = build_router(state);

        let payload = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns="http://www.w3.org/2005/Atom">
  <title>YouTube video feed</title>
  <updated>2024-03-09T19:05:24+00:00</updated>
  <entry>
    <id>yt:video:good-1</id>
    <yt:videoId>good-1</yt:videoId>
    <title>First</title>
    <updated>2024-03-09T19:05:24+00:00</updated>
  </entry>
  <entry>
    <id>broken</id>
    <title>No ID</title>
    <updated>2024-03-09T19:05:24+00:00</updated>
  </entry>
  <entry>
    <id>yt:video:good-2</id>
    <yt:videoId>good-2</yt:videoId>
    <title>Second</title>
    <updated>2024-03-09T19:05:24+00:00</updated>
  </entry>
</feed>"#;

        let response = app.oneshot(notify_request(payload)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(store.contains(&VideoId::new("good-1")).await);
        assert!(store.contains(&VideoId::new("good-2")).await);

        wait_for_events(&log, 4).await;
        assert_eq!(log.events().len(), 4);
    }

    // Health

    #[tokio::test]
    async fn health_returns_200() {
        let (state, _store, _log, _dir) = test_app_state();
        let app = build_router(state);

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }
}
