//! Exactly-once dispatch of notification entries.
//!
//! The pipeline is the only writer of the seen store. For each parsed entry,
//! in document order, it:
//!
//! 1. Claims the video ID ([`SeenStore::claim`]) — the sole correctness
//!    boundary against duplicate deliveries, concurrent or redelivered
//! 2. On a fresh claim, sends the alert, then starts the retrieval job
//!
//! Downstream failures (alert transport, download) are logged and never roll
//! back the claim nor abort sibling entries: once the alert may have fired,
//! the ID stays dispatched. Retry of failed retrievals is an external
//! concern, not this pipeline's.
//!
//! # Ordering
//!
//! Claims for one payload happen inline, before the HTTP response, in
//! document order. Downstream actions run in a single detached task per
//! payload, also in document order. No ordering is guaranteed across
//! concurrent payloads; the store mutex is the only cross-payload
//! serialization point.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::feed::NotificationEntry;
use crate::store::{SeenStore, StoreError};
use crate::types::VideoId;

/// Sends a human-readable alert about a newly observed video.
///
/// Implementations are opaque transports; the pipeline observes failures but
/// never retries.
///
/// # Example (mock for testing)
///
/// ```ignore
/// struct RecordingAlerter {
///     sent: Mutex<Vec<String>>,
/// }
///
/// impl Alerter for RecordingAlerter {
///     type Error = Infallible;
///
///     async fn notify(&self, message: &str) -> Result<(), Self::Error> {
///         self.sent.lock().unwrap().push(message.to_string());
///         Ok(())
///     }
/// }
/// ```
pub trait Alerter {
    /// The error type returned by this transport.
    type Error: fmt::Display;

    /// Send one alert message.
    fn notify(&self, message: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Retrieves the content behind a video ID (an opaque, possibly long-running
/// download job).
pub trait Retriever {
    /// The error type returned by this engine.
    type Error: fmt::Display;

    /// Download the media for `id`.
    fn retrieve(&self, id: &VideoId) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Outcome of claiming one payload's entries.
#[derive(Debug)]
pub struct ClaimOutcome {
    /// Entries newly claimed by this payload, in document order.
    pub claimed: Vec<NotificationEntry>,

    /// Number of entries skipped because they were already seen.
    pub duplicates: usize,

    /// First persistence failure encountered, if any. The affected entries
    /// remain unclaimed; the callback as a whole must be reported as failed
    /// so the hub redelivers.
    pub first_error: Option<StoreError>,
}

/// The notification-to-action pipeline.
///
/// Holds the seen store and the two downstream capabilities. Cheap to clone;
/// all state is behind `Arc`s.
pub struct Pipeline<A, R> {
    store: Arc<SeenStore>,
    alerter: Arc<A>,
    retriever: Arc<R>,
}

impl<A, R> Clone for Pipeline<A, R> {
    fn clone(&self) -> Self {
        Pipeline {
            store: Arc::clone(&self.store),
            alerter: Arc::clone(&self.alerter),
            retriever: Arc::clone(&self.retriever),
        }
    }
}

impl<A, R> Pipeline<A, R>
where
    A: Alerter + Send + Sync + 'static,
    R: Retriever + Send + Sync + 'static,
{
    /// Creates a pipeline over the given store and capabilities.
    pub fn new(store: Arc<SeenStore>, alerter: Arc<A>, retriever: Arc<R>) -> Self {
        Pipeline {
            store,
            alerter,
            retriever,
        }
    }

    /// Returns the underlying seen store.
    pub fn store(&self) -> &SeenStore {
        &self.store
    }

    /// Claims each entry in document order.
    ///
    /// Already-seen entries are skipped silently — the normal steady-state
    /// path for redelivered notifications. A persistence failure aborts only
    /// that entry's claim; siblings still get their own attempt.
    pub async fn claim_batch(&self, entries: Vec<NotificationEntry>) -> ClaimOutcome {
        let mut claimed = Vec::new();
        let mut duplicates = 0;
        let mut first_error = None;

        for entry in entries {
            match self.store.claim(&entry.video_id).await {
                Ok(true) => {
                    info!(video_id = %entry.video_id, title = %entry.title, "Claimed new video");
                    claimed.push(entry);
                }
                Ok(false) => {
                    debug!(video_id = %entry.video_id, "Already seen; skipping");
                    duplicates += 1;
                }
                Err(e) => {
                    warn!(video_id = %entry.video_id, error = %e, "Claim failed to persist");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        ClaimOutcome {
            claimed,
            duplicates,
            first_error,
        }
    }

    /// Runs the downstream actions for freshly claimed entries, in order:
    /// alert first, then the retrieval job.
    ///
    /// Failures are observed here and go no further — the claims are already
    /// durable, and a failed download after a delivered alert is a terminal
    /// state for this pipeline.
    pub async fn run_actions(&self, claimed: Vec<NotificationEntry>) {
        for entry in claimed {
            let message = alert_message(&entry);

            if let Err(e) = self.alerter.notify(&message).await {
                warn!(video_id = %entry.video_id, error = %e, "Alert failed");
            }

            if let Err(e) = self.retriever.retrieve(&entry.video_id).await {
                warn!(video_id = %entry.video_id, error = %e, "Retrieval failed");
            }
        }
    }

    /// Detaches [`run_actions`](Self::run_actions) into a background task.
    ///
    /// The hub treats slow responses as delivery failures, so the HTTP
    /// handler must not wait for downloads; redeliveries triggered in the
    /// meantime are absorbed by the claim gate.
    pub fn spawn_actions(&self, claimed: Vec<NotificationEntry>) {
        if claimed.is_empty() {
            return;
        }
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.run_actions(claimed).await;
        });
    }
}

/// Builds the alert text for one entry.
fn alert_message(entry: &NotificationEntry) -> String {
    format!(
        "🎬 New upload: {}\n{}",
        entry.title,
        entry.video_id.shorts_url()
    )
}
