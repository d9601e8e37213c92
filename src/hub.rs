//! Hub subscription lifecycle.
//!
//! Watched channels are subscribed at the PubSubHubbub hub: the channel
//! reference (a URL or handle) is resolved to its canonical feed URL, then a
//! subscribe request is posted to the hub with this service's callback URL.
//! The hub verifies the subscription asynchronously against the callback
//! endpoint (`hub.verify=async`).
//!
//! Subscriptions are leases and expire; [`renewal_loop`] resubscribes every
//! watched topic on a fixed period, well inside the hub's lease window.
//! Everything here is fire-and-forget per topic: failures are logged and the
//! next cycle tries again. None of it touches the dispatch pipeline.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::types::ChannelId;

/// Google's public PubSubHubbub hub, which serves YouTube feeds.
pub const DEFAULT_HUB_URL: &str = "https://pubsubhubbub.appspot.com/subscribe";

/// Errors from subscription management.
#[derive(Debug, Error)]
pub enum HubError {
    /// Subscribe request failed or the hub answered non-success.
    #[error("hub request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The resolver binary could not be spawned.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The resolver ran and exited nonzero.
    #[error("resolver command failed: {command}\nstderr: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// The resolver produced metadata without a channel ID.
    #[error("no channel ID in metadata for {url}")]
    MissingChannelId { url: String },

    /// The resolver produced unparseable metadata.
    #[error("invalid resolver metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Canonical feed URL for a channel.
pub fn feed_url_for_channel(channel: &ChannelId) -> String {
    format!(
        "https://www.youtube.com/feeds/videos.xml?channel_id={}",
        channel.as_str()
    )
}

/// Resolves a human-facing channel reference to its channel ID.
///
/// # Example (mock for testing)
///
/// ```ignore
/// struct FixedResolver(ChannelId);
///
/// impl FeedResolver for FixedResolver {
///     type Error = Infallible;
///
///     async fn resolve(&self, _url: &str) -> Result<ChannelId, Self::Error> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait FeedResolver {
    /// The error type returned by this resolver.
    type Error;

    /// Resolve a channel URL or handle to its channel ID.
    fn resolve(&self, url: &str) -> impl Future<Output = Result<ChannelId, Self::Error>> + Send;
}

/// Flat metadata record as emitted by `yt-dlp --dump-single-json`.
#[derive(Debug, Deserialize)]
struct ChannelMetadata {
    channel_id: Option<String>,
}

/// Resolver that shells out to `yt-dlp` for channel metadata, without
/// downloading anything.
pub struct YtDlpResolver {
    program: String,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        YtDlpResolver {
            program: "yt-dlp".to_string(),
        }
    }

    /// Overrides the resolver binary. Useful when `yt-dlp` is not on PATH,
    /// and for tests.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedResolver for YtDlpResolver {
    type Error = HubError;

    async fn resolve(&self, url: &str) -> Result<ChannelId, Self::Error> {
        let output = Command::new(&self.program)
            .args(["--quiet", "--skip-download", "--dump-single-json", "--extract-flat"])
            .arg(url)
            .output()
            .await?;

        if !output.status.success() {
            return Err(HubError::CommandFailed {
                command: format!("{} --dump-single-json {}", self.program, url),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let metadata: ChannelMetadata = serde_json::from_slice(&output.stdout)?;
        metadata
            .channel_id
            .map(ChannelId::new)
            .ok_or_else(|| HubError::MissingChannelId {
                url: url.to_string(),
            })
    }
}

/// Client for the hub's subscribe endpoint.
pub struct HubClient {
    http: reqwest::Client,
    hub_url: String,
    callback_url: String,
}

impl HubClient {
    /// Creates a client that subscribes `callback_url` at `hub_url`.
    pub fn new(hub_url: impl Into<String>, callback_url: impl Into<String>) -> Self {
        HubClient {
            http: reqwest::Client::new(),
            hub_url: hub_url.into(),
            callback_url: callback_url.into(),
        }
    }

    /// Submits one subscribe request for `topic`.
    ///
    /// The hub verifies asynchronously by calling back the verification
    /// endpoint; this method only covers the submission itself.
    pub async fn subscribe(&self, topic: &str) -> Result<(), HubError> {
        let response = self
            .http
            .post(&self.hub_url)
            .form(&[
                ("hub.callback", self.callback_url.as_str()),
                ("hub.mode", "subscribe"),
                ("hub.topic", topic),
                ("hub.verify", "async"),
            ])
            .send()
            .await?
            .error_for_status()?;

        info!(topic, status = %response.status(), "Subscribe request accepted");
        Ok(())
    }
}

/// Periodically resubscribes every topic until cancelled.
///
/// The first pass runs immediately, so starting the loop also establishes
/// the initial subscriptions. Per-topic failures are logged and skipped; the
/// topic gets another chance next cycle.
pub async fn renewal_loop(
    client: Arc<HubClient>,
    topics: Vec<String>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Subscription renewal loop shutting down");
                return;
            }
            _ = interval.tick() => {
                for topic in &topics {
                    if let Err(e) = client.subscribe(topic).await {
                        warn!(%topic, error = %e, "Subscribe failed; will retry next cycle");
                    }
                }
            }
        }
    }
}
