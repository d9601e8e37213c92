//! One-shot subscription pass.
//!
//! Resolves each configured channel to its canonical feed URL and submits a
//! subscribe request to the hub. Per-channel failures are logged and the
//! remaining channels still get their attempt. Run this once after changing
//! the channel list; the server's renewal loop keeps leases fresh afterwards.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shortwatch::config::Config;
use shortwatch::hub::{FeedResolver, HubClient, YtDlpResolver, feed_url_for_channel};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shortwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration error");
            std::process::exit(1);
        }
    };

    if config.channels.is_empty() {
        tracing::warn!("CHANNELS is empty; nothing to subscribe");
        return;
    }

    let resolver = YtDlpResolver::new();
    let client = HubClient::new(config.hub_url.clone(), config.callback_url.clone());

    let mut failures = 0;
    for channel in &config.channels {
        let topic = match resolver.resolve(channel).await {
            Ok(channel_id) => feed_url_for_channel(&channel_id),
            Err(e) => {
                tracing::error!(%channel, error = %e, "Failed to resolve channel");
                failures += 1;
                continue;
            }
        };

        match client.subscribe(&topic).await {
            Ok(()) => tracing::info!(%channel, %topic, "Subscribed"),
            Err(e) => {
                tracing::error!(%channel, %topic, error = %e, "Subscribe failed");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        std::process::exit(1);
    }
}
