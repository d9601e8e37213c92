use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shortwatch::config::Config;
use shortwatch::hub::{HubClient, feed_url_for_channel, renewal_loop, FeedResolver, YtDlpResolver};
use shortwatch::pipeline::Pipeline;
use shortwatch::retrieve::YtDlpRetriever;
use shortwatch::alert::TelegramAlerter;
use shortwatch::server::{AppState, build_router};
use shortwatch::store::SeenStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shortwatch=debug,tower_http=debug".into()),
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

    let store = match SeenStore::load(&config.seen_file) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load seen store");
            std::process::exit(1);
        }
    };
    tracing::info!(
        seen = store.len().await,
        path = %config.seen_file.display(),
        "Seen store loaded"
    );

    let retriever = match YtDlpRetriever::new(&config.download_dir) {
        Ok(retriever) => Arc::new(retriever),
        Err(e) => {
            tracing::error!(error = %e, "Failed to prepare download directory");
            std::process::exit(1);
        }
    };

    let alerter = Arc::new(TelegramAlerter::new(
        config.telegram_bot_token.clone(),
        config.telegram_chat_id.clone(),
    ));

    let pipeline = Pipeline::new(store, alerter, retriever);
    let app = build_router(AppState::new(pipeline));

    let shutdown = CancellationToken::new();

    // Keep the watched channels subscribed for as long as the server runs.
    if !config.channels.is_empty() {
        let client = Arc::new(HubClient::new(
            config.hub_url.clone(),
            config.callback_url.clone(),
        ));
        let resolver = YtDlpResolver::new();
        let mut topics = Vec::new();
        for channel in &config.channels {
            match resolver.resolve(channel).await {
                Ok(channel_id) => topics.push(feed_url_for_channel(&channel_id)),
                Err(e) => {
                    tracing::warn!(%channel, error = %e, "Could not resolve channel; skipping")
                }
            }
        }
        tokio::spawn(renewal_loop(
            client,
            topics,
            config.lease_renewal_interval,
            shutdown.clone(),
        ));
    }

    tracing::info!(addr = %config.bind_addr, "listening");

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %config.bind_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
    }

    shutdown.cancel();
}
