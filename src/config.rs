//! Environment-based configuration.
//!
//! Loaded once at startup, `.env` file honored via `dotenvy`. Only the
//! Telegram credentials and the public callback URL are required; everything
//! else has a default matching the common single-host deployment.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::hub::DEFAULT_HUB_URL;

/// Default lease renewal period: 4 hours, well inside the hub's usual
/// 5-day lease.
const DEFAULT_LEASE_RENEWAL_SECS: u64 = 4 * 60 * 60;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A variable is present but unparseable.
    #[error("invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the callback server binds to.
    pub bind_addr: SocketAddr,

    /// Publicly reachable URL of the callback endpoint, as registered with
    /// the hub.
    pub callback_url: String,

    /// Hub subscribe endpoint.
    pub hub_url: String,

    /// Telegram bot token for the alert transport.
    pub telegram_bot_token: String,

    /// Telegram chat that receives alerts.
    pub telegram_chat_id: String,

    /// Directory downloads are written into.
    pub download_dir: PathBuf,

    /// Path of the durable seen-set artifact.
    pub seen_file: PathBuf,

    /// Channel references (URLs or handles) to keep subscribed.
    pub channels: Vec<String>,

    /// How often the renewal loop resubscribes every topic.
    pub lease_renewal_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables (and `.env`, if
    /// present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let host = var_or("HOST", "0.0.0.0");
        let ip: IpAddr = host.parse().map_err(|_| ConfigError::InvalidVar {
            var: "HOST",
            value: host.clone(),
        })?;
        let port: u16 = parse_var("PORT", "3000")?;

        let renewal_secs: u64 =
            parse_var("LEASE_RENEWAL_SECS", &DEFAULT_LEASE_RENEWAL_SECS.to_string())?;

        Ok(Config {
            bind_addr: SocketAddr::new(ip, port),
            callback_url: require_var("WEBHOOK_URL")?,
            hub_url: var_or("HUB_URL", DEFAULT_HUB_URL),
            telegram_bot_token: require_var("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: require_var("TELEGRAM_CHAT_ID")?,
            download_dir: PathBuf::from(var_or("DOWNLOAD_PATH", "./downloads")),
            seen_file: PathBuf::from(var_or("SEEN_FILE", "seen_shorts.json")),
            channels: parse_channels(&var_or("CHANNELS", "")),
            lease_renewal_interval: Duration::from_secs(renewal_secs),
        })
    }
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = var_or(name, default);
    value.parse().map_err(|_| ConfigError::InvalidVar {
        var: name,
        value,
    })
}

/// Splits a comma-separated channel list, dropping empty segments.
fn parse_channels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
