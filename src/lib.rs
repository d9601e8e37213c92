//! shortwatch - a PubSubHubbub subscriber that alerts and downloads new
//! YouTube uploads.
//!
//! The hub pushes Atom feed-update callbacks; each entry's video ID is
//! claimed exactly once against a durable seen-set, then a Telegram alert is
//! sent and a `yt-dlp` download job is started. Subscriptions are renewed
//! out-of-band.

pub mod alert;
pub mod config;
pub mod feed;
pub mod hub;
pub mod pipeline;
pub mod retrieve;
pub mod server;
pub mod store;
pub mod types;
