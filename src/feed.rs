//! Atom notification payload parser.
//!
//! The hub delivers feed updates as Atom documents in which each `<entry>`
//! carries the video ID in a namespaced `<yt:videoId>` element. This module
//! parses a raw payload into [`NotificationEntry`] values in document order.
//!
//! # Parsing Strategy
//!
//! 1. The whole document is parsed with `atom_syndication`
//! 2. A document that is not a well-formed feed is a [`FeedError`] (the hub
//!    gets a 4xx and may choose not to redeliver)
//! 3. The YouTube extension elements are matched by namespace URI, not by
//!    the conventional `yt` prefix; a payload binding the namespace to a
//!    different prefix parses the same
//! 4. An entry without a `yt:videoId` is skipped with a warning; it never
//!    poisons sibling entries in the same payload
//! 5. A well-formed feed with zero usable entries yields an empty vec

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::types::VideoId;

/// Namespace URI of YouTube's feed extension elements.
const YT_NAMESPACE: &str = "http://www.youtube.com/xml/schemas/2015";

/// Conventional prefix for that namespace, used when the document declares
/// the namespace somewhere the feed-level scan cannot see.
const YT_NS_PREFIX: &str = "yt";

/// Element name carrying the video ID within an entry.
const VIDEO_ID_ELEMENT: &str = "videoId";

/// Error type for notification parsing failures.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The payload is not a well-formed Atom document.
    #[error("malformed notification payload: {0}")]
    MalformedPayload(#[from] atom_syndication::Error),
}

/// One parsed update unit from a notification payload.
///
/// Transient: constructed per callback, discarded after dispatch. The title
/// and timestamp are carried only for the alert message and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEntry {
    /// The video this entry announces.
    pub video_id: VideoId,

    /// Entry title (the video title).
    pub title: String,

    /// Publication timestamp, when the feed provides one.
    pub published: Option<DateTime<Utc>>,
}

/// Parses a raw notification payload into entries, in document order.
///
/// # Errors
///
/// Returns [`FeedError::MalformedPayload`] only when the document itself
/// cannot be parsed as an Atom feed. Individual entries missing the video ID
/// are skipped, not errors.
pub fn parse_notification(payload: &[u8]) -> Result<Vec<NotificationEntry>, FeedError> {
    let feed = atom_syndication::Feed::read_from(payload)?;

    // Extensions are keyed by the prefix the document chose, so find the
    // one bound to the YouTube namespace rather than assuming `yt`.
    let yt_prefix = feed
        .namespaces()
        .iter()
        .find_map(|(prefix, uri)| (uri == YT_NAMESPACE).then_some(prefix.as_str()))
        .unwrap_or(YT_NS_PREFIX);

    let mut entries = Vec::new();
    for entry in feed.entries() {
        match extension_video_id(entry, yt_prefix) {
            Some(video_id) => entries.push(NotificationEntry {
                video_id,
                title: entry.title().value.clone(),
                published: entry.published().map(|dt| dt.with_timezone(&Utc)),
            }),
            None => {
                warn!(
                    entry_id = %entry.id(),
                    "Notification entry has no video ID; skipping"
                );
            }
        }
    }

    Ok(entries)
}

/// Extracts the video-ID extension element from an entry, under whatever
/// prefix the document bound the YouTube namespace to.
fn extension_video_id(entry: &atom_syndication::Entry, yt_prefix: &str) -> Option<VideoId> {
    entry
        .extensions()
        .get(yt_prefix)?
        .get(VIDEO_ID_ELEMENT)?
        .iter()
        .find_map(|ext| ext.value())
        .map(VideoId::from)
}
