//! Durable set of already-dispatched video IDs.
//!
//! The [`SeenStore`] is the exactly-once gate for the whole pipeline: a video
//! is alerted and downloaded only if its [`claim`](SeenStore::claim) returns
//! `true`, and `claim` returns `true` at most once per ID across the life of
//! the store (including restarts).
//!
//! # Durability
//!
//! The set is persisted as a flat JSON array of ID strings (the
//! `seen_shorts.json` artifact). Every successful claim rewrites the file
//! using the write-to-temp-then-rename pattern:
//!
//! 1. Write to `<path>.tmp`
//! 2. fsync the temp file
//! 3. Rename to `<path>`
//! 4. fsync the directory
//!
//! If persistence fails, the in-memory insert is rolled back and the claim
//! reports an error: a claim that is not on disk is not a claim. The hub will
//! redeliver and a later attempt can succeed.

pub mod fsync;

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::VideoId;
use fsync::{fsync_dir, fsync_file};

/// Errors from seen-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error while reading or persisting the seen file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The seen file exists but does not contain a JSON array of strings.
    #[error("corrupt seen file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable set of previously-claimed video IDs.
///
/// All access serializes through a single mutex; the persist step runs while
/// the lock is held, so concurrent claimants of the same ID observe exactly
/// one winner.
#[derive(Debug)]
pub struct SeenStore {
    seen: Mutex<HashSet<VideoId>>,
    path: Option<PathBuf>,
}

impl SeenStore {
    /// Creates a store with no backing file. Claims are never persisted.
    ///
    /// Intended for tests and dry runs.
    pub fn in_memory() -> Self {
        SeenStore {
            seen: Mutex::new(HashSet::new()),
            path: None,
        }
    }

    /// Loads the store from `path`.
    ///
    /// An absent file means "no prior observations" and yields an empty set.
    /// An unreadable or corrupt file is an error: silently starting empty
    /// would re-dispatch every video the previous process had seen.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let seen = match std::fs::read(&path) {
            Ok(bytes) => {
                let ids: Vec<VideoId> =
                    serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                ids.into_iter().collect()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        debug!(path = %path.display(), entries = seen.len(), "Loaded seen store");

        Ok(SeenStore {
            seen: Mutex::new(seen),
            path: Some(path),
        })
    }

    /// Returns true if `id` has already been claimed.
    pub async fn contains(&self, id: &VideoId) -> bool {
        self.seen.lock().await.contains(id)
    }

    /// Number of claimed IDs.
    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }

    /// Atomically checks membership and, if absent, inserts and persists.
    ///
    /// Returns `Ok(true)` if this call claimed the ID (the set was mutated
    /// and is durable on disk), `Ok(false)` if the ID was already present
    /// (no mutation, no I/O).
    ///
    /// If persisting fails, the in-memory insert is rolled back and the
    /// error is returned; the ID remains claimable by a later attempt.
    ///
    /// The lock is held across the persist step. That keeps the
    /// check-and-insert atomic with respect to every other caller, which is
    /// the invariant the rest of the pipeline relies on.
    pub async fn claim(&self, id: &VideoId) -> Result<bool> {
        let mut seen = self.seen.lock().await;

        if seen.contains(id) {
            return Ok(false);
        }

        seen.insert(id.clone());

        if let Err(e) = persist(self.path.as_deref(), &seen) {
            // Not on disk means not claimed: roll back so a redelivery
            // can claim this ID successfully.
            seen.remove(id);
            return Err(e);
        }

        Ok(true)
    }
}

/// Writes the seen set to `path` atomically. A `None` path is a no-op
/// (in-memory store).
fn persist(path: Option<&Path>, seen: &HashSet<VideoId>) -> Result<()> {
    let Some(path) = path else {
        debug!("seen store has no backing file; skipping persist");
        return Ok(());
    };

    // Sorted output keeps the file diffable and deterministic.
    let mut ids: Vec<&str> = seen.iter().map(VideoId::as_str).collect();
    ids.sort_unstable();
    let bytes = serde_json::to_vec_pretty(&ids).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let temp_path = {
        let mut os = path.as_os_str().to_os_string();
        os.push(".tmp");
        PathBuf::from(os)
    };

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(&bytes)?;
        fsync_file(&file)?;
    }

    std::fs::rename(&temp_path, path)?;
    fsync_dir(&dir)?;

    Ok(())
}
