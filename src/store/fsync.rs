//! fsync helpers for the seen-file write path.
//!
//! The seen set is only as durable as the rename that publishes it: the temp
//! file's contents and the directory entry the rename creates both have to
//! reach disk. [`fsync_file`] covers the first, [`fsync_dir`] the second; on
//! POSIX a rename without a following directory fsync can be undone by a
//! power loss even though the file data itself was synced.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Flushes a file's contents and metadata to disk (`fsync(2)`).
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Flushes a directory's entries to disk, making renames into it durable.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    // A read-only handle is enough to fsync a directory.
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}
