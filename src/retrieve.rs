//! Media retrieval via `yt-dlp`.
//!
//! Downloads are an opaque, possibly long-running job: the pipeline fires
//! them after the claim is durable and only observes the outcome. Files land
//! in the configured download directory under a timestamped name, so repeated
//! manual runs never clobber each other.

use std::io;
use std::path::PathBuf;
use std::process::Output;

use chrono::Utc;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::pipeline::Retriever;
use crate::types::VideoId;

/// Default download format selector, capped at 1920 vertical pixels.
pub const DEFAULT_FORMAT: &str = "best[height<=1920]/best";

/// Errors from the retrieval job.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// The downloader could not be spawned (missing binary, bad permissions).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The downloader ran and exited nonzero.
    #[error("download command failed: {command}\nstderr: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

/// Retrieval engine that shells out to `yt-dlp`.
pub struct YtDlpRetriever {
    program: String,
    download_dir: PathBuf,
    format: String,
}

impl YtDlpRetriever {
    /// Creates a retriever writing into `download_dir`, creating the
    /// directory if needed.
    pub fn new(download_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let download_dir = download_dir.into();
        std::fs::create_dir_all(&download_dir)?;
        Ok(YtDlpRetriever {
            program: "yt-dlp".to_string(),
            download_dir,
            format: DEFAULT_FORMAT.to_string(),
        })
    }

    /// Overrides the downloader binary. Useful when `yt-dlp` is not on PATH,
    /// and for tests.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Overrides the format selector.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Output template for a download started now:
    /// `<download_dir>/<YYYYmmdd_HHMMSS>_%(title)s.%(ext)s`.
    fn output_template(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        self.download_dir
            .join(format!("{stamp}_%(title)s.%(ext)s"))
    }
}

impl Retriever for YtDlpRetriever {
    type Error = RetrieveError;

    async fn retrieve(&self, id: &VideoId) -> Result<(), Self::Error> {
        let url = id.watch_url();
        let template = self.output_template();

        info!(video_id = %id, url = %url, "Starting download");

        let output: Output = Command::new(&self.program)
            .arg("-f")
            .arg(&self.format)
            .arg("-o")
            .arg(&template)
            .arg(&url)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RetrieveError::CommandFailed {
                command: format!("{} -f {} -o {} {}", self.program, self.format, template.display(), url),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        debug!(video_id = %id, "Download complete");
        Ok(())
    }
}
