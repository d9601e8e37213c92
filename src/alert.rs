//! Telegram alert transport.
//!
//! Sends alert messages through the Bot API's `sendMessage` method as a
//! form-encoded POST. Failures are surfaced to the pipeline, which logs them;
//! there is no retry here.

use thiserror::Error;
use tracing::debug;

use crate::pipeline::Alerter;

/// Default Telegram Bot API base URL.
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Errors from the Telegram transport.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Request failed or Telegram answered with a non-success status.
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Alert transport backed by a Telegram bot.
pub struct TelegramAlerter {
    http: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramAlerter {
    /// Creates an alerter for the given bot token and chat.
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        TelegramAlerter {
            http: reqwest::Client::new(),
            api_base: TELEGRAM_API_BASE.to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Overrides the API base URL. Used by tests to point at a local mock.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

impl Alerter for TelegramAlerter {
    type Error = AlertError;

    async fn notify(&self, message: &str) -> Result<(), Self::Error> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);

        let response = self
            .http
            .post(&url)
            .form(&[("chat_id", self.chat_id.as_str()), ("text", message)])
            .send()
            .await?
            .error_for_status()?;

        debug!(status = %response.status(), "Telegram alert delivered");
        Ok(())
    }
}
