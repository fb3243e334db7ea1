//! Outbound notifications and inbound commands.

pub mod formatter;
pub mod polling;
pub mod telegram;

pub use polling::{poll_commands, CommandHandler};
pub use telegram::TelegramNotifier;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::services::shutdown::{is_shutdown, sleep_or_shutdown, ShutdownReceiver};

/// First retry delay; doubled after every failed attempt.
pub const BASE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("notification failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<NotifyError>,
    },

    #[error("notification cancelled by shutdown")]
    Cancelled,
}

pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;

/// A message sink.
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn send<'a>(&'a self, text: &'a str) -> NotifyFuture<'a>;
}

/// Writes messages to the log. Used when no chat transport is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn send<'a>(&'a self, text: &'a str) -> NotifyFuture<'a> {
        Box::pin(async move {
            info!(target: "sentinel::notify", "\n{}", text);
            Ok(())
        })
    }
}

/// Send with exponential backoff (1s, 2s, 4s, ...): `max_retries + 1`
/// attempts in total. Shutdown aborts the loop with [`NotifyError::Cancelled`].
pub async fn send_with_retry(
    notifier: &dyn Notifier,
    text: &str,
    max_retries: u32,
    shutdown: &mut ShutdownReceiver,
) -> Result<(), NotifyError> {
    send_with_backoff(notifier, text, max_retries, BASE_BACKOFF, shutdown).await
}

/// [`send_with_retry`] with an explicit base delay.
pub async fn send_with_backoff(
    notifier: &dyn Notifier,
    text: &str,
    max_retries: u32,
    base_delay: Duration,
    shutdown: &mut ShutdownReceiver,
) -> Result<(), NotifyError> {
    let attempts = max_retries + 1;
    let mut last_error = None;

    for attempt in 0..attempts {
        if is_shutdown(shutdown) {
            return Err(NotifyError::Cancelled);
        }

        match notifier.send(text).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                if attempt + 1 < attempts {
                    let delay = base_delay.saturating_mul(2u32.saturating_pow(attempt));
                    warn!(
                        "{} send failed (attempt {}/{}): {}, retrying in {:?}",
                        notifier.name(),
                        attempt + 1,
                        attempts,
                        e,
                        delay
                    );
                    last_error = Some(e);
                    if sleep_or_shutdown(delay, shutdown).await {
                        return Err(NotifyError::Cancelled);
                    }
                } else {
                    last_error = Some(e);
                }
            }
        }
    }

    Err(NotifyError::Exhausted {
        attempts,
        last: Box::new(last_error.unwrap_or(NotifyError::Cancelled)),
    })
}

/// The outbound notifier for `config`, plus the Telegram client when one is
/// configured so the caller can also poll it for commands.
pub fn build_notifier(
    config: &Config,
) -> Result<(Arc<dyn Notifier>, Option<Arc<TelegramNotifier>>), NotifyError> {
    match &config.telegram {
        Some(tg) => {
            let telegram = Arc::new(TelegramNotifier::new(
                tg.bot_token.clone(),
                tg.chat_id.clone(),
                config.https_proxy.as_deref(),
            )?);
            let notifier: Arc<dyn Notifier> = telegram.clone();
            Ok((notifier, Some(telegram)))
        }
        None => {
            info!("Telegram not configured, notifications go to the log");
            let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
            Ok((notifier, None))
        }
    }
}
