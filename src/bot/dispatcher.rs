//! Long-polling update loop.
//!
//! Fetches batches of updates and handles them one at a time, in arrival
//! order, on the caller's task. Errors never end the loop; they pause it.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{handle_update, BotContext};
use crate::channels::telegram::{TelegramChannel, Update};
use crate::channels::{ChannelResult, ErrorOutcome};
use crate::security::logging::sanitize_error_message;

/// Pause after a failed fetch
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Where updates come from
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn fetch_updates(&self) -> ChannelResult<Vec<Update>>;

    /// Pause between two successful fetches
    fn poll_interval(&self) -> Duration;
}

#[async_trait]
impl UpdateSource for TelegramChannel {
    async fn fetch_updates(&self) -> ChannelResult<Vec<Update>> {
        self.get_updates().await
    }

    fn poll_interval(&self) -> Duration {
        TelegramChannel::poll_interval(self)
    }
}

/// Run until `cancel` fires. Returns the number of updates handled.
pub async fn run_polling(
    source: &dyn UpdateSource,
    ctx: &BotContext,
    cancel: CancellationToken,
) -> u64 {
    let mut handled = 0u64;
    info!("update loop started");

    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            batch = source.fetch_updates() => batch,
        };

        let pause = match batch {
            Ok(updates) => {
                if !updates.is_empty() {
                    debug!(count = updates.len(), "updates received");
                }
                for update in updates {
                    handle_update(ctx, update).await;
                    handled += 1;
                }
                source.poll_interval()
            }
            Err(e) => {
                let message = sanitize_error_message(&e);
                match e.outcome() {
                    ErrorOutcome::RetryAfter(wait) => {
                        warn!(wait_secs = wait.as_secs(), "update fetch rate limited");
                        wait.max(ERROR_BACKOFF)
                    }
                    ErrorOutcome::Fatal => {
                        error!(error = %message, "update fetch rejected");
                        ERROR_BACKOFF
                    }
                    _ => {
                        warn!(error = %message, "update fetch failed");
                        ERROR_BACKOFF
                    }
                }
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    info!(handled, "update loop stopped");
    handled
}
