//! Message delivery policy.
//!
//! Wraps transport calls with the bot's error policy: one bounded wait and
//! retry when rate limited, "not modified" edits count as success, anything
//! else is handed back to the caller to log.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::channels::{
    Channel, ChannelError, ChannelResult, ChatId, ErrorOutcome, Keyboard, MessageId, SendOptions,
};

/// Longest rate-limit pause honoured before the single retry
pub const MAX_RETRY_WAIT: Duration = Duration::from_secs(30);

/// Run a transport call, retrying once after a rate-limit pause.
pub async fn with_retry<T, F, Fut>(operation: &str, mut call: F) -> ChannelResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ChannelResult<T>>,
{
    match call().await {
        Err(err) => match err.outcome() {
            ErrorOutcome::RetryAfter(wait) => {
                let wait = wait.min(MAX_RETRY_WAIT);
                warn!(operation, wait_secs = wait.as_secs(), "rate limited, retrying once");
                tokio::time::sleep(wait).await;
                call().await
            }
            _ => Err(err),
        },
        ok => ok,
    }
}

/// Send a message under the retry policy
pub async fn send(
    channel: &dyn Channel,
    chat_id: ChatId,
    text: &str,
    options: SendOptions,
) -> ChannelResult<MessageId> {
    with_retry("send_message", move || {
        channel.send_message(chat_id, text, options.clone())
    })
    .await
}

/// Edit a message; an unchanged message is not an error
pub async fn edit(
    channel: &dyn Channel,
    chat_id: ChatId,
    message_id: MessageId,
    text: &str,
    keyboard: Option<&Keyboard>,
) -> ChannelResult<()> {
    let result = with_retry("edit_message", move || {
        channel.edit_message(chat_id, message_id, text, keyboard)
    })
    .await;
    match result {
        Err(err) if err.outcome() == ErrorOutcome::Benign => Ok(()),
        other => other,
    }
}

/// Log a failed operation unless it was benign
pub fn log_failure(operation: &str, chat_id: ChatId, err: &ChannelError) {
    match err.outcome() {
        ErrorOutcome::Benign => {}
        ErrorOutcome::Fatal => {
            tracing::error!(operation, chat_id, error = %err, "transport rejected the bot")
        }
        _ => warn!(operation, chat_id, error = %err, "transport operation failed"),
    }
}
