//! Channel Trait
//!
//! The thin transport adapter the bot core talks to. Implementations report
//! failures as [`ChannelError`]; the core only ever looks at the
//! [`ErrorOutcome`] classification to decide between retry, ignore and log.

use std::time::Duration;

use async_trait::async_trait;

use super::{ChatId, Keyboard, MessageId};

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur in channel operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Rate limited: retry after {0}s")]
    RateLimited(u64),

    #[error("Message is not modified")]
    NotModified,

    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// What the caller should do with a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOutcome {
    /// Wait this long, then try once more.
    RetryAfter(Duration),
    /// Nothing actually went wrong; treat as success.
    Benign,
    /// Log and carry on with the next operation.
    Recoverable,
    /// The transport cannot work at all (bad token, bad config).
    Fatal,
}

impl ChannelError {
    pub fn outcome(&self) -> ErrorOutcome {
        match self {
            ChannelError::RateLimited(secs) => ErrorOutcome::RetryAfter(Duration::from_secs(*secs)),
            ChannelError::NotModified => ErrorOutcome::Benign,
            ChannelError::Request(_) | ChannelError::Api { .. } => ErrorOutcome::Recoverable,
            ChannelError::Unauthorized(_) | ChannelError::InvalidConfig(_) => ErrorOutcome::Fatal,
        }
    }
}

/// Options for an outgoing text message
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Inline keyboard attached below the message
    pub keyboard: Option<Keyboard>,
    /// Interpret the text as Telegram HTML
    pub html: bool,
    /// Deliver without a notification sound
    pub silent: bool,
}

impl SendOptions {
    pub fn with_keyboard(keyboard: Keyboard) -> Self {
        Self {
            keyboard: Some(keyboard),
            ..Self::default()
        }
    }

    pub fn html(mut self) -> Self {
        self.html = true;
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// Outbound operations against the messaging platform
#[async_trait]
pub trait Channel: Send + Sync {
    /// Send a text message, returning its id
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        options: SendOptions,
    ) -> ChannelResult<MessageId>;

    /// Replace the text (and keyboard) of an existing message
    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> ChannelResult<()>;

    /// Pin a message in the chat
    async fn pin_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        silent: bool,
    ) -> ChannelResult<()>;

    /// Unpin a specific message
    async fn unpin_message(&self, chat_id: ChatId, message_id: MessageId) -> ChannelResult<()>;

    /// Acknowledge an inline-button press
    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> ChannelResult<()>;
}
