//! Messaging channels
//!
//! The bot speaks to exactly one platform, Telegram. The core depends only on
//! the [`Channel`] trait; [`telegram::TelegramChannel`] is the live adapter.

use serde::{Deserialize, Serialize};

#[path = "trait.rs"]
mod channel_trait;
pub mod telegram;

pub use channel_trait::{Channel, ChannelError, ChannelResult, ErrorOutcome, SendOptions};

/// Numeric chat identity
pub type ChatId = i64;

/// Numeric user identity
pub type UserId = i64;

/// Platform message reference
pub type MessageId = i64;

/// A labeled inline-keyboard button carrying callback data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Inline keyboard, serialized in the Bot API `reply_markup` shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    #[serde(rename = "inline_keyboard")]
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row of buttons
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    /// Append a single-button row
    pub fn button(self, text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        self.row(vec![Button::new(text, callback_data)])
    }

    /// All callback payloads, row-major
    pub fn callbacks(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flatten()
            .map(|b| b.callback_data.as_str())
            .collect()
    }
}
