//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tempfile::TempDir;

use classbot::bot::BotContext;
use classbot::catalog::StaticCatalog;
use classbot::channels::telegram::{CallbackQuery, Chat, Message, Update, User};
use classbot::channels::{
    Channel, ChannelError, ChannelResult, ChatId, Keyboard, MessageId, SendOptions,
};
use classbot::chats::KnownChats;
use classbot::clock::FixedClock;
use classbot::polls::{PollStore, DEFAULT_PERSIST_INTERVAL};
use classbot::storage::JsonStore;

/// One recorded transport call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
        html: bool,
        silent: bool,
    },
    Edit {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
    },
    Pin {
        chat_id: ChatId,
        message_id: MessageId,
    },
    Unpin {
        chat_id: ChatId,
        message_id: MessageId,
    },
    Answer {
        query_id: String,
        text: Option<String>,
    },
}

/// In-memory transport that records every call
#[derive(Debug)]
pub struct RecordingChannel {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI64,
    failing: Mutex<HashSet<ChatId>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Every send to this chat fails as if the bot was removed
    pub fn fail_chat(&self, chat_id: ChatId) {
        self.failing.lock().insert(chat_id);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn sends(&self) -> Vec<(ChatId, MessageId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send {
                    chat_id,
                    message_id,
                    text,
                    ..
                } => Some((chat_id, message_id, text)),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<(ChatId, MessageId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Edit {
                    chat_id,
                    message_id,
                    text,
                } => Some((chat_id, message_id, text)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        options: SendOptions,
    ) -> ChannelResult<MessageId> {
        if self.failing.lock().contains(&chat_id) {
            return Err(ChannelError::Api {
                code: 403,
                description: "Forbidden: bot was kicked from the group chat".into(),
            });
        }
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(Call::Send {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard: options.keyboard,
            html: options.html,
            silent: options.silent,
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        _keyboard: Option<&Keyboard>,
    ) -> ChannelResult<()> {
        self.calls.lock().push(Call::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn pin_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        _silent: bool,
    ) -> ChannelResult<()> {
        self.calls.lock().push(Call::Pin {
            chat_id,
            message_id,
        });
        Ok(())
    }

    async fn unpin_message(&self, chat_id: ChatId, message_id: MessageId) -> ChannelResult<()> {
        self.calls.lock().push(Call::Unpin {
            chat_id,
            message_id,
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> ChannelResult<()> {
        self.calls.lock().push(Call::Answer {
            query_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

pub fn user(id: i64, first_name: &str, username: Option<&str>) -> User {
    User {
        id,
        is_bot: false,
        first_name: first_name.to_string(),
        last_name: None,
        username: username.map(str::to_string),
    }
}

pub fn group(id: ChatId, title: &str) -> Chat {
    Chat {
        id,
        chat_type: "supergroup".to_string(),
        title: Some(title.to_string()),
    }
}

pub fn command(update_id: i64, chat: Chat, from: User, text: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            message_id: update_id,
            from: Some(from),
            chat,
            text: Some(text.to_string()),
        }),
        callback_query: None,
    }
}

pub fn callback(update_id: i64, chat: Chat, message_id: MessageId, from: User, data: &str) -> Update {
    Update {
        update_id,
        message: None,
        callback_query: Some(CallbackQuery {
            id: format!("q{update_id}"),
            from,
            message: Some(Message {
                message_id,
                from: None,
                chat,
                text: None,
            }),
            data: Some(data.to_string()),
        }),
    }
}

/// A bot context over a temp data directory and a recording transport
pub struct Harness {
    pub dir: TempDir,
    pub channel: Arc<RecordingChannel>,
    pub clock: Arc<FixedClock>,
    pub ctx: BotContext,
}

impl Harness {
    pub async fn new(catalog: StaticCatalog, now: DateTime<Utc>) -> Self {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path());
        let channel = Arc::new(RecordingChannel::new());
        let clock = Arc::new(FixedClock::new(now));
        let ctx = BotContext {
            channel: channel.clone(),
            polls: Arc::new(PollStore::new(
                store.clone(),
                clock.clone(),
                DEFAULT_PERSIST_INTERVAL,
            )),
            chats: Arc::new(KnownChats::load(store).await),
            catalog: Arc::new(catalog),
            clock: clock.clone(),
            tz: chrono_tz::Europe::Minsk,
        };
        Self {
            dir,
            channel,
            clock,
            ctx,
        }
    }

    pub fn store(&self) -> JsonStore {
        JsonStore::new(self.dir.path())
    }
}
