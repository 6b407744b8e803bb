//! Daily birthday announcer.
//!
//! Once per local calendar day, sends one birthday message to every known
//! chat and pins it in place of the previous one. The date of the last
//! completed run is persisted so a restart on the same day sends nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::StaticCatalog;
use crate::channels::{Channel, ChatId, MessageId, SendOptions};
use crate::chats::KnownChats;
use crate::clock::Clock;
use crate::messages::delivery;
use crate::storage::JsonStore;

pub const GUARD_FILE: &str = "last_birthday.json";
pub const PINS_FILE: &str = "birthday_pins.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GuardDocument {
    date: NaiveDate,
}

/// Announcer state for the current local day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    PendingToday,
    SentToday,
}

/// Result of one announcer pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// Guard already holds today's date
    AlreadySent,
    /// Nobody has a birthday today; guard untouched
    NoBirthdays,
    Sent { delivered: usize, failed: usize },
}

#[derive(Debug, Default)]
struct RunState {
    last_sent: Option<NaiveDate>,
    pins: BTreeMap<ChatId, MessageId>,
    // Guard or pins not yet on disk
    dirty: bool,
}

pub struct BirthdayAnnouncer {
    channel: Arc<dyn Channel>,
    catalog: Arc<StaticCatalog>,
    chats: Arc<KnownChats>,
    store: JsonStore,
    clock: Arc<dyn Clock>,
    tz: Tz,
    // Held for a whole run, so concurrent callers queue up
    state: Mutex<RunState>,
}

impl BirthdayAnnouncer {
    /// Build the announcer and restore its guard and pin tracking from disk
    pub async fn load(
        channel: Arc<dyn Channel>,
        catalog: Arc<StaticCatalog>,
        chats: Arc<KnownChats>,
        store: JsonStore,
        clock: Arc<dyn Clock>,
        tz: Tz,
    ) -> Self {
        let last_sent = store
            .read::<GuardDocument>(&store.path(GUARD_FILE))
            .await
            .map(|g| g.date);
        let pins = store
            .read::<BTreeMap<ChatId, MessageId>>(&store.path(PINS_FILE))
            .await
            .unwrap_or_default();
        debug!(?last_sent, pinned = pins.len(), "announcer state restored");
        Self {
            channel,
            catalog,
            chats,
            store,
            clock,
            tz,
            state: Mutex::new(RunState {
                last_sent,
                pins,
                dirty: false,
            }),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub async fn last_sent(&self) -> Option<NaiveDate> {
        self.state.lock().await.last_sent
    }

    pub async fn day_state(&self) -> DayState {
        let today = self.clock.today(self.tz);
        if self.state.lock().await.last_sent == Some(today) {
            DayState::SentToday
        } else {
            DayState::PendingToday
        }
    }

    /// Run for the current local date
    pub async fn run_once(&self) -> AnnounceOutcome {
        let today = self.clock.today(self.tz);
        self.run_for(today).await
    }

    /// Run as if the local date were `date`
    pub async fn run_for(&self, date: NaiveDate) -> AnnounceOutcome {
        let mut state = self.state.lock().await;
        if state.last_sent == Some(date) {
            debug!(%date, "birthday announcement already sent");
            if state.dirty {
                self.save_state(&mut state).await;
            }
            return AnnounceOutcome::AlreadySent;
        }

        let names = self.catalog.birthdays_on(date);
        if names.is_empty() {
            debug!(%date, "no birthdays today");
            if state.dirty {
                self.save_state(&mut state).await;
            }
            return AnnounceOutcome::NoBirthdays;
        }
        let text = compose_message(&names);

        let mut delivered = 0;
        let mut failed = 0;
        for chat_id in self.chats.snapshot() {
            if self.announce_in(chat_id, &text, &mut state.pins).await {
                delivered += 1;
            } else {
                failed += 1;
            }
        }

        state.last_sent = Some(date);
        state.dirty = true;
        self.save_state(&mut state).await;

        info!(%date, people = names.len(), delivered, failed, "birthday announcement done");
        AnnounceOutcome::Sent { delivered, failed }
    }

    /// Write pins and guard. On failure the state stays dirty and the next
    /// run retries the write.
    async fn save_state(&self, state: &mut RunState) {
        let mut saved = true;
        if let Err(e) = self.store.write(&self.store.path(PINS_FILE), &state.pins).await {
            warn!(error = %e, "failed to save pinned announcement ids");
            saved = false;
        }
        if let Some(date) = state.last_sent {
            if let Err(e) = self
                .store
                .write(&self.store.path(GUARD_FILE), &GuardDocument { date })
                .await
            {
                warn!(%date, error = %e, "failed to save announcement guard");
                saved = false;
            }
        }
        if saved && state.dirty {
            debug!("announcer state saved");
        }
        state.dirty = !saved;
    }

    /// Replace the pinned announcement in one chat. Returns false if the send failed.
    async fn announce_in(
        &self,
        chat_id: ChatId,
        text: &str,
        pins: &mut BTreeMap<ChatId, MessageId>,
    ) -> bool {
        let channel = self.channel.as_ref();

        if let Some(old) = pins.get(&chat_id).copied() {
            if let Err(e) =
                delivery::with_retry("unpin_message", move || channel.unpin_message(chat_id, old)).await
            {
                debug!(chat_id, message_id = old, error = %e, "could not unpin previous announcement");
            }
        }

        let message_id =
            match delivery::send(channel, chat_id, text, SendOptions::default().html().silent())
                .await
            {
                Ok(id) => id,
                Err(e) => {
                    delivery::log_failure("send_message", chat_id, &e);
                    return false;
                }
            };

        if let Err(e) =
            delivery::with_retry("pin_message", move || channel.pin_message(chat_id, message_id, true))
                .await
        {
            delivery::log_failure("pin_message", chat_id, &e);
        }
        pins.insert(chat_id, message_id);
        true
    }
}

/// Birthday greeting for everyone celebrating today (HTML)
pub fn compose_message(names: &[&str]) -> String {
    let lines: Vec<String> = names
        .iter()
        .map(|name| format!("🎂 {}", escape_html(name)))
        .collect();
    format!(
        "🎉 <b>С днём рождения!</b>\n\n{}\n\nОт всего класса — счастья, здоровья, успехов и море позитива!",
        lines.join("\n")
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
