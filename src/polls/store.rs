//! Poll store
//!
//! Holds every chat's poll state in memory and mirrors it to
//! `stolovaya_<label>_<chat_id>.json` documents. Writes are debounced per
//! chat; the in-memory map is authoritative and disk only matters for
//! rehydration after a restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::tally::{render_tally, Tally};
use super::types::{ChatPollState, PollDocument, VoteStatus, Voter};
use crate::channels::{ChatId, MessageId};
use crate::clock::Clock;
use crate::storage::JsonStore;

/// Minimum spacing between two writes of the same chat's document
pub const DEFAULT_PERSIST_INTERVAL: Duration = Duration::from_secs(12);

/// Prefix of every poll document file name
pub const POLL_FILE_PREFIX: &str = "stolovaya_";

const MAX_LABEL_LEN: usize = 40;

/// Result of a persistence attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Nothing changed since the last write
    Clean,
    /// Changed, but the last write is too recent
    Debounced,
    Written,
    /// Write failed; the chat stays dirty
    Failed,
}

/// File-system safe label for a chat. A missing or empty title becomes
/// `chat_<id>`; every other title is sanitized as-is.
pub fn chat_label(chat_id: ChatId, title: Option<&str>) -> String {
    let fallback;
    let source = match title {
        Some(title) if !title.is_empty() => title,
        _ => {
            fallback = format!("chat_{chat_id}");
            fallback.as_str()
        }
    };
    source
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_LABEL_LEN)
        .collect()
}

pub fn document_file_name(label: &str, chat_id: ChatId) -> String {
    format!("{POLL_FILE_PREFIX}{label}_{chat_id}.json")
}

/// Chat id encoded in a poll document file name
pub fn parse_document_chat_id(file_name: &str) -> Option<ChatId> {
    let stem = file_name
        .strip_prefix(POLL_FILE_PREFIX)?
        .strip_suffix(".json")?;
    let (_, id) = stem.rsplit_once('_')?;
    id.parse().ok()
}

/// In-memory poll states of all chats plus their document mirror
pub struct PollStore {
    chats: Mutex<HashMap<ChatId, ChatPollState>>,
    store: JsonStore,
    clock: Arc<dyn Clock>,
    persist_interval: chrono::Duration,
}

impl std::fmt::Debug for PollStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollStore")
            .field("chats", &self.chats.lock().len())
            .field("dir", &self.store.dir())
            .field("persist_interval", &self.persist_interval)
            .finish()
    }
}

impl PollStore {
    pub fn new(store: JsonStore, clock: Arc<dyn Clock>, persist_interval: Duration) -> Self {
        let persist_interval = chrono::Duration::from_std(persist_interval)
            .unwrap_or_else(|_| chrono::Duration::seconds(12));
        Self {
            chats: Mutex::new(HashMap::new()),
            store,
            clock,
            persist_interval,
        }
    }

    /// Make sure a state exists for the chat, refreshing its label from the title
    pub fn touch(&self, chat_id: ChatId, title: Option<&str>) {
        let mut chats = self.chats.lock();
        let state = chats
            .entry(chat_id)
            .or_insert_with(|| ChatPollState::new(chat_label(chat_id, title)));
        if title.is_some() {
            let label = chat_label(chat_id, title);
            if state.label != label {
                debug!(chat_id, old = %state.label, new = %label, "chat label changed");
                state.label = label;
            }
        }
    }

    /// Load the chat's document into an empty, not yet hydrated state.
    ///
    /// Returns true when a document was merged.
    pub async fn rehydrate(&self, chat_id: ChatId) -> bool {
        {
            let mut chats = self.chats.lock();
            let state = chats
                .entry(chat_id)
                .or_insert_with(|| ChatPollState::new(chat_label(chat_id, None)));
            if state.hydrated || !state.votes.is_empty() {
                return false;
            }
        }

        let Some(doc) = self.find_document(chat_id).await else {
            if let Some(state) = self.chats.lock().get_mut(&chat_id) {
                state.hydrated = true;
            }
            return false;
        };

        let mut chats = self.chats.lock();
        let Some(state) = chats.get_mut(&chat_id) else {
            return false;
        };
        if state.hydrated {
            return false;
        }
        let restored = doc.votes.len();
        state.merge_document(doc);
        state.hydrated = true;
        // Next mutation may write immediately
        state.last_persisted_at = Some(self.clock.now() - self.persist_interval);
        info!(chat_id, votes = restored, "poll state rehydrated");
        true
    }

    /// Newest document of the chat under any label.
    ///
    /// The title may have changed between writes, so every
    /// `stolovaya_*_<chat_id>.json` is a candidate. Ordered by the recorded
    /// save time, then by file modification time.
    async fn find_document(&self, chat_id: ChatId) -> Option<PollDocument> {
        let mut newest: Option<(Option<DateTime<Utc>>, Option<SystemTime>, PollDocument)> = None;
        for name in self.store.list().await {
            if parse_document_chat_id(&name) != Some(chat_id) {
                continue;
            }
            let path = self.store.path(&name);
            let Some(doc) = self.store.read::<PollDocument>(&path).await else {
                continue;
            };
            let modified = self.store.modified(&path).await;
            let is_newer = match &newest {
                None => true,
                Some((saved_at, mtime, _)) => (doc.saved_at, modified) > (*saved_at, *mtime),
            };
            if is_newer {
                newest = Some((doc.saved_at, modified, doc));
            }
        }
        newest.map(|(_, _, doc)| doc)
    }

    /// Record a vote (last write wins) and return the new tally
    pub fn record_vote(&self, chat_id: ChatId, voter: &Voter, status: VoteStatus) -> Tally {
        let mut chats = self.chats.lock();
        let state = chats
            .entry(chat_id)
            .or_insert_with(|| ChatPollState::new(chat_label(chat_id, None)));
        state.upsert_vote(voter, status);
        debug!(chat_id, user_id = voter.id, status = %status, "vote recorded");
        Tally::from_votes(&state.votes, state.date)
    }

    /// Clear votes and remember the freshly posted messages
    pub fn start_new_poll(
        &self,
        chat_id: ChatId,
        date: NaiveDate,
        poll_message_id: Option<MessageId>,
        results_message_id: Option<MessageId>,
    ) {
        let mut chats = self.chats.lock();
        let state = chats
            .entry(chat_id)
            .or_insert_with(|| ChatPollState::new(chat_label(chat_id, None)));
        state.reset(date, poll_message_id, results_message_id);
        info!(chat_id, %date, "new poll started");
    }

    pub fn set_results_message(&self, chat_id: ChatId, message_id: MessageId) {
        if let Some(state) = self.chats.lock().get_mut(&chat_id) {
            state.results_message_id = Some(message_id);
            state.dirty = true;
            state.revision += 1;
        }
    }

    pub fn results_message(&self, chat_id: ChatId) -> Option<MessageId> {
        self.chats
            .lock()
            .get(&chat_id)
            .and_then(|s| s.results_message_id)
    }

    pub fn snapshot(&self, chat_id: ChatId) -> Option<ChatPollState> {
        self.chats.lock().get(&chat_id).cloned()
    }

    pub fn tally(&self, chat_id: ChatId) -> Tally {
        match self.chats.lock().get(&chat_id) {
            Some(state) => Tally::from_votes(&state.votes, state.date),
            None => Tally::from_votes(&Default::default(), None),
        }
    }

    pub fn render(&self, chat_id: ChatId) -> String {
        match self.chats.lock().get(&chat_id) {
            Some(state) => render_tally(state),
            None => render_tally(&ChatPollState::default()),
        }
    }

    pub fn chat_ids(&self) -> Vec<ChatId> {
        let mut ids: Vec<ChatId> = self.chats.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Write the chat's document if dirty and outside the debounce window
    pub async fn persist_if_due(&self, chat_id: ChatId) -> PersistOutcome {
        self.persist(chat_id, false).await
    }

    /// Write every dirty chat regardless of the debounce window
    pub async fn flush_all(&self) -> usize {
        let mut written = 0;
        for chat_id in self.chat_ids() {
            if self.persist(chat_id, true).await == PersistOutcome::Written {
                written += 1;
            }
        }
        written
    }

    async fn persist(&self, chat_id: ChatId, force: bool) -> PersistOutcome {
        let now = self.clock.now();
        let (doc, revision, path) = {
            let chats = self.chats.lock();
            let Some(state) = chats.get(&chat_id) else {
                return PersistOutcome::Clean;
            };
            if !state.dirty {
                return PersistOutcome::Clean;
            }
            if !force {
                if let Some(last) = state.last_persisted_at {
                    if now - last < self.persist_interval {
                        return PersistOutcome::Debounced;
                    }
                }
            }
            let mut doc = state.to_document();
            doc.saved_at = Some(now);
            (
                doc,
                state.revision,
                self.store.path(&document_file_name(&state.label, chat_id)),
            )
        };

        if let Err(e) = self.store.write(&path, &doc).await {
            warn!(chat_id, error = %e, "failed to persist poll state");
            return PersistOutcome::Failed;
        }

        let mut chats = self.chats.lock();
        if let Some(state) = chats.get_mut(&chat_id) {
            state.last_persisted_at = Some(now);
            // A vote that landed during the write keeps the chat dirty
            if state.revision == revision {
                state.dirty = false;
            }
        }
        PersistOutcome::Written
    }
}
