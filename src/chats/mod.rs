//! Known chat registry
//!
//! The set of chats the bot broadcasts to. Seeded at start-up from the
//! persisted `known_chats.json` list and from the chat ids encoded in poll
//! document names, then grown as chats interact with the bot.

use std::collections::BTreeSet;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::channels::ChatId;
use crate::polls::parse_document_chat_id;
use crate::storage::JsonStore;

pub const KNOWN_CHATS_FILE: &str = "known_chats.json";

#[derive(Debug)]
pub struct KnownChats {
    chats: Mutex<BTreeSet<ChatId>>,
    store: JsonStore,
}

impl KnownChats {
    /// Empty registry, nothing read from disk
    pub fn empty(store: JsonStore) -> Self {
        Self {
            chats: Mutex::new(BTreeSet::new()),
            store,
        }
    }

    /// Load the registry file and merge in chats that own a poll document
    pub async fn load(store: JsonStore) -> Self {
        let path = store.path(KNOWN_CHATS_FILE);
        let mut chats: BTreeSet<ChatId> = store
            .read::<Vec<ChatId>>(&path)
            .await
            .unwrap_or_default()
            .into_iter()
            .collect();
        let registered = chats.len();

        for name in store.list().await {
            if let Some(chat_id) = parse_document_chat_id(&name) {
                chats.insert(chat_id);
            }
        }

        info!(
            registered,
            total = chats.len(),
            "known chats loaded"
        );
        Self {
            chats: Mutex::new(chats),
            store,
        }
    }

    /// Add a chat. Returns true if it was new.
    ///
    /// A failed write is logged; the chat stays registered in memory.
    pub async fn register(&self, chat_id: ChatId) -> bool {
        let snapshot = {
            let mut chats = self.chats.lock();
            if !chats.insert(chat_id) {
                return false;
            }
            chats.iter().copied().collect::<Vec<_>>()
        };
        debug!(chat_id, "chat registered");
        let path = self.store.path(KNOWN_CHATS_FILE);
        if let Err(e) = self.store.write(&path, &snapshot).await {
            warn!(chat_id, error = %e, "failed to save known chats");
        }
        true
    }

    pub fn contains(&self, chat_id: ChatId) -> bool {
        self.chats.lock().contains(&chat_id)
    }

    /// Chat ids in ascending order
    pub fn snapshot(&self) -> Vec<ChatId> {
        self.chats.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.chats.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_merges_registry_and_documents() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(KNOWN_CHATS_FILE), "[-100, 42]").unwrap();
        std::fs::write(dir.path().join("stolovaya_Class_-200.json"), "{}").unwrap();
        std::fs::write(dir.path().join("birthdays.json"), "[]").unwrap();

        let chats = KnownChats::load(JsonStore::new(dir.path())).await;
        assert_eq!(chats.snapshot(), vec![-200, -100, 42]);
    }

    #[tokio::test]
    async fn test_register_persists_new_chats() {
        let dir = TempDir::new().unwrap();
        let chats = KnownChats::load(JsonStore::new(dir.path())).await;
        assert!(chats.is_empty());

        assert!(chats.register(-5).await);
        assert!(!chats.register(-5).await);
        assert!(chats.contains(-5));

        let reloaded = KnownChats::load(JsonStore::new(dir.path())).await;
        assert_eq!(reloaded.snapshot(), vec![-5]);
    }

    #[tokio::test]
    async fn test_corrupt_registry_is_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(KNOWN_CHATS_FILE), "not json").unwrap();
        let chats = KnownChats::load(JsonStore::new(dir.path())).await;
        assert_eq!(chats.len(), 0);
    }
}
