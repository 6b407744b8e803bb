//! Poll data model
//!
//! Per-chat cafeteria poll state and its on-disk document form.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::channels::telegram::User;
use crate::channels::{MessageId, UserId};

/// Attendance answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatus {
    Eat,
    NoEat,
    Absent,
}

impl VoteStatus {
    /// Display order of the tally groups
    pub const ALL: [VoteStatus; 3] = [VoteStatus::Eat, VoteStatus::NoEat, VoteStatus::Absent];

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteStatus::Eat => "eat",
            VoteStatus::NoEat => "no_eat",
            VoteStatus::Absent => "absent",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VoteStatus::Eat => "Ем",
            VoteStatus::NoEat => "Не ем",
            VoteStatus::Absent => "Отсутствую",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            VoteStatus::Eat => "✅",
            VoteStatus::NoEat => "❌",
            VoteStatus::Absent => "🏠",
        }
    }
}

impl fmt::Display for VoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown vote status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for VoteStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eat" => Ok(VoteStatus::Eat),
            "no_eat" => Ok(VoteStatus::NoEat),
            "absent" => Ok(VoteStatus::Absent),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Who cast a vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voter {
    pub id: UserId,
    pub name: String,
    pub username: Option<String>,
}

impl Voter {
    pub fn new(id: UserId, name: impl Into<String>, username: Option<String>) -> Self {
        Self {
            id,
            name: name.into(),
            username,
        }
    }
}

impl From<&User> for Voter {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.full_name(),
            username: user.username.clone().filter(|u| !u.is_empty()),
        }
    }
}

/// One user's current answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    pub status: VoteStatus,
}

impl Vote {
    /// `@handle` when the user has one, otherwise the display name
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(handle) => format!("@{handle}"),
            None => self.name.clone(),
        }
    }
}

/// Persisted form of a chat's poll
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDocument {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub votes: BTreeMap<UserId, Vote>,
    #[serde(default)]
    pub poll_message_id: Option<MessageId>,
    #[serde(default)]
    pub results_message_id: Option<MessageId>,
    /// When the document was written; absent in older documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

/// In-memory poll state of one chat
#[derive(Debug, Clone, Default)]
pub struct ChatPollState {
    pub votes: BTreeMap<UserId, Vote>,
    pub poll_message_id: Option<MessageId>,
    pub results_message_id: Option<MessageId>,
    /// Local date the current poll cycle started
    pub date: Option<NaiveDate>,
    /// Sanitized chat title used in the document file name
    pub label: String,
    pub(crate) dirty: bool,
    pub(crate) last_persisted_at: Option<DateTime<Utc>>,
    /// Bumped on every mutation; a write only clears `dirty` if it still matches
    pub(crate) revision: u64,
    /// Disk state was already consulted (or superseded by a new poll)
    pub(crate) hydrated: bool,
}

impl ChatPollState {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn last_persisted_at(&self) -> Option<DateTime<Utc>> {
        self.last_persisted_at
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    /// Insert or replace the voter's answer
    pub fn upsert_vote(&mut self, voter: &Voter, status: VoteStatus) {
        self.votes.insert(
            voter.id,
            Vote {
                name: voter.name.clone(),
                username: voter.username.clone(),
                status,
            },
        );
        self.touch();
    }

    /// Begin a new poll cycle
    pub fn reset(
        &mut self,
        date: NaiveDate,
        poll_message_id: Option<MessageId>,
        results_message_id: Option<MessageId>,
    ) {
        self.votes.clear();
        self.date = Some(date);
        self.poll_message_id = poll_message_id;
        self.results_message_id = results_message_id;
        self.hydrated = true;
        self.touch();
    }

    pub fn to_document(&self) -> PollDocument {
        PollDocument {
            date: self.date,
            votes: self.votes.clone(),
            poll_message_id: self.poll_message_id,
            results_message_id: self.results_message_id,
            saved_at: None,
        }
    }

    /// Fold a persisted document in; anything already in memory wins
    pub fn merge_document(&mut self, doc: PollDocument) {
        for (user_id, vote) in doc.votes {
            self.votes.entry(user_id).or_insert(vote);
        }
        if self.poll_message_id.is_none() {
            self.poll_message_id = doc.poll_message_id;
        }
        if self.results_message_id.is_none() {
            self.results_message_id = doc.results_message_id;
        }
        if self.date.is_none() {
            self.date = doc.date;
        }
    }
}
