//! Tally rendering
//!
//! Groups the vote map by status in the fixed order eat, no_eat, absent.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::types::{ChatPollState, Vote, VoteStatus};
use crate::channels::UserId;

/// Placeholder shown for a group nobody picked
pub const EMPTY_GROUP: &str = "—";

/// One status group of the tally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyGroup {
    pub status: VoteStatus,
    pub members: Vec<String>,
}

/// Votes partitioned by status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub date: Option<NaiveDate>,
    pub groups: Vec<TallyGroup>,
}

impl Tally {
    pub fn from_votes(votes: &BTreeMap<UserId, Vote>, date: Option<NaiveDate>) -> Self {
        let groups = VoteStatus::ALL
            .iter()
            .map(|&status| {
                let mut members: Vec<String> = votes
                    .values()
                    .filter(|v| v.status == status)
                    .map(Vote::display_name)
                    .collect();
                members.sort();
                TallyGroup { status, members }
            })
            .collect();
        Self { date, groups }
    }

    pub fn count(&self, status: VoteStatus) -> usize {
        self.groups
            .iter()
            .find(|g| g.status == status)
            .map(|g| g.members.len())
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }

    /// Counts as `eat/no_eat/absent`
    pub fn summary(&self) -> String {
        self.groups
            .iter()
            .map(|g| g.members.len().to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn render(&self) -> String {
        let mut out = match self.date {
            Some(date) => format!("🍽 Столовая на {}\n", date.format("%d.%m.%Y")),
            None => "🍽 Столовая\n".to_string(),
        };
        out.push_str(&format!("Всего: {} ({})\n", self.total(), self.summary()));
        for group in &self.groups {
            let members = if group.members.is_empty() {
                EMPTY_GROUP.to_string()
            } else {
                group.members.join(", ")
            };
            out.push_str(&format!(
                "\n{} {} — {}: {}",
                group.status.emoji(),
                group.status.label(),
                group.members.len(),
                members
            ));
        }
        out
    }
}

/// Render the current tally of a chat
pub fn render_tally(state: &ChatPollState) -> String {
    Tally::from_votes(&state.votes, state.date).render()
}
