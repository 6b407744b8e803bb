//! Update routing
//!
//! Turns inbound updates (the `/start` command and inline-button callbacks)
//! into menu navigation, poll actions and replies.

pub mod dispatcher;
pub mod handlers;
pub mod menu;

use std::sync::Arc;

use chrono::Weekday;
use chrono_tz::Tz;

use crate::catalog::StaticCatalog;
use crate::channels::Channel;
use crate::chats::KnownChats;
use crate::clock::Clock;
use crate::polls::{PollStore, VoteStatus};

pub use dispatcher::run_polling;
pub use handlers::handle_update;

/// Shared services handed to every handler
#[derive(Clone)]
pub struct BotContext {
    pub channel: Arc<dyn Channel>,
    pub polls: Arc<PollStore>,
    pub chats: Arc<KnownChats>,
    pub catalog: Arc<StaticCatalog>,
    pub clock: Arc<dyn Clock>,
    pub tz: Tz,
}

/// Decoded callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    MainMenu,
    ScheduleMenu,
    Duties,
    StolMenu,
    Profile(String),
    Day { profile: String, weekday: Weekday },
    NewPoll,
    Vote(VoteStatus),
    Results,
}

impl Action {
    /// Exact matches first, then the `profile_` and `day_` prefixes
    pub fn parse(data: &str) -> Option<Self> {
        let action = match data {
            menu::MAIN => Action::MainMenu,
            menu::SCHEDULE => Action::ScheduleMenu,
            menu::DUTIES => Action::Duties,
            menu::STOL => Action::StolMenu,
            menu::STOL_NEW => Action::NewPoll,
            menu::STOL_RESULTS => Action::Results,
            _ => {
                if let Some(status) = data.strip_prefix("stol_") {
                    return status.parse().ok().map(Action::Vote);
                }
                if let Some(profile) = data.strip_prefix("profile_") {
                    if profile.is_empty() {
                        return None;
                    }
                    return Some(Action::Profile(profile.to_string()));
                }
                let rest = data.strip_prefix("day_")?;
                // Profile names may themselves contain underscores
                let (profile, day) = rest.rsplit_once('_')?;
                if profile.is_empty() {
                    return None;
                }
                return Some(Action::Day {
                    profile: profile.to_string(),
                    weekday: day.parse().ok()?,
                });
            }
        };
        Some(action)
    }
}
