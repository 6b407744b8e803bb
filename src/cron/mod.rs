//! Daily jobs
//!
//! The birthday announcer runs at a fixed local wall-clock time every day,
//! plus one catch-up pass shortly after start-up so a run missed while the
//! bot was down still happens the same day.

pub mod announcer;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use announcer::{AnnounceOutcome, BirthdayAnnouncer, DayState};

use crate::clock::Clock;

/// Parse an `HH:MM` wall-clock time
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// Longest DST gap searched when a wall-clock time does not exist
const MAX_GAP_MINUTES: i64 = 3 * 60;

/// Resolve a local wall-clock time. A time inside a DST gap resolves to the
/// first valid minute after it; an ambiguous time to its earlier instant.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    for minutes in 0..=MAX_GAP_MINUTES {
        let candidate = local + chrono::Duration::minutes(minutes);
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest.with_timezone(&Utc)),
            LocalResult::None => continue,
        }
    }
    None
}

/// First instant strictly after `now` at which the local clock in `tz` reads `at`
pub fn next_run_after(now: DateTime<Utc>, tz: Tz, at: NaiveTime) -> Option<DateTime<Utc>> {
    let today = now.with_timezone(&tz).date_naive();
    (0..=2u64)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .filter_map(|date| resolve_local(tz, date.and_time(at)))
        .find(|run| *run > now)
}

/// Schedule settings of the announcer loop
#[derive(Debug, Clone, Copy)]
pub struct DailySchedule {
    pub at: NaiveTime,
    pub catch_up_delay: Option<Duration>,
}

/// Spawn the announcer loop. It stops when `cancel` fires.
pub fn spawn_daily_announcer(
    announcer: Arc<BirthdayAnnouncer>,
    clock: Arc<dyn Clock>,
    schedule: DailySchedule,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Some(delay) = schedule.catch_up_delay {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            let outcome = announcer.run_once().await;
            info!(?outcome, "catch-up announcer run finished");
        }

        loop {
            let now = clock.now();
            let Some(next) = next_run_after(now, announcer.timezone(), schedule.at) else {
                tracing::error!("could not compute next announcer run, stopping");
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(next = %next, wait_secs = wait.as_secs(), "next announcer run scheduled");

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("announcer loop cancelled");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            let outcome = announcer.run_once().await;
            info!(?outcome, "scheduled announcer run finished");
        }
    })
}
