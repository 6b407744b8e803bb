//! Update handling end to end: menus, poll lifecycle, persistence.

mod common;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Weekday;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use classbot::bot::dispatcher::UpdateSource;
use classbot::bot::{handle_update, menu, run_polling};
use classbot::catalog::{ProfileSchedule, StaticCatalog};
use classbot::channels::telegram::Update;
use classbot::channels::ChannelResult;
use classbot::chats::KNOWN_CHATS_FILE;
use classbot::polls::{PollDocument, VoteStatus};

use common::{callback, command, group, user, utc, Call, Harness};

const CHAT: i64 = -100500;

fn school_catalog() -> StaticCatalog {
    let mut catalog = StaticCatalog {
        duties: "Понедельник: Анна, Борис".to_string(),
        ..StaticCatalog::default()
    };
    catalog.schedule.insert(
        "it_group".to_string(),
        ProfileSchedule {
            days: vec![
                (Weekday::Mon, "1. Информатика\n2. Алгебра".to_string()),
                (Weekday::Tue, "1. Физика".to_string()),
            ],
        },
    );
    catalog
}

fn read_document(h: &Harness) -> PollDocument {
    let raw = std::fs::read(h.dir.path().join(format!("stolovaya_Class_10B_{CHAT}.json"))).unwrap();
    serde_json::from_slice(&raw).unwrap()
}

#[tokio::test]
async fn test_start_registers_chat_and_shows_menu() {
    let h = Harness::new(school_catalog(), utc(2024, 9, 2, 5, 0, 0)).await;
    let update = command(1, group(CHAT, "Class 10B"), user(1, "Anna", None), "/start@classbot");
    handle_update(&h.ctx, update).await;

    assert!(h.ctx.chats.contains(CHAT));
    assert!(h.dir.path().join(KNOWN_CHATS_FILE).exists());

    let calls = h.channel.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        Call::Send { text, keyboard, .. } => {
            assert_eq!(text, menu::MAIN_MENU_TEXT);
            assert_eq!(keyboard.as_ref(), Some(&menu::main_menu()));
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[tokio::test]
async fn test_other_messages_ignored() {
    let h = Harness::new(school_catalog(), utc(2024, 9, 2, 5, 0, 0)).await;
    handle_update(&h.ctx, command(1, group(CHAT, "Class 10B"), user(1, "Anna", None), "hello")).await;
    assert!(h.channel.calls().is_empty());
    assert!(!h.ctx.chats.contains(CHAT));
}

#[tokio::test]
async fn test_schedule_navigation() {
    let h = Harness::new(school_catalog(), utc(2024, 9, 2, 5, 0, 0)).await;
    let chat = group(CHAT, "Class 10B");
    let anna = user(1, "Anna", None);

    handle_update(&h.ctx, callback(1, chat.clone(), 50, anna.clone(), "menu_schedule")).await;
    handle_update(&h.ctx, callback(2, chat.clone(), 50, anna.clone(), "profile_it_group")).await;
    handle_update(&h.ctx, callback(3, chat.clone(), 50, anna.clone(), "day_it_group_mon")).await;
    handle_update(&h.ctx, callback(4, chat, 50, anna, "menu_duties")).await;

    let edits = h.channel.edits();
    assert_eq!(edits.len(), 4);
    assert!(edits.iter().all(|(c, m, _)| *c == CHAT && *m == 50));
    assert_eq!(edits[0].2, menu::SCHEDULE_MENU_TEXT);
    assert!(edits[1].2.contains("it_group"));
    assert!(edits[2].2.contains("Понедельник"));
    assert!(edits[2].2.contains("Информатика"));
    assert!(edits[3].2.contains("Анна, Борис"));

    let answers = h
        .channel
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Answer { .. }))
        .count();
    assert_eq!(answers, 4);
}

#[tokio::test]
async fn test_unknown_profile_answers_with_notice() {
    let h = Harness::new(school_catalog(), utc(2024, 9, 2, 5, 0, 0)).await;
    handle_update(
        &h.ctx,
        callback(1, group(CHAT, "Class 10B"), 50, user(1, "Anna", None), "profile_history"),
    )
    .await;
    assert!(h.channel.edits().is_empty());
    assert!(matches!(
        &h.channel.calls()[0],
        Call::Answer { text: Some(text), .. } if text == "Профиль не найден"
    ));
}

#[tokio::test]
async fn test_poll_lifecycle() {
    let h = Harness::new(school_catalog(), utc(2024, 9, 2, 5, 0, 0)).await;
    let chat = group(CHAT, "Class 10B");

    handle_update(&h.ctx, callback(1, chat.clone(), 50, user(1, "Anna", Some("anna")), "stol_new")).await;
    let sends = h.channel.sends();
    assert_eq!(sends.len(), 2);
    assert_eq!(sends[0].2, menu::POLL_TEXT);
    let results_id = sends[1].1;
    assert!(sends[1].2.contains("Всего: 0 (0/0/0)"));

    handle_update(&h.ctx, callback(2, chat.clone(), sends[0].1, user(1, "Anna", Some("anna")), "stol_eat")).await;
    handle_update(&h.ctx, callback(3, chat.clone(), sends[0].1, user(2, "Boris", None), "stol_no_eat")).await;
    handle_update(&h.ctx, callback(4, chat, sends[0].1, user(3, "Vika", None), "stol_absent")).await;

    let edits = h.channel.edits();
    assert_eq!(edits.len(), 3);
    assert!(edits.iter().all(|(_, m, _)| *m == results_id));
    let last = &edits[2].2;
    assert!(last.contains("(1/1/1)"));
    let eat = last.find("✅").unwrap();
    let no_eat = last.find("❌").unwrap();
    let absent = last.find("🏠").unwrap();
    assert!(eat < no_eat && no_eat < absent);
    assert!(last.contains("@anna"));

    let tally = h.ctx.polls.tally(CHAT);
    assert_eq!(tally.count(VoteStatus::Eat), 1);
    assert_eq!(tally.count(VoteStatus::NoEat), 1);
    assert_eq!(tally.count(VoteStatus::Absent), 1);
}

#[tokio::test]
async fn test_revote_replaces_previous_answer() {
    let h = Harness::new(school_catalog(), utc(2024, 9, 2, 5, 0, 0)).await;
    let chat = group(CHAT, "Class 10B");
    handle_update(&h.ctx, callback(1, chat.clone(), 60, user(1, "Anna", None), "stol_eat")).await;
    handle_update(&h.ctx, callback(2, chat, 60, user(1, "Anna", None), "stol_absent")).await;

    let tally = h.ctx.polls.tally(CHAT);
    assert_eq!(tally.total(), 1);
    assert_eq!(tally.count(VoteStatus::Absent), 1);
}

#[tokio::test]
async fn test_votes_are_debounced_on_disk() {
    let h = Harness::new(school_catalog(), utc(2024, 9, 2, 5, 0, 0)).await;
    let chat = group(CHAT, "Class 10B");

    handle_update(&h.ctx, callback(1, chat.clone(), 60, user(1, "Anna", None), "stol_eat")).await;
    assert_eq!(read_document(&h).votes.len(), 1);

    h.clock.advance(chrono::Duration::seconds(5));
    handle_update(&h.ctx, callback(2, chat.clone(), 60, user(2, "Boris", None), "stol_eat")).await;
    // Inside the window: memory has two votes, disk still one
    assert_eq!(h.ctx.polls.tally(CHAT).total(), 2);
    assert_eq!(read_document(&h).votes.len(), 1);

    h.clock.advance(chrono::Duration::seconds(8));
    handle_update(&h.ctx, callback(3, chat, 60, user(3, "Vika", None), "stol_no_eat")).await;
    assert_eq!(read_document(&h).votes.len(), 3);
}

#[tokio::test]
async fn test_votes_survive_restart() {
    let h = Harness::new(school_catalog(), utc(2024, 9, 2, 5, 0, 0)).await;
    let chat = group(CHAT, "Class 10B");
    handle_update(&h.ctx, callback(1, chat.clone(), 50, user(1, "Anna", None), "stol_new")).await;
    let results_id = h.channel.sends()[1].1;
    handle_update(&h.ctx, callback(2, chat.clone(), 50, user(1, "Anna", None), "stol_eat")).await;
    h.ctx.polls.flush_all().await;

    // Second process over the same directory
    let restarted = classbot::polls::PollStore::new(
        h.store(),
        h.clock.clone(),
        classbot::polls::DEFAULT_PERSIST_INTERVAL,
    );
    let mut ctx = h.ctx.clone();
    ctx.polls = std::sync::Arc::new(restarted);
    h.channel.clear();

    handle_update(&ctx, callback(3, chat, 50, user(2, "Boris", None), "stol_no_eat")).await;
    let edits = h.channel.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].1, results_id);
    assert!(edits[0].2.contains("(1/1/0)"));
}

/// Hands out scripted batches, then cancels the loop
struct ScriptedSource {
    batches: Mutex<Vec<Vec<Update>>>,
    cancel: CancellationToken,
}

#[async_trait]
impl UpdateSource for ScriptedSource {
    async fn fetch_updates(&self) -> ChannelResult<Vec<Update>> {
        let next = {
            let mut batches = self.batches.lock();
            if batches.is_empty() {
                None
            } else {
                Some(batches.remove(0))
            }
        };
        match next {
            Some(batch) => Ok(batch),
            None => {
                self.cancel.cancel();
                Ok(Vec::new())
            }
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(1)
    }
}

#[tokio::test]
async fn test_polling_loop_handles_updates_in_order() {
    let h = Harness::new(school_catalog(), utc(2024, 9, 2, 5, 0, 0)).await;
    let chat = group(CHAT, "Class 10B");
    let cancel = CancellationToken::new();
    let source = ScriptedSource {
        batches: Mutex::new(vec![
            vec![command(1, chat.clone(), user(1, "Anna", None), "/start")],
            vec![
                callback(2, chat.clone(), 70, user(1, "Anna", None), "stol_eat"),
                callback(3, chat, 70, user(1, "Anna", None), "stol_no_eat"),
            ],
        ]),
        cancel: cancel.clone(),
    };

    let handled = run_polling(&source, &h.ctx, cancel).await;
    assert_eq!(handled, 3);
    assert_eq!(h.ctx.polls.tally(CHAT).count(VoteStatus::NoEat), 1);
    assert_eq!(h.ctx.polls.tally(CHAT).count(VoteStatus::Eat), 0);
}
