//! Menu texts and inline keyboards.

use chrono::Weekday;

use crate::catalog::{day_callback, profile_callback, weekday_name, ProfileSchedule, StaticCatalog};
use crate::channels::{Button, Keyboard};
use crate::polls::VoteStatus;

pub const MAIN_MENU_TEXT: &str = "Выбери раздел:";
pub const SCHEDULE_MENU_TEXT: &str = "📚 Выбери профиль:";
pub const NO_SCHEDULE_TEXT: &str = "Расписание пока не добавлено.";
pub const NO_DUTIES_TEXT: &str = "Список дежурств пока пуст.";
pub const STOL_MENU_TEXT: &str = "🍽 Столовая\n\nСоздай новый опрос или посмотри результаты.";
pub const POLL_TEXT: &str = "🍽 Кто сегодня идёт в столовую?";

pub const MAIN: &str = "menu_main";
pub const SCHEDULE: &str = "menu_schedule";
pub const DUTIES: &str = "menu_duties";
pub const STOL: &str = "menu_stol";
pub const STOL_NEW: &str = "stol_new";
pub const STOL_RESULTS: &str = "stol_results";

/// Callback data of a vote button
pub fn vote_callback(status: VoteStatus) -> String {
    format!("stol_{}", status.as_str())
}

fn back_to_main() -> Button {
    Button::new("⬅️ Назад", MAIN)
}

pub fn main_menu() -> Keyboard {
    Keyboard::new()
        .button("📅 Расписание", SCHEDULE)
        .button("🧹 Дежурства", DUTIES)
        .button("🍽 Столовая", STOL)
}

pub fn schedule_menu(catalog: &StaticCatalog) -> (String, Keyboard) {
    let mut keyboard = Keyboard::new();
    for profile in catalog.profiles() {
        keyboard = keyboard.button(profile, profile_callback(profile));
    }
    let text = if catalog.schedule.is_empty() {
        NO_SCHEDULE_TEXT
    } else {
        SCHEDULE_MENU_TEXT
    };
    (text.to_string(), keyboard.row(vec![back_to_main()]))
}

pub fn profile_menu(profile: &str, schedule: &ProfileSchedule) -> (String, Keyboard) {
    let mut keyboard = Keyboard::new();
    for (weekday, _) in &schedule.days {
        keyboard = keyboard.button(weekday_name(*weekday), day_callback(profile, *weekday));
    }
    let keyboard = keyboard.row(vec![Button::new("⬅️ Профили", SCHEDULE), back_to_main()]);
    (format!("📚 {profile}\n\nВыбери день:"), keyboard)
}

pub fn day_view(profile: &str, weekday: Weekday, text: &str) -> (String, Keyboard) {
    let keyboard = Keyboard::new().row(vec![
        Button::new("⬅️ Дни", profile_callback(profile)),
        back_to_main(),
    ]);
    (
        format!("📅 {profile}, {}\n\n{text}", weekday_name(weekday)),
        keyboard,
    )
}

pub fn duties_view(catalog: &StaticCatalog) -> (String, Keyboard) {
    let text = if catalog.duties.is_empty() {
        NO_DUTIES_TEXT.to_string()
    } else {
        format!("🧹 Дежурства\n\n{}", catalog.duties)
    };
    (text, Keyboard::new().row(vec![back_to_main()]))
}

pub fn stol_menu() -> Keyboard {
    Keyboard::new()
        .button("🆕 Новый опрос", STOL_NEW)
        .button("📊 Результаты", STOL_RESULTS)
        .row(vec![back_to_main()])
}

/// Vote buttons attached to a poll message
pub fn poll_keyboard() -> Keyboard {
    Keyboard::new().row(
        VoteStatus::ALL
            .iter()
            .map(|s| Button::new(format!("{} {}", s.emoji(), s.label()), vote_callback(*s)))
            .collect(),
    )
}
