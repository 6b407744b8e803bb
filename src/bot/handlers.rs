//! Update handlers.
//!
//! Every handler logs and swallows its own transport failures; nothing here
//! can stop the update loop.

use tracing::debug;

use super::menu;
use super::{Action, BotContext};
use crate::channels::telegram::{CallbackQuery, Message, Update};
use crate::channels::{ChatId, Keyboard, MessageId, SendOptions};
use crate::messages::delivery;
use crate::polls::{VoteStatus, Voter};

/// Route one update
pub async fn handle_update(ctx: &BotContext, update: Update) {
    if let Some(query) = update.callback_query {
        handle_callback(ctx, query).await;
    } else if let Some(message) = update.message {
        handle_message(ctx, message).await;
    }
}

async fn handle_message(ctx: &BotContext, message: Message) {
    if message.command() != Some("start") {
        return;
    }
    let chat_id = message.chat.id;
    ctx.chats.register(chat_id).await;
    ctx.polls.touch(chat_id, message.chat.title.as_deref());

    let options = SendOptions::with_keyboard(menu::main_menu());
    if let Err(e) = delivery::send(ctx.channel.as_ref(), chat_id, menu::MAIN_MENU_TEXT, options).await {
        delivery::log_failure("send_message", chat_id, &e);
    }
}

async fn handle_callback(ctx: &BotContext, query: CallbackQuery) {
    let Some(message) = query.message.as_ref() else {
        answer(ctx, &query.id, None).await;
        return;
    };
    let chat_id = message.chat.id;
    let message_id = message.message_id;
    ctx.chats.register(chat_id).await;
    ctx.polls.touch(chat_id, message.chat.title.as_deref());

    let Some(action) = query.data.as_deref().and_then(Action::parse) else {
        debug!(chat_id, data = ?query.data, "ignoring unknown callback");
        answer(ctx, &query.id, None).await;
        return;
    };

    let notice = match action {
        Action::MainMenu => {
            show(ctx, chat_id, message_id, menu::MAIN_MENU_TEXT, &menu::main_menu()).await;
            None
        }
        Action::ScheduleMenu => {
            let (text, keyboard) = menu::schedule_menu(&ctx.catalog);
            show(ctx, chat_id, message_id, &text, &keyboard).await;
            None
        }
        Action::Profile(profile) => match ctx.catalog.profile(&profile) {
            Some(schedule) => {
                let (text, keyboard) = menu::profile_menu(&profile, schedule);
                show(ctx, chat_id, message_id, &text, &keyboard).await;
                None
            }
            None => Some("Профиль не найден".to_string()),
        },
        Action::Day { profile, weekday } => {
            match ctx.catalog.profile(&profile).and_then(|s| s.day(weekday)) {
                Some(day_text) => {
                    let (text, keyboard) = menu::day_view(&profile, weekday, day_text);
                    show(ctx, chat_id, message_id, &text, &keyboard).await;
                    None
                }
                None => Some("Расписание на этот день не найдено".to_string()),
            }
        }
        Action::Duties => {
            let (text, keyboard) = menu::duties_view(&ctx.catalog);
            show(ctx, chat_id, message_id, &text, &keyboard).await;
            None
        }
        Action::StolMenu => {
            show(ctx, chat_id, message_id, menu::STOL_MENU_TEXT, &menu::stol_menu()).await;
            None
        }
        Action::NewPoll => new_poll(ctx, chat_id).await,
        Action::Vote(status) => vote(ctx, chat_id, Voter::from(&query.from), status).await,
        Action::Results => {
            post_results(ctx, chat_id).await;
            None
        }
    };

    answer(ctx, &query.id, notice.as_deref()).await;
}

/// Replace a menu message in place
async fn show(ctx: &BotContext, chat_id: ChatId, message_id: MessageId, text: &str, keyboard: &Keyboard) {
    if let Err(e) = delivery::edit(ctx.channel.as_ref(), chat_id, message_id, text, Some(keyboard)).await {
        delivery::log_failure("edit_message", chat_id, &e);
    }
}

async fn answer(ctx: &BotContext, query_id: &str, text: Option<&str>) {
    let channel = ctx.channel.as_ref();
    if let Err(e) =
        delivery::with_retry("answer_callback", move || channel.answer_callback(query_id, text)).await
    {
        // Expired queries are common and harmless
        debug!(error = %e, "callback answer failed");
    }
}

/// Post a fresh poll plus an empty results message
async fn new_poll(ctx: &BotContext, chat_id: ChatId) -> Option<String> {
    let channel = ctx.channel.as_ref();
    let options = SendOptions::with_keyboard(menu::poll_keyboard());
    let poll_id = match delivery::send(channel, chat_id, menu::POLL_TEXT, options).await {
        Ok(id) => id,
        Err(e) => {
            delivery::log_failure("send_message", chat_id, &e);
            return Some("Не удалось создать опрос".to_string());
        }
    };

    let date = ctx.clock.today(ctx.tz);
    ctx.polls.start_new_poll(chat_id, date, Some(poll_id), None);
    let text = ctx.polls.render(chat_id);
    match delivery::send(channel, chat_id, &text, SendOptions::default()).await {
        Ok(results_id) => ctx.polls.set_results_message(chat_id, results_id),
        Err(e) => delivery::log_failure("send_message", chat_id, &e),
    }
    ctx.polls.persist_if_due(chat_id).await;
    None
}

async fn vote(ctx: &BotContext, chat_id: ChatId, voter: Voter, status: VoteStatus) -> Option<String> {
    ctx.polls.rehydrate(chat_id).await;
    ctx.polls.record_vote(chat_id, &voter, status);
    refresh_results(ctx, chat_id).await;
    ctx.polls.persist_if_due(chat_id).await;
    Some(format!("Голос учтён: {}", status.label()))
}

/// Edit the tracked results message, or post one if there is none
async fn refresh_results(ctx: &BotContext, chat_id: ChatId) {
    let text = ctx.polls.render(chat_id);
    let channel = ctx.channel.as_ref();
    match ctx.polls.results_message(chat_id) {
        Some(results_id) => {
            if let Err(e) = delivery::edit(channel, chat_id, results_id, &text, None).await {
                delivery::log_failure("edit_message", chat_id, &e);
            }
        }
        None => match delivery::send(channel, chat_id, &text, SendOptions::default()).await {
            Ok(results_id) => ctx.polls.set_results_message(chat_id, results_id),
            Err(e) => delivery::log_failure("send_message", chat_id, &e),
        },
    }
}

/// Post the current tally as a new message and track it for later edits
async fn post_results(ctx: &BotContext, chat_id: ChatId) {
    ctx.polls.rehydrate(chat_id).await;
    let text = ctx.polls.render(chat_id);
    match delivery::send(ctx.channel.as_ref(), chat_id, &text, SendOptions::default()).await {
        Ok(results_id) => {
            ctx.polls.set_results_message(chat_id, results_id);
            ctx.polls.persist_if_due(chat_id).await;
        }
        Err(e) => delivery::log_failure("send_message", chat_id, &e),
    }
}
