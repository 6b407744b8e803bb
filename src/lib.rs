//! classbot library
//!
//! Class-group Telegram assistant: a cafeteria attendance poll with a live
//! tally, a static schedule and duties browser, and a daily birthday
//! announcement pinned in every known chat.

pub mod app;
pub mod bot;
pub mod catalog;
pub mod channels;
pub mod chats;
pub mod cli;
pub mod clock;
pub mod config;
pub mod cron;
pub mod messages;
pub mod polls;
pub mod security;
pub mod storage;
pub mod tracing;
