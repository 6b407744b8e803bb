//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `start` (default) -- run the bot
//! - `announce [--date]` -- run one birthday announcer pass now
//! - `catalog` -- load the static data and print a summary
//! - `config show|path` -- inspect configuration
//! - `version` -- print build/version info

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::catalog::StaticCatalog;
use crate::config::{self, BotConfig};
use crate::cron::AnnounceOutcome;
use crate::security::redact_secrets;

/// Class-group Telegram assistant.
#[derive(Parser, Debug)]
#[command(
    name = "classbot",
    version = env!("CARGO_PKG_VERSION"),
    about = "Class-group Telegram assistant: cafeteria poll, schedule, duties and birthdays"
)]
pub struct Cli {
    /// Path to the JSON5 config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the bot (default when no subcommand is given).
    Start,

    /// Run one birthday announcement pass now, respecting the daily guard.
    Announce {
        /// Pretend the local date is this day (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Load the static catalog and print what was found.
    Catalog,

    /// Inspect configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version, build date, and git commit information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the loaded configuration (secrets redacted) as JSON.
    Show,

    /// Print the resolved configuration file path.
    Path,
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

/// Run the `config show` subcommand.
pub fn handle_config_show(config: &BotConfig) -> Result<(), Box<dyn std::error::Error>> {
    let value = serde_json::to_value(config)?;
    let pretty = serde_json::to_string_pretty(&redact_secrets(&value))?;
    println!("{}", pretty);
    Ok(())
}

/// Run the `config path` subcommand.
pub fn handle_config_path(explicit: Option<&Path>) {
    println!("{}", config::resolve_config_path(explicit).display());
}

/// Run the `catalog` subcommand.
pub async fn handle_catalog(config: &BotConfig) {
    let dir = config.data_dir();
    let catalog = StaticCatalog::load(&dir).await;
    println!("Data directory: {}", dir.display());
    println!("{}", catalog.summary());
    for birthday in &catalog.birthdays {
        println!("  {:02}.{:02}  {}", birthday.day, birthday.month, birthday.name);
    }
    for (profile, schedule) in &catalog.schedule {
        println!("  {} ({} days)", profile, schedule.days.len());
    }
}

/// Run the `announce` subcommand.
pub async fn handle_announce(
    config: &BotConfig,
    date: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let outcome = crate::app::announce_once(config, date).await?;
    println!("{}", describe_outcome(outcome));
    Ok(())
}

fn describe_outcome(outcome: AnnounceOutcome) -> String {
    match outcome {
        AnnounceOutcome::AlreadySent => "Already announced for this date".to_string(),
        AnnounceOutcome::NoBirthdays => "No birthdays on this date".to_string(),
        AnnounceOutcome::Sent { delivered, failed } => {
            format!("Announced in {} chat(s), {} failed", delivered, failed)
        }
    }
}

/// Run the `version` subcommand.
pub fn handle_version() {
    println!("classbot {}", env!("CARGO_PKG_VERSION"));
    println!("  Build date: {}", env!("CLASSBOT_BUILD_DATE"));
    println!("  Git commit: {}", env!("CLASSBOT_GIT_HASH"));
    println!(
        "  Platform:   {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
}
