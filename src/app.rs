//! Application wiring
//!
//! Builds the shared services from a [`BotConfig`] and runs either the full
//! bot or a single announcer pass.

use std::error::Error;
use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bot::{run_polling, BotContext};
use crate::catalog::StaticCatalog;
use crate::channels::telegram::TelegramChannel;
use crate::channels::{Channel, ErrorOutcome};
use crate::chats::KnownChats;
use crate::clock::{Clock, SystemClock};
use crate::config::BotConfig;
use crate::cron::{spawn_daily_announcer, AnnounceOutcome, BirthdayAnnouncer, DailySchedule};
use crate::polls::PollStore;
use crate::security::logging::sanitize_error_message;
use crate::storage::JsonStore;

/// State shared by the update loop and the announcer
pub struct Services {
    pub store: JsonStore,
    pub clock: Arc<dyn Clock>,
    pub tz: Tz,
    pub catalog: Arc<StaticCatalog>,
    pub chats: Arc<KnownChats>,
    pub polls: Arc<PollStore>,
}

impl Services {
    pub async fn load(config: &BotConfig, clock: Arc<dyn Clock>) -> Result<Self, Box<dyn Error>> {
        let tz = config.timezone()?;
        let dir = config.data_dir();
        info!(data_dir = %dir.display(), timezone = %tz, "loading state");

        let store = JsonStore::new(&dir);
        let catalog = Arc::new(StaticCatalog::load(&dir).await);
        let chats = Arc::new(KnownChats::load(store.clone()).await);
        let polls = Arc::new(PollStore::new(
            store.clone(),
            clock.clone(),
            config.persist_interval(),
        ));
        Ok(Self {
            store,
            clock,
            tz,
            catalog,
            chats,
            polls,
        })
    }

    pub fn context(&self, channel: Arc<dyn Channel>) -> BotContext {
        BotContext {
            channel,
            polls: self.polls.clone(),
            chats: self.chats.clone(),
            catalog: self.catalog.clone(),
            clock: self.clock.clone(),
            tz: self.tz,
        }
    }

    pub async fn announcer(&self, channel: Arc<dyn Channel>) -> BirthdayAnnouncer {
        BirthdayAnnouncer::load(
            channel,
            self.catalog.clone(),
            self.chats.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.tz,
        )
        .await
    }
}

fn connect(config: &BotConfig) -> Result<Arc<TelegramChannel>, Box<dyn Error>> {
    config.require_token()?;
    Ok(Arc::new(TelegramChannel::new(config.telegram.clone())?))
}

/// Run the bot until `cancel` fires, then flush pending poll state
pub async fn run_bot(config: &BotConfig, cancel: CancellationToken) -> Result<(), Box<dyn Error>> {
    let telegram = connect(config)?;

    match telegram.get_me().await {
        Ok(me) => info!(bot = ?me.username, "connected to Telegram"),
        Err(e) if e.outcome() == ErrorOutcome::Fatal => return Err(Box::new(e)),
        Err(e) => warn!(error = %sanitize_error_message(&e), "could not verify bot identity"),
    }
    if let Err(e) = telegram.prepare_polling().await {
        warn!(error = %sanitize_error_message(&e), "could not reset webhook");
    }

    let services = Services::load(config, Arc::new(SystemClock)).await?;
    let channel: Arc<dyn Channel> = telegram.clone();

    let announcer_task = if config.birthdays.enabled {
        let announcer = Arc::new(services.announcer(channel.clone()).await);
        let schedule = DailySchedule {
            at: config.announce_time()?,
            catch_up_delay: config
                .birthdays
                .catch_up_on_start
                .then(|| std::time::Duration::from_secs(config.birthdays.catch_up_delay_secs)),
        };
        Some(spawn_daily_announcer(
            announcer,
            services.clock.clone(),
            schedule,
            cancel.clone(),
        ))
    } else {
        info!("birthday announcements disabled");
        None
    };

    let ctx = services.context(channel);
    run_polling(telegram.as_ref(), &ctx, cancel.clone()).await;

    cancel.cancel();
    if let Some(task) = announcer_task {
        if let Err(e) = task.await {
            error!(error = %e, "announcer task ended abnormally");
        }
    }
    let written = services.polls.flush_all().await;
    info!(written, "poll state flushed, shutting down");
    Ok(())
}

/// One announcer pass, optionally for a pretended local date
pub async fn announce_once(
    config: &BotConfig,
    date: Option<NaiveDate>,
) -> Result<AnnounceOutcome, Box<dyn Error>> {
    let telegram = connect(config)?;
    let services = Services::load(config, Arc::new(SystemClock)).await?;
    let announcer = services.announcer(telegram).await;
    let outcome = match date {
        Some(date) => announcer.run_for(date).await,
        None => announcer.run_once().await,
    };
    Ok(outcome)
}
