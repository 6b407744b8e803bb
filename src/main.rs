use clap::Parser;
use tokio_util::sync::CancellationToken;

use classbot::cli::{self, Cli, Command, ConfigCommand};
use classbot::config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Start);

    // Commands that need no configuration
    match &command {
        Command::Version => {
            cli::handle_version();
            return Ok(());
        }
        Command::Config(ConfigCommand::Path) => {
            cli::handle_config_path(cli.config.as_deref());
            return Ok(());
        }
        _ => {}
    }

    let config_path = config::resolve_config_path(cli.config.as_deref());
    let cfg = config::load_config(&config_path)?;
    classbot::tracing::init_tracing(&cfg.logging)?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    match command {
        Command::Start => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, stopping");
                    on_signal.cancel();
                }
            });
            classbot::app::run_bot(&cfg, cancel).await?;
        }
        Command::Announce { date } => cli::handle_announce(&cfg, date).await?,
        Command::Catalog => cli::handle_catalog(&cfg).await,
        Command::Config(ConfigCommand::Show) => cli::handle_config_show(&cfg)?,
        Command::Config(ConfigCommand::Path) | Command::Version => {}
    }
    Ok(())
}
