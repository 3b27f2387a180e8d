//! dealrelay CLI
//!
//! Local execution entry point: scheduled relay, single cycles, previews.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dealrelay::{
    channel::{ConsoleChannel, MessageChannel, TelegramChannel},
    error::{AppError, Result},
    models::{Config, SessionState, Subscriptions},
    pipeline::{self, Aggregator, MessageFormat, Pipeline, Scheduler},
    services::AdapterRegistry,
    utils::http,
};
use tokio::sync::watch;

/// dealrelay - Marketplace Deal Relay
#[derive(Parser, Debug)]
#[command(
    name = "dealrelay",
    version,
    about = "Aggregates marketplace offers and relays them to Telegram"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run cycles on the configured interval until Ctrl-C
    Run {
        /// Log messages instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a single cycle and exit
    Once {
        /// Log messages instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Fetch one slot and print its offers without sending anything
    Preview {
        /// Slot name as configured
        #[arg(long)]
        slot: String,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Telegram unless this is a dry run.
fn build_channel(config: &Config, client: &reqwest::Client, dry_run: bool) -> Result<Arc<dyn MessageChannel>> {
    if dry_run {
        log::info!("Dry run: messages are logged, not sent");
        return Ok(Arc::new(ConsoleChannel::new()));
    }
    Ok(Arc::new(TelegramChannel::from_config(
        &config.telegram,
        client.clone(),
    )?))
}

fn build_session(config: &Config) -> Arc<SessionState> {
    let subscriptions = Subscriptions::enabled_for(config.dispatch.destinations.iter().cloned());
    if subscriptions.active().is_empty() {
        log::warn!("No destinations configured (dispatch.destinations or DEALRELAY_DESTINATIONS)");
    }
    Arc::new(SessionState::new(subscriptions))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Ok(path) = dotenvy::dotenv() {
        log::debug!("Loaded environment from {}", path.display());
    }

    log::info!("dealrelay starting...");

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env();
    log::info!("Loaded configuration from {}", cli.config.display());

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }

    match cli.command {
        Command::Run { dry_run } => {
            let client = http::create_async_client(&config.http)?;
            let channel = build_channel(&config, &client, dry_run)?;
            let pipeline = Arc::new(Pipeline::from_config(&config, client, channel)?);
            let session = build_session(&config);

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => log::info!("Ctrl-C received, finishing the current cycle..."),
                    Err(e) => log::error!("Failed to listen for Ctrl-C: {}", e),
                }
                let _ = shutdown_tx.send(true);
            });

            let scheduler = Scheduler::from_config(&config.schedule);
            let cycles = pipeline::run_scheduled(pipeline, session, scheduler, shutdown_rx).await;
            log::info!("Stopped after {} cycle(s)", cycles);
        }

        Command::Once { dry_run } => {
            let client = http::create_async_client(&config.http)?;
            let channel = build_channel(&config, &client, dry_run)?;
            let pipeline = Pipeline::from_config(&config, client, channel)?;
            let session = build_session(&config);

            let stats = pipeline.run_cycle(&session.snapshot().await).await;
            if stats.dispatch.failed > 0 {
                log::warn!("{} send(s) failed", stats.dispatch.failed);
            }
        }

        Command::Preview { slot } => {
            let Some(slot_config) = config.slot(&slot) else {
                let names: Vec<&str> = config.slots.iter().map(|s| s.name.as_str()).collect();
                log::error!("Unknown slot '{}'. Configured: {}", slot, names.join(", "));
                return Err(AppError::config(format!("unknown slot '{slot}'")));
            };

            let client = http::create_async_client(&config.http)?;
            let registry = AdapterRegistry::from_config(&config, client)?;
            let aggregator = Aggregator::new(registry, &config);
            let format = MessageFormat::from_config(&config.dispatch);

            let batch = aggregator.run_slot(slot_config).await;
            for attempt in &batch.attempts {
                log::info!("{}: {:?}", attempt.source, attempt.status);
            }

            if batch.offers.is_empty() {
                log::info!("Slot '{}' produced no offers", batch.slot);
            }
            for (i, offer) in batch.offers.iter().enumerate() {
                let message = format.render(offer);
                let image = offer.image_url().unwrap_or("-");
                log::info!(
                    "#{} [{}] image: {}\n{}",
                    i + 1,
                    offer.source(),
                    image,
                    message.body()
                );
            }
        }

        Command::Validate => {
            log::info!("✓ Config OK ({} slot(s))", config.slots.len());
            if config.telegram.bot_token.is_none() {
                log::warn!("telegram.bot_token is not set; only --dry-run will work");
            }
            log::info!("All validations passed!");
        }
    }

    log::info!("Done!");

    Ok(())
}
