use anyhow::{bail, Context};
use branco::config::{self, Config};
use branco::feed::FeedFetcher;
use branco::messages::Link;
use branco::notify::TelegramNotifier;
use branco::runner::Bot;
use branco::signal::SignalEngine;
use chrono::Local;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

const DEFAULT_CONFIG: &str = "branco.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    // Load config
    let config = if path.exists() {
        Config::load(&path).with_context(|| format!("loading {}", path.display()))?
    } else if std::env::var("TELEGRAM_TOKEN").is_ok() && std::env::var("TELEGRAM_CHAT_ID").is_ok() {
        Config::from_env()
    } else {
        config::write_example(&path)
            .with_context(|| format!("writing example config to {}", path.display()))?;
        bail!(
            "{} not found; an example was written there. Fill in telegram.token and telegram.chat_id \
             (or set TELEGRAM_TOKEN / TELEGRAM_CHAT_ID) and start again",
            path.display()
        );
    };

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    if !path.exists() {
        info!("no config file found, using env-only config");
    }
    config.validate().context("invalid configuration")?;

    info!("branco v{} starting", env!("CARGO_PKG_VERSION"));
    info!(
        min_absences = config.strategy.min_absences,
        offsets = ?config.strategy.entry_offsets,
        tolerance_min = config.strategy.tolerance_minutes,
        max_per_day = config.strategy.max_signals_per_day,
        mode = if config.strategy.min_absences <= 0 { "on-target" } else { "absence" },
        "strategy"
    );

    let fetcher = FeedFetcher::new(&config.feed).context("building feed client")?;
    info!(url = %fetcher.url(), timeout_secs = config.feed.timeout_secs, retries = config.feed.retry_attempts, "feed");

    let notifier = TelegramNotifier::new(config.telegram.api_url.clone(), config.telegram.token.clone())
        .context("building Telegram client")?;
    match notifier.bot_username().await {
        Ok(name) => info!(bot = %name, "Telegram bot authenticated"),
        Err(e) => warn!(error = %e, "could not verify Telegram token, continuing"),
    }

    let engine = SignalEngine::new(config.strategy.clone(), Local::now().date_naive());
    let mut bot = Bot::new(fetcher, notifier, engine, config.telegram.chat_id.clone())
        .with_link(Link::from_config(&config.telegram))
        .with_status_every(config.runner.status_every_ticks);

    // Ctrl-C flips the shutdown flag; the loop finishes its tick first
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!(error = %e, "failed to listen for ctrl-c");
                // Hold the sender forever; a closed channel stops the loop
                let _keep = shutdown_tx;
                std::future::pending::<()>().await
            }
        }
    });

    bot.run(Duration::from_millis(config.runner.poll_interval_ms), shutdown_rx)
        .await;

    Ok(())
}
