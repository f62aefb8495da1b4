//! Pre-flight check: validates the config, probes the results feed,
//! sends a test message to the configured chat and prints the entry
//! windows a signal confirmed right now would get.
//!
//! Usage:
//!   cargo run --bin branco_check                  # reads branco.toml
//!   cargo run --bin branco_check -- other.toml
//!   cargo run --bin branco_check -- --no-send     # skip the Telegram message

use anyhow::{bail, Context, Result};
use chrono::Local;
use std::path::PathBuf;

use branco::config::Config;
use branco::feed::FeedFetcher;
use branco::messages;
use branco::notify::TelegramNotifier;
use branco::signal::{count_absences, entry_windows};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let no_send = args.iter().any(|a| a == "--no-send");
    let path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("branco.toml"));

    println!("=== Branco pre-flight check ===");

    // ── Step 1: Config ──────────────────────────────────────────────────────

    println!();
    println!("1. Config ({})", path.display());
    let config = if path.exists() {
        Config::load(&path).with_context(|| format!("loading {}", path.display()))?
    } else {
        println!("  {} not found, using environment only", path.display());
        Config::from_env()
    };
    if let Err(e) = config.validate() {
        println!("  FAIL {}", e);
        bail!("configuration is not usable");
    }
    let s = &config.strategy;
    println!("  OK  min absences: {}", s.min_absences);
    println!("  OK  entry offsets: {:?} min after confirmation", s.entry_offsets);
    println!("  OK  tolerance: {} min", s.tolerance_minutes);
    println!("  OK  daily cap: {}", s.max_signals_per_day);

    // ── Step 2: Feed ────────────────────────────────────────────────────────

    println!();
    println!("2. Feed ({})", config.feed.url);
    let fetcher = FeedFetcher::new(&config.feed).context("building feed client")?;
    match fetcher.try_fetch().await {
        Ok(outcomes) if !outcomes.is_empty() => {
            let latest: Vec<i64> = outcomes.iter().take(10).copied().collect();
            println!("  OK  latest outcomes: {:?}", latest);
            println!(
                "  OK  current absence run: {}",
                count_absences(&outcomes)
            );
        }
        Ok(_) => {
            println!("  FAIL feed answered with no outcomes");
            bail!("feed returned an empty list");
        }
        Err(e) => {
            println!("  FAIL {}", e);
            bail!("feed is not reachable or not in the expected format");
        }
    }

    // ── Step 3: Telegram ────────────────────────────────────────────────────

    println!();
    println!("3. Telegram");
    let notifier = TelegramNotifier::new(config.telegram.api_url.clone(), config.telegram.token.clone())
        .context("building Telegram client")?;
    match notifier.bot_username().await {
        Ok(name) => println!("  OK  bot connected: @{}", name),
        Err(e) => {
            println!("  FAIL {}", e);
            bail!("Telegram token rejected");
        }
    }
    if no_send {
        println!("  --  test message skipped (--no-send)");
    } else {
        let text = messages::self_test(Local::now().naive_local());
        if let Err(e) = notifier.send_message(&config.telegram.chat_id, &text).await {
            println!("  FAIL {}", e);
            bail!("could not post to chat {}", config.telegram.chat_id);
        }
        println!("  OK  test message sent to {}", config.telegram.chat_id);
    }

    // ── Step 4: Window preview ──────────────────────────────────────────────

    println!();
    println!("4. Windows for a signal confirmed now");
    let windows = entry_windows(Local::now().naive_local(), s);
    for (i, w) in windows.iter().enumerate() {
        println!(
            "  {}: {} ({} to {})",
            i + 1,
            w.center.format("%H:%M"),
            w.start().format("%H:%M"),
            w.end().format("%H:%M"),
        );
    }
    println!();
    println!("Message preview:");
    println!("{}", messages::signal_table(&windows, messages::Link::from_config(&config.telegram).as_ref()));

    println!("All checks passed. Start the bot with: cargo run --bin branco");
    Ok(())
}
