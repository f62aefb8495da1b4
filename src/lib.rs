//! Branco signal bot.
//!
//! Polls the roulette recent-results feed, arms a signal when the white
//! (branco) outcome has been absent long enough, and posts the entry
//! windows, wins and signal results to a Telegram chat.

pub mod config;
pub mod feed;
pub mod messages;
pub mod notify;
pub mod runner;
pub mod signal;
pub mod stats;
