//! Command-line arguments.

use clap::{Parser, ValueEnum};

use crate::fetch::DEFAULT_LIMIT;

/// Print the newest posts of a subreddit.
///
/// Credentials are read from the environment (or a `.env` file):
/// APP_ID, APP_SECRET, APP_NAME, and optionally REDIRECT_URI and
/// RATELIMIT_SECONDS.
#[derive(Debug, Parser)]
#[command(name = "subreddit-newest", version)]
pub struct Args {
    /// Subreddit to read, with or without the `r/` prefix.
    #[arg(long, env = "TOPIC", value_parser = parse_topic)]
    pub topic: String,

    /// Number of posts to fetch.
    #[arg(long, env = "LIMIT", default_value_t = DEFAULT_LIMIT)]
    pub limit: u32,

    /// How to wait out rate limits.
    #[arg(long, env = "FETCH_MODE", value_enum, default_value_t = Mode::Blocking)]
    pub mode: Mode,

    /// Give up after this many rate-limited retries (default: never).
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Log debug events.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Single thread; sleep the configured delay, blocking the process.
    Blocking,
    /// Async task; sleep as long as the server asks, yielding meanwhile.
    Cooperative,
}

fn parse_topic(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    let name = name.strip_prefix("r/").unwrap_or(name);
    if name.is_empty() {
        return Err("topic must not be empty".to_string());
    }
    Ok(name.to_string())
}
