//! subreddit-newest — log the newest posts of a subreddit, riding out
//! rate limits.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────┐         ┌───────────┐  list_newest()  ┌─────────────────┐
//! │  cli.rs  │ ──────► │ fetch.rs  │ ──────────────► │ source/reddit.rs│
//! │ settings │         │ (retry)   │ ◄── RawItem ─── │ (HTTP + OAuth)  │
//! └──────────┘         └───────────┘                 └─────────────────┘
//!                            │ Vec<PostRecord>
//!                            ▼
//!                      ┌────────────┐
//!                      │ present.rs │
//!                      └────────────┘
//! ```
//!
//! * **`source/`** — the `ForumClient` trait, `RawItem` / `PostRecord`, and
//!   the Reddit implementation.
//! * **`fetch`** — the retry loop, parameterised over how it sleeps.
//! * **`present`** — one log line per post.
//! * **`settings`** / **`cli`** — environment and command-line input.
//! * **`logging`** — the process-wide `tracing` subscriber.
//! * **`main`** — wires everything together on a runtime matching `--mode`.

mod cli;
mod error;
mod fetch;
mod logging;
mod present;
mod settings;
mod source;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info_span};

use cli::{Args, Mode};
use fetch::{BlockingSleep, CooperativeSleep, FetchController, FetchRequest};
use settings::Settings;
use source::RedditClient;

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose)?;

    let settings = Settings::from_env().context("invalid settings")?;
    let request = FetchRequest::new(args.topic.as_str(), args.limit)?;

    // Blocking mode keeps a single thread, so its sleep stalls everything.
    let runtime = match args.mode {
        Mode::Blocking => tokio::runtime::Builder::new_current_thread(),
        Mode::Cooperative => tokio::runtime::Builder::new_multi_thread(),
    }
    .enable_all()
    .build()
    .context("failed to start async runtime")?;

    runtime.block_on(run(args.mode, args.max_retries, &settings, &request))
}

async fn run(
    mode: Mode,
    max_retries: Option<u32>,
    settings: &Settings,
    request: &FetchRequest,
) -> Result<()> {
    // Owned by the controller and dropped with it at the end of its arm.
    let client = RedditClient::connect(settings)
        .await
        .inspect_err(|e| error!(error = %e, "Error during Reddit connection"))
        .context("could not connect to Reddit")?;

    let posts = match mode {
        Mode::Blocking => {
            let span = info_span!("fetch", mode = "blocking");
            let mut controller =
                FetchController::new(client, BlockingSleep::new(settings.ratelimit()), span)
                    .with_max_retries(max_retries);
            controller.fetch(request).await
        }
        Mode::Cooperative => {
            let span = info_span!("fetch", mode = "cooperative");
            let mut controller =
                FetchController::new(client, CooperativeSleep::new(settings.ratelimit()), span)
                    .with_max_retries(max_retries);
            controller.fetch(request).await
        }
    };

    present::present(&posts);
    Ok(())
}
