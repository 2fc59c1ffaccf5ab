use chrono::{Duration as ChronoDuration, Utc};
use clap::{Args, Parser, Subcommand};

use rollup_digest::RunOptions;

#[derive(Parser)]
#[command(name = "rollup-bot")]
#[command(version, about = "Daily AI rollups of a Discord project forum")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to $ROLLUP_CONFIG, then ~/.rollup/rollup.toml)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to Discord: daily schedule plus the /rollup command (default)
    Serve,

    /// Perform a single rollup over the REST API and print the run report
    RunOnce(RunOnceArgs),
}

#[derive(Args, Debug, Default)]
pub struct RunOnceArgs {
    /// Summarise the last N hours instead of reading from the stored cursors
    #[arg(long)]
    pub since_hours: Option<u32>,

    /// Post to this channel instead of the configured default
    #[arg(long)]
    pub channel: Option<String>,

    /// Advance cursors even for a --since-hours run
    #[arg(long)]
    pub advance: bool,
}

impl RunOnceArgs {
    pub fn options(&self) -> RunOptions {
        RunOptions {
            cutoff: self
                .since_hours
                .map(|h| Utc::now() - ChronoDuration::hours(i64::from(h))),
            target_channel: self.channel.clone(),
            advance_cursor: self.advance.then_some(true),
        }
    }
}
