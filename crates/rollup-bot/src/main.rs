use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use rollup_agent::{LlmProvider, OpenAiProvider, Summarizer};
use rollup_core::config::OpenAiConfig;
use rollup_core::RollupConfig;
use rollup_digest::RollupRunner;
use rollup_discord::{DiscordAdapter, SerenityGateway};
use rollup_scheduler::DailySchedule;
use rollup_store::CheckpointStore;

mod cli;

use cli::{Cli, Commands, RunOnceArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollup_bot=info,rollup_digest=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > ROLLUP_CONFIG env > ~/.rollup/rollup.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("ROLLUP_CONFIG").ok());
    let config = RollupConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        let mut config = RollupConfig::default();
        config.apply_legacy_env(|key| std::env::var(key).ok());
        config
    });
    if let Err(e) = config.forum_channel_id() {
        warn!("{e}; rollups will be skipped until it is set");
    }

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    rollup_store::db::init_db(&db)?;
    let store = Arc::new(CheckpointStore::new(db));

    let summarizer = build_summarizer(&config)?;
    let runner = Arc::new(RollupRunner::new(
        store,
        summarizer,
        config.rollup.clone(),
    ));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config, runner).await,
        Commands::RunOnce(args) => run_once(&config, &runner, &args).await,
    }
}

/// Connect to Discord and run until Ctrl-C.
async fn serve(config: &RollupConfig, runner: Arc<RollupRunner>) -> anyhow::Result<()> {
    let Some(ref discord_cfg) = config.discord else {
        anyhow::bail!("no Discord bot token configured ([discord] bot_token or DISCORD_TOKEN)");
    };

    let schedule = config
        .schedule
        .enabled
        .then(|| DailySchedule::from(&config.schedule));
    let adapter = DiscordAdapter::new(discord_cfg, runner, schedule)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    info!("Discord bot starting");

    tokio::select! {
        _ = adapter.run(shutdown_rx) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("failed to listen for Ctrl-C: {e}");
            }
            info!("shutdown requested");
        }
    }

    // signal the daily trigger to stop
    let _ = shutdown_tx.send(true);
    Ok(())
}

/// One run over the REST client; prints the report as JSON.
async fn run_once(
    config: &RollupConfig,
    runner: &RollupRunner,
    args: &RunOnceArgs,
) -> anyhow::Result<()> {
    let token = config
        .discord
        .as_ref()
        .map(|d| d.bot_token.trim())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow::anyhow!("no Discord bot token configured"))?;

    let http = Arc::new(serenity::http::Http::new(token));
    let gateway = SerenityGateway::new(http);
    let report = runner.run(&gateway, args.options()).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.aborted {
        anyhow::bail!("rollup aborted: configuration incomplete");
    }
    Ok(())
}

/// Build the summarizer from `[openai]` (or `OPENAI_API_KEY`).
///
/// Without a key the summarizer is left unconfigured and every run is
/// skipped with an error log.
fn build_summarizer(config: &RollupConfig) -> anyhow::Result<Summarizer> {
    let timeout = config.rollup.call_timeout();
    let openai = config
        .openai
        .as_ref()
        .filter(|o| !o.api_key.trim().is_empty());

    let Some(openai) = openai else {
        warn!("no OpenAI API key configured; rollups will be skipped");
        let defaults = OpenAiConfig::with_key(String::new());
        return Ok(Summarizer::new(
            None,
            defaults.model,
            defaults.temperature,
            timeout,
        ));
    };

    info!(model = %openai.model, "LLM provider: OpenAI ({})", openai.base_url);
    let provider = OpenAiProvider::new(
        openai.api_key.clone(),
        Some(openai.base_url.clone()),
        timeout,
    )?;
    Ok(Summarizer::new(
        Some(Arc::new(provider) as Arc<dyn LlmProvider>),
        openai.model.clone(),
        openai.temperature,
        timeout,
    ))
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
