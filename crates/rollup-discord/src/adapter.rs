use std::sync::Arc;
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tokio::sync::watch;
use tracing::{error, info, warn};

use rollup_core::config::DiscordConfig;
use rollup_digest::RollupRunner;
use rollup_scheduler::{DailySchedule, DailyTrigger};

use crate::error::DiscordError;
use crate::handler::RollupHandler;

/// Discord adapter.
///
/// Wraps a serenity `Client` and drives the event loop until the process exits.
/// Reconnects automatically whenever the gateway drops.
pub struct DiscordAdapter {
    runner: Arc<RollupRunner>,
    config: DiscordConfig,
    trigger: Option<DailyTrigger>,
}

impl DiscordAdapter {
    /// `schedule = None` disables the daily run; `/rollup` stays available.
    pub fn new(
        config: &DiscordConfig,
        runner: Arc<RollupRunner>,
        schedule: Option<DailySchedule>,
    ) -> Result<Self, DiscordError> {
        if config.bot_token.trim().is_empty() {
            return Err(DiscordError::NoToken);
        }
        let trigger = schedule.map(DailyTrigger::new).transpose()?;
        Ok(Self {
            runner,
            config: config.clone(),
            trigger,
        })
    }

    /// Connect to Discord and keep reconnecting whenever the gateway drops.
    ///
    /// Never returns; runs for the lifetime of the process.
    ///
    /// The daily trigger is spawned once. It uses `Arc<Http>` (Discord REST,
    /// not the gateway WebSocket), so it keeps working across reconnects.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MESSAGE_REACTIONS;

        // Build first client, retrying indefinitely until initial connection succeeds.
        let first_client = loop {
            match self.build_client(intents).await {
                Ok(c) => break c,
                Err(e) => {
                    error!("Discord: initial connect failed ({e}), retrying in 30s");
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
        };

        if let Some(trigger) = self.trigger.take() {
            let http = Arc::clone(&first_client.http);
            tokio::spawn(crate::scheduled::run_scheduled_rollups(
                trigger,
                Arc::clone(&self.runner),
                http,
                shutdown,
            ));
        } else {
            info!("Discord: daily rollup disabled");
        }

        let mut client = first_client;

        loop {
            info!("Discord: gateway connecting");

            if let Err(e) = client.start().await {
                warn!("Discord: gateway error ({e}), reconnecting in 5s");
            } else {
                info!("Discord: gateway stopped cleanly, reconnecting in 5s");
            }

            tokio::time::sleep(Duration::from_secs(5)).await;

            client = loop {
                match self.build_client(intents).await {
                    Ok(c) => break c,
                    Err(e) => {
                        error!("Discord: reconnect failed ({e}), retrying in 30s");
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                }
            };
        }
    }

    async fn build_client(&self, intents: GatewayIntents) -> Result<Client, serenity::Error> {
        let handler = RollupHandler {
            runner: Arc::clone(&self.runner),
            config: self.config.clone(),
        };

        Client::builder(&self.config.bot_token, intents)
            .event_handler(handler)
            .await
    }
}
