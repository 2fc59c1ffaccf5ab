use std::sync::Arc;

use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::prelude::{Context, EventHandler};
use tracing::info;

use rollup_core::config::DiscordConfig;
use rollup_digest::RollupRunner;

/// Serenity event handler wired to the rollup runner.
pub struct RollupHandler {
    pub runner: Arc<RollupRunner>,
    pub config: DiscordConfig,
}

#[async_trait]
impl EventHandler for RollupHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(name = %ready.user.name, guilds = ready.guilds.len(), "Discord bot connected");

        if self.config.slash_commands {
            let guild = self.config.guild_id.filter(|id| *id != 0).map(GuildId::new);
            crate::commands::register_commands(
                &ctx,
                guild,
                self.runner.config().manual_window_hours,
            )
            .await;
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            crate::commands::handle_interaction(&self.runner, &ctx, &command).await;
        }
    }
}
