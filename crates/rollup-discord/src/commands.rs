//! Discord slash command `/rollup`.
//!
//! Registration happens in `ready()` when `config.slash_commands` is true.
//! Interactions are dispatched from `interaction_create` in the event handler.

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use serenity::builder::{
    CreateCommand, CreateInteractionResponse, CreateInteractionResponseMessage,
    EditInteractionResponse,
};
use serenity::model::application::CommandInteraction;
use serenity::model::id::GuildId;
use serenity::prelude::Context;
use tracing::{info, warn};

use rollup_digest::{RollupRunner, RunOptions, RunReport};

use crate::gateway::SerenityGateway;

pub const ROLLUP_COMMAND: &str = "rollup";

/// Register the `/rollup` command, guild-scoped when `guild_id` is set.
pub async fn register_commands(ctx: &Context, guild_id: Option<GuildId>, window_hours: u32) {
    let commands = vec![CreateCommand::new(ROLLUP_COMMAND).description(format!(
        "Post a project rollup for the last {window_hours} hours"
    ))];

    match guild_id {
        Some(gid) => match gid.set_commands(&ctx.http, commands).await {
            Ok(cmds) => info!(guild = %gid, count = cmds.len(), "registered guild slash commands"),
            Err(e) => warn!(guild = %gid, error = %e, "failed to register guild commands"),
        },
        None => {
            match serenity::model::application::Command::set_global_commands(&ctx.http, commands)
                .await
            {
                Ok(cmds) => info!(count = cmds.len(), "registered global slash commands"),
                Err(e) => warn!(error = %e, "failed to register global slash commands"),
            }
        }
    }
}

/// Dispatch a slash command interaction.
pub async fn handle_interaction(runner: &Arc<RollupRunner>, ctx: &Context, command: &CommandInteraction) {
    let result = match command.data.name.as_str() {
        ROLLUP_COMMAND => handle_rollup(runner, ctx, command).await,
        _ => {
            respond_ephemeral(ctx, command, "Unknown command.").await;
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!(command = %command.data.name, error = %e, "slash command error");
    }
}

/// `/rollup`: summarise the last window into the invoking channel.
///
/// Cursors are left untouched so the next scheduled digest is unaffected.
async fn handle_rollup(
    runner: &Arc<RollupRunner>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<(), serenity::Error> {
    // Defer the response (shows "thinking..." to the invoker only).
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new().ephemeral(true),
            ),
        )
        .await?;

    let hours = runner.config().manual_window_hours;
    info!(
        user = %command.user.id,
        channel_id = %command.channel_id,
        hours,
        "manual rollup requested"
    );

    let gateway = SerenityGateway::new(Arc::clone(&ctx.http));
    let options = RunOptions::manual(
        ChronoDuration::hours(i64::from(hours)),
        command.channel_id.to_string(),
    );
    let report = runner.run(&gateway, options).await;

    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().content(reply_text(&report, hours)),
        )
        .await?;
    Ok(())
}

fn reply_text(report: &RunReport, hours: u32) -> String {
    if report.aborted {
        "Could not run the rollup: the bot is missing configuration. Check the logs.".to_string()
    } else {
        format!("Project rollup posted for the last {hours} hours.")
    }
}

/// Send an ephemeral response to a slash command (only visible to the invoker).
async fn respond_ephemeral(ctx: &Context, command: &CommandInteraction, content: &str) {
    let _ = command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await;
}
