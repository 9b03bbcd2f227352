//! /repair: run a reconciliation pass on demand and repost the shared
//! panel if its message went missing.

use anyhow::Result;
use serenity::all::{
    CommandInteraction, Context as SerenityContext, CreateCommand, CreateInteractionResponse,
    CreateInteractionResponseMessage, EditInteractionResponse, Permissions,
};

use crate::database::models::GuildConfig;
use crate::reconcile;

pub fn definition() -> CreateCommand {
    CreateCommand::new("repair")
        .description("Re-sync rooms with the server and repost missing control panels")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .dm_permission(false)
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let Some(guild_id) = cmd.guild_id else {
        return super::reply(ctx, cmd, "This command only works in a server.").await;
    };
    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Defer(
            CreateInteractionResponseMessage::new().ephemeral(true),
        ),
    )
    .await?;

    let mut conn = crate::database::establish_connection()?;
    let Some(config) = GuildConfig::find(&mut conn, &guild_id.to_string())? else {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().content("No config found. Run /setup first."),
        )
        .await?;
        return Ok(());
    };

    let summary = reconcile::reconcile_guild(ctx, &mut conn, guild_id, &config).await?;

    cmd.edit_response(
        &ctx.http,
        EditInteractionResponse::new().content(format!(
            "🔧 Repair done: {} stale room(s) removed, {} empty room(s) on a timer, \
             {} room(s) re-synced, {} stray channel(s) swept{}.",
            summary.dropped,
            summary.armed,
            summary.synced,
            summary.swept,
            if summary.panel_reposted { ", control panel reposted" } else { "" }
        )),
    )
    .await?;
    Ok(())
}
