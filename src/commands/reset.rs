use anyhow::Result;
use serenity::all::{
    CommandInteraction, Context as SerenityContext, CreateCommand, CreateInteractionResponse,
    CreateInteractionResponseMessage, EditInteractionResponse, Permissions,
};

use crate::database::models::GuildConfig;

pub fn definition() -> CreateCommand {
    CreateCommand::new("reset")
        .description("Delete all managed channels, rooms and cooldowns for this server")
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
            EditInteractionResponse::new().content("Nothing to reset; run /setup first."),
        )
        .await?;
        return Ok(());
    };

    let removed = super::setup::teardown(ctx, &mut conn, guild_id, &config).await?;
    GuildConfig::set_enabled(&mut conn, &guild_id.to_string(), false)?;

    cmd.edit_response(
        &ctx.http,
        EditInteractionResponse::new().content(format!(
            "🧹 Reset complete: {removed} room(s) removed and managed channels deleted. \
             Settings were kept; run /setup to start again."
        )),
    )
    .await?;
    Ok(())
}
