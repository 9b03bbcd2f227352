use anyhow::Result;
use serenity::all::{
    CommandDataOptionValue, CommandInteraction, CommandOptionType, Context as SerenityContext,
    CreateCommand, CreateCommandOption, Permissions,
};

use crate::database::models::GuildConfig;

pub fn definition() -> CreateCommand {
    CreateCommand::new("toggle")
        .description("Enable or disable room creation")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .dm_permission(false)
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Boolean,
                "enabled",
                "Whether joining the creator channel makes rooms",
            )
            .required(true),
        )
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let Some(guild_id) = cmd.guild_id else {
        return super::reply(ctx, cmd, "This command only works in a server.").await;
    };
    let Some(enabled) = cmd.data.options.iter().find_map(|o| match o.value {
        CommandDataOptionValue::Boolean(b) if o.name == "enabled" => Some(b),
        _ => None,
    }) else {
        return Ok(());
    };

    let mut conn = crate::database::establish_connection()?;
    if GuildConfig::find(&mut conn, &guild_id.to_string())?.is_none() {
        return super::reply(ctx, cmd, "No config found. Run /setup first.").await;
    }
    GuildConfig::set_enabled(&mut conn, &guild_id.to_string(), enabled)?;

    // Existing rooms keep living either way; only creation is gated.
    let msg = if enabled {
        "▶️ Room creation enabled."
    } else {
        "⏸️ Room creation disabled. Existing rooms are unaffected."
    };
    super::reply(ctx, cmd, msg).await
}
