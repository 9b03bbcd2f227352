use anyhow::Result;
use serenity::all::{
    CommandDataOptionValue, CommandInteraction, CommandOptionType, Context as SerenityContext,
    CreateCommand, CreateCommandOption, Permissions,
};

use crate::audit::{self, AuditEvent};
use crate::database::models::GuildConfig;

pub fn definition() -> CreateCommand {
    CreateCommand::new("setlogchannel")
        .description("Choose where lifecycle events are logged; omit to disable")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .dm_permission(false)
        .add_option(CreateCommandOption::new(
            CommandOptionType::Channel,
            "channel",
            "Text channel for audit embeds",
        ))
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let Some(guild_id) = cmd.guild_id else {
        return super::reply(ctx, cmd, "This command only works in a server.").await;
    };
    let mut conn = crate::database::establish_connection()?;
    let Some(config) = GuildConfig::find(&mut conn, &guild_id.to_string())? else {
        return super::reply(ctx, cmd, "No config found. Run /setup first.").await;
    };

    let channel = cmd.data.options.iter().find_map(|o| match &o.value {
        CommandDataOptionValue::Channel(id) if o.name == "channel" => Some(*id),
        _ => None,
    });

    match channel {
        Some(channel_id) => {
            GuildConfig::set_log_channel(
                &mut conn,
                &guild_id.to_string(),
                Some(&channel_id.to_string()),
            )?;
            let updated = GuildConfig::find(&mut conn, &guild_id.to_string())?.unwrap_or(config);
            audit::log(
                &ctx.http,
                &updated,
                AuditEvent::ConfigUpdated {
                    user: cmd.user.name.clone(),
                    detail: format!("Log channel set to <#{channel_id}>"),
                },
            )
            .await;
            super::reply(ctx, cmd, &format!("📜 Logging to <#{channel_id}>.")).await
        }
        None => {
            GuildConfig::set_log_channel(&mut conn, &guild_id.to_string(), None)?;
            super::reply(ctx, cmd, "📜 Audit logging disabled.").await
        }
    }
}
