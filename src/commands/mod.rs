use anyhow::Result;
use serenity::all::{
    CommandInteraction, Context as SerenityContext, CreateCommand, CreateInteractionResponse,
    CreateInteractionResponseMessage,
};

use crate::permissions::can_run_admin_command;

pub mod config;
pub mod repair;
pub mod reset;
pub mod setlogchannel;
pub mod setup;
pub mod toggle;
pub mod vc;

pub fn definitions() -> Vec<CreateCommand> {
    vec![
        setup::definition(),
        config::definition(),
        setlogchannel::definition(),
        toggle::definition(),
        repair::definition(),
        reset::definition(),
        vc::definition(),
    ]
}

/// Dispatch a slash command. Everything except /vc is restricted to the
/// guild owner and configured bot owners.
pub async fn route(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let name = cmd.data.name.as_str();
    if name == "vc" {
        return vc::handle(ctx, cmd).await;
    }

    let Some(guild_id) = cmd.guild_id else {
        return reply(ctx, cmd, "This command only works in a server.").await;
    };
    let guild_owner = ctx.cache.guild(guild_id).map(|g| g.owner_id);
    let allowed = guild_owner.is_some_and(|owner| can_run_admin_command(owner, cmd.user.id));
    if !allowed {
        return reply(ctx, cmd, "Only the server owner can use this command.").await;
    }

    match name {
        "setup" => setup::handle(ctx, cmd).await,
        "config" => config::handle(ctx, cmd).await,
        "setlogchannel" => setlogchannel::handle(ctx, cmd).await,
        "toggle" => toggle::handle(ctx, cmd).await,
        "repair" => repair::handle(ctx, cmd).await,
        "reset" => reset::handle(ctx, cmd).await,
        _ => Ok(()),
    }
}

pub(crate) async fn reply(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    content: &str,
) -> Result<()> {
    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(content)
                .ephemeral(true),
        ),
    )
    .await?;
    Ok(())
}
