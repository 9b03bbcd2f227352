//! /setup: build (or rebuild) the managed category, creator channel and
//! control hub, then persist the new references.

use anyhow::Result;
use serenity::all::{
    ChannelType, CommandInteraction, Context as SerenityContext, CreateChannel, CreateCommand,
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse, GuildId,
    PermissionOverwrite, PermissionOverwriteType, Permissions, RoleId,
};
use tracing::{info, warn};

use crate::audit::{self, AuditEvent};
use crate::database::models::{Cooldown, GuildConfig, NewGuildConfig, Room};
use crate::lifecycle::Lifecycle;
use crate::panel;
use crate::rooms::{self, parse_channel_id};

pub const CATEGORY_NAME: &str = "🔊 Voice Rooms";
pub const CREATOR_CHANNEL_NAME: &str = "➕ Create Room";
pub const HUB_CHANNEL_NAME: &str = "🎛 room-controls";

pub fn definition() -> CreateCommand {
    CreateCommand::new("setup")
        .description("Create the voice room category, creator channel and control hub")
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
    let previous = GuildConfig::find(&mut conn, &guild_id.to_string())?;
    if let Some(previous) = &previous {
        let removed = teardown(ctx, &mut conn, guild_id, previous).await?;
        if removed > 0 {
            info!(%guild_id, removed, "tore down previous managed channels");
        }
    }

    let category = guild_id
        .create_channel(
            &ctx.http,
            CreateChannel::new(CATEGORY_NAME).kind(ChannelType::Category),
        )
        .await?;
    let creator = guild_id
        .create_channel(
            &ctx.http,
            CreateChannel::new(CREATOR_CHANNEL_NAME)
                .kind(ChannelType::Voice)
                .category(category.id),
        )
        .await?;
    // Hub is read-only for members; interactions go through components.
    let hub = guild_id
        .create_channel(
            &ctx.http,
            CreateChannel::new(HUB_CHANNEL_NAME)
                .kind(ChannelType::Text)
                .category(category.id)
                .permissions(vec![PermissionOverwrite {
                    allow: Permissions::empty(),
                    deny: Permissions::SEND_MESSAGES,
                    kind: PermissionOverwriteType::Role(RoleId::new(guild_id.get())),
                }]),
        )
        .await?;

    let mut row = NewGuildConfig::with_defaults(&guild_id.to_string(), previous.as_ref());
    row.category_id = Some(category.id.to_string());
    row.creator_channel_id = Some(creator.id.to_string());
    row.panel_channel_id = Some(hub.id.to_string());
    GuildConfig::upsert_full(&mut conn, &row)?;

    let config = GuildConfig::find(&mut conn, &guild_id.to_string())?
        .ok_or_else(|| anyhow::anyhow!("config row missing after upsert"))?;
    let message_id = panel::post_panel(&ctx.http, hub.id, &config).await?;
    GuildConfig::set_panel_message(&mut conn, &config.guild_id, Some(&message_id.to_string()))?;

    audit::log(
        &ctx.http,
        &config,
        AuditEvent::ConfigUpdated {
            user: cmd.user.name.clone(),
            detail: "Setup completed".to_string(),
        },
    )
    .await;
    info!(%guild_id, category_id = %category.id, creator_id = %creator.id, hub_id = %hub.id, "setup complete");

    cmd.edit_response(
        &ctx.http,
        EditInteractionResponse::new().content(format!(
            "✅ Setup complete. Join <#{}> to create a room; controls live in <#{}>.",
            creator.id, hub.id
        )),
    )
    .await?;
    Ok(())
}

/// Remove every managed channel and registry row for the guild. Channel
/// references are cleared; tunables and the config row survive.
pub(crate) async fn teardown(
    ctx: &SerenityContext,
    conn: &mut diesel::sqlite::SqliteConnection,
    guild_id: GuildId,
    config: &GuildConfig,
) -> Result<usize> {
    let lifecycle = Lifecycle::get(ctx).await;
    let registry = Room::for_guild(conn, &guild_id.to_string())?;
    let removed = registry.len();

    for room in &registry {
        let (Some(room_id), Some(side_id)) = (
            parse_channel_id(&room.room_id),
            parse_channel_id(&room.side_channel_id),
        ) else {
            continue;
        };
        lifecycle.scheduler.cancel(room_id);
        if let Err(e) = rooms::delete_room_now(&ctx.http, room_id, side_id).await {
            warn!(%guild_id, room_id = %room.room_id, "teardown of room failed: {e:?}");
        }
    }
    Room::delete_guild(conn, &guild_id.to_string())?;
    Cooldown::clear_guild(conn, &guild_id.to_string())?;

    // Infrastructure last so leftover rooms were still inside the category.
    for channel_id in [
        config.creator_channel_id.as_deref(),
        config.panel_channel_id.as_deref(),
        config.category_id.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter_map(parse_channel_id)
    {
        if rooms::fetch_guild_channel(&ctx.http, channel_id).await?.is_some()
            && let Err(e) = channel_id.delete(&ctx.http).await
        {
            warn!(%guild_id, %channel_id, "failed to delete managed channel: {e:?}");
        }
    }
    GuildConfig::clear_channel_refs(conn, &guild_id.to_string())?;
    Ok(removed)
}
