use std::collections::HashMap;
use std::sync::Arc;

use diesel::sqlite::SqliteConnection;
use serenity::all::{
    ChannelId, ChannelType, Context as SerenityContext, CreateChannel, EditMember, GuildChannel,
    GuildId, Http, PermissionOverwrite, PermissionOverwriteType, Permissions, RoleId, UserId,
};
use tracing::{error, info, warn};

use crate::audit::{self, AuditEvent};
use crate::database::{self, models::{Cooldown, GuildConfig, Room}};
use crate::error::{RoomError, is_not_found};
use crate::lifecycle::{Lifecycle, now_ms};
use crate::panel;
use crate::permissions::{admin_ids_among, grant_side_access, revoke_side_access, apply_owner_overwrites};
use crate::template::{apply_name_template, side_channel_name};

pub fn parse_channel_id(s: &str) -> Option<ChannelId> {
    s.parse().ok()
}

pub fn parse_user_id(s: &str) -> Option<UserId> {
    s.parse().ok()
}

/// Members currently in a voice channel, read from the cached guild
/// voice states. This is the single source of truth for occupancy
/// decisions everywhere (event handlers and reconciliation alike).
pub fn voice_members(ctx: &SerenityContext, guild_id: GuildId, channel_id: ChannelId) -> Vec<UserId> {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return Vec::new();
    };
    guild
        .voice_states
        .iter()
        .filter(|(_, vs)| vs.channel_id == Some(channel_id))
        .map(|(user_id, _)| *user_id)
        .collect()
}

/// Voice channel the user currently occupies, if any.
pub fn member_voice_channel(
    ctx: &SerenityContext,
    guild_id: GuildId,
    user_id: UserId,
) -> Option<ChannelId> {
    ctx.cache
        .guild(guild_id)?
        .voice_states
        .get(&user_id)
        .and_then(|vs| vs.channel_id)
}

/// Occupancy per voice channel for a whole guild, keyed by channel id.
pub fn channel_occupancy(ctx: &SerenityContext, guild_id: GuildId) -> HashMap<String, usize> {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return HashMap::new();
    };
    let mut counts = HashMap::new();
    for vs in guild.voice_states.values() {
        if let Some(channel_id) = vs.channel_id {
            *counts.entry(channel_id.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Fetch a guild channel, mapping "unknown channel" to None.
pub async fn fetch_guild_channel(
    http: &Http,
    channel_id: ChannelId,
) -> Result<Option<GuildChannel>, RoomError> {
    match http.get_channel(channel_id).await {
        Ok(channel) => Ok(channel.guild()),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub struct CreatedRoom {
    pub room_id: ChannelId,
    pub side_channel_id: ChannelId,
    pub name: String,
}

/// Allocate a voice room and its paired side channel, persist the
/// registry and cooldown rows, then move the member in and post the
/// control panel.
///
/// The channel allocations come first: if either fails, no row is ever
/// written, so a Room row always refers to channels that existed. The
/// member move and the panel post are best-effort; their failure leaves
/// a usable room and is logged, never unwound. A row write failure after
/// allocation is surfaced and left for the next reconciliation pass.
pub async fn create_room(
    ctx: &SerenityContext,
    conn: &mut SqliteConnection,
    guild_id: GuildId,
    owner_id: UserId,
    username: &str,
    config: &GuildConfig,
) -> Result<CreatedRoom, RoomError> {
    let category_id = config
        .category_id
        .as_deref()
        .and_then(parse_channel_id)
        .ok_or(RoomError::Gone)?;
    let category = fetch_guild_channel(&ctx.http, category_id)
        .await?
        .filter(|c| c.kind == ChannelType::Category)
        .ok_or(RoomError::Gone)?;

    let room_name = apply_name_template(&config.name_template, username);
    let voice_channel = guild_id
        .create_channel(
            &ctx.http,
            CreateChannel::new(room_name.clone())
                .kind(ChannelType::Voice)
                .category(category.id),
        )
        .await?;

    let everyone = RoleId::new(guild_id.get());
    let side_channel = guild_id
        .create_channel(
            &ctx.http,
            CreateChannel::new(side_channel_name(username))
                .kind(ChannelType::Text)
                .category(category.id)
                .permissions(vec![
                    PermissionOverwrite {
                        allow: Permissions::empty(),
                        deny: Permissions::VIEW_CHANNEL,
                        kind: PermissionOverwriteType::Role(everyone),
                    },
                    PermissionOverwrite {
                        allow: Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
                        deny: Permissions::empty(),
                        kind: PermissionOverwriteType::Member(owner_id),
                    },
                ]),
        )
        .await?;

    apply_owner_overwrites(&ctx.http, voice_channel.id, owner_id).await?;

    let now = now_ms();
    Room::insert(
        conn,
        &Room {
            room_id: voice_channel.id.to_string(),
            guild_id: guild_id.to_string(),
            side_channel_id: side_channel.id.to_string(),
            owner_id: owner_id.to_string(),
            created_at: now,
            last_owner_seen_at: now,
        },
    )?;
    Cooldown::record(conn, &guild_id.to_string(), &owner_id.to_string(), now)?;

    // Move first so a panel failure cannot keep the user out of the room.
    if let Err(e) = guild_id
        .edit_member(
            &ctx.http,
            owner_id,
            EditMember::new().voice_channel(voice_channel.id),
        )
        .await
    {
        warn!(%guild_id, %owner_id, room_id = %voice_channel.id, "failed to move member into new room: {e:?}");
    }

    if let Err(e) = panel::post_panel(&ctx.http, side_channel.id, config).await {
        warn!(%guild_id, side_channel_id = %side_channel.id, "failed to post control panel (room still created): {e:?}");
    }

    info!(%guild_id, %owner_id, room_id = %voice_channel.id, side_channel_id = %side_channel.id, "created voice room");
    Ok(CreatedRoom {
        room_id: voice_channel.id,
        side_channel_id: side_channel.id,
        name: room_name,
    })
}

/// Tear a room down: delete both channels (already-gone counts as done)
/// and drop the registry row.
pub async fn delete_room_now(
    http: &Http,
    room_id: ChannelId,
    side_channel_id: ChannelId,
) -> Result<(), RoomError> {
    for channel_id in [room_id, side_channel_id] {
        if fetch_guild_channel(http, channel_id).await?.is_some() {
            match channel_id.delete(http).await {
                Ok(_) => {}
                Err(e) if is_not_found(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    let mut conn = match database::establish_connection() {
        Ok(conn) => conn,
        Err(e) => {
            error!(%room_id, "room channels deleted but row remains: {e:?}");
            return Ok(());
        }
    };
    let guild_id = Room::find(&mut conn, &room_id.to_string())?.map(|r| r.guild_id);
    Room::delete(&mut conn, &room_id.to_string())?;

    if let Some(guild_id) = guild_id
        && let Some(config) = GuildConfig::find(&mut conn, &guild_id)?
    {
        audit::log(http, &config, AuditEvent::RoomDeleted { channel_id: room_id.to_string() }).await;
    }
    info!(%room_id, %side_channel_id, "deleted voice room");
    Ok(())
}

/// Arm the deletion timer for an empty room with the guild's configured
/// delay. Replaces any pending timer for the room.
pub fn schedule_room_delete(
    lifecycle: &Lifecycle,
    http: Arc<Http>,
    config: &GuildConfig,
    room_id: ChannelId,
    side_channel_id: ChannelId,
) {
    let delay = config.delete_delay();
    lifecycle.scheduler.schedule(room_id, delay, async move {
        if let Err(e) = delete_room_now(&http, room_id, side_channel_id).await {
            error!(%room_id, "scheduled room deletion failed: {e:?}");
        }
    });
}

/// Re-synchronize side-channel visibility from current room occupancy:
/// owner, present members and present admins can see it; member
/// overwrites for everyone else are removed.
pub async fn sync_side_channel(
    ctx: &SerenityContext,
    guild_id: GuildId,
    room_id: ChannelId,
    side_channel_id: ChannelId,
    owner_id: UserId,
) -> Result<(), RoomError> {
    let present = voice_members(ctx, guild_id, room_id);
    let admins = admin_ids_among(ctx, guild_id, &present);

    let mut allowed: Vec<UserId> = Vec::with_capacity(present.len() + 1);
    allowed.push(owner_id);
    for id in present.iter().chain(admins.iter()) {
        if !allowed.contains(id) {
            allowed.push(*id);
        }
    }

    let side_channel = fetch_guild_channel(&ctx.http, side_channel_id)
        .await?
        .ok_or(RoomError::Gone)?;
    for overwrite in &side_channel.permission_overwrites {
        if let PermissionOverwriteType::Member(user_id) = overwrite.kind
            && !allowed.contains(&user_id)
        {
            revoke_side_access(&ctx.http, side_channel_id, user_id).await?;
        }
    }
    for user_id in allowed {
        grant_side_access(&ctx.http, side_channel_id, user_id).await?;
    }
    Ok(())
}
