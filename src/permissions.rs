use serenity::all::{
    ChannelId, Context as SerenityContext, GuildId, Http, Member, PermissionOverwrite,
    PermissionOverwriteType, Permissions, RoleId, UserId,
};

use crate::env;
use crate::error::{RoomError, is_not_found};

pub fn is_bot_owner(user_id: UserId) -> bool {
    env::bot_owner_ids().contains(&user_id.get())
}

/// Admin commands are restricted to the guild owner or a bot owner.
pub fn can_run_admin_command(guild_owner: UserId, user_id: UserId) -> bool {
    user_id == guild_owner || is_bot_owner(user_id)
}

pub fn is_admin_permissions(perms: Permissions) -> bool {
    perms.manage_guild() || perms.administrator()
}

/// Resolve a member's guild-level admin status from the cache.
pub fn member_is_admin(ctx: &SerenityContext, guild_id: GuildId, member: &Member) -> bool {
    ctx.cache
        .guild(guild_id)
        .map(|guild| is_admin_permissions(guild.member_permissions(member)))
        .unwrap_or(false)
}

/// Which of `user_ids` hold admin permissions, resolved from the cached
/// member list in one pass.
pub fn admin_ids_among(
    ctx: &SerenityContext,
    guild_id: GuildId,
    user_ids: &[UserId],
) -> Vec<UserId> {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return Vec::new();
    };
    user_ids
        .iter()
        .filter(|id| {
            guild
                .members
                .get(id)
                .map(|m| is_admin_permissions(guild.member_permissions(m)))
                .unwrap_or(false)
        })
        .copied()
        .collect()
}

/// The room owner gets management rights over their voice channel.
pub async fn apply_owner_overwrites(
    http: &Http,
    channel_id: ChannelId,
    owner_id: UserId,
) -> Result<(), RoomError> {
    channel_id
        .create_permission(
            http,
            PermissionOverwrite {
                allow: Permissions::MANAGE_CHANNELS
                    | Permissions::MUTE_MEMBERS
                    | Permissions::MOVE_MEMBERS
                    | Permissions::CONNECT,
                deny: Permissions::empty(),
                kind: PermissionOverwriteType::Member(owner_id),
            },
        )
        .await?;
    Ok(())
}

/// Lock or unlock a room by toggling Connect for @everyone.
pub async fn set_room_locked(
    http: &Http,
    guild_id: GuildId,
    channel_id: ChannelId,
    locked: bool,
) -> Result<(), RoomError> {
    let everyone = RoleId::new(guild_id.get());
    let (allow, deny) = if locked {
        (Permissions::empty(), Permissions::CONNECT)
    } else {
        (Permissions::CONNECT, Permissions::empty())
    };
    channel_id
        .create_permission(
            http,
            PermissionOverwrite {
                allow,
                deny,
                kind: PermissionOverwriteType::Role(everyone),
            },
        )
        .await?;
    Ok(())
}

/// Ban or unban a user from connecting to a room.
pub async fn set_connect_banned(
    http: &Http,
    channel_id: ChannelId,
    user_id: UserId,
    banned: bool,
) -> Result<(), RoomError> {
    if banned {
        channel_id
            .create_permission(
                http,
                PermissionOverwrite {
                    allow: Permissions::empty(),
                    deny: Permissions::CONNECT,
                    kind: PermissionOverwriteType::Member(user_id),
                },
            )
            .await?;
    } else {
        match channel_id
            .delete_permission(http, PermissionOverwriteType::Member(user_id))
            .await
        {
            Ok(()) => {}
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

pub async fn grant_side_access(
    http: &Http,
    channel_id: ChannelId,
    user_id: UserId,
) -> Result<(), RoomError> {
    channel_id
        .create_permission(
            http,
            PermissionOverwrite {
                allow: Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
                deny: Permissions::empty(),
                kind: PermissionOverwriteType::Member(user_id),
            },
        )
        .await?;
    Ok(())
}

pub async fn revoke_side_access(
    http: &Http,
    channel_id: ChannelId,
    user_id: UserId,
) -> Result<(), RoomError> {
    match channel_id
        .delete_permission(http, PermissionOverwriteType::Member(user_id))
        .await
    {
        Ok(()) => Ok(()),
        // Overwrite may not exist
        Err(e) if is_not_found(&e) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
