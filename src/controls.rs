//! Owner actions on a room, shared by the control-panel components and
//! the /vc command. Every function resolves its own authorization and
//! returns the user-facing reply text; denials are replies, not errors.

use diesel::sqlite::SqliteConnection;
use serenity::all::{
    ChannelId, Context as SerenityContext, EditChannel, EditMember, GuildId, Member, UserId,
};

use crate::audit::{self, AuditEvent};
use crate::database::models::{GuildConfig, Room};
use crate::error::RoomError;
use crate::lifecycle::{now_ms, ownership};
use crate::permissions::{apply_owner_overwrites, member_is_admin, set_connect_banned, set_room_locked};
use crate::rooms::{member_voice_channel, sync_side_channel, voice_members};
use crate::template::{validate_limit, validate_rename};

pub struct RoomContext {
    pub room: Room,
    pub config: GuildConfig,
    pub guild_id: GuildId,
    pub room_id: ChannelId,
    pub side_channel_id: ChannelId,
}

pub enum Resolved {
    Room(Box<RoomContext>),
    Deny(&'static str),
}

/// Acting user, with the flags the ownership rules care about.
pub struct Actor {
    pub user_id: UserId,
    pub name: String,
    pub is_admin: bool,
    pub is_bot: bool,
}

impl Actor {
    pub fn from_member(ctx: &SerenityContext, guild_id: GuildId, member: &Member) -> Self {
        Self {
            user_id: member.user.id,
            name: member.user.name.clone(),
            is_admin: member_is_admin(ctx, guild_id, member),
            is_bot: member.user.bot,
        }
    }
}

/// Find the managed room the user is currently sitting in.
pub fn resolve_member_room(
    ctx: &SerenityContext,
    conn: &mut SqliteConnection,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<Resolved, RoomError> {
    let Some(room_id) = member_voice_channel(ctx, guild_id, user_id) else {
        return Ok(Resolved::Deny(
            "You must be in a voice channel to use the room controls.",
        ));
    };
    let Some(room) = Room::find(conn, &room_id.to_string())? else {
        return Ok(Resolved::Deny("This voice channel is not a managed room."));
    };
    let Some(config) = GuildConfig::find(conn, &guild_id.to_string())? else {
        return Ok(Resolved::Deny("No config found. Run /setup first."));
    };
    let Some(side_channel_id) = crate::rooms::parse_channel_id(&room.side_channel_id) else {
        return Ok(Resolved::Deny("This room's side channel is unknown."));
    };
    Ok(Resolved::Room(Box::new(RoomContext {
        room,
        config,
        guild_id,
        room_id,
        side_channel_id,
    })))
}

fn owns(rc: &RoomContext, actor: &Actor) -> bool {
    rc.room.owner_id == actor.user_id.to_string()
}

pub async fn rename(
    ctx: &SerenityContext,
    rc: &RoomContext,
    actor: &Actor,
    name: &str,
) -> Result<String, RoomError> {
    if !owns(rc, actor) {
        return Ok("Only the room owner can rename.".to_string());
    }
    let name = match validate_rename(name) {
        Ok(name) => name,
        Err(msg) => return Ok(msg.to_string()),
    };
    rc.room_id
        .edit(&ctx.http, EditChannel::new().name(&name))
        .await?;
    Ok(format!("✏️ Room renamed to `{name}`."))
}

pub async fn set_limit(
    ctx: &SerenityContext,
    rc: &RoomContext,
    actor: &Actor,
    value: i64,
) -> Result<String, RoomError> {
    if !owns(rc, actor) {
        return Ok("Only the room owner can set the limit.".to_string());
    }
    let limit = match validate_limit(value) {
        Ok(limit) => limit,
        Err(msg) => return Ok(msg.to_string()),
    };
    rc.room_id
        .edit(&ctx.http, EditChannel::new().user_limit(limit))
        .await?;
    Ok(format!("👥 User limit set to {limit}."))
}

pub async fn set_locked(
    ctx: &SerenityContext,
    rc: &RoomContext,
    actor: &Actor,
    locked: bool,
) -> Result<String, RoomError> {
    if !owns(rc, actor) {
        return Ok("Only the room owner can lock or unlock.".to_string());
    }
    set_room_locked(&ctx.http, rc.guild_id, rc.room_id, locked).await?;
    let event = if locked {
        AuditEvent::Locked { user: actor.name.clone(), channel_id: rc.room.room_id.clone() }
    } else {
        AuditEvent::Unlocked { user: actor.name.clone(), channel_id: rc.room.room_id.clone() }
    };
    audit::log(&ctx.http, &rc.config, event).await;
    Ok(if locked { "🔒 Room locked." } else { "🔓 Room unlocked." }.to_string())
}

pub async fn set_public(
    ctx: &SerenityContext,
    rc: &RoomContext,
    actor: &Actor,
    public: bool,
) -> Result<String, RoomError> {
    if !owns(rc, actor) {
        return Ok("Only the room owner can change privacy.".to_string());
    }
    set_room_locked(&ctx.http, rc.guild_id, rc.room_id, !public).await?;
    audit::log(
        &ctx.http,
        &rc.config,
        AuditEvent::PrivacyChanged {
            user: actor.name.clone(),
            channel_id: rc.room.room_id.clone(),
            public,
        },
    )
    .await;
    Ok(if public { "🌐 Room is now public." } else { "🔐 Room is now private." }.to_string())
}

pub async fn transfer(
    ctx: &SerenityContext,
    conn: &mut SqliteConnection,
    rc: &RoomContext,
    actor: &Actor,
    target_id: UserId,
) -> Result<String, RoomError> {
    if !owns(rc, actor) {
        return Ok("Only the room owner can transfer ownership.".to_string());
    }
    let target = match rc.guild_id.member(&ctx.http, target_id).await {
        Ok(member) => member,
        Err(_) => return Ok("That user is not in this server.".to_string()),
    };
    if target.user.bot {
        return Ok("Cannot transfer to a bot.".to_string());
    }
    if member_is_admin(ctx, rc.guild_id, &target) {
        return Ok("Cannot transfer to an admin (they already have access).".to_string());
    }

    Room::update_owner(conn, &rc.room.room_id, &target_id.to_string(), now_ms())?;
    apply_owner_overwrites(&ctx.http, rc.room_id, target_id).await?;
    sync_side_channel(ctx, rc.guild_id, rc.room_id, rc.side_channel_id, target_id).await?;

    audit::log(
        &ctx.http,
        &rc.config,
        AuditEvent::OwnerTransferred {
            from: actor.name.clone(),
            from_id: actor.user_id.to_string(),
            to: target.user.name.clone(),
            to_id: target_id.to_string(),
            channel_id: rc.room.room_id.clone(),
        },
    )
    .await;
    Ok(format!("↗️ Ownership transferred to <@{target_id}>."))
}

pub async fn claim(
    ctx: &SerenityContext,
    conn: &mut SqliteConnection,
    rc: &RoomContext,
    actor: &Actor,
) -> Result<String, RoomError> {
    let present = voice_members(ctx, rc.guild_id, rc.room_id);
    let owner_present = crate::rooms::parse_user_id(&rc.room.owner_id)
        .map(|owner| present.contains(&owner))
        .unwrap_or(false);
    let claimant_present = present.contains(&actor.user_id);

    let allowed = ownership::claim_allowed(
        &rc.room,
        &rc.config,
        owner_present,
        now_ms(),
        owns(rc, actor),
        claimant_present,
        actor.is_admin,
        actor.is_bot,
    );
    if !allowed {
        return Ok(
            "You can only claim once the owner has been gone for the configured timeout."
                .to_string(),
        );
    }

    Room::update_owner(conn, &rc.room.room_id, &actor.user_id.to_string(), now_ms())?;
    apply_owner_overwrites(&ctx.http, rc.room_id, actor.user_id).await?;
    sync_side_channel(ctx, rc.guild_id, rc.room_id, rc.side_channel_id, actor.user_id).await?;

    audit::log(
        &ctx.http,
        &rc.config,
        AuditEvent::Claimed {
            user: actor.name.clone(),
            user_id: actor.user_id.to_string(),
            channel_id: rc.room.room_id.clone(),
        },
    )
    .await;
    Ok("👑 You are now the owner of this room.".to_string())
}

pub async fn kick(
    ctx: &SerenityContext,
    rc: &RoomContext,
    actor: &Actor,
    target_id: UserId,
) -> Result<String, RoomError> {
    if !owns(rc, actor) {
        return Ok("Only the room owner can kick.".to_string());
    }
    if let Some(deny) = check_target(ctx, rc, target_id).await? {
        return Ok(deny);
    }
    if !voice_members(ctx, rc.guild_id, rc.room_id).contains(&target_id) {
        return Ok("That user is not in this room.".to_string());
    }
    rc.guild_id
        .edit_member(&ctx.http, target_id, EditMember::new().disconnect_member())
        .await?;
    audit::log(
        &ctx.http,
        &rc.config,
        AuditEvent::Kicked {
            by: actor.name.clone(),
            target: target_id.to_string(),
            channel_id: rc.room.room_id.clone(),
        },
    )
    .await;
    Ok(format!("👢 <@{target_id}> has been kicked."))
}

pub async fn ban(
    ctx: &SerenityContext,
    rc: &RoomContext,
    actor: &Actor,
    target_id: UserId,
) -> Result<String, RoomError> {
    if !owns(rc, actor) {
        return Ok("Only the room owner can ban.".to_string());
    }
    if let Some(deny) = check_target(ctx, rc, target_id).await? {
        return Ok(deny);
    }
    if voice_members(ctx, rc.guild_id, rc.room_id).contains(&target_id) {
        rc.guild_id
            .edit_member(&ctx.http, target_id, EditMember::new().disconnect_member())
            .await?;
    }
    set_connect_banned(&ctx.http, rc.room_id, target_id, true).await?;
    audit::log(
        &ctx.http,
        &rc.config,
        AuditEvent::Banned {
            by: actor.name.clone(),
            target: target_id.to_string(),
            channel_id: rc.room.room_id.clone(),
        },
    )
    .await;
    Ok(format!("🚫 <@{target_id}> has been banned from this room."))
}

pub async fn unban(
    ctx: &SerenityContext,
    rc: &RoomContext,
    actor: &Actor,
    target_id: UserId,
) -> Result<String, RoomError> {
    if !owns(rc, actor) {
        return Ok("Only the room owner can unban.".to_string());
    }
    set_connect_banned(&ctx.http, rc.room_id, target_id, false).await?;
    audit::log(
        &ctx.http,
        &rc.config,
        AuditEvent::Unbanned {
            by: actor.name.clone(),
            target: target_id.to_string(),
            channel_id: rc.room.room_id.clone(),
        },
    )
    .await;
    Ok(format!("✅ <@{target_id}> has been unbanned."))
}

/// Bots and admins are never valid kick/ban targets.
async fn check_target(
    ctx: &SerenityContext,
    rc: &RoomContext,
    target_id: UserId,
) -> Result<Option<String>, RoomError> {
    if target_id == ctx.cache.current_user().id {
        return Ok(Some("Cannot target the bot.".to_string()));
    }
    if let Ok(member) = rc.guild_id.member(&ctx.http, target_id).await {
        if member.user.bot {
            return Ok(Some("Cannot target a bot.".to_string()));
        }
        if member_is_admin(ctx, rc.guild_id, &member) {
            return Ok(Some("Cannot target admins.".to_string()));
        }
    }
    Ok(None)
}
