//! Voice state transitions drive the whole room lifecycle: joins to the
//! creator channel mint rooms, joins to managed rooms disarm deletion,
//! and departures arm it.

use serenity::all::{
    ChannelId, Context as SerenityContext, EditMember, GuildId, UserId, VoiceState,
};
use tracing::{debug, info, warn};

use crate::audit::{self, AuditEvent};
use crate::database::{self, models::{GuildConfig, Room}};
use crate::lifecycle::{Lifecycle, admission, now_ms};
use crate::permissions::grant_side_access;
use crate::reconcile;
use crate::rooms::{self, parse_channel_id, parse_user_id, schedule_room_delete, voice_members};

pub async fn handle(
    ctx: &SerenityContext,
    old: Option<&VoiceState>,
    new: &VoiceState,
) -> anyhow::Result<()> {
    let Some(guild_id) = new.guild_id else {
        return Ok(());
    };
    let user_id = new.user_id;
    let old_channel = old.and_then(|o| o.channel_id);
    let new_channel = new.channel_id;

    let mut conn = database::establish_connection()?;

    // Mute/deafen toggles and the like carry no movement; the only thing
    // they prove is that the user is still here.
    if old_channel == new_channel {
        if let Some(channel_id) = new_channel {
            touch_if_owner(&mut conn, channel_id, user_id)?;
        }
        return Ok(());
    }

    let Some(config) = GuildConfig::find(&mut conn, &guild_id.to_string())? else {
        return Ok(());
    };

    if let Some(channel_id) = old_channel {
        handle_departure(ctx, &mut conn, guild_id, channel_id, user_id, &config).await?;
    }
    if let Some(channel_id) = new_channel {
        handle_arrival(ctx, &mut conn, guild_id, channel_id, new, &config).await?;
    }
    Ok(())
}

/// Record the current owner's departure time; the claim window is
/// measured from it. No-op for anyone else.
fn record_owner_departure(
    conn: &mut diesel::sqlite::SqliteConnection,
    room: &Room,
    user_id: UserId,
    now_ms: i64,
) -> diesel::QueryResult<bool> {
    if room.owner_id != user_id.to_string() {
        return Ok(false);
    }
    Room::touch_owner_seen(conn, &room.room_id, now_ms)?;
    Ok(true)
}

/// Panel channel as the visible fallback when a DM cannot be delivered.
fn fallback_channel(config: &GuildConfig) -> Option<ChannelId> {
    config.panel_channel_id.as_deref().and_then(parse_channel_id)
}

fn touch_if_owner(
    conn: &mut diesel::sqlite::SqliteConnection,
    channel_id: ChannelId,
    user_id: UserId,
) -> anyhow::Result<()> {
    if let Some(room) = Room::find(conn, &channel_id.to_string())?
        && room.owner_id == user_id.to_string()
    {
        Room::touch_owner_seen(conn, &room.room_id, now_ms())?;
    }
    Ok(())
}

async fn handle_departure(
    ctx: &SerenityContext,
    conn: &mut diesel::sqlite::SqliteConnection,
    guild_id: GuildId,
    channel_id: ChannelId,
    user_id: UserId,
    config: &GuildConfig,
) -> anyhow::Result<()> {
    let Some(room) = Room::find(conn, &channel_id.to_string())? else {
        return Ok(());
    };
    let Some(side_channel_id) = parse_channel_id(&room.side_channel_id) else {
        return Ok(());
    };

    // The owner walking out is the moment the claim clock starts from.
    if record_owner_departure(conn, &room, user_id, now_ms())? {
        debug!(%guild_id, room_id = %channel_id, "owner left, claim clock started");
    }

    // Recompute side-channel visibility without the leaver.
    if let Some(owner_id) = parse_user_id(&room.owner_id)
        && let Err(e) =
            rooms::sync_side_channel(ctx, guild_id, channel_id, side_channel_id, owner_id).await
    {
        warn!(%guild_id, room_id = %channel_id, "side channel sync after leave failed: {e:?}");
    }

    if voice_members(ctx, guild_id, channel_id).is_empty() {
        debug!(%guild_id, room_id = %channel_id, "room emptied, arming deletion timer");
        let lifecycle = Lifecycle::get(ctx).await;
        schedule_room_delete(&lifecycle, ctx.http.clone(), config, channel_id, side_channel_id);
    }
    Ok(())
}

async fn handle_arrival(
    ctx: &SerenityContext,
    conn: &mut diesel::sqlite::SqliteConnection,
    guild_id: GuildId,
    channel_id: ChannelId,
    state: &VoiceState,
    config: &GuildConfig,
) -> anyhow::Result<()> {
    let creator = config.creator_channel_id.as_deref().and_then(parse_channel_id);
    if creator == Some(channel_id) {
        return handle_creator_join(ctx, conn, guild_id, state, config).await;
    }

    let Some(room) = Room::find(conn, &channel_id.to_string())? else {
        return Ok(());
    };

    // A live joiner always outruns a pending timer.
    let lifecycle = Lifecycle::get(ctx).await;
    lifecycle.scheduler.cancel(channel_id);

    if let Some(side_channel_id) = parse_channel_id(&room.side_channel_id)
        && let Err(e) = grant_side_access(&ctx.http, side_channel_id, state.user_id).await
    {
        warn!(%guild_id, room_id = %channel_id, "failed to grant side channel access: {e:?}");
    }
    if room.owner_id == state.user_id.to_string() {
        Room::touch_owner_seen(conn, &room.room_id, now_ms())?;
    }
    Ok(())
}

async fn handle_creator_join(
    ctx: &SerenityContext,
    conn: &mut diesel::sqlite::SqliteConnection,
    guild_id: GuildId,
    state: &VoiceState,
    config: &GuildConfig,
) -> anyhow::Result<()> {
    if !config.enabled {
        return Ok(());
    }
    if state.member.as_ref().is_some_and(|m| m.user.bot) {
        return Ok(());
    }

    let lifecycle = Lifecycle::get(ctx).await;
    let Some(_permit) = lifecycle.guard.try_acquire(guild_id, state.user_id) else {
        debug!(%guild_id, user_id = %state.user_id, "creation already in flight, dropping event");
        return Ok(());
    };

    let verdict = admission::can_create(
        conn,
        &guild_id.to_string(),
        &state.user_id.to_string(),
        config,
        now_ms(),
    )?;
    if let admission::Verdict::Denied { reason } = verdict {
        info!(%guild_id, user_id = %state.user_id, %reason, "room creation denied");
        if let Err(e) = guild_id
            .edit_member(&ctx.http, state.user_id, EditMember::new().disconnect_member())
            .await
        {
            warn!(%guild_id, user_id = %state.user_id, "failed to disconnect denied user: {e:?}");
        }
        let mut notified = false;
        if let Ok(dm) = state.user_id.create_dm_channel(&ctx.http).await {
            notified = dm.id.say(&ctx.http, &reason).await.is_ok();
        }
        if !notified
            && let Some(hub) = fallback_channel(config)
            && let Err(e) = hub
                .say(&ctx.http, format!("<@{}> {reason}", state.user_id))
                .await
        {
            debug!(user_id = %state.user_id, "could not deliver denial reason: {e:?}");
        }
        return Ok(());
    }

    // Tidy leftover category children before allocating more.
    if let Err(e) = reconcile::sweep_stray_children(ctx, conn, guild_id, config).await {
        warn!(%guild_id, "pre-creation sweep failed: {e:?}");
    }

    let username = match &state.member {
        Some(member) => member.user.name.clone(),
        None => state.user_id.to_user(&ctx.http).await?.name,
    };

    let created =
        rooms::create_room(ctx, conn, guild_id, state.user_id, &username, config).await?;

    audit::log(
        &ctx.http,
        config,
        AuditEvent::RoomCreated {
            user: username.clone(),
            user_id: state.user_id.to_string(),
            channel_id: created.room_id.to_string(),
        },
    )
    .await;
    audit::log(
        &ctx.http,
        config,
        AuditEvent::SideChannelCreated {
            user: username,
            user_id: state.user_id.to_string(),
            channel_id: created.side_channel_id.to_string(),
        },
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewGuildConfig;
    use crate::database::test_connection;
    use crate::lifecycle::ownership;

    fn room(owner: &str, last_owner_seen_at: i64) -> Room {
        Room {
            room_id: "v1".into(),
            guild_id: "g1".into(),
            side_channel_id: "t1".into(),
            owner_id: owner.into(),
            created_at: 0,
            last_owner_seen_at,
        }
    }

    // Owner arrives at t=0 and sits in the room far longer than the claim
    // timeout. Their departure must restart the clock: a claim 100s after
    // the leave is denied, 121s after it is allowed.
    #[test]
    fn owner_departure_restarts_the_claim_clock() {
        let mut conn = test_connection();
        GuildConfig::upsert_full(&mut conn, &NewGuildConfig::with_defaults("g1", None)).unwrap();
        let config = GuildConfig::find(&mut conn, "g1").unwrap().unwrap();
        assert_eq!(config.claim_timeout_seconds, 120);

        Room::insert(&mut conn, &room("11", 0)).unwrap();
        let stale = Room::find(&mut conn, "v1").unwrap().unwrap();

        let leave_at = 1_000_000;
        assert!(record_owner_departure(&mut conn, &stale, UserId::new(11), leave_at).unwrap());

        let fresh = Room::find(&mut conn, "v1").unwrap().unwrap();
        assert_eq!(fresh.last_owner_seen_at, leave_at);
        let claim = |now_ms| {
            ownership::claim_allowed(&fresh, &config, false, now_ms, false, true, false, false)
        };
        assert!(!claim(leave_at + 100_000));
        assert!(claim(leave_at + 121_000));
    }

    #[test]
    fn non_owner_departure_leaves_the_clock_alone() {
        let mut conn = test_connection();
        Room::insert(&mut conn, &room("11", 5_000)).unwrap();
        let stale = Room::find(&mut conn, "v1").unwrap().unwrap();

        assert!(!record_owner_departure(&mut conn, &stale, UserId::new(99), 1_000_000).unwrap());
        let fresh = Room::find(&mut conn, "v1").unwrap().unwrap();
        assert_eq!(fresh.last_owner_seen_at, 5_000);
    }

    #[test]
    fn denial_fallback_resolves_the_panel_channel() {
        let mut conn = test_connection();
        let mut row = NewGuildConfig::with_defaults("g1", None);
        row.panel_channel_id = Some("42".into());
        GuildConfig::upsert_full(&mut conn, &row).unwrap();
        let config = GuildConfig::find(&mut conn, "g1").unwrap().unwrap();
        assert_eq!(fallback_channel(&config), Some(ChannelId::new(42)));

        GuildConfig::clear_channel_refs(&mut conn, "g1").unwrap();
        let config = GuildConfig::find(&mut conn, "g1").unwrap().unwrap();
        assert_eq!(fallback_channel(&config), None);
    }
}
