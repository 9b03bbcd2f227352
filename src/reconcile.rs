//! Startup and repair reconciliation. The registry rows are the source
//! of truth; live guild state is compared against them and the delta is
//! expressed as a plan of actions. Planning is pure so the whole policy
//! is testable without a gateway; executing a plan converges the guild,
//! and planning again afterwards yields nothing.

use std::collections::{HashMap, HashSet};

use diesel::sqlite::SqliteConnection;
use serenity::all::{ChannelType, Context as SerenityContext, GuildId, Http};
use tracing::{info, warn};

use crate::database::models::{GuildConfig, Room};
use crate::error::{RoomError, is_not_found};
use crate::lifecycle::{Lifecycle, now_ms};
use crate::panel;
use crate::rooms::{
    self, channel_occupancy, parse_channel_id, parse_user_id, schedule_room_delete,
    sync_side_channel, voice_members,
};

/// A voice or text channel observed in the guild right now.
#[derive(Debug, Clone)]
pub struct LiveChannel {
    pub id: String,
    pub parent_id: Option<String>,
}

/// Config channel references that must never be swept.
#[derive(Debug, Default)]
pub struct KnownRefs {
    pub category_id: Option<String>,
    pub creator_channel_id: Option<String>,
    pub panel_channel_id: Option<String>,
}

impl KnownRefs {
    pub fn from_config(config: &GuildConfig) -> Self {
        Self {
            category_id: config.category_id.clone(),
            creator_channel_id: config.creator_channel_id.clone(),
            panel_channel_id: config.panel_channel_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    RoomChannelGone,
    SideChannelGone,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    /// Tear the room down: delete whichever channels survive, drop the row.
    DropRoom {
        room_id: String,
        side_channel_id: String,
        reason: DropReason,
    },
    /// Room exists but sits empty: arm the deletion timer.
    ArmDelete {
        room_id: String,
        side_channel_id: String,
    },
    /// Room is occupied: refresh side-channel access and the panel.
    SyncRoom {
        room_id: String,
        side_channel_id: String,
        owner_id: String,
    },
    /// Channel under the managed category with no registry row behind it.
    Sweep { channel_id: String },
    /// Make sure the shared control-panel message still exists.
    RepairPanel { channel_id: String },
}

/// Compute the convergence plan for one guild.
pub fn plan(
    registry: &[Room],
    live: &[LiveChannel],
    occupancy: &HashMap<String, usize>,
    refs: &KnownRefs,
) -> Vec<Action> {
    let live_ids: HashSet<&str> = live.iter().map(|c| c.id.as_str()).collect();
    let mut actions = Vec::new();

    for room in registry {
        let room_live = live_ids.contains(room.room_id.as_str());
        let side_live = live_ids.contains(room.side_channel_id.as_str());

        if !room_live || !side_live {
            actions.push(Action::DropRoom {
                room_id: room.room_id.clone(),
                side_channel_id: room.side_channel_id.clone(),
                reason: if room_live {
                    DropReason::SideChannelGone
                } else {
                    DropReason::RoomChannelGone
                },
            });
        } else if occupancy.get(&room.room_id).copied().unwrap_or(0) == 0 {
            actions.push(Action::ArmDelete {
                room_id: room.room_id.clone(),
                side_channel_id: room.side_channel_id.clone(),
            });
        } else {
            actions.push(Action::SyncRoom {
                room_id: room.room_id.clone(),
                side_channel_id: room.side_channel_id.clone(),
                owner_id: room.owner_id.clone(),
            });
        }
    }

    // Anything under the managed category that is neither infrastructure
    // nor a registered room pair is leftover debris.
    if let Some(category_id) = refs.category_id.as_deref() {
        let registered: HashSet<&str> = registry
            .iter()
            .flat_map(|r| [r.room_id.as_str(), r.side_channel_id.as_str()])
            .collect();
        for channel in live {
            if channel.parent_id.as_deref() != Some(category_id) {
                continue;
            }
            if Some(channel.id.as_str()) == refs.creator_channel_id.as_deref()
                || Some(channel.id.as_str()) == refs.panel_channel_id.as_deref()
                || registered.contains(channel.id.as_str())
            {
                continue;
            }
            actions.push(Action::Sweep {
                channel_id: channel.id.clone(),
            });
        }
    }

    if let Some(hub) = refs.panel_channel_id.as_deref() {
        actions.push(Action::RepairPanel {
            channel_id: hub.to_string(),
        });
    }

    actions
}

#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub dropped: usize,
    pub armed: usize,
    pub synced: usize,
    pub swept: usize,
    pub panel_reposted: bool,
}

/// Snapshot of the guild's voice and text channels from the cache.
fn live_channels(ctx: &SerenityContext, guild_id: GuildId) -> Vec<LiveChannel> {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return Vec::new();
    };
    guild
        .channels
        .values()
        .filter(|c| matches!(c.kind, ChannelType::Voice | ChannelType::Text))
        .map(|c| LiveChannel {
            id: c.id.to_string(),
            parent_id: c.parent_id.map(|p| p.to_string()),
        })
        .collect()
}

async fn delete_stray(http: &Http, channel_id: &str) -> Result<bool, RoomError> {
    let Some(channel) = parse_channel_id(channel_id) else {
        return Ok(false);
    };
    match channel.delete(http).await {
        Ok(_) => Ok(true),
        Err(e) if is_not_found(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Delete category children no registry row explains. Runs inside the
/// full reconcile pass and as a tidy right before each room creation.
pub async fn sweep_stray_children(
    ctx: &SerenityContext,
    conn: &mut SqliteConnection,
    guild_id: GuildId,
    config: &GuildConfig,
) -> Result<usize, RoomError> {
    let registry = Room::for_guild(conn, &guild_id.to_string())?;
    let live = live_channels(ctx, guild_id);
    let refs = KnownRefs::from_config(config);

    let mut swept = 0;
    for action in plan(&registry, &live, &HashMap::new(), &refs) {
        if let Action::Sweep { channel_id } = action {
            info!(%guild_id, channel_id, "sweeping unregistered channel");
            if delete_stray(&ctx.http, &channel_id).await? {
                swept += 1;
            }
        }
    }
    Ok(swept)
}

/// Converge one guild: plan against the cache snapshot, then execute.
pub async fn reconcile_guild(
    ctx: &SerenityContext,
    conn: &mut SqliteConnection,
    guild_id: GuildId,
    config: &GuildConfig,
) -> Result<ReconcileSummary, RoomError> {
    let registry = Room::for_guild(conn, &guild_id.to_string())?;
    let live = live_channels(ctx, guild_id);
    let occupancy = channel_occupancy(ctx, guild_id);
    let refs = KnownRefs::from_config(config);

    let lifecycle = Lifecycle::get(ctx).await;
    let bot_user_id = ctx.cache.current_user().id;
    let mut summary = ReconcileSummary::default();

    for action in plan(&registry, &live, &occupancy, &refs) {
        match action {
            Action::DropRoom { room_id, side_channel_id, reason } => {
                info!(%guild_id, room_id, ?reason, "dropping half-deleted room");
                let (Some(room), Some(side)) =
                    (parse_channel_id(&room_id), parse_channel_id(&side_channel_id))
                else {
                    Room::delete(conn, &room_id)?;
                    continue;
                };
                lifecycle.scheduler.cancel(room);
                rooms::delete_room_now(&ctx.http, room, side).await?;
                summary.dropped += 1;
            }
            Action::ArmDelete { room_id, side_channel_id } => {
                let (Some(room), Some(side)) =
                    (parse_channel_id(&room_id), parse_channel_id(&side_channel_id))
                else {
                    continue;
                };
                schedule_room_delete(&lifecycle, ctx.http.clone(), config, room, side);
                summary.armed += 1;
            }
            Action::SyncRoom { room_id, side_channel_id, owner_id } => {
                let (Some(room), Some(side), Some(owner)) = (
                    parse_channel_id(&room_id),
                    parse_channel_id(&side_channel_id),
                    parse_user_id(&owner_id),
                ) else {
                    continue;
                };
                // The occupancy snapshot may be stale by now; a room that
                // emptied since then keeps (or gets) its timer instead of
                // losing it to an unconditional cancel.
                let occupants = voice_members(ctx, guild_id, room);
                if occupants.is_empty() {
                    schedule_room_delete(&lifecycle, ctx.http.clone(), config, room, side);
                    summary.armed += 1;
                    continue;
                }
                lifecycle.scheduler.cancel(room);
                if occupants.contains(&owner) {
                    Room::touch_owner_seen(conn, &room_id, now_ms())?;
                }
                if let Err(e) = sync_side_channel(ctx, guild_id, room, side, owner).await {
                    warn!(%guild_id, room_id, "side channel sync failed: {e:?}");
                }
                if let Err(e) = panel::ensure_room_panel(&ctx.http, side, config, bot_user_id).await
                {
                    warn!(%guild_id, room_id, "panel repair failed: {e:?}");
                }
                summary.synced += 1;
            }
            Action::Sweep { channel_id } => {
                info!(%guild_id, channel_id, "sweeping unregistered channel");
                if delete_stray(&ctx.http, &channel_id).await? {
                    summary.swept += 1;
                }
            }
            Action::RepairPanel { channel_id } => {
                let Some(hub) = parse_channel_id(&channel_id) else {
                    continue;
                };
                match panel::repair_shared_panel(&ctx.http, conn, hub, config).await {
                    Ok(reposted) => summary.panel_reposted = reposted,
                    Err(e) => warn!(%guild_id, channel_id, "shared panel repair failed: {e:?}"),
                }
            }
        }
    }

    info!(
        %guild_id,
        dropped = summary.dropped,
        armed = summary.armed,
        synced = summary.synced,
        swept = summary.swept,
        panel_reposted = summary.panel_reposted,
        "guild reconciled"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(id: &str, side: &str, owner: &str) -> Room {
        Room {
            room_id: id.to_string(),
            guild_id: "g1".to_string(),
            side_channel_id: side.to_string(),
            owner_id: owner.to_string(),
            created_at: 0,
            last_owner_seen_at: 0,
        }
    }

    fn chan(id: &str, parent: &str) -> LiveChannel {
        LiveChannel {
            id: id.to_string(),
            parent_id: Some(parent.to_string()),
        }
    }

    fn refs() -> KnownRefs {
        KnownRefs {
            category_id: Some("cat".into()),
            creator_channel_id: Some("creator".into()),
            panel_channel_id: Some("hub".into()),
        }
    }

    fn repair_panel() -> Action {
        Action::RepairPanel { channel_id: "hub".into() }
    }

    #[test]
    fn missing_room_channel_drops_the_pair() {
        let registry = vec![room("v1", "t1", "u1")];
        let live = vec![chan("t1", "cat")];
        let actions = plan(&registry, &live, &HashMap::new(), &refs());
        assert_eq!(
            actions,
            vec![
                Action::DropRoom {
                    room_id: "v1".into(),
                    side_channel_id: "t1".into(),
                    reason: DropReason::RoomChannelGone,
                },
                repair_panel(),
            ]
        );
    }

    #[test]
    fn missing_side_channel_tears_down_the_room() {
        let registry = vec![room("v1", "t1", "u1")];
        let live = vec![chan("v1", "cat")];
        let actions = plan(&registry, &live, &HashMap::new(), &refs());
        assert_eq!(
            actions,
            vec![
                Action::DropRoom {
                    room_id: "v1".into(),
                    side_channel_id: "t1".into(),
                    reason: DropReason::SideChannelGone,
                },
                repair_panel(),
            ]
        );
    }

    #[test]
    fn empty_room_gets_a_timer_and_occupied_room_gets_a_sync() {
        let registry = vec![room("v1", "t1", "u1"), room("v2", "t2", "u2")];
        let live = vec![
            chan("v1", "cat"),
            chan("t1", "cat"),
            chan("v2", "cat"),
            chan("t2", "cat"),
        ];
        let occupancy = HashMap::from([("v2".to_string(), 3)]);
        let actions = plan(&registry, &live, &occupancy, &refs());
        assert_eq!(
            actions,
            vec![
                Action::ArmDelete { room_id: "v1".into(), side_channel_id: "t1".into() },
                Action::SyncRoom {
                    room_id: "v2".into(),
                    side_channel_id: "t2".into(),
                    owner_id: "u2".into(),
                },
                repair_panel(),
            ]
        );
    }

    #[test]
    fn sweeps_unregistered_children_but_spares_infrastructure() {
        let registry = vec![room("v1", "t1", "u1")];
        let live = vec![
            chan("v1", "cat"),
            chan("t1", "cat"),
            chan("creator", "cat"),
            chan("hub", "cat"),
            chan("stray", "cat"),
            chan("elsewhere", "other-cat"),
        ];
        let occupancy = HashMap::from([("v1".to_string(), 1)]);
        let actions = plan(&registry, &live, &occupancy, &refs());
        assert!(actions.contains(&Action::Sweep { channel_id: "stray".into() }));
        assert!(!actions.iter().any(|a| matches!(
            a,
            Action::Sweep { channel_id } if channel_id != "stray"
        )));
    }

    #[test]
    fn no_category_means_no_sweeping() {
        let live = vec![chan("stray", "cat")];
        let actions = plan(&[], &live, &HashMap::new(), &KnownRefs::default());
        assert!(actions.is_empty());
    }

    // The shared panel is checked on every pass, not only from the repair
    // command, so a restart heals a deleted panel message too.
    #[test]
    fn panel_repair_is_planned_whenever_the_hub_is_known() {
        let actions = plan(&[], &[], &HashMap::new(), &refs());
        assert_eq!(actions, vec![repair_panel()]);

        let mut no_hub = refs();
        no_hub.panel_channel_id = None;
        assert!(plan(&[], &[], &HashMap::new(), &no_hub).is_empty());
    }

    // Applying the plan converges: a second plan over the resulting state
    // proposes nothing beyond the standing panel check.
    #[test]
    fn plan_is_idempotent_after_execution() {
        let registry = vec![room("v1", "t1", "u1"), room("v2", "t2", "u2")];
        let live = vec![
            chan("v1", "cat"),
            chan("t1", "cat"),
            chan("t2", "cat"),
            chan("stray", "cat"),
        ];
        let occupancy = HashMap::from([("v1".to_string(), 2)]);
        let first = plan(&registry, &live, &occupancy, &refs());
        assert_eq!(first.len(), 4);

        // Simulate execution: v2's pair is dropped, stray is swept.
        let registry: Vec<Room> = registry.into_iter().filter(|r| r.room_id != "v2").collect();
        let live: Vec<LiveChannel> = live
            .into_iter()
            .filter(|c| c.id != "t2" && c.id != "stray")
            .collect();
        let second = plan(&registry, &live, &occupancy, &refs());
        assert_eq!(
            second,
            vec![
                Action::SyncRoom {
                    room_id: "v1".into(),
                    side_channel_id: "t1".into(),
                    owner_id: "u1".into(),
                },
                repair_panel(),
            ]
        );
    }
}
