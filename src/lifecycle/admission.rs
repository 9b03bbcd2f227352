use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::database::models::{Cooldown, GuildConfig, Room};

/// Outcome of the creation admission check. Denial is a normal decision,
/// not an error; the reason is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied { reason: String },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

/// Pure admission decision: quota first, then cooldown.
///
/// Has no side effects and reserves nothing; the creation guard is what
/// keeps two concurrent callers from both passing and both creating.
pub fn decide(
    owned_rooms: i64,
    last_created_at: Option<i64>,
    now_ms: i64,
    config: &GuildConfig,
) -> Verdict {
    if owned_rooms >= i64::from(config.max_rooms_per_user) {
        return Verdict::Denied {
            reason: format!(
                "You can only have up to {} active room(s).",
                config.max_rooms_per_user
            ),
        };
    }

    if let Some(last) = last_created_at {
        let elapsed = now_ms - last;
        let required = config.cooldown_ms();
        if elapsed < required {
            let remaining_secs = ((required - elapsed) as u64).div_ceil(1000);
            return Verdict::Denied {
                reason: format!("Please wait {remaining_secs} seconds before creating another room."),
            };
        }
    }

    Verdict::Allowed
}

/// Admission check against the registry and cooldown ledger.
pub fn can_create(
    conn: &mut SqliteConnection,
    guild_id: &str,
    user_id: &str,
    config: &GuildConfig,
    now_ms: i64,
) -> QueryResult<Verdict> {
    let owned = Room::count_by_owner(conn, guild_id, user_id)?;
    let last = Cooldown::last_created_at(conn, guild_id, user_id)?;
    Ok(decide(owned, last, now_ms, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewGuildConfig;
    use crate::database::test_connection;

    fn config(cooldown: i32, max_rooms: i32) -> GuildConfig {
        let mut conn = test_connection();
        let mut row = NewGuildConfig::with_defaults("g1", None);
        row.cooldown_seconds = cooldown;
        row.max_rooms_per_user = max_rooms;
        GuildConfig::upsert_full(&mut conn, &row).unwrap();
        GuildConfig::find(&mut conn, "g1").unwrap().unwrap()
    }

    #[test]
    fn quota_denies_before_cooldown_is_consulted() {
        let cfg = config(60, 1);
        // Cooldown would also deny, but the quota message must win
        let v = decide(1, Some(0), 1_000, &cfg);
        match v {
            Verdict::Denied { reason } => assert!(reason.contains("1 active room")),
            Verdict::Allowed => panic!("quota should deny"),
        }
    }

    #[test]
    fn cooldown_denies_with_ceiling_of_remaining_seconds() {
        let cfg = config(60, 1);
        // 30.001s elapsed of 60s: 29.999s remain, reported as 30
        let v = decide(0, Some(0), 30_001, &cfg);
        match v {
            Verdict::Denied { reason } => assert!(reason.contains("wait 30 seconds"), "{reason}"),
            Verdict::Allowed => panic!("cooldown should deny"),
        }
        // 1ms remaining still reports 1 second
        match decide(0, Some(0), 59_999, &cfg) {
            Verdict::Denied { reason } => assert!(reason.contains("wait 1 seconds"), "{reason}"),
            Verdict::Allowed => panic!("cooldown should deny"),
        }
    }

    #[test]
    fn allowed_once_cooldown_has_elapsed() {
        let cfg = config(60, 1);
        assert!(decide(0, Some(0), 60_000, &cfg).is_allowed());
        assert!(decide(0, None, 0, &cfg).is_allowed());
    }

    #[test]
    fn zero_cooldown_never_throttles() {
        let cfg = config(0, 1);
        assert!(decide(0, Some(500), 500, &cfg).is_allowed());
    }

    // Cooldown 60s, quota 1. Create at t=0, retry at t=30
    // while still owning a room (quota denies), delete the room, retry at
    // t=61 (allowed).
    #[test]
    fn quota_then_cooldown_scenario() {
        let mut conn = test_connection();
        let cfg = config(60, 1);

        assert!(
            can_create(&mut conn, "g1", "u1", &cfg, 0).unwrap().is_allowed()
        );
        Room::insert(
            &mut conn,
            &Room {
                room_id: "v1".into(),
                guild_id: "g1".into(),
                side_channel_id: "t1".into(),
                owner_id: "u1".into(),
                created_at: 0,
                last_owner_seen_at: 0,
            },
        )
        .unwrap();
        Cooldown::record(&mut conn, "g1", "u1", 0).unwrap();

        let at_30s = can_create(&mut conn, "g1", "u1", &cfg, 30_000).unwrap();
        match at_30s {
            Verdict::Denied { reason } => assert!(reason.contains("active room")),
            Verdict::Allowed => panic!("should be quota-denied"),
        }

        Room::delete(&mut conn, "v1").unwrap();
        assert!(
            can_create(&mut conn, "g1", "u1", &cfg, 61_000)
                .unwrap()
                .is_allowed()
        );
    }
}
