use crate::database::models::{GuildConfig, Room};

/// A room is orphaned when its owner is absent and has been unseen for at
/// least the claim timeout. Owner presence always wins over elapsed time.
pub fn is_orphaned(room: &Room, config: &GuildConfig, owner_present: bool, now_ms: i64) -> bool {
    !owner_present && now_ms - room.last_owner_seen_at >= config.claim_timeout_ms()
}

/// Whether `claimant` may take ownership right now. Claiming is an
/// explicit privileged action: the claimant must be present in the room,
/// must not already own it, and admins and bots are excluded.
#[allow(clippy::too_many_arguments)]
pub fn claim_allowed(
    room: &Room,
    config: &GuildConfig,
    owner_present: bool,
    now_ms: i64,
    claimant_is_owner: bool,
    claimant_present: bool,
    claimant_is_admin: bool,
    claimant_is_bot: bool,
) -> bool {
    !claimant_is_owner
        && claimant_present
        && !claimant_is_admin
        && !claimant_is_bot
        && is_orphaned(room, config, owner_present, now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewGuildConfig;
    use crate::database::test_connection;

    fn fixtures(claim_timeout: i32) -> (Room, GuildConfig) {
        let mut conn = test_connection();
        let mut row = NewGuildConfig::with_defaults("g1", None);
        row.claim_timeout_seconds = claim_timeout;
        GuildConfig::upsert_full(&mut conn, &row).unwrap();
        let config = GuildConfig::find(&mut conn, "g1").unwrap().unwrap();

        let room = Room {
            room_id: "v1".into(),
            guild_id: "g1".into(),
            side_channel_id: "t1".into(),
            owner_id: "u1".into(),
            created_at: 0,
            last_owner_seen_at: 0,
        };
        (room, config)
    }

    #[test]
    fn present_owner_is_never_orphaned() {
        let (room, config) = fixtures(120);
        assert!(!is_orphaned(&room, &config, true, i64::MAX / 2));
    }

    #[test]
    fn absent_owner_orphans_only_after_timeout() {
        let (room, config) = fixtures(120);
        assert!(!is_orphaned(&room, &config, false, 119_999));
        assert!(is_orphaned(&room, &config, false, 120_000));
        assert!(is_orphaned(&room, &config, false, 500_000));
    }

    // Owner leaves at t=0 with a 120s timeout. A claim attempt at t=100
    // is denied, at t=121 allowed.
    #[test]
    fn claim_window_opens_at_timeout() {
        let (room, config) = fixtures(120);
        let claim = |now_ms| {
            claim_allowed(&room, &config, false, now_ms, false, true, false, false)
        };
        assert!(!claim(100_000));
        assert!(claim(121_000));
    }

    #[test]
    fn owner_admin_bot_and_absent_members_cannot_claim() {
        let (room, config) = fixtures(120);
        let now = 500_000;
        assert!(claim_allowed(&room, &config, false, now, false, true, false, false));
        assert!(!claim_allowed(&room, &config, false, now, true, true, false, false));
        assert!(!claim_allowed(&room, &config, false, now, false, false, false, false));
        assert!(!claim_allowed(&room, &config, false, now, false, true, true, false));
        assert!(!claim_allowed(&room, &config, false, now, false, true, false, true));
    }
}
