use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::rooms;

/// A user-created voice room and its paired text channel.
///
/// The row exists only while both channels do; it is inserted after both
/// are allocated and deleted once both are confirmed gone (explicitly or
/// by reconciliation finding them missing). Timestamps are epoch ms.
#[derive(Queryable, Selectable, Insertable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = rooms)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Room {
    pub room_id: String,
    pub guild_id: String,
    pub side_channel_id: String,
    pub owner_id: String,
    pub created_at: i64,
    pub last_owner_seen_at: i64,
}

impl Room {
    pub fn find(conn: &mut SqliteConnection, room_id: &str) -> QueryResult<Option<Room>> {
        rooms::table
            .filter(rooms::room_id.eq(room_id))
            .first::<Room>(conn)
            .optional()
    }

    pub fn find_by_side_channel(
        conn: &mut SqliteConnection,
        side_channel_id: &str,
    ) -> QueryResult<Option<Room>> {
        rooms::table
            .filter(rooms::side_channel_id.eq(side_channel_id))
            .first::<Room>(conn)
            .optional()
    }

    pub fn for_guild(conn: &mut SqliteConnection, guild_id: &str) -> QueryResult<Vec<Room>> {
        rooms::table
            .filter(rooms::guild_id.eq(guild_id))
            .load(conn)
    }

    pub fn count_by_owner(
        conn: &mut SqliteConnection,
        guild_id: &str,
        owner_id: &str,
    ) -> QueryResult<i64> {
        rooms::table
            .filter(rooms::guild_id.eq(guild_id))
            .filter(rooms::owner_id.eq(owner_id))
            .count()
            .get_result(conn)
    }

    pub fn insert(conn: &mut SqliteConnection, room: &Room) -> QueryResult<usize> {
        diesel::insert_into(rooms::table).values(room).execute(conn)
    }

    pub fn delete(conn: &mut SqliteConnection, room_id: &str) -> QueryResult<usize> {
        diesel::delete(rooms::table)
            .filter(rooms::room_id.eq(room_id))
            .execute(conn)
    }

    pub fn delete_guild(conn: &mut SqliteConnection, guild_id: &str) -> QueryResult<usize> {
        diesel::delete(rooms::table)
            .filter(rooms::guild_id.eq(guild_id))
            .execute(conn)
    }

    /// Ownership transfer or claim. Resets the owner-seen clock.
    pub fn update_owner(
        conn: &mut SqliteConnection,
        room_id: &str,
        new_owner_id: &str,
        now_ms: i64,
    ) -> QueryResult<usize> {
        diesel::update(rooms::table)
            .filter(rooms::room_id.eq(room_id))
            .set((
                rooms::owner_id.eq(new_owner_id),
                rooms::last_owner_seen_at.eq(now_ms),
            ))
            .execute(conn)
    }

    /// Presence update: the current owner was observed in the room.
    pub fn touch_owner_seen(
        conn: &mut SqliteConnection,
        room_id: &str,
        now_ms: i64,
    ) -> QueryResult<usize> {
        diesel::update(rooms::table)
            .filter(rooms::room_id.eq(room_id))
            .set(rooms::last_owner_seen_at.eq(now_ms))
            .execute(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_connection;

    fn room(id: &str, guild: &str, owner: &str) -> Room {
        Room {
            room_id: id.to_string(),
            guild_id: guild.to_string(),
            side_channel_id: format!("side-{id}"),
            owner_id: owner.to_string(),
            created_at: 1_000,
            last_owner_seen_at: 1_000,
        }
    }

    #[test]
    fn counts_rooms_per_owner_per_guild() {
        let mut conn = test_connection();
        Room::insert(&mut conn, &room("v1", "g1", "u1")).unwrap();
        Room::insert(&mut conn, &room("v2", "g1", "u1")).unwrap();
        Room::insert(&mut conn, &room("v3", "g2", "u1")).unwrap();

        assert_eq!(Room::count_by_owner(&mut conn, "g1", "u1").unwrap(), 2);
        assert_eq!(Room::count_by_owner(&mut conn, "g2", "u1").unwrap(), 1);
        assert_eq!(Room::count_by_owner(&mut conn, "g1", "u2").unwrap(), 0);
    }

    #[test]
    fn side_channel_is_unique_and_resolvable() {
        let mut conn = test_connection();
        Room::insert(&mut conn, &room("v1", "g1", "u1")).unwrap();

        let found = Room::find_by_side_channel(&mut conn, "side-v1")
            .unwrap()
            .unwrap();
        assert_eq!(found.room_id, "v1");

        let mut dup = room("v2", "g1", "u2");
        dup.side_channel_id = "side-v1".to_string();
        assert!(Room::insert(&mut conn, &dup).is_err());
    }

    #[test]
    fn owner_update_resets_seen_clock() {
        let mut conn = test_connection();
        Room::insert(&mut conn, &room("v1", "g1", "u1")).unwrap();
        Room::update_owner(&mut conn, "v1", "u2", 9_999).unwrap();

        let r = Room::find(&mut conn, "v1").unwrap().unwrap();
        assert_eq!(r.owner_id, "u2");
        assert_eq!(r.last_owner_seen_at, 9_999);
    }

    #[test]
    fn delete_removes_only_the_row() {
        let mut conn = test_connection();
        Room::insert(&mut conn, &room("v1", "g1", "u1")).unwrap();
        Room::insert(&mut conn, &room("v2", "g1", "u2")).unwrap();

        assert_eq!(Room::delete(&mut conn, "v1").unwrap(), 1);
        assert!(Room::find(&mut conn, "v1").unwrap().is_none());
        assert!(Room::find(&mut conn, "v2").unwrap().is_some());
        // Idempotent: deleting again is a no-op, not an error
        assert_eq!(Room::delete(&mut conn, "v1").unwrap(), 0);
    }
}
