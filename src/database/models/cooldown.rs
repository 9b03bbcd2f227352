use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::database::schema::cooldowns;

/// Last room-creation time per (guild, user), for creation throttling.
#[derive(Queryable, Selectable, Insertable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = cooldowns)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Cooldown {
    pub guild_id: String,
    pub user_id: String,
    pub last_created_at: i64,
}

impl Cooldown {
    pub fn last_created_at(
        conn: &mut SqliteConnection,
        guild_id: &str,
        user_id: &str,
    ) -> QueryResult<Option<i64>> {
        cooldowns::table
            .filter(cooldowns::guild_id.eq(guild_id))
            .filter(cooldowns::user_id.eq(user_id))
            .select(cooldowns::last_created_at)
            .first(conn)
            .optional()
    }

    /// Record a successful creation, overwriting any previous timestamp.
    pub fn record(
        conn: &mut SqliteConnection,
        guild_id: &str,
        user_id: &str,
        now_ms: i64,
    ) -> QueryResult<usize> {
        diesel::insert_into(cooldowns::table)
            .values(&Cooldown {
                guild_id: guild_id.to_string(),
                user_id: user_id.to_string(),
                last_created_at: now_ms,
            })
            .on_conflict((cooldowns::guild_id, cooldowns::user_id))
            .do_update()
            .set(cooldowns::last_created_at.eq(now_ms))
            .execute(conn)
    }

    pub fn clear_guild(conn: &mut SqliteConnection, guild_id: &str) -> QueryResult<usize> {
        diesel::delete(cooldowns::table)
            .filter(cooldowns::guild_id.eq(guild_id))
            .execute(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_connection;

    #[test]
    fn record_upserts_on_conflict() {
        let mut conn = test_connection();
        Cooldown::record(&mut conn, "g1", "u1", 100).unwrap();
        Cooldown::record(&mut conn, "g1", "u1", 200).unwrap();

        assert_eq!(
            Cooldown::last_created_at(&mut conn, "g1", "u1").unwrap(),
            Some(200)
        );
        assert_eq!(Cooldown::last_created_at(&mut conn, "g1", "u2").unwrap(), None);
    }

    #[test]
    fn clear_guild_scopes_to_one_guild() {
        let mut conn = test_connection();
        Cooldown::record(&mut conn, "g1", "u1", 100).unwrap();
        Cooldown::record(&mut conn, "g2", "u1", 100).unwrap();

        Cooldown::clear_guild(&mut conn, "g1").unwrap();
        assert_eq!(Cooldown::last_created_at(&mut conn, "g1", "u1").unwrap(), None);
        assert_eq!(
            Cooldown::last_created_at(&mut conn, "g2", "u1").unwrap(),
            Some(100)
        );
    }
}
