use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::database::schema::guild_config;

pub const DEFAULT_NAME_TEMPLATE: &str = "{username}'s Room";
pub const DEFAULT_BRAND_COLOR: &str = "#5865F2";
pub const DEFAULT_COOLDOWN_SECONDS: i32 = 60;
pub const DEFAULT_DELETE_DELAY_SECONDS: i32 = 300;
pub const DEFAULT_CLAIM_TIMEOUT_SECONDS: i32 = 120;
pub const DEFAULT_MAX_ROOMS_PER_USER: i32 = 1;

/// Per-guild automation settings. One row per guild, created by /setup.
#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = guild_config)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GuildConfig {
    pub guild_id: String,
    pub enabled: bool,
    pub category_id: Option<String>,
    pub creator_channel_id: Option<String>,
    pub panel_channel_id: Option<String>,
    pub panel_message_id: Option<String>,
    pub log_channel_id: Option<String>,
    pub name_template: String,
    pub brand_color: String,
    pub cooldown_seconds: i32,
    pub delete_delay_seconds: i32,
    pub claim_timeout_seconds: i32,
    pub max_rooms_per_user: i32,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = guild_config)]
pub struct NewGuildConfig {
    pub guild_id: String,
    pub enabled: bool,
    pub category_id: Option<String>,
    pub creator_channel_id: Option<String>,
    pub panel_channel_id: Option<String>,
    pub panel_message_id: Option<String>,
    pub log_channel_id: Option<String>,
    pub name_template: String,
    pub brand_color: String,
    pub cooldown_seconds: i32,
    pub delete_delay_seconds: i32,
    pub claim_timeout_seconds: i32,
    pub max_rooms_per_user: i32,
}

impl NewGuildConfig {
    /// Full row with defaults, carrying over tunables from a previous
    /// config when present. Channel references start unset; /setup fills
    /// them in after creating the channels.
    pub fn with_defaults(guild_id: &str, previous: Option<&GuildConfig>) -> Self {
        Self {
            guild_id: guild_id.to_string(),
            enabled: true,
            category_id: None,
            creator_channel_id: None,
            panel_channel_id: None,
            panel_message_id: None,
            log_channel_id: previous.and_then(|p| p.log_channel_id.clone()),
            name_template: previous
                .map(|p| p.name_template.clone())
                .unwrap_or_else(|| DEFAULT_NAME_TEMPLATE.to_string()),
            brand_color: previous
                .map(|p| p.brand_color.clone())
                .unwrap_or_else(|| DEFAULT_BRAND_COLOR.to_string()),
            cooldown_seconds: previous
                .map(|p| p.cooldown_seconds)
                .unwrap_or(DEFAULT_COOLDOWN_SECONDS),
            delete_delay_seconds: previous
                .map(|p| p.delete_delay_seconds)
                .unwrap_or(DEFAULT_DELETE_DELAY_SECONDS),
            claim_timeout_seconds: previous
                .map(|p| p.claim_timeout_seconds)
                .unwrap_or(DEFAULT_CLAIM_TIMEOUT_SECONDS),
            max_rooms_per_user: previous
                .map(|p| p.max_rooms_per_user)
                .unwrap_or(DEFAULT_MAX_ROOMS_PER_USER),
        }
    }
}

impl GuildConfig {
    pub fn find(conn: &mut SqliteConnection, guild_id: &str) -> QueryResult<Option<GuildConfig>> {
        guild_config::table
            .filter(guild_config::guild_id.eq(guild_id))
            .first::<GuildConfig>(conn)
            .optional()
    }

    pub fn guild_ids(conn: &mut SqliteConnection) -> QueryResult<Vec<String>> {
        guild_config::table
            .select(guild_config::guild_id)
            .load(conn)
    }

    /// Insert or fully replace a guild's config row. Always supplies every
    /// field so a row is never partially missing once created.
    pub fn upsert_full(conn: &mut SqliteConnection, row: &NewGuildConfig) -> QueryResult<usize> {
        diesel::insert_into(guild_config::table)
            .values(row)
            .on_conflict(guild_config::guild_id)
            .do_update()
            .set((
                guild_config::enabled.eq(&row.enabled),
                guild_config::category_id.eq(&row.category_id),
                guild_config::creator_channel_id.eq(&row.creator_channel_id),
                guild_config::panel_channel_id.eq(&row.panel_channel_id),
                guild_config::panel_message_id.eq(&row.panel_message_id),
                guild_config::log_channel_id.eq(&row.log_channel_id),
                guild_config::name_template.eq(&row.name_template),
                guild_config::brand_color.eq(&row.brand_color),
                guild_config::cooldown_seconds.eq(row.cooldown_seconds),
                guild_config::delete_delay_seconds.eq(row.delete_delay_seconds),
                guild_config::claim_timeout_seconds.eq(row.claim_timeout_seconds),
                guild_config::max_rooms_per_user.eq(row.max_rooms_per_user),
            ))
            .execute(conn)
    }

    pub fn set_enabled(
        conn: &mut SqliteConnection,
        guild_id: &str,
        enabled: bool,
    ) -> QueryResult<usize> {
        diesel::update(guild_config::table)
            .filter(guild_config::guild_id.eq(guild_id))
            .set(guild_config::enabled.eq(enabled))
            .execute(conn)
    }

    pub fn set_name_template(
        conn: &mut SqliteConnection,
        guild_id: &str,
        template: &str,
    ) -> QueryResult<usize> {
        diesel::update(guild_config::table)
            .filter(guild_config::guild_id.eq(guild_id))
            .set(guild_config::name_template.eq(template))
            .execute(conn)
    }

    pub fn set_brand_color(
        conn: &mut SqliteConnection,
        guild_id: &str,
        color: &str,
    ) -> QueryResult<usize> {
        diesel::update(guild_config::table)
            .filter(guild_config::guild_id.eq(guild_id))
            .set(guild_config::brand_color.eq(color))
            .execute(conn)
    }

    pub fn set_cooldown_seconds(
        conn: &mut SqliteConnection,
        guild_id: &str,
        seconds: i32,
    ) -> QueryResult<usize> {
        diesel::update(guild_config::table)
            .filter(guild_config::guild_id.eq(guild_id))
            .set(guild_config::cooldown_seconds.eq(seconds))
            .execute(conn)
    }

    pub fn set_delete_delay_seconds(
        conn: &mut SqliteConnection,
        guild_id: &str,
        seconds: i32,
    ) -> QueryResult<usize> {
        diesel::update(guild_config::table)
            .filter(guild_config::guild_id.eq(guild_id))
            .set(guild_config::delete_delay_seconds.eq(seconds))
            .execute(conn)
    }

    pub fn set_claim_timeout_seconds(
        conn: &mut SqliteConnection,
        guild_id: &str,
        seconds: i32,
    ) -> QueryResult<usize> {
        diesel::update(guild_config::table)
            .filter(guild_config::guild_id.eq(guild_id))
            .set(guild_config::claim_timeout_seconds.eq(seconds))
            .execute(conn)
    }

    pub fn set_max_rooms_per_user(
        conn: &mut SqliteConnection,
        guild_id: &str,
        max: i32,
    ) -> QueryResult<usize> {
        diesel::update(guild_config::table)
            .filter(guild_config::guild_id.eq(guild_id))
            .set(guild_config::max_rooms_per_user.eq(max))
            .execute(conn)
    }

    pub fn set_log_channel(
        conn: &mut SqliteConnection,
        guild_id: &str,
        channel_id: Option<&str>,
    ) -> QueryResult<usize> {
        diesel::update(guild_config::table)
            .filter(guild_config::guild_id.eq(guild_id))
            .set(guild_config::log_channel_id.eq(channel_id))
            .execute(conn)
    }

    pub fn set_panel_message(
        conn: &mut SqliteConnection,
        guild_id: &str,
        message_id: Option<&str>,
    ) -> QueryResult<usize> {
        diesel::update(guild_config::table)
            .filter(guild_config::guild_id.eq(guild_id))
            .set(guild_config::panel_message_id.eq(message_id))
            .execute(conn)
    }

    /// Forget category/creator/panel references after a teardown.
    pub fn clear_channel_refs(conn: &mut SqliteConnection, guild_id: &str) -> QueryResult<usize> {
        diesel::update(guild_config::table)
            .filter(guild_config::guild_id.eq(guild_id))
            .set((
                guild_config::category_id.eq(None::<String>),
                guild_config::creator_channel_id.eq(None::<String>),
                guild_config::panel_channel_id.eq(None::<String>),
                guild_config::panel_message_id.eq(None::<String>),
            ))
            .execute(conn)
    }

    pub fn cooldown_ms(&self) -> i64 {
        i64::from(self.cooldown_seconds) * 1000
    }

    pub fn claim_timeout_ms(&self) -> i64 {
        i64::from(self.claim_timeout_seconds) * 1000
    }

    /// Deletion delay, floored at one second so a zero config never tears
    /// a room down in the same tick as the leave event.
    pub fn delete_delay(&self) -> Duration {
        Duration::from_millis((i64::from(self.delete_delay_seconds) * 1000).max(1000) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_connection;

    #[test]
    fn upsert_creates_with_defaults() {
        let mut conn = test_connection();
        let row = NewGuildConfig::with_defaults("g1", None);
        GuildConfig::upsert_full(&mut conn, &row).unwrap();

        let cfg = GuildConfig::find(&mut conn, "g1").unwrap().unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.name_template, DEFAULT_NAME_TEMPLATE);
        assert_eq!(cfg.cooldown_seconds, DEFAULT_COOLDOWN_SECONDS);
        assert_eq!(cfg.max_rooms_per_user, DEFAULT_MAX_ROOMS_PER_USER);
        assert!(cfg.category_id.is_none());
    }

    #[test]
    fn upsert_carries_tunables_from_previous_config() {
        let mut conn = test_connection();
        let mut row = NewGuildConfig::with_defaults("g1", None);
        row.cooldown_seconds = 5;
        row.log_channel_id = Some("log".into());
        GuildConfig::upsert_full(&mut conn, &row).unwrap();

        let prev = GuildConfig::find(&mut conn, "g1").unwrap().unwrap();
        let fresh = NewGuildConfig::with_defaults("g1", Some(&prev));
        assert_eq!(fresh.cooldown_seconds, 5);
        assert_eq!(fresh.log_channel_id.as_deref(), Some("log"));
        assert!(fresh.category_id.is_none());
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let mut conn = test_connection();
        GuildConfig::upsert_full(&mut conn, &NewGuildConfig::with_defaults("g1", None)).unwrap();

        let mut row = NewGuildConfig::with_defaults("g1", None);
        row.category_id = Some("cat".into());
        row.enabled = false;
        GuildConfig::upsert_full(&mut conn, &row).unwrap();

        let cfg = GuildConfig::find(&mut conn, "g1").unwrap().unwrap();
        assert_eq!(cfg.category_id.as_deref(), Some("cat"));
        assert!(!cfg.enabled);
        assert_eq!(GuildConfig::guild_ids(&mut conn).unwrap().len(), 1);
    }

    #[test]
    fn delete_delay_floors_at_one_second() {
        let mut row = NewGuildConfig::with_defaults("g1", None);
        row.delete_delay_seconds = 0;
        let mut conn = test_connection();
        GuildConfig::upsert_full(&mut conn, &row).unwrap();
        let cfg = GuildConfig::find(&mut conn, "g1").unwrap().unwrap();
        assert_eq!(cfg.delete_delay(), Duration::from_secs(1));
    }
}
