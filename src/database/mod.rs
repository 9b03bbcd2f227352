pub mod models;
pub mod schema;

use anyhow::{Context as _, Result};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::env;

/// Open a connection to the sqlite database named by DATABASE_URL.
///
/// Connections are cheap for sqlite; callers open one per operation the
/// same way the command handlers do, rather than sharing a pool.
pub fn establish_connection() -> Result<SqliteConnection> {
    let url = env::database_url();
    let mut conn = SqliteConnection::establish(&url)
        .with_context(|| format!("failed to open sqlite database at {url}"))?;
    // Concurrent handlers may interleave writes; wait instead of erroring.
    conn.batch_execute("PRAGMA busy_timeout = 5000;")
        .context("failed to set busy_timeout")?;
    Ok(conn)
}

/// Create tables if missing. Safe to run on every startup.
pub fn init_schema(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute(
        r#"
        CREATE TABLE IF NOT EXISTS guild_config (
            guild_id TEXT PRIMARY KEY NOT NULL,
            enabled BOOLEAN NOT NULL DEFAULT 1,
            category_id TEXT,
            creator_channel_id TEXT,
            panel_channel_id TEXT,
            panel_message_id TEXT,
            log_channel_id TEXT,
            name_template TEXT NOT NULL DEFAULT '{username}''s Room',
            brand_color TEXT NOT NULL DEFAULT '#5865F2',
            cooldown_seconds INTEGER NOT NULL DEFAULT 60,
            delete_delay_seconds INTEGER NOT NULL DEFAULT 300,
            claim_timeout_seconds INTEGER NOT NULL DEFAULT 120,
            max_rooms_per_user INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS rooms (
            room_id TEXT PRIMARY KEY NOT NULL,
            guild_id TEXT NOT NULL,
            side_channel_id TEXT NOT NULL UNIQUE,
            owner_id TEXT NOT NULL,
            created_at BIGINT NOT NULL,
            last_owner_seen_at BIGINT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_rooms_guild_owner ON rooms (guild_id, owner_id);

        CREATE TABLE IF NOT EXISTS cooldowns (
            guild_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            last_created_at BIGINT NOT NULL,
            PRIMARY KEY (guild_id, user_id)
        );
        "#,
    )
}

#[cfg(test)]
pub(crate) fn test_connection() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:").expect("in-memory sqlite");
    init_schema(&mut conn).expect("schema");
    conn
}
