use std::sync::Arc;

use anyhow::Result;
use serenity::{
    all::{Context as SerenityContext, GatewayIntents, GuildId, Interaction, Permissions, Ready},
    async_trait,
};
use tracing::{error, info, warn};

mod audit;
mod commands;
mod controls;
mod database;
mod env;
mod error;
mod events;
mod lifecycle;
mod panel;
mod permissions;
mod reconcile;
mod rooms;
mod template;

use lifecycle::{Lifecycle, LifecycleKey};

struct Handler;

#[async_trait]
impl serenity::prelude::EventHandler for Handler {
    async fn ready(&self, ctx: SerenityContext, ready: Ready) {
        info!("Logged in as {}", ready.user.name);

        let perms = Permissions::MANAGE_CHANNELS
            | Permissions::MOVE_MEMBERS
            | Permissions::VIEW_CHANNEL
            | Permissions::SEND_MESSAGES
            | Permissions::CONNECT;
        if let Ok(app) = ctx.http.get_current_application_info().await {
            let invite = format!(
                "https://discord.com/api/oauth2/authorize?client_id={}&permissions={}&scope=bot%20applications.commands",
                app.id,
                perms.bits()
            );
            info!("Invite this bot: {} (app_id={})", invite, app.id);
        }
    }

    // Runs once the guild cache is populated, which command registration
    // and reconciliation both need.
    async fn cache_ready(&self, ctx: SerenityContext, guilds: Vec<GuildId>) {
        for guild_id in &guilds {
            if let Err(e) = guild_id.set_commands(&ctx.http, commands::definitions()).await {
                error!(%guild_id, "failed to register guild commands: {e:?}");
            }
        }

        if let Err(e) = recover(&ctx).await {
            error!("startup reconciliation failed: {e:?}");
        }
    }

    async fn voice_state_update(
        &self,
        ctx: SerenityContext,
        old: Option<serenity::all::VoiceState>,
        new: serenity::all::VoiceState,
    ) {
        if let Err(e) = events::voice_state::handle(&ctx, old.as_ref(), &new).await {
            error!("voice state handling failed: {e:?}");
        }
    }

    async fn interaction_create(&self, ctx: SerenityContext, interaction: Interaction) {
        match interaction {
            Interaction::Command(cmd) => {
                if let Err(e) = commands::route(&ctx, &cmd).await {
                    error!(command = %cmd.data.name, "command failed: {e:?}");
                }
            }
            Interaction::Component(component) => {
                if let Err(e) = events::interaction::handle_component(&ctx, &component).await {
                    error!(custom_id = %component.data.custom_id, "component failed: {e:?}");
                }
            }
            Interaction::Modal(modal) => {
                if let Err(e) = events::interaction::handle_modal(&ctx, &modal).await {
                    error!(custom_id = %modal.data.custom_id, "modal failed: {e:?}");
                }
            }
            _ => {}
        }
    }
}

/// Startup recovery: converge every configured guild against the rooms
/// the process knew about before it went down.
async fn recover(ctx: &SerenityContext) -> Result<()> {
    let mut conn = database::establish_connection()?;
    for guild_id in database::models::GuildConfig::guild_ids(&mut conn)? {
        let Some(config) = database::models::GuildConfig::find(&mut conn, &guild_id)? else {
            continue;
        };
        let Some(guild_id) = guild_id.parse::<GuildId>().ok() else {
            continue;
        };
        if ctx.cache.guild(guild_id).is_none() {
            warn!(%guild_id, "configured guild not in cache, skipping recovery");
            continue;
        }
        if let Err(e) = reconcile::reconcile_guild(ctx, &mut conn, guild_id, &config).await {
            error!(%guild_id, "guild recovery failed: {e:?}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let token = env::read_discord_token()?;

    let mut conn = database::establish_connection()?;
    database::init_schema(&mut conn)?;
    drop(conn);

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES;

    let mut client = serenity::Client::builder(token, intents)
        .event_handler(Handler)
        .await?;
    client
        .data
        .write()
        .await
        .insert::<LifecycleKey>(Arc::new(Lifecycle::new()));

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down");
            shard_manager.shutdown_all().await;
        }
    });

    if let Err(why) = client.start_autosharded().await {
        error!("Client error: {why:?}");
    }
    Ok(())
}
