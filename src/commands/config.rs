//! /config view and /config set. Every tunable is optional on set; only
//! the supplied ones change.

use anyhow::Result;
use serenity::all::{
    CommandDataOption, CommandDataOptionValue, CommandInteraction, Context as SerenityContext,
    CreateCommand, CreateCommandOption, CommandOptionType, CreateEmbed, CreateEmbedFooter,
    CreateInteractionResponse, CreateInteractionResponseMessage, Permissions, Timestamp,
};

use crate::audit::{self, AuditEvent, brand_colour};
use crate::database::models::GuildConfig;
use crate::template::USERNAME_PLACEHOLDER;

const MAX_SECONDS: i64 = 86_400;

pub fn definition() -> CreateCommand {
    let set = CreateCommandOption::new(CommandOptionType::SubCommand, "set", "Change settings")
        .add_sub_option(CreateCommandOption::new(
            CommandOptionType::String,
            "name_template",
            "Room name template, {username} is replaced",
        ))
        .add_sub_option(CreateCommandOption::new(
            CommandOptionType::String,
            "brand_color",
            "Embed color as #RRGGBB",
        ))
        .add_sub_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "cooldown_seconds",
                "Seconds between room creations per user (0-86400)",
            )
            .min_int_value(0)
            .max_int_value(MAX_SECONDS as u64),
        )
        .add_sub_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "delete_delay_seconds",
                "Seconds an empty room lingers before deletion (0-86400)",
            )
            .min_int_value(0)
            .max_int_value(MAX_SECONDS as u64),
        )
        .add_sub_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "claim_timeout_seconds",
                "Seconds the owner must be gone before a claim (0-86400)",
            )
            .min_int_value(0)
            .max_int_value(MAX_SECONDS as u64),
        )
        .add_sub_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "max_rooms_per_user",
                "Active rooms one user may own (1-10)",
            )
            .min_int_value(1)
            .max_int_value(10),
        );

    CreateCommand::new("config")
        .description("View or change voice room settings")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .dm_permission(false)
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "view",
            "Show current settings",
        ))
        .add_option(set)
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let Some(guild_id) = cmd.guild_id else {
        return super::reply(ctx, cmd, "This command only works in a server.").await;
    };
    let mut conn = crate::database::establish_connection()?;
    let Some(config) = GuildConfig::find(&mut conn, &guild_id.to_string())? else {
        return super::reply(ctx, cmd, "No config found. Run /setup first.").await;
    };

    let Some(sub) = cmd.data.options.first() else {
        return Ok(());
    };
    match (sub.name.as_str(), &sub.value) {
        ("view", _) => view(ctx, cmd, &config).await,
        ("set", CommandDataOptionValue::SubCommand(options)) => {
            set(ctx, cmd, &mut conn, &config, options).await
        }
        _ => Ok(()),
    }
}

async fn view(ctx: &SerenityContext, cmd: &CommandInteraction, config: &GuildConfig) -> Result<()> {
    let embed = CreateEmbed::new()
        .title("Voice Room Settings")
        .colour(brand_colour(config))
        .field("Enabled", if config.enabled { "Yes" } else { "No" }, true)
        .field("Name template", format!("`{}`", config.name_template), true)
        .field("Brand color", &config.brand_color, true)
        .field("Cooldown", format!("{}s", config.cooldown_seconds), true)
        .field("Delete delay", format!("{}s", config.delete_delay_seconds), true)
        .field("Claim timeout", format!("{}s", config.claim_timeout_seconds), true)
        .field("Max rooms/user", config.max_rooms_per_user.to_string(), true)
        .field(
            "Log channel",
            config
                .log_channel_id
                .as_deref()
                .map(|id| format!("<#{id}>"))
                .unwrap_or_else(|| "not set".to_string()),
            true,
        )
        .footer(CreateEmbedFooter::new(format!("Guild: {}", config.guild_id)))
        .timestamp(Timestamp::now());

    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new().embed(embed).ephemeral(true),
        ),
    )
    .await?;
    Ok(())
}

async fn set(
    ctx: &SerenityContext,
    cmd: &CommandInteraction,
    conn: &mut diesel::sqlite::SqliteConnection,
    config: &GuildConfig,
    options: &[CommandDataOption],
) -> Result<()> {
    let guild_id = config.guild_id.as_str();
    let mut changes: Vec<String> = Vec::new();

    for option in options {
        match (option.name.as_str(), &option.value) {
            ("name_template", CommandDataOptionValue::String(template)) => {
                let template = template.trim();
                if template.is_empty() || template.chars().count() > 90 {
                    return super::reply(ctx, cmd, "Template must be 1-90 characters.").await;
                }
                if !template.contains(USERNAME_PLACEHOLDER) {
                    return super::reply(
                        ctx,
                        cmd,
                        "Template must contain {username} so rooms stay distinguishable.",
                    )
                    .await;
                }
                GuildConfig::set_name_template(conn, guild_id, template)?;
                changes.push(format!("name template → `{template}`"));
            }
            ("brand_color", CommandDataOptionValue::String(color)) => {
                let color = color.trim();
                let hex = color.strip_prefix('#').unwrap_or(color);
                if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    return super::reply(ctx, cmd, "Color must look like #5865F2.").await;
                }
                let normalized = format!("#{}", hex.to_ascii_uppercase());
                GuildConfig::set_brand_color(conn, guild_id, &normalized)?;
                changes.push(format!("brand color → {normalized}"));
            }
            ("cooldown_seconds", CommandDataOptionValue::Integer(v)) => {
                let v = clamp_seconds(*v);
                GuildConfig::set_cooldown_seconds(conn, guild_id, v)?;
                changes.push(format!("cooldown → {v}s"));
            }
            ("delete_delay_seconds", CommandDataOptionValue::Integer(v)) => {
                let v = clamp_seconds(*v);
                GuildConfig::set_delete_delay_seconds(conn, guild_id, v)?;
                changes.push(format!("delete delay → {v}s"));
            }
            ("claim_timeout_seconds", CommandDataOptionValue::Integer(v)) => {
                let v = clamp_seconds(*v);
                GuildConfig::set_claim_timeout_seconds(conn, guild_id, v)?;
                changes.push(format!("claim timeout → {v}s"));
            }
            ("max_rooms_per_user", CommandDataOptionValue::Integer(v)) => {
                let v = (*v).clamp(1, 10) as i32;
                GuildConfig::set_max_rooms_per_user(conn, guild_id, v)?;
                changes.push(format!("max rooms per user → {v}"));
            }
            _ => {}
        }
    }

    if changes.is_empty() {
        return super::reply(ctx, cmd, "Nothing to change; pass at least one option.").await;
    }

    let detail = changes.join(", ");
    audit::log(
        &ctx.http,
        config,
        AuditEvent::ConfigUpdated { user: cmd.user.name.clone(), detail: detail.clone() },
    )
    .await;
    super::reply(ctx, cmd, &format!("✅ Updated: {detail}.")).await
}

fn clamp_seconds(v: i64) -> i32 {
    v.clamp(0, MAX_SECONDS) as i32
}
