use serenity::all::{ChannelId, Colour, CreateEmbed, CreateEmbedFooter, CreateMessage, Http, Timestamp};
use tracing::warn;

use crate::database::models::GuildConfig;

/// Lifecycle events mirrored to the guild's configured log channel.
#[derive(Debug)]
pub enum AuditEvent {
    RoomCreated { user: String, user_id: String, channel_id: String },
    SideChannelCreated { user: String, user_id: String, channel_id: String },
    RoomDeleted { channel_id: String },
    OwnerTransferred { from: String, from_id: String, to: String, to_id: String, channel_id: String },
    Claimed { user: String, user_id: String, channel_id: String },
    Locked { user: String, channel_id: String },
    Unlocked { user: String, channel_id: String },
    PrivacyChanged { user: String, channel_id: String, public: bool },
    Kicked { by: String, target: String, channel_id: String },
    Banned { by: String, target: String, channel_id: String },
    Unbanned { by: String, target: String, channel_id: String },
    ConfigUpdated { user: String, detail: String },
}

impl AuditEvent {
    fn title(&self) -> &'static str {
        match self {
            Self::RoomCreated { .. } => "Voice Room Created",
            Self::SideChannelCreated { .. } => "Side Channel Created",
            Self::RoomDeleted { .. } => "Voice Room Deleted",
            Self::OwnerTransferred { .. } => "Owner Transferred",
            Self::Claimed { .. } => "Room Claimed",
            Self::Locked { .. } => "Room Locked",
            Self::Unlocked { .. } => "Room Unlocked",
            Self::PrivacyChanged { .. } => "Privacy Changed",
            Self::Kicked { .. } => "User Kicked from Room",
            Self::Banned { .. } => "User Banned from Room",
            Self::Unbanned { .. } => "User Unbanned from Room",
            Self::ConfigUpdated { .. } => "Config Updated",
        }
    }

    fn description(&self) -> String {
        match self {
            Self::RoomCreated { user, user_id, channel_id }
            | Self::SideChannelCreated { user, user_id, channel_id } => {
                format!("**User:** {user} ({user_id})\n**Channel:** <#{channel_id}>")
            }
            Self::RoomDeleted { channel_id } => format!("**Channel ID:** {channel_id}"),
            Self::OwnerTransferred { from, from_id, to, to_id, channel_id } => format!(
                "**From:** {from} ({from_id})\n**To:** {to} ({to_id})\n**Channel:** <#{channel_id}>"
            ),
            Self::Claimed { user, user_id, channel_id } => {
                format!("**New Owner:** {user} ({user_id})\n**Channel:** <#{channel_id}>")
            }
            Self::Locked { user, channel_id } | Self::Unlocked { user, channel_id } => {
                format!("**User:** {user}\n**Channel:** <#{channel_id}>")
            }
            Self::PrivacyChanged { user, channel_id, public } => format!(
                "**User:** {user}\n**Channel:** <#{channel_id}>\n**Change:** {}",
                if *public { "Public" } else { "Private" }
            ),
            Self::Kicked { by, target, channel_id }
            | Self::Banned { by, target, channel_id }
            | Self::Unbanned { by, target, channel_id } => {
                format!("**By:** {by}\n**Target:** {target}\n**Channel:** <#{channel_id}>")
            }
            Self::ConfigUpdated { user, detail } => {
                format!("**User:** {user}\n**Details:** {detail}")
            }
        }
    }
}

/// Parse the guild's brand color, falling back to blurple.
pub fn brand_colour(config: &GuildConfig) -> Colour {
    let hex = config.brand_color.trim_start_matches('#');
    Colour::new(u32::from_str_radix(hex, 16).unwrap_or(0x5865F2))
}

/// Post an audit embed. Best-effort: failures are logged, never surfaced,
/// so audit problems cannot break a lifecycle operation.
pub async fn log(http: &Http, config: &GuildConfig, event: AuditEvent) {
    let Some(channel_id) = config
        .log_channel_id
        .as_deref()
        .and_then(|id| id.parse::<ChannelId>().ok())
    else {
        return;
    };

    let embed = CreateEmbed::new()
        .title(event.title())
        .description(event.description())
        .colour(brand_colour(config))
        .footer(CreateEmbedFooter::new(format!("Guild: {}", config.guild_id)))
        .timestamp(Timestamp::now());

    if let Err(e) = channel_id
        .send_message(http, CreateMessage::new().embed(embed))
        .await
    {
        warn!(
            guild_id = %config.guild_id,
            "failed to post audit log: {e:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewGuildConfig;
    use crate::database::test_connection;

    #[test]
    fn brand_colour_parses_hex_and_falls_back() {
        let mut conn = test_connection();
        let mut row = NewGuildConfig::with_defaults("g1", None);
        row.brand_color = "#FF0000".into();
        GuildConfig::upsert_full(&mut conn, &row).unwrap();
        let mut cfg = GuildConfig::find(&mut conn, "g1").unwrap().unwrap();
        assert_eq!(brand_colour(&cfg).0, 0xFF0000);

        cfg.brand_color = "not-a-color".into();
        assert_eq!(brand_colour(&cfg).0, 0x5865F2);
    }
}
