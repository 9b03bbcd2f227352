use diesel::sqlite::SqliteConnection;
use serenity::all::{
    ButtonStyle, ChannelId, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter,
    CreateInputText, CreateMessage, CreateModal, CreateSelectMenu, CreateSelectMenuKind,
    GetMessages, Http, InputTextStyle, MessageId, Timestamp, UserId,
};

use crate::audit::brand_colour;
use crate::database::models::GuildConfig;
use crate::error::{RoomError, is_not_found};

// Custom ids routed by the interaction handler.
pub const BTN_RENAME: &str = "vc:rename";
pub const BTN_LIMIT: &str = "vc:limit";
pub const BTN_LOCK: &str = "vc:lock";
pub const BTN_UNLOCK: &str = "vc:unlock";
pub const BTN_PUBLIC: &str = "vc:public";
pub const BTN_PRIVATE: &str = "vc:private";
pub const BTN_CLAIM: &str = "vc:claim";
pub const SELECT_TRANSFER: &str = "vc:transfer";
pub const SELECT_KICK: &str = "vc:kick";
pub const SELECT_BAN: &str = "vc:ban";
pub const SELECT_UNBAN: &str = "vc:unban";
pub const MODAL_RENAME: &str = "vc:rename:modal";
pub const MODAL_LIMIT: &str = "vc:limit:modal";
pub const INPUT_NAME: &str = "name";
pub const INPUT_LIMIT: &str = "limit";

pub const PANEL_TITLE: &str = "🎛 Voice Room Controls";

pub fn panel_embed(config: &GuildConfig) -> CreateEmbed {
    CreateEmbed::new()
        .title(PANEL_TITLE)
        .description(
            "**Use the buttons below to manage your voice room.**\n\n\
             ✏️ **Rename** — Change channel name\n\
             👥 **Limit** — Set max users (0 = unlimited)\n\
             🔒 **Lock / Unlock** — Control who can join\n\
             🌐 **Public / Private** — Channel visibility\n\
             👑 **Transfer / Claim** — Ownership changes\n\
             👢 **Kick / Ban / Unban** — Manage members",
        )
        .colour(brand_colour(config))
        .footer(CreateEmbedFooter::new("roomkeeper"))
        .timestamp(Timestamp::now())
}

// Discord limits: 1 select menu per action row, max 5 rows per message.
pub fn panel_components() -> Vec<CreateActionRow> {
    let buttons_1 = vec![
        CreateButton::new(BTN_RENAME).label("Rename").style(ButtonStyle::Primary),
        CreateButton::new(BTN_LIMIT).label("Limit").style(ButtonStyle::Primary),
        CreateButton::new(BTN_LOCK).label("Lock").style(ButtonStyle::Secondary),
        CreateButton::new(BTN_UNLOCK).label("Unlock").style(ButtonStyle::Success),
    ];
    let buttons_2 = vec![
        CreateButton::new(BTN_PUBLIC).label("Public").style(ButtonStyle::Success),
        CreateButton::new(BTN_PRIVATE).label("Private").style(ButtonStyle::Secondary),
        CreateButton::new(BTN_CLAIM).label("Claim").style(ButtonStyle::Danger),
    ];
    let user_select = |id: &str, placeholder: &str| {
        CreateActionRow::SelectMenu(
            CreateSelectMenu::new(id, CreateSelectMenuKind::User { default_users: None })
                .placeholder(placeholder)
                .min_values(1)
                .max_values(1),
        )
    };
    vec![
        CreateActionRow::Buttons(buttons_1),
        CreateActionRow::Buttons(buttons_2),
        user_select(SELECT_TRANSFER, "↗️ Transfer ownership to…"),
        user_select(SELECT_KICK, "👢 Kick user…"),
        user_select(SELECT_BAN, "🚫 Ban user… (unban via /vc unban)"),
    ]
}

pub fn rename_modal() -> CreateModal {
    let input = CreateInputText::new(InputTextStyle::Short, "Channel Name", INPUT_NAME)
        .placeholder("Enter new name (1-100 chars)")
        .min_length(1)
        .max_length(100)
        .required(true);
    CreateModal::new(MODAL_RENAME, "✏️ Rename Channel")
        .components(vec![CreateActionRow::InputText(input)])
}

pub fn limit_modal() -> CreateModal {
    let input = CreateInputText::new(InputTextStyle::Short, "User Limit", INPUT_LIMIT)
        .placeholder("0-99 (0 = unlimited)")
        .min_length(1)
        .max_length(2)
        .required(true);
    CreateModal::new(MODAL_LIMIT, "👥 Set User Limit")
        .components(vec![CreateActionRow::InputText(input)])
}

/// Post a fresh control panel into a channel.
pub async fn post_panel(
    http: &Http,
    channel_id: ChannelId,
    config: &GuildConfig,
) -> Result<MessageId, RoomError> {
    let message = channel_id
        .send_message(
            http,
            CreateMessage::new()
                .embed(panel_embed(config))
                .components(panel_components()),
        )
        .await?;
    Ok(message.id)
}

/// Repair the shared panel message: repost when the stored message id no
/// longer resolves and persist the new id. Returns true when reposted.
pub async fn repair_shared_panel(
    http: &Http,
    conn: &mut SqliteConnection,
    channel_id: ChannelId,
    config: &GuildConfig,
) -> Result<bool, RoomError> {
    if let Some(message_id) = config
        .panel_message_id
        .as_deref()
        .and_then(|id| id.parse::<MessageId>().ok())
    {
        match channel_id.message(http, message_id).await {
            Ok(_) => return Ok(false),
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let message_id = post_panel(http, channel_id, config).await?;
    GuildConfig::set_panel_message(conn, &config.guild_id, Some(&message_id.to_string()))?;
    Ok(true)
}

/// Make sure a room's side channel carries a panel, reposting if the
/// message was deleted. Returns true when reposted.
pub async fn ensure_room_panel(
    http: &Http,
    channel_id: ChannelId,
    config: &GuildConfig,
    bot_user_id: UserId,
) -> Result<bool, RoomError> {
    let recent = match channel_id
        .messages(http, GetMessages::new().limit(30))
        .await
    {
        Ok(messages) => messages,
        Err(e) if is_not_found(&e) => return Err(RoomError::Gone),
        Err(e) => return Err(e.into()),
    };

    let has_panel = recent.iter().any(|m| {
        m.author.id == bot_user_id && m.embeds.iter().any(|e| e.title.as_deref() == Some(PANEL_TITLE))
    });
    if has_panel {
        return Ok(false);
    }

    post_panel(http, channel_id, config).await?;
    Ok(true)
}
