//! /vc: the room controls as slash subcommands, for users who prefer
//! commands over the panel (and the only way to unban by name). Each
//! subcommand maps onto the same shared actions as the panel components.

use anyhow::Result;
use serenity::all::{
    CommandDataOption, CommandDataOptionValue, CommandInteraction, CommandOptionType,
    Context as SerenityContext, CreateCommand, CreateCommandOption, UserId,
};

use crate::events::interaction::run_action;
use crate::panel;

pub fn definition() -> CreateCommand {
    let sub = |name: &str, desc: &str| {
        CreateCommandOption::new(CommandOptionType::SubCommand, name, desc)
    };
    let with_user = |name: &str, desc: &str| {
        sub(name, desc).add_sub_option(
            CreateCommandOption::new(CommandOptionType::User, "user", "Target user")
                .required(true),
        )
    };

    CreateCommand::new("vc")
        .description("Manage the voice room you are in")
        .dm_permission(false)
        .add_option(sub("rename", "Rename your room").add_sub_option(
            CreateCommandOption::new(CommandOptionType::String, "name", "New name (1-100 chars)")
                .required(true),
        ))
        .add_option(sub("limit", "Set the user limit").add_sub_option(
            CreateCommandOption::new(CommandOptionType::Integer, "value", "0-99, 0 = unlimited")
                .min_int_value(0)
                .max_int_value(99)
                .required(true),
        ))
        .add_option(sub("lock", "Stop new users from joining"))
        .add_option(sub("unlock", "Allow users to join again"))
        .add_option(sub("public", "Make the room public"))
        .add_option(sub("private", "Make the room private"))
        .add_option(sub("claim", "Take over an abandoned room"))
        .add_option(with_user("transfer", "Hand ownership to someone in the room"))
        .add_option(with_user("kick", "Remove a user from your room"))
        .add_option(with_user("ban", "Ban a user from your room"))
        .add_option(with_user("unban", "Lift a ban from your room"))
}

pub async fn handle(ctx: &SerenityContext, cmd: &CommandInteraction) -> Result<()> {
    let Some(guild_id) = cmd.guild_id else {
        return super::reply(ctx, cmd, "This command only works in a server.").await;
    };
    let Some(member) = cmd.member.as_deref() else {
        return super::reply(ctx, cmd, "This command only works in a server.").await;
    };
    let Some(sub) = cmd.data.options.first() else {
        return Ok(());
    };
    let options = match &sub.value {
        CommandDataOptionValue::SubCommand(options) => options.as_slice(),
        _ => &[],
    };

    let (action_id, target, text) = match sub.name.as_str() {
        "rename" => (panel::BTN_RENAME, None, string_option(options, "name")),
        "limit" => (
            panel::BTN_LIMIT,
            None,
            int_option(options, "value").map(|v| v.to_string()),
        ),
        "lock" => (panel::BTN_LOCK, None, None),
        "unlock" => (panel::BTN_UNLOCK, None, None),
        "public" => (panel::BTN_PUBLIC, None, None),
        "private" => (panel::BTN_PRIVATE, None, None),
        "claim" => (panel::BTN_CLAIM, None, None),
        "transfer" => (panel::SELECT_TRANSFER, user_option(options), None),
        "kick" => (panel::SELECT_KICK, user_option(options), None),
        "ban" => (panel::SELECT_BAN, user_option(options), None),
        "unban" => (panel::SELECT_UNBAN, user_option(options), None),
        _ => return Ok(()),
    };

    let reply = run_action(ctx, guild_id, member, action_id, target, text).await;
    super::reply(ctx, cmd, &reply).await
}

fn string_option(options: &[CommandDataOption], name: &str) -> Option<String> {
    options.iter().find_map(|o| match &o.value {
        CommandDataOptionValue::String(s) if o.name == name => Some(s.clone()),
        _ => None,
    })
}

fn int_option(options: &[CommandDataOption], name: &str) -> Option<i64> {
    options.iter().find_map(|o| match o.value {
        CommandDataOptionValue::Integer(v) if o.name == name => Some(v),
        _ => None,
    })
}

fn user_option(options: &[CommandDataOption]) -> Option<UserId> {
    options.iter().find_map(|o| match o.value {
        CommandDataOptionValue::User(id) if o.name == "user" => Some(id),
        _ => None,
    })
}
