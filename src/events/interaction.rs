//! Control-panel component and modal routing. Every reply is ephemeral;
//! the panel message itself is shared.

use serenity::all::{
    ActionRowComponent, ComponentInteraction, ComponentInteractionDataKind,
    Context as SerenityContext, CreateInteractionResponse, CreateInteractionResponseMessage,
    GuildId, Member, ModalInteraction, UserId,
};
use tracing::warn;

use crate::controls::{self, Actor, Resolved};
use crate::database;
use crate::panel;

pub async fn handle_component(
    ctx: &SerenityContext,
    component: &ComponentInteraction,
) -> anyhow::Result<()> {
    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };
    let Some(member) = component.member.as_ref() else {
        return Ok(());
    };
    let custom_id = component.data.custom_id.as_str();

    // Rename and limit collect input through a modal; ownership is checked
    // up front so a non-owner never sees the form.
    if custom_id == panel::BTN_RENAME || custom_id == panel::BTN_LIMIT {
        let mut conn = database::establish_connection()?;
        match controls::resolve_member_room(ctx, &mut conn, guild_id, member.user.id)? {
            Resolved::Deny(msg) => return reply_component(ctx, component, msg).await,
            Resolved::Room(rc) => {
                if rc.room.owner_id != member.user.id.to_string() {
                    return reply_component(ctx, component, "Only the room owner can do that.")
                        .await;
                }
            }
        }
        let modal = if custom_id == panel::BTN_RENAME {
            panel::rename_modal()
        } else {
            panel::limit_modal()
        };
        component
            .create_response(&ctx.http, CreateInteractionResponse::Modal(modal))
            .await?;
        return Ok(());
    }

    let target = selected_user(component);
    let reply = run_action(ctx, guild_id, member, custom_id, target, None).await;
    reply_component(ctx, component, &reply).await
}

pub async fn handle_modal(ctx: &SerenityContext, modal: &ModalInteraction) -> anyhow::Result<()> {
    let Some(guild_id) = modal.guild_id else {
        return Ok(());
    };
    let Some(member) = modal.member.as_ref() else {
        return Ok(());
    };

    let reply = match modal.data.custom_id.as_str() {
        panel::MODAL_RENAME => {
            let Some(name) = input_value(modal, panel::INPUT_NAME) else {
                return Ok(());
            };
            run_action(ctx, guild_id, member, panel::BTN_RENAME, None, Some(name)).await
        }
        panel::MODAL_LIMIT => {
            let Some(raw) = input_value(modal, panel::INPUT_LIMIT) else {
                return Ok(());
            };
            match raw.trim().parse::<i64>() {
                Ok(value) => {
                    run_action(
                        ctx,
                        guild_id,
                        member,
                        panel::BTN_LIMIT,
                        None,
                        Some(value.to_string()),
                    )
                    .await
                }
                Err(_) => "Enter a number between 0 and 99.".to_string(),
            }
        }
        _ => return Ok(()),
    };

    modal
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(reply)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

/// Resolve the actor's room and dispatch one owner action, mapping any
/// platform failure to a generic reply so the interaction always gets an
/// answer.
pub async fn run_action(
    ctx: &SerenityContext,
    guild_id: GuildId,
    member: &Member,
    action_id: &str,
    target: Option<UserId>,
    text: Option<String>,
) -> String {
    let mut conn = match database::establish_connection() {
        Ok(conn) => conn,
        Err(e) => {
            warn!(%guild_id, "db unavailable for room action: {e:?}");
            return "Something went wrong. Try again.".to_string();
        }
    };

    let rc = match controls::resolve_member_room(ctx, &mut conn, guild_id, member.user.id) {
        Ok(Resolved::Room(rc)) => rc,
        Ok(Resolved::Deny(msg)) => return msg.to_string(),
        Err(e) => {
            warn!(%guild_id, "failed to resolve room: {e:?}");
            return "Something went wrong. Try again.".to_string();
        }
    };
    let actor = Actor::from_member(ctx, guild_id, member);

    let result = match action_id {
        panel::BTN_RENAME => {
            controls::rename(ctx, &rc, &actor, text.as_deref().unwrap_or_default()).await
        }
        panel::BTN_LIMIT => {
            let value = text.as_deref().and_then(|t| t.parse::<i64>().ok()).unwrap_or(-1);
            controls::set_limit(ctx, &rc, &actor, value).await
        }
        panel::BTN_LOCK => controls::set_locked(ctx, &rc, &actor, true).await,
        panel::BTN_UNLOCK => controls::set_locked(ctx, &rc, &actor, false).await,
        panel::BTN_PUBLIC => controls::set_public(ctx, &rc, &actor, true).await,
        panel::BTN_PRIVATE => controls::set_public(ctx, &rc, &actor, false).await,
        panel::BTN_CLAIM => controls::claim(ctx, &mut conn, &rc, &actor).await,
        panel::SELECT_TRANSFER => match target {
            Some(target) => controls::transfer(ctx, &mut conn, &rc, &actor, target).await,
            None => return "Select a user first.".to_string(),
        },
        panel::SELECT_KICK => match target {
            Some(target) => controls::kick(ctx, &rc, &actor, target).await,
            None => return "Select a user first.".to_string(),
        },
        panel::SELECT_BAN => match target {
            Some(target) => controls::ban(ctx, &rc, &actor, target).await,
            None => return "Select a user first.".to_string(),
        },
        panel::SELECT_UNBAN => match target {
            Some(target) => controls::unban(ctx, &rc, &actor, target).await,
            None => return "Select a user first.".to_string(),
        },
        _ => return "Unknown action.".to_string(),
    };

    match result {
        Ok(reply) => reply,
        Err(e) => {
            warn!(%guild_id, action_id, "room action failed: {e:?}");
            "Something went wrong. Try again.".to_string()
        }
    }
}

fn selected_user(component: &ComponentInteraction) -> Option<UserId> {
    match &component.data.kind {
        ComponentInteractionDataKind::UserSelect { values } => values.first().copied(),
        _ => None,
    }
}

fn input_value(modal: &ModalInteraction, input_id: &str) -> Option<String> {
    for row in &modal.data.components {
        for component in &row.components {
            if let ActionRowComponent::InputText(input) = component
                && input.custom_id == input_id
            {
                return input.value.clone();
            }
        }
    }
    None
}

async fn reply_component(
    ctx: &SerenityContext,
    component: &ComponentInteraction,
    content: &str,
) -> anyhow::Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
