use crate::modules::invite_tracking::tracking::{self, JoinLookup};
use crate::services::attribution::{ChangeShape, MemberStatus, MembershipChange};
use crate::{Data, Error};
use chrono::Utc;
use poise::serenity_prelude as serenity;

pub fn handler<'a>(
    ctx: &'a serenity::Context,
    event: &'a serenity::FullEvent,
    data: &'a Data,
) -> poise::BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move { handle_event(ctx, event, data).await })
}

async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::GuildCreate { guild, .. } => {
            tracking::sync_all_guild_invites(ctx, guild.id, &data.db()).await?;
        }
        serenity::FullEvent::InviteCreate { data: invite_data, .. } => {
            handle_invite_create(invite_data, data).await?;
        }
        serenity::FullEvent::InviteDelete { data: invite_data, .. } => {
            handle_invite_delete(invite_data, data).await?;
        }
        serenity::FullEvent::GuildMemberAddition { new_member, .. } => {
            handle_member_join(ctx, new_member, data).await?;
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            handle_member_leave(*guild_id, user, data).await?;
        }
        _ => {}
    }

    Ok(())
}

async fn handle_invite_create(
    invite_event: &serenity::InviteCreateEvent,
    data: &Data,
) -> Result<(), Error> {
    let guild_id = match invite_event.guild_id {
        Some(id) => id,
        None => {
            tracing::warn!("Invite created without guild_id");
            return Ok(());
        }
    };

    tracing::info!("Invite created: {} in guild {}", invite_event.code, guild_id);

    // Only the new invite is stored so a join racing this event still shows up in the diff.
    let created = tracking::InviteUsage {
        code: invite_event.code.clone(),
        uses: 0,
        inviter: invite_event.inviter.as_ref().map(tracking::chat_user),
    };
    tracking::sync_invites_to_snapshots(guild_id, &[created], &data.db()).await
}

async fn handle_invite_delete(
    invite_event: &serenity::InviteDeleteEvent,
    data: &Data,
) -> Result<(), Error> {
    let guild_id = match invite_event.guild_id {
        Some(id) => id,
        None => {
            tracing::warn!("Invite deleted without guild_id");
            return Ok(());
        }
    };

    tracing::info!("Invite deleted: {} in guild {}", invite_event.code, guild_id);

    tracking::delete_invite_snapshot(guild_id, &invite_event.code, &data.db()).await
}

async fn handle_member_join(
    ctx: &serenity::Context,
    member: &serenity::Member,
    data: &Data,
) -> Result<(), Error> {
    let guild_id = member.guild_id;

    // Skip the invite lookup for members the tracker would discard anyway.
    if data.tracker.policy().skip_bots && member.user.bot {
        return Ok(());
    }

    tracing::info!("Member joined: {} in guild {}", member.user.id, guild_id);

    let current_invites = match tracking::fetch_guild_invites(ctx, guild_id).await {
        Ok(invites) => Some(invites),
        Err(e) => {
            tracing::warn!("Failed to fetch invites for guild {}: {:?}", guild_id, e);
            None
        }
    };

    let snapshots = tracking::get_snapshots(guild_id, &data.db()).await?;

    let lookup = tracking::lookup_join(current_invites.as_deref(), &snapshots);

    if let Some(invites) = &current_invites {
        tracking::sync_invites_to_snapshots(guild_id, invites, &data.db()).await?;
    }

    let invite_link = match lookup {
        JoinLookup::Invite(link) => Some(link),
        JoinLookup::NoInvite => tracking::vanity_link(ctx, guild_id).await,
        JoinLookup::Skip => {
            tracing::warn!(
                "Could not tell which invite {} used in guild {}, join not recorded",
                member.user.id,
                guild_id
            );
            return Ok(());
        }
    };

    let change = MembershipChange {
        chat_id: guild_id.get() as i64,
        shape: ChangeShape::StatusUpdate {
            old: MemberStatus::Left,
            new: MemberStatus::Member,
        },
        member: tracking::chat_user(&member.user),
        actor: None,
        invite_link,
    };

    ingest(&change, data).await;
    Ok(())
}

async fn handle_member_leave(
    guild_id: serenity::GuildId,
    user: &serenity::User,
    data: &Data,
) -> Result<(), Error> {
    tracing::info!("Member left: {} from guild {}", user.id, guild_id);

    let change = MembershipChange {
        chat_id: guild_id.get() as i64,
        shape: ChangeShape::StatusUpdate {
            old: MemberStatus::Member,
            new: MemberStatus::Left,
        },
        member: tracking::chat_user(user),
        actor: None,
        invite_link: None,
    };

    ingest(&change, data).await;
    Ok(())
}

/// Store failures are logged here; the gateway keeps delivering events regardless.
async fn ingest(change: &MembershipChange, data: &Data) {
    match data.tracker.handle(change, Utc::now().timestamp()).await {
        Ok(outcome) => {
            tracing::debug!(chat_id = change.chat_id, ?outcome, "Membership change processed");
        }
        Err(e) => {
            tracing::error!(
                chat_id = change.chat_id,
                user_id = change.member.id,
                "Failed to process membership change: {}",
                e
            );
        }
    }
}
