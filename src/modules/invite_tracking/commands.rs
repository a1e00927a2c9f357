use crate::services::admin::ChatScope;
use crate::services::notifier::MessageRef;
use crate::services::reports::{CommandOutcome, TargetRef};
use crate::{Context, Data, Error};
use std::time::Duration;

const MAX_LEADERBOARD_LIMIT: u64 = 50;

pub fn commands() -> Vec<poise::Command<Data, Error>> {
    vec![invites(), top(), ranking(), whoadded()]
}

fn trigger_message(ctx: Context<'_>) -> Option<MessageRef> {
    match ctx {
        poise::Context::Prefix(prefix) => Some(MessageRef {
            chat_id: prefix.msg.channel_id.get() as i64,
            message_id: prefix.msg.id.get() as i64,
        }),
        poise::Context::Application(_) => None,
    }
}

async fn respond(
    ctx: Context<'_>,
    outcome: CommandOutcome,
    expire_after: Option<Duration>,
) -> Result<(), Error> {
    ctx.data()
        .notifier
        .reply(
            ctx.channel_id().get() as i64,
            trigger_message(ctx),
            &outcome.to_string(),
            expire_after,
        )
        .await;

    Ok(())
}

fn clamp_limit(limit: Option<u64>) -> Option<u64> {
    limit.map(|l| l.clamp(1, MAX_LEADERBOARD_LIMIT))
}

/// Show how many members you have invited
#[poise::command(prefix_command, guild_only, aliases("myinvites"))]
pub async fn invites(ctx: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    let outcome = ctx
        .data()
        .reports
        .my_invites(guild_id.get() as i64, ctx.author().id.get() as i64)
        .await;

    respond(ctx, outcome, ctx.data().settings.expiry.my_invites()).await
}

/// Show the top inviters of this server
#[poise::command(prefix_command, guild_only, aliases("topinviters", "leaderboard"))]
pub async fn top(
    ctx: Context<'_>,
    #[description = "Number of users to show"] limit: Option<u64>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    let outcome = ctx
        .data()
        .reports
        .top_inviters(guild_id.get() as i64, clamp_limit(limit))
        .await;

    respond(ctx, outcome, ctx.data().settings.expiry.leaderboard()).await
}

/// Show the invite ranking (administrators only)
#[poise::command(prefix_command)]
pub async fn ranking(
    ctx: Context<'_>,
    #[description = "Number of users to show"] limit: Option<u64>,
) -> Result<(), Error> {
    let scope = match ctx.guild_id() {
        Some(guild_id) => ChatScope::Group(guild_id.get() as i64),
        None => ChatScope::Direct(ctx.channel_id().get() as i64),
    };

    let outcome = ctx
        .data()
        .reports
        .ranking(scope, ctx.author().id.get() as i64, clamp_limit(limit))
        .await;

    let expiry = &ctx.data().settings.expiry;
    let expire_after = match outcome {
        CommandOutcome::AccessDenied => expiry.denied(),
        _ => expiry.leaderboard(),
    };

    respond(ctx, outcome, expire_after).await
}

/// Show who brought a member into this server
#[poise::command(prefix_command, guild_only, aliases("who"))]
pub async fn whoadded(
    ctx: Context<'_>,
    #[description = "@handle, mention or user id"] target: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    let reply_to = match ctx {
        poise::Context::Prefix(prefix) => prefix
            .msg
            .referenced_message
            .as_ref()
            .map(|message| message.author.id.get() as i64),
        poise::Context::Application(_) => None,
    };

    let target = TargetRef {
        reply_to,
        token: target,
    };

    let outcome = ctx
        .data()
        .reports
        .who_added(guild_id.get() as i64, &target)
        .await;

    respond(ctx, outcome, ctx.data().settings.expiry.who_added()).await
}
