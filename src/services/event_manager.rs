use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info};

/// Framework-level handler for non-command Discord events. Each module handler runs on
/// its own task so a slow invite lookup never holds up the gateway.
pub fn handler<'a>(
    ctx: &'a serenity::Context,
    event: &'a serenity::FullEvent,
    _framework: poise::FrameworkContext<'a, Data, Error>,
    data: &'a Data,
) -> poise::BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        dispatch(ctx, event, data);
        Ok(())
    })
}

fn dispatch(ctx: &serenity::Context, event: &serenity::FullEvent, data: &Data) {
    match event {
        serenity::FullEvent::Ready { data_about_bot, .. } => {
            info!("Logged in as {}", data_about_bot.user.name);
        }
        serenity::FullEvent::GuildCreate { guild, is_new, .. } => {
            if is_new.unwrap_or(false) {
                info!("Joined new guild: {} ({})", guild.name, guild.id);
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            info!("Left guild: {}", incomplete.id);
        }
        _ => {}
    }

    let event_arc = Arc::new(event.clone());

    for &(module_id, handler) in data.event_handlers.iter() {
        let ctx = ctx.clone();
        let event_arc = event_arc.clone();
        let data = data.clone();

        tokio::spawn(async move {
            if let Err(e) = handler(&ctx, &event_arc, &data).await {
                error!("Error in event handler for module {}: {:?}", module_id, e);
            }
        });
    }
}
