//! Serenity-backed implementations of the outbound chat seams.

use crate::services::admin::MembershipInfo;
use crate::services::attribution::MemberStatus;
use crate::services::notifier::{MessageRef, ReplyChannel, TextFormat};
use anyhow::{bail, Context as _};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

fn snowflake(kind: &str, id: i64) -> anyhow::Result<u64> {
    match u64::try_from(id) {
        Ok(id) if id > 0 => Ok(id),
        _ => bail!("invalid {} id {}", kind, id),
    }
}

/// Sends replies into Discord channels. `chat_id` is a channel id.
pub struct SerenityReplies {
    http: Arc<serenity::Http>,
}

impl SerenityReplies {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ReplyChannel for SerenityReplies {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        format: TextFormat,
    ) -> anyhow::Result<MessageRef> {
        let channel_id = serenity::ChannelId::new(snowflake("channel", chat_id)?);

        let content = match format {
            TextFormat::Markdown => text.to_string(),
            TextFormat::Plain => serenity::MessageBuilder::new().push_safe(text).build(),
        };

        // Replies never ping anyone, even when they quote a handle.
        let message = serenity::CreateMessage::new()
            .content(content)
            .allowed_mentions(serenity::CreateAllowedMentions::new());

        let sent = channel_id
            .send_message(&*self.http, message)
            .await
            .with_context(|| format!("sending message to channel {}", channel_id))?;

        Ok(MessageRef {
            chat_id,
            message_id: sent.id.get() as i64,
        })
    }

    async fn delete_message(&self, message: MessageRef) -> anyhow::Result<()> {
        let channel_id = serenity::ChannelId::new(snowflake("channel", message.chat_id)?);
        let message_id = serenity::MessageId::new(snowflake("message", message.message_id)?);

        channel_id.delete_message(&*self.http, message_id).await?;
        Ok(())
    }
}

/// Resolves guild standing from the guild owner and role permissions. `chat_id` is a
/// guild id.
pub struct SerenityMembership {
    http: Arc<serenity::Http>,
}

impl SerenityMembership {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MembershipInfo for SerenityMembership {
    async fn member_status(&self, chat_id: i64, user_id: i64) -> anyhow::Result<MemberStatus> {
        let guild_id = serenity::GuildId::new(snowflake("guild", chat_id)?);
        let user_id = serenity::UserId::new(snowflake("user", user_id)?);

        let guild = guild_id.to_partial_guild(&*self.http).await?;
        if guild.owner_id == user_id {
            return Ok(MemberStatus::Creator);
        }

        let member = guild_id.member(&*self.http, user_id).await?;

        let everyone = serenity::RoleId::new(guild_id.get());
        let is_admin = member
            .roles
            .iter()
            .chain(std::iter::once(&everyone))
            .filter_map(|role_id| guild.roles.get(role_id))
            .any(|role| role.permissions.administrator());

        Ok(if is_admin {
            MemberStatus::Administrator
        } else {
            MemberStatus::Member
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snowflake_rejects_non_positive_ids() {
        assert_eq!(snowflake("channel", 42).unwrap(), 42);
        assert!(snowflake("channel", 0).is_err());
        assert!(snowflake("channel", -7).is_err());
    }
}
