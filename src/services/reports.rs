//! Read-only invite reports behind the text commands.

use crate::db::entities::invites::{self, JoinMethod};
use crate::services::admin::{AdminGate, ChatScope};
use crate::services::store::{InviteStore, RankEntry, StoreError};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// What a command produced. `Display` renders the reply text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    MyInvites { count: i64, position: Option<u64> },
    Leaderboard(Vec<RankEntry>),
    NoData,
    JoinInfo(invites::Model),
    TargetMissing,
    NotFound,
    AccessDenied,
    Unavailable,
}

/// How the caller pointed at someone in `who_added`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRef {
    /// Author of the message the command replied to.
    pub reply_to: Option<i64>,
    /// First argument of the command.
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetToken {
    Handle(String),
    Id(i64),
}

/// Accepts `@handle`, a numeric id, or a `<@id>` / `<@!id>` mention.
pub fn parse_target_token(token: &str) -> Option<TargetToken> {
    let token = token.trim();

    if let Some(mention) = token.strip_prefix("<@").and_then(|t| t.strip_suffix('>')) {
        return mention
            .trim_start_matches('!')
            .parse()
            .ok()
            .map(TargetToken::Id);
    }

    if let Some(handle) = token.strip_prefix('@') {
        return (!handle.is_empty()).then(|| TargetToken::Handle(handle.to_string()));
    }

    token.parse().ok().map(TargetToken::Id)
}

pub struct InviteReports {
    store: Arc<InviteStore>,
    gate: Arc<AdminGate>,
    default_limit: u64,
}

fn unavailable(err: StoreError) -> CommandOutcome {
    warn!(operation = err.operation(), "Invite report failed: {}", err);
    CommandOutcome::Unavailable
}

impl InviteReports {
    pub fn new(store: Arc<InviteStore>, gate: Arc<AdminGate>, default_limit: u64) -> Self {
        Self {
            store,
            gate,
            default_limit,
        }
    }

    pub async fn my_invites(&self, chat_id: i64, user_id: i64) -> CommandOutcome {
        let count = match self.store.get_user_count(chat_id, user_id).await {
            Ok(count) => count,
            Err(e) => return unavailable(e),
        };

        let position = if count > 0 {
            match self.store.get_user_rank_position(chat_id, user_id).await {
                Ok(position) => position,
                Err(e) => return unavailable(e),
            }
        } else {
            None
        };

        CommandOutcome::MyInvites { count, position }
    }

    pub async fn top_inviters(&self, chat_id: i64, limit: Option<u64>) -> CommandOutcome {
        let limit = limit.unwrap_or(self.default_limit);
        match self.store.get_ranking(chat_id, limit).await {
            Ok(entries) if entries.is_empty() => CommandOutcome::NoData,
            Ok(entries) => CommandOutcome::Leaderboard(entries),
            Err(e) => unavailable(e),
        }
    }

    /// Leaderboard restricted to administrators.
    pub async fn ranking(
        &self,
        scope: ChatScope,
        requester: i64,
        limit: Option<u64>,
    ) -> CommandOutcome {
        if !self.gate.is_authorized(scope, requester).await {
            return CommandOutcome::AccessDenied;
        }
        self.top_inviters(scope.chat_id(), limit).await
    }

    pub async fn who_added(&self, chat_id: i64, target: &TargetRef) -> CommandOutcome {
        let user_id = match self.resolve_target(chat_id, target).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => return CommandOutcome::TargetMissing,
            Err(e) => return unavailable(e),
        };

        match self.store.latest_join(chat_id, user_id).await {
            Ok(Some(record)) => CommandOutcome::JoinInfo(record),
            Ok(None) => CommandOutcome::NotFound,
            Err(e) => unavailable(e),
        }
    }

    async fn resolve_target(
        &self,
        chat_id: i64,
        target: &TargetRef,
    ) -> Result<Option<i64>, StoreError> {
        if let Some(user_id) = target.reply_to {
            return Ok(Some(user_id));
        }

        match target.token.as_deref().and_then(parse_target_token) {
            Some(TargetToken::Handle(handle)) => {
                self.store
                    .find_joined_by_name(chat_id, &format!("@{handle}"))
                    .await
            }
            Some(TargetToken::Id(user_id)) => Ok(Some(user_id)),
            None => Ok(None),
        }
    }
}

fn describe_join(record: &invites::Model, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let joined = &record.joined_display_name;
    let inviter = record
        .inviter_display_name
        .as_deref()
        .unwrap_or("an unknown user");

    match record.method {
        JoinMethod::Added => write!(f, "{} was added by {}", joined, inviter)?,
        JoinMethod::Approved => write!(f, "{} was approved by {}", joined, inviter)?,
        JoinMethod::InviteLink => {
            let link = record.invite_link.as_deref().unwrap_or("an invite link");
            let creator = record
                .link_creator_display_name
                .as_deref()
                .unwrap_or("an unknown user");
            write!(f, "{} joined via invite link {} created by {}", joined, link, creator)?;

            if record.inviter_user_id.is_some() && record.inviter_user_id != record.link_creator_id {
                write!(f, ", admitted by {}", inviter)?;
            }
        }
        JoinMethod::SelfJoin => write!(f, "{} joined on their own", joined)?,
    }

    if let Some(at) = chrono::DateTime::from_timestamp(record.joined_at, 0) {
        write!(f, " on {}", at.format("%Y-%m-%d %H:%M UTC"))?;
    }

    write!(f, ".")
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::MyInvites { count: 0, .. } => {
                write!(f, "You have not invited anyone yet.")
            }
            CommandOutcome::MyInvites { count, position } => {
                write!(f, "📈 You have invited **{}** member(s)", count)?;
                if let Some(position) = position {
                    write!(f, " and rank **#{}**", position)?;
                }
                write!(f, ".")
            }
            CommandOutcome::Leaderboard(entries) => {
                writeln!(f, "🏆 **Top Inviters**")?;
                for (idx, entry) in entries.iter().enumerate() {
                    write!(f, "\n{}. {}: {}", idx + 1, entry.display_name, entry.count)?;
                }
                Ok(())
            }
            CommandOutcome::NoData => write!(f, "No invite data available yet."),
            CommandOutcome::JoinInfo(record) => describe_join(record, f),
            CommandOutcome::TargetMissing => write!(
                f,
                "Could not find that user. Reply to one of their messages or pass an @handle or user id."
            ),
            CommandOutcome::NotFound => write!(f, "No join record found for that user."),
            CommandOutcome::AccessDenied => {
                write!(f, "⛔ Only group administrators can use this command.")
            }
            CommandOutcome::Unavailable => write!(
                f,
                "The invite database is temporarily unavailable, please try again later."
            ),
        }
    }
}
