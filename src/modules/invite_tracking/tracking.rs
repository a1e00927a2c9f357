//! Invite snapshots: which invite's use count went up when someone joined.

use crate::db::entities::invite_snapshots;
use crate::services::attribution::{ChatUser, InviteLink};
use crate::Error;
use chrono::Utc;
use poise::serenity_prelude as serenity;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::collections::HashMap;

/// The parts of a guild invite needed to attribute a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteUsage {
    pub code: String,
    pub uses: i64,
    pub inviter: Option<ChatUser>,
}

impl InviteUsage {
    pub fn from_rich(invite: &serenity::RichInvite) -> Self {
        Self {
            code: invite.code.clone(),
            uses: invite.uses as i64,
            inviter: invite.inviter.as_ref().map(chat_user),
        }
    }

    pub fn to_link(&self) -> InviteLink {
        InviteLink {
            link: invite_url(&self.code),
            creator: self.inviter.clone(),
        }
    }
}

pub fn chat_user(user: &serenity::User) -> ChatUser {
    ChatUser {
        id: user.id.get() as i64,
        handle: Some(user.name.clone()),
        full_name: user.global_name.clone(),
        is_bot: user.bot,
        is_system: user.system,
    }
}

pub fn invite_url(code: &str) -> String {
    format!("https://discord.gg/{}", code)
}

/// Fetch all current invites from Discord API
pub async fn fetch_guild_invites(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
) -> Result<Vec<InviteUsage>, Error> {
    let invites = guild_id.invites(&ctx.http).await?;
    Ok(invites.iter().map(InviteUsage::from_rich).collect())
}

pub async fn sync_invites_to_snapshots(
    guild_id: serenity::GuildId,
    invites: &[InviteUsage],
    db: &DatabaseConnection,
) -> Result<(), Error> {
    let now = Utc::now();

    for invite in invites {
        let snapshot = invite_snapshots::ActiveModel {
            guild_id: Set(guild_id.get() as i64),
            code: Set(invite.code.clone()),
            inviter_id: Set(invite.inviter.as_ref().map(|u| u.id)),
            inviter_name: Set(invite.inviter.as_ref().map(ChatUser::display_name)),
            uses: Set(invite.uses),
            last_synced_at: Set(now.into()),
        };

        invite_snapshots::Entity::insert(snapshot)
            .on_conflict(
                sea_orm::sea_query::OnConflict::columns([
                    invite_snapshots::Column::GuildId,
                    invite_snapshots::Column::Code,
                ])
                .update_columns([
                    invite_snapshots::Column::Uses,
                    invite_snapshots::Column::InviterId,
                    invite_snapshots::Column::InviterName,
                    invite_snapshots::Column::LastSyncedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    Ok(())
}

pub async fn get_snapshots(
    guild_id: serenity::GuildId,
    db: &DatabaseConnection,
) -> Result<Vec<invite_snapshots::Model>, Error> {
    let snapshots = invite_snapshots::Entity::find()
        .filter(invite_snapshots::Column::GuildId.eq(guild_id.get() as i64))
        .all(db)
        .await?;

    Ok(snapshots)
}

/// Outcome of comparing live invite counts against the stored snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteMatch<'a> {
    Used(&'a InviteUsage),
    /// No invite gained a use.
    Unused,
    /// Several invites could account for the join, or there is no baseline to compare
    /// against.
    Undetermined,
}

/// Compare current invites with snapshots to find which invite was used. An invite
/// without a snapshot only counts when it has exactly one use, since newly created
/// invites are stored at zero uses.
pub fn find_used_invite<'a>(
    current_invites: &'a [InviteUsage],
    snapshots: &[invite_snapshots::Model],
) -> InviteMatch<'a> {
    if current_invites.is_empty() {
        return InviteMatch::Unused;
    }
    if snapshots.is_empty() {
        return InviteMatch::Undetermined;
    }

    let snapshot_map: HashMap<&str, i64> = snapshots
        .iter()
        .map(|s| (s.code.as_str(), s.uses))
        .collect();

    let mut candidates = current_invites.iter().filter(|invite| {
        match snapshot_map.get(invite.code.as_str()) {
            Some(&old_uses) => invite.uses > old_uses,
            None => invite.uses == 1,
        }
    });

    match (candidates.next(), candidates.next()) {
        (Some(used), None) => InviteMatch::Used(used),
        (None, _) => InviteMatch::Unused,
        (Some(_), Some(_)) => InviteMatch::Undetermined,
    }
}

/// What a member join can be attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinLookup {
    Invite(InviteLink),
    /// No tracked invite moved: the vanity URL, or a join on their own.
    NoInvite,
    /// The join cannot be attributed and is not recorded.
    Skip,
}

/// `current_invites` is `None` when the live invite list could not be fetched.
pub fn lookup_join(
    current_invites: Option<&[InviteUsage]>,
    snapshots: &[invite_snapshots::Model],
) -> JoinLookup {
    let Some(current_invites) = current_invites else {
        return JoinLookup::Skip;
    };

    match find_used_invite(current_invites, snapshots) {
        InviteMatch::Used(invite) => JoinLookup::Invite(invite.to_link()),
        InviteMatch::Unused => JoinLookup::NoInvite,
        InviteMatch::Undetermined => JoinLookup::Skip,
    }
}

/// Joins that match no tracked invite may have come through the vanity URL.
pub async fn vanity_link(ctx: &serenity::Context, guild_id: serenity::GuildId) -> Option<InviteLink> {
    let guild = guild_id.to_partial_guild(ctx).await.ok()?;
    guild.vanity_url_code.map(|code| InviteLink {
        link: invite_url(&code),
        creator: None,
    })
}

pub async fn delete_invite_snapshot(
    guild_id: serenity::GuildId,
    code: &str,
    db: &DatabaseConnection,
) -> Result<(), Error> {
    invite_snapshots::Entity::delete_many()
        .filter(invite_snapshots::Column::GuildId.eq(guild_id.get() as i64))
        .filter(invite_snapshots::Column::Code.eq(code))
        .exec(db)
        .await?;

    Ok(())
}

/// Sync all invites for a guild (used when the bot sees the guild come online)
pub async fn sync_all_guild_invites(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    db: &DatabaseConnection,
) -> Result<(), Error> {
    match fetch_guild_invites(ctx, guild_id).await {
        Ok(invites) => {
            sync_invites_to_snapshots(guild_id, &invites, db).await?;
            tracing::info!("Synced {} invites for guild {}", invites.len(), guild_id);
        }
        Err(e) => {
            tracing::warn!("Failed to fetch invites for guild {}: {:?}", guild_id, e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(code: &str, uses: i64) -> InviteUsage {
        InviteUsage {
            code: code.into(),
            uses,
            inviter: Some(ChatUser::new(1).with_handle("alice")),
        }
    }

    fn snapshot(code: &str, uses: i64) -> invite_snapshots::Model {
        invite_snapshots::Model {
            guild_id: 100,
            code: code.into(),
            inviter_id: Some(1),
            inviter_name: Some("@alice".into()),
            uses,
            last_synced_at: Utc::now().into(),
        }
    }

    fn used<'a>(found: InviteMatch<'a>) -> Option<&'a str> {
        match found {
            InviteMatch::Used(invite) => Some(invite.code.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_find_used_invite() {
        let current = vec![usage("aaaaaaaa", 3), usage("bbbbbbbb", 5)];
        let snapshots = vec![snapshot("aaaaaaaa", 3), snapshot("bbbbbbbb", 4)];

        let InviteMatch::Used(used) = find_used_invite(&current, &snapshots) else {
            panic!("expected a used invite");
        };
        assert_eq!(used.code, "bbbbbbbb");
        assert_eq!(used.to_link().link, "https://discord.gg/bbbbbbbb");
        assert_eq!(used.to_link().creator.map(|c| c.id), Some(1));
    }

    #[test]
    fn test_unseen_invite_counts_only_with_single_use() {
        let snapshots = vec![snapshot("aaaaaaaa", 3)];

        let current = vec![usage("aaaaaaaa", 3), usage("cccccccc", 1)];
        assert_eq!(used(find_used_invite(&current, &snapshots)), Some("cccccccc"));

        let current = vec![usage("aaaaaaaa", 3), usage("cccccccc", 40)];
        assert_eq!(find_used_invite(&current, &snapshots), InviteMatch::Unused);
    }

    #[test]
    fn test_stale_snapshots_credit_nobody() {
        let current = vec![usage("alice_old", 50), usage("bob_new1", 1)];
        assert_eq!(
            find_used_invite(&current, &[]),
            InviteMatch::Undetermined
        );

        // An unseen single-use invite alongside a known one that also moved.
        let current = vec![usage("alice_old", 51), usage("bob_new1", 1)];
        let snapshots = vec![snapshot("alice_old", 50)];
        assert_eq!(
            find_used_invite(&current, &snapshots),
            InviteMatch::Undetermined
        );
    }

    #[test]
    fn test_failed_fetch_skips_join() {
        let snapshots = vec![snapshot("aaaaaaaa", 3)];
        assert_eq!(lookup_join(None, &snapshots), JoinLookup::Skip);
        assert_eq!(lookup_join(None, &[]), JoinLookup::Skip);

        let current = vec![usage("aaaaaaaa", 3)];
        assert_eq!(lookup_join(Some(current.as_slice()), &snapshots), JoinLookup::NoInvite);

        let current = vec![usage("aaaaaaaa", 4)];
        assert!(matches!(
            lookup_join(Some(current.as_slice()), &snapshots),
            JoinLookup::Invite(link) if link.link == "https://discord.gg/aaaaaaaa"
        ));
    }

    #[test]
    fn test_no_change_means_no_invite() {
        let current = vec![usage("aaaaaaaa", 3), usage("dddddddd", 0)];
        let snapshots = vec![snapshot("aaaaaaaa", 3)];
        assert_eq!(find_used_invite(&current, &snapshots), InviteMatch::Unused);

        assert_eq!(find_used_invite(&[], &snapshots), InviteMatch::Unused);
        assert_eq!(find_used_invite(&[], &[]), InviteMatch::Unused);
    }

    #[tokio::test]
    async fn test_snapshot_upsert_refreshes_inviter() {
        use sea_orm::{ConnectOptions, Database};
        use sea_orm_migration::MigratorTrait;

        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        crate::db::migrations::Migrator::up(&db, None).await.unwrap();

        let guild_id = serenity::GuildId::new(100);
        sync_invites_to_snapshots(guild_id, &[usage("aaaaaaaa", 0)], &db)
            .await
            .unwrap();

        let mut reassigned = usage("aaaaaaaa", 2);
        reassigned.inviter = Some(ChatUser::new(2).with_handle("bob"));
        sync_invites_to_snapshots(guild_id, &[reassigned], &db)
            .await
            .unwrap();

        let stored = get_snapshots(guild_id, &db).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].uses, 2);
        assert_eq!(stored[0].inviter_id, Some(2));
        assert_eq!(stored[0].inviter_name.as_deref(), Some("@bob"));
    }
}
