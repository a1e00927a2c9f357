//! Durable record of join attribution and the per-inviter counters derived from it.
//!
//! Every public operation runs under the store's [`RetryPolicy`]; a connection-class
//! failure asks the [`ConnectionProvider`] to reconnect before the next attempt.

mod connection;
mod error;
pub mod retry;

pub use connection::{ConnectionProvider, ReconnectingPool};
pub use error::StoreError;
pub use retry::{Backoff, FailureKind, RetryPolicy};

use crate::db::entities::invites::{self, JoinMethod};
use crate::db::entities::ranking;
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{
    ColumnTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_RANKING_LIMIT: u64 = 10;

/// A user as captured at event time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub display_name: String,
}

impl Identity {
    pub fn new(user_id: i64, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
        }
    }
}

/// A classified join, ready to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvite {
    pub chat_id: i64,
    pub joined: Identity,
    pub inviter: Option<Identity>,
    pub method: JoinMethod,
    pub invite_link: Option<String>,
    pub link_creator: Option<Identity>,
    pub joined_at: i64,
}

impl NewInvite {
    fn to_active_model(&self) -> invites::ActiveModel {
        invites::ActiveModel {
            chat_id: Set(self.chat_id),
            joined_user_id: Set(self.joined.user_id),
            joined_display_name: Set(self.joined.display_name.clone()),
            inviter_user_id: Set(self.inviter.as_ref().map(|i| i.user_id)),
            inviter_display_name: Set(self.inviter.as_ref().map(|i| i.display_name.clone())),
            method: Set(self.method),
            invite_link: Set(self.invite_link.clone()),
            link_creator_id: Set(self.link_creator.as_ref().map(|c| c.user_id)),
            link_creator_display_name: Set(
                self.link_creator.as_ref().map(|c| c.display_name.clone()),
            ),
            joined_at: Set(self.joined_at),
            ..Default::default()
        }
    }
}

/// One leaderboard line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankEntry {
    pub user_id: i64,
    pub display_name: String,
    pub count: i64,
}

impl From<ranking::Model> for RankEntry {
    fn from(model: ranking::Model) -> Self {
        Self {
            user_id: model.user_id,
            display_name: model.display_name,
            count: model.count,
        }
    }
}

pub struct InviteStore {
    conn: Arc<dyn ConnectionProvider>,
    retry: RetryPolicy,
}

impl InviteStore {
    pub fn new(conn: Arc<dyn ConnectionProvider>, retry: RetryPolicy) -> Self {
        Self { conn, retry }
    }

    /// Records a join. Returns `false` when the same inviter/joiner pair is already on
    /// record for this chat, so redelivered events are no-ops.
    pub async fn record_invite(&self, invite: &NewInvite) -> Result<bool, StoreError> {
        let inserted = self
            .retry
            .run("record_invite", || self.conn.reconnect(), || {
                self.try_record_invite(invite)
            })
            .await?;

        if inserted {
            info!(
                chat_id = invite.chat_id,
                joined = invite.joined.user_id,
                inviter = ?invite.inviter.as_ref().map(|i| i.user_id),
                method = %invite.method,
                "Recorded join"
            );
        }

        Ok(inserted)
    }

    async fn try_record_invite(&self, invite: &NewInvite) -> Result<bool, DbErr> {
        let db = self.conn.connection();
        let inviter_id = invite.inviter.as_ref().map(|i| i.user_id);

        let existing = invites::Entity::find()
            .filter(invites::Column::ChatId.eq(invite.chat_id))
            .filter(invites::Column::JoinedUserId.eq(invite.joined.user_id));
        let existing = match inviter_id {
            Some(id) => existing.filter(invites::Column::InviterUserId.eq(id)),
            None => existing.filter(invites::Column::InviterUserId.is_null()),
        };

        if existing.one(&db).await?.is_some() {
            debug!(
                chat_id = invite.chat_id,
                joined = invite.joined.user_id,
                "Join already recorded, skipping"
            );
            return Ok(false);
        }

        let txn = db.begin().await?;

        let rows = invites::Entity::insert(invite.to_active_model())
            .on_conflict(
                OnConflict::columns([
                    invites::Column::ChatId,
                    invites::Column::JoinedUserId,
                    invites::Column::InviterUserId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        if rows == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        if let Some(inviter) = &invite.inviter {
            let counter = ranking::ActiveModel {
                chat_id: Set(invite.chat_id),
                user_id: Set(inviter.user_id),
                display_name: Set(inviter.display_name.clone()),
                count: Set(1),
                first_invited_at: Set(invite.joined_at),
            };

            ranking::Entity::insert(counter)
                .on_conflict(
                    OnConflict::columns([ranking::Column::ChatId, ranking::Column::UserId])
                        .value(
                            ranking::Column::Count,
                            Expr::col((ranking::Entity, ranking::Column::Count)).add(1),
                        )
                        .update_column(ranking::Column::DisplayName)
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(true)
    }

    /// Top inviters of a chat, highest count first. Equal counts are ordered by who
    /// reached their first invite earliest, then by user id.
    pub async fn get_ranking(&self, chat_id: i64, limit: u64) -> Result<Vec<RankEntry>, StoreError> {
        let rows = self
            .retry
            .run("get_ranking", || self.conn.reconnect(), || async {
                ranking::Entity::find()
                    .filter(ranking::Column::ChatId.eq(chat_id))
                    .filter(ranking::Column::Count.gt(0))
                    .order_by_desc(ranking::Column::Count)
                    .order_by_asc(ranking::Column::FirstInvitedAt)
                    .order_by_asc(ranking::Column::UserId)
                    .limit(limit)
                    .all(&self.conn.connection())
                    .await
            })
            .await?;

        Ok(rows.into_iter().map(RankEntry::from).collect())
    }

    pub async fn get_user_count(&self, chat_id: i64, user_id: i64) -> Result<i64, StoreError> {
        let counter = self
            .retry
            .run("get_user_count", || self.conn.reconnect(), || async {
                ranking::Entity::find_by_id((chat_id, user_id))
                    .one(&self.conn.connection())
                    .await
            })
            .await?;

        Ok(counter.map(|c| c.count).unwrap_or(0))
    }

    /// 1-based position where ties share a place. `None` if the user has no counter.
    pub async fn get_user_rank_position(
        &self,
        chat_id: i64,
        user_id: i64,
    ) -> Result<Option<u64>, StoreError> {
        self.retry
            .run("get_user_rank_position", || self.conn.reconnect(), || async {
                let db = self.conn.connection();
                let Some(counter) = ranking::Entity::find_by_id((chat_id, user_id))
                    .one(&db)
                    .await?
                else {
                    return Ok::<_, DbErr>(None);
                };

                let ahead = ranking::Entity::find()
                    .filter(ranking::Column::ChatId.eq(chat_id))
                    .filter(ranking::Column::Count.gt(counter.count))
                    .count(&db)
                    .await?;

                Ok::<_, DbErr>(Some(ahead + 1))
            })
            .await
    }

    /// Undoes the most recent attributed join of `leaving_user_id`. Returns the inviter
    /// whose counter was decremented, if any.
    pub async fn reverse_invite(
        &self,
        chat_id: i64,
        leaving_user_id: i64,
    ) -> Result<Option<i64>, StoreError> {
        let inviter = self
            .retry
            .run("reverse_invite", || self.conn.reconnect(), || {
                self.try_reverse_invite(chat_id, leaving_user_id)
            })
            .await?;

        if let Some(inviter_id) = inviter {
            info!(
                chat_id,
                left = leaving_user_id,
                inviter = inviter_id,
                "Reversed invite after member left"
            );
        }

        Ok(inviter)
    }

    async fn try_reverse_invite(
        &self,
        chat_id: i64,
        leaving_user_id: i64,
    ) -> Result<Option<i64>, DbErr> {
        let txn = self.conn.connection().begin().await?;

        let record = invites::Entity::find()
            .filter(invites::Column::ChatId.eq(chat_id))
            .filter(invites::Column::JoinedUserId.eq(leaving_user_id))
            .filter(invites::Column::InviterUserId.is_not_null())
            .order_by_desc(invites::Column::Id)
            .one(&txn)
            .await?;

        let Some((record_id, inviter_id)) =
            record.and_then(|r| r.inviter_user_id.map(|inviter| (r.id, inviter)))
        else {
            txn.rollback().await?;
            return Ok(None);
        };

        invites::Entity::delete_by_id(record_id).exec(&txn).await?;

        ranking::Entity::update_many()
            .col_expr(
                ranking::Column::Count,
                Expr::col(ranking::Column::Count).sub(1),
            )
            .filter(ranking::Column::ChatId.eq(chat_id))
            .filter(ranking::Column::UserId.eq(inviter_id))
            .exec(&txn)
            .await?;

        ranking::Entity::delete_many()
            .filter(ranking::Column::ChatId.eq(chat_id))
            .filter(ranking::Column::UserId.eq(inviter_id))
            .filter(ranking::Column::Count.lte(0))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(Some(inviter_id))
    }

    /// Most recent recorded join of a user in a chat.
    pub async fn latest_join(
        &self,
        chat_id: i64,
        user_id: i64,
    ) -> Result<Option<invites::Model>, StoreError> {
        self.retry
            .run("latest_join", || self.conn.reconnect(), || async {
                invites::Entity::find()
                    .filter(invites::Column::ChatId.eq(chat_id))
                    .filter(invites::Column::JoinedUserId.eq(user_id))
                    .order_by_desc(invites::Column::JoinedAt)
                    .order_by_desc(invites::Column::Id)
                    .one(&self.conn.connection())
                    .await
            })
            .await
    }

    /// Finds the user who most recently joined under `display_name` (case-insensitive).
    pub async fn find_joined_by_name(
        &self,
        chat_id: i64,
        display_name: &str,
    ) -> Result<Option<i64>, StoreError> {
        let needle = display_name.to_lowercase();
        let record = self
            .retry
            .run("find_joined_by_name", || self.conn.reconnect(), || async {
                invites::Entity::find()
                    .filter(invites::Column::ChatId.eq(chat_id))
                    .filter(
                        Expr::expr(Func::lower(Expr::col(
                            invites::Column::JoinedDisplayName,
                        )))
                        .eq(needle.as_str()),
                    )
                    .order_by_desc(invites::Column::Id)
                    .one(&self.conn.connection())
                    .await
            })
            .await?;

        Ok(record.map(|r| r.joined_user_id))
    }
}
