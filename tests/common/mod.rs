#![allow(dead_code)]

use async_trait::async_trait;
use invite_tally::db::migrations::Migrator;
use invite_tally::services::admin::MembershipInfo;
use invite_tally::services::attribution::{
    ChangeShape, ChatUser, InviteLink, MemberStatus, MembershipChange,
};
use invite_tally::services::notifier::{MessageRef, ReplyChannel, TextFormat};
use invite_tally::services::store::{ConnectionProvider, InviteStore, RetryPolicy};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CHAT: i64 = -100_200;

/// Fresh in-memory database with every migration applied. A single pooled connection
/// keeps all queries on the same in-memory database.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await.expect("sqlite connects");
    Migrator::up(&db, None).await.expect("migrations apply");
    db
}

/// Counts how often the store asks for a connection.
pub struct CountingProvider {
    db: DatabaseConnection,
    pub connections: AtomicUsize,
}

impl CountingProvider {
    pub fn new(db: DatabaseConnection) -> Arc<Self> {
        Arc::new(Self {
            db,
            connections: AtomicUsize::new(0),
        })
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl ConnectionProvider for CountingProvider {
    fn connection(&self) -> DatabaseConnection {
        self.connections.fetch_add(1, Ordering::SeqCst);
        self.db.clone()
    }

    fn reconnect(&self) {}
}

pub fn store(provider: Arc<dyn ConnectionProvider>) -> Arc<InviteStore> {
    Arc::new(InviteStore::new(provider, RetryPolicy::immediate(3)))
}

/// Answers admin lookups from a fixed table. Unknown users are plain members.
#[derive(Default)]
pub struct FakeMembership {
    statuses: HashMap<i64, MemberStatus>,
    pub lookups: AtomicUsize,
}

impl FakeMembership {
    pub fn with(mut self, user_id: i64, status: MemberStatus) -> Self {
        self.statuses.insert(user_id, status);
        self
    }
}

#[async_trait]
impl MembershipInfo for FakeMembership {
    async fn member_status(&self, _chat_id: i64, user_id: i64) -> anyhow::Result<MemberStatus> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .statuses
            .get(&user_id)
            .copied()
            .unwrap_or(MemberStatus::Member))
    }
}

#[derive(Default)]
pub struct RecordingReplies {
    next_id: AtomicI64,
    pub sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl ReplyChannel for RecordingReplies {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        _format: TextFormat,
    ) -> anyhow::Result<MessageRef> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(MessageRef {
            chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }

    async fn delete_message(&self, _message: MessageRef) -> anyhow::Result<()> {
        Ok(())
    }
}

pub fn user(id: i64, handle: &str) -> ChatUser {
    ChatUser::new(id).with_handle(handle)
}

/// `actor` put `member` into the chat directly.
pub fn added_by(member: ChatUser, actor: ChatUser) -> MembershipChange {
    MembershipChange {
        chat_id: CHAT,
        shape: ChangeShape::MembersAdded,
        member,
        actor: Some(actor),
        invite_link: None,
    }
}

/// `member` joined through a link created by `creator`, with nobody else involved.
pub fn joined_via_link(member: ChatUser, link: &str, creator: ChatUser) -> MembershipChange {
    MembershipChange {
        chat_id: CHAT,
        shape: ChangeShape::StatusUpdate {
            old: MemberStatus::Left,
            new: MemberStatus::Member,
        },
        member,
        actor: None,
        invite_link: Some(InviteLink {
            link: link.to_string(),
            creator: Some(creator),
        }),
    }
}

pub fn joined_alone(member: ChatUser) -> MembershipChange {
    MembershipChange {
        chat_id: CHAT,
        shape: ChangeShape::StatusUpdate {
            old: MemberStatus::Left,
            new: MemberStatus::Member,
        },
        member,
        actor: None,
        invite_link: None,
    }
}

pub fn left(member: ChatUser) -> MembershipChange {
    MembershipChange {
        chat_id: CHAT,
        shape: ChangeShape::StatusUpdate {
            old: MemberStatus::Member,
            new: MemberStatus::Left,
        },
        member,
        actor: None,
        invite_link: None,
    }
}
