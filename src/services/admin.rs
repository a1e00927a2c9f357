use crate::services::attribution::MemberStatus;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Where a command was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatScope {
    /// One-to-one conversation with the bot.
    Direct(i64),
    Group(i64),
}

impl ChatScope {
    pub fn chat_id(self) -> i64 {
        match self {
            ChatScope::Direct(id) | ChatScope::Group(id) => id,
        }
    }
}

/// Looks up a user's standing in a group.
#[async_trait]
pub trait MembershipInfo: Send + Sync {
    async fn member_status(&self, chat_id: i64, user_id: i64) -> anyhow::Result<MemberStatus>;
}

pub struct AdminGate {
    info: Arc<dyn MembershipInfo>,
}

impl AdminGate {
    pub fn new(info: Arc<dyn MembershipInfo>) -> Self {
        Self { info }
    }

    /// Group administrators and the group creator are authorized, as is anyone in a
    /// direct conversation. Lookup failures deny access.
    pub async fn is_authorized(&self, scope: ChatScope, user_id: i64) -> bool {
        let chat_id = match scope {
            ChatScope::Direct(_) => return true,
            ChatScope::Group(chat_id) => chat_id,
        };

        match self.info.member_status(chat_id, user_id).await {
            Ok(status) => status.is_admin(),
            Err(e) => {
                warn!(chat_id, user_id, "Admin check failed, denying: {:?}", e);
                false
            }
        }
    }
}
