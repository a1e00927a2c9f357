use crate::services::attribution::{self, AttributionPolicy, Classification, MembershipChange};
use crate::services::store::{InviteStore, NewInvite, StoreError};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Recorded(NewInvite),
    /// The same join was already on record.
    Duplicate,
    /// A leave was processed; holds the inviter whose count went down, if any.
    Reversed(Option<i64>),
    Ignored,
}

/// Feeds membership changes through the classifier into the store.
pub struct InviteTracker {
    store: Arc<InviteStore>,
    policy: AttributionPolicy,
    reverse_on_leave: bool,
}

impl InviteTracker {
    pub fn new(store: Arc<InviteStore>, policy: AttributionPolicy, reverse_on_leave: bool) -> Self {
        Self {
            store,
            policy,
            reverse_on_leave,
        }
    }

    pub fn policy(&self) -> &AttributionPolicy {
        &self.policy
    }

    /// `now` is the processing time in Unix seconds.
    pub async fn handle(
        &self,
        change: &MembershipChange,
        now: i64,
    ) -> Result<IngestOutcome, StoreError> {
        match attribution::classify(change, &self.policy) {
            Classification::Join(attribution) => {
                let invite = attribution.into_new_invite(change, now);
                if self.store.record_invite(&invite).await? {
                    Ok(IngestOutcome::Recorded(invite))
                } else {
                    Ok(IngestOutcome::Duplicate)
                }
            }
            Classification::Leave { chat_id, user_id } => {
                if !self.reverse_on_leave {
                    debug!(chat_id, user_id, "Member left, leave reversal disabled");
                    return Ok(IngestOutcome::Ignored);
                }
                let inviter = self.store.reverse_invite(chat_id, user_id).await?;
                Ok(IngestOutcome::Reversed(inviter))
            }
            Classification::Ignored(reason) => {
                debug!(
                    chat_id = change.chat_id,
                    user_id = change.member.id,
                    ?reason,
                    "Ignoring membership change"
                );
                Ok(IngestOutcome::Ignored)
            }
        }
    }
}
