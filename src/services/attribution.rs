//! Decides who, if anyone, brought a new member into a chat.
//!
//! Pure logic: the platform adapter turns gateway events into [`MembershipChange`]s,
//! [`classify`] turns those into a join or leave decision.

use crate::db::entities::invites::JoinMethod;
use crate::services::store::{Identity, NewInvite};
use serde::{Deserialize, Serialize};

/// A member's standing in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    /// Restricted members may or may not still count as members.
    Restricted { is_member: bool },
    Left,
    Kicked,
}

impl MemberStatus {
    /// Ordinary membership. Administrators and the creator are deliberately excluded,
    /// a promotion is not a join.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            MemberStatus::Member | MemberStatus::Restricted { is_member: true }
        )
    }

    pub fn is_present(self) -> bool {
        self.is_active() || self.is_admin()
    }

    pub fn is_admin(self) -> bool {
        matches!(self, MemberStatus::Creator | MemberStatus::Administrator)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUser {
    pub id: i64,
    pub handle: Option<String>,
    pub full_name: Option<String>,
    pub is_bot: bool,
    /// Platform-level actors (service accounts, anonymous admin proxies).
    pub is_system: bool,
}

impl ChatUser {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            handle: None,
            full_name: None,
            is_bot: false,
            is_system: false,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn bot(mut self) -> Self {
        self.is_bot = true;
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }

    /// `@handle`, else the full name, else the numeric id.
    pub fn display_name(&self) -> String {
        let handle = self
            .handle
            .as_deref()
            .map(|h| h.trim().trim_start_matches('@'))
            .filter(|h| !h.is_empty());
        if let Some(handle) = handle {
            return format!("@{handle}");
        }

        match self.full_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.id.to_string(),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteLink {
    pub link: String,
    pub creator: Option<ChatUser>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeShape {
    /// Someone put the member into the chat directly.
    MembersAdded,
    StatusUpdate { old: MemberStatus, new: MemberStatus },
}

/// One membership-change notification, as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipChange {
    pub chat_id: i64,
    pub shape: ChangeShape,
    pub member: ChatUser,
    /// Whoever caused the change, when the platform reports it.
    pub actor: Option<ChatUser>,
    pub invite_link: Option<InviteLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionPolicy {
    /// Ignore automated members joining or leaving.
    pub skip_bots: bool,
}

impl Default for AttributionPolicy {
    fn default() -> Self {
        Self { skip_bots: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAttribution {
    pub method: JoinMethod,
    pub inviter: Option<ChatUser>,
    pub invite_link: Option<String>,
    pub link_creator: Option<ChatUser>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotMembershipChange,
    BotMember,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Join(JoinAttribution),
    Leave { chat_id: i64, user_id: i64 },
    Ignored(IgnoreReason),
}

pub fn is_join(shape: ChangeShape) -> bool {
    match shape {
        ChangeShape::MembersAdded => true,
        ChangeShape::StatusUpdate { old, new } => !old.is_active() && new.is_active(),
    }
}

pub fn is_leave(shape: ChangeShape) -> bool {
    match shape {
        ChangeShape::MembersAdded => false,
        ChangeShape::StatusUpdate { old, new } => {
            old.is_present() && matches!(new, MemberStatus::Left | MemberStatus::Kicked)
        }
    }
}

pub fn classify(change: &MembershipChange, policy: &AttributionPolicy) -> Classification {
    let joined = is_join(change.shape);
    let left = is_leave(change.shape);

    if !joined && !left {
        return Classification::Ignored(IgnoreReason::NotMembershipChange);
    }

    if policy.skip_bots && change.member.is_bot {
        return Classification::Ignored(IgnoreReason::BotMember);
    }

    if left {
        return Classification::Leave {
            chat_id: change.chat_id,
            user_id: change.member.id,
        };
    }

    Classification::Join(attribute(change))
}

fn attribute(change: &MembershipChange) -> JoinAttribution {
    let actor = change
        .actor
        .as_ref()
        .filter(|actor| !actor.is_system && actor.id != change.member.id);

    if let Some(link) = &change.invite_link {
        // An admin admitting someone through another user's link gets the credit.
        let inviter = actor.cloned().or_else(|| {
            link.creator
                .as_ref()
                .filter(|creator| creator.id != change.member.id)
                .cloned()
        });

        return JoinAttribution {
            method: JoinMethod::InviteLink,
            inviter,
            invite_link: Some(link.link.clone()),
            link_creator: link.creator.clone(),
        };
    }

    match actor {
        Some(actor) => JoinAttribution {
            method: match change.shape {
                ChangeShape::MembersAdded => JoinMethod::Added,
                ChangeShape::StatusUpdate { .. } => JoinMethod::Approved,
            },
            inviter: Some(actor.clone()),
            invite_link: None,
            link_creator: None,
        },
        None => JoinAttribution {
            method: JoinMethod::SelfJoin,
            inviter: None,
            invite_link: None,
            link_creator: None,
        },
    }
}

impl JoinAttribution {
    pub fn into_new_invite(self, change: &MembershipChange, joined_at: i64) -> NewInvite {
        NewInvite {
            chat_id: change.chat_id,
            joined: change.member.identity(),
            inviter: self.inviter.as_ref().map(ChatUser::identity),
            method: self.method,
            invite_link: self.invite_link,
            link_creator: self.link_creator.as_ref().map(ChatUser::identity),
            joined_at,
        }
    }
}
