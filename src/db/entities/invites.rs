use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How a member ended up in the chat.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum JoinMethod {
    #[sea_orm(string_value = "added")]
    Added,
    #[sea_orm(string_value = "invite_link")]
    InviteLink,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "self_join")]
    SelfJoin,
}

impl std::fmt::Display for JoinMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinMethod::Added => write!(f, "added"),
            JoinMethod::InviteLink => write!(f, "invite_link"),
            JoinMethod::Approved => write!(f, "approved"),
            JoinMethod::SelfJoin => write!(f, "self_join"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "invites")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub chat_id: i64,
    pub joined_user_id: i64,
    pub joined_display_name: String,
    pub inviter_user_id: Option<i64>,
    pub inviter_display_name: Option<String>,
    pub method: JoinMethod,
    pub invite_link: Option<String>,
    pub link_creator_id: Option<i64>,
    pub link_creator_display_name: Option<String>,
    /// Unix seconds at which the join was processed.
    pub joined_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
