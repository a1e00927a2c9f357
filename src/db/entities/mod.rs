pub mod invite_snapshots;
pub mod invites;
pub mod ranking;

pub mod prelude {
    pub use super::invite_snapshots::Entity as InviteSnapshots;
    pub use super::invites::Entity as Invites;
    pub use super::ranking::Entity as Ranking;
}
