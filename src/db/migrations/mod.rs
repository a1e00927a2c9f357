pub mod m000001_create_invites;
pub mod m000002_create_ranking;
pub mod m000003_create_invite_snapshots;

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m000001_create_invites::Migration),
            Box::new(m000002_create_ranking::Migration),
            Box::new(m000003_create_invite_snapshots::Migration),
        ]
    }
}
