use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InviteSnapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InviteSnapshots::GuildId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InviteSnapshots::Code)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(InviteSnapshots::InviterId).big_integer())
                    .col(ColumnDef::new(InviteSnapshots::InviterName).string_len(255))
                    .col(
                        ColumnDef::new(InviteSnapshots::Uses)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(InviteSnapshots::LastSyncedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(InviteSnapshots::GuildId)
                            .col(InviteSnapshots::Code),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InviteSnapshots::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum InviteSnapshots {
    Table,
    GuildId,
    Code,
    InviterId,
    InviterName,
    Uses,
    LastSyncedAt,
}
