use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Invites::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Invites::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Invites::ChatId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Invites::JoinedUserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Invites::JoinedDisplayName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Invites::InviterUserId).big_integer())
                    .col(ColumnDef::new(Invites::InviterDisplayName).string_len(255))
                    .col(ColumnDef::new(Invites::Method).string_len(16).not_null())
                    .col(ColumnDef::new(Invites::InviteLink).string_len(255))
                    .col(ColumnDef::new(Invites::LinkCreatorId).big_integer())
                    .col(ColumnDef::new(Invites::LinkCreatorDisplayName).string_len(255))
                    .col(ColumnDef::new(Invites::JoinedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        // Backstop for the dedup check in the store
        manager
            .create_index(
                Index::create()
                    .name("uq-invites-chat-joined-inviter")
                    .table(Invites::Table)
                    .col(Invites::ChatId)
                    .col(Invites::JoinedUserId)
                    .col(Invites::InviterUserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invites-chat-joined")
                    .table(Invites::Table)
                    .col(Invites::ChatId)
                    .col(Invites::JoinedUserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-invites-chat-inviter")
                    .table(Invites::Table)
                    .col(Invites::ChatId)
                    .col(Invites::InviterUserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Invites::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Invites {
    Table,
    Id,
    ChatId,
    JoinedUserId,
    JoinedDisplayName,
    InviterUserId,
    InviterDisplayName,
    Method,
    InviteLink,
    LinkCreatorId,
    LinkCreatorDisplayName,
    JoinedAt,
}
