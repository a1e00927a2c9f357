use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Ranking::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Ranking::ChatId).big_integer().not_null())
                    .col(ColumnDef::new(Ranking::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Ranking::DisplayName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Ranking::Count)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Ranking::FirstInvitedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(Ranking::ChatId)
                            .col(Ranking::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ranking-chat-count")
                    .table(Ranking::Table)
                    .col(Ranking::ChatId)
                    .col((Ranking::Count, IndexOrder::Desc))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Ranking::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Ranking {
    Table,
    ChatId,
    UserId,
    DisplayName,
    Count,
    FirstInvitedAt,
}
