// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Keywords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Keywords::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Keywords::UserId).uuid().not_null())
                    .col(ColumnDef::new(Keywords::Keyword).text().not_null())
                    .col(
                        ColumnDef::new(Keywords::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Keywords::SearchEngine).string_len(32).not_null())
                    .col(ColumnDef::new(Keywords::AdCount).big_integer())
                    .col(ColumnDef::new(Keywords::LinkCount).big_integer())
                    .col(ColumnDef::new(Keywords::HtmlContent).text())
                    .col(ColumnDef::new(Keywords::ErrorMessage).text())
                    .col(
                        ColumnDef::new(Keywords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Keywords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_keywords_user_id")
                    .table(Keywords::Table)
                    .col(Keywords::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Keywords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Keywords {
    Table,
    Id,
    UserId,
    Keyword,
    Status,
    SearchEngine,
    AdCount,
    LinkCount,
    HtmlContent,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}
