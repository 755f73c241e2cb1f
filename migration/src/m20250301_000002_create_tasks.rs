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
        // Delayed task queue backing table
        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tasks::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Tasks::Queue)
                            .string_len(64)
                            .not_null()
                            .default("default"),
                    )
                    .col(ColumnDef::new(Tasks::TaskType).string().not_null())
                    .col(ColumnDef::new(Tasks::Status).string_len(20).not_null())
                    .col(ColumnDef::new(Tasks::Payload).json().not_null())
                    .col(
                        ColumnDef::new(Tasks::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Tasks::MaxRetries)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(ColumnDef::new(Tasks::ScheduledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Tasks::LockToken).uuid())
                    .col(ColumnDef::new(Tasks::LockExpiresAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Tasks::LastError).text())
                    .col(ColumnDef::new(Tasks::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Tasks::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Tasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Tasks::UpdatedAt)
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
                    .name("idx_tasks_queue_status_scheduled")
                    .table(Tasks::Table)
                    .col(Tasks::Queue)
                    .col(Tasks::Status)
                    .col(Tasks::ScheduledAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    Queue,
    TaskType,
    Status,
    Payload,
    AttemptCount,
    MaxRetries,
    ScheduledAt,
    LockToken,
    LockExpiresAt,
    LastError,
    StartedAt,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}
