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
                    .table(ScrapeJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScrapeJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScrapeJobs::JobType).string().not_null())
                    .col(ColumnDef::new(ScrapeJobs::Target).text())
                    .col(ColumnDef::new(ScrapeJobs::Status).string().not_null())
                    .col(ColumnDef::new(ScrapeJobs::Priority).integer().not_null().default(5))
                    .col(ColumnDef::new(ScrapeJobs::Progress).small_integer().not_null().default(0))
                    .col(ColumnDef::new(ScrapeJobs::Result).json())
                    .col(ColumnDef::new(ScrapeJobs::Error).text())
                    .col(ColumnDef::new(ScrapeJobs::UserId).uuid())
                    .col(ColumnDef::new(ScrapeJobs::Options).json().not_null())
                    .col(ColumnDef::new(ScrapeJobs::AttemptCount).integer().not_null().default(0))
                    .col(ColumnDef::new(ScrapeJobs::MaxAttempts).integer().not_null().default(3))
                    .col(ColumnDef::new(ScrapeJobs::ScheduledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ScrapeJobs::LeaseToken).uuid())
                    .col(ColumnDef::new(ScrapeJobs::LeaseExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ScrapeJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(ScrapeJobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ScrapeJobs::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ScrapeJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 领取顺序：状态、优先级、创建时间
        manager
            .create_index(
                Index::create()
                    .name("idx_scrape_jobs_status_priority_created_at")
                    .table(ScrapeJobs::Table)
                    .col(ScrapeJobs::Status)
                    .col(ScrapeJobs::Priority)
                    .col(ScrapeJobs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scrape_jobs_target")
                    .table(ScrapeJobs::Table)
                    .col(ScrapeJobs::Target)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scrape_jobs_completed_at")
                    .table(ScrapeJobs::Table)
                    .col(ScrapeJobs::CompletedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScrapeJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScrapeJobs {
    Table,
    Id,
    JobType,
    Target,
    Status,
    Priority,
    Progress,
    Result,
    Error,
    UserId,
    Options,
    AttemptCount,
    MaxAttempts,
    ScheduledAt,
    LeaseToken,
    LeaseExpiresAt,
    CreatedAt,
    StartedAt,
    CompletedAt,
    UpdatedAt,
}
