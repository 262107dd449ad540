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
                    .table(ScrapeTargets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScrapeTargets::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScrapeTargets::Url).text().not_null())
                    .col(ColumnDef::new(ScrapeTargets::JobType).string().not_null())
                    .col(ColumnDef::new(ScrapeTargets::Frequency).string().not_null())
                    .col(ColumnDef::new(ScrapeTargets::UserId).uuid())
                    .col(ColumnDef::new(ScrapeTargets::Active).boolean().not_null().default(true))
                    .col(ColumnDef::new(ScrapeTargets::LastScrapedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ScrapeTargets::CreatedAt)
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
                    .name("idx_scrape_targets_frequency_last_scraped")
                    .table(ScrapeTargets::Table)
                    .col(ScrapeTargets::Frequency)
                    .col(ScrapeTargets::LastScrapedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ScrapeTargets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ScrapeTargets {
    Table,
    Id,
    Url,
    JobType,
    Frequency,
    UserId,
    Active,
    LastScrapedAt,
    CreatedAt,
}
