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
                    .table(TrendKeywords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrendKeywords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TrendKeywords::Keyword).string().not_null())
                    .col(ColumnDef::new(TrendKeywords::Sources).json().not_null())
                    .col(ColumnDef::new(TrendKeywords::Popularity).double().not_null())
                    .col(ColumnDef::new(TrendKeywords::AvgScore).double().not_null())
                    .col(
                        ColumnDef::new(TrendKeywords::RecordedAt)
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
                    .name("idx_trend_keywords_recorded_at_keyword")
                    .table(TrendKeywords::Table)
                    .col(TrendKeywords::RecordedAt)
                    .col(TrendKeywords::Keyword)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TrendKeywords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TrendKeywords {
    Table,
    Id,
    Keyword,
    Sources,
    Popularity,
    AvgScore,
    RecordedAt,
}
