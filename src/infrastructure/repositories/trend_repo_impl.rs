// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::trend::{HotKeyword, MergedTrend};
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::trend_repository::TrendRepository;
use crate::infrastructure::database::entities::trend_keyword as trend_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::{Expr, Order},
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 趋势关键词仓库实现
#[derive(Clone)]
pub struct TrendRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl TrendRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TrendRepository for TrendRepositoryImpl {
    async fn record(&self, trends: &[MergedTrend]) -> Result<(), RepositoryError> {
        if trends.is_empty() {
            return Ok(());
        }
        let now: DateTime<FixedOffset> = Utc::now().into();
        let models = trends.iter().map(|trend| trend_entity::ActiveModel {
            id: Set(Uuid::new_v4()),
            keyword: Set(trend.keyword.to_lowercase()),
            sources: Set(serde_json::json!(trend.sources)),
            popularity: Set(trend.popularity),
            avg_score: Set(trend.avg_score),
            recorded_at: Set(now),
        });
        trend_entity::Entity::insert_many(models)
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn hot_keywords(
        &self,
        since: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<HotKeyword>, RepositoryError> {
        let rows: Vec<(String, f64)> = trend_entity::Entity::find()
            .select_only()
            .column(trend_entity::Column::Keyword)
            .column_as(trend_entity::Column::Popularity.sum(), "score")
            .filter(trend_entity::Column::RecordedAt.gte(since))
            .group_by(trend_entity::Column::Keyword)
            .order_by(Expr::cust("score"), Order::Desc)
            .limit(limit)
            .into_tuple()
            .all(self.db.as_ref())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(keyword, score)| HotKeyword { keyword, score })
            .collect())
    }
}
