// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::target::{ScrapeFrequency, ScrapeTarget};
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::target_repository::TargetRepository;
use crate::infrastructure::database::entities::scrape_target as target_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 抓取目标仓库实现
#[derive(Clone)]
pub struct TargetRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl TargetRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<target_entity::Model> for ScrapeTarget {
    fn from(model: target_entity::Model) -> Self {
        Self {
            id: model.id,
            url: model.url,
            job_type: model.job_type.parse().unwrap_or_default(),
            frequency: model.frequency.parse().unwrap_or_default(),
            user_id: model.user_id,
            active: model.active,
            last_scraped_at: model.last_scraped_at,
            created_at: model.created_at,
        }
    }
}

impl From<ScrapeTarget> for target_entity::ActiveModel {
    fn from(target: ScrapeTarget) -> Self {
        Self {
            id: Set(target.id),
            url: Set(target.url),
            job_type: Set(target.job_type.to_string()),
            frequency: Set(target.frequency.to_string()),
            user_id: Set(target.user_id),
            active: Set(target.active),
            last_scraped_at: Set(target.last_scraped_at),
            created_at: Set(target.created_at),
        }
    }
}

#[async_trait]
impl TargetRepository for TargetRepositoryImpl {
    async fn create(&self, target: &ScrapeTarget) -> Result<ScrapeTarget, RepositoryError> {
        let model: target_entity::ActiveModel = target.clone().into();
        model.insert(self.db.as_ref()).await?;
        Ok(target.clone())
    }

    async fn find_overdue(
        &self,
        frequency: ScrapeFrequency,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<ScrapeTarget>, RepositoryError> {
        let models = target_entity::Entity::find()
            .filter(target_entity::Column::Active.eq(true))
            .filter(target_entity::Column::Frequency.eq(frequency.to_string()))
            .filter(
                Condition::any()
                    .add(target_entity::Column::LastScrapedAt.is_null())
                    .add(target_entity::Column::LastScrapedAt.lt(cutoff)),
            )
            .order_by_asc(target_entity::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn mark_scraped(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let at: DateTime<FixedOffset> = at.into();
        target_entity::Entity::update_many()
            .col_expr(target_entity::Column::LastScrapedAt, Expr::value(Some(at)))
            .filter(target_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}
