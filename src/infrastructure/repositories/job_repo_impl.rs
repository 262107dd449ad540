// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scrape_job::{
    DomainError, JobStats, JobStatus, ScrapeJob, ATTEMPTS_EXHAUSTED_MESSAGE,
};
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use crate::infrastructure::database::entities::scrape_job as job_entity;
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// 任务仓库实现
///
/// 基于SeaORM实现。Postgres 上领取任务使用 `FOR UPDATE SKIP LOCKED`，
/// 多个工作器并发领取时互不阻塞也不会重复领取。
#[derive(Clone)]
pub struct JobRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl JobRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn status_strings(statuses: &[JobStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.to_string()).collect()
}

fn domain_error(e: DomainError) -> RepositoryError {
    RepositoryError::Database(sea_orm::DbErr::Custom(e.to_string()))
}

/// 还原存储的任务
///
/// 未知的状态或类型不会被当作默认值，而是返回 `InvalidRecord`。
impl TryFrom<job_entity::Model> for ScrapeJob {
    type Error = RepositoryError;

    fn try_from(model: job_entity::Model) -> Result<Self, Self::Error> {
        let invalid = |e: DomainError| RepositoryError::InvalidRecord {
            id: model.id,
            reason: e.to_string(),
        };
        let job_type = model.job_type.parse().map_err(invalid)?;
        let status = model.status.parse().map_err(invalid)?;
        Ok(Self {
            id: model.id,
            job_type,
            target: model.target,
            status,
            priority: model.priority,
            progress: model.progress.clamp(0, 100) as u8,
            result: model.result,
            error: model.error,
            user_id: model.user_id,
            options: model.options,
            attempt_count: model.attempt_count,
            max_attempts: model.max_attempts,
            scheduled_at: model.scheduled_at,
            lease_token: model.lease_token,
            lease_expires_at: model.lease_expires_at,
            created_at: model.created_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
            updated_at: model.updated_at,
        })
    }
}

impl From<ScrapeJob> for job_entity::ActiveModel {
    fn from(job: ScrapeJob) -> Self {
        Self {
            id: Set(job.id),
            job_type: Set(job.job_type.to_string()),
            target: Set(job.target),
            status: Set(job.status.to_string()),
            priority: Set(job.priority),
            progress: Set(job.progress as i16),
            result: Set(job.result),
            error: Set(job.error),
            user_id: Set(job.user_id),
            options: Set(job.options),
            attempt_count: Set(job.attempt_count),
            max_attempts: Set(job.max_attempts),
            scheduled_at: Set(job.scheduled_at),
            lease_token: Set(job.lease_token),
            lease_expires_at: Set(job.lease_expires_at),
            created_at: Set(job.created_at),
            started_at: Set(job.started_at),
            completed_at: Set(job.completed_at),
            updated_at: Set(job.updated_at),
        }
    }
}

#[async_trait]
impl JobRepository for JobRepositoryImpl {
    async fn create(&self, job: &ScrapeJob) -> Result<ScrapeJob, RepositoryError> {
        let model: job_entity::ActiveModel = job.clone().into();
        model.insert(self.db.as_ref()).await?;
        Ok(job.clone())
    }

    async fn update(&self, job: &ScrapeJob) -> Result<ScrapeJob, RepositoryError> {
        let model: job_entity::ActiveModel = job.clone().into();
        let updated = model.update(self.db.as_ref()).await?;
        ScrapeJob::try_from(updated)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScrapeJob>, RepositoryError> {
        let model = job_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        model.map(ScrapeJob::try_from).transpose()
    }

    async fn find_by_status(
        &self,
        status: JobStatus,
        limit: u64,
    ) -> Result<Vec<ScrapeJob>, RepositoryError> {
        let models = job_entity::Entity::find()
            .filter(job_entity::Column::Status.eq(status.to_string()))
            .order_by_asc(job_entity::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        models.into_iter().map(ScrapeJob::try_from).collect()
    }

    async fn acquire_next(
        &self,
        worker_id: Uuid,
        lease: Duration,
    ) -> Result<Option<ScrapeJob>, RepositoryError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        loop {
            let candidate = job_entity::Entity::find()
                .filter(
                    Condition::any()
                        .add(
                            Condition::all()
                                .add(job_entity::Column::Status.eq(JobStatus::Pending.to_string()))
                                .add(
                                    Condition::any()
                                        .add(job_entity::Column::ScheduledAt.is_null())
                                        .add(job_entity::Column::ScheduledAt.lte(now)),
                                ),
                        )
                        .add(
                            Condition::all()
                                .add(job_entity::Column::Status.eq(JobStatus::Running.to_string()))
                                .add(job_entity::Column::LeaseExpiresAt.lte(now)),
                        ),
                )
                .order_by_desc(job_entity::Column::Priority)
                .order_by_asc(job_entity::Column::CreatedAt)
                .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
                .one(&txn)
                .await?;

            let Some(model) = candidate else {
                txn.commit().await?;
                return Ok(None);
            };

            let job = match ScrapeJob::try_from(model.clone()) {
                Ok(job) => job,
                Err(e) => {
                    warn!(job_id = %model.id, "Failing unreadable job: {}", e);
                    fail_invalid_record(&txn, model.id, &e.to_string()).await?;
                    continue;
                }
            };

            if job.is_exhausted() {
                warn!(job_id = %job.id, "Stalled job has no attempts left, failing it");
                let failed = job.fail(ATTEMPTS_EXHAUSTED_MESSAGE).map_err(domain_error)?;
                let active: job_entity::ActiveModel = failed.into();
                active.update(&txn).await?;
                continue;
            }

            let job = job.acquire(now + lease).map_err(domain_error)?;
            let active: job_entity::ActiveModel = job.clone().into();
            active.update(&txn).await?;
            txn.commit().await?;
            debug!(job_id = %job.id, worker_id = %worker_id, "Job leased");

            return Ok(Some(job));
        }
    }

    async fn transition(
        &self,
        job: &ScrapeJob,
        expected: &[JobStatus],
    ) -> Result<bool, RepositoryError> {
        let model: job_entity::ActiveModel = job.clone().into();
        let result = job_entity::Entity::update_many()
            .set(model)
            .filter(job_entity::Column::Id.eq(job.id))
            .filter(job_entity::Column::Status.is_in(status_strings(expected)))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn transition_leased(
        &self,
        job: &ScrapeJob,
        lease: Option<Uuid>,
    ) -> Result<bool, RepositoryError> {
        let lease_filter = match lease {
            Some(token) => job_entity::Column::LeaseToken.eq(token),
            None => job_entity::Column::LeaseToken.is_null(),
        };
        let model: job_entity::ActiveModel = job.clone().into();
        let result = job_entity::Entity::update_many()
            .set(model)
            .filter(job_entity::Column::Id.eq(job.id))
            .filter(job_entity::Column::Status.eq(JobStatus::Running.to_string()))
            .filter(lease_filter)
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn renew_lease(
        &self,
        id: Uuid,
        lease: Uuid,
        until: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let until: DateTime<FixedOffset> = until.into();
        let now: DateTime<FixedOffset> = Utc::now().into();
        let result = job_entity::Entity::update_many()
            .col_expr(job_entity::Column::LeaseExpiresAt, Expr::value(until))
            .col_expr(job_entity::Column::UpdatedAt, Expr::value(now))
            .filter(job_entity::Column::Id.eq(id))
            .filter(job_entity::Column::Status.eq(JobStatus::Running.to_string()))
            .filter(job_entity::Column::LeaseToken.eq(lease))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn count_by_status(&self) -> Result<JobStats, RepositoryError> {
        let rows: Vec<(String, i64)> = job_entity::Entity::find()
            .select_only()
            .column(job_entity::Column::Status)
            .column_as(job_entity::Column::Id.count(), "count")
            .group_by(job_entity::Column::Status)
            .into_tuple()
            .all(self.db.as_ref())
            .await?;

        let mut stats = JobStats::default();
        for (status, count) in rows {
            match status.parse::<JobStatus>() {
                Ok(status) => stats.add(status, count.max(0) as u64),
                Err(e) => warn!("Skipping {} jobs with unreadable status: {}", count, e),
            }
        }
        Ok(stats)
    }

    async fn has_active_for_target(&self, target: &str) -> Result<bool, RepositoryError> {
        let count = job_entity::Entity::find()
            .filter(job_entity::Column::Target.eq(target))
            .filter(job_entity::Column::Status.is_in(status_strings(&[
                JobStatus::Pending,
                JobStatus::Running,
            ])))
            .count(self.db.as_ref())
            .await?;
        Ok(count > 0)
    }

    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = job_entity::Entity::delete_many()
            .filter(job_entity::Column::Status.is_in(status_strings(&[
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Cancelled,
            ])))
            .filter(job_entity::Column::CompletedAt.lt(cutoff))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}

/// 把无法还原的记录标记为失败，避免它反复阻塞领取
async fn fail_invalid_record(
    txn: &DatabaseTransaction,
    id: Uuid,
    reason: &str,
) -> Result<(), RepositoryError> {
    let now: DateTime<FixedOffset> = Utc::now().into();
    job_entity::Entity::update_many()
        .col_expr(job_entity::Column::Status, Expr::value(JobStatus::Failed.to_string()))
        .col_expr(job_entity::Column::Error, Expr::value(reason.to_string()))
        .col_expr(job_entity::Column::LeaseToken, Expr::value(Option::<Uuid>::None))
        .col_expr(job_entity::Column::CompletedAt, Expr::value(now))
        .col_expr(job_entity::Column::UpdatedAt, Expr::value(now))
        .filter(job_entity::Column::Id.eq(id))
        .exec(txn)
        .await?;
    Ok(())
}
