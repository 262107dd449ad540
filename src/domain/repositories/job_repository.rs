// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scrape_job::{JobStats, JobStatus, ScrapeJob};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 存储的记录无法还原为领域对象
    #[error("Invalid record {id}: {reason}")]
    InvalidRecord { id: Uuid, reason: String },
}

/// 抓取任务仓库特质
///
/// 定义任务数据访问接口。仓库只保证单行语义，
/// 不要求跨行事务。
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 创建新任务
    async fn create(&self, job: &ScrapeJob) -> Result<ScrapeJob, RepositoryError>;

    /// 无条件写回任务（仅供非终态的进度更新使用）
    async fn update(&self, job: &ScrapeJob) -> Result<ScrapeJob, RepositoryError>;

    /// 根据ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScrapeJob>, RepositoryError>;

    /// 按状态查找任务，按创建时间升序
    async fn find_by_status(
        &self,
        status: JobStatus,
        limit: u64,
    ) -> Result<Vec<ScrapeJob>, RepositoryError>;

    /// 领取下一个可执行任务
    ///
    /// 可执行任务包括：计划时间已到的 `Pending` 任务，
    /// 以及租约已过期的 `Running` 任务（停滞或等待重试）。
    /// 领取时写入租约并累加尝试次数。尝试次数已用尽的停滞任务
    /// 在领取时直接标记为失败，不会被再次执行。
    ///
    /// # 参数
    ///
    /// * `worker_id` - 租约持有者
    /// * `lease` - 租约时长
    async fn acquire_next(
        &self,
        worker_id: Uuid,
        lease: Duration,
    ) -> Result<Option<ScrapeJob>, RepositoryError>;

    /// 条件写回
    ///
    /// 仅当存储中的状态属于 `expected` 时才写入 `job`。
    ///
    /// # 返回值
    ///
    /// 写入成功返回 true；状态已被其他参与者改变时返回 false
    async fn transition(
        &self,
        job: &ScrapeJob,
        expected: &[JobStatus],
    ) -> Result<bool, RepositoryError>;

    /// 租约持有者的条件写回
    ///
    /// 仅当存储中的任务仍为 `Running` 且租约仍属于 `lease` 时才写入。
    /// 租约过期后被其他工作器重新领取的任务，原持有者的写回会被拒绝。
    /// 直接执行的任务没有租约，`lease` 为 `None`。
    async fn transition_leased(
        &self,
        job: &ScrapeJob,
        lease: Option<Uuid>,
    ) -> Result<bool, RepositoryError>;

    /// 续租
    ///
    /// # 返回值
    ///
    /// 租约已不属于 `lease`（被取消、被重新领取）时返回 false
    async fn renew_lease(
        &self,
        id: Uuid,
        lease: Uuid,
        until: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// 按状态统计任务数量
    async fn count_by_status(&self) -> Result<JobStats, RepositoryError>;

    /// 目标是否存在未结束的任务
    async fn has_active_for_target(&self, target: &str) -> Result<bool, RepositoryError>;

    /// 删除早于截止时间结束的终态任务
    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;
}
