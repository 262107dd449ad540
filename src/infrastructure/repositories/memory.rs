// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 内存仓库实现
//!
//! 没有配置数据库时直接执行策略使用它们保存任务状态，
//! 测试也使用它们替代数据库。

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::models::scrape_job::{
    JobStats, JobStatus, ScrapeJob, ATTEMPTS_EXHAUSTED_MESSAGE,
};
use crate::domain::models::target::{ScrapeFrequency, ScrapeTarget};
use crate::domain::models::trend::{HotKeyword, MergedTrend};
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use crate::domain::repositories::target_repository::TargetRepository;
use crate::domain::repositories::trend_repository::TrendRepository;

/// 内存任务仓库
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<Uuid, ScrapeJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &ScrapeJob) -> Result<ScrapeJob, RepositoryError> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job.clone())
    }

    async fn update(&self, job: &ScrapeJob) -> Result<ScrapeJob, RepositoryError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(stored) => {
                *stored = job.clone();
                Ok(job.clone())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScrapeJob>, RepositoryError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn find_by_status(
        &self,
        status: JobStatus,
        limit: u64,
    ) -> Result<Vec<ScrapeJob>, RepositoryError> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<ScrapeJob> = jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|j| j.created_at);
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn acquire_next(
        &self,
        worker_id: Uuid,
        lease: Duration,
    ) -> Result<Option<ScrapeJob>, RepositoryError> {
        let now = Utc::now();
        let mut jobs = self.jobs.write().await;
        loop {
            let next = jobs
                .values()
                .filter(|j| j.is_acquirable(now))
                .min_by(|a, b| {
                    b.priority
                        .cmp(&a.priority)
                        .then_with(|| a.created_at.cmp(&b.created_at))
                })
                .map(|j| j.id);

            let Some(job) = next.and_then(|id| jobs.get(&id).cloned()) else {
                return Ok(None);
            };
            if job.is_exhausted() {
                warn!(job_id = %job.id, "Stalled job has no attempts left, failing it");
                match job.fail(ATTEMPTS_EXHAUSTED_MESSAGE) {
                    Ok(failed) => jobs.insert(failed.id, failed),
                    Err(_) => return Ok(None),
                };
                continue;
            }
            return match job.acquire(now + lease) {
                Ok(acquired) => {
                    debug!(job_id = %acquired.id, worker_id = %worker_id, "Job leased");
                    jobs.insert(acquired.id, acquired.clone());
                    Ok(Some(acquired))
                }
                Err(_) => Ok(None),
            };
        }
    }

    async fn transition(
        &self,
        job: &ScrapeJob,
        expected: &[JobStatus],
    ) -> Result<bool, RepositoryError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(stored) if expected.contains(&stored.status) => {
                *stored = job.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition_leased(
        &self,
        job: &ScrapeJob,
        lease: Option<Uuid>,
    ) -> Result<bool, RepositoryError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(stored) if stored.status == JobStatus::Running && stored.lease_token == lease => {
                *stored = job.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn renew_lease(
        &self,
        id: Uuid,
        lease: Uuid,
        until: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(stored)
                if stored.status == JobStatus::Running && stored.lease_token == Some(lease) =>
            {
                stored.lease_expires_at = Some(until.into());
                stored.updated_at = Utc::now().into();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_by_status(&self) -> Result<JobStats, RepositoryError> {
        let mut stats = JobStats::default();
        for job in self.jobs.read().await.values() {
            stats.add(job.status, 1);
        }
        Ok(stats)
    }

    async fn has_active_for_target(&self, target: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .any(|j| !j.status.is_terminal() && j.target.as_deref() == Some(target)))
    }

    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, j| {
            !(j.status.is_terminal() && j.completed_at.map(|at| at < cutoff).unwrap_or(false))
        });
        Ok((before - jobs.len()) as u64)
    }
}

/// 内存目标仓库
#[derive(Default)]
pub struct InMemoryTargetRepository {
    targets: RwLock<HashMap<Uuid, ScrapeTarget>>,
}

impl InMemoryTargetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<ScrapeTarget> {
        self.targets.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl TargetRepository for InMemoryTargetRepository {
    async fn create(&self, target: &ScrapeTarget) -> Result<ScrapeTarget, RepositoryError> {
        self.targets
            .write()
            .await
            .insert(target.id, target.clone());
        Ok(target.clone())
    }

    async fn find_overdue(
        &self,
        frequency: ScrapeFrequency,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<ScrapeTarget>, RepositoryError> {
        let targets = self.targets.read().await;
        let mut overdue: Vec<ScrapeTarget> = targets
            .values()
            .filter(|t| t.frequency == frequency && t.is_overdue(cutoff))
            .cloned()
            .collect();
        overdue.sort_by_key(|t| t.created_at);
        overdue.truncate(limit as usize);
        Ok(overdue)
    }

    async fn mark_scraped(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut targets = self.targets.write().await;
        let target = targets.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        target.last_scraped_at = Some(at.into());
        Ok(())
    }
}

/// 内存趋势仓库
#[derive(Default)]
pub struct InMemoryTrendRepository {
    records: RwLock<Vec<(String, f64, DateTime<FixedOffset>)>>,
}

impl InMemoryTrendRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定时间记录趋势（用于回放历史数据）
    pub async fn record_at(&self, trends: &[MergedTrend], at: DateTime<Utc>) {
        let mut records = self.records.write().await;
        records.extend(
            trends
                .iter()
                .map(|t| (t.keyword.to_lowercase(), t.popularity, at.into())),
        );
    }
}

#[async_trait]
impl TrendRepository for InMemoryTrendRepository {
    async fn record(&self, trends: &[MergedTrend]) -> Result<(), RepositoryError> {
        self.record_at(trends, Utc::now()).await;
        Ok(())
    }

    async fn hot_keywords(
        &self,
        since: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<HotKeyword>, RepositoryError> {
        let records = self.records.read().await;
        let mut totals: HashMap<&str, f64> = HashMap::new();
        for (keyword, popularity, at) in records.iter() {
            if *at >= since {
                *totals.entry(keyword.as_str()).or_default() += popularity;
            }
        }
        let mut hot: Vec<HotKeyword> = totals
            .into_iter()
            .map(|(keyword, score)| HotKeyword {
                keyword: keyword.to_string(),
                score,
            })
            .collect();
        hot.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        hot.truncate(limit as usize);
        Ok(hot)
    }
}
