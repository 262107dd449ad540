// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::runner::{cancel_job, JobRunner, JobSpec, RunnerError};
use crate::config::settings::QueueSettings;
use crate::domain::models::scrape_job::{JobStats, ScrapeJob};
use crate::domain::repositories::job_repository::JobRepository;

/// 持久队列策略
///
/// 入队只写入任务记录，由工作器池通过 `acquire_next` 领取执行。
/// 记录保存在数据库中，进程重启后未完成的任务会被重新领取。
pub struct DurableJobRunner {
    jobs: Arc<dyn JobRepository>,
    settings: QueueSettings,
}

impl DurableJobRunner {
    pub fn new(jobs: Arc<dyn JobRepository>, settings: QueueSettings) -> Self {
        Self { jobs, settings }
    }
}

#[async_trait]
impl JobRunner for DurableJobRunner {
    async fn enqueue(&self, spec: JobSpec) -> Result<Uuid, RunnerError> {
        let job = spec.into_job(&self.settings)?;
        let job = self.jobs.create(&job).await?;
        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            priority = job.priority,
            "Job enqueued"
        );
        Ok(job.id)
    }

    async fn status(&self, id: Uuid) -> Result<Option<ScrapeJob>, RunnerError> {
        Ok(self.jobs.find_by_id(id).await?)
    }

    async fn cancel(&self, id: Uuid) -> Result<bool, RunnerError> {
        let cancelled = cancel_job(self.jobs.as_ref(), id).await?;
        if cancelled {
            info!(job_id = %id, "Job cancelled");
        }
        Ok(cancelled)
    }

    async fn stats(&self) -> Result<JobStats, RunnerError> {
        Ok(self.jobs.count_by_status().await?)
    }

    fn strategy(&self) -> &'static str {
        "durable"
    }
}
