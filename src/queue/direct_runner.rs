// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::executor::JobExecutor;
use super::runner::{cancel_job, JobRunner, JobSpec, RunnerError};
use crate::config::settings::QueueSettings;
use crate::domain::models::scrape_job::{JobStats, JobStatus, ScrapeJob};

/// 直接执行策略
///
/// 在调用方的任务中创建记录并就地执行，任务进入终态后才返回。
/// 不排队也不重试，一次失败即为终态。
pub struct DirectJobRunner {
    executor: JobExecutor,
    settings: QueueSettings,
}

impl DirectJobRunner {
    /// 执行器不应开启重试
    pub fn new(executor: JobExecutor, settings: QueueSettings) -> Self {
        Self { executor, settings }
    }
}

#[async_trait]
impl JobRunner for DirectJobRunner {
    async fn enqueue(&self, spec: JobSpec) -> Result<Uuid, RunnerError> {
        if spec.delay.is_some() {
            debug!("Direct execution ignores the requested delay");
        }
        let mut job = spec.into_job(&self.settings)?;
        job.scheduled_at = None;
        let job = self.executor.jobs().create(&job).await?;
        let id = job.id;

        let mut started = job.start()?;
        started.attempt_count = 1;
        if !self
            .executor
            .jobs()
            .transition(&started, &[JobStatus::Pending])
            .await?
        {
            info!(job_id = %id, "Job left pending before execution, skipping");
            return Ok(id);
        }

        let outcome = self.executor.execute(started).await?;
        debug!(job_id = %id, ?outcome, "Direct execution finished");
        Ok(id)
    }

    async fn status(&self, id: Uuid) -> Result<Option<ScrapeJob>, RunnerError> {
        Ok(self.executor.jobs().find_by_id(id).await?)
    }

    async fn cancel(&self, id: Uuid) -> Result<bool, RunnerError> {
        let cancelled = cancel_job(self.executor.jobs().as_ref(), id).await?;
        if cancelled {
            info!(job_id = %id, "Job cancelled");
        }
        Ok(cancelled)
    }

    async fn stats(&self) -> Result<JobStats, RunnerError> {
        Ok(self.executor.jobs().count_by_status().await?)
    }

    fn strategy(&self) -> &'static str {
        "direct"
    }
}
