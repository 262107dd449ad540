// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use metrics::{counter, histogram};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::handlers::{HandlerRegistry, ProgressSink};
use super::runner::RunnerError;
use crate::domain::models::scrape_job::ScrapeJob;
use crate::domain::repositories::job_repository::JobRepository;
use crate::domain::services::notification_service::{
    JobEvent, NotificationPublisher, SCRAPING_CHANNEL,
};
use crate::utils::errors::ScrapeError;
use crate::utils::retry_policy::RetryPolicy;

/// 单次执行的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
    /// 保持运行态，等待租约过期后重新领取
    RetryScheduled,
    /// 执行期间任务已被取消或租约易主，结果被丢弃
    Discarded,
}

/// 写回进度并发布事件的进度上报器
///
/// 进度写回使用租约条件更新，任务一旦离开运行态或租约易主便不再写入。
struct PersistedProgress {
    job: Mutex<ScrapeJob>,
    lease: Option<Uuid>,
    /// 续租后的过期时间，进度写回时带上，避免覆盖续租结果
    lease_until: parking_lot::Mutex<Option<DateTime<FixedOffset>>>,
    jobs: Arc<dyn JobRepository>,
    notifier: Arc<dyn NotificationPublisher>,
}

impl PersistedProgress {
    async fn snapshot(&self) -> ScrapeJob {
        self.job.lock().await.clone()
    }
}

#[async_trait]
impl ProgressSink for PersistedProgress {
    async fn report(&self, progress: u8) {
        let mut job = self.job.lock().await;
        if !job.advance(progress) {
            return;
        }
        job.lease_expires_at = *self.lease_until.lock();
        match self.jobs.transition_leased(&job, self.lease).await {
            Ok(true) => {
                self.notifier
                    .publish(SCRAPING_CHANNEL, &JobEvent::progress(&job))
                    .await
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to persist progress for job {}: {}", job.id, e),
        }
    }
}

/// 任务执行器
///
/// 对已处于 `Running` 的任务调用对应处理器，并把结果写回仓库。
/// 离开运行态的写回全部以租约为条件：执行期间被取消，或租约过期后
/// 被其他工作器重新领取的任务，本次执行的结果都会被丢弃。
/// 持有租约的任务在处理器运行期间每隔三分之一租约时长续租一次。
#[derive(Clone)]
pub struct JobExecutor {
    jobs: Arc<dyn JobRepository>,
    handlers: HandlerRegistry,
    notifier: Arc<dyn NotificationPublisher>,
    retry: Option<RetryPolicy>,
}

impl JobExecutor {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        handlers: HandlerRegistry,
        notifier: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            jobs,
            handlers,
            notifier,
            retry: None,
        }
    }

    /// 开启失败重试（仅持久队列使用）
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn jobs(&self) -> &Arc<dyn JobRepository> {
        &self.jobs
    }

    /// 执行一个运行中的任务
    ///
    /// # 错误
    ///
    /// 仅在仓库访问失败时返回错误；处理器失败会被记录到任务上。
    #[instrument(skip(self, job), fields(job_id = %job.id, job_type = %job.job_type))]
    pub async fn execute(&self, job: ScrapeJob) -> Result<JobOutcome, RunnerError> {
        let job_type = job.job_type;
        let lease = job.lease_token;
        info!("Executing job (attempt {}/{})", job.attempt_count, job.max_attempts);
        self.notifier
            .publish(SCRAPING_CHANNEL, &JobEvent::start(&job))
            .await;

        let sink = PersistedProgress {
            job: Mutex::new(job.clone()),
            lease,
            lease_until: parking_lot::Mutex::new(job.lease_expires_at),
            jobs: self.jobs.clone(),
            notifier: self.notifier.clone(),
        };
        let started = Instant::now();
        let work = self.handlers.handler_for(job_type).handle(&job, &sink);
        let outcome = match (lease, lease_span(job.lease_expires_at)) {
            (Some(token), Some(span)) => self.renewing(job.id, token, span, &sink, work).await,
            _ => work.await,
        };
        histogram!("harvest_extraction_seconds", "type" => job_type.to_string())
            .record(started.elapsed().as_secs_f64());
        let job = sink.snapshot().await;

        let result = match outcome {
            Ok(payload) => {
                let completed = job.complete(payload)?;
                if self.jobs.transition_leased(&completed, lease).await? {
                    info!("Job completed");
                    self.notifier
                        .publish(SCRAPING_CHANNEL, &JobEvent::complete(&completed))
                        .await;
                    JobOutcome::Completed
                } else {
                    info!("Job was cancelled or re-leased during execution, discarding result");
                    JobOutcome::Discarded
                }
            }
            Err(e) => {
                if let Some(retry_at) = self.retry_time(&job, &e) {
                    let deferred = job.defer_retry(retry_at)?;
                    if self.jobs.transition_leased(&deferred, lease).await? {
                        warn!("Job failed with {}, retrying at {}", e, retry_at);
                        JobOutcome::RetryScheduled
                    } else {
                        JobOutcome::Discarded
                    }
                } else {
                    let failed = job.fail(e.to_string())?;
                    if self.jobs.transition_leased(&failed, lease).await? {
                        error!("Job failed: {}", e);
                        counter!("harvest_job_errors_total", "kind" => e.kind()).increment(1);
                        self.notifier
                            .publish(SCRAPING_CHANNEL, &JobEvent::error(&failed))
                            .await;
                        JobOutcome::Failed
                    } else {
                        JobOutcome::Discarded
                    }
                }
            }
        };

        let status = match result {
            JobOutcome::Completed => "completed",
            JobOutcome::Failed => "failed",
            JobOutcome::RetryScheduled => "retry",
            JobOutcome::Discarded => "cancelled",
        };
        counter!("harvest_jobs_total", "type" => job_type.to_string(), "outcome" => status).increment(1);
        Ok(result)
    }

    /// 失败后的重试时间，不应重试时返回 `None`
    fn retry_time(&self, job: &ScrapeJob, error: &ScrapeError) -> Option<DateTime<Utc>> {
        let policy = self.retry.as_ref()?;
        let attempt = job.attempt_count.max(1) as u32;
        policy
            .should_retry(error, attempt, job.max_attempts.max(0) as u32)
            .then(|| policy.next_retry_time(attempt, Utc::now()))
    }

    /// 运行处理器并定期续租
    ///
    /// 续租失败（任务已取消或租约易主）后不再续租，处理器继续运行，
    /// 其结果在写回时被丢弃。
    async fn renewing<F>(
        &self,
        id: Uuid,
        lease: Uuid,
        span: chrono::Duration,
        sink: &PersistedProgress,
        work: F,
    ) -> F::Output
    where
        F: Future,
    {
        let period = (span / 3).to_std().unwrap_or_default();
        if period.is_zero() {
            return work.await;
        }
        tokio::pin!(work);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let mut renewing = true;

        loop {
            tokio::select! {
                output = &mut work => return output,
                _ = ticker.tick(), if renewing => {
                    let until = Utc::now() + span;
                    match self.jobs.renew_lease(id, lease, until).await {
                        Ok(true) => {
                            *sink.lease_until.lock() = Some(until.into());
                            debug!("Lease renewed until {}", until);
                        }
                        Ok(false) => {
                            warn!("Lease lost during execution");
                            renewing = false;
                        }
                        Err(e) => warn!("Failed to renew lease: {}", e),
                    }
                }
            }
        }
    }
}

/// 租约剩余时长，续租时沿用它作为新的租约时长
fn lease_span(expires_at: Option<DateTime<FixedOffset>>) -> Option<chrono::Duration> {
    let span = expires_at? - Utc::now().fixed_offset();
    (span > chrono::Duration::zero()).then_some(span)
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
