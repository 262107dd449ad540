// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use serde_json::json;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use super::runner::{JobRunner, JobSpec};
use crate::config::settings::ScheduleSettings;
use crate::domain::models::scrape_job::JobType;
use crate::domain::models::target::ScrapeFrequency;
use crate::domain::repositories::job_repository::JobRepository;
use crate::domain::repositories::storage_repository::StorageRepository;
use crate::domain::repositories::target_repository::TargetRepository;
use crate::domain::repositories::trend_repository::TrendRepository;

/// 定时扫描调度器
///
/// 定时任务只负责入队，不直接执行抽取：
/// - 每日扫描：为过期的每日目标创建任务
/// - 每周扫描：为过期的每周目标创建任务
/// - 每小时趋势扫描：为近 24 小时的热门关键词创建趋势监控任务
/// - 清理：删除过期的终态任务与下载文件
pub struct SweepScheduler {
    runner: Arc<dyn JobRunner>,
    jobs: Arc<dyn JobRepository>,
    targets: Arc<dyn TargetRepository>,
    trends: Arc<dyn TrendRepository>,
    storage: Option<Arc<dyn StorageRepository>>,
    settings: ScheduleSettings,
    trend_sources: Vec<String>,
}

impl SweepScheduler {
    pub fn new(
        runner: Arc<dyn JobRunner>,
        jobs: Arc<dyn JobRepository>,
        targets: Arc<dyn TargetRepository>,
        trends: Arc<dyn TrendRepository>,
        settings: ScheduleSettings,
    ) -> Self {
        Self {
            runner,
            jobs,
            targets,
            trends,
            storage: None,
            settings,
            trend_sources: vec!["google".to_string()],
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageRepository>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// 趋势扫描创建的任务使用的来源
    pub fn with_trend_sources(mut self, sources: Vec<String>) -> Self {
        self.trend_sources = sources;
        self
    }

    /// 为过期目标创建任务
    ///
    /// 已有未结束任务的目标会被跳过，单个目标入队失败只记录日志。
    ///
    /// # 返回值
    ///
    /// 创建的任务数量
    pub async fn sweep_overdue(&self, frequency: ScrapeFrequency) -> Result<usize> {
        let cutoff = Utc::now() - frequency.interval();
        let targets = self
            .targets
            .find_overdue(frequency, cutoff, self.settings.sweep_batch_size)
            .await?;
        if targets.is_empty() {
            info!("No {} targets due for scraping", frequency);
            return Ok(0);
        }

        let mut enqueued = 0;
        for target in targets {
            if self.jobs.has_active_for_target(&target.url).await? {
                info!("Skipping {}: a job is already active", target.url);
                continue;
            }
            let spec = JobSpec::new(target.job_type, Some(target.url.clone()))
                .with_user(target.user_id);
            match self.runner.enqueue(spec).await {
                Ok(job_id) => {
                    self.targets.mark_scraped(target.id, Utc::now()).await?;
                    info!("Queued {} job {} for {}", target.job_type, job_id, target.url);
                    enqueued += 1;
                }
                Err(e) => warn!("Failed to queue job for {}: {}", target.url, e),
            }
        }

        info!("{} sweep queued {} jobs", frequency, enqueued);
        Ok(enqueued)
    }

    /// 为热门关键词创建趋势监控任务
    pub async fn sweep_trends(&self) -> Result<usize> {
        let since = Utc::now() - Duration::hours(24);
        let keywords = self
            .trends
            .hot_keywords(since, self.settings.hot_keyword_limit)
            .await?;

        let mut enqueued = 0;
        for hot in keywords {
            let spec = JobSpec::new(JobType::TrendMonitoring, None).with_options(json!({
                "keyword": hot.keyword,
                "sources": self.trend_sources,
            }));
            match self.runner.enqueue(spec).await {
                Ok(_) => enqueued += 1,
                Err(e) => warn!("Failed to queue trend job for {}: {}", hot.keyword, e),
            }
        }

        info!("Trend sweep queued {} jobs", enqueued);
        Ok(enqueued)
    }

    /// 删除过期的终态任务与下载文件
    ///
    /// # 返回值
    ///
    /// （删除的任务数，删除的文件数）
    pub async fn cleanup(&self) -> Result<(u64, u64)> {
        let cutoff = Utc::now() - Duration::days(self.settings.retention_days);
        let jobs = self.jobs.delete_finished_before(cutoff).await?;

        let files = match &self.storage {
            Some(storage) => {
                let age = std::time::Duration::from_secs(self.settings.file_retention_days * 86_400);
                storage.purge_older_than(age).await?
            }
            None => 0,
        };

        info!("Cleanup removed {} jobs and {} files", jobs, files);
        Ok((jobs, files))
    }

    /// 注册并启动全部定时任务
    pub async fn start(self: Arc<Self>) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new().await?;

        let daily = self.clone();
        scheduler
            .add(Job::new_async(self.settings.daily_sweep.as_str(), move |_uuid, _lock| {
                let sweeper = daily.clone();
                Box::pin(async move {
                    if let Err(e) = sweeper.sweep_overdue(ScrapeFrequency::Daily).await {
                        error!("Daily sweep failed: {}", e);
                    }
                })
            })?)
            .await?;

        let weekly = self.clone();
        scheduler
            .add(Job::new_async(self.settings.weekly_sweep.as_str(), move |_uuid, _lock| {
                let sweeper = weekly.clone();
                Box::pin(async move {
                    if let Err(e) = sweeper.sweep_overdue(ScrapeFrequency::Weekly).await {
                        error!("Weekly sweep failed: {}", e);
                    }
                })
            })?)
            .await?;

        let trends = self.clone();
        scheduler
            .add(Job::new_async(self.settings.trend_sweep.as_str(), move |_uuid, _lock| {
                let sweeper = trends.clone();
                Box::pin(async move {
                    if let Err(e) = sweeper.sweep_trends().await {
                        error!("Trend sweep failed: {}", e);
                    }
                })
            })?)
            .await?;

        let cleanup = self.clone();
        scheduler
            .add(Job::new_async(self.settings.cleanup.as_str(), move |_uuid, _lock| {
                let sweeper = cleanup.clone();
                Box::pin(async move {
                    if let Err(e) = sweeper.cleanup().await {
                        error!("Cleanup failed: {}", e);
                    }
                })
            })?)
            .await?;

        scheduler.start().await?;
        info!(
            daily = %self.settings.daily_sweep,
            weekly = %self.settings.weekly_sweep,
            trends = %self.settings.trend_sweep,
            cleanup = %self.settings.cleanup,
            "Scheduled sweeps started"
        );
        Ok(scheduler)
    }
}
