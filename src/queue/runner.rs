// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::config::settings::{QueueSettings, QueueStrategy};
use crate::domain::models::scrape_job::{DomainError, JobStats, JobStatus, JobType, ScrapeJob};
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use crate::extractors::validate_target;

/// 执行器错误类型
#[derive(Error, Debug)]
pub enum RunnerError {
    /// 请求不合法
    #[error("Validation error: {0}")]
    Validation(String),

    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 状态机错误
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// 入队请求
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub job_type: JobType,
    pub target: Option<String>,
    pub options: Value,
    pub user_id: Option<Uuid>,
    /// 未设置时使用队列默认优先级
    pub priority: Option<i32>,
    /// 延迟执行
    pub delay: Option<Duration>,
}

impl JobSpec {
    pub fn new(job_type: JobType, target: Option<String>) -> Self {
        Self {
            job_type,
            target,
            options: Value::Object(Default::default()),
            user_id: None,
            priority: None,
            delay: None,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    pub fn with_user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 校验请求
    ///
    /// 需要目标的任务类型必须携带合法的 http(s) URL；
    /// 选项必须是 JSON 对象或为空。
    pub fn validate(&self) -> Result<(), RunnerError> {
        if !(self.options.is_object() || self.options.is_null()) {
            return Err(RunnerError::Validation(
                "options must be a JSON object".to_string(),
            ));
        }
        match (&self.target, self.job_type.requires_target()) {
            (Some(url), _) => validate_target(url)
                .map(|_| ())
                .map_err(|e| RunnerError::Validation(e.to_string())),
            (None, true) => Err(RunnerError::Validation(format!(
                "{} jobs require a target URL",
                self.job_type
            ))),
            (None, false) => Ok(()),
        }
    }

    /// 构建待执行任务
    pub fn into_job(self, settings: &QueueSettings) -> Result<ScrapeJob, RunnerError> {
        self.validate()?;
        let options = if self.options.is_null() {
            Value::Object(Default::default())
        } else {
            self.options
        };
        let mut job = ScrapeJob::new(self.job_type, self.target, options);
        job.user_id = self.user_id;
        job.priority = self.priority.unwrap_or(settings.default_priority);
        job.max_attempts = settings.max_attempts.max(1) as i32;
        if let Some(delay) = self.delay {
            job.scheduled_at = Some((Utc::now() + delay).into());
        }
        Ok(job)
    }
}

/// 任务执行策略
///
/// 持久队列与直接执行实现同一契约，调用方不区分两者。
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// 提交任务并返回任务ID
    ///
    /// 直接执行策略在任务进入终态后才返回。
    async fn enqueue(&self, spec: JobSpec) -> Result<Uuid, RunnerError>;

    /// 查询任务当前状态
    async fn status(&self, id: Uuid) -> Result<Option<ScrapeJob>, RunnerError>;

    /// 取消未结束的任务
    ///
    /// # 返回值
    ///
    /// 任务被取消返回 true；任务不存在或已结束返回 false
    async fn cancel(&self, id: Uuid) -> Result<bool, RunnerError>;

    /// 各状态的任务数量
    async fn stats(&self) -> Result<JobStats, RunnerError>;

    /// 策略名称，用于日志与健康检查
    fn strategy(&self) -> &'static str;
}

/// 启动时选定执行策略
///
/// `Auto` 在配置了数据库时使用持久队列，否则直接执行。
/// 显式要求持久队列但没有数据库时返回错误。
pub fn resolve_strategy(
    configured: QueueStrategy,
    has_database: bool,
) -> Result<QueueStrategy, RunnerError> {
    match (configured, has_database) {
        (QueueStrategy::Durable, false) => Err(RunnerError::Validation(
            "durable queue strategy requires database.url".to_string(),
        )),
        (QueueStrategy::Auto | QueueStrategy::Durable, true) => Ok(QueueStrategy::Durable),
        (QueueStrategy::Auto | QueueStrategy::Direct, _) => Ok(QueueStrategy::Direct),
    }
}

/// 取消未结束的任务
///
/// 条件写回保证与工作器的完成写回之间只有一方生效。
pub(crate) async fn cancel_job(jobs: &dyn JobRepository, id: Uuid) -> Result<bool, RunnerError> {
    let Some(job) = jobs.find_by_id(id).await? else {
        return Ok(false);
    };
    if job.status.is_terminal() {
        return Ok(false);
    }
    let cancelled = job.cancel()?;
    Ok(jobs
        .transition(&cancelled, &[JobStatus::Pending, JobStatus::Running])
        .await?)
}
