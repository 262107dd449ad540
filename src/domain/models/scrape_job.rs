// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 取消任务时写入 error 字段的固定消息
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// 停滞任务尝试次数用尽时写入 error 字段的固定消息
pub const ATTEMPTS_EXHAUSTED_MESSAGE: &str = "attempts exhausted";

/// 抓取任务实体
///
/// 一次抓取请求及其结果。任务由调度器创建为 `Pending`，
/// 只由执行它的工作器推进，进入终态后不再变化。
/// 终态下 `result` 与 `error` 恰好有一个被设置。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapeJob {
    /// 任务唯一标识符，创建后不可变
    pub id: Uuid,
    /// 任务类型，决定由哪个处理器执行
    pub job_type: JobType,
    /// 目标URL，趋势监控等无来源任务为空
    pub target: Option<String>,
    /// 任务状态
    pub status: JobStatus,
    /// 优先级，数值越大越优先
    pub priority: i32,
    /// 进度 0-100，仅在运行中有意义
    pub progress: u8,
    /// 类型相关的结果负载，仅在完成时存在
    pub result: Option<serde_json::Value>,
    /// 失败原因，仅在失败或取消时存在
    pub error: Option<String>,
    /// 所属用户，用于通知路由
    pub user_id: Option<Uuid>,
    /// 抽取选项
    pub options: serde_json::Value,
    /// 已尝试次数
    pub attempt_count: i32,
    /// 最大尝试次数
    pub max_attempts: i32,
    /// 计划执行时间
    pub scheduled_at: Option<DateTime<FixedOffset>>,
    /// 租约令牌，每次领取生成新值
    pub lease_token: Option<Uuid>,
    /// 租约过期时间，过期后任务可被重新领取
    pub lease_expires_at: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub completed_at: Option<DateTime<FixedOffset>>,
    pub updated_at: DateTime<FixedOffset>,
}

/// 任务类型枚举
///
/// 封闭枚举，每个变体在启动时注册一个处理器。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// 网站页面抽取：元数据、链接、图片、技术指纹
    #[default]
    Page,
    /// 文章内容抽取：正文、作者、日期、标签
    Content,
    /// 资源发现：图片、视频、文档、音频
    AssetDiscovery,
    /// 趋势监控：多来源趋势信号
    TrendMonitoring,
}

impl JobType {
    /// 是否需要目标URL
    pub fn requires_target(&self) -> bool {
        !matches!(self, JobType::TrendMonitoring)
    }

    pub fn all() -> [JobType; 4] {
        [
            JobType::Page,
            JobType::Content,
            JobType::AssetDiscovery,
            JobType::TrendMonitoring,
        ]
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobType::Page => write!(f, "page"),
            JobType::Content => write!(f, "content"),
            JobType::AssetDiscovery => write!(f, "asset_discovery"),
            JobType::TrendMonitoring => write!(f, "trend_monitoring"),
        }
    }
}

impl FromStr for JobType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page" => Ok(JobType::Page),
            "content" => Ok(JobType::Content),
            "asset_discovery" => Ok(JobType::AssetDiscovery),
            "trend_monitoring" => Ok(JobType::TrendMonitoring),
            other => Err(DomainError::ValidationError(format!(
                "unsupported job type: {}",
                other
            ))),
        }
    }
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Pending → Running → Completed/Failed/Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 等待执行
    #[default]
    Pending,
    /// 执行中
    Running,
    /// 已完成
    Completed,
    /// 已失败
    Failed,
    /// 已取消
    Cancelled,
}

impl JobStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(DomainError::ValidationError(format!(
                "unknown job status: {}",
                other
            ))),
        }
    }
}

/// 各状态的任务数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl JobStats {
    /// 累加某个状态的数量
    pub fn add(&mut self, status: JobStatus, count: u64) {
        let slot = match status {
            JobStatus::Pending => &mut self.pending,
            JobStatus::Running => &mut self.running,
            JobStatus::Completed => &mut self.completed,
            JobStatus::Failed => &mut self.failed,
            JobStatus::Cancelled => &mut self.cancelled,
        };
        *slot += count;
    }

    pub fn total(&self) -> u64 {
        self.pending + self.running + self.completed + self.failed + self.cancelled
    }
}

/// 领域错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: JobStatus, to: JobStatus },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ScrapeJob {
    /// 创建一个新的待执行任务
    ///
    /// # 参数
    ///
    /// * `job_type` - 任务类型
    /// * `target` - 目标URL
    /// * `options` - 抽取选项
    ///
    /// # 返回值
    ///
    /// 返回状态为 `Pending` 的任务
    pub fn new(job_type: JobType, target: Option<String>, options: serde_json::Value) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            job_type,
            target,
            status: JobStatus::Pending,
            priority: 5,
            progress: 0,
            result: None,
            error: None,
            user_id: None,
            options,
            attempt_count: 0,
            max_attempts: 3,
            scheduled_at: None,
            lease_token: None,
            lease_expires_at: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// 启动任务
    ///
    /// Pending → Running，进度置为 10
    pub fn start(mut self) -> Result<Self, DomainError> {
        match self.status {
            JobStatus::Pending => {
                let now = Utc::now().into();
                self.status = JobStatus::Running;
                self.started_at = Some(now);
                self.progress = 10;
                self.updated_at = now;
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                to: JobStatus::Running,
            }),
        }
    }

    /// 更新进度
    ///
    /// 仅在运行中生效，进度单调不减，超过 100 截断。
    ///
    /// # 返回值
    ///
    /// 进度确实发生变化时返回 true
    pub fn advance(&mut self, progress: u8) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        let progress = progress.min(100);
        if progress <= self.progress {
            return false;
        }
        self.progress = progress;
        self.updated_at = Utc::now().into();
        true
    }

    /// 完成任务
    ///
    /// Running → Completed，写入结果并清空错误
    pub fn complete(mut self, result: serde_json::Value) -> Result<Self, DomainError> {
        match self.status {
            JobStatus::Running => {
                let now = Utc::now().into();
                self.status = JobStatus::Completed;
                self.progress = 100;
                self.result = Some(result);
                self.error = None;
                self.completed_at = Some(now);
                self.updated_at = now;
                self.release_lease();
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                to: JobStatus::Completed,
            }),
        }
    }

    /// 标记任务失败
    ///
    /// Running → Failed，写入错误并清空结果
    pub fn fail(mut self, error: impl Into<String>) -> Result<Self, DomainError> {
        match self.status {
            JobStatus::Running => {
                let now = Utc::now().into();
                self.status = JobStatus::Failed;
                self.error = Some(non_empty(error.into(), "unknown error"));
                self.result = None;
                self.completed_at = Some(now);
                self.updated_at = now;
                self.release_lease();
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                to: JobStatus::Failed,
            }),
        }
    }

    /// 取消任务
    ///
    /// Pending/Running → Cancelled。运行中的抽取不会被中断，
    /// 其后到达的结果会被丢弃。
    pub fn cancel(mut self) -> Result<Self, DomainError> {
        match self.status {
            JobStatus::Pending | JobStatus::Running => {
                let now = Utc::now().into();
                self.status = JobStatus::Cancelled;
                self.error = Some(CANCELLED_MESSAGE.to_string());
                self.result = None;
                self.completed_at = Some(now);
                self.updated_at = now;
                self.release_lease();
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                to: JobStatus::Cancelled,
            }),
        }
    }

    /// 延后重试
    ///
    /// 任务保持 Running，释放租约并把租约过期时间设为下次尝试时间，
    /// 队列在该时间之后重新领取它。
    pub fn defer_retry(mut self, retry_at: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.status {
            JobStatus::Running => {
                self.lease_token = None;
                self.lease_expires_at = Some(retry_at.into());
                self.updated_at = Utc::now().into();
                Ok(self)
            }
            from => Err(DomainError::InvalidStateTransition {
                from,
                to: JobStatus::Running,
            }),
        }
    }

    /// 是否还有剩余尝试次数
    pub fn has_attempts_left(&self) -> bool {
        self.attempt_count < self.max_attempts
    }

    /// 租约过期后不能再次执行的运行中任务
    ///
    /// 重试只在还有剩余次数时才会延后，所以这里只会命中
    /// 最后一次尝试中停滞的任务。
    pub fn is_exhausted(&self) -> bool {
        self.status == JobStatus::Running && !self.has_attempts_left()
    }

    /// 在 `now` 时刻是否可被领取
    ///
    /// 计划时间已到的 `Pending` 任务，或租约已过期的 `Running` 任务。
    pub fn is_acquirable(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            JobStatus::Pending => self.scheduled_at.map(|at| at <= now).unwrap_or(true),
            JobStatus::Running => self.lease_expires_at.map(|at| at <= now).unwrap_or(false),
            _ => false,
        }
    }

    /// 领取任务
    ///
    /// `Pending` 任务先启动；写入新的租约令牌并累加尝试次数。
    /// 尝试次数已用尽的运行中任务不能再被领取。
    pub fn acquire(self, lease_until: DateTime<Utc>) -> Result<Self, DomainError> {
        let mut job = match self.status {
            JobStatus::Pending => self.start()?,
            JobStatus::Running if self.is_exhausted() => {
                return Err(DomainError::ValidationError(format!(
                    "job {} has used all {} attempts",
                    self.id, self.max_attempts
                )))
            }
            JobStatus::Running => self,
            from => {
                return Err(DomainError::InvalidStateTransition {
                    from,
                    to: JobStatus::Running,
                })
            }
        };
        job.lease_token = Some(Uuid::new_v4());
        job.lease_expires_at = Some(lease_until.into());
        job.attempt_count += 1;
        job.updated_at = Utc::now().into();
        Ok(job)
    }

    fn release_lease(&mut self) {
        self.lease_token = None;
        self.lease_expires_at = None;
    }
}

fn non_empty(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
