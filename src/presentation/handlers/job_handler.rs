// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::domain::models::scrape_job::{JobStatus, JobType, ScrapeJob};
use crate::presentation::errors::AppError;
use crate::queue::runner::{JobRunner, JobSpec};

/// 创建任务请求
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[serde(rename = "type")]
    pub job_type: JobType,
    #[validate(url)]
    pub target: Option<String>,
    pub options: Option<Value>,
    #[validate(range(min = 0, max = 10))]
    pub priority: Option<i32>,
    /// 延迟执行（秒），最多一天
    #[validate(range(max = 86400))]
    pub delay_secs: Option<i64>,
    pub user_id: Option<Uuid>,
}

impl From<CreateJobRequest> for JobSpec {
    fn from(request: CreateJobRequest) -> Self {
        let mut spec = JobSpec::new(request.job_type, request.target)
            .with_options(request.options.unwrap_or(Value::Null))
            .with_user(request.user_id);
        if let Some(priority) = request.priority {
            spec = spec.with_priority(priority);
        }
        if let Some(secs) = request.delay_secs.filter(|s| *s > 0) {
            spec = spec.with_delay(chrono::Duration::seconds(secs));
        }
        spec
    }
}

/// 任务响应
///
/// 不暴露租约等队列内部字段
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub target: Option<String>,
    pub status: JobStatus,
    pub priority: i32,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub created_at: DateTime<FixedOffset>,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub completed_at: Option<DateTime<FixedOffset>>,
}

impl From<ScrapeJob> for JobResponse {
    fn from(job: ScrapeJob) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type,
            target: job.target,
            status: job.status,
            priority: job.priority,
            progress: job.progress,
            result: job.result,
            error: job.error,
            attempt_count: job.attempt_count,
            max_attempts: job.max_attempts,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

/// 提交任务
///
/// 直接执行策略下请求会等待任务结束，响应中的状态即为终态。
pub async fn create_job(
    Extension(runner): Extension<Arc<dyn JobRunner>>,
    Json(payload): Json<CreateJobRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let id = runner.enqueue(payload.into()).await?;
    let job = runner
        .status(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "id": id,
            "status": job.status,
        })),
    ))
}

/// 队列统计
///
/// 按状态统计任务数量
pub async fn job_stats(
    Extension(runner): Extension<Arc<dyn JobRunner>>,
) -> Result<impl IntoResponse, AppError> {
    let stats = runner.stats().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "strategy": runner.strategy(),
        "pending": stats.pending,
        "running": stats.running,
        "completed": stats.completed,
        "failed": stats.failed,
        "cancelled": stats.cancelled,
        "total": stats.total(),
    })))
}

/// 查询任务状态
pub async fn get_job(
    Path(id): Path<Uuid>,
    Extension(runner): Extension<Arc<dyn JobRunner>>,
) -> Result<Json<JobResponse>, AppError> {
    match runner.status(id).await? {
        Some(job) => Ok(Json(job.into())),
        None => Err(AppError::NotFound(format!("Job {} not found", id))),
    }
}

/// 取消任务
///
/// 已结束的任务返回 `cancelled: false`
pub async fn cancel_job(
    Path(id): Path<Uuid>,
    Extension(runner): Extension<Arc<dyn JobRunner>>,
) -> Result<impl IntoResponse, AppError> {
    if runner.status(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Job {} not found", id)));
    }
    let cancelled = runner.cancel(id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "id": id,
        "cancelled": cancelled,
    })))
}
