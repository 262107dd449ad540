// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use validator::ValidationErrors;

use crate::domain::repositories::job_repository::RepositoryError;
use crate::queue::runner::RunnerError;

/// 应用错误类型
///
/// 封装处理器中可能出现的错误，统一转换为 JSON 错误响应。
/// 内部错误只返回概要信息，细节写入日志。
#[derive(Debug)]
pub enum AppError {
    /// 请求不合法
    BadRequest(String),
    /// 资源不存在
    NotFound(String),
    /// 内部错误
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::Internal(e) => {
                error!("Request failed: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({ "success": false, "error": message }));
        (status, body).into_response()
    }
}

impl From<RunnerError> for AppError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Validation(message) => AppError::BadRequest(message),
            RunnerError::Repository(RepositoryError::NotFound) => {
                AppError::NotFound("Job not found".to_string())
            }
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
