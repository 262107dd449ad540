// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::presentation::handlers::job_handler;
use crate::queue::runner::JobRunner;
use axum::{
    extract::Extension,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 创建应用路由
///
/// # 参数
///
/// * `runner` - 启动时选定的执行策略
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(runner: Arc<dyn JobRunner>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version))
        .route("/v1/jobs", post(job_handler::create_job))
        .route("/v1/jobs/stats", get(job_handler::job_stats))
        .route(
            "/v1/jobs/{id}",
            get(job_handler::get_job).delete(job_handler::cancel_job),
        )
        .layer(Extension(runner))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
pub async fn health_check(Extension(runner): Extension<Arc<dyn JobRunner>>) -> Json<Value> {
    Json(json!({ "status": "ok", "strategy": runner.strategy() }))
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
