// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{article_app, ARTICLE_URL};
use axum::http::StatusCode;
use harvestrs::domain::models::scrape_job::{JobStatus, JobType};
use harvestrs::queue::runner::JobSpec;
use serde_json::{json, Value};
use uuid::Uuid;

/// 健康检查返回执行策略
#[tokio::test]
async fn test_health_reports_strategy() {
    let app = article_app();

    let response = app.server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["strategy"], "direct");
}

/// 直接执行策略下提交内容任务后立即得到终态
#[tokio::test]
async fn test_create_content_job_runs_to_completion() {
    let app = article_app();

    let response = app
        .server
        .post("/v1/jobs")
        .json(&json!({
            "type": "content",
            "target": ARTICLE_URL,
            "delaySecs": 60
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "completed");
    let id = body["id"].as_str().unwrap().to_string();

    let job: Value = app.server.get(&format!("/v1/jobs/{}", id)).await.json();
    assert_eq!(job["type"], "content");
    assert_eq!(job["progress"], 100);
    assert_eq!(job["attemptCount"], 1);
    assert_eq!(job["result"]["title"], "Hello Harvest");
    assert!(job["result"]["wordCount"].as_u64().unwrap() > 10);
    assert!(job.get("error").is_none());
    assert!(job.get("leaseToken").is_none());
}

/// 无法访问的页面使任务失败，且不重试
#[tokio::test]
async fn test_unreachable_page_fails_job() {
    let app = article_app();

    let response = app
        .server
        .post("/v1/jobs")
        .json(&json!({ "type": "page", "target": "https://missing.example.com/" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["status"], "failed");

    let id = Uuid::parse_str(body["id"].as_str().unwrap()).unwrap();
    let stored = app.runner.status(id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.attempt_count, 1);
    assert!(stored.result.is_none());
    assert!(stored.error.unwrap().contains("ERR_NAME_NOT_RESOLVED"));
}

/// 非法请求返回 400
#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let app = article_app();

    let bad_url = app
        .server
        .post("/v1/jobs")
        .json(&json!({ "type": "page", "target": "not a url" }))
        .await;
    assert_eq!(bad_url.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = bad_url.json();
    assert_eq!(body["success"], false);

    let missing_target = app
        .server
        .post("/v1/jobs")
        .json(&json!({ "type": "content" }))
        .await;
    assert_eq!(missing_target.status_code(), StatusCode::BAD_REQUEST);

    let bad_priority = app
        .server
        .post("/v1/jobs")
        .json(&json!({ "type": "page", "target": ARTICLE_URL, "priority": 42 }))
        .await;
    assert_eq!(bad_priority.status_code(), StatusCode::BAD_REQUEST);

    assert!(app.jobs.is_empty().await);
}

/// 未知任务返回 404
#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let app = article_app();
    let id = Uuid::new_v4();

    let get = app.server.get(&format!("/v1/jobs/{}", id)).await;
    assert_eq!(get.status_code(), StatusCode::NOT_FOUND);

    let delete = app.server.delete(&format!("/v1/jobs/{}", id)).await;
    assert_eq!(delete.status_code(), StatusCode::NOT_FOUND);
}

/// 已结束的任务不能被取消
#[tokio::test]
async fn test_cancel_finished_job_is_a_no_op() {
    let app = article_app();
    let id = app
        .runner
        .enqueue(JobSpec::new(JobType::Page, Some(ARTICLE_URL.to_string())))
        .await
        .unwrap();

    let response = app.server.delete(&format!("/v1/jobs/{}", id)).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["cancelled"], false);
    let stored = app.runner.status(id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
}

/// 队列统计按状态计数
#[tokio::test]
async fn test_job_stats_count_by_status() {
    let app = article_app();

    let empty: Value = app.server.get("/v1/jobs/stats").await.json();
    assert_eq!(empty["success"], true);
    assert_eq!(empty["total"], 0);

    app.server
        .post("/v1/jobs")
        .json(&json!({ "type": "content", "target": ARTICLE_URL }))
        .await;
    app.server
        .post("/v1/jobs")
        .json(&json!({ "type": "page", "target": "https://missing.example.com/" }))
        .await;

    let response = app.server.get("/v1/jobs/stats").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let stats: Value = response.json();
    assert_eq!(stats["strategy"], "direct");
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["failed"], 1);
    assert_eq!(stats["pending"], 0);
    assert_eq!(stats["total"], 2);
}
