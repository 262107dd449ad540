// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{Duration, Utc};
use harvestrs::config::settings::TrendSettings;
use harvestrs::domain::models::scrape_job::{JobStatus, JobType};
use harvestrs::domain::repositories::trend_repository::TrendRepository;
use harvestrs::queue::runner::JobSpec;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::helpers::{create_direct_app, StaticPageLoader};

async fn reddit_server() -> MockServer {
    let server = MockServer::start().await;
    let created = Utc::now().timestamp() as f64;
    Mock::given(method("GET"))
        .and(path("/r/rust/hot.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Listing",
            "data": {"children": [
                {"kind": "t3", "data": {"title": "Async Rust in Production", "subreddit": "rust",
                    "num_comments": 12, "ups": 300, "created_utc": created}},
                {"kind": "t3", "data": {"title": "async rust in production", "subreddit": "rust",
                    "num_comments": 3, "ups": 40, "created_utc": created}}
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/down/hot.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    server
}

/// 趋势任务合并条目并记录热门关键词
#[tokio::test]
async fn test_trend_job_records_merged_keywords() {
    let server = reddit_server().await;
    let settings = TrendSettings {
        reddit_base_url: server.uri(),
        ..TrendSettings::default()
    };
    let app = create_direct_app(StaticPageLoader::default(), settings);

    let id = app
        .runner
        .enqueue(JobSpec::new(JobType::TrendMonitoring, None).with_options(json!({
            "sources": ["reddit", "news"],
            "subreddits": ["rust"]
        })))
        .await
        .unwrap();

    let job = app.runner.status(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    let trends = result["trends"].as_array().unwrap();
    assert_eq!(trends.len(), 1);
    assert_eq!(trends[0]["count"], 2);
    assert_eq!(result["sources"], json!(["reddit", "news"]));

    let hot = app
        .trends
        .hot_keywords(Utc::now() - Duration::hours(1), 10)
        .await
        .unwrap();
    assert_eq!(hot.len(), 1);
    assert_eq!(hot[0].keyword, "async rust in production");
    assert!(hot[0].score > 0.0);
}

/// 所有来源都失败时任务仍完成，结果为空并记录失败来源
#[tokio::test]
async fn test_trend_job_completes_empty_when_every_source_fails() {
    let server = reddit_server().await;
    let settings = TrendSettings {
        reddit_base_url: server.uri(),
        ..TrendSettings::default()
    };
    let app = create_direct_app(StaticPageLoader::default(), settings);

    let id = app
        .runner
        .enqueue(JobSpec::new(JobType::TrendMonitoring, None).with_options(json!({
            "sources": ["reddit"],
            "subreddits": ["down"]
        })))
        .await
        .unwrap();

    let job = app.runner.status(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error.is_none());
    let result = job.result.unwrap();
    assert_eq!(result["trends"], json!([]));
    assert_eq!(result["failedSources"], json!(["reddit"]));
    assert!(app
        .trends
        .hot_keywords(Utc::now() - Duration::hours(1), 10)
        .await
        .unwrap()
        .is_empty());
}

/// 未知来源是校验错误
#[tokio::test]
async fn test_unknown_trend_source_is_rejected_by_the_job() {
    let app = create_direct_app(StaticPageLoader::default(), TrendSettings::default());

    let id = app
        .runner
        .enqueue(JobSpec::new(JobType::TrendMonitoring, None).with_options(json!({
            "sources": ["myspace"]
        })))
        .await
        .unwrap();

    let job = app.runner.status(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(app.notifier.events.lock().await.len() >= 2);
}
