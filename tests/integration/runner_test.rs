// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use std::time::Duration;

use super::helpers::{registry, RecordingNotifier, StaticPageLoader, ARTICLE_HTML, ARTICLE_URL};
use harvestrs::config::settings::{QueueSettings, TrendSettings};
use harvestrs::domain::models::scrape_job::{JobStatus, JobType, ScrapeJob};
use harvestrs::domain::services::notification_service::JobEventKind;
use harvestrs::infrastructure::repositories::memory::{InMemoryJobRepository, InMemoryTrendRepository};
use harvestrs::queue::durable_runner::DurableJobRunner;
use harvestrs::queue::executor::JobExecutor;
use harvestrs::queue::runner::{JobRunner, JobSpec};
use harvestrs::utils::retry_policy::RetryPolicy;
use harvestrs::workers::manager::WorkerManager;
use uuid::Uuid;

fn queue_settings() -> QueueSettings {
    QueueSettings {
        poll_interval_ms: 10,
        backoff_ms: 0,
        ..QueueSettings::default()
    }
}

async fn wait_for_terminal(runner: &dyn JobRunner, id: Uuid) -> ScrapeJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let job = runner.status(id).await.unwrap().unwrap();
        if job.status.is_terminal() {
            return job;
        }
        assert!(tokio::time::Instant::now() < deadline, "job {} never finished", id);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// 持久队列：取消等待中的任务
#[tokio::test]
async fn test_cancel_pending_job() {
    let jobs = Arc::new(InMemoryJobRepository::new());
    let runner = DurableJobRunner::new(jobs.clone(), queue_settings());

    let id = runner
        .enqueue(JobSpec::new(JobType::Page, Some(ARTICLE_URL.to_string())))
        .await
        .unwrap();
    assert_eq!(runner.status(id).await.unwrap().unwrap().status, JobStatus::Pending);

    assert!(runner.cancel(id).await.unwrap());
    let job = runner.status(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.error.as_deref(), Some("cancelled"));
    assert!(job.completed_at.is_some());

    assert!(!runner.cancel(id).await.unwrap());
    assert!(!runner.cancel(Uuid::new_v4()).await.unwrap());
}

/// 持久队列：工作器执行任务并发布事件
#[tokio::test]
async fn test_workers_execute_enqueued_jobs() {
    let jobs = Arc::new(InMemoryJobRepository::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let settings = queue_settings();
    let executor = JobExecutor::new(
        jobs.clone(),
        registry(
            StaticPageLoader::default().with_page(ARTICLE_URL, ARTICLE_HTML),
            TrendSettings::default(),
            Arc::new(InMemoryTrendRepository::new()),
        ),
        notifier.clone(),
    )
    .with_retry(RetryPolicy::exponential(Duration::ZERO));
    let runner = DurableJobRunner::new(jobs.clone(), settings.clone());

    let page = runner
        .enqueue(JobSpec::new(JobType::Page, Some(ARTICLE_URL.to_string())))
        .await
        .unwrap();
    let missing = runner
        .enqueue(JobSpec::new(
            JobType::Content,
            Some("https://missing.example.com/".to_string()),
        ))
        .await
        .unwrap();

    let mut manager = WorkerManager::new(executor, settings);
    manager.start_workers(2);
    assert_eq!(manager.worker_count(), 2);

    let done = wait_for_terminal(&runner, page).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.result.as_ref().unwrap()["metadata"]["title"], "Hello Harvest");

    // 导航错误可重试，尝试次数用尽后失败
    let failed = wait_for_terminal(&runner, missing).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.attempt_count, failed.max_attempts);
    assert!(failed.result.is_none());

    manager.shutdown(Duration::from_secs(5)).await;
    assert_eq!(manager.worker_count(), 0);

    let events = notifier.events.lock().await;
    assert!(events
        .iter()
        .any(|e| e.job_id == page && e.kind == JobEventKind::Complete));
    assert!(events
        .iter()
        .any(|e| e.job_id == missing && e.kind == JobEventKind::Error));
}

/// 持久队列：延迟任务在计划时间之前不会被领取
#[tokio::test]
async fn test_delayed_job_is_not_picked_up_early() {
    let jobs = Arc::new(InMemoryJobRepository::new());
    let settings = queue_settings();
    let executor = JobExecutor::new(
        jobs.clone(),
        registry(
            StaticPageLoader::default().with_page(ARTICLE_URL, ARTICLE_HTML),
            TrendSettings::default(),
            Arc::new(InMemoryTrendRepository::new()),
        ),
        Arc::new(RecordingNotifier::default()),
    );
    let runner = DurableJobRunner::new(jobs.clone(), settings.clone());
    let id = runner
        .enqueue(
            JobSpec::new(JobType::Page, Some(ARTICLE_URL.to_string()))
                .with_delay(chrono::Duration::hours(1)),
        )
        .await
        .unwrap();

    let mut manager = WorkerManager::new(executor, settings);
    manager.start_workers(1);
    tokio::time::sleep(Duration::from_millis(200)).await;
    manager.shutdown(Duration::from_secs(5)).await;

    let job = runner.status(id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempt_count, 0);
}
